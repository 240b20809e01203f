//! Onset clip capture.
//!
//! While buffering, [`OnsetCapture`] keeps the most recent `pre_onset`
//! worth of samples in a ring. [`OnsetCapture::capture`] freezes that
//! window and records the next `post_onset` samples; once enough samples
//! have arrived the two parts are stitched into a [`Clip`].
//!
//! The post-onset length is counted in samples. [`CaptureHandle::wait`]
//! additionally applies a wall-clock timeout of `post_onset + grace`, after
//! which whatever has been recorded is returned.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use phonic_buffer::RingBuffer;
use tokio::sync::oneshot;

use crate::error::{CaptureError, WavError};
use crate::format::Format;
use crate::wav;

/// Capture window lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    pub pre_onset: Duration,
    pub post_onset: Duration,
    /// Extra wall-clock slack before an unfinished recording is cut short.
    pub grace: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            pre_onset: Duration::from_millis(300),
            post_onset: Duration::from_millis(700),
            grace: Duration::from_millis(200),
        }
    }
}

/// A stitched pre-onset + post-onset recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub format: Format,
    pub samples: Vec<f32>,
    /// Index of the first post-onset sample.
    pub onset_offset: usize,
}

impl Clip {
    pub fn duration(&self) -> Duration {
        self.format.duration(self.samples.len())
    }

    /// Encodes the clip as 16-bit PCM WAV.
    pub fn to_wav(&self) -> Result<Vec<u8>, WavError> {
        wav::encode(&self.samples, self.format)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Buffering,
    Recording,
}

struct State {
    mode: Mode,
    frozen: Vec<f32>,
    recorded: Vec<f32>,
    done: Option<oneshot::Sender<Clip>>,
}

struct Shared {
    format: Format,
    pre: RingBuffer<f32>,
    post_samples: usize,
    timeout: Duration,
    state: Mutex<State>,
}

/// Rolling pre-onset buffer plus a one-at-a-time recorder.
///
/// Cloning yields another handle to the same capture; the audio callback
/// holds one (via the input tap) and the engine another.
#[derive(Clone)]
pub struct OnsetCapture {
    shared: Arc<Shared>,
}

impl OnsetCapture {
    pub fn new(format: Format, config: CaptureConfig) -> Self {
        let pre_samples = format.samples_in(config.pre_onset).max(1);
        Self {
            shared: Arc::new(Shared {
                format,
                pre: RingBuffer::new(pre_samples),
                post_samples: format.samples_in(config.post_onset),
                timeout: config.post_onset + config.grace,
                state: Mutex::new(State {
                    mode: Mode::Idle,
                    frozen: Vec::new(),
                    recorded: Vec::new(),
                    done: None,
                }),
            }),
        }
    }

    pub fn format(&self) -> Format {
        self.shared.format
    }

    /// Capacity of the pre-onset ring in samples.
    pub fn pre_samples(&self) -> usize {
        self.shared.pre.capacity()
    }

    pub fn post_samples(&self) -> usize {
        self.shared.post_samples
    }

    /// Starts filling the rolling buffer. No-op if already active.
    pub fn start_buffering(&self) {
        let mut state = self.shared.state.lock();
        if state.mode == Mode::Idle {
            self.shared.pre.reset();
            state.mode = Mode::Buffering;
        }
    }

    /// Stops buffering and abandons any recording in progress.
    pub fn stop_buffering(&self) {
        let mut state = self.shared.state.lock();
        state.mode = Mode::Idle;
        state.frozen.clear();
        state.recorded.clear();
        state.done = None;
        self.shared.pre.reset();
    }

    pub fn is_buffering(&self) -> bool {
        self.shared.state.lock().mode != Mode::Idle
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.state.lock().mode == Mode::Recording
    }

    /// Snapshot of the rolling buffer in chronological order.
    pub fn rolling(&self) -> Vec<f32> {
        self.shared.pre.to_vec()
    }

    /// Feeds samples from the audio callback.
    pub fn push(&self, samples: &[f32]) {
        let mut state = self.shared.state.lock();
        match state.mode {
            Mode::Idle => {}
            Mode::Buffering => self.shared.pre.write(samples),
            Mode::Recording => {
                let need = self.shared.post_samples - state.recorded.len();
                let take = need.min(samples.len());
                state.recorded.extend_from_slice(&samples[..take]);
                self.shared.pre.write(samples);

                if state.recorded.len() >= self.shared.post_samples {
                    let clip = self.finish(&mut state);
                    if let Some(done) = state.done.take() {
                        let _ = done.send(clip);
                    }
                }
            }
        }
    }

    /// Freezes the pre-onset window and starts recording.
    ///
    /// Fails with [`CaptureError::Busy`] while another capture is recording;
    /// the request is dropped, never queued.
    pub fn capture(&self) -> Result<CaptureHandle, CaptureError> {
        let mut state = self.shared.state.lock();
        match state.mode {
            Mode::Idle => return Err(CaptureError::NotBuffering),
            Mode::Recording => return Err(CaptureError::Busy),
            Mode::Buffering => {}
        }

        let capacity = self.shared.pre.capacity();
        let mut frozen = vec![0.0; capacity];
        self.shared.pre.copy_latest(&mut frozen);
        state.frozen = frozen;
        state.recorded = Vec::with_capacity(self.shared.post_samples);
        state.mode = Mode::Recording;

        let (tx, rx) = oneshot::channel();
        state.done = Some(tx);

        if self.shared.post_samples == 0 {
            let clip = self.finish(&mut state);
            if let Some(done) = state.done.take() {
                let _ = done.send(clip);
            }
        }

        Ok(CaptureHandle {
            rx,
            capture: self.clone(),
            timeout: self.shared.timeout,
        })
    }

    fn finish(&self, state: &mut State) -> Clip {
        let onset_offset = state.frozen.len();
        let mut samples = std::mem::take(&mut state.frozen);
        samples.append(&mut state.recorded);
        state.mode = Mode::Buffering;
        Clip {
            format: self.shared.format,
            samples,
            onset_offset,
        }
    }

    /// Ends a recording early with whatever has arrived.
    fn cut_short(&self) -> Option<Clip> {
        let mut state = self.shared.state.lock();
        if state.mode != Mode::Recording {
            return None;
        }
        state.done = None;
        if state.recorded.is_empty() {
            state.frozen.clear();
            state.mode = Mode::Buffering;
            return None;
        }
        Some(self.finish(&mut state))
    }
}

/// Pending result of [`OnsetCapture::capture`].
pub struct CaptureHandle {
    rx: oneshot::Receiver<Clip>,
    capture: OnsetCapture,
    timeout: Duration,
}

impl CaptureHandle {
    /// Waits for the clip.
    ///
    /// Returns `None` if the capture was abandoned (buffering stopped) or
    /// the timeout expired before any post-onset sample arrived.
    pub async fn wait(mut self) -> Option<Clip> {
        match tokio::time::timeout(self.timeout, &mut self.rx).await {
            Ok(result) => result.ok(),
            Err(_) => {
                tracing::debug!("capture: timed out, finishing with partial recording");
                match self.capture.cut_short() {
                    Some(clip) => Some(clip),
                    None => self.rx.try_recv().ok(),
                }
            }
        }
    }

    /// Non-blocking poll.
    ///
    /// `Ok(None)` while still recording; `Err` once the capture was abandoned.
    pub fn try_take(&mut self) -> Result<Option<Clip>, CaptureError> {
        match self.rx.try_recv() {
            Ok(clip) => Ok(Some(clip)),
            Err(oneshot::error::TryRecvError::Empty) => Ok(None),
            Err(oneshot::error::TryRecvError::Closed) => Err(CaptureError::NotBuffering),
        }
    }
}
