//! Default-microphone source backed by cpal.
//!
//! cpal streams cannot move between threads on every platform, so the
//! stream lives on a dedicated thread for the lifetime of a connection.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample, StreamConfig};

use crate::error::SourceError;
use crate::format::{Format, downmix};
use crate::source::AudioSource;
use crate::tap::InputTap;

struct Running {
    stop_tx: mpsc::Sender<()>,
    thread: JoinHandle<()>,
}

/// The host's default input device.
pub struct MicSource {
    format: Format,
    running: Option<Running>,
}

impl MicSource {
    /// Probes the default input device for its native sample rate.
    pub fn open_default() -> Result<Self, SourceError> {
        let device = cpal::default_host()
            .default_input_device()
            .ok_or(SourceError::NoInputDevice)?;
        let config = device
            .default_input_config()
            .map_err(|e| classify(e.to_string()))?;
        tracing::info!(
            device = %device.name().unwrap_or_default(),
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            "mic: default input"
        );
        Ok(Self {
            format: Format::mono(config.sample_rate().0),
            running: None,
        })
    }
}

impl AudioSource for MicSource {
    fn format(&self) -> Format {
        self.format
    }

    fn connect(&mut self, tap: InputTap) -> Result<(), SourceError> {
        self.disconnect();

        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), SourceError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let thread = thread::Builder::new()
            .name("phonic-mic".into())
            .spawn(move || match open_stream(tap) {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    // Hold the stream until asked to stop or the owner is gone.
                    let _ = stop_rx.recv();
                    drop(stream);
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                }
            })
            .map_err(|e| SourceError::Stream(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                self.running = Some(Running { stop_tx, thread });
                Ok(())
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(SourceError::Stream("mic thread exited".into()))
            }
        }
    }

    fn disconnect(&mut self) {
        if let Some(running) = self.running.take() {
            let _ = running.stop_tx.send(());
            if running.thread.join().is_err() {
                tracing::warn!("mic: stream thread panicked");
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for MicSource {
    fn drop(&mut self) {
        self.disconnect();
    }
}

fn open_stream(tap: InputTap) -> Result<cpal::Stream, SourceError> {
    let device = cpal::default_host()
        .default_input_device()
        .ok_or(SourceError::NoInputDevice)?;
    let supported = device
        .default_input_config()
        .map_err(|e| classify(e.to_string()))?;
    let config: StreamConfig = supported.config();

    let stream = match supported.sample_format() {
        SampleFormat::F32 => build::<f32>(&device, &config, tap),
        SampleFormat::I16 => build::<i16>(&device, &config, tap),
        SampleFormat::U16 => build::<u16>(&device, &config, tap),
        SampleFormat::I32 => build::<i32>(&device, &config, tap),
        other => Err(SourceError::Stream(format!(
            "unsupported sample format {other:?}"
        ))),
    }?;
    stream.play().map_err(|e| classify(e.to_string()))?;
    Ok(stream)
}

fn build<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    tap: InputTap,
) -> Result<cpal::Stream, SourceError>
where
    T: SizedSample + Send + 'static,
    f32: FromSample<T>,
{
    let channels = config.channels as usize;
    let mut scratch: Vec<f32> = Vec::new();
    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                scratch.clear();
                scratch.extend(data.iter().map(|s| s.to_sample::<f32>()));
                if channels > 1 {
                    tap.push(&downmix(&scratch, channels));
                } else {
                    tap.push(&scratch);
                }
            },
            |err| tracing::error!("mic: stream error: {err}"),
            None,
        )
        .map_err(|e| classify(e.to_string()))
}

/// Maps backend error text onto the source error taxonomy.
fn classify(message: String) -> SourceError {
    let lower = message.to_lowercase();
    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized")
    {
        SourceError::PermissionDenied
    } else if lower.contains("not available") || lower.contains("no such device") {
        SourceError::NoInputDevice
    } else {
        SourceError::Stream(message)
    }
}
