//! Fan-out point for live samples.

use phonic_buffer::RingBuffer;

use crate::capture::OnsetCapture;
use crate::format::Format;

/// Cloneable handle an audio callback pushes mono samples into.
///
/// Every block goes to the analysis window (the latest `window_len`
/// samples, read once per tick) and to the onset capture.
#[derive(Clone)]
pub struct InputTap {
    format: Format,
    window: RingBuffer<f32>,
    capture: OnsetCapture,
}

impl InputTap {
    pub fn new(window_len: usize, capture: OnsetCapture) -> Self {
        Self {
            format: capture.format(),
            window: RingBuffer::new(window_len.max(1)),
            capture,
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn push(&self, samples: &[f32]) {
        self.window.write(samples);
        self.capture.push(samples);
    }

    /// Copies the latest samples into `out`, zero-padding the front if the
    /// window is not yet full. Returns the number of real samples.
    pub fn latest(&self, out: &mut [f32]) -> usize {
        self.window.copy_latest(out)
    }

    pub fn window_len(&self) -> usize {
        self.window.capacity()
    }

    pub fn capture(&self) -> &OnsetCapture {
        &self.capture
    }

    /// Total samples received since the last [`InputTap::clear`].
    pub fn received(&self) -> u64 {
        self.window.written()
    }

    pub fn clear(&self) {
        self.window.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureConfig;

    #[test]
    fn test_fans_out_to_window_and_capture() {
        let capture = OnsetCapture::new(Format::mono(1000), CaptureConfig::default());
        capture.start_buffering();
        let tap = InputTap::new(8, capture.clone());

        tap.clone().push(&[1.0, 2.0, 3.0]);

        let mut out = [9.0; 4];
        assert_eq!(tap.latest(&mut out), 3);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0]);
        assert_eq!(capture.rolling(), vec![1.0, 2.0, 3.0]);
        assert_eq!(tap.received(), 3);

        tap.clear();
        assert_eq!(tap.received(), 0);
    }
}
