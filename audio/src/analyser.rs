//! Byte frequency data from time-domain PCM.
//!
//! [`Analyser`] reproduces the classic browser analyser pipeline: the latest
//! `fft_size` samples are windowed, transformed, smoothed against the
//! previous frame, converted to decibels and mapped linearly from
//! `[min_db, max_db]` onto `0..=255`.

use std::f64::consts::PI;
use std::sync::Arc;

use num_complex::Complex64;
use rustfft::{Fft, FftPlanner};

/// Analyser parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyserConfig {
    /// Transform size. Rounded up to a power of two, minimum 32.
    pub fft_size: usize,
    /// Exponential smoothing factor in `[0, 1)`.
    pub smoothing: f64,
    pub min_db: f64,
    pub max_db: f64,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.5,
            min_db: -100.0,
            max_db: -30.0,
        }
    }
}

/// Blackman window coefficients (alpha = 0.16) of length `n`.
fn blackman_window(n: usize) -> Vec<f64> {
    if n <= 1 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n as f64;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

/// Stateful spectrum analyser.
///
/// Holds the smoothed magnitudes of the previous frame, so a new analyser
/// (or [`Analyser::reset`]) is needed per session.
pub struct Analyser {
    config: AnalyserConfig,
    window: Vec<f64>,
    smoothed: Vec<f64>,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex64>,
    scratch: Vec<Complex64>,
}

impl Analyser {
    pub fn new(config: AnalyserConfig) -> Self {
        let fft_size = config.fft_size.max(32).next_power_of_two();
        let config = AnalyserConfig {
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 0.999),
            ..config
        };
        let fft = FftPlanner::<f64>::new().plan_fft_forward(fft_size);
        let scratch = vec![Complex64::default(); fft.get_inplace_scratch_len()];
        Self {
            config,
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            fft,
            buffer: vec![Complex64::default(); fft_size],
            scratch,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Number of output bins (`fft_size / 2`).
    pub fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Forgets the smoothing history.
    pub fn reset(&mut self) {
        self.smoothed.fill(0.0);
    }

    /// Computes byte magnitudes for `samples` into `out`.
    ///
    /// Only the last `fft_size` samples are used; shorter input is
    /// zero-padded at the front. Writes `min(out.len(), bin_count())` bins.
    pub fn byte_frequency_data(&mut self, samples: &[f32], out: &mut [u8]) {
        let n = self.config.fft_size;
        let tail = &samples[samples.len().saturating_sub(n)..];
        let pad = n - tail.len();

        self.buffer[..pad].fill(Complex64::default());
        for (i, &s) in tail.iter().enumerate() {
            self.buffer[pad + i] = Complex64::new(s as f64 * self.window[pad + i], 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let tau = self.config.smoothing;
        let scale = 1.0 / n as f64;
        let range = self.config.max_db - self.config.min_db;
        for (k, slot) in out.iter_mut().take(self.bin_count()).enumerate() {
            let mag = self.buffer[k].norm() * scale;
            let value = tau * self.smoothed[k] + (1.0 - tau) * mag;
            self.smoothed[k] = if value.is_finite() { value } else { 0.0 };

            let db = 20.0 * self.smoothed[k].log10();
            let scaled = if range > 0.0 {
                255.0 * (db - self.config.min_db) / range
            } else {
                0.0
            };
            *slot = if scaled.is_finite() {
                scaled.clamp(0.0, 255.0) as u8
            } else {
                0
            };
        }
    }

    /// Convenience wrapper returning a freshly allocated bin vector.
    pub fn analyse(&mut self, samples: &[f32]) -> Vec<u8> {
        let mut out = vec![0u8; self.bin_count()];
        self.byte_frequency_data(samples, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, rate: f32, len: usize, amp: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amp * (2.0 * PI * freq * i as f32 / rate).sin())
            .collect()
    }

    #[test]
    fn test_silence_maps_to_zero() {
        let mut a = Analyser::new(AnalyserConfig::default());
        let out = a.analyse(&vec![0.0; 2048]);
        assert_eq!(out.len(), 1024);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_tone_peaks_at_expected_bin() {
        let mut a = Analyser::new(AnalyserConfig {
            smoothing: 0.0,
            ..Default::default()
        });
        // bin width = 44100 / 2048 ~= 21.5 Hz; bin 40 ~= 861 Hz
        let freq = 40.0 * 44100.0 / 2048.0;
        // quiet enough that the main lobe stays below max_db
        let out = a.analyse(&tone(freq, 44100.0, 2048, 0.085));
        let peak = out
            .iter()
            .enumerate()
            .max_by_key(|(_, v)| **v)
            .map(|(i, _)| i);
        assert_eq!(peak, Some(40));
        assert!(out[40] > 200);
        assert!(out[400] < out[40]);
    }

    #[test]
    fn test_short_input_is_front_padded() {
        let mut a = Analyser::new(AnalyserConfig {
            fft_size: 64,
            smoothing: 0.0,
            ..Default::default()
        });
        let out = a.analyse(&[0.0; 10]);
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_smoothing_carries_previous_frame() {
        let cfg = AnalyserConfig {
            fft_size: 256,
            smoothing: 0.5,
            ..Default::default()
        };
        let loud = tone(44100.0 * 8.0 / 256.0, 44100.0, 256, 0.9);
        let mut a = Analyser::new(cfg);
        a.analyse(&loud);
        let after_silence = a.analyse(&[0.0; 256]);
        assert!(after_silence[8] > 0);

        a.reset();
        let fresh = a.analyse(&[0.0; 256]);
        assert_eq!(fresh[8], 0);
    }

    #[test]
    fn test_blackman_edges() {
        let w = blackman_window(16);
        assert!(w[0].abs() < 1e-12);
        assert!((w[8] - 1.0).abs() < 1e-12);
        assert_eq!(blackman_window(1), vec![1.0]);
    }

    #[test]
    fn test_fft_size_rounded_to_power_of_two() {
        let a = Analyser::new(AnalyserConfig {
            fft_size: 1000,
            ..Default::default()
        });
        assert_eq!(a.fft_size(), 1024);
        assert_eq!(a.bin_count(), 512);
    }
}
