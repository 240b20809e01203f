//! Mono PCM format and sample conversions.

use std::time::Duration;

/// Describes a mono stream of `f32` samples.
///
/// All audio inside the engine is mono; sources downmix before pushing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Format {
    /// Sample rate in Hz (e.g., 44100, 48000).
    pub sample_rate: u32,
}

impl Format {
    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Number of samples covering `duration`, rounded down.
    pub fn samples_in(&self, duration: Duration) -> usize {
        (duration.as_micros() * self.sample_rate as u128 / 1_000_000) as usize
    }

    /// Playback duration of `samples` samples.
    pub fn duration(&self, samples: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_micros(samples as u64 * 1_000_000 / self.sample_rate as u64)
    }
}

impl Format {
    /// 16kHz mono
    pub const MONO_16K: Format = Format::mono(16000);
    /// 44.1kHz mono
    pub const MONO_44K: Format = Format::mono(44100);
    /// 48kHz mono
    pub const MONO_48K: Format = Format::mono(48000);
}

/// Converts a float sample in `[-1, 1]` to 16-bit PCM.
///
/// Negative values scale by 32768 and positive ones by 32767 so both
/// extremes map exactly onto the i16 range.
pub fn f32_to_i16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Converts a 16-bit PCM sample to a float in `[-1, 1]`.
pub fn i16_to_f32(sample: i16) -> f32 {
    if sample < 0 {
        sample as f32 / 32768.0
    } else {
        sample as f32 / 32767.0
    }
}

/// Averages interleaved frames of `channels` samples down to mono.
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_in_duration() {
        let fmt = Format::MONO_44K;
        assert_eq!(fmt.samples_in(Duration::from_millis(300)), 13230);
        assert_eq!(fmt.samples_in(Duration::from_millis(700)), 30870);
        assert_eq!(Format::MONO_16K.samples_in(Duration::from_secs(1)), 16000);
    }

    #[test]
    fn test_duration() {
        assert_eq!(Format::MONO_16K.duration(1600), Duration::from_millis(100));
        assert_eq!(Format::mono(0).duration(1600), Duration::ZERO);
    }

    #[test]
    fn test_i16_extremes() {
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(2.5), i16::MAX);
        assert_eq!(f32_to_i16(0.0), 0);
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert_eq!(i16_to_f32(i16::MAX), 1.0);
    }

    #[test]
    fn test_downmix_stereo() {
        let mono = downmix(&[1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2);
        assert_eq!(mono, vec![0.5, 0.5, 0.0]);
        assert_eq!(downmix(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }
}
