//! WAV encoding for captured clips and decoding for offline replay.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};

use crate::error::WavError;
use crate::format::{Format, downmix, f32_to_i16};

/// Encodes mono `f32` samples as a 16-bit PCM WAV file in memory.
pub fn encode(samples: &[f32], format: Format) -> Result<Vec<u8>, WavError> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: format.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for &s in samples {
            writer.write_sample(f32_to_i16(s))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Decodes a WAV stream into mono `f32` samples.
///
/// Integer formats up to 32 bits and 32-bit float are accepted; multichannel
/// input is averaged down to mono.
pub fn decode<R: Read + Seek>(reader: R) -> Result<(Format, Vec<f32>), WavError> {
    let reader = WavReader::new(reader)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => {
            if spec.bits_per_sample != 32 {
                return Err(WavError::Unsupported(format!(
                    "{}-bit float",
                    spec.bits_per_sample
                )));
            }
            reader.into_samples::<f32>().collect::<Result<_, _>>()?
        }
        SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(WavError::Unsupported(format!(
                    "{}-bit integer",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()?
        }
    };

    let mono = downmix(&interleaved, spec.channels as usize);
    Ok((Format::mono(spec.sample_rate), mono))
}

/// Decodes a WAV file from disk.
pub fn read_file(path: impl AsRef<Path>) -> Result<(Format, Vec<f32>), WavError> {
    let file = std::fs::File::open(path).map_err(hound::Error::IoError)?;
    decode(std::io::BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_header() {
        let bytes = encode(&[0.0, 0.5, -0.5, 1.0], Format::MONO_44K).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        let reader = WavReader::new(Cursor::new(&bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.duration(), 4);
    }

    #[test]
    fn test_encoded_samples_are_pcm16() {
        let bytes = encode(&[1.0, -1.0, 0.0], Format::MONO_16K).unwrap();
        let mut reader = WavReader::new(Cursor::new(bytes)).unwrap();
        let pcm: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(pcm, vec![i16::MAX, i16::MIN, 0]);
    }

    #[test]
    fn test_decode_downmixes_stereo() {
        let spec = WavSpec {
            channels: 2,
            sample_rate: 48000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut w = WavWriter::new(&mut cursor, spec).unwrap();
            for s in [16384i16, 0, -16384, -16384] {
                w.write_sample(s).unwrap();
            }
            w.finalize().unwrap();
        }
        cursor.set_position(0);

        let (format, samples) = decode(cursor).unwrap();
        assert_eq!(format, Format::MONO_48K);
        assert_eq!(samples, vec![0.25, -0.5]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(decode(Cursor::new(b"not a wav file".to_vec())).is_err());
    }
}
