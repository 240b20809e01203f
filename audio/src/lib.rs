//! Audio plumbing for the phonic engine.
//!
//! - [`format`]: mono PCM format and sample conversions
//! - [`analyser`]: byte frequency data from time-domain samples
//! - [`capture`]: rolling pre-onset buffer and triggered clip recorder
//! - [`tap`]: the fan-out handle audio callbacks push samples into
//! - [`source`]: the [`AudioSource`] trait and a host-driven [`PushSource`]
//! - [`wav`]: 16-bit PCM WAV encoding and decoding
//! - `mic` (feature `mic`): the default microphone via cpal
//!
//! # Example
//!
//! ```rust
//! use phonic_audio::{CaptureConfig, Format, InputTap, OnsetCapture};
//!
//! let capture = OnsetCapture::new(Format::MONO_16K, CaptureConfig::default());
//! capture.start_buffering();
//! let tap = InputTap::new(2048, capture.clone());
//! tap.push(&[0.0; 512]);
//! assert_eq!(capture.rolling().len(), 512);
//! ```

pub mod analyser;
pub mod capture;
mod error;
pub mod format;
#[cfg(feature = "mic")]
pub mod mic;
pub mod source;
pub mod tap;
pub mod wav;

pub use analyser::{Analyser, AnalyserConfig};
pub use capture::{CaptureConfig, CaptureHandle, Clip, OnsetCapture};
pub use error::{CaptureError, SourceError, WavError};
pub use format::Format;
#[cfg(feature = "mic")]
pub use mic::MicSource;
pub use source::{AudioSource, PushSource};
pub use tap::InputTap;
