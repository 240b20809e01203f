//! Error types for audio sources, capture and WAV coding.

use thiserror::Error;

/// Failures opening or running an audio source.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The platform refused microphone access.
    #[error("audio: microphone permission denied")]
    PermissionDenied,

    #[error("audio: no input device available")]
    NoInputDevice,

    #[error("audio: stream error: {0}")]
    Stream(String),
}

/// Failures requesting an onset capture.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureError {
    /// A capture is already recording.
    #[error("audio: capture already in progress")]
    Busy,

    /// The rolling buffer is not active.
    #[error("audio: capture buffer is not running")]
    NotBuffering,
}

/// WAV encode/decode failures.
#[derive(Error, Debug)]
pub enum WavError {
    #[error("audio: wav: {0}")]
    Hound(#[from] hound::Error),

    #[error("audio: wav: unsupported format: {0}")]
    Unsupported(String),
}
