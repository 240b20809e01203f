use thiserror::Error;

use crate::letter::Letter;
use crate::snapshot::SnapshotId;

/// Errors returned by engine operations.
///
/// None of these are fatal to the host: detection or feedback is simply
/// unavailable until the condition clears.
#[derive(Debug, Error)]
pub enum PhonemeError {
    /// Microphone access was refused.
    #[error("phoneme: microphone permission denied")]
    PermissionDenied,

    #[error("phoneme: letter '{0}' has no calibration")]
    NoCalibration(Letter),

    #[error("phoneme: empty pattern")]
    EmptyPattern,

    #[error("phoneme: letter '{0}' does not exist")]
    NoSuchLetter(Letter),

    #[error("phoneme: snapshot {0} does not exist")]
    NoSuchSnapshot(SnapshotId),

    #[error("phoneme: capture already in progress")]
    CaptureBusy,

    #[error("phoneme: clip upload failed: {0}")]
    UploadFailed(String),

    #[error("phoneme: persisting '{letter}' failed: {message}")]
    PersistenceWriteFailed { letter: Letter, message: String },

    #[error("phoneme: invalid letter {0:?}")]
    InvalidLetter(String),

    #[error("phoneme: invalid record: {0}")]
    InvalidRecord(String),

    #[error("phoneme: no active session")]
    SessionInactive,

    #[error("phoneme: persistence error: {0}")]
    Persistence(String),

    #[error("phoneme: audio error: {0}")]
    Audio(String),

    #[error("phoneme: config error: {0}")]
    Config(String),
}

impl From<phonic_audio::SourceError> for PhonemeError {
    fn from(err: phonic_audio::SourceError) -> Self {
        match err {
            phonic_audio::SourceError::PermissionDenied => PhonemeError::PermissionDenied,
            other => PhonemeError::Audio(other.to_string()),
        }
    }
}

impl From<phonic_kv::KVError> for PhonemeError {
    fn from(err: phonic_kv::KVError) -> Self {
        PhonemeError::Persistence(err.to_string())
    }
}
