//! Real-time phoneme recognition by exemplar matching.
//!
//! Each tick the [`Engine`] turns the latest microphone window into a
//! 64-bin [`FeatureVector`], appends it to a 30-frame [`PatternBuffer`] and,
//! when the [`OnsetDetector`] fires for the target letter, compares the
//! buffer against the letter's stored positive and negative snapshots.
//!
//! - [`letter`]: letters, phonetic classes and profile ids
//! - [`features`], [`pattern`]: per-tick features and the sliding buffer
//! - [`onset`]: match trigger and calibration peak detection
//! - [`exemplar`], [`snapshot`]: the pooled snapshot store and its records
//! - [`matcher`]: accept / reject / none classification
//! - [`scheduler`], [`persist`], [`repository`]: debounced write-back
//! - [`upload`]: clip blob storage
//! - [`calibrate`]: collecting positives for a letter
//! - [`engine`]: the session engine tying it together
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use phonic_audio::{Format, PushSource};
//! use phonic_kv::MemoryStore;
//! use phonic_phoneme::{Engine, EngineConfig, KvRepository, Letter};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), phonic_phoneme::PhonemeError> {
//! let repo = Arc::new(KvRepository::from_store(MemoryStore::new()));
//! let source = PushSource::new(Format::MONO_16K);
//! let mut engine = Engine::new(EngineConfig::default(), source, repo)?;
//!
//! engine.load_exemplars().await?;
//! let m = Letter::new('m')?;
//! assert!(engine.start_session(m).await.is_err()); // nothing calibrated yet
//! # Ok(())
//! # }
//! ```

pub mod calibrate;
pub mod config;
pub mod engine;
mod error;
pub mod exemplar;
pub mod features;
pub mod letter;
pub mod matcher;
pub mod onset;
pub mod pattern;
pub mod persist;
pub mod repository;
pub mod scheduler;
pub mod snapshot;
pub mod upload;


pub use calibrate::{Calibrator, PendingTake, SNAPSHOTS_NEEDED};
pub use config::EngineConfig;
pub use engine::{Engine, EngineState, TickOutcome};
pub use error::PhonemeError;
pub use exemplar::ExemplarStore;
pub use features::{FEATURE_BINS, FeatureExtractor, FeatureVector, Features};
pub use letter::{Letter, PhoneticClass, ProfileId};
pub use matcher::{Decision, MatchInfo, MatchResult, Matcher, MatcherConfig};
pub use onset::{Onset, OnsetConfig, OnsetDetector, PeakConfig, PeakDetector};
pub use pattern::{PATTERN_LENGTH, PatternBuffer};
pub use persist::WriteBack;
pub use repository::{ExemplarRepository, KvRepository};
pub use scheduler::Debouncer;
pub use snapshot::{LetterRecord, Snapshot, SnapshotId, SnapshotKind, SnapshotRecord};
pub use upload::{ClipMeta, ClipUploader, KvClipStore};
