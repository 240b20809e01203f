//! Loading and saving calibration records.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use phonic_kv::{KVStore, SharedKVStore};

use crate::error::PhonemeError;
use crate::letter::Letter;
use crate::snapshot::{LetterRecord, SnapshotRecord};

/// Key prefix of per-letter calibration records.
pub const KEY_PREFIX: &str = "calibration/";

pub fn record_key(letter: Letter) -> String {
    format!("{KEY_PREFIX}{letter}")
}

/// Persistence keyed by letter, pooled across profiles.
#[async_trait::async_trait]
pub trait ExemplarRepository: Send + Sync {
    /// Every stored letter with its snapshot records.
    async fn load_all(&self) -> Result<BTreeMap<Letter, Vec<SnapshotRecord>>, PhonemeError>;

    /// One letter's records; empty if the letter was never saved.
    async fn load_letter(&self, letter: Letter) -> Result<Vec<SnapshotRecord>, PhonemeError>;

    /// Replaces one letter's records.
    async fn save_letter(&self, letter: Letter, records: &[SnapshotRecord]) -> Result<(), PhonemeError>;
}

/// [`ExemplarRepository`] over any [`KVStore`].
///
/// Each letter is one JSON document under `calibration/<letter>`. Store
/// calls run on the blocking pool.
#[derive(Clone)]
pub struct KvRepository {
    store: SharedKVStore,
}

impl KvRepository {
    pub fn new(store: SharedKVStore) -> Self {
        Self { store }
    }

    pub fn from_store(store: impl KVStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }
}

#[derive(Deserialize)]
struct RawLetterRecord {
    #[serde(default)]
    snapshots: Vec<serde_json::Value>,
}

/// Decodes a letter document, dropping snapshots that do not parse.
fn decode(letter: Letter, bytes: &[u8]) -> Result<Vec<SnapshotRecord>, PhonemeError> {
    let raw: RawLetterRecord = serde_json::from_slice(bytes)
        .map_err(|e| PhonemeError::InvalidRecord(format!("{letter}: {e}")))?;
    Ok(raw
        .snapshots
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<SnapshotRecord>(value) {
            Ok(rec) => Some(rec),
            Err(e) => {
                tracing::warn!(%letter, "repository: skipping malformed snapshot: {e}");
                None
            }
        })
        .collect())
}

fn join_error(err: tokio::task::JoinError) -> PhonemeError {
    PhonemeError::Persistence(err.to_string())
}

#[async_trait::async_trait]
impl ExemplarRepository for KvRepository {
    async fn load_all(&self) -> Result<BTreeMap<Letter, Vec<SnapshotRecord>>, PhonemeError> {
        let store = self.store.clone();
        let entries = tokio::task::spawn_blocking(move || store.scan(KEY_PREFIX))
            .await
            .map_err(join_error)??;

        let mut out = BTreeMap::new();
        for (key, bytes) in entries {
            let suffix = key.trim_start_matches(KEY_PREFIX);
            let letter = match suffix.parse::<Letter>() {
                Ok(l) => l,
                Err(_) => {
                    tracing::warn!(key = %key, "repository: skipping record with bad letter key");
                    continue;
                }
            };
            match decode(letter, &bytes) {
                Ok(records) => {
                    out.insert(letter, records);
                }
                Err(e) => tracing::warn!("repository: {e}"),
            }
        }
        tracing::debug!(letters = out.len(), "repository: loaded calibrations");
        Ok(out)
    }

    async fn load_letter(&self, letter: Letter) -> Result<Vec<SnapshotRecord>, PhonemeError> {
        let store = self.store.clone();
        let key = record_key(letter);
        let bytes = tokio::task::spawn_blocking(move || store.get(&key))
            .await
            .map_err(join_error)??;
        match bytes {
            Some(bytes) => decode(letter, &bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn save_letter(&self, letter: Letter, records: &[SnapshotRecord]) -> Result<(), PhonemeError> {
        let doc = LetterRecord {
            letter,
            snapshots: records.to_vec(),
        };
        let bytes = serde_json::to_vec(&doc).map_err(|e| PhonemeError::PersistenceWriteFailed {
            letter,
            message: e.to_string(),
        })?;

        let store = self.store.clone();
        let key = record_key(letter);
        tokio::task::spawn_blocking(move || store.set(&key, &bytes))
            .await
            .map_err(join_error)?
            .map_err(|e| PhonemeError::PersistenceWriteFailed {
                letter,
                message: e.to_string(),
            })
    }
}
