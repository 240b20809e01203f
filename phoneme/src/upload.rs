//! Clip upload.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use phonic_kv::{KVStore, SharedKVStore};

use crate::error::PhonemeError;
use crate::letter::{Letter, ProfileId};

/// What a clip belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipMeta {
    pub owner: ProfileId,
    pub letter: Letter,
    pub negative: bool,
}

impl ClipMeta {
    /// `snapshots/<owner>/<letter>/<unix_ms>-<positive|negative>.wav`
    pub fn object_name(&self, at: DateTime<Utc>) -> String {
        let polarity = if self.negative { "negative" } else { "positive" };
        format!(
            "snapshots/{}/{}/{}-{polarity}.wav",
            self.owner,
            self.letter,
            at.timestamp_millis()
        )
    }
}

/// Blob storage for encoded clips.
#[async_trait::async_trait]
pub trait ClipUploader: Send + Sync {
    /// Stores `wav` and returns a URI it can be fetched by.
    async fn upload(&self, wav: Vec<u8>, meta: &ClipMeta) -> Result<String, PhonemeError>;
}

/// Stores clips in a [`KVStore`] under `clips/<object name>`.
#[derive(Clone)]
pub struct KvClipStore {
    store: SharedKVStore,
}

const URI_SCHEME: &str = "kv://";

impl KvClipStore {
    pub fn new(store: SharedKVStore) -> Self {
        Self { store }
    }

    pub fn from_store(store: impl KVStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    fn key(uri: &str) -> Result<&str, PhonemeError> {
        uri.strip_prefix(URI_SCHEME)
            .ok_or_else(|| PhonemeError::InvalidRecord(format!("not a kv uri: {uri}")))
    }

    /// Reads back a clip by the URI [`ClipUploader::upload`] returned.
    pub fn fetch(&self, uri: &str) -> Result<Option<Vec<u8>>, PhonemeError> {
        Ok(self.store.get(Self::key(uri)?)?)
    }

    /// Deletes a clip. Missing clips are not an error.
    pub fn remove(&self, uri: &str) -> Result<(), PhonemeError> {
        Ok(self.store.delete(Self::key(uri)?)?)
    }
}

#[async_trait::async_trait]
impl ClipUploader for KvClipStore {
    async fn upload(&self, wav: Vec<u8>, meta: &ClipMeta) -> Result<String, PhonemeError> {
        let key = format!("clips/{}", meta.object_name(Utc::now()));
        let store = self.store.clone();
        let write_key = key.clone();
        tokio::task::spawn_blocking(move || store.set(&write_key, &wav))
            .await
            .map_err(|e| PhonemeError::UploadFailed(e.to_string()))?
            .map_err(|e| PhonemeError::UploadFailed(e.to_string()))?;
        Ok(format!("{URI_SCHEME}{key}"))
    }
}
