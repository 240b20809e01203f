//! Key-value persistence for calibration records and audio blobs.
//!
//! Provides a trait-based KV store interface with an in-memory implementation
//! for tests and tooling, and a redb-based implementation for durable
//! on-disk storage.

pub mod memory;
pub mod redb;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: storage error: {0}")]
    Storage(String),
}

impl KVError {
    pub(crate) fn storage(err: impl fmt::Display) -> Self {
        KVError::Storage(err.to_string())
    }
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Key-value store trait.
///
/// Keys are `/`-separated strings (`calibration/m`, `clips/...`); values
/// are opaque bytes. Implementations must be safe for concurrent use.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Set a key-value pair, replacing any existing value.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> KVResult<()>;

    /// Return all entries whose key starts with `prefix`, sorted by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

/// A shared KV store handle.
pub type SharedKVStore = Arc<dyn KVStore>;

pub use memory::MemoryStore;
pub use redb::RedbStore;
