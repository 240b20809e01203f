//! Redb-based persistent key-value store implementation.

use std::path::Path;

use redb::{Database, ReadableTable, TableDefinition};

use crate::{KVError, KVResult, KVStore};

const TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("kv");

/// A persistent key-value store backed by redb.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open or create a redb store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> KVResult<Self> {
        let db = Database::create(path).map_err(KVError::storage)?;

        // Create the table up front so readers never see a missing table.
        let tx = db.begin_write().map_err(KVError::storage)?;
        tx.open_table(TABLE).map_err(KVError::storage)?;
        tx.commit().map_err(KVError::storage)?;

        Ok(Self { db })
    }
}

impl KVStore for RedbStore {
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>> {
        let tx = self.db.begin_read().map_err(KVError::storage)?;
        let table = tx.open_table(TABLE).map_err(KVError::storage)?;
        let value = table.get(key).map_err(KVError::storage)?;
        Ok(value.map(|v| v.value().to_vec()))
    }

    fn set(&self, key: &str, value: &[u8]) -> KVResult<()> {
        let tx = self.db.begin_write().map_err(KVError::storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(KVError::storage)?;
            table.insert(key, value).map_err(KVError::storage)?;
        }
        tx.commit().map_err(KVError::storage)
    }

    fn delete(&self, key: &str) -> KVResult<()> {
        let tx = self.db.begin_write().map_err(KVError::storage)?;
        {
            let mut table = tx.open_table(TABLE).map_err(KVError::storage)?;
            table.remove(key).map_err(KVError::storage)?;
        }
        tx.commit().map_err(KVError::storage)
    }

    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>> {
        let tx = self.db.begin_read().map_err(KVError::storage)?;
        let table = tx.open_table(TABLE).map_err(KVError::storage)?;

        let mut results = Vec::new();
        for item in table.range(prefix..).map_err(KVError::storage)? {
            let (key, value) = item.map_err(KVError::storage)?;
            let key = key.value();
            if !key.starts_with(prefix) {
                break;
            }
            results.push((key.to_string(), value.value().to_vec()));
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_redb_basic() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("phonic.redb")).unwrap();

        store.set("calibration/m", b"value1").unwrap();
        assert_eq!(
            store.get("calibration/m").unwrap(),
            Some(b"value1".to_vec())
        );

        store.delete("calibration/m").unwrap();
        assert_eq!(store.get("calibration/m").unwrap(), None);
    }

    #[test]
    fn test_redb_scan() {
        let dir = tempdir().unwrap();
        let store = RedbStore::open(dir.path().join("phonic.redb")).unwrap();

        store.set("calibration/a", b"1").unwrap();
        store.set("calibration/b", b"2").unwrap();
        store.set("clips/c", b"3").unwrap();

        let results = store.scan("calibration/").unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0, "calibration/a");
    }

    #[test]
    fn test_redb_reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("phonic.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.set("calibration/s", b"kept").unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert_eq!(store.get("calibration/s").unwrap(), Some(b"kept".to_vec()));
    }
}
