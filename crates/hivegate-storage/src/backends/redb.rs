//! Redb table backend.
//!
//! Persistent storage over a single unified redb table with namespaced
//! `table:key` keys. Conditional merges evaluate their condition inside
//! the write transaction, which makes them atomic per key.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use hivegate_core::storage::{
    BatchPut, ConditionalWrite, JsonMap, Result as CoreResult, TableBackend, WriteCondition,
};

use crate::error::Result;

// Single unified table for all data, using namespaced "table_name:key" keys.
const UNIFIED_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("hivegate_storage");

/// Configuration for `RedbBackend`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedbBackendConfig {
    /// Path to the database file.
    pub path: String,

    /// Create parent directories if they don't exist.
    #[serde(default = "default_create_dirs")]
    pub create_dirs: bool,
}

fn default_create_dirs() -> bool {
    true
}

impl RedbBackendConfig {
    /// Create a new config with the given path.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            create_dirs: true,
        }
    }
}

/// Create a namespaced key for the unified table.
fn make_key(table: &str, key: &str) -> String {
    let mut result = String::with_capacity(table.len() + key.len() + 1);
    result.push_str(table);
    result.push(':');
    result.push_str(key);
    result
}

/// redb-based persistent table backend.
pub struct RedbBackend {
    db: Arc<Database>,
    path: String,
}

impl RedbBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: RedbBackendConfig) -> Result<Self> {
        let path_ref = Path::new(&config.path);
        if config.create_dirs {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }

        let db = if path_ref.exists() {
            Database::open(path_ref)?
        } else {
            Database::create(path_ref)?
        };

        // Create the unified table up front so read transactions never
        // race a missing table on a fresh database.
        let txn = db.begin_write()?;
        {
            let _ = txn.open_table(UNIFIED_TABLE)?;
        }
        txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            path: config.path,
        })
    }

    /// Open or create a backend at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(RedbBackendConfig::new(
            path.as_ref().to_string_lossy().to_string(),
        ))
    }

    /// The storage path.
    pub fn path(&self) -> &str {
        &self.path
    }

    fn put_inner(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(UNIFIED_TABLE)?;
            t.insert(namespaced.as_str(), value)?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get_inner(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_read()?;
        let t = txn.open_table(UNIFIED_TABLE)?;
        Ok(t.get(namespaced.as_str())?.map(|v| v.value().to_vec()))
    }

    fn merge_inner(
        &self,
        table: &str,
        key: &str,
        patch: &JsonMap,
        condition: &WriteCondition,
    ) -> Result<ConditionalWrite> {
        let namespaced = make_key(table, key);
        let txn = self.db.begin_write()?;
        let outcome = {
            let mut t = txn.open_table(UNIFIED_TABLE)?;
            let existing: Option<JsonMap> = match t.get(namespaced.as_str())? {
                Some(guard) => Some(serde_json::from_slice(guard.value())?),
                None => None,
            };

            if condition.allows(existing.as_ref()) {
                let mut doc = existing.unwrap_or_default();
                for (field, value) in patch {
                    doc.insert(field.clone(), value.clone());
                }
                let bytes = serde_json::to_vec(&doc)?;
                t.insert(namespaced.as_str(), bytes.as_slice())?;
                ConditionalWrite::Applied
            } else {
                ConditionalWrite::Rejected
            }
        };
        txn.commit()?;
        Ok(outcome)
    }

    fn put_batch_inner(&self, table: &str, items: Vec<BatchPut>) -> Result<Vec<BatchPut>> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(UNIFIED_TABLE)?;
            for item in &items {
                let namespaced = make_key(table, &item.key);
                t.insert(namespaced.as_str(), item.value.as_slice())?;
            }
        }
        txn.commit()?;
        // The transaction either commits whole or errors; redb has no
        // partial-application path, so nothing is ever left unprocessed.
        Ok(Vec::new())
    }

    fn scan_inner(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let namespaced_prefix = make_key(table, prefix);
        let strip = table.len() + 1;

        let txn = self.db.begin_read()?;
        let t = txn.open_table(UNIFIED_TABLE)?;

        let mut results = Vec::new();
        for entry in t.range(namespaced_prefix.as_str()..)? {
            let (key, value) = entry?;
            let key = key.value();
            if !key.starts_with(namespaced_prefix.as_str()) {
                break;
            }
            results.push((key[strip..].to_string(), value.value().to_vec()));
        }
        Ok(results)
    }
}

impl TableBackend for RedbBackend {
    fn put(&self, table: &str, key: &str, value: &[u8]) -> CoreResult<()> {
        self.put_inner(table, key, value).map_err(Into::into)
    }

    fn get(&self, table: &str, key: &str) -> CoreResult<Option<Vec<u8>>> {
        self.get_inner(table, key).map_err(Into::into)
    }

    fn merge_fields(
        &self,
        table: &str,
        key: &str,
        patch: &JsonMap,
        condition: &WriteCondition,
    ) -> CoreResult<ConditionalWrite> {
        self.merge_inner(table, key, patch, condition)
            .map_err(Into::into)
    }

    fn put_batch(&self, table: &str, items: Vec<BatchPut>) -> CoreResult<Vec<BatchPut>> {
        self.put_batch_inner(table, items).map_err(Into::into)
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> CoreResult<Vec<(String, Vec<u8>)>> {
        self.scan_inner(table, prefix).map_err(Into::into)
    }

    fn is_persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_backend() -> (tempfile::TempDir, RedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("test.redb")).unwrap();
        (dir, backend)
    }

    #[test]
    fn put_get_round_trip() {
        let (_dir, backend) = temp_backend();
        backend.put_inner("t", "k", b"v").unwrap();
        assert_eq!(backend.get_inner("t", "k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.get_inner("t", "missing").unwrap(), None);
    }

    #[test]
    fn fresh_database_reads_cleanly() {
        let (_dir, backend) = temp_backend();
        assert_eq!(backend.get_inner("t", "k").unwrap(), None);
        assert!(backend.scan_inner("t", "").unwrap().is_empty());
    }

    #[test]
    fn tables_are_namespaced() {
        let (_dir, backend) = temp_backend();
        backend.put_inner("a", "k", b"1").unwrap();
        backend.put_inner("b", "k", b"2").unwrap();
        assert_eq!(backend.get_inner("a", "k").unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.get_inner("b", "k").unwrap(), Some(b"2".to_vec()));
    }

    #[test]
    fn conditional_merge_respects_stored_order() {
        let (_dir, backend) = temp_backend();
        let mut newer = JsonMap::new();
        newer.insert("last_seen_at".into(), json!(200));
        backend
            .merge_inner("state", "dev-1", &newer, &WriteCondition::None)
            .unwrap();

        let mut older = JsonMap::new();
        older.insert("last_seen_at".into(), json!(100));
        let outcome = backend
            .merge_inner(
                "state",
                "dev-1",
                &older,
                &WriteCondition::NumberAbsentOrLe {
                    field: "last_seen_at",
                    limit: 100,
                },
            )
            .unwrap();
        assert_eq!(outcome, ConditionalWrite::Rejected);
    }

    #[test]
    fn scan_stops_at_prefix_boundary() {
        let (_dir, backend) = temp_backend();
        backend.put_inner("alerts", "HIGH:1", b"a").unwrap();
        backend.put_inner("alerts", "HIGHER:1", b"b").unwrap();
        backend.put_inner("alerts", "LOW:1", b"c").unwrap();

        let hits = backend.scan_inner("alerts", "HIGH:").unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, "HIGH:1");
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put_inner("t", "k", b"v").unwrap();
        }
        let backend = RedbBackend::open(&path).unwrap();
        assert_eq!(backend.get_inner("t", "k").unwrap(), Some(b"v".to_vec()));
        assert!(backend.is_persistent());
    }
}
