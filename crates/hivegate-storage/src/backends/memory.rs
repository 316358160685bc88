//! In-memory table backend.
//!
//! Mutex-guarded maps with the same semantics as the persistent backend.
//! Used by tests and `--memory` local runs; nothing survives a restart.

use std::collections::{BTreeMap, HashMap};

use parking_lot::Mutex;

use hivegate_core::storage::{
    BatchPut, ConditionalWrite, JsonMap, Result, TableBackend, WriteCondition,
};

/// Non-persistent backend over in-process maps.
#[derive(Default)]
pub struct MemoryBackend {
    // table name -> ordered key space; the Mutex spans condition
    // evaluation and the write, which is what makes merge_fields atomic.
    tables: Mutex<HashMap<String, BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries in a table. Test helper.
    pub fn len(&self, table: &str) -> usize {
        self.tables
            .lock()
            .get(table)
            .map(|t| t.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, table: &str) -> bool {
        self.len(table) == 0
    }
}

impl TableBackend for MemoryBackend {
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<()> {
        let mut tables = self.tables.lock();
        tables
            .entry(table.to_string())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let tables = self.tables.lock();
        Ok(tables.get(table).and_then(|t| t.get(key)).cloned())
    }

    fn merge_fields(
        &self,
        table: &str,
        key: &str,
        patch: &JsonMap,
        condition: &WriteCondition,
    ) -> Result<ConditionalWrite> {
        let mut tables = self.tables.lock();
        let entries = tables.entry(table.to_string()).or_default();

        let existing: Option<JsonMap> = match entries.get(key) {
            Some(bytes) => Some(serde_json::from_slice(bytes)?),
            None => None,
        };

        if !condition.allows(existing.as_ref()) {
            return Ok(ConditionalWrite::Rejected);
        }

        let mut doc = existing.unwrap_or_default();
        for (field, value) in patch {
            doc.insert(field.clone(), value.clone());
        }
        entries.insert(key.to_string(), serde_json::to_vec(&doc)?);
        Ok(ConditionalWrite::Applied)
    }

    fn put_batch(&self, table: &str, items: Vec<BatchPut>) -> Result<Vec<BatchPut>> {
        let mut tables = self.tables.lock();
        let entries = tables.entry(table.to_string()).or_default();
        for item in items {
            entries.insert(item.key, item.value);
        }
        Ok(Vec::new())
    }

    fn scan_prefix(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let tables = self.tables.lock();
        let Some(entries) = tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(entries
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn is_persistent(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn put_get_round_trip() {
        let backend = MemoryBackend::new();
        backend.put("t", "k", b"v").unwrap();
        assert_eq!(backend.get("t", "k").unwrap(), Some(b"v".to_vec()));
        assert_eq!(backend.get("t", "missing").unwrap(), None);
        assert_eq!(backend.get("other", "k").unwrap(), None);
    }

    #[test]
    fn merge_creates_document_when_absent() {
        let backend = MemoryBackend::new();
        let mut patch = JsonMap::new();
        patch.insert("status".into(), json!("ONLINE"));
        patch.insert("last_seen_at".into(), json!(100));

        let outcome = backend
            .merge_fields(
                "state",
                "dev-1",
                &patch,
                &WriteCondition::NumberAbsentOrLe {
                    field: "last_seen_at",
                    limit: 100,
                },
            )
            .unwrap();
        assert_eq!(outcome, ConditionalWrite::Applied);

        let doc: JsonMap =
            serde_json::from_slice(&backend.get("state", "dev-1").unwrap().unwrap()).unwrap();
        assert_eq!(doc.get("status"), Some(&json!("ONLINE")));
    }

    #[test]
    fn merge_preserves_fields_outside_the_patch() {
        let backend = MemoryBackend::new();
        let mut first = JsonMap::new();
        first.insert("health".into(), json!("HEALTHY"));
        first.insert("last_seen_at".into(), json!(100));
        backend
            .merge_fields("state", "dev-1", &first, &WriteCondition::None)
            .unwrap();

        let mut second = JsonMap::new();
        second.insert("last_seen_at".into(), json!(200));
        backend
            .merge_fields("state", "dev-1", &second, &WriteCondition::None)
            .unwrap();

        let doc: JsonMap =
            serde_json::from_slice(&backend.get("state", "dev-1").unwrap().unwrap()).unwrap();
        assert_eq!(doc.get("health"), Some(&json!("HEALTHY")));
        assert_eq!(doc.get("last_seen_at"), Some(&json!(200)));
    }

    #[test]
    fn merge_rejects_when_stored_value_is_newer() {
        let backend = MemoryBackend::new();
        let mut patch = JsonMap::new();
        patch.insert("last_seen_at".into(), json!(200));
        backend
            .merge_fields("state", "dev-1", &patch, &WriteCondition::None)
            .unwrap();

        let mut older = JsonMap::new();
        older.insert("last_seen_at".into(), json!(150));
        let outcome = backend
            .merge_fields(
                "state",
                "dev-1",
                &older,
                &WriteCondition::NumberAbsentOrLe {
                    field: "last_seen_at",
                    limit: 150,
                },
            )
            .unwrap();
        assert_eq!(outcome, ConditionalWrite::Rejected);

        let doc: JsonMap =
            serde_json::from_slice(&backend.get("state", "dev-1").unwrap().unwrap()).unwrap();
        assert_eq!(doc.get("last_seen_at"), Some(&json!(200)));
    }

    #[test]
    fn scan_prefix_returns_only_matching_keys_in_order() {
        let backend = MemoryBackend::new();
        backend.put("alerts", "HIGH:001:dev-1", b"a").unwrap();
        backend.put("alerts", "HIGH:002:dev-2", b"b").unwrap();
        backend.put("alerts", "LOW:001:dev-3", b"c").unwrap();

        let hits = backend.scan_prefix("alerts", "HIGH:").unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, "HIGH:001:dev-1");
        assert_eq!(hits[1].0, "HIGH:002:dev-2");
    }

    #[test]
    fn put_batch_applies_everything() {
        let backend = MemoryBackend::new();
        let items = (0..10)
            .map(|i| BatchPut::new(format!("k{i}"), vec![i as u8]))
            .collect();
        let unprocessed = backend.put_batch("t", items).unwrap();
        assert!(unprocessed.is_empty());
        assert_eq!(backend.len("t"), 10);
    }
}
