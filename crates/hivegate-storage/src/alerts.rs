//! Alert persistence and the severity index.
//!
//! Alerts are stored under `{device_id}:{timestamp}`; a severity index
//! table is maintained at write time so `query_by_severity` stays a
//! single prefix scan.

use std::sync::Arc;

use chrono::Utc;

use hivegate_core::config::limits::ALERT_TTL;
use hivegate_core::records::AlertRecord;
use hivegate_core::storage::{StorageError, TableBackend};

/// Store for device alerts.
#[derive(Clone)]
pub struct AlertStore {
    backend: Arc<dyn TableBackend>,
    table: String,
    index_table: String,
}

impl AlertStore {
    pub fn new(backend: Arc<dyn TableBackend>, table: impl Into<String>) -> Self {
        let table = table.into();
        let index_table = format!("{table}_severity");
        Self {
            backend,
            table,
            index_table,
        }
    }

    /// Persist an alert, stamping the default expiry if unset, and write
    /// its severity index entry.
    pub async fn save(&self, mut alert: AlertRecord) -> Result<(), StorageError> {
        if alert.expires_at == 0 {
            alert.expires_at = Utc::now().timestamp() + ALERT_TTL.as_secs() as i64;
        }

        let bytes = serde_json::to_vec(&alert)?;
        self.backend
            .put(&self.table, &alert.storage_key(), &bytes)?;
        self.backend
            .put(&self.index_table, &index_key(&alert), &bytes)
    }

    /// Alerts with the given severity, newest first.
    pub async fn query_by_severity(
        &self,
        severity: &str,
        limit: usize,
    ) -> Result<Vec<AlertRecord>, StorageError> {
        let prefix = format!("{severity}:");
        let mut alerts: Vec<AlertRecord> = Vec::new();
        for (_, bytes) in self.backend.scan_prefix(&self.index_table, &prefix)? {
            alerts.push(serde_json::from_slice(&bytes)?);
        }

        alerts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        alerts.truncate(limit);
        Ok(alerts)
    }

    /// Read back an alert by its identity.
    pub async fn get(
        &self,
        device_id: &str,
        timestamp: i64,
    ) -> Result<Option<AlertRecord>, StorageError> {
        let key = format!("{device_id}:{timestamp}");
        match self.backend.get(&self.table, &key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

/// Index key: severity first so one prefix scan covers it, zero-padded
/// timestamp so key order is chronological within a severity.
fn index_key(alert: &AlertRecord) -> String {
    format!(
        "{}:{:020}:{}",
        alert.severity, alert.timestamp, alert.device_id
    )
}
