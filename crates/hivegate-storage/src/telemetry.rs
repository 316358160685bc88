//! Telemetry persistence.
//!
//! Point saves and the resilient batch writer: batches are partitioned
//! into chunks bounded by the backend's per-request item limit, and any
//! items the backend declines are retried with exponential backoff.
//! Chunks are written sequentially; retries only resend the declined
//! subset. Backoff waits observe the caller's cancellation token.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use hivegate_core::config::limits::TELEMETRY_TTL;
use hivegate_core::records::TelemetryRecord;
use hivegate_core::storage::{BatchPut, StorageError, TableBackend};

/// Hard per-request item limit of the storage backend.
const BACKEND_BATCH_LIMIT: usize = 25;

/// Retries for unprocessed items within one chunk.
const MAX_BATCH_RETRIES: u32 = 3;

/// First retry backoff; doubles on each subsequent retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(100);

/// Store for immutable telemetry records.
#[derive(Clone)]
pub struct TelemetryStore {
    backend: Arc<dyn TableBackend>,
    table: String,
}

impl TelemetryStore {
    pub fn new(backend: Arc<dyn TableBackend>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
        }
    }

    /// Persist a single record, stamping the default expiry if unset.
    pub async fn save(&self, mut record: TelemetryRecord) -> Result<(), StorageError> {
        if record.expires_at == 0 {
            record.expires_at = default_expiry();
        }

        let bytes = serde_json::to_vec(&record)?;
        self.backend.put(&self.table, &record.storage_key(), &bytes)
    }

    /// Persist a set of records as one unit.
    ///
    /// Expiry defaults are stamped before marshaling so retried
    /// sub-batches reuse them. Fails if any chunk still has unprocessed
    /// items after the retry budget, or if `cancel` fires during a
    /// backoff wait.
    pub async fn save_batch(
        &self,
        records: Vec<TelemetryRecord>,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        if records.is_empty() {
            return Ok(());
        }

        let expiry = default_expiry();
        let mut items = Vec::with_capacity(records.len());
        for mut record in records {
            if record.expires_at == 0 {
                record.expires_at = expiry;
            }
            let key = record.storage_key();
            items.push(BatchPut::new(key, serde_json::to_vec(&record)?));
        }

        for chunk in items.chunks(BACKEND_BATCH_LIMIT) {
            self.write_chunk_with_retry(chunk.to_vec(), cancel).await?;
        }

        Ok(())
    }

    /// Write one chunk, retrying the unprocessed subset with exponential
    /// backoff until it drains or the retry budget is exhausted.
    async fn write_chunk_with_retry(
        &self,
        mut pending: Vec<BatchPut>,
        cancel: &CancellationToken,
    ) -> Result<(), StorageError> {
        for attempt in 0..=MAX_BATCH_RETRIES {
            if attempt > 0 {
                let backoff = RETRY_BASE_DELAY * 2u32.pow(attempt - 1);
                tokio::select! {
                    _ = cancel.cancelled() => return Err(StorageError::Cancelled),
                    _ = tokio::time::sleep(backoff) => {}
                }
            }

            pending = self.backend.put_batch(&self.table, pending)?;
            if pending.is_empty() {
                return Ok(());
            }

            warn!(
                remaining = pending.len(),
                attempt = attempt + 1,
                "batch write left unprocessed items"
            );
        }

        Err(StorageError::Unprocessed {
            remaining: pending.len(),
            retries: MAX_BATCH_RETRIES,
        })
    }

    /// Read back a record by its identity. Used by queries and tests.
    pub async fn get(
        &self,
        device_id: &str,
        timestamp: i64,
    ) -> Result<Option<TelemetryRecord>, StorageError> {
        let key = format!("{device_id}:{timestamp}");
        match self.backend.get(&self.table, &key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All stored readings for a device, in timestamp key order.
    pub async fn list_for_device(
        &self,
        device_id: &str,
    ) -> Result<Vec<TelemetryRecord>, StorageError> {
        let prefix = format!("{device_id}:");
        let mut records = Vec::new();
        for (_, bytes) in self.backend.scan_prefix(&self.table, &prefix)? {
            records.push(serde_json::from_slice(&bytes)?);
        }
        Ok(records)
    }
}

fn default_expiry() -> i64 {
    Utc::now().timestamp() + TELEMETRY_TTL.as_secs() as i64
}
