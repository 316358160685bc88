//! Storage backend capability trait.
//!
//! The ingestion core depends only on this surface: point put/get,
//! a conditional field-merge update evaluated atomically per key, a
//! chunk-sized batch put that reports the items the backend declined to
//! apply, and a prefix scan for index reads. Concrete backends (redb,
//! memory) live in `hivegate-storage`.

use serde_json::Value;
use thiserror::Error;

/// JSON object map, the open-ended payload shape used throughout.
pub type JsonMap = serde_json::Map<String, Value>;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Storage error types.
#[derive(Debug, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Backend error.
    #[error("backend error: {0}")]
    Backend(String),

    /// The caller's cancellation token fired during a retry wait.
    #[error("operation cancelled")]
    Cancelled,

    /// A batch write exhausted its retry budget with items still pending.
    #[error("batch write: {remaining} items still unprocessed after {retries} retries")]
    Unprocessed { remaining: usize, retries: u32 },
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Condition guarding a conditional write, evaluated by the backend against
/// the stored document atomically with the write itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Unconditional write.
    None,
    /// Apply only when the stored document lacks `field`, or its numeric
    /// value is at most `limit`. This is the last-write-wins-by-event-time
    /// guard: a delayed-but-older update loses to a newer one that already
    /// arrived.
    NumberAbsentOrLe { field: &'static str, limit: i64 },
}

impl WriteCondition {
    /// Evaluate the condition against the currently stored document.
    /// A missing document always passes.
    pub fn allows(&self, existing: Option<&JsonMap>) -> bool {
        match self {
            WriteCondition::None => true,
            WriteCondition::NumberAbsentOrLe { field, limit } => match existing {
                None => true,
                Some(doc) => match doc.get(*field).and_then(Value::as_i64) {
                    None => true,
                    Some(stored) => stored <= *limit,
                },
            },
        }
    }
}

/// Outcome of a conditional write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConditionalWrite {
    /// The condition held and the write was applied.
    Applied,
    /// The condition failed; nothing was written. Not an error: a newer
    /// state already won.
    Rejected,
}

/// One item of a batch put.
#[derive(Debug, Clone)]
pub struct BatchPut {
    pub key: String,
    pub value: Vec<u8>,
}

impl BatchPut {
    pub fn new(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            value,
        }
    }
}

/// Core table backend trait.
///
/// Implementations must be safe for concurrent use by in-flight requests;
/// `merge_fields` in particular must evaluate its condition and apply the
/// patch atomically per key.
pub trait TableBackend: Send + Sync {
    /// Write a value under a key in the named table.
    fn put(&self, table: &str, key: &str, value: &[u8]) -> Result<()>;

    /// Read a value by key from the named table.
    fn get(&self, table: &str, key: &str) -> Result<Option<Vec<u8>>>;

    /// Merge the given top-level fields into the JSON document stored under
    /// `key`, creating the document if absent, provided `condition` holds
    /// against the stored document. Condition evaluation and the write are
    /// atomic per key.
    fn merge_fields(
        &self,
        table: &str,
        key: &str,
        patch: &JsonMap,
        condition: &WriteCondition,
    ) -> Result<ConditionalWrite>;

    /// Write a batch of items in one request and return the subset the
    /// backend declined to apply (e.g. under throttling). An empty return
    /// means every item was persisted. Callers must not exceed the
    /// backend's per-request item limit.
    fn put_batch(&self, table: &str, items: Vec<BatchPut>) -> Result<Vec<BatchPut>>;

    /// Scan entries whose key starts with `prefix`, in key order.
    fn scan_prefix(&self, table: &str, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    /// Whether this backend persists data across restarts.
    fn is_persistent(&self) -> bool;
}
