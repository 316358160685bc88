//! Command record persistence.
//!
//! A plain point write keyed by request id. Commands carry no
//! reconciliation logic; the store only defaults timestamp and expiry.

use std::sync::Arc;

use chrono::Utc;

use hivegate_core::config::limits::COMMAND_TTL;
use hivegate_core::records::CommandRecord;
use hivegate_core::storage::{StorageError, TableBackend};

/// Store for device command records.
#[derive(Clone)]
pub struct CommandStore {
    backend: Arc<dyn TableBackend>,
    table: String,
}

impl CommandStore {
    pub fn new(backend: Arc<dyn TableBackend>, table: impl Into<String>) -> Self {
        Self {
            backend,
            table: table.into(),
        }
    }

    /// Persist a command, defaulting timestamp and expiry when unset.
    pub async fn save(&self, mut command: CommandRecord) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();
        if command.timestamp == 0 {
            command.timestamp = now;
        }
        if command.expires_at == 0 {
            command.expires_at = now + COMMAND_TTL.as_secs() as i64;
        }

        let bytes = serde_json::to_vec(&command)?;
        self.backend.put(&self.table, &command.request_id, &bytes)
    }

    /// Read back a command by request id.
    pub async fn get(&self, request_id: &str) -> Result<Option<CommandRecord>, StorageError> {
        match self.backend.get(&self.table, request_id)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
