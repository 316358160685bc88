//! Persisted record shapes.
//!
//! Records are immutable once written and carry an expiry instant the
//! storage layer's retention sweep can act on. Telemetry and alerts are
//! keyed by `{device_id}:{timestamp}`; commands by request id.

use serde::{Deserialize, Serialize};

use crate::storage::JsonMap;

/// One telemetry reading as persisted. Identified by (device_id, timestamp).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub device_id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub device_type: String,
    pub payload: JsonMap,
    /// Unix seconds. Zero means "not set"; the store stamps a default
    /// before marshaling.
    #[serde(default)]
    pub expires_at: i64,
}

impl TelemetryRecord {
    /// Storage key within the telemetry table.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.device_id, self.timestamp)
    }
}

/// One device alert as persisted. Severity is validated non-empty before
/// the record is constructed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub device_id: String,
    pub timestamp: i64,
    #[serde(rename = "type")]
    pub device_type: String,
    pub severity: String,
    pub payload: JsonMap,
    #[serde(default)]
    pub expires_at: i64,
}

impl AlertRecord {
    /// Storage key within the alerts table.
    pub fn storage_key(&self) -> String {
        format!("{}:{}", self.device_id, self.timestamp)
    }
}

/// A command issued to a device. Written as-is, no reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub request_id: String,
    pub device_id: String,
    #[serde(default)]
    pub timestamp: i64,
    pub action: String,
    #[serde(default)]
    pub parameters: JsonMap,
    #[serde(default)]
    pub expires_at: i64,
}
