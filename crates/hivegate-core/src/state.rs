//! The per-device state record.
//!
//! One row per device, upserted in place by the reconciler and never
//! explicitly deleted. Stored as a JSON document so the backend can
//! evaluate the event-time ordering condition on `last_seen_at`.

use serde::{Deserialize, Serialize};

/// Sentinel operational state: the payload lacked the fields the device
/// type requires. Rules return this instead of erroring; the validator
/// treats it as a payload/device-type mismatch.
pub const UNKNOWN_STATE: &str = "UNKNOWN";

/// Device connectivity, as stored and as derived at read time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConnectivityStatus {
    Online,
    Offline,
}

impl ConnectivityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse device wellness, derived from the operational state by the
/// device type's rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Healthy,
    /// Conservative default: absent or unrecognized states are never
    /// healthy by omission.
    #[default]
    Degraded,
    Critical,
}

impl Health {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "HEALTHY",
            Self::Degraded => "DEGRADED",
            Self::Critical => "CRITICAL",
        }
    }
}

impl std::fmt::Display for Health {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known operational snapshot of one device.
///
/// A device whose first message was an alert has a liveness-only record:
/// type and operational state default to unknown, health to degraded,
/// until telemetry arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceState {
    pub device_id: String,
    #[serde(rename = "type", default)]
    pub device_type: String,
    pub status: ConnectivityStatus,
    /// Device-type-specific state string (`HOT`, `LOCKED`, ...).
    #[serde(default = "unknown_state")]
    pub operational_state: String,
    #[serde(default)]
    pub health: Health,
    /// Event timestamp of the newest message applied, unix seconds.
    pub last_seen_at: i64,
    /// Wall-clock instant of the last applied write, unix seconds.
    pub updated_at: i64,
}

fn unknown_state() -> String {
    UNKNOWN_STATE.to_string()
}

/// Field names of the stored device-state document, shared between the
/// reconciler's merge patches and the backend's condition evaluation.
pub mod fields {
    pub const DEVICE_ID: &str = "device_id";
    pub const DEVICE_TYPE: &str = "type";
    pub const STATUS: &str = "status";
    pub const OPERATIONAL_STATE: &str = "operational_state";
    pub const HEALTH: &str = "health";
    pub const LAST_SEEN_AT: &str = "last_seen_at";
    pub const UPDATED_AT: &str = "updated_at";
}
