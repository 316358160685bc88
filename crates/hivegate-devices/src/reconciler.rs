//! The device state reconciler.
//!
//! Sole owner of the read-modify-write of a device's state row. Every
//! write is conditional on the stored `last_seen_at` being absent or not
//! newer than the incoming event timestamp, so ordering is by event time
//! rather than arrival time: a delayed-but-older message cannot clobber a
//! newer state that already arrived. A condition rejection means a newer
//! state already won and resolves as a successful no-op.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use hivegate_core::records::TelemetryRecord;
use hivegate_core::state::{fields, ConnectivityStatus, DeviceState};
use hivegate_core::storage::{
    ConditionalWrite, JsonMap, StorageError, TableBackend, WriteCondition,
};

use crate::rules::RuleTable;
use crate::state::connection_status;

/// Reconciles per-device state records from accepted messages.
#[derive(Clone)]
pub struct StateReconciler {
    backend: Arc<dyn TableBackend>,
    table: String,
    rules: Arc<RuleTable>,
}

impl StateReconciler {
    pub fn new(backend: Arc<dyn TableBackend>, table: impl Into<String>, rules: Arc<RuleTable>) -> Self {
        Self {
            backend,
            table: table.into(),
            rules,
        }
    }

    /// Apply one telemetry record: derive operational state and health via
    /// the rule table, mark the device online, and advance `last_seen_at`
    /// to the record's event timestamp under the ordering condition.
    pub async fn reconcile_from_telemetry(
        &self,
        record: &TelemetryRecord,
    ) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();
        let (operational, health) = self.rules.derive_state(&record.device_type, &record.payload);

        let mut patch = JsonMap::new();
        patch.insert(fields::DEVICE_ID.into(), json!(record.device_id));
        patch.insert(fields::DEVICE_TYPE.into(), json!(record.device_type));
        patch.insert(fields::STATUS.into(), json!(ConnectivityStatus::Online.as_str()));
        patch.insert(fields::OPERATIONAL_STATE.into(), json!(operational));
        patch.insert(fields::HEALTH.into(), json!(health.as_str()));
        patch.insert(fields::LAST_SEEN_AT.into(), json!(record.timestamp));
        patch.insert(fields::UPDATED_AT.into(), json!(now));

        let outcome = self.backend.merge_fields(
            &self.table,
            &record.device_id,
            &patch,
            &WriteCondition::NumberAbsentOrLe {
                field: fields::LAST_SEEN_AT,
                limit: record.timestamp,
            },
        )?;

        if outcome == ConditionalWrite::Rejected {
            debug!(
                device_id = %record.device_id,
                timestamp = record.timestamp,
                "device state already newer, skipping update"
            );
        }

        Ok(())
    }

    /// Apply a liveness-only update: mark the device online and advance
    /// `last_seen_at`, leaving operational state and health untouched.
    /// Used for alerts, which prove liveness without carrying the sensor
    /// payload needed to re-derive semantics.
    pub async fn reconcile_heartbeat(
        &self,
        device_id: &str,
        event_timestamp: i64,
    ) -> Result<(), StorageError> {
        let now = Utc::now().timestamp();

        let mut patch = JsonMap::new();
        patch.insert(fields::DEVICE_ID.into(), json!(device_id));
        patch.insert(fields::STATUS.into(), json!(ConnectivityStatus::Online.as_str()));
        patch.insert(fields::LAST_SEEN_AT.into(), json!(event_timestamp));
        patch.insert(fields::UPDATED_AT.into(), json!(now));

        let outcome = self.backend.merge_fields(
            &self.table,
            device_id,
            &patch,
            &WriteCondition::NumberAbsentOrLe {
                field: fields::LAST_SEEN_AT,
                limit: event_timestamp,
            },
        )?;

        if outcome == ConditionalWrite::Rejected {
            debug!(device_id = %device_id, "heartbeat older than stored state, skipping");
        }

        Ok(())
    }

    /// Read a device's state with connectivity derived from the staleness
    /// rule. Returns `None` for devices that have never reported.
    pub async fn get(&self, device_id: &str) -> Result<Option<DeviceState>, StorageError> {
        let Some(bytes) = self.backend.get(&self.table, device_id)? else {
            return Ok(None);
        };

        let mut state: DeviceState = serde_json::from_slice(&bytes)?;
        state.status = connection_status(state.last_seen_at, Utc::now().timestamp());
        Ok(Some(state))
    }
}
