//! The ingestion orchestrator.
//!
//! Routes a validated message to telemetry or alert handling, invokes
//! persistence and state reconciliation, and translates collaborator
//! failures into the ingestion error taxonomy. The whole request runs
//! inside a failure boundary: classified validation errors pass through,
//! any unexpected fault is caught and converted into one opaque internal
//! error.

use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use hivegate_core::envelope::{BatchEnvelope, Envelope, MessageCategory};
use hivegate_core::error::{Error, Result};
use hivegate_core::records::{AlertRecord, TelemetryRecord};
use hivegate_core::state::UNKNOWN_STATE;
use hivegate_devices::{RuleTable, StateReconciler};
use hivegate_storage::{AlertStore, TelemetryStore};

use crate::validator::{MessageValidator, ValidatedEnvelope, ValidatedMessage};

/// What one accepted request did.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub device_id: String,
    pub category: MessageCategory,
    /// Records handed to persistence.
    pub persisted: usize,
    /// Batch readings dropped by the skip path.
    pub skipped: usize,
}

/// Orchestrates validation, persistence, and state reconciliation for one
/// request at a time. Holds its collaborators by construction; no shared
/// mutable state beyond them.
pub struct IngestionService {
    validator: MessageValidator,
    rules: Arc<RuleTable>,
    telemetry: TelemetryStore,
    alerts: AlertStore,
    reconciler: StateReconciler,
}

impl IngestionService {
    pub fn new(
        validator: MessageValidator,
        rules: Arc<RuleTable>,
        telemetry: TelemetryStore,
        alerts: AlertStore,
        reconciler: StateReconciler,
    ) -> Self {
        Self {
            validator,
            rules,
            telemetry,
            alerts,
            reconciler,
        }
    }

    /// Handle one raw event end to end.
    ///
    /// This is the failure boundary: a panic anywhere below is caught,
    /// logged with full detail, and converted into `Error::Internal` so
    /// the caller never observes a raw fault shape.
    pub async fn handle_event(
        &self,
        event: Value,
        cancel: CancellationToken,
    ) -> Result<IngestReport> {
        match AssertUnwindSafe(self.process(event, cancel))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => {
                error!(panic = %panic_message(&panic), "unexpected fault during ingestion");
                Err(Error::Internal)
            }
        }
    }

    async fn process(&self, event: Value, cancel: CancellationToken) -> Result<IngestReport> {
        let message = match self.validator.validate(&event) {
            Ok(message) => message,
            Err(err) => {
                log_validation_error(&err);
                return Err(err);
            }
        };

        let ValidatedMessage {
            device_id,
            category,
            envelope,
        } = message;

        match (category, envelope) {
            (MessageCategory::Telemetry, ValidatedEnvelope::Single(envelope)) => {
                self.handle_single_telemetry(device_id, envelope).await
            }
            (MessageCategory::Telemetry, ValidatedEnvelope::Batch(envelope)) => {
                self.handle_batch_telemetry(device_id, envelope, &cancel)
                    .await
            }
            (MessageCategory::Alerts, ValidatedEnvelope::Single(envelope)) => {
                self.handle_alert(device_id, envelope).await
            }
            // validation rejects batch alerts; this arm is the router's
            // defensive default
            (MessageCategory::Alerts, ValidatedEnvelope::Batch(_)) => {
                Err(Error::UnknownMessageType("batch alerts".into()))
            }
        }
    }

    async fn handle_single_telemetry(
        &self,
        device_id: String,
        envelope: Envelope,
    ) -> Result<IngestReport> {
        let record = TelemetryRecord {
            device_id: envelope.device_id,
            timestamp: envelope.timestamp,
            device_type: envelope.device_type,
            payload: envelope.payload,
            expires_at: 0,
        };

        info!(device_id = %device_id, "saving telemetry");

        if let Err(err) = self.telemetry.save(record.clone()).await {
            error!(device_id = %device_id, error = %err, "failed to save telemetry");
            return Err(err.into());
        }

        self.reconciler.reconcile_from_telemetry(&record).await?;

        Ok(IngestReport {
            device_id,
            category: MessageCategory::Telemetry,
            persisted: 1,
            skipped: 0,
        })
    }

    /// Batch path. Per-reading structural problems are skipped and
    /// counted rather than aborting the batch — defense in depth under
    /// the lenient policy, a second net under the strict one. State is
    /// reconciled once, from the latest-timestamp constructed reading;
    /// under a partial write failure this can run ahead of what is
    /// durably stored, which the reconciler's idempotent, monotonic
    /// writes make harmless.
    async fn handle_batch_telemetry(
        &self,
        device_id: String,
        envelope: BatchEnvelope,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        info!(
            device_id = %device_id,
            count = envelope.readings.len(),
            "processing batch telemetry"
        );

        let mut records: Vec<TelemetryRecord> = Vec::with_capacity(envelope.readings.len());
        let mut skipped = 0usize;

        for (index, reading) in envelope.readings.iter().enumerate() {
            // reading timestamp overrides the envelope timestamp
            let timestamp = if reading.timestamp > 0 {
                reading.timestamp
            } else {
                envelope.timestamp
            };

            if timestamp <= 0 {
                warn!(device_id = %device_id, index, "skipping reading without timestamp");
                skipped += 1;
                continue;
            }

            if reading.payload.is_empty() {
                warn!(device_id = %device_id, index, "skipping reading with empty payload");
                skipped += 1;
                continue;
            }

            let (operational, _) = self
                .rules
                .derive_state(&envelope.device_type, &reading.payload);
            if operational == UNKNOWN_STATE {
                warn!(device_id = %device_id, index, "skipping malformed payload in batch");
                skipped += 1;
                continue;
            }

            records.push(TelemetryRecord {
                device_id: device_id.clone(),
                timestamp,
                device_type: envelope.device_type.clone(),
                payload: reading.payload.clone(),
                expires_at: 0,
            });
        }

        if records.is_empty() {
            return Err(Error::InvalidPayload(
                "no valid telemetry readings saved".into(),
            ));
        }

        let latest = records.iter().max_by_key(|r| r.timestamp).cloned();
        let persisted = records.len();

        if let Err(err) = self.telemetry.save_batch(records, cancel).await {
            error!(device_id = %device_id, error = %err, "failed to save batch telemetry");
            return Err(err.into());
        }

        if let Some(latest) = latest {
            self.reconciler.reconcile_from_telemetry(&latest).await?;
        }

        Ok(IngestReport {
            device_id,
            category: MessageCategory::Telemetry,
            persisted,
            skipped,
        })
    }

    async fn handle_alert(&self, device_id: String, envelope: Envelope) -> Result<IngestReport> {
        // severity was validated non-empty upstream
        let severity = envelope
            .payload
            .get("severity")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        let alert = AlertRecord {
            device_id: envelope.device_id,
            timestamp: envelope.timestamp,
            device_type: envelope.device_type,
            severity,
            payload: envelope.payload,
            expires_at: 0,
        };

        info!(device_id = %device_id, severity = %alert.severity, "saving alert");

        if let Err(err) = self.alerts.save(alert.clone()).await {
            error!(device_id = %device_id, error = %err, "failed to save alert");
            return Err(err.into());
        }

        // alerts prove liveness only; operational state and health are
        // left to telemetry
        self.reconciler
            .reconcile_heartbeat(&device_id, alert.timestamp)
            .await?;

        Ok(IngestReport {
            device_id,
            category: MessageCategory::Alerts,
            persisted: 1,
            skipped: 0,
        })
    }
}

fn log_validation_error(err: &Error) {
    match err {
        Error::InvalidEvent(_) | Error::InvalidEnvelope(_) => {
            warn!(error = %err, "invalid message envelope")
        }
        Error::InvalidPayload(_) => warn!(error = %err, "invalid payload"),
        Error::InvalidTopic(_) => warn!(error = %err, "invalid topic"),
        _ => error!(error = %err, "unexpected validation error"),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
