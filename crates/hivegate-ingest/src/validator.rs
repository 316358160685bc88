//! Message validation.
//!
//! Turns a raw transport event into a validated, typed message or a
//! classified error. Each step short-circuits: event shape, topic,
//! envelope decode (with size ceilings enforced before the typed parse),
//! cross-validation against the topic, rule-table lookup, and
//! category-specific checks.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use hivegate_core::config::limits::{
    MAX_BATCH_PAYLOAD_BYTES, MAX_BATCH_READINGS, MAX_FUTURE_SKEW_SECS, MAX_SINGLE_PAYLOAD_BYTES,
};
use hivegate_core::config::BatchValidationPolicy;
use hivegate_core::envelope::{BatchEnvelope, Envelope, MessageCategory};
use hivegate_core::error::{Error, Result};
use hivegate_core::state::UNKNOWN_STATE;
use hivegate_core::storage::JsonMap;
use hivegate_devices::RuleTable;

use crate::batch;
use crate::topic::parse_topic;

/// A message that passed validation, with its envelope decoded into the
/// single or batch shape.
#[derive(Debug, Clone)]
pub struct ValidatedMessage {
    pub device_id: String,
    pub category: MessageCategory,
    pub envelope: ValidatedEnvelope,
}

/// Single-reading or batch envelope of a validated message.
#[derive(Debug, Clone)]
pub enum ValidatedEnvelope {
    Single(Envelope),
    Batch(BatchEnvelope),
}

/// Validates raw events against the rule table and the configured batch
/// policy.
pub struct MessageValidator {
    rules: Arc<RuleTable>,
    policy: BatchValidationPolicy,
}

impl MessageValidator {
    pub fn new(rules: Arc<RuleTable>, policy: BatchValidationPolicy) -> Self {
        Self { rules, policy }
    }

    pub fn policy(&self) -> BatchValidationPolicy {
        self.policy
    }

    /// Validate a raw event into a typed message.
    pub fn validate(&self, event: &Value) -> Result<ValidatedMessage> {
        self.validate_at(event, Utc::now().timestamp())
    }

    /// Validation against an explicit clock, for deterministic tests.
    pub fn validate_at(&self, event: &Value, now: i64) -> Result<ValidatedMessage> {
        let (topic, payload) = validate_event(event)?;
        let (device_id, category) = parse_topic(topic)?;

        if batch::is_batch_payload(payload) {
            if category != MessageCategory::Telemetry {
                return Err(Error::InvalidEvent(
                    "batch ingestion only supported for telemetry".into(),
                ));
            }

            let envelope = decode_batch_envelope(payload)?;
            self.validate_batch_envelope(&envelope, &device_id, now)?;

            return Ok(ValidatedMessage {
                device_id,
                category,
                envelope: ValidatedEnvelope::Batch(envelope),
            });
        }

        let envelope = decode_envelope(payload)?;
        validate_envelope(&envelope, &device_id, now)?;
        self.validate_payload(&envelope.device_type, &envelope.payload)?;

        if category == MessageCategory::Alerts {
            let severity = envelope.payload.get("severity").and_then(Value::as_str);
            match severity {
                Some(s) if !s.is_empty() => {}
                _ => {
                    return Err(Error::InvalidPayload(
                        "alert missing or invalid severity".into(),
                    ))
                }
            }
        }

        Ok(ValidatedMessage {
            device_id,
            category,
            envelope: ValidatedEnvelope::Single(envelope),
        })
    }

    /// Rule-table lookup plus operational-state extraction: the rule
    /// returning `UNKNOWN` is the sole signal of a payload/device-type
    /// mismatch.
    fn validate_payload(&self, device_type: &str, payload: &JsonMap) -> Result<()> {
        let Some(rule) = self.rules.get(device_type) else {
            return Err(Error::InvalidPayload("unknown device type".into()));
        };

        if rule.extract_operational(payload) == UNKNOWN_STATE {
            return Err(Error::InvalidPayload(
                "payload does not match device type".into(),
            ));
        }

        Ok(())
    }

    fn validate_batch_envelope(
        &self,
        envelope: &BatchEnvelope,
        topic_device_id: &str,
        now: i64,
    ) -> Result<()> {
        if envelope.device_id.is_empty() {
            return Err(Error::InvalidEnvelope("missing device_id".into()));
        }

        if envelope.device_id != topic_device_id {
            return Err(Error::InvalidEnvelope("device_id mismatch".into()));
        }

        if envelope.device_type.is_empty() {
            return Err(Error::InvalidEnvelope("missing device type".into()));
        }

        if envelope.readings.is_empty() {
            return Err(Error::InvalidEnvelope("empty readings array".into()));
        }

        if envelope.readings.len() > MAX_BATCH_READINGS {
            return Err(Error::InvalidPayload(format!(
                "batch exceeds max size of {MAX_BATCH_READINGS} readings"
            )));
        }

        // Unknown device types fail in both policies; only the per-reading
        // pass is policy-dependent.
        let Some(rule) = self.rules.get(&envelope.device_type) else {
            return Err(Error::InvalidPayload("unknown device type".into()));
        };

        if self.policy == BatchValidationPolicy::Strict {
            batch::validate_readings(rule.as_ref(), &envelope.readings, now)?;
        }

        Ok(())
    }
}

/// Raw event shape: a JSON object with a non-empty `topic` string and a
/// `payload` value.
fn validate_event(event: &Value) -> Result<(&str, &Value)> {
    let topic = match event.get("topic").and_then(Value::as_str) {
        Some(t) if !t.is_empty() => t,
        _ => return Err(Error::InvalidEvent("missing or invalid topic".into())),
    };

    let payload = event
        .get("payload")
        .ok_or_else(|| Error::InvalidEvent("missing payload".into()))?;

    Ok((topic, payload))
}

/// Re-serialize and parse the payload into the single-reading envelope,
/// enforcing the size ceiling before the typed decode.
fn decode_envelope(payload: &Value) -> Result<Envelope> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|_| Error::InvalidEnvelope("payload marshal failed".into()))?;

    if bytes.len() > MAX_SINGLE_PAYLOAD_BYTES {
        return Err(Error::InvalidPayload("payload too large (max 32 KiB)".into()));
    }

    serde_json::from_slice(&bytes)
        .map_err(|_| Error::InvalidEnvelope("payload unmarshal failed".into()))
}

/// Batch counterpart of `decode_envelope`, with the batch ceiling.
fn decode_batch_envelope(payload: &Value) -> Result<BatchEnvelope> {
    let bytes = serde_json::to_vec(payload)
        .map_err(|_| Error::InvalidEnvelope("batch payload marshal failed".into()))?;

    if bytes.len() > MAX_BATCH_PAYLOAD_BYTES {
        return Err(Error::InvalidPayload(
            "batch payload too large (max 512 KiB)".into(),
        ));
    }

    serde_json::from_slice(&bytes)
        .map_err(|_| Error::InvalidEnvelope("batch payload unmarshal failed".into()))
}

fn validate_envelope(envelope: &Envelope, topic_device_id: &str, now: i64) -> Result<()> {
    if envelope.device_id.is_empty() {
        return Err(Error::InvalidEnvelope("missing device_id".into()));
    }

    if envelope.device_id != topic_device_id {
        return Err(Error::InvalidEnvelope("device_id mismatch".into()));
    }

    if envelope.timestamp <= 0 {
        return Err(Error::InvalidEnvelope("missing timestamp".into()));
    }

    if envelope.timestamp > now + MAX_FUTURE_SKEW_SECS {
        return Err(Error::InvalidEnvelope("timestamp in the future".into()));
    }

    if envelope.device_type.is_empty() {
        return Err(Error::InvalidEnvelope("missing device type".into()));
    }

    if envelope.payload.is_empty() {
        return Err(Error::InvalidEnvelope("empty payload".into()));
    }

    Ok(())
}
