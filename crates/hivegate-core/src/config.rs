//! Configuration: environment variable names, limit constants, and the
//! startup-time config loader.
//!
//! Table names are supplied externally. A missing required name is a fatal
//! configuration error at startup, never a per-request failure.

use thiserror::Error;

/// Environment variable names.
pub mod env_vars {
    pub const DATA_PATH: &str = "HIVEGATE_DATA_PATH";
    pub const TELEMETRY_TABLE: &str = "HIVEGATE_TELEMETRY_TABLE";
    pub const ALERTS_TABLE: &str = "HIVEGATE_ALERTS_TABLE";
    pub const DEVICE_STATE_TABLE: &str = "HIVEGATE_DEVICE_STATE_TABLE";
    pub const COMMANDS_TABLE: &str = "HIVEGATE_COMMANDS_TABLE";
    pub const BATCH_VALIDATION: &str = "HIVEGATE_BATCH_VALIDATION";
}

/// Pipeline limit constants.
pub mod limits {
    use std::time::Duration;

    /// Serialized size ceiling for a single-reading payload.
    pub const MAX_SINGLE_PAYLOAD_BYTES: usize = 32 * 1024;
    /// Serialized size ceiling for a batch payload.
    pub const MAX_BATCH_PAYLOAD_BYTES: usize = 512 * 1024;
    /// Hard cap on readings per batch packet.
    pub const MAX_BATCH_READINGS: usize = 500;
    /// Tolerated clock skew: timestamps this far ahead of now still pass.
    pub const MAX_FUTURE_SKEW_SECS: i64 = 60;
    /// A device with no message for this long reads as OFFLINE.
    pub const OFFLINE_AFTER: Duration = Duration::from_secs(2 * 60);
    /// Default telemetry retention.
    pub const TELEMETRY_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    /// Default alert retention.
    pub const ALERT_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
    /// Default command retention.
    pub const COMMAND_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
}

/// How batch telemetry is validated before persistence.
///
/// The strict pass rejects the whole batch on the first bad reading with an
/// index-annotated error. The lenient policy defers per-reading problems to
/// the orchestrator, which skips and counts them; the skip path runs in
/// both modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchValidationPolicy {
    /// Reject the whole batch on any invalid reading.
    Strict,
    /// Skip invalid readings at persistence time; fail only when none
    /// survive.
    #[default]
    Lenient,
}

impl BatchValidationPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Strict => "strict",
            Self::Lenient => "lenient",
        }
    }
}

impl std::str::FromStr for BatchValidationPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            other => Err(ConfigError::InvalidValue {
                var: env_vars::BATCH_VALIDATION,
                value: other.to_string(),
            }),
        }
    }
}

/// Startup configuration errors. Fatal: the process must not serve.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingVar(&'static str),

    #[error("{var} has invalid value {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Resolved ingestion configuration.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub telemetry_table: String,
    pub alerts_table: String,
    pub device_state_table: String,
    pub commands_table: String,
    pub batch_validation: BatchValidationPolicy,
}

impl IngestConfig {
    /// Load from the environment. Every table name is required.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            telemetry_table: require(env_vars::TELEMETRY_TABLE)?,
            alerts_table: require(env_vars::ALERTS_TABLE)?,
            device_state_table: require(env_vars::DEVICE_STATE_TABLE)?,
            commands_table: require(env_vars::COMMANDS_TABLE)?,
            batch_validation: match std::env::var(env_vars::BATCH_VALIDATION) {
                Ok(v) => v.parse()?,
                Err(_) => BatchValidationPolicy::default(),
            },
        })
    }
}

fn require(var: &'static str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(v) if !v.is_empty() => Ok(v),
        _ => Err(ConfigError::MissingVar(var)),
    }
}
