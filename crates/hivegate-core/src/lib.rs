//! Core types and traits for Hivegate.
//!
//! This crate defines the shared vocabulary of the ingestion pipeline:
//! message envelopes, persisted record shapes, the device state model,
//! the error taxonomy surfaced to the invoking layer, and the storage
//! backend capability trait every store is written against.

pub mod config;
pub mod envelope;
pub mod error;
pub mod records;
pub mod state;
pub mod storage;

pub use envelope::{BatchEnvelope, Envelope, MessageCategory, Reading};
pub use error::{Error, Result};
pub use records::{AlertRecord, CommandRecord, TelemetryRecord};
pub use state::{ConnectivityStatus, DeviceState, Health, UNKNOWN_STATE};
pub use storage::{
    BatchPut, ConditionalWrite, JsonMap, StorageError, TableBackend, WriteCondition,
};

/// Re-exports commonly used types.
pub mod prelude {
    pub use crate::config::{BatchValidationPolicy, ConfigError, IngestConfig};
    pub use crate::envelope::{BatchEnvelope, Envelope, MessageCategory, Reading};
    pub use crate::error::{Error, Result};
    pub use crate::records::{AlertRecord, CommandRecord, TelemetryRecord};
    pub use crate::state::{ConnectivityStatus, DeviceState, Health, UNKNOWN_STATE};
    pub use crate::storage::{
        BatchPut, ConditionalWrite, JsonMap, StorageError, TableBackend, WriteCondition,
    };
}
