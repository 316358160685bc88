//! The ingestion error taxonomy.
//!
//! Validation errors are client-input faults: logged at warning level and
//! returned verbatim, never retried. Storage failures are wrapped, not
//! reclassified. Anything unexpected caught at the orchestration boundary
//! collapses into the opaque `Internal` variant so callers never observe a
//! raw fault shape.

use thiserror::Error;

use crate::storage::StorageError;

/// Result type for ingestion operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the invoking layer.
#[derive(Debug, Error)]
pub enum Error {
    /// The raw event is missing required keys or they have the wrong shape.
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// The topic string does not match `devices/{device_id}/{category}`.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// The payload decoded, but envelope-level fields are missing or
    /// inconsistent with the topic.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    /// The payload content does not satisfy the device type's rules or a
    /// size/count ceiling.
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A message category the router has no handling for. Should not occur
    /// past validation.
    #[error("unknown message type: {0}")]
    UnknownMessageType(String),

    /// A storage collaborator failed. Wrapped as-is.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// An unexpected fault was caught at the orchestration boundary.
    #[error("internal server error")]
    Internal,
}

impl Error {
    /// Whether this error was caused by bad client input (as opposed to a
    /// collaborator or internal fault). Client faults log at warning level.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Error::InvalidEvent(_)
                | Error::InvalidTopic(_)
                | Error::InvalidEnvelope(_)
                | Error::InvalidPayload(_)
                | Error::UnknownMessageType(_)
        )
    }
}
