//! Error types for the storage crate.

use thiserror::Error;

use hivegate_core::storage::StorageError;

/// Result type for backend-internal operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Storage implementation errors.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Database error.
    #[error("storage error: {0}")]
    Storage(String),
}

// Convert to the core error the TableBackend trait surfaces.
impl From<Error> for StorageError {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(e) => StorageError::Io(e),
            Error::Serialization(s) => StorageError::Serialization(s),
            Error::Storage(s) => StorageError::Backend(s),
        }
    }
}

// External error conversions
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<redb::Error> for Error {
    fn from(e: redb::Error) -> Self {
        Error::Storage(format!("redb error: {}", e))
    }
}

impl From<redb::TransactionError> for Error {
    fn from(e: redb::TransactionError) -> Self {
        Error::Storage(format!("redb transaction error: {}", e))
    }
}

impl From<redb::TableError> for Error {
    fn from(e: redb::TableError) -> Self {
        Error::Storage(format!("redb table error: {}", e))
    }
}

impl From<redb::StorageError> for Error {
    fn from(e: redb::StorageError) -> Self {
        Error::Storage(format!("redb storage error: {}", e))
    }
}

impl From<redb::CommitError> for Error {
    fn from(e: redb::CommitError) -> Self {
        Error::Storage(format!("redb commit error: {}", e))
    }
}

impl From<redb::DatabaseError> for Error {
    fn from(e: redb::DatabaseError) -> Self {
        Error::Storage(format!("redb database error: {}", e))
    }
}
