//! The ingestion pipeline.
//!
//! Raw events come in as opaque JSON from the transport layer. The
//! validator turns them into typed messages (or classified errors), and
//! the orchestrator routes validated messages through persistence and
//! device-state reconciliation.

pub mod batch;
pub mod service;
pub mod topic;
pub mod validator;

pub use service::{IngestReport, IngestionService};
pub use topic::parse_topic;
pub use validator::{MessageValidator, ValidatedEnvelope, ValidatedMessage};
