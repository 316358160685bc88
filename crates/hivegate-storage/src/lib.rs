//! Storage backends and record stores.
//!
//! Backends implement the `TableBackend` capability trait from
//! `hivegate-core`: a persistent redb-backed backend and an in-memory
//! backend for tests and local runs. On top of them sit the record
//! stores: telemetry (with the resilient batch writer), alerts (with the
//! severity index), and commands.

pub mod alerts;
pub mod backends;
pub mod commands;
pub mod error;
pub mod telemetry;

pub use alerts::AlertStore;
pub use backends::memory::MemoryBackend;
pub use backends::redb::{RedbBackend, RedbBackendConfig};
pub use commands::CommandStore;
pub use error::Error;
pub use telemetry::TelemetryStore;
