//! Table backend implementations.
//!
//! Both backends honor the same semantics: conditional merges are atomic
//! per key, and batch puts report (never silently drop) declined items.

pub mod memory;
pub mod redb;

pub use memory::MemoryBackend;
pub use redb::{RedbBackend, RedbBackendConfig};
