//! Metacat Store - dual-scope metadata store
//!
//! Layers audit diffs, cross-scope reads and search, and batched index
//! maintenance over the per-scope catalogs.

pub mod audit;
pub mod config;
pub mod error;
pub mod store;

// Re-exports
pub use audit::{AuditError, AuditSink, InMemoryAuditSink, MetadataChange};
pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use store::MetadataStore;
