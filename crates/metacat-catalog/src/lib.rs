//! Metacat Catalog - transactional metadata catalog with embedded search
//!
//! This crate implements the per-scope storage engine: redb-backed value,
//! index and history tables, the indexing strategy, and term search.

pub mod catalog;
pub mod error;
pub mod indexer;
pub mod query;
pub mod tables;

// Re-exports
pub use catalog::{CatalogSnapshot, CatalogTxn, MetadataCatalog};
pub use error::{CatalogError, CatalogResult};
pub use indexer::{DefaultIndexer, Indexer};
