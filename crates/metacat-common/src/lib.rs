//! Metacat Common - shared types for the metadata catalog
//!
//! This crate defines the entity identifiers, metadata aggregates, and sort
//! directives shared by the catalog and store crates.

pub mod entity;
pub mod metadata;
pub mod scope;
pub mod sort;

// Re-exports
pub use entity::{EntityId, EntityKind, ProgramType, SYSTEM_NAMESPACE};
pub use metadata::{Metadata, MetadataEntry, MetadataRecord, SearchResultRecord, TAGS_KEY};
pub use scope::Scope;
pub use sort::{SortBy, SortInfo, SortOrder, SortParseError};
