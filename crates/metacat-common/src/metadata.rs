//! Metadata aggregates and search result shapes.

use crate::entity::EntityId;
use crate::scope::Scope;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Reserved key under which an entity's tags are stored and indexed. A user
/// property with this name is not supported.
pub const TAGS_KEY: &str = "tags";

/// Aggregate current (or historical) state of one entity in one scope.
/// Derived from the property and tag rows, not separately stored except as
/// history snapshots.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub properties: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

impl Metadata {
    #[must_use]
    pub fn new(properties: BTreeMap<String, String>, tags: BTreeSet<String>) -> Self {
        Self { properties, tags }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.tags.is_empty()
    }
}

/// Metadata plus the entity and scope it belongs to - the externally visible
/// unit, and the shape of audit previous/additions/deletions records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub entity: EntityId,
    pub scope: Scope,
    pub properties: BTreeMap<String, String>,
    pub tags: BTreeSet<String>,
}

impl MetadataRecord {
    /// An empty record for the given entity and scope.
    #[must_use]
    pub fn empty(entity: EntityId, scope: Scope) -> Self {
        Self {
            entity,
            scope,
            properties: BTreeMap::new(),
            tags: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn new(entity: EntityId, scope: Scope, metadata: Metadata) -> Self {
        Self {
            entity,
            scope,
            properties: metadata.properties,
            tags: metadata.tags,
        }
    }

    #[must_use]
    pub fn metadata(&self) -> Metadata {
        Metadata {
            properties: self.properties.clone(),
            tags: self.tags.clone(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty() && self.tags.is_empty()
    }
}

/// One property row, or the synthetic aggregate tags row (`key == "tags"`,
/// value = comma-joined sorted tags). Search returns these, with duplicates.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub entity: EntityId,
    pub key: String,
    pub value: String,
}

impl MetadataEntry {
    #[must_use]
    pub fn new(entity: EntityId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            entity,
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A ranked search result enriched with the matched entity's full metadata
/// in every scope where any exists.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResultRecord {
    pub entity: EntityId,
    pub metadata: BTreeMap<Scope, Metadata>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_record() {
        let record = MetadataRecord::empty(EntityId::dataset("ns1", "ds1"), Scope::User);
        assert!(record.is_empty());
        assert!(record.metadata().is_empty());
    }

    #[test]
    fn test_record_serde_round_trip() {
        let mut properties = BTreeMap::new();
        properties.insert("key1".to_string(), "value1".to_string());
        let mut tags = BTreeSet::new();
        tags.insert("tag1".to_string());
        let record = MetadataRecord::new(
            EntityId::application("ns1", "app1"),
            Scope::System,
            Metadata::new(properties, tags),
        );
        let json = serde_json::to_string(&record).unwrap();
        let back: MetadataRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
