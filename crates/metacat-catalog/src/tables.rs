//! Redb table definitions and key encoding for one catalog scope.

use metacat_common::EntityId;
use redb::TableDefinition;

// Key: "{entity}\x00{meta_key}", Value: bincode-encoded MetadataEntry.
// Tags live under the reserved meta key "tags" as one comma-joined row.
pub const VALUES: TableDefinition<&str, &[u8]> = TableDefinition::new("values");

// Key: "{namespace}:{term}\x00{entity}\x00{meta_key}", Value: bincode-encoded
// MetadataEntry (the source row at posting time).
pub const INDEX: TableDefinition<&str, &[u8]> = TableDefinition::new("index");

// Key: "{entity}\x00{millis:016x}", Value: bincode-encoded Metadata snapshot.
// Same-millisecond writes collapse onto one key.
pub const HISTORY: TableDefinition<&str, &[u8]> = TableDefinition::new("history");

/// Separator between key segments. Never appears in canonical entity ids,
/// meta keys, or index terms, so it fences prefix scans exactly.
pub const SEP: char = '\0';

pub fn value_key(entity: &EntityId, meta_key: &str) -> String {
    format!("{}{SEP}{meta_key}", entity.canonical())
}

/// Prefix covering every value row of one entity.
pub fn value_prefix(entity: &EntityId) -> String {
    format!("{}{SEP}", entity.canonical())
}

pub fn index_key(namespace: &str, term: &str, entity: &EntityId, meta_key: &str) -> String {
    format!("{namespace}:{term}{SEP}{}{SEP}{meta_key}", entity.canonical())
}

/// Prefix matching exactly the postings for `term` in `namespace`. The
/// trailing separator stops `tag1` from matching `tag12` postings.
pub fn index_term_prefix(namespace: &str, term: &str) -> String {
    format!("{namespace}:{term}{SEP}")
}

/// Prefix matching the postings for every term starting with `term`.
pub fn index_term_scan_prefix(namespace: &str, term: &str) -> String {
    format!("{namespace}:{term}")
}

pub fn history_key(entity: &EntityId, millis: u64) -> String {
    format!("{}{SEP}{millis:016x}", entity.canonical())
}

/// Prefix covering every history row of one entity. Rows sort by timestamp
/// because the millis are fixed-width hex.
pub fn history_prefix(entity: &EntityId) -> String {
    format!("{}{SEP}", entity.canonical())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_term_prefix_fences_longer_terms() {
        let entity = EntityId::dataset("ns1", "ds1");
        let posting = index_key("ns1", "tag12", &entity, "tags");
        assert!(!posting.starts_with(&index_term_prefix("ns1", "tag1")));
        assert!(posting.starts_with(&index_term_prefix("ns1", "tag12")));
        assert!(posting.starts_with(&index_term_scan_prefix("ns1", "tag1")));
    }

    #[test]
    fn test_history_keys_sort_by_time() {
        let entity = EntityId::application("ns1", "app1");
        let earlier = history_key(&entity, 999);
        let later = history_key(&entity, 1000);
        assert!(earlier < later);
        assert!(earlier.starts_with(&history_prefix(&entity)));
    }
}
