//! Per-scope metadata catalog backed by redb.
//!
//! One `MetadataCatalog` owns one database file and serves exactly one
//! scope. All writes go through [`MetadataCatalog::execute`], which commits
//! the enclosed unit of work atomically or aborts it on error. Reads go
//! through [`MetadataCatalog::read`], a point-in-time snapshot.

use crate::error::CatalogResult;
use crate::indexer::{DefaultIndexer, Indexer};
use crate::query;
use crate::tables;
use metacat_common::{
    EntityId, EntityKind, Metadata, MetadataEntry, MetadataRecord, Scope, SortInfo, SortOrder,
    SYSTEM_NAMESPACE, TAGS_KEY,
};
use redb::{Database, ReadTransaction, ReadableTable, WriteTransaction};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Transactional metadata catalog for a single scope.
pub struct MetadataCatalog {
    db: Database,
    scope: Scope,
}

impl MetadataCatalog {
    /// Open (or create) the catalog database at the given path.
    pub fn open(path: impl AsRef<Path>, scope: Scope) -> CatalogResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Create all tables eagerly so later read txns don't fail
        let write_txn = db.begin_write()?;
        {
            let _t = write_txn.open_table(tables::VALUES)?;
            let _t = write_txn.open_table(tables::INDEX)?;
            let _t = write_txn.open_table(tables::HISTORY)?;
        }
        write_txn.commit()?;

        debug!(scope = %scope, path = %path.display(), "opened metadata catalog");
        Ok(Self { db, scope })
    }

    pub const fn scope(&self) -> Scope {
        self.scope
    }

    /// Runs `f` inside a write transaction. The transaction commits when `f`
    /// returns `Ok` and aborts when it returns `Err`, so a failed unit of
    /// work leaves no partial rows or postings behind.
    pub fn execute<T>(
        &self,
        f: impl FnOnce(&mut CatalogTxn<'_>) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut txn = CatalogTxn { txn: &write_txn };
            f(&mut txn)
        };
        match result {
            Ok(value) => {
                write_txn.commit()?;
                Ok(value)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }

    /// Runs `f` against a read transaction.
    pub fn read<T>(
        &self,
        f: impl FnOnce(&CatalogSnapshot) -> CatalogResult<T>,
    ) -> CatalogResult<T> {
        let snapshot = CatalogSnapshot {
            txn: self.db.begin_read()?,
            scope: self.scope,
        };
        f(&snapshot)
    }
}

/// Write handle for one unit of work. Every mutation appends one post-state
/// history snapshot for the touched entity, whether or not the stored state
/// actually changed.
pub struct CatalogTxn<'a> {
    txn: &'a WriteTransaction,
}

impl CatalogTxn<'_> {
    /// Sets one property with the default indexer.
    pub fn set_property(&mut self, entity: &EntityId, key: &str, value: &str) -> CatalogResult<()> {
        self.set_property_with(entity, key, value, &DefaultIndexer)
    }

    /// Sets one property, deriving postings with the given indexer. Writing
    /// the value already stored skips index churn but still records history,
    /// and the reserved `tags` key is skipped like the removal operations
    /// skip it.
    ///
    /// Removal operations re-derive postings with [`DefaultIndexer`], so a
    /// row written with a custom indexer leaves its postings behind when
    /// removed. A delete-and-rebuild pass clears them.
    pub fn set_property_with(
        &mut self,
        entity: &EntityId,
        key: &str,
        value: &str,
        indexer: &dyn Indexer,
    ) -> CatalogResult<()> {
        // the synthetic tags row is only written through the tag operations
        if key == TAGS_KEY {
            return self.record_snapshot(entity);
        }
        let existing = self.get_property(entity, key)?;
        if existing.as_ref().is_some_and(|e| e.value == value) {
            return self.record_snapshot(entity);
        }
        if let Some(old) = existing {
            self.remove_postings(&old, indexer)?;
        }
        let entry = MetadataEntry::new(entity.clone(), key, value);
        self.put_value_row(&entry)?;
        self.write_postings(&entry, indexer)?;
        self.record_snapshot(entity)
    }

    /// Adds tags to the entity's tag set. Already-present tags are no-ops.
    pub fn add_tags(&mut self, entity: &EntityId, tags: &BTreeSet<String>) -> CatalogResult<()> {
        let current = self.get_tags(entity)?;
        let mut updated = current.clone();
        updated.extend(tags.iter().cloned());
        if updated != current {
            self.replace_tags_row(entity, &updated)?;
        }
        self.record_snapshot(entity)
    }

    /// Removes the named tags; missing tags are silently skipped.
    pub fn remove_tags(&mut self, entity: &EntityId, tags: &BTreeSet<String>) -> CatalogResult<()> {
        let current = self.get_tags(entity)?;
        let updated: BTreeSet<String> = current.difference(tags).cloned().collect();
        if updated != current {
            self.replace_tags_row(entity, &updated)?;
        }
        self.record_snapshot(entity)
    }

    pub fn remove_all_tags(&mut self, entity: &EntityId) -> CatalogResult<()> {
        let current = self.get_tags(entity)?;
        if !current.is_empty() {
            self.replace_tags_row(entity, &BTreeSet::new())?;
        }
        self.record_snapshot(entity)
    }

    /// Removes the named properties; missing keys are silently skipped.
    pub fn remove_properties(
        &mut self,
        entity: &EntityId,
        keys: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        for key in keys {
            if key == TAGS_KEY {
                continue;
            }
            if let Some(old) = self.get_property(entity, key)? {
                self.remove_postings(&old, &DefaultIndexer)?;
                self.delete_value_row(entity, key)?;
            }
        }
        self.record_snapshot(entity)
    }

    pub fn remove_all_properties(&mut self, entity: &EntityId) -> CatalogResult<()> {
        let rows = {
            let table = self.txn.open_table(tables::VALUES)?;
            read_rows(&table, entity)?
        };
        for row in rows.into_iter().filter(|r| r.key != TAGS_KEY) {
            self.remove_postings(&row, &DefaultIndexer)?;
            self.delete_value_row(entity, &row.key)?;
        }
        self.record_snapshot(entity)
    }

    pub fn get_property(
        &self,
        entity: &EntityId,
        key: &str,
    ) -> CatalogResult<Option<MetadataEntry>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_entry(&table, entity, key)
    }

    pub fn get_properties(&self, entity: &EntityId) -> CatalogResult<BTreeMap<String, String>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_properties(&table, entity)
    }

    pub fn get_tags(&self, entity: &EntityId) -> CatalogResult<BTreeSet<String>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_tags(&table, entity)
    }

    /// Current aggregate state, as the audit diff wants it.
    pub fn get_metadata(&self, entity: &EntityId) -> CatalogResult<Metadata> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_metadata(&table, entity)
    }

    /// Re-derives postings with `indexer` for up to `batch` value rows
    /// starting at `start` (None = beginning). Returns the continuation key
    /// for the next call, or None once the table is exhausted. Postings left
    /// behind by a previous indexer generation are not removed here; a full
    /// upgrade deletes all indexes first, then rebuilds.
    pub fn rebuild_indexes(
        &mut self,
        start: Option<&str>,
        indexer: &dyn Indexer,
        batch: usize,
    ) -> CatalogResult<Option<String>> {
        let (rows, next) = {
            let table = self.txn.open_table(tables::VALUES)?;
            let mut rows: Vec<MetadataEntry> = Vec::new();
            let mut next = None;
            for item in table.range::<&str>(start.unwrap_or("")..)? {
                let (k, v) = item?;
                if rows.len() == batch {
                    next = Some(k.value().to_string());
                    break;
                }
                rows.push(bincode::deserialize(v.value())?);
            }
            (rows, next)
        };
        for entry in &rows {
            self.write_postings(entry, indexer)?;
        }
        Ok(next)
    }

    /// Deletes up to `batch` posting rows and returns how many were
    /// deleted; 0 means the index is empty.
    pub fn delete_all_indexes(&mut self, batch: usize) -> CatalogResult<usize> {
        let mut table = self.txn.open_table(tables::INDEX)?;
        // Collect keys first, then delete
        let keys: Vec<String> = {
            let mut keys = Vec::new();
            for item in table.range::<&str>(""..)? {
                let (k, _) = item?;
                keys.push(k.value().to_string());
                if keys.len() == batch {
                    break;
                }
            }
            keys
        };
        for key in &keys {
            table.remove(key.as_str())?;
        }
        Ok(keys.len())
    }

    fn replace_tags_row(
        &mut self,
        entity: &EntityId,
        tags: &BTreeSet<String>,
    ) -> CatalogResult<()> {
        if let Some(old) = self.get_property(entity, TAGS_KEY)? {
            self.remove_postings(&old, &DefaultIndexer)?;
            self.delete_value_row(entity, TAGS_KEY)?;
        }
        if !tags.is_empty() {
            let joined = tags.iter().cloned().collect::<Vec<_>>().join(",");
            let entry = MetadataEntry::new(entity.clone(), TAGS_KEY, joined);
            self.put_value_row(&entry)?;
            self.write_postings(&entry, &DefaultIndexer)?;
        }
        Ok(())
    }

    fn put_value_row(&mut self, entry: &MetadataEntry) -> CatalogResult<()> {
        let bytes = bincode::serialize(entry)?;
        let mut table = self.txn.open_table(tables::VALUES)?;
        table.insert(
            tables::value_key(&entry.entity, &entry.key).as_str(),
            bytes.as_slice(),
        )?;
        Ok(())
    }

    fn delete_value_row(&mut self, entity: &EntityId, key: &str) -> CatalogResult<()> {
        let mut table = self.txn.open_table(tables::VALUES)?;
        table.remove(tables::value_key(entity, key).as_str())?;
        Ok(())
    }

    fn write_postings(&mut self, entry: &MetadataEntry, indexer: &dyn Indexer) -> CatalogResult<()> {
        let namespace = entry.entity.namespace().to_string();
        let bytes = bincode::serialize(entry)?;
        let mut table = self.txn.open_table(tables::INDEX)?;
        for term in posting_terms(entry, indexer) {
            table.insert(
                tables::index_key(&namespace, &term, &entry.entity, &entry.key).as_str(),
                bytes.as_slice(),
            )?;
        }
        Ok(())
    }

    fn remove_postings(&mut self, entry: &MetadataEntry, indexer: &dyn Indexer) -> CatalogResult<()> {
        let namespace = entry.entity.namespace().to_string();
        let mut table = self.txn.open_table(tables::INDEX)?;
        for term in posting_terms(entry, indexer) {
            table.remove(tables::index_key(&namespace, &term, &entry.entity, &entry.key).as_str())?;
        }
        Ok(())
    }

    fn record_snapshot(&mut self, entity: &EntityId) -> CatalogResult<()> {
        let metadata = {
            let table = self.txn.open_table(tables::VALUES)?;
            read_metadata(&table, entity)?
        };
        let bytes = bincode::serialize(&metadata)?;
        let mut table = self.txn.open_table(tables::HISTORY)?;
        table.insert(
            tables::history_key(entity, now_millis()).as_str(),
            bytes.as_slice(),
        )?;
        Ok(())
    }
}

/// Read handle over one point-in-time snapshot.
pub struct CatalogSnapshot {
    txn: ReadTransaction,
    scope: Scope,
}

impl CatalogSnapshot {
    pub fn get_property(
        &self,
        entity: &EntityId,
        key: &str,
    ) -> CatalogResult<Option<MetadataEntry>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_entry(&table, entity, key)
    }

    pub fn get_properties(&self, entity: &EntityId) -> CatalogResult<BTreeMap<String, String>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_properties(&table, entity)
    }

    pub fn get_tags(&self, entity: &EntityId) -> CatalogResult<BTreeSet<String>> {
        let table = self.txn.open_table(tables::VALUES)?;
        read_tags(&table, entity)
    }

    /// Current state of each entity; entities without metadata come back as
    /// empty records.
    pub fn get_metadata(&self, entities: &[EntityId]) -> CatalogResult<Vec<MetadataRecord>> {
        let table = self.txn.open_table(tables::VALUES)?;
        entities
            .iter()
            .map(|entity| {
                Ok(MetadataRecord::new(
                    entity.clone(),
                    self.scope,
                    read_metadata(&table, entity)?,
                ))
            })
            .collect()
    }

    /// Latest history snapshot of each entity taken at or before `millis`;
    /// entities with no snapshot that old come back as empty records.
    pub fn snapshot_before_time(
        &self,
        entities: &[EntityId],
        millis: u64,
    ) -> CatalogResult<Vec<MetadataRecord>> {
        let table = self.txn.open_table(tables::HISTORY)?;
        let mut records = Vec::with_capacity(entities.len());
        for entity in entities {
            let prefix = tables::history_prefix(entity);
            let upper = tables::history_key(entity, millis);
            let mut latest: Option<Metadata> = None;
            for item in table.range::<&str>(prefix.as_str()..)? {
                let (k, v) = item?;
                let key = k.value();
                if !key.starts_with(&prefix) || key > upper.as_str() {
                    break;
                }
                latest = Some(bincode::deserialize(v.value())?);
            }
            records.push(MetadataRecord::new(
                entity.clone(),
                self.scope,
                latest.unwrap_or_default(),
            ));
        }
        Ok(records)
    }

    /// Term search over one namespace (plus the reserved `system` namespace,
    /// always visible). Terms are OR-combined; the result keeps one group of
    /// raw matching entries per entity, duplicates included, with `limit`
    /// bounding the number of distinct entities.
    pub fn search(
        &self,
        namespace: &str,
        raw_query: &str,
        target_types: &[EntityKind],
        sort: SortInfo,
        limit: usize,
    ) -> CatalogResult<Vec<MetadataEntry>> {
        let terms = query::parse_query(raw_query);
        let index = self.txn.open_table(tables::INDEX)?;

        let mut namespaces = vec![namespace];
        if namespace != SYSTEM_NAMESPACE {
            namespaces.push(SYSTEM_NAMESPACE);
        }

        let mut raw: Vec<MetadataEntry> = Vec::new();
        for term in &terms {
            for ns in &namespaces {
                let prefix = if term.prefix {
                    tables::index_term_scan_prefix(ns, &term.term)
                } else {
                    tables::index_term_prefix(ns, &term.term)
                };
                for (_, bytes) in scan_prefix(&index, &prefix)? {
                    let entry: MetadataEntry = bincode::deserialize(&bytes)?;
                    if target_types.is_empty() || target_types.contains(&entry.entity.kind()) {
                        raw.push(entry);
                    }
                }
            }
        }
        self.rank(raw, sort, limit)
    }

    /// Groups raw matches per entity (first-seen order), orders the entities,
    /// truncates to `limit` entities and flattens the surviving groups.
    fn rank(
        &self,
        raw: Vec<MetadataEntry>,
        sort: SortInfo,
        limit: usize,
    ) -> CatalogResult<Vec<MetadataEntry>> {
        let mut order: Vec<EntityId> = Vec::new();
        let mut groups: HashMap<EntityId, Vec<MetadataEntry>> = HashMap::new();
        for entry in raw {
            if !groups.contains_key(&entry.entity) {
                order.push(entry.entity.clone());
            }
            groups.entry(entry.entity.clone()).or_default().push(entry);
        }

        match sort.order {
            SortOrder::Weighted => {
                // Weight is the raw posting count; stable sort keeps the
                // first-seen order among equals.
                order.sort_by(|a, b| groups[b].len().cmp(&groups[a].len()));
            }
            SortOrder::Asc | SortOrder::Desc => {
                if let Some(field) = sort.sort_by.property_key() {
                    let values = self.txn.open_table(tables::VALUES)?;
                    let mut sort_values: HashMap<EntityId, Option<String>> = HashMap::new();
                    for entity in &order {
                        let value = read_entry(&values, entity, field)?.map(|e| e.value);
                        sort_values.insert(entity.clone(), value);
                    }
                    let descending = sort.order == SortOrder::Desc;
                    order.sort_by(|a, b| {
                        // Entities missing the sort property always sort last
                        let by_field = match (&sort_values[a], &sort_values[b]) {
                            (Some(x), Some(y)) if descending => y.cmp(x),
                            (Some(x), Some(y)) => x.cmp(y),
                            (Some(_), None) => Ordering::Less,
                            (None, Some(_)) => Ordering::Greater,
                            (None, None) => Ordering::Equal,
                        };
                        by_field.then_with(|| a.canonical().cmp(&b.canonical()))
                    });
                }
            }
        }

        let mut results = Vec::new();
        for entity in order.into_iter().take(limit) {
            if let Some(entries) = groups.remove(&entity) {
                results.extend(entries);
            }
        }
        Ok(results)
    }
}

/// Full posting-term set for one row: each indexer term both bare and
/// key-scoped, plus the bare lower-cased key itself.
fn posting_terms(entry: &MetadataEntry, indexer: &dyn Indexer) -> BTreeSet<String> {
    let key = entry.key.to_lowercase();
    let mut terms = BTreeSet::new();
    for term in indexer.indexes(entry) {
        terms.insert(format!("{key}:{term}"));
        terms.insert(term);
    }
    terms.insert(key);
    terms
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn scan_prefix<T>(table: &T, prefix: &str) -> CatalogResult<Vec<(String, Vec<u8>)>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut out = Vec::new();
    for item in table.range::<&str>(prefix..)? {
        let (k, v) = item?;
        let key = k.value();
        if !key.starts_with(prefix) {
            break;
        }
        out.push((key.to_string(), v.value().to_vec()));
    }
    Ok(out)
}

fn read_entry<T>(table: &T, entity: &EntityId, meta_key: &str) -> CatalogResult<Option<MetadataEntry>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(tables::value_key(entity, meta_key).as_str())? {
        Some(guard) => Ok(Some(bincode::deserialize(guard.value())?)),
        None => Ok(None),
    }
}

fn read_rows<T>(table: &T, entity: &EntityId) -> CatalogResult<Vec<MetadataEntry>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    scan_prefix(table, &tables::value_prefix(entity))?
        .into_iter()
        .map(|(_, bytes)| Ok(bincode::deserialize(&bytes)?))
        .collect()
}

fn read_properties<T>(table: &T, entity: &EntityId) -> CatalogResult<BTreeMap<String, String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(read_rows(table, entity)?
        .into_iter()
        .filter(|row| row.key != TAGS_KEY)
        .map(|row| (row.key, row.value))
        .collect())
}

fn read_tags<T>(table: &T, entity: &EntityId) -> CatalogResult<BTreeSet<String>>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    Ok(read_entry(table, entity, TAGS_KEY)?
        .map(|row| {
            row.value
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(ToString::to_string)
                .collect()
        })
        .unwrap_or_default())
}

fn read_metadata<T>(table: &T, entity: &EntityId) -> CatalogResult<Metadata>
where
    T: ReadableTable<&'static str, &'static [u8]>,
{
    let mut metadata = Metadata::default();
    for row in read_rows(table, entity)? {
        if row.key == TAGS_KEY {
            metadata.tags = row
                .value
                .split(',')
                .filter(|tag| !tag.is_empty())
                .map(ToString::to_string)
                .collect();
        } else {
            metadata.properties.insert(row.key, row.value);
        }
    }
    Ok(metadata)
}
