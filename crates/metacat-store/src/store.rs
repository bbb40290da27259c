//! Dual-scope metadata store.
//!
//! Owns one catalog per scope and layers the cross-cutting concerns on top:
//! audit diffs for every mutation, scope-union reads and search, sort
//! parameter validation, and batched index maintenance. Each mutation is
//! atomic within its scope; nothing spans both scopes in one transaction.

use crate::audit::{AuditSink, MetadataChange};
use crate::config::StoreConfig;
use crate::error::StoreResult;
use metacat_catalog::{DefaultIndexer, Indexer, MetadataCatalog};
use metacat_common::{
    EntityId, EntityKind, Metadata, MetadataRecord, Scope, SearchResultRecord, SortInfo, SortOrder,
    TAGS_KEY,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Dual-scope metadata store with optional audit publishing.
pub struct MetadataStore {
    user: MetadataCatalog,
    system: MetadataCatalog,
    audit: Option<Arc<dyn AuditSink>>,
    index_batch_size: usize,
}

impl MetadataStore {
    /// Open (or create) both scope catalogs under the configured directory.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let user = MetadataCatalog::open(
            config.data_dir.join(format!("{}.redb", Scope::User)),
            Scope::User,
        )?;
        let system = MetadataCatalog::open(
            config.data_dir.join(format!("{}.redb", Scope::System)),
            Scope::System,
        )?;
        Ok(Self {
            user,
            system,
            audit: None,
            index_batch_size: config.index_batch_size,
        })
    }

    /// Install the audit sink. Without one, changes are not audited.
    pub fn set_audit_sink(&mut self, sink: Arc<dyn AuditSink>) {
        self.audit = Some(sink);
    }

    const fn catalog(&self, scope: Scope) -> &MetadataCatalog {
        match scope {
            Scope::User => &self.user,
            Scope::System => &self.system,
        }
    }

    // ---- Mutations ----

    /// Sets (adds or replaces) properties. The audited delta carries only the
    /// new or changed pairs; replaced values show up as deletions.
    pub fn set_properties(
        &self,
        scope: Scope,
        entity: &EntityId,
        properties: &BTreeMap<String, String>,
    ) -> StoreResult<()> {
        let (before, additions, deletions) = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            let mut additions = BTreeMap::new();
            let mut deletions = BTreeMap::new();
            for (key, value) in properties {
                if key == TAGS_KEY {
                    continue;
                }
                match before.properties.get(key) {
                    Some(old) if old == value => {}
                    Some(old) => {
                        deletions.insert(key.clone(), old.clone());
                        additions.insert(key.clone(), value.clone());
                    }
                    None => {
                        additions.insert(key.clone(), value.clone());
                    }
                }
                txn.set_property(entity, key, value)?;
            }
            Ok((before, additions, deletions))
        })?;
        self.publish(
            record(entity, scope, before),
            properties_record(entity, scope, additions),
            properties_record(entity, scope, deletions),
        );
        Ok(())
    }

    pub fn set_property(
        &self,
        scope: Scope,
        entity: &EntityId,
        key: &str,
        value: &str,
    ) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.set_property(entity, key, value)?;
            Ok(before)
        })?;
        let mut additions = BTreeMap::new();
        if key != TAGS_KEY {
            additions.insert(key.to_string(), value.to_string());
        }
        self.publish(
            record(entity, scope, before),
            properties_record(entity, scope, additions),
            MetadataRecord::empty(entity.clone(), scope),
        );
        Ok(())
    }

    /// Adds tags. The audited additions are the requested tags, whether or
    /// not they were already present.
    pub fn add_tags(
        &self,
        scope: Scope,
        entity: &EntityId,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.add_tags(entity, tags)?;
            Ok(before)
        })?;
        self.publish(
            record(entity, scope, before),
            tags_record(entity, scope, tags.clone()),
            MetadataRecord::empty(entity.clone(), scope),
        );
        Ok(())
    }

    /// Removes the named properties; the audited deletions are the subset
    /// that actually existed, with their old values.
    pub fn remove_properties(
        &self,
        scope: Scope,
        entity: &EntityId,
        keys: &BTreeSet<String>,
    ) -> StoreResult<()> {
        let (before, deleted) = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            let deleted: BTreeMap<String, String> = before
                .properties
                .iter()
                .filter(|(key, _)| keys.contains(*key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            txn.remove_properties(entity, keys)?;
            Ok((before, deleted))
        })?;
        self.publish(
            record(entity, scope, before),
            MetadataRecord::empty(entity.clone(), scope),
            properties_record(entity, scope, deleted),
        );
        Ok(())
    }

    pub fn remove_all_properties(&self, scope: Scope, entity: &EntityId) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.remove_all_properties(entity)?;
            Ok(before)
        })?;
        let deleted = before.properties.clone();
        self.publish(
            record(entity, scope, before),
            MetadataRecord::empty(entity.clone(), scope),
            properties_record(entity, scope, deleted),
        );
        Ok(())
    }

    /// Removes the named tags; the audited deletions are the requested tags.
    pub fn remove_tags(
        &self,
        scope: Scope,
        entity: &EntityId,
        tags: &BTreeSet<String>,
    ) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.remove_tags(entity, tags)?;
            Ok(before)
        })?;
        self.publish(
            record(entity, scope, before),
            MetadataRecord::empty(entity.clone(), scope),
            tags_record(entity, scope, tags.clone()),
        );
        Ok(())
    }

    pub fn remove_all_tags(&self, scope: Scope, entity: &EntityId) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.remove_all_tags(entity)?;
            Ok(before)
        })?;
        let deleted = before.tags.clone();
        self.publish(
            record(entity, scope, before),
            MetadataRecord::empty(entity.clone(), scope),
            tags_record(entity, scope, deleted),
        );
        Ok(())
    }

    /// Removes all metadata of the entity in one scope. The audited deletion
    /// is the full previous record.
    pub fn remove_metadata_scoped(&self, scope: Scope, entity: &EntityId) -> StoreResult<()> {
        let before = self.catalog(scope).execute(|txn| {
            let before = txn.get_metadata(entity)?;
            txn.remove_all_properties(entity)?;
            txn.remove_all_tags(entity)?;
            Ok(before)
        })?;
        self.publish(
            record(entity, scope, before.clone()),
            MetadataRecord::empty(entity.clone(), scope),
            record(entity, scope, before),
        );
        Ok(())
    }

    /// Removes all metadata of the entity in both scopes. Each scope is its
    /// own transaction and audit record.
    pub fn remove_metadata(&self, entity: &EntityId) -> StoreResult<()> {
        self.remove_metadata_scoped(Scope::User, entity)?;
        self.remove_metadata_scoped(Scope::System, entity)
    }

    // ---- Reads ----

    /// Current metadata of the entity in both scopes, user first.
    pub fn get_metadata(&self, entity: &EntityId) -> StoreResult<Vec<MetadataRecord>> {
        Ok(vec![
            self.get_metadata_scoped(Scope::User, entity)?,
            self.get_metadata_scoped(Scope::System, entity)?,
        ])
    }

    pub fn get_metadata_scoped(
        &self,
        scope: Scope,
        entity: &EntityId,
    ) -> StoreResult<MetadataRecord> {
        let mut records = self
            .catalog(scope)
            .read(|snap| snap.get_metadata(std::slice::from_ref(entity)))?;
        Ok(records.remove(0))
    }

    pub fn get_metadata_batch(
        &self,
        scope: Scope,
        entities: &[EntityId],
    ) -> StoreResult<Vec<MetadataRecord>> {
        Ok(self.catalog(scope).read(|snap| snap.get_metadata(entities))?)
    }

    /// Properties across both scopes; a user property shadows a system
    /// property of the same name.
    pub fn get_properties(&self, entity: &EntityId) -> StoreResult<BTreeMap<String, String>> {
        let mut merged = self
            .system
            .read(|snap| snap.get_properties(entity))?;
        merged.extend(self.user.read(|snap| snap.get_properties(entity))?);
        Ok(merged)
    }

    pub fn get_properties_scoped(
        &self,
        scope: Scope,
        entity: &EntityId,
    ) -> StoreResult<BTreeMap<String, String>> {
        Ok(self.catalog(scope).read(|snap| snap.get_properties(entity))?)
    }

    /// Union of the entity's tags across both scopes.
    pub fn get_tags(&self, entity: &EntityId) -> StoreResult<BTreeSet<String>> {
        let mut tags = self.user.read(|snap| snap.get_tags(entity))?;
        tags.extend(self.system.read(|snap| snap.get_tags(entity))?);
        Ok(tags)
    }

    pub fn get_tags_scoped(
        &self,
        scope: Scope,
        entity: &EntityId,
    ) -> StoreResult<BTreeSet<String>> {
        Ok(self.catalog(scope).read(|snap| snap.get_tags(entity))?)
    }

    /// Point-in-time state at or before `millis` in both scopes, user
    /// records first.
    pub fn get_snapshot_before_time(
        &self,
        entities: &[EntityId],
        millis: u64,
    ) -> StoreResult<Vec<MetadataRecord>> {
        let mut records =
            self.get_snapshot_before_time_scoped(Scope::User, entities, millis)?;
        records.extend(self.get_snapshot_before_time_scoped(Scope::System, entities, millis)?);
        Ok(records)
    }

    pub fn get_snapshot_before_time_scoped(
        &self,
        scope: Scope,
        entities: &[EntityId],
        millis: u64,
    ) -> StoreResult<Vec<MetadataRecord>> {
        Ok(self
            .catalog(scope)
            .read(|snap| snap.snapshot_before_time(entities, millis))?)
    }

    // ---- Search ----

    /// Searches both scopes and returns ranked, metadata-enriched results.
    ///
    /// `sort` is the raw `"{field} {order}"` parameter; `None` means weighted
    /// relevance. The bare query `*` without a sort would scan both full
    /// indexes, so it is restricted to the system scope instead.
    pub fn search(
        &self,
        namespace: &str,
        query: &str,
        target_types: &[EntityKind],
        sort: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<SearchResultRecord>> {
        let sort_info = match sort {
            Some(raw) => SortInfo::parse(raw)?,
            None => SortInfo::WEIGHTED,
        };

        if query.trim() == "*" && sort.is_none() {
            warn!(
                namespace,
                "full-index scan requested without sort; searching the system scope only"
            );
            let entries = self
                .system
                .read(|snap| snap.search(namespace, query, target_types, sort_info, limit))?;
            let mut order = Vec::new();
            for entry in entries {
                if !order.contains(&entry.entity) {
                    order.push(entry.entity);
                }
            }
            return self.enrich(order);
        }

        // Each scope is searched unbounded; a per-scope limit would evict
        // entities whose weight splits across scopes before the merged tally
        // sees them.
        let user_entries = self
            .user
            .read(|snap| snap.search(namespace, query, target_types, sort_info, usize::MAX))?;
        let system_entries = self
            .system
            .read(|snap| snap.search(namespace, query, target_types, sort_info, usize::MAX))?;

        // Tally raw hits per entity across scopes; first-seen order is the
        // scope-merged order the field sorts rely on.
        let mut order: Vec<EntityId> = Vec::new();
        let mut weight: HashMap<EntityId, usize> = HashMap::new();
        for entry in user_entries.iter().chain(system_entries.iter()) {
            if !weight.contains_key(&entry.entity) {
                order.push(entry.entity.clone());
            }
            *weight.entry(entry.entity.clone()).or_insert(0) += 1;
        }
        if sort_info.order == SortOrder::Weighted {
            order.sort_by(|a, b| weight[b].cmp(&weight[a]));
        }
        order.truncate(limit);
        self.enrich(order)
    }

    /// Re-fetches full metadata for the matched entities in both scopes.
    /// Entities whose metadata disappeared entirely since the match are
    /// dropped.
    fn enrich(&self, entities: Vec<EntityId>) -> StoreResult<Vec<SearchResultRecord>> {
        let user_records = self.user.read(|snap| snap.get_metadata(&entities))?;
        let system_records = self.system.read(|snap| snap.get_metadata(&entities))?;
        let mut results = Vec::new();
        for (user, system) in user_records.into_iter().zip(system_records) {
            let entity = user.entity.clone();
            let user_meta = user.metadata();
            let system_meta = system.metadata();
            if user_meta.is_empty() && system_meta.is_empty() {
                continue;
            }
            let mut metadata = BTreeMap::new();
            if !user_meta.is_empty() {
                metadata.insert(Scope::User, user_meta);
            }
            if !system_meta.is_empty() {
                metadata.insert(Scope::System, system_meta);
            }
            results.push(SearchResultRecord { entity, metadata });
        }
        Ok(results)
    }

    // ---- Index maintenance ----

    /// Rebuilds all postings from the value rows with the default indexer,
    /// one batch per transaction, system scope first.
    pub fn rebuild_indexes(&self) -> StoreResult<()> {
        self.rebuild_indexes_with(&DefaultIndexer)
    }

    pub fn rebuild_indexes_with(&self, indexer: &dyn Indexer) -> StoreResult<()> {
        for catalog in [&self.system, &self.user] {
            let mut cursor: Option<String> = None;
            loop {
                let next = catalog.execute(|txn| {
                    txn.rebuild_indexes(cursor.as_deref(), indexer, self.index_batch_size)
                })?;
                debug!(scope = %catalog.scope(), "rebuilt a batch of metadata indexes");
                match next {
                    Some(key) => cursor = Some(key),
                    None => break,
                }
            }
        }
        Ok(())
    }

    /// Deletes every posting row, one batch per transaction, system scope
    /// first. Running this then [`Self::rebuild_indexes`] upgrades the index
    /// across an indexer change.
    pub fn delete_all_indexes(&self) -> StoreResult<()> {
        for catalog in [&self.system, &self.user] {
            loop {
                let deleted =
                    catalog.execute(|txn| txn.delete_all_indexes(self.index_batch_size))?;
                debug!(scope = %catalog.scope(), deleted, "deleted a batch of metadata indexes");
                if deleted == 0 {
                    break;
                }
            }
        }
        Ok(())
    }

    fn publish(
        &self,
        previous: MetadataRecord,
        additions: MetadataRecord,
        deletions: MetadataRecord,
    ) {
        let Some(sink) = &self.audit else {
            return;
        };
        let change = MetadataChange {
            previous,
            additions,
            deletions,
        };
        if let Err(e) = sink.publish(change) {
            warn!("failed to publish metadata change: {e}");
        }
    }
}

fn record(entity: &EntityId, scope: Scope, metadata: Metadata) -> MetadataRecord {
    MetadataRecord::new(entity.clone(), scope, metadata)
}

fn properties_record(
    entity: &EntityId,
    scope: Scope,
    properties: BTreeMap<String, String>,
) -> MetadataRecord {
    MetadataRecord::new(
        entity.clone(),
        scope,
        Metadata::new(properties, BTreeSet::new()),
    )
}

fn tags_record(entity: &EntityId, scope: Scope, tags: BTreeSet<String>) -> MetadataRecord {
    MetadataRecord::new(entity.clone(), scope, Metadata::new(BTreeMap::new(), tags))
}
