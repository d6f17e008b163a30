//! The local store: versioned collections with secondary indexes.

use crate::change_feed::{ChangeEvent, ChangeFeed};
use crate::error::{StoreError, StoreResult};
use crate::file::FileMedium;
use crate::medium::{StorageMedium, StorageUsage};
use crate::memory::MemoryMedium;
use crate::migration::MigrationRunner;
use crate::record::Record;
use crate::schema::{SchemaCatalog, CATALOG_REGION};
use crate::sink::{Mutation, MutationOp, MutationSink};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{info, warn};

/// Region name prefix for collection data.
const COLLECTION_REGION_PREFIX: &str = "collection.";

fn region_for(collection: &str) -> String {
    format!("{COLLECTION_REGION_PREFIX}{collection}")
}

/// Serializes a JSON value into a stable index key.
fn index_key(value: &Value) -> String {
    value.to_string()
}

/// In-memory state of one collection: records plus maintained indexes.
struct CollectionState {
    key_field: String,
    index_fields: HashMap<String, String>,
    records: BTreeMap<String, Record>,
    /// index name -> index key -> record ids
    indexes: HashMap<String, BTreeMap<String, BTreeSet<String>>>,
}

impl CollectionState {
    fn new(key_field: String, index_fields: HashMap<String, String>) -> Self {
        let indexes = index_fields
            .keys()
            .map(|name| (name.clone(), BTreeMap::new()))
            .collect();
        Self {
            key_field,
            index_fields,
            records: BTreeMap::new(),
            indexes,
        }
    }

    fn from_records(
        key_field: String,
        index_fields: HashMap<String, String>,
        records: Vec<Record>,
    ) -> Self {
        let mut state = Self::new(key_field, index_fields);
        for record in records {
            state.insert(record);
        }
        state
    }

    fn index_entries(&self, record: &Record) -> Vec<(String, String)> {
        self.index_fields
            .iter()
            .filter_map(|(name, field)| {
                record
                    .field(field)
                    .filter(|v| !v.is_null())
                    .map(|v| (name.clone(), index_key(v)))
            })
            .collect()
    }

    fn unindex(&mut self, record: &Record) {
        for (index, key) in self.index_entries(record) {
            if let Some(keys) = self.indexes.get_mut(&index) {
                if let Some(ids) = keys.get_mut(&key) {
                    ids.remove(&record.id);
                    if ids.is_empty() {
                        keys.remove(&key);
                    }
                }
            }
        }
    }

    fn insert(&mut self, record: Record) -> Option<Record> {
        let previous = self.records.remove(&record.id);
        if let Some(ref prev) = previous {
            self.unindex(prev);
        }
        for (index, key) in self.index_entries(&record) {
            self.indexes
                .entry(index)
                .or_default()
                .entry(key)
                .or_default()
                .insert(record.id.clone());
        }
        self.records.insert(record.id.clone(), record);
        previous
    }

    fn remove(&mut self, id: &str) -> Option<Record> {
        let previous = self.records.remove(id);
        if let Some(ref prev) = previous {
            self.unindex(prev);
        }
        previous
    }

    fn lookup(&self, index: &str, value: &Value) -> Vec<Record> {
        let key = index_key(value);
        self.indexes
            .get(index)
            .and_then(|keys| keys.get(&key))
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.records.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn all(&self) -> Vec<Record> {
        self.records.values().cloned().collect()
    }
}

/// Durable, versioned local storage with named collections.
///
/// All writes are serialized by a store-wide lock and persisted before
/// they return; reads are concurrent and immediately see prior writes.
/// When a [`MutationSink`] is attached, each write notifies it inside
/// the write path: sink failure rolls the write back, so a write and its
/// queue entry succeed or fail together.
pub struct LocalStore {
    medium: Arc<dyn StorageMedium>,
    catalog: RwLock<SchemaCatalog>,
    collections: RwLock<HashMap<String, CollectionState>>,
    sink: RwLock<Option<Arc<dyn MutationSink>>>,
    feed: ChangeFeed,
    write_lock: Mutex<()>,
}

impl LocalStore {
    /// Opens the store on the given medium, running pending migrations.
    pub fn open(medium: Arc<dyn StorageMedium>, runner: &MigrationRunner) -> StoreResult<Self> {
        runner.validate()?;

        let mut catalog = match medium.read_region(CATALOG_REGION)? {
            Some(bytes) => SchemaCatalog::decode(&bytes)?,
            None => SchemaCatalog::new(),
        };

        let applied = runner.run_pending(&mut catalog)?;
        if applied > 0 {
            medium.write_region(CATALOG_REGION, &catalog.encode()?)?;
        }

        let mut collections = HashMap::new();
        for (name, spec) in &catalog.collections {
            let records: Vec<Record> = match medium.read_region(&region_for(name))? {
                Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                    StoreError::corrupted(format!("collection {name} region unreadable: {e}"))
                })?,
                None => Vec::new(),
            };
            let index_fields = spec
                .indexes
                .iter()
                .map(|i| (i.name.clone(), i.field.clone()))
                .collect();
            collections.insert(
                name.clone(),
                CollectionState::from_records(spec.key_field.clone(), index_fields, records),
            );
        }

        info!(
            version = catalog.version,
            collections = collections.len(),
            persistent = medium.persistent(),
            "local store opened"
        );

        Ok(Self {
            medium,
            catalog: RwLock::new(catalog),
            collections: RwLock::new(collections),
            sink: RwLock::new(None),
            feed: ChangeFeed::new(),
            write_lock: Mutex::new(()),
        })
    }

    /// Opens the store at `dir`, degrading to a memory-only medium when
    /// the directory is unavailable (locked, unwritable).
    ///
    /// Returns the store and a flag that is true when running degraded.
    /// Degraded operation keeps the application working; data written in
    /// that mode does not survive the process.
    pub fn open_or_memory(
        dir: impl AsRef<Path>,
        runner: &MigrationRunner,
    ) -> StoreResult<(Self, bool)> {
        match FileMedium::open(dir.as_ref()) {
            Ok(medium) => Ok((Self::open(Arc::new(medium), runner)?, false)),
            Err(StoreError::Unavailable { message }) => {
                warn!(%message, "persistent storage unavailable, falling back to memory");
                let store = Self::open(Arc::new(MemoryMedium::new()), runner)?;
                Ok((store, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Attaches the mutation sink. Subsequent writes notify it.
    pub fn attach_sink(&self, sink: Arc<dyn MutationSink>) {
        *self.sink.write() = Some(sink);
    }

    /// Detaches the mutation sink. Subsequent writes are local-only.
    pub fn detach_sink(&self) {
        *self.sink.write() = None;
    }

    /// Subscribes to the change feed.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Upserts a record by its primary key field.
    ///
    /// Returns the stored record. If a sink is attached and rejects the
    /// mutation, the write is rolled back and `SinkRejected` is
    /// returned.
    pub fn put(&self, collection: &str, payload: Value) -> StoreResult<Record> {
        let _write = self.write_lock.lock();

        let key_field = self.key_field(collection)?;
        let record = Record::from_payload(collection, &key_field, payload)?;

        let previous = {
            let mut collections = self.collections.write();
            let state = collections.get_mut(collection).ok_or_else(|| {
                StoreError::CollectionNotFound {
                    name: collection.to_string(),
                }
            })?;
            state.insert(record.clone())
        };
        let existed = previous.is_some();

        if let Err(e) = self.persist_collection(collection) {
            self.restore_record(collection, &record.id, previous);
            return Err(e);
        }

        if let Some(sink) = self.current_sink() {
            let mutation = Mutation {
                op: if existed {
                    MutationOp::Update
                } else {
                    MutationOp::Create
                },
                collection: collection.to_string(),
                record_id: record.id.clone(),
                payload: Some(record.payload.clone()),
            };
            if let Err(e) = sink.on_mutation(mutation) {
                self.restore_record(collection, &record.id, previous);
                if let Err(persist_err) = self.persist_collection(collection) {
                    warn!(%persist_err, collection, "rollback persist failed after sink rejection");
                }
                return Err(StoreError::sink_rejected(e.to_string()));
            }
        }

        let event = if existed {
            ChangeEvent::updated(collection, record.id.clone(), record.payload.clone())
        } else {
            ChangeEvent::created(collection, record.id.clone(), record.payload.clone())
        };
        self.feed.emit(event);

        Ok(record)
    }

    /// Fetches a record by primary key.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        let collections = self.collections.read();
        let state = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })?;
        Ok(state.records.get(id).cloned())
    }

    /// Returns every record in a collection, ordered by primary key.
    pub fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read();
        let state = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })?;
        Ok(state.all())
    }

    /// Returns records whose indexed field equals `value`.
    pub fn get_all_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Record>> {
        let collections = self.collections.read();
        let state = collections
            .get(collection)
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })?;
        if !state.index_fields.contains_key(index) {
            return Err(StoreError::IndexNotFound {
                collection: collection.to_string(),
                index: index.to_string(),
            });
        }
        Ok(state.lookup(index, value))
    }

    /// Deletes a record by primary key.
    ///
    /// Returns true if a record was removed. Deleting an absent record
    /// is a no-op and does not notify the sink.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        let _write = self.write_lock.lock();

        let previous = {
            let mut collections = self.collections.write();
            let state = collections.get_mut(collection).ok_or_else(|| {
                StoreError::CollectionNotFound {
                    name: collection.to_string(),
                }
            })?;
            state.remove(id)
        };

        let Some(previous) = previous else {
            return Ok(false);
        };

        if let Err(e) = self.persist_collection(collection) {
            self.restore_record(collection, id, Some(previous));
            return Err(e);
        }

        if let Some(sink) = self.current_sink() {
            let mutation = Mutation {
                op: MutationOp::Delete,
                collection: collection.to_string(),
                record_id: id.to_string(),
                payload: None,
            };
            if let Err(e) = sink.on_mutation(mutation) {
                self.restore_record(collection, id, Some(previous));
                if let Err(persist_err) = self.persist_collection(collection) {
                    warn!(%persist_err, collection, "rollback persist failed after sink rejection");
                }
                return Err(StoreError::sink_rejected(e.to_string()));
            }
        }

        self.feed.emit(ChangeEvent::deleted(collection, id));
        Ok(true)
    }

    /// Exports every collection's records.
    pub fn export_all(&self) -> StoreResult<BTreeMap<String, Vec<Record>>> {
        let collections = self.collections.read();
        let mut out = BTreeMap::new();
        for (name, state) in collections.iter() {
            out.insert(name.clone(), state.all());
        }
        Ok(out)
    }

    /// Upserts records from an export into their collections.
    ///
    /// Bulk imports bypass the mutation sink; only a reload event per
    /// collection is emitted.
    pub fn import_all(&self, data: BTreeMap<String, Vec<Record>>) -> StoreResult<()> {
        self.bulk_apply(data, false)
    }

    /// Atomically replaces all collection data with the given export.
    ///
    /// Collections absent from `data` end up empty. Used by restore:
    /// existing data is only cleared once the replacement has been
    /// validated.
    pub fn replace_all(&self, data: BTreeMap<String, Vec<Record>>) -> StoreResult<()> {
        self.bulk_apply(data, true)
    }

    /// Wipes every collection. Meta and queue regions are untouched.
    pub fn clear_all(&self) -> StoreResult<()> {
        self.bulk_apply(BTreeMap::new(), true)
    }

    /// Returns space usage and quota from the medium.
    pub fn usage(&self) -> StoreResult<StorageUsage> {
        self.medium.usage()
    }

    /// Current schema version.
    #[must_use]
    pub fn schema_version(&self) -> u64 {
        self.catalog.read().version
    }

    /// Names of all declared collections.
    #[must_use]
    pub fn collection_names(&self) -> Vec<String> {
        self.catalog.read().collection_names()
    }

    /// True when the underlying medium survives process restart.
    #[must_use]
    pub fn persistent(&self) -> bool {
        self.medium.persistent()
    }

    /// The underlying medium, shared with sibling areas (meta, queue).
    #[must_use]
    pub fn medium(&self) -> Arc<dyn StorageMedium> {
        Arc::clone(&self.medium)
    }

    /// Builds a [`Record`] for a collection from a raw payload, using
    /// the collection's declared key field.
    ///
    /// Used by backup/restore layers that exchange raw payloads.
    pub fn record_from_payload(&self, collection: &str, payload: Value) -> StoreResult<Record> {
        let key_field = self.key_field(collection)?;
        Record::from_payload(collection, &key_field, payload)
    }

    fn key_field(&self, collection: &str) -> StoreResult<String> {
        self.catalog
            .read()
            .collection(collection)
            .map(|spec| spec.key_field.clone())
            .ok_or_else(|| StoreError::CollectionNotFound {
                name: collection.to_string(),
            })
    }

    fn current_sink(&self) -> Option<Arc<dyn MutationSink>> {
        self.sink.read().clone()
    }

    fn persist_collection(&self, collection: &str) -> StoreResult<()> {
        let bytes = {
            let collections = self.collections.read();
            let state = collections.get(collection).ok_or_else(|| {
                StoreError::CollectionNotFound {
                    name: collection.to_string(),
                }
            })?;
            serde_json::to_vec(&state.all())?
        };
        self.medium.write_region(&region_for(collection), &bytes)
    }

    fn restore_record(&self, collection: &str, id: &str, previous: Option<Record>) {
        let mut collections = self.collections.write();
        if let Some(state) = collections.get_mut(collection) {
            match previous {
                Some(record) => {
                    state.insert(record);
                }
                None => {
                    state.remove(id);
                }
            }
        }
    }

    /// Shared implementation of import/replace/clear.
    ///
    /// Validates the incoming data fully before touching any state, then
    /// swaps and persists. On a persist failure the previous states are
    /// restored and re-persisted best-effort.
    fn bulk_apply(&self, data: BTreeMap<String, Vec<Record>>, replace: bool) -> StoreResult<()> {
        let _write = self.write_lock.lock();

        // Validate against the catalog before mutating anything.
        let catalog = self.catalog.read().clone();
        for (name, records) in &data {
            let spec =
                catalog
                    .collection(name)
                    .ok_or_else(|| StoreError::CollectionNotFound {
                        name: name.clone(),
                    })?;
            for record in records {
                let derived =
                    Record::from_payload(name, &spec.key_field, record.payload.clone())?;
                if derived.id != record.id {
                    return Err(StoreError::corrupted(format!(
                        "record id {} does not match key field in collection {name}",
                        record.id
                    )));
                }
            }
        }

        let affected: Vec<String> = if replace {
            catalog.collection_names()
        } else {
            data.keys().cloned().collect()
        };

        // Snapshot for rollback, then apply in memory.
        let mut snapshots: HashMap<String, Vec<Record>> = HashMap::new();
        {
            let mut collections = self.collections.write();
            for name in &affected {
                if let Some(state) = collections.get_mut(name) {
                    snapshots.insert(name.clone(), state.all());
                    if replace {
                        state.records.clear();
                        for keys in state.indexes.values_mut() {
                            keys.clear();
                        }
                    }
                    if let Some(records) = data.get(name) {
                        for record in records.clone() {
                            state.insert(record);
                        }
                    }
                }
            }
        }

        // Persist all affected collections; roll back on failure.
        for name in &affected {
            if let Err(e) = self.persist_collection(name) {
                let mut collections = self.collections.write();
                for (snap_name, records) in snapshots.drain() {
                    if let Some(state) = collections.get_mut(&snap_name) {
                        state.records.clear();
                        for keys in state.indexes.values_mut() {
                            keys.clear();
                        }
                        for record in records {
                            state.insert(record);
                        }
                    }
                }
                drop(collections);
                for snap_name in &affected {
                    if let Err(persist_err) = self.persist_collection(snap_name) {
                        warn!(%persist_err, collection = %snap_name, "rollback persist failed");
                    }
                }
                return Err(e);
            }
        }

        for name in &affected {
            self.feed.emit(ChangeEvent::reloaded(name.clone()));
        }

        Ok(())
    }
}

impl std::fmt::Debug for LocalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalStore")
            .field("schema_version", &self.schema_version())
            .field("collections", &self.collection_names())
            .finish_non_exhaustive()
    }
}
