//! The sync service: an explicit context object for consumers.
//!
//! `SyncService` replaces module-level singletons with an injected
//! dependency: feature layers receive a handle and call it, nothing is
//! global. It owns the store, the engine, and the periodic drain task,
//! with an `init`/`shutdown` lifecycle.

use crate::backup::RestoreOutcome;
use crate::config::SyncConfig;
use crate::engine::SyncEngine;
use crate::error::SyncResult;
use crate::scheduler::PeriodicDrain;
use crate::status::SyncStatus;
use crate::transport::RemoteBackup;
use parking_lot::Mutex;
use satchel_store::{ChangeEvent, LocalStore, Record, StorageUsage, StoreResult};
use satchel_sync_protocol::{PortableBackup, QueueItem};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// The consumer-facing handle over the persistence and sync subsystem.
pub struct SyncService {
    store: Arc<LocalStore>,
    engine: Arc<SyncEngine>,
    periodic: Mutex<Option<PeriodicDrain>>,
    drain_interval: Duration,
}

impl SyncService {
    /// Initializes the service over an opened store and a remote.
    ///
    /// If a previous session is resumed from persisted credentials and
    /// a tokio runtime is available, periodic draining starts
    /// immediately.
    pub fn init(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteBackup>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let drain_interval = config.drain_interval;
        let engine = Arc::new(SyncEngine::new(Arc::clone(&store), remote, config)?);

        let service = Self {
            store,
            engine,
            periodic: Mutex::new(None),
            drain_interval,
        };

        if service.engine.status().is_authenticated {
            service.start_periodic();
        }

        Ok(service)
    }

    /// Stops background work and detaches the sync layer from the
    /// store's write path. The store stays usable for local reads and
    /// writes.
    pub fn shutdown(&self) {
        self.stop_periodic();
        self.store.detach_sink();
        info!("sync service shut down");
    }

    // Store operations

    /// Upserts a record. See [`LocalStore::put`].
    pub fn put(&self, collection: &str, payload: Value) -> StoreResult<Record> {
        self.store.put(collection, payload)
    }

    /// Fetches a record by id.
    pub fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Record>> {
        self.store.get(collection, id)
    }

    /// Returns all records in a collection.
    pub fn get_all(&self, collection: &str) -> StoreResult<Vec<Record>> {
        self.store.get_all(collection)
    }

    /// Returns records matching an indexed field value.
    pub fn get_all_by_index(
        &self,
        collection: &str,
        index: &str,
        value: &Value,
    ) -> StoreResult<Vec<Record>> {
        self.store.get_all_by_index(collection, index, value)
    }

    /// Deletes a record by id.
    pub fn delete(&self, collection: &str, id: &str) -> StoreResult<bool> {
        self.store.delete(collection, id)
    }

    /// Exports every collection.
    pub fn export_all(&self) -> StoreResult<BTreeMap<String, Vec<Record>>> {
        self.store.export_all()
    }

    /// Imports records into their collections.
    pub fn import_all(&self, data: BTreeMap<String, Vec<Record>>) -> StoreResult<()> {
        self.store.import_all(data)
    }

    /// Wipes every collection.
    pub fn clear_all(&self) -> StoreResult<()> {
        self.store.clear_all()
    }

    /// Storage usage and quota, for warning before writes start
    /// failing.
    pub fn usage(&self) -> StoreResult<StorageUsage> {
        self.store.usage()
    }

    /// Subscribes to store change events.
    pub fn subscribe_changes(&self) -> Receiver<ChangeEvent> {
        self.store.subscribe()
    }

    // Sync operations

    /// Current sync status.
    #[must_use]
    pub fn sync_status(&self) -> SyncStatus {
        self.engine.status()
    }

    /// Subscribes to sync status changes.
    pub fn subscribe_status(&self) -> Receiver<SyncStatus> {
        self.engine.subscribe()
    }

    /// Enables sync and starts periodic draining.
    pub fn enable_sync(&self, token: &str, user_id: &str) -> SyncResult<SyncStatus> {
        let status = self.engine.enable_sync(token, user_id)?;
        self.start_periodic();
        Ok(status)
    }

    /// Disables sync: stops the periodic task, clears the queue, drops
    /// the encryption context.
    pub fn disable_sync(&self) -> SyncResult<SyncStatus> {
        self.stop_periodic();
        self.engine.disable_sync()
    }

    /// Runs one drain cycle now.
    pub fn force_sync(&self) -> SyncResult<SyncStatus> {
        self.engine.force_sync()
    }

    /// Reports a network availability change.
    pub fn on_network_change(&self, online: bool) -> SyncStatus {
        self.engine.on_network_change(online)
    }

    /// Restores the newest remote backup over local data.
    pub fn restore_from_remote(&self) -> SyncResult<RestoreOutcome> {
        self.engine.restore_from_remote()
    }

    /// Produces the portable backup as downloadable JSON bytes.
    ///
    /// Always available: no network, no authentication, no sync engine
    /// involvement.
    pub fn export_manual_backup(&self) -> SyncResult<Vec<u8>> {
        Ok(self.engine.export_manual()?.to_json_bytes()?)
    }

    /// Verifies and imports a portable backup file.
    pub fn import_manual_backup(&self, bytes: &[u8]) -> SyncResult<u64> {
        let backup = PortableBackup::from_json_bytes(bytes)?;
        self.engine.import_manual(&backup)
    }

    /// Items that exhausted their retries.
    #[must_use]
    pub fn failed_items(&self) -> Vec<QueueItem> {
        self.engine.failed_items()
    }

    /// Re-queues failed items.
    pub fn requeue_failed(&self) -> SyncResult<usize> {
        self.engine.requeue_failed()
    }

    /// True while the periodic drain task is alive.
    #[must_use]
    pub fn periodic_running(&self) -> bool {
        self.periodic
            .lock()
            .as_ref()
            .map(PeriodicDrain::is_running)
            .unwrap_or(false)
    }

    /// The underlying engine.
    #[must_use]
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    fn start_periodic(&self) {
        let mut periodic = self.periodic.lock();
        if periodic.is_some() {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                *periodic = Some(PeriodicDrain::spawn_on(
                    &handle,
                    Arc::clone(&self.engine),
                    self.drain_interval,
                ));
            }
            Err(_) => warn!("no tokio runtime available, periodic sync not started"),
        }
    }

    fn stop_periodic(&self) {
        if let Some(periodic) = self.periodic.lock().take() {
            periodic.stop();
        }
    }
}

impl Drop for SyncService {
    fn drop(&mut self) {
        self.stop_periodic();
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("periodic_running", &self.periodic_running())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetryConfig;
    use crate::status::SyncState;
    use crate::transport::MockRemote;
    use satchel_store::{migrations, MemoryMedium, MigrationRunner};
    use serde_json::json;

    fn test_service(remote: Arc<MockRemote>) -> SyncService {
        let mut runner = MigrationRunner::new();
        runner
            .register(migrations::create_collection(1, "tasks", "id"))
            .unwrap();
        let store = Arc::new(LocalStore::open(Arc::new(MemoryMedium::new()), &runner).unwrap());
        let config = SyncConfig::new()
            .with_drain_interval(Duration::from_millis(20))
            .with_retry(RetryConfig::no_retry());
        SyncService::init(store, remote, config).unwrap()
    }

    #[tokio::test]
    async fn enable_starts_and_disable_stops_periodic() {
        let service = test_service(Arc::new(MockRemote::new()));
        assert!(!service.periodic_running());

        service.enable_sync("token-1", "alice").unwrap();
        assert!(service.periodic_running());

        service.disable_sync().unwrap();
        assert!(!service.periodic_running());
    }

    #[tokio::test]
    async fn enable_then_immediate_disable_leaves_nothing_behind() {
        // Enable followed immediately by disable must leave no queue
        // items, no credentials, and no background timer.
        let service = test_service(Arc::new(MockRemote::new()));

        service.enable_sync("token-1", "alice").unwrap();
        let status = service.disable_sync().unwrap();

        assert!(!status.is_authenticated);
        assert_eq!(status.pending_items, 0);
        assert!(!service.periodic_running());
    }

    #[tokio::test]
    async fn periodic_task_drains_writes() {
        let remote = Arc::new(MockRemote::new());
        let service = test_service(Arc::clone(&remote));
        service.enable_sync("token-1", "alice").unwrap();

        service.put("tasks", json!({"id": "t1"})).unwrap();
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(service.sync_status().pending_items, 0);
        assert_eq!(remote.pushed().len(), 1);
    }

    #[tokio::test]
    async fn manual_backup_roundtrip_through_bytes() {
        let service = test_service(Arc::new(MockRemote::new()));
        service.put("tasks", json!({"id": "t1", "title": "walk"})).unwrap();

        // Works without enable_sync ever being called
        let bytes = service.export_manual_backup().unwrap();

        service.clear_all().unwrap();
        let count = service.import_manual_backup(&bytes).unwrap();

        assert_eq!(count, 1);
        let record = service.get("tasks", "t1").unwrap().unwrap();
        assert_eq!(record.field("title"), Some(&json!("walk")));
    }

    #[tokio::test]
    async fn shutdown_stops_background_work_and_detaches_sink() {
        let service = test_service(Arc::new(MockRemote::new()));
        service.enable_sync("token-1", "alice").unwrap();

        service.shutdown();

        assert!(!service.periodic_running());
        // Writes after shutdown no longer enqueue
        service.put("tasks", json!({"id": "t1"})).unwrap();
        assert_eq!(service.sync_status().pending_items, 0);
    }

    #[test]
    fn init_without_runtime_still_works() {
        // No tokio runtime here: the service initializes, sync works
        // manually, only the periodic task is unavailable.
        let remote = Arc::new(MockRemote::new());
        let service = test_service(Arc::clone(&remote));

        service.enable_sync("token-1", "alice").unwrap();
        assert!(!service.periodic_running());

        service.put("tasks", json!({"id": "t1"})).unwrap();
        let status = service.force_sync().unwrap();
        assert_eq!(status.state, SyncState::Synced);
        assert_eq!(remote.pushed().len(), 1);
    }
}
