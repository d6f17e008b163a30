//! The sync engine state machine.

use crate::backup::{BackupManager, RestoreOutcome};
use crate::config::SyncConfig;
use crate::crypto::EncryptionContext;
use crate::error::{SyncError, SyncResult};
use crate::identity::DeviceIdentity;
use crate::queue::MutationLog;
use crate::status::{StatusFeed, SyncState, SyncStatus};
use crate::transport::RemoteBackup;
use crate::util::now_ms;
use parking_lot::{Mutex, RwLock};
use satchel_store::{LocalStore, MetaArea, MutationSink};
use satchel_sync_protocol::{MutationEnvelope, PortableBackup, QueueItem};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Meta area key the auth token persists under.
const AUTH_TOKEN_KEY: &str = "auth_token";
/// Meta area key the user id persists under.
const USER_ID_KEY: &str = "user_id";

/// An authenticated sync session: credentials plus derived key material.
struct Session {
    user_id: String,
    ctx: EncryptionContext,
}

/// Orchestrates queue draining against the remote backup service.
///
/// The engine owns the mutation log and the session state. It never
/// interrupts the foreground application: engine-level failures are
/// absorbed into [`SyncStatus`] and surfaced through the status feed.
///
/// State machine: `Offline → Syncing → Synced` on a clean drain,
/// `Syncing → Error` when items exhaust their retries or the cycle
/// aborts, and back to `Offline` on network loss or disable.
pub struct SyncEngine {
    store: Arc<LocalStore>,
    queue: Arc<MutationLog>,
    remote: Arc<dyn RemoteBackup>,
    config: SyncConfig,
    meta: MetaArea,
    device: DeviceIdentity,
    session: RwLock<Option<Session>>,
    online: AtomicBool,
    state: RwLock<SyncState>,
    last_sync_ms: RwLock<Option<u64>>,
    last_error: RwLock<Option<String>>,
    feed: StatusFeed,
    /// Held for the duration of a drain cycle; `try_lock` makes a
    /// concurrent drain request a no-op.
    drain_lock: Mutex<()>,
}

impl SyncEngine {
    /// Creates an engine over the given store and remote.
    ///
    /// If credentials from a previous session are present in the meta
    /// area, the session is resumed: the key is re-derived and the
    /// store's mutation sink re-attached, so queueing continues across
    /// process restarts.
    pub fn new(
        store: Arc<LocalStore>,
        remote: Arc<dyn RemoteBackup>,
        config: SyncConfig,
    ) -> SyncResult<Self> {
        let meta = MetaArea::load(store.medium())?;
        let device = DeviceIdentity::load_or_create(&meta)?;
        let queue = Arc::new(MutationLog::load(store.medium(), config.max_item_retries)?);

        let session = match (meta.get(USER_ID_KEY), meta.get(AUTH_TOKEN_KEY)) {
            (Some(user_id), Some(token)) => match EncryptionContext::derive(&user_id, &token) {
                Ok(ctx) => {
                    info!(%user_id, "resumed sync session");
                    Some(Session { user_id, ctx })
                }
                Err(e) => {
                    warn!(error = %e, "stored credentials unusable, sync stays disabled");
                    None
                }
            },
            _ => None,
        };

        if session.is_some() {
            let sink: Arc<dyn MutationSink> = queue.clone();
            store.attach_sink(sink);
        }

        Ok(Self {
            store,
            queue,
            remote,
            config,
            meta,
            device,
            session: RwLock::new(session),
            online: AtomicBool::new(true),
            state: RwLock::new(SyncState::Offline),
            last_sync_ms: RwLock::new(None),
            last_error: RwLock::new(None),
            feed: StatusFeed::new(),
            drain_lock: Mutex::new(()),
        })
    }

    /// Enables sync with the given credentials.
    ///
    /// Derives the encryption context (failing closed on empty
    /// credentials), persists the session, attaches the queue to the
    /// store's write path, and performs an immediate full backup when
    /// configured and online. The initial backup failing does not
    /// disable sync; it is reflected in the status and retried by later
    /// cycles.
    pub fn enable_sync(&self, token: &str, user_id: &str) -> SyncResult<SyncStatus> {
        let ctx = EncryptionContext::derive(user_id, token)?;

        self.meta.set(USER_ID_KEY, user_id)?;
        self.meta.set(AUTH_TOKEN_KEY, token)?;
        *self.session.write() = Some(Session {
            user_id: user_id.to_string(),
            ctx,
        });

        let sink: Arc<dyn MutationSink> = self.queue.clone();
        self.store.attach_sink(sink);
        info!(%user_id, "sync enabled");

        if self.config.backup_on_enable && self.is_online() {
            if let Err(e) = self.backup_now() {
                warn!(error = %e, "initial backup failed");
                self.set_error(format!("initial backup failed: {e}"));
                return Ok(self.emit_status());
            }
            *self.state.write() = SyncState::Synced;
            *self.last_sync_ms.write() = Some(now_ms());
        }

        Ok(self.emit_status())
    }

    /// Disables sync: detaches the sink, clears the queue, drops the
    /// encryption context, and forgets the stored credentials.
    pub fn disable_sync(&self) -> SyncResult<SyncStatus> {
        self.store.detach_sink();
        self.queue.clear()?;
        *self.session.write() = None;
        self.meta.remove(AUTH_TOKEN_KEY)?;
        self.meta.remove(USER_ID_KEY)?;
        *self.state.write() = SyncState::Offline;
        *self.last_error.write() = None;
        info!("sync disabled");

        Ok(self.emit_status())
    }

    /// Reacts to a network availability change.
    ///
    /// Going online triggers an immediate drain attempt when a session
    /// exists; going offline parks the engine without draining.
    pub fn on_network_change(&self, online: bool) -> SyncStatus {
        self.online.store(online, Ordering::SeqCst);

        if online {
            debug!("network available");
            // Guard dropped before draining; force_sync re-reads the
            // session itself.
            let has_session = self.session.read().is_some();
            if has_session {
                if let Err(e) = self.force_sync() {
                    debug!(error = %e, "drain on reconnect failed");
                }
            }
        } else {
            debug!("network lost");
            *self.state.write() = SyncState::Offline;
        }

        self.emit_status()
    }

    /// Runs one full drain cycle and returns the resulting status.
    ///
    /// Fails with [`SyncError::NotAuthenticated`] when no session
    /// exists. While offline, no drain is attempted. A cycle already in
    /// flight makes this call a no-op returning the current status; the
    /// running cycle's next scheduled run picks up newer items.
    pub fn force_sync(&self) -> SyncResult<SyncStatus> {
        if self.session.read().is_none() {
            return Err(SyncError::NotAuthenticated);
        }

        if !self.is_online() {
            *self.state.write() = SyncState::Offline;
            return Ok(self.emit_status());
        }

        let Some(_guard) = self.drain_lock.try_lock() else {
            return Ok(self.status());
        };

        *self.state.write() = SyncState::Syncing;
        self.feed.emit(self.status());

        match self.queue.drain(|item| self.process_item(item)) {
            Ok(result) => {
                debug!(
                    completed = result.completed,
                    retried = result.retried,
                    failed = result.failed,
                    remaining = result.remaining,
                    "drain cycle finished"
                );
                if result.failed > 0 {
                    self.set_error(format!(
                        "{} item(s) exhausted their retry budget",
                        result.failed
                    ));
                } else {
                    *self.state.write() = SyncState::Synced;
                    *self.last_sync_ms.write() = Some(now_ms());
                    *self.last_error.write() = None;
                }
            }
            Err(e) => {
                // Aborted batch: unprocessed items stay pending.
                self.set_error(e.to_string());
            }
        }

        Ok(self.emit_status())
    }

    /// Creates a full backup and uploads it, retrying transport
    /// failures under the configured retry budget.
    pub fn backup_now(&self) -> SyncResult<()> {
        let record = {
            let session = self.session.read();
            let session = session.as_ref().ok_or(SyncError::NotAuthenticated)?;
            BackupManager::create_backup(
                &self.store,
                &session.ctx,
                self.device.id(),
                &session.user_id,
            )?
        };
        self.with_retry(|| self.remote.put_backup(&record))
    }

    /// Fetches the newest remote backup and applies it, replacing local
    /// data only after decryption and checksum verification succeed.
    pub fn restore_from_remote(&self) -> SyncResult<RestoreOutcome> {
        let session = self.session.read();
        let session = session.as_ref().ok_or(SyncError::NotAuthenticated)?;

        let record = self
            .with_retry(|| self.remote.latest_backup(&session.user_id))?
            .ok_or(SyncError::NoRemoteBackup)?;

        BackupManager::apply_backup(&self.store, &session.ctx, &record)
    }

    /// Produces the portable export.
    ///
    /// Requires neither network nor authentication; available no matter
    /// what state sync is in.
    pub fn export_manual(&self) -> SyncResult<PortableBackup> {
        BackupManager::export_portable(&self.store, self.device.id())
    }

    /// Verifies and imports a portable export, replacing local data.
    pub fn import_manual(&self, backup: &PortableBackup) -> SyncResult<u64> {
        BackupManager::import_portable(&self.store, backup)
    }

    /// Re-queues items that exhausted their retries. Explicit operator
    /// action; returns how many were re-queued.
    pub fn requeue_failed(&self) -> SyncResult<usize> {
        self.queue.requeue_failed()
    }

    /// Items currently held as failed, for diagnostics.
    #[must_use]
    pub fn failed_items(&self) -> Vec<QueueItem> {
        self.queue.failed_items()
    }

    /// A point-in-time status snapshot.
    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: *self.state.read(),
            last_sync_time_ms: *self.last_sync_ms.read(),
            error: self.last_error.read().clone(),
            is_authenticated: self.session.read().is_some(),
            is_online: self.is_online(),
            pending_items: self.queue.pending_count(),
            failed_items: self.queue.failed_count(),
        }
    }

    /// Subscribes to status changes.
    pub fn subscribe(&self) -> Receiver<SyncStatus> {
        self.feed.subscribe()
    }

    /// The stable device identity.
    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    /// The store this engine syncs.
    #[must_use]
    pub fn store(&self) -> &Arc<LocalStore> {
        &self.store
    }

    /// Whether the engine believes the network is reachable.
    #[must_use]
    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    fn process_item(&self, item: &QueueItem) -> SyncResult<()> {
        let session = self.session.read();
        // Fail closed if auth was lost mid-cycle; the drain aborts and
        // the item stays pending.
        let session = session.as_ref().ok_or(SyncError::NotAuthenticated)?;

        let encrypted_payload = match &item.payload {
            Some(value) => {
                let bytes = serde_json::to_vec(value)
                    .map_err(|e| SyncError::Protocol(format!("cannot encode payload: {e}")))?;
                Some(session.ctx.encrypt(&bytes)?)
            }
            None => None,
        };

        let envelope = MutationEnvelope {
            item_id: item.id,
            device_id: self.device.id().to_string(),
            user_id: session.user_id.clone(),
            op: item.op,
            collection: item.collection.clone(),
            record_id: item.record_id.clone(),
            encrypted_payload,
            timestamp_ms: item.enqueued_at_ms,
        };

        self.remote.push_item(&envelope)
    }

    fn set_error(&self, message: String) {
        warn!(%message, "sync error");
        *self.state.write() = SyncState::Error;
        *self.last_error.write() = Some(message);
    }

    fn emit_status(&self) -> SyncStatus {
        let status = self.status();
        self.feed.emit(status.clone());
        status
    }

    fn with_retry<T>(&self, mut op: impl FnMut() -> SyncResult<T>) -> SyncResult<T> {
        let retry = &self.config.retry;
        let mut last: Option<SyncError> = None;

        for attempt in 0..retry.max_attempts {
            if attempt > 0 {
                std::thread::sleep(retry.delay_for_attempt(attempt));
            }
            match op() {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if e.is_retryable() && attempt + 1 < retry.max_attempts {
                        debug!(error = %e, attempt, "retrying remote call");
                        last = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last.unwrap_or_else(|| SyncError::Protocol("no attempts made".into())))
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("state", &*self.state.read())
            .field("pending", &self.queue.pending_count())
            .finish_non_exhaustive()
    }
}
