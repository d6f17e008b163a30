//! Sync status reporting and subscription.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// The externally visible state of the sync engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No network, or sync never enabled.
    Offline,
    /// A drain cycle is in flight.
    Syncing,
    /// The last drain completed with nothing left behind.
    Synced,
    /// The last drain left failed items or hit an engine error.
    Error,
}

/// A point-in-time snapshot of sync health.
///
/// Cheap to recompute; nothing here is persisted beyond the session.
/// The pending and failed counters exist so queue trouble is
/// discoverable from a status indicator.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncStatus {
    /// Current engine state.
    pub state: SyncState,
    /// When the last successful drain finished, Unix millis.
    pub last_sync_time_ms: Option<u64>,
    /// Human-readable description of the last failure.
    pub error: Option<String>,
    /// Whether an encryption context currently exists.
    pub is_authenticated: bool,
    /// Whether the engine believes the network is reachable.
    pub is_online: bool,
    /// Items awaiting delivery.
    pub pending_items: usize,
    /// Items that exhausted their retry budget.
    pub failed_items: usize,
}

impl SyncStatus {
    /// The status before sync has ever been enabled.
    #[must_use]
    pub fn offline() -> Self {
        Self {
            state: SyncState::Offline,
            last_sync_time_ms: None,
            error: None,
            is_authenticated: false,
            is_online: true,
            pending_items: 0,
            failed_items: 0,
        }
    }
}

/// Broadcasts status snapshots to subscribers.
///
/// This replaces UI-framework event buses: consumers subscribe and
/// receive every status change over a channel. Dropped subscribers are
/// pruned on the next emit.
#[derive(Default)]
pub struct StatusFeed {
    subscribers: RwLock<Vec<Sender<SyncStatus>>>,
}

impl StatusFeed {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future status changes.
    pub fn subscribe(&self) -> Receiver<SyncStatus> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits a status snapshot to all live subscribers.
    pub fn emit(&self, status: SyncStatus) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(status.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for StatusFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
