//! Change feed for observing committed writes.
//!
//! The feed replaces UI-framework event buses: interested parties
//! subscribe and receive events over a channel, with no coupling to any
//! rendering layer. Events are emitted only after the write has been
//! applied and persisted.

use parking_lot::RwLock;
use serde_json::Value;
use std::sync::mpsc::{self, Receiver, Sender};

/// What happened to a record or collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A record was created.
    Created,
    /// A record was updated.
    Updated,
    /// A record was deleted.
    Deleted,
    /// The collection was bulk-replaced (import, restore, clear).
    Reloaded,
}

/// A single event from the change feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Collection the change applies to.
    pub collection: String,
    /// Affected record, absent for bulk reloads.
    pub record_id: Option<String>,
    /// What happened.
    pub kind: ChangeKind,
    /// New payload for creates/updates.
    pub payload: Option<Value>,
}

impl ChangeEvent {
    /// Creates a record-created event.
    pub fn created(collection: impl Into<String>, record_id: impl Into<String>, payload: Value) -> Self {
        Self {
            collection: collection.into(),
            record_id: Some(record_id.into()),
            kind: ChangeKind::Created,
            payload: Some(payload),
        }
    }

    /// Creates a record-updated event.
    pub fn updated(collection: impl Into<String>, record_id: impl Into<String>, payload: Value) -> Self {
        Self {
            collection: collection.into(),
            record_id: Some(record_id.into()),
            kind: ChangeKind::Updated,
            payload: Some(payload),
        }
    }

    /// Creates a record-deleted event.
    pub fn deleted(collection: impl Into<String>, record_id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            record_id: Some(record_id.into()),
            kind: ChangeKind::Deleted,
            payload: None,
        }
    }

    /// Creates a bulk-reload event for a collection.
    pub fn reloaded(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            record_id: None,
            kind: ChangeKind::Reloaded,
            payload: None,
        }
    }
}

/// Distributes committed changes to subscribers.
///
/// Subscribers that have been dropped are pruned on the next emit.
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<ChangeEvent>>>,
}

impl ChangeFeed {
    /// Creates an empty feed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<ChangeEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an event to all live subscribers.
    pub fn emit(&self, event: ChangeEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subscribers_receive_events() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();

        feed.emit(ChangeEvent::created("tasks", "t1", json!({"id": "t1"})));

        let event = rx.recv().unwrap();
        assert_eq!(event.collection, "tasks");
        assert_eq!(event.record_id.as_deref(), Some("t1"));
        assert_eq!(event.kind, ChangeKind::Created);
    }

    #[test]
    fn multiple_subscribers() {
        let feed = ChangeFeed::new();
        let rx1 = feed.subscribe();
        let rx2 = feed.subscribe();

        feed.emit(ChangeEvent::deleted("tasks", "t1"));

        assert_eq!(rx1.recv().unwrap().kind, ChangeKind::Deleted);
        assert_eq!(rx2.recv().unwrap().kind, ChangeKind::Deleted);
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let feed = ChangeFeed::new();
        let rx = feed.subscribe();
        drop(rx);

        feed.emit(ChangeEvent::reloaded("tasks"));
        assert_eq!(feed.subscriber_count(), 0);
    }

    #[test]
    fn reload_event_has_no_record() {
        let event = ChangeEvent::reloaded("tasks");
        assert_eq!(event.record_id, None);
        assert_eq!(event.kind, ChangeKind::Reloaded);
        assert!(event.payload.is_none());
    }
}
