//! Queue items: pending outbound mutations with retry state.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default number of delivery attempts before an item is marked failed.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// The kind of mutation a queue item records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueOp {
    /// A record was created (no previous version existed).
    Create,
    /// A record was updated (a previous version existed).
    Update,
    /// A record was deleted.
    Delete,
}

impl QueueOp {
    /// Returns true for delete operations.
    #[must_use]
    pub fn is_delete(&self) -> bool {
        matches!(self, QueueOp::Delete)
    }

    /// Returns the operation name as a static string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueOp::Create => "create",
            QueueOp::Update => "update",
            QueueOp::Delete => "delete",
        }
    }
}

/// Lifecycle state of a queue item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueItemStatus {
    /// Waiting to be pushed to the remote.
    Pending,
    /// Successfully pushed; the item is about to be removed.
    Completed,
    /// Retry budget exhausted; retained for diagnostics.
    Failed,
}

/// One pending outbound mutation.
///
/// Queue items are created when a local write occurs while sync is
/// enabled, carry a deep copy of the payload taken at enqueue time, and
/// are mutated only by the drain loop as delivery attempts succeed or
/// fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Unique item identifier.
    pub id: Uuid,
    /// The mutation kind.
    pub op: QueueOp,
    /// Collection the mutation applies to.
    pub collection: String,
    /// Primary key of the affected record.
    pub record_id: String,
    /// Deep copy of the record payload at enqueue time. None for deletes.
    pub payload: Option<Value>,
    /// Enqueue time, Unix millis.
    pub enqueued_at_ms: u64,
    /// Number of failed delivery attempts so far.
    pub retry_count: u32,
    /// Attempts allowed before the item is marked failed.
    pub max_retries: u32,
    /// Current lifecycle state.
    pub status: QueueItemStatus,
}

impl QueueItem {
    /// Creates a new pending item with a fresh id and zero retries.
    #[must_use]
    pub fn new(
        op: QueueOp,
        collection: impl Into<String>,
        record_id: impl Into<String>,
        payload: Option<Value>,
        enqueued_at_ms: u64,
        max_retries: u32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            op,
            collection: collection.into(),
            record_id: record_id.into(),
            payload,
            enqueued_at_ms,
            retry_count: 0,
            max_retries,
            status: QueueItemStatus::Pending,
        }
    }

    /// Returns true if the item is still awaiting delivery.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == QueueItemStatus::Pending
    }

    /// Returns true if the item has exhausted its retry budget.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == QueueItemStatus::Failed
    }

    /// Records one failed delivery attempt.
    ///
    /// Increments the retry counter and transitions to
    /// [`QueueItemStatus::Failed`] once `max_retries` attempts have been
    /// spent. Failed items stay in the queue for operator visibility.
    pub fn record_failed_attempt(&mut self) {
        self.retry_count += 1;
        if self.retry_count >= self.max_retries {
            self.status = QueueItemStatus::Failed;
        }
    }

    /// Resets a failed item back to pending with a fresh retry budget.
    ///
    /// This is the explicit operator re-queue action; it has no effect on
    /// items that are not failed.
    pub fn requeue(&mut self) {
        if self.status == QueueItemStatus::Failed {
            self.status = QueueItemStatus::Pending;
            self.retry_count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn make_item() -> QueueItem {
        QueueItem::new(
            QueueOp::Create,
            "tasks",
            "t1",
            Some(json!({"id": "t1", "title": "stretch"})),
            1_700_000_000_000,
            DEFAULT_MAX_RETRIES,
        )
    }

    #[test]
    fn new_item_is_pending() {
        let item = make_item();
        assert!(item.is_pending());
        assert_eq!(item.retry_count, 0);
        assert_eq!(item.status, QueueItemStatus::Pending);
    }

    #[test]
    fn fails_after_max_retries() {
        let mut item = make_item();

        item.record_failed_attempt();
        item.record_failed_attempt();
        assert!(item.is_pending());
        assert_eq!(item.retry_count, 2);

        item.record_failed_attempt();
        assert!(item.is_failed());
        assert_eq!(item.retry_count, 3);
    }

    #[test]
    fn requeue_resets_failed_item() {
        let mut item = make_item();
        for _ in 0..DEFAULT_MAX_RETRIES {
            item.record_failed_attempt();
        }
        assert!(item.is_failed());

        item.requeue();
        assert!(item.is_pending());
        assert_eq!(item.retry_count, 0);
    }

    #[test]
    fn requeue_ignores_pending_item() {
        let mut item = make_item();
        item.record_failed_attempt();
        item.requeue();
        // Still pending, retry count untouched
        assert!(item.is_pending());
        assert_eq!(item.retry_count, 1);
    }

    #[test]
    fn delete_has_no_payload() {
        let item = QueueItem::new(QueueOp::Delete, "tasks", "t1", None, 0, 3);
        assert!(item.op.is_delete());
        assert!(item.payload.is_none());
    }

    #[test]
    fn serde_roundtrip() {
        let item = make_item();
        let bytes = serde_json::to_vec(&item).unwrap();
        let decoded: QueueItem = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, item);
    }

    #[test]
    fn op_names() {
        assert_eq!(QueueOp::Create.as_str(), "create");
        assert_eq!(QueueOp::Update.as_str(), "update");
        assert_eq!(QueueOp::Delete.as_str(), "delete");
    }
}
