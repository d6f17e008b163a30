//! The mutation log: a durable queue of pending outbound mutations.
//!
//! The log persists in its own region, separate from the collection data
//! it describes, so delivery can be retried independently of the
//! originating writes and the queue survives process restarts.
//!
//! Items are processed in enqueue order within a drain, but completion
//! is not ordered: an item that fails stays behind while later items
//! complete. Enqueues arriving during a drain are untouched by that
//! drain (the pending set is snapshotted at drain start) and are picked
//! up by the next cycle.

use crate::error::{SyncError, SyncResult};
use crate::util::now_ms;
use parking_lot::Mutex;
use satchel_store::{Mutation, MutationOp, MutationSink, StorageMedium, StoreError, StoreResult};
use satchel_sync_protocol::{QueueItem, QueueOp};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Region the queue persists in.
pub const QUEUE_REGION: &str = "sync.queue";

/// Outcome of one drain cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainResult {
    /// Items attempted this cycle.
    pub processed: usize,
    /// Items delivered and removed.
    pub completed: usize,
    /// Items that failed but still have retry budget.
    pub retried: usize,
    /// Items that exhausted their budget this cycle.
    pub failed: usize,
    /// Pending items left in the queue after the cycle.
    pub remaining: usize,
}

impl DrainResult {
    /// True when nothing is pending and nothing failed.
    #[must_use]
    pub fn fully_drained(&self) -> bool {
        self.remaining == 0 && self.failed == 0 && self.retried == 0
    }
}

enum ItemOutcome {
    Completed,
    Failed,
}

/// A durable FIFO queue of pending mutations.
pub struct MutationLog {
    medium: Arc<dyn StorageMedium>,
    items: Mutex<Vec<QueueItem>>,
    max_retries: u32,
}

impl MutationLog {
    /// Loads the queue from its region, starting empty if absent.
    pub fn load(medium: Arc<dyn StorageMedium>, max_retries: u32) -> SyncResult<Self> {
        let items: Vec<QueueItem> = match medium.read_region(QUEUE_REGION)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| SyncError::Store(StoreError::corrupted(format!(
                    "queue region unreadable: {e}"
                ))))?,
            None => Vec::new(),
        };

        Ok(Self {
            medium,
            items: Mutex::new(items),
            max_retries,
        })
    }

    /// Appends a pending item for a committed mutation and persists the
    /// queue.
    pub fn enqueue(&self, mutation: Mutation) -> SyncResult<QueueItem> {
        let op = match mutation.op {
            MutationOp::Create => QueueOp::Create,
            MutationOp::Update => QueueOp::Update,
            MutationOp::Delete => QueueOp::Delete,
        };
        let item = QueueItem::new(
            op,
            mutation.collection,
            mutation.record_id,
            mutation.payload,
            now_ms(),
            self.max_retries,
        );

        let mut items = self.items.lock();
        items.push(item.clone());
        self.persist(&items)?;

        debug!(id = %item.id, op = op.as_str(), collection = %item.collection, "mutation enqueued");
        Ok(item)
    }

    /// Processes the currently pending items in enqueue order.
    ///
    /// `process` is called once per item. On success the item is removed;
    /// on a retryable failure its retry counter advances, marking it
    /// failed once the budget is spent. A non-retryable engine error
    /// ([`SyncError::NotAuthenticated`], [`SyncError::Cancelled`],
    /// [`SyncError::Disabled`]) aborts the remaining batch: outcomes so
    /// far are applied, unprocessed items stay pending, and the error
    /// propagates.
    pub fn drain<F>(&self, mut process: F) -> SyncResult<DrainResult>
    where
        F: FnMut(&QueueItem) -> SyncResult<()>,
    {
        // Snapshot the pending set; concurrent enqueues belong to the
        // next cycle.
        let snapshot: Vec<QueueItem> = {
            let items = self.items.lock();
            items.iter().filter(|i| i.is_pending()).cloned().collect()
        };

        let mut outcomes: Vec<(Uuid, ItemOutcome)> = Vec::with_capacity(snapshot.len());
        let mut abort: Option<SyncError> = None;

        for item in &snapshot {
            match process(item) {
                Ok(()) => outcomes.push((item.id, ItemOutcome::Completed)),
                Err(
                    e @ (SyncError::NotAuthenticated | SyncError::Cancelled | SyncError::Disabled),
                ) => {
                    warn!(item = %item.id, error = %e, "drain aborted");
                    abort = Some(e);
                    break;
                }
                Err(e) => {
                    debug!(item = %item.id, error = %e, "item delivery failed");
                    outcomes.push((item.id, ItemOutcome::Failed));
                }
            }
        }

        let result = self.apply_outcomes(snapshot.len(), outcomes)?;

        match abort {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    fn apply_outcomes(
        &self,
        processed: usize,
        outcomes: Vec<(Uuid, ItemOutcome)>,
    ) -> SyncResult<DrainResult> {
        let mut items = self.items.lock();
        let mut result = DrainResult {
            processed,
            ..DrainResult::default()
        };

        for (id, outcome) in outcomes {
            match outcome {
                ItemOutcome::Completed => {
                    items.retain(|i| i.id != id);
                    result.completed += 1;
                }
                ItemOutcome::Failed => {
                    if let Some(item) = items.iter_mut().find(|i| i.id == id) {
                        item.record_failed_attempt();
                        if item.is_failed() {
                            result.failed += 1;
                        } else {
                            result.retried += 1;
                        }
                    }
                }
            }
        }

        result.remaining = items.iter().filter(|i| i.is_pending()).count();
        self.persist(&items)?;
        Ok(result)
    }

    /// Empties the queue, including failed items.
    pub fn clear(&self) -> SyncResult<()> {
        let mut items = self.items.lock();
        items.clear();
        self.persist(&items)?;
        Ok(())
    }

    /// Resets all failed items back to pending. Returns how many were
    /// re-queued.
    pub fn requeue_failed(&self) -> SyncResult<usize> {
        let mut items = self.items.lock();
        let mut count = 0usize;
        for item in items.iter_mut() {
            if item.is_failed() {
                item.requeue();
                count += 1;
            }
        }
        if count > 0 {
            self.persist(&items)?;
        }
        Ok(count)
    }

    /// A copy of every item, in enqueue order.
    #[must_use]
    pub fn items(&self) -> Vec<QueueItem> {
        self.items.lock().clone()
    }

    /// Items that exhausted their retry budget.
    #[must_use]
    pub fn failed_items(&self) -> Vec<QueueItem> {
        self.items
            .lock()
            .iter()
            .filter(|i| i.is_failed())
            .cloned()
            .collect()
    }

    /// Number of items awaiting delivery.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.items.lock().iter().filter(|i| i.is_pending()).count()
    }

    /// Number of failed items.
    #[must_use]
    pub fn failed_count(&self) -> usize {
        self.items.lock().iter().filter(|i| i.is_failed()).count()
    }

    /// Total queue length.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    /// True when the queue holds no items at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }

    fn persist(&self, items: &[QueueItem]) -> StoreResult<()> {
        let bytes = serde_json::to_vec(items)?;
        self.medium.write_region(QUEUE_REGION, &bytes)
    }
}

impl MutationSink for MutationLog {
    fn on_mutation(&self, mutation: Mutation) -> StoreResult<()> {
        match self.enqueue(mutation) {
            Ok(_) => Ok(()),
            Err(SyncError::Store(e)) => Err(e),
            Err(other) => Err(StoreError::sink_rejected(other.to_string())),
        }
    }
}

impl std::fmt::Debug for MutationLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationLog")
            .field("pending", &self.pending_count())
            .field("failed", &self.failed_count())
            .finish()
    }
}
