//! Mutation sink: the seam between the store and a sync layer.

use crate::error::StoreResult;
use serde_json::Value;

/// The kind of a committed mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOp {
    /// A record was created.
    Create,
    /// An existing record was overwritten.
    Update,
    /// A record was deleted.
    Delete,
}

/// One committed local mutation, as handed to the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    /// The mutation kind.
    pub op: MutationOp,
    /// Collection the mutation applies to.
    pub collection: String,
    /// Primary key of the affected record.
    pub record_id: String,
    /// Deep copy of the payload at write time. None for deletes.
    pub payload: Option<Value>,
}

/// Receives mutations synchronously with the local write.
///
/// The store calls the attached sink inside the write path: if the sink
/// returns an error, the local write is rolled back and the caller sees
/// `SinkRejected`. A sync layer implements this to append queue items so
/// that a write and its queue entry succeed or fail together.
pub trait MutationSink: Send + Sync {
    /// Records one mutation durably.
    fn on_mutation(&self, mutation: Mutation) -> StoreResult<()>;
}
