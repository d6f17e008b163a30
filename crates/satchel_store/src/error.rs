//! Error types for the local store.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in local store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The persistence medium cannot be used at all (directory locked by
    /// another process, unwritable path, private-browsing storage).
    /// Callers should degrade to a memory-only medium, not crash.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Description of why the medium is unavailable.
        message: String,
    },

    /// An I/O error occurred on an otherwise usable medium.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON encoding or decoding of a region failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Persisted data is malformed.
    #[error("store corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// A write would exceed the storage quota.
    #[error("quota exceeded: {needed} bytes needed, {quota} byte quota")]
    QuotaExceeded {
        /// Total bytes the write would require.
        needed: u64,
        /// The configured quota.
        quota: u64,
    },

    /// The named collection is not declared in the schema catalog.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// The named index does not exist on the collection.
    #[error("index not found: {index} on collection {collection}")]
    IndexNotFound {
        /// The collection searched.
        collection: String,
        /// The index name.
        index: String,
    },

    /// A record payload is missing its primary key field, or the key is
    /// not a string.
    #[error("record in collection {collection} has no string value for key field {key_field}")]
    MissingKeyField {
        /// The collection being written.
        collection: String,
        /// The declared primary key field.
        key_field: String,
    },

    /// A collection, index, or region name contains invalid characters.
    #[error("invalid name: {name}")]
    InvalidName {
        /// The offending name.
        name: String,
    },

    /// A schema migration could not be applied.
    #[error("migration failed: {message}")]
    MigrationFailed {
        /// Description of the failure.
        message: String,
    },

    /// The attached mutation sink rejected the write; the local change
    /// was rolled back.
    #[error("mutation sink rejected write: {message}")]
    SinkRejected {
        /// Description of the rejection.
        message: String,
    },
}

impl StoreError {
    /// Creates a storage unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Creates a migration failed error.
    pub fn migration_failed(message: impl Into<String>) -> Self {
        Self::MigrationFailed {
            message: message.into(),
        }
    }

    /// Creates a sink rejection error.
    pub fn sink_rejected(message: impl Into<String>) -> Self {
        Self::SinkRejected {
            message: message.into(),
        }
    }

    /// Creates an invalid name error.
    pub fn invalid_name(name: impl Into<String>) -> Self {
        Self::InvalidName { name: name.into() }
    }
}
