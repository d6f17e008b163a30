//! Error types for the sync engine.

use satchel_sync_protocol::ProtocolError;
use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Errors that can occur during sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Sync was attempted without credentials or an encryption context.
    #[error("not authenticated: sync requires credentials")]
    NotAuthenticated,

    /// Network or remote error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// Local store error during sync.
    #[error("store error: {0}")]
    Store(#[from] satchel_store::StoreError),

    /// A restored snapshot failed integrity verification. Local data is
    /// left untouched when this is returned.
    #[error("integrity error: checksum expected {expected}, got {actual}")]
    Integrity {
        /// Checksum carried by the backup.
        expected: String,
        /// Checksum recomputed from the decrypted payload.
        actual: String,
    },

    /// Encryption or decryption failed.
    #[error("crypto error: {message}")]
    Crypto {
        /// Description of the failure.
        message: String,
    },

    /// A protocol structure could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No backup exists on the remote for this user.
    #[error("no remote backup available")]
    NoRemoteBackup,

    /// A network call exceeded its bounded timeout.
    #[error("operation timed out")]
    Timeout,

    /// The operation was cancelled.
    #[error("sync cancelled")]
    Cancelled,

    /// Sync is not enabled.
    #[error("sync is disabled")]
    Disabled,
}

impl SyncError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Creates a crypto error.
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Crypto {
            message: message.into(),
        }
    }

    /// Returns true if retrying the operation could succeed.
    ///
    /// Timeouts count as retryable; authentication, integrity, and
    /// crypto failures do not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { retryable, .. } => *retryable,
            SyncError::Timeout => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for SyncError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::ChecksumMismatch { expected, actual } => {
                SyncError::Integrity { expected, actual }
            }
            other => SyncError::Protocol(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(SyncError::transport_retryable("connection reset").is_retryable());
        assert!(SyncError::Timeout.is_retryable());

        assert!(!SyncError::transport_fatal("bad certificate").is_retryable());
        assert!(!SyncError::NotAuthenticated.is_retryable());
        assert!(!SyncError::crypto("wrong key").is_retryable());
        assert!(
            !SyncError::Integrity {
                expected: "a".into(),
                actual: "b".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn checksum_mismatch_maps_to_integrity() {
        let protocol_err = ProtocolError::ChecksumMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        let err: SyncError = protocol_err.into();
        assert!(matches!(err, SyncError::Integrity { .. }));
    }

    #[test]
    fn other_protocol_errors_map_to_protocol() {
        let err: SyncError = ProtocolError::invalid_format("bad field").into();
        assert!(matches!(err, SyncError::Protocol(_)));
    }
}
