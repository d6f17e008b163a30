//! Error types for protocol encoding and verification.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding, or verifying
/// protocol structures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// A checksum did not match the data it covers.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The checksum carried by the structure.
        expected: String,
        /// The checksum recomputed from the data.
        actual: String,
    },

    /// The structure is malformed.
    #[error("invalid format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl ProtocolError {
    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::ChecksumMismatch {
            expected: "aa".into(),
            actual: "bb".into(),
        };
        assert!(err.to_string().contains("aa"));
        assert!(err.to_string().contains("bb"));

        let err = ProtocolError::invalid_format("missing field");
        assert!(err.to_string().contains("missing field"));
    }
}
