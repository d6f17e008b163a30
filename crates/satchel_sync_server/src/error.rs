//! Error types for the reference server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors a request handler can return.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The request carried no valid token while auth is enabled.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The request is malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No backup exists for the requested user.
    #[error("not found")]
    NotFound,
}

impl ServerError {
    /// Creates an unauthorized error.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    /// Creates an invalid request error.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }
}
