//! Server configuration.

use crate::auth::AuthConfig;

/// Configuration for the reference server.
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Token authentication; `None` accepts every request.
    pub auth: Option<AuthConfig>,
    /// Maximum accepted encrypted payload size in bytes, if bounded.
    pub max_payload_bytes: Option<usize>,
}

impl ServerConfig {
    /// Creates a configuration with auth disabled and no size bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables HMAC token authentication with the given secret.
    #[must_use]
    pub fn with_auth(mut self, secret: Vec<u8>) -> Self {
        self.auth = Some(AuthConfig::new(secret));
        self
    }

    /// Bounds the accepted payload size.
    #[must_use]
    pub fn with_max_payload_bytes(mut self, bytes: usize) -> Self {
        self.max_payload_bytes = Some(bytes);
        self
    }
}
