//! Token authentication using HMAC-SHA256.
//!
//! Tokens are issued per user and carry their own timestamp:
//!
//! ```text
//! <user_id>.<timestamp_ms>.<hex hmac-sha256(secret, user_id|timestamp_ms)>
//! ```
//!
//! Clients treat the token as opaque. Validation recomputes the
//! signature and checks the token is bound to the requesting user and
//! not expired.

use crate::error::{ServerError, ServerResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

type HmacSha256 = Hmac<Sha256>;

/// Authentication configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// How long issued tokens stay valid.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a configuration with a 24-hour expiry.
    #[must_use]
    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token expiry.
    #[must_use]
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and validates tokens.
#[derive(Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a validator.
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for a user, stamped with the current time.
    #[must_use]
    pub fn create_token(&self, user_id: &str) -> String {
        let timestamp = now_ms();
        let signature = self.sign(user_id, timestamp);
        format!("{user_id}.{timestamp}.{signature}")
    }

    /// Validates a token for the given user.
    pub fn validate(&self, token: &str, user_id: &str) -> ServerResult<()> {
        let mut parts = token.rsplitn(3, '.');
        let signature = parts
            .next()
            .ok_or_else(|| ServerError::unauthorized("malformed token"))?;
        let timestamp: u64 = parts
            .next()
            .and_then(|t| t.parse().ok())
            .ok_or_else(|| ServerError::unauthorized("malformed token"))?;
        let token_user = parts
            .next()
            .ok_or_else(|| ServerError::unauthorized("malformed token"))?;

        if token_user != user_id {
            return Err(ServerError::unauthorized("token bound to another user"));
        }

        let expected = self.sign(token_user, timestamp);
        if signature != expected {
            return Err(ServerError::unauthorized("bad signature"));
        }

        let age = now_ms().saturating_sub(timestamp);
        if age > self.config.token_expiry.as_millis() as u64 {
            return Err(ServerError::unauthorized("token expired"));
        }

        Ok(())
    }

    fn sign(&self, user_id: &str, timestamp: u64) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .expect("HMAC accepts any key length");
        mac.update(user_id.as_bytes());
        mac.update(b"|");
        mac.update(&timestamp.to_be_bytes());

        let digest = mac.finalize().into_bytes();
        let mut out = String::with_capacity(digest.len() * 2);
        for byte in digest {
            use std::fmt::Write;
            let _ = write!(out, "{byte:02x}");
        }
        out
    }
}

impl std::fmt::Debug for TokenValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenValidator")
            .field("secret", &"[REDACTED]")
            .field("token_expiry", &self.config.token_expiry)
            .finish()
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
