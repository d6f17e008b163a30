//! Encryption context derived from user credentials.
//!
//! Snapshots and pushed payloads are protected with AES-256-GCM. The key
//! is derived deterministically from `(user_id, auth_token)` via
//! HKDF-SHA256, so the same credentials regenerate the same key on any
//! device and no key material is ever stored or transmitted.
//!
//! Derivation fails closed: missing credentials produce
//! [`SyncError::NotAuthenticated`], and every transmit path requires a
//! context.

use crate::error::{SyncError, SyncResult};
use aes_gcm::{
    aead::{generic_array::GenericArray, Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;

/// HKDF info string binding keys to this application and format version.
const KEY_INFO: &[u8] = b"satchel-backup-key-v1";

/// Key material and cipher for protecting snapshots in transit.
///
/// Exists only while sync is enabled; dropped (and the intermediate key
/// bytes zeroized) when sync is disabled.
pub struct EncryptionContext {
    cipher: Aes256Gcm,
}

impl EncryptionContext {
    /// Derives a context from user credentials.
    ///
    /// Deterministic: the same `(user_id, token)` pair always produces
    /// the same key. The token is expected to be high-entropy material
    /// issued by the auth layer, which is why HKDF rather than a
    /// password-hashing KDF is appropriate here.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotAuthenticated`] if either input is empty.
    pub fn derive(user_id: &str, token: &str) -> SyncResult<Self> {
        if user_id.is_empty() || token.is_empty() {
            return Err(SyncError::NotAuthenticated);
        }

        let hk = Hkdf::<Sha256>::new(Some(user_id.as_bytes()), token.as_bytes());
        let mut key = Zeroizing::new([0u8; KEY_SIZE]);
        hk.expand(KEY_INFO, key.as_mut())
            .map_err(|_| SyncError::crypto("HKDF expand failed"))?;

        let cipher = Aes256Gcm::new(GenericArray::from_slice(key.as_ref()));
        Ok(Self { cipher })
    }

    /// Encrypts data with a fresh random nonce.
    ///
    /// The output format is `nonce (12 bytes) || ciphertext || tag (16
    /// bytes)`.
    pub fn encrypt(&self, plaintext: &[u8]) -> SyncResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext)
            .map_err(|_| SyncError::crypto("encryption failed"))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(ciphertext);
        Ok(out)
    }

    /// Decrypts data produced by [`EncryptionContext::encrypt`].
    ///
    /// # Errors
    ///
    /// Fails on a wrong key, truncated input, or any tampering - GCM
    /// authenticates the whole message.
    pub fn decrypt(&self, data: &[u8]) -> SyncResult<Vec<u8>> {
        if data.len() < NONCE_SIZE + TAG_SIZE {
            return Err(SyncError::crypto("ciphertext too short"));
        }

        let nonce = Nonce::from_slice(&data[..NONCE_SIZE]);
        self.cipher
            .decrypt(nonce, &data[NONCE_SIZE..])
            .map_err(|_| SyncError::crypto("decryption failed"))
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("cipher", &"Aes256Gcm")
            .finish()
    }
}
