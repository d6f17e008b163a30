//! Integrity checksums for snapshots and portable backups.
//!
//! Checksums are SHA-256 over the JSON serialization of the data being
//! protected, rendered as lowercase hex. Collection maps are `BTreeMap`s
//! and `serde_json` object keys are sorted, so the serialization is
//! canonical: equal data always produces equal bytes.

use crate::backup::CollectionData;
use crate::error::ProtocolResult;
use sha2::{Digest, Sha256};

/// Computes the SHA-256 digest of `bytes` as lowercase hex.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        use std::fmt::Write;
        let _ = write!(out, "{byte:02x}");
    }
    out
}

/// Computes the checksum of a collection map.
///
/// This is the checksum stored in [`crate::PortableBackup`] and verified
/// on import.
pub fn data_checksum(data: &CollectionData) -> ProtocolResult<String> {
    let bytes = serde_json::to_vec(data)?;
    Ok(sha256_hex(&bytes))
}
