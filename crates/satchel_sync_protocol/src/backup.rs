//! Backup formats: encrypted remote snapshots and the portable export.
//!
//! Two formats live here:
//!
//! - [`BackupRecord`] — the encrypted full snapshot uploaded to the
//!   remote. The checksum covers the *plaintext* snapshot so integrity
//!   can be verified after decryption and before any local data is
//!   touched.
//! - [`PortableBackup`] — the human-downloadable JSON export. It carries
//!   no ciphertext and requires neither network nor authentication; it is
//!   the fallback of last resort and must round-trip exactly.

use crate::checksum::{data_checksum, sha256_hex};
use crate::error::{ProtocolError, ProtocolResult};
use crate::PORTABLE_FORMAT_VERSION;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Records per collection, keyed by collection name.
///
/// A `BTreeMap` keeps the serialization canonical, which the checksums
/// rely on.
pub type CollectionData = BTreeMap<String, Vec<Value>>;

/// The plaintext content of a full backup, before encryption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Schema version of the store the snapshot was taken from.
    pub schema_version: u64,
    /// All records, per collection.
    pub collections: CollectionData,
}

impl Snapshot {
    /// Creates a snapshot.
    #[must_use]
    pub fn new(schema_version: u64, collections: CollectionData) -> Self {
        Self {
            schema_version,
            collections,
        }
    }

    /// Serializes the snapshot to canonical JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Deserializes a snapshot from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Computes the checksum over the encoded snapshot.
    pub fn checksum(&self) -> ProtocolResult<String> {
        Ok(sha256_hex(&self.encode()?))
    }

    /// Total number of records across all collections.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.collections.values().map(|v| v.len() as u64).sum()
    }
}

/// An encrypted full snapshot as stored by the remote backup service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupRecord {
    /// Originating device.
    pub device_id: String,
    /// Owning user.
    pub user_id: String,
    /// When the backup was created, Unix millis.
    pub timestamp: u64,
    /// Schema version of the snapshotted store.
    pub schema_version: u64,
    /// Number of records in the snapshot.
    pub record_count: u64,
    /// SHA-256 hex of the plaintext snapshot.
    pub checksum: String,
    /// AES-256-GCM ciphertext of the encoded snapshot.
    pub encrypted_payload: Vec<u8>,
}

/// Metadata block of a portable backup file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableMetadata {
    /// Export time, Unix millis.
    pub export_date: u64,
    /// Device that produced the export.
    pub device_id: String,
    /// Portable format version.
    pub version: u64,
}

/// A checksum-tagged, human-downloadable export of all collections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortableBackup {
    /// Export metadata.
    pub metadata: PortableMetadata,
    /// All records, per collection.
    pub data: CollectionData,
    /// SHA-256 hex over the serialized `data` block.
    pub checksum: String,
}

impl PortableBackup {
    /// Builds a portable backup, computing the checksum over `data`.
    pub fn new(
        export_date: u64,
        device_id: impl Into<String>,
        data: CollectionData,
    ) -> ProtocolResult<Self> {
        let checksum = data_checksum(&data)?;
        Ok(Self {
            metadata: PortableMetadata {
                export_date,
                device_id: device_id.into(),
                version: PORTABLE_FORMAT_VERSION,
            },
            data,
            checksum,
        })
    }

    /// Verifies the checksum against the data block.
    pub fn verify(&self) -> ProtocolResult<()> {
        let actual = data_checksum(&self.data)?;
        if actual != self.checksum {
            return Err(ProtocolError::ChecksumMismatch {
                expected: self.checksum.clone(),
                actual,
            });
        }
        Ok(())
    }

    /// Serializes to pretty-printed JSON, suitable for a downloadable file.
    pub fn to_json_bytes(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Parses a portable backup from JSON bytes without verifying it.
    ///
    /// Call [`PortableBackup::verify`] before applying the data.
    pub fn from_json_bytes(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Total number of records across all collections.
    #[must_use]
    pub fn record_count(&self) -> u64 {
        self.data.values().map(|v| v.len() as u64).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn sample_data() -> CollectionData {
        let mut data = CollectionData::new();
        data.insert(
            "tasks".into(),
            vec![
                json!({"id": "t1", "title": "stretch", "date": "2024-03-01"}),
                json!({"id": "t2", "title": "walk", "date": "2024-03-02"}),
            ],
        );
        data.insert("notes".into(), vec![json!({"id": "n1", "body": "hello"})]);
        data
    }

    #[test]
    fn snapshot_encode_decode_roundtrip() {
        let snapshot = Snapshot::new(3, sample_data());
        let bytes = snapshot.encode().unwrap();
        let decoded = Snapshot::decode(&bytes).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(decoded.record_count(), 3);
    }

    #[test]
    fn snapshot_checksum_is_stable() {
        let snapshot = Snapshot::new(1, sample_data());
        assert_eq!(
            snapshot.checksum().unwrap(),
            snapshot.checksum().unwrap()
        );
    }

    #[test]
    fn portable_backup_verifies() {
        let backup = PortableBackup::new(1_700_000_000_000, "dev-1", sample_data()).unwrap();
        backup.verify().unwrap();
        assert_eq!(backup.metadata.version, PORTABLE_FORMAT_VERSION);
        assert_eq!(backup.record_count(), 3);
    }

    #[test]
    fn tampered_portable_backup_fails_verification() {
        let mut backup = PortableBackup::new(0, "dev-1", sample_data()).unwrap();
        backup
            .data
            .insert("extra".into(), vec![json!({"id": "x"})]);

        let err = backup.verify().unwrap_err();
        assert!(matches!(err, ProtocolError::ChecksumMismatch { .. }));
    }

    #[test]
    fn portable_backup_file_roundtrip() {
        let backup = PortableBackup::new(42, "dev-1", sample_data()).unwrap();
        let bytes = backup.to_json_bytes().unwrap();
        let parsed = PortableBackup::from_json_bytes(&bytes).unwrap();

        assert_eq!(parsed, backup);
        parsed.verify().unwrap();
    }

    #[test]
    fn portable_backup_uses_spec_field_names() {
        let backup = PortableBackup::new(42, "dev-1", sample_data()).unwrap();
        let json = String::from_utf8(backup.to_json_bytes().unwrap()).unwrap();
        assert!(json.contains("\"exportDate\""));
        assert!(json.contains("\"deviceId\""));
        assert!(json.contains("\"metadata\""));
        assert!(json.contains("\"checksum\""));
    }

    proptest! {
        #[test]
        fn portable_roundtrip_arbitrary_records(
            titles in proptest::collection::vec("[a-z ]{0,24}", 0..8)
        ) {
            let mut data = CollectionData::new();
            let records: Vec<Value> = titles
                .iter()
                .enumerate()
                .map(|(i, t)| json!({"id": format!("r{i}"), "title": t}))
                .collect();
            data.insert("records".into(), records);

            let backup = PortableBackup::new(7, "dev-p", data).unwrap();
            let bytes = backup.to_json_bytes().unwrap();
            let parsed = PortableBackup::from_json_bytes(&bytes).unwrap();

            prop_assert_eq!(&parsed, &backup);
            prop_assert!(parsed.verify().is_ok());
        }
    }
}
