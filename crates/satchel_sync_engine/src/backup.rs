//! Full backup, restore, and portable export.
//!
//! The backup path snapshots every collection, checksums the plaintext,
//! encrypts it, and hands the sealed record to the transport. The
//! restore path is the mirror image with one hard rule: local data is
//! cleared only after decryption and checksum verification succeed, so
//! a corrupt or foreign backup can never destroy what is already on the
//! device.
//!
//! The portable export is the fallback of last resort: plain JSON,
//! checksum-tagged, produced with no network and no authentication.

use crate::crypto::EncryptionContext;
use crate::error::{SyncError, SyncResult};
use crate::util::now_ms;
use satchel_store::{LocalStore, Record};
use satchel_sync_protocol::{
    sha256_hex, BackupRecord, CollectionData, PortableBackup, Snapshot,
};
use std::collections::BTreeMap;
use tracing::info;

/// Result of applying a backup to the local store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// Records restored.
    pub record_count: u64,
    /// Creation time of the backup that was applied, Unix millis.
    pub backup_timestamp: u64,
}

/// Creates and applies snapshots.
pub struct BackupManager;

impl BackupManager {
    /// Builds an encrypted full backup of the store.
    pub fn create_backup(
        store: &LocalStore,
        ctx: &EncryptionContext,
        device_id: &str,
        user_id: &str,
    ) -> SyncResult<BackupRecord> {
        let data = Self::export_payloads(store)?;
        let snapshot = Snapshot::new(store.schema_version(), data);

        let plaintext = snapshot.encode()?;
        let checksum = sha256_hex(&plaintext);
        let encrypted_payload = ctx.encrypt(&plaintext)?;
        let record_count = snapshot.record_count();

        info!(record_count, "full backup created");

        Ok(BackupRecord {
            device_id: device_id.to_string(),
            user_id: user_id.to_string(),
            timestamp: now_ms(),
            schema_version: snapshot.schema_version,
            record_count,
            checksum,
            encrypted_payload,
        })
    }

    /// Decrypts, verifies, and applies a backup record.
    ///
    /// On [`SyncError::Integrity`] or any decode failure the local store
    /// is untouched; the clear-then-import happens only after the
    /// snapshot has fully validated.
    pub fn apply_backup(
        store: &LocalStore,
        ctx: &EncryptionContext,
        record: &BackupRecord,
    ) -> SyncResult<RestoreOutcome> {
        let plaintext = ctx.decrypt(&record.encrypted_payload)?;

        let actual = sha256_hex(&plaintext);
        if actual != record.checksum {
            return Err(SyncError::Integrity {
                expected: record.checksum.clone(),
                actual,
            });
        }

        let snapshot = Snapshot::decode(&plaintext)?;
        let records = Self::payloads_to_records(store, &snapshot.collections)?;
        let record_count = snapshot.record_count();

        store.replace_all(records)?;

        info!(record_count, timestamp = record.timestamp, "backup restored");

        Ok(RestoreOutcome {
            record_count,
            backup_timestamp: record.timestamp,
        })
    }

    /// Produces the checksum-tagged portable export.
    ///
    /// Works with no network and no authentication; never depends on
    /// sync being enabled.
    pub fn export_portable(store: &LocalStore, device_id: &str) -> SyncResult<PortableBackup> {
        let data = Self::export_payloads(store)?;
        Ok(PortableBackup::new(now_ms(), device_id, data)?)
    }

    /// Verifies and applies a portable export, replacing local data.
    pub fn import_portable(store: &LocalStore, backup: &PortableBackup) -> SyncResult<u64> {
        backup.verify()?;
        let records = Self::payloads_to_records(store, &backup.data)?;
        store.replace_all(records)?;
        Ok(backup.record_count())
    }

    fn export_payloads(store: &LocalStore) -> SyncResult<CollectionData> {
        let mut data = CollectionData::new();
        for (collection, records) in store.export_all()? {
            data.insert(collection, records.into_iter().map(|r| r.payload).collect());
        }
        Ok(data)
    }

    fn payloads_to_records(
        store: &LocalStore,
        data: &CollectionData,
    ) -> SyncResult<BTreeMap<String, Vec<Record>>> {
        let mut out = BTreeMap::new();
        for (collection, payloads) in data {
            let mut records = Vec::with_capacity(payloads.len());
            for payload in payloads {
                records.push(store.record_from_payload(collection, payload.clone())?);
            }
            out.insert(collection.clone(), records);
        }
        Ok(out)
    }
}
