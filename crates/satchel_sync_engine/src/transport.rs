//! Transport abstraction for the remote backup service.

use crate::error::{SyncError, SyncResult};
use parking_lot::Mutex;
use satchel_sync_protocol::{BackupRecord, MutationEnvelope};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Network communication with the remote backup service.
///
/// The trait mirrors the abstract service contract: store a full
/// backup, fetch the newest backup for a user, and push individual
/// mutations. Implementations own timeouts - every call must return
/// within the configured request timeout, reporting
/// [`SyncError::Timeout`] or a retryable transport error on expiry.
pub trait RemoteBackup: Send + Sync {
    /// Pushes one encrypted mutation.
    fn push_item(&self, envelope: &MutationEnvelope) -> SyncResult<()>;

    /// Stores a full backup record.
    fn put_backup(&self, record: &BackupRecord) -> SyncResult<()>;

    /// Fetches the newest backup for a user, or `None` if there is none.
    fn latest_backup(&self, user_id: &str) -> SyncResult<Option<BackupRecord>>;
}

/// A scriptable in-memory remote for tests.
///
/// Stores everything it accepts and can be told to fail the next N item
/// pushes or to act fully unreachable.
#[derive(Debug, Default)]
pub struct MockRemote {
    pushed: Mutex<Vec<MutationEnvelope>>,
    backups: Mutex<Vec<BackupRecord>>,
    fail_next_pushes: AtomicU32,
    fail_next_backups: AtomicU32,
    fail_once_records: Mutex<HashSet<String>>,
    unreachable: AtomicBool,
}

impl MockRemote {
    /// Creates a reachable mock with no scripted failures.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `count` calls to `push_item`.
    pub fn fail_next_pushes(&self, count: u32) {
        self.fail_next_pushes.store(count, Ordering::SeqCst);
    }

    /// Fails the next push for this record id, once.
    pub fn fail_once_for(&self, record_id: impl Into<String>) {
        self.fail_once_records.lock().insert(record_id.into());
    }

    /// Fails the next `count` calls to `put_backup`.
    pub fn fail_next_backups(&self, count: u32) {
        self.fail_next_backups.store(count, Ordering::SeqCst);
    }

    /// Makes every call fail with a retryable transport error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Envelopes accepted so far, in arrival order.
    #[must_use]
    pub fn pushed(&self) -> Vec<MutationEnvelope> {
        self.pushed.lock().clone()
    }

    /// Backups accepted so far.
    #[must_use]
    pub fn backups(&self) -> Vec<BackupRecord> {
        self.backups.lock().clone()
    }

    /// Replaces the stored backups, for scripting restore scenarios.
    pub fn set_backups(&self, backups: Vec<BackupRecord>) {
        *self.backups.lock() = backups;
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("remote unreachable"));
        }
        Ok(())
    }
}

impl RemoteBackup for MockRemote {
    fn push_item(&self, envelope: &MutationEnvelope) -> SyncResult<()> {
        self.check_reachable()?;

        let remaining = self.fail_next_pushes.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_pushes.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::transport_retryable("scripted push failure"));
        }

        if self.fail_once_records.lock().remove(&envelope.record_id) {
            return Err(SyncError::transport_retryable("scripted record failure"));
        }

        self.pushed.lock().push(envelope.clone());
        Ok(())
    }

    fn put_backup(&self, record: &BackupRecord) -> SyncResult<()> {
        self.check_reachable()?;

        let remaining = self.fail_next_backups.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_next_backups.store(remaining - 1, Ordering::SeqCst);
            return Err(SyncError::transport_retryable("scripted backup failure"));
        }

        self.backups.lock().push(record.clone());
        Ok(())
    }

    fn latest_backup(&self, user_id: &str) -> SyncResult<Option<BackupRecord>> {
        self.check_reachable()?;
        Ok(self
            .backups
            .lock()
            .iter()
            .filter(|b| b.user_id == user_id)
            .max_by_key(|b| b.timestamp)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_sync_protocol::QueueOp;
    use uuid::Uuid;

    fn envelope(record_id: &str) -> MutationEnvelope {
        MutationEnvelope {
            item_id: Uuid::new_v4(),
            device_id: "dev-1".into(),
            user_id: "user-1".into(),
            op: QueueOp::Create,
            collection: "tasks".into(),
            record_id: record_id.into(),
            encrypted_payload: Some(vec![1, 2, 3]),
            timestamp_ms: 1,
        }
    }

    fn backup(user_id: &str, timestamp: u64) -> BackupRecord {
        BackupRecord {
            device_id: "dev-1".into(),
            user_id: user_id.into(),
            timestamp,
            schema_version: 1,
            record_count: 0,
            checksum: "00".into(),
            encrypted_payload: vec![],
        }
    }

    #[test]
    fn accepts_pushes() {
        let remote = MockRemote::new();
        remote.push_item(&envelope("t1")).unwrap();
        remote.push_item(&envelope("t2")).unwrap();

        let pushed = remote.pushed();
        assert_eq!(pushed.len(), 2);
        assert_eq!(pushed[0].record_id, "t1");
    }

    #[test]
    fn scripted_push_failures() {
        let remote = MockRemote::new();
        remote.fail_next_pushes(1);

        assert!(remote.push_item(&envelope("t1")).is_err());
        remote.push_item(&envelope("t1")).unwrap();
        assert_eq!(remote.pushed().len(), 1);
    }

    #[test]
    fn unreachable_fails_everything() {
        let remote = MockRemote::new();
        remote.set_unreachable(true);

        assert!(remote.push_item(&envelope("t1")).is_err());
        assert!(remote.put_backup(&backup("u", 1)).is_err());
        assert!(remote.latest_backup("u").is_err());

        remote.set_unreachable(false);
        remote.push_item(&envelope("t1")).unwrap();
    }

    #[test]
    fn latest_backup_picks_newest_for_user() {
        let remote = MockRemote::new();
        remote.put_backup(&backup("alice", 10)).unwrap();
        remote.put_backup(&backup("alice", 30)).unwrap();
        remote.put_backup(&backup("alice", 20)).unwrap();
        remote.put_backup(&backup("bob", 99)).unwrap();

        let latest = remote.latest_backup("alice").unwrap().unwrap();
        assert_eq!(latest.timestamp, 30);

        assert!(remote.latest_backup("nobody").unwrap().is_none());
    }
}
