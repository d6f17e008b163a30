//! # Satchel Sync Engine
//!
//! Queue-based eventual-consistency sync for the Satchel local store.
//!
//! This crate provides:
//! - A durable mutation log fed by store writes
//! - A sync engine state machine (offline → syncing → synced/error)
//! - Retry with exponential backoff and jitter
//! - An HKDF-derived AES-256-GCM encryption context
//! - Full backup, restore, and portable export
//! - A cancellable periodic drain task
//! - The `SyncService` context object tying it all together
//!
//! ## Architecture
//!
//! Local writes append to the mutation log through the store's sink
//! seam, atomically with the write itself. The engine drains the log
//! against a remote backup service whenever the device is online and
//! authenticated, encrypting every payload before it leaves the device.
//!
//! ## Key Invariants
//!
//! - Nothing is transmitted without an encryption context (fail closed)
//! - Only one drain cycle is in flight at a time
//! - An aborted drain leaves unprocessed items pending, never completed
//! - Restore clears local data only after decrypt and checksum succeed
//! - The portable export works with no network and no authentication

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod config;
mod crypto;
mod engine;
mod error;
mod http;
mod identity;
mod queue;
mod scheduler;
mod service;
mod status;
mod transport;

pub use backup::{BackupManager, RestoreOutcome};
pub use config::{RetryConfig, SyncConfig};
pub use crypto::{EncryptionContext, KEY_SIZE, NONCE_SIZE, TAG_SIZE};
pub use engine::SyncEngine;
pub use error::{SyncError, SyncResult};
pub use http::{HttpClient, HttpRemote, HttpResponse};
pub use identity::DeviceIdentity;
pub use queue::{DrainResult, MutationLog, QUEUE_REGION};
pub use scheduler::PeriodicDrain;
pub use service::SyncService;
pub use status::{StatusFeed, SyncState, SyncStatus};
pub use transport::{MockRemote, RemoteBackup};

pub(crate) mod util {
    use std::time::{SystemTime, UNIX_EPOCH};

    /// Current wall-clock time as Unix millis.
    pub fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
