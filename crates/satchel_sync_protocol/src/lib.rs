//! # Satchel Sync Protocol
//!
//! Shared types for Satchel's sync queue, remote backup contract, and
//! portable backup file format.
//!
//! This crate defines:
//! - Queue items (pending outbound mutations with retry state)
//! - Mutation envelopes (the per-item push form sent to the remote)
//! - Backup records (encrypted full snapshots with integrity checksums)
//! - The portable backup file format (plain JSON, network- and
//!   auth-independent)
//!
//! ## Design Notes
//!
//! Everything here is plain data: no I/O, no crypto, no storage. The
//! engine and server crates agree on these types; the portable backup
//! format is additionally a user-facing file format and must round-trip
//! exactly (export then import reproduces identical records).
//!
//! All wire and file formats are JSON with camelCase field names, since
//! the portable export is a human-downloadable JSON document.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backup;
mod checksum;
mod envelope;
mod error;
mod item;

pub use backup::{BackupRecord, CollectionData, PortableBackup, PortableMetadata, Snapshot};
pub use checksum::{data_checksum, sha256_hex};
pub use envelope::{Ack, MutationEnvelope};
pub use error::{ProtocolError, ProtocolResult};
pub use item::{QueueItem, QueueItemStatus, QueueOp};

/// Version tag written into portable backup metadata.
pub const PORTABLE_FORMAT_VERSION: u64 = 1;
