//! # Satchel Store
//!
//! Versioned, schema-based local persistence for offline-first
//! applications.
//!
//! This crate provides:
//! - A storage-medium abstraction with file and in-memory backends
//! - Named collections with primary keys and secondary indexes
//! - Additive, idempotent schema migrations
//! - Bulk export/import/replace for backup and restore
//! - A change feed for observing committed writes
//! - A mutation-sink seam through which a sync layer records outbound
//!   mutations atomically with the local write
//!
//! ## Design Principles
//!
//! - The medium is an **opaque region store** - it does not interpret
//!   the data it holds. The store owns all format interpretation.
//! - Writes are serialized; reads are concurrent and see their own
//!   writes immediately.
//! - A disabled or locked persistence medium degrades to memory-only
//!   operation, never to a crash.
//!
//! ## Example
//!
//! ```rust
//! use satchel_store::{LocalStore, MemoryMedium, MigrationRunner, migrations};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut runner = MigrationRunner::new();
//! runner.register(migrations::create_collection(1, "tasks", "id")).unwrap();
//!
//! let store = LocalStore::open(Arc::new(MemoryMedium::new()), &runner).unwrap();
//! store.put("tasks", json!({"id": "t1", "title": "stretch"})).unwrap();
//! assert!(store.get("tasks", "t1").unwrap().is_some());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod error;
mod file;
mod medium;
mod memory;
mod meta;
mod migration;
mod record;
mod schema;
mod sink;
mod store;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use error::{StoreError, StoreResult};
pub use file::FileMedium;
pub use medium::{StorageMedium, StorageUsage};
pub use memory::MemoryMedium;
pub use meta::MetaArea;
pub use migration::{migrations, Migration, MigrationRunner};
pub use record::Record;
pub use schema::{CollectionSpec, IndexSpec, SchemaCatalog};
pub use sink::{Mutation, MutationOp, MutationSink};
pub use store::LocalStore;
