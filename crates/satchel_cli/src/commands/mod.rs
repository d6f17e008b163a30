//! CLI command implementations.

pub mod export;
pub mod import;
pub mod inspect;
pub mod queue;

use satchel_store::{FileMedium, LocalStore, MigrationRunner, StoreResult};
use std::path::Path;
use std::sync::Arc;

/// Opens an existing store without registering migrations.
///
/// The persisted catalog already describes the schema; an empty runner
/// leaves it exactly as the owning application created it.
pub(crate) fn open_store(dir: &Path) -> StoreResult<LocalStore> {
    let medium = Arc::new(FileMedium::open(dir)?);
    LocalStore::open(medium, &MigrationRunner::new())
}
