//! `satchel import` - verify and apply a portable backup.

use crate::commands::open_store;
use satchel_sync_engine::BackupManager;
use satchel_sync_protocol::PortableBackup;
use std::fs;
use std::path::Path;
use tracing::info;

pub fn run(store_dir: &Path, file: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(file)?;
    let backup = PortableBackup::from_json_bytes(&bytes)?;
    backup.verify()?;

    let store = open_store(store_dir)?;
    let count = BackupManager::import_portable(&store, &backup)?;

    info!(records = count, "import applied");
    println!(
        "Imported {count} record(s) from backup taken on device {}",
        backup.metadata.device_id
    );

    Ok(())
}
