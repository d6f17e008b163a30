//! `satchel export` - portable backup of a store.

use crate::commands::open_store;
use satchel_store::{MetaArea, StorageMedium};
use satchel_sync_engine::{BackupManager, DeviceIdentity};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub fn run(store_dir: &Path, out: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(store_dir)?;
    let medium: Arc<dyn StorageMedium> = store.medium();
    let meta = MetaArea::load(medium)?;
    let device = DeviceIdentity::load_or_create(&meta)?;

    let backup = BackupManager::export_portable(&store, device.id())?;
    let bytes = backup.to_json_bytes()?;
    fs::write(out, &bytes)?;

    info!(records = backup.record_count(), "export written");
    println!(
        "Exported {} record(s) from {} collection(s) to {}",
        backup.record_count(),
        backup.data.len(),
        out.display()
    );

    Ok(())
}
