//! `satchel inspect` - backup file metadata and integrity.

use satchel_sync_protocol::PortableBackup;
use serde_json::json;
use std::fs;
use std::path::Path;

pub fn run(file: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = fs::read(file)?;
    let backup = PortableBackup::from_json_bytes(&bytes)?;
    let valid = backup.verify().is_ok();

    match format {
        "json" => {
            let collections: Vec<_> = backup
                .data
                .iter()
                .map(|(name, records)| json!({"name": name, "records": records.len()}))
                .collect();
            let out = json!({
                "exportDate": backup.metadata.export_date,
                "deviceId": backup.metadata.device_id,
                "formatVersion": backup.metadata.version,
                "recordCount": backup.record_count(),
                "collections": collections,
                "checksumValid": valid,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        _ => {
            println!("Backup file:     {}", file.display());
            println!("Export date:     {} (unix ms)", backup.metadata.export_date);
            println!("Device:          {}", backup.metadata.device_id);
            println!("Format version:  {}", backup.metadata.version);
            println!("Records:         {}", backup.record_count());
            for (name, records) in &backup.data {
                println!("  {name}: {} record(s)", records.len());
            }
            println!(
                "Checksum:        {}",
                if valid { "valid" } else { "INVALID" }
            );
        }
    }

    if !valid {
        return Err("backup checksum does not match its data".into());
    }
    Ok(())
}
