//! `satchel queue` - sync queue diagnostics.

use satchel_store::FileMedium;
use satchel_sync_engine::MutationLog;
use std::path::Path;
use std::sync::Arc;

pub fn run(store_dir: &Path, requeue: bool) -> Result<(), Box<dyn std::error::Error>> {
    let medium = Arc::new(FileMedium::open(store_dir)?);
    let log = MutationLog::load(medium, 3)?;

    println!("Queue length:  {}", log.len());
    println!("Pending:       {}", log.pending_count());
    println!("Failed:        {}", log.failed_count());

    let failed = log.failed_items();
    if !failed.is_empty() {
        println!();
        println!("Failed items:");
        for item in &failed {
            println!(
                "  {} {} {}/{} (retries: {}/{}, enqueued: {})",
                item.id,
                item.op.as_str(),
                item.collection,
                item.record_id,
                item.retry_count,
                item.max_retries,
                item.enqueued_at_ms,
            );
        }

        if requeue {
            let count = log.requeue_failed()?;
            println!();
            println!("Re-queued {count} item(s)");
        }
    }

    Ok(())
}
