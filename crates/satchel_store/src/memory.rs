//! In-memory storage medium.

use crate::error::{StoreError, StoreResult};
use crate::medium::{validate_region_name, StorageMedium, StorageUsage};
use parking_lot::RwLock;
use std::collections::HashMap;

/// An in-memory storage medium.
///
/// Regions live in a map and are lost when the process exits. Used for:
/// - Unit and integration tests
/// - The degraded fallback when the on-disk medium is unavailable
///
/// An optional quota can be configured to exercise quota-pressure paths
/// in tests.
#[derive(Debug, Default)]
pub struct MemoryMedium {
    regions: RwLock<HashMap<String, Vec<u8>>>,
    quota_bytes: Option<u64>,
}

impl MemoryMedium {
    /// Creates a new empty medium with no quota.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a medium that rejects writes beyond `quota_bytes`.
    #[must_use]
    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            regions: RwLock::new(HashMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn used(&self, regions: &HashMap<String, Vec<u8>>) -> u64 {
        regions.values().map(|v| v.len() as u64).sum()
    }
}

impl StorageMedium for MemoryMedium {
    fn read_region(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.regions.read().get(name).cloned())
    }

    fn write_region(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        if !validate_region_name(name) {
            return Err(StoreError::invalid_name(name));
        }

        let mut regions = self.regions.write();
        if let Some(quota) = self.quota_bytes {
            let existing = regions.get(name).map(|v| v.len() as u64).unwrap_or(0);
            let needed = self.used(&regions) - existing + data.len() as u64;
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }

        regions.insert(name.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_region(&self, name: &str) -> StoreResult<()> {
        self.regions.write().remove(name);
        Ok(())
    }

    fn list_regions(&self) -> StoreResult<Vec<String>> {
        let mut names: Vec<String> = self.regions.read().keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    fn usage(&self) -> StoreResult<StorageUsage> {
        let regions = self.regions.read();
        Ok(StorageUsage {
            used_bytes: self.used(&regions),
            quota_bytes: self.quota_bytes,
        })
    }

    fn persistent(&self) -> bool {
        false
    }
}
