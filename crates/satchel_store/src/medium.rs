//! Storage medium trait definition.

use crate::error::StoreResult;

/// Space accounting for a storage medium.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageUsage {
    /// Bytes currently stored across all regions.
    pub used_bytes: u64,
    /// Configured quota, if the medium enforces one.
    pub quota_bytes: Option<u64>,
}

impl StorageUsage {
    /// Fraction of the quota in use, if a quota is configured.
    #[must_use]
    pub fn fill_ratio(&self) -> Option<f64> {
        self.quota_bytes.map(|quota| {
            if quota == 0 {
                1.0
            } else {
                self.used_bytes as f64 / quota as f64
            }
        })
    }
}

/// A low-level storage medium for the local store.
///
/// Media are **opaque region stores**: a region is a named blob of bytes
/// that is written and read as a whole. The store owns all format
/// interpretation - media do not understand collections, records, or the
/// sync queue.
///
/// # Invariants
///
/// - `read_region` returns exactly the bytes last passed to
///   `write_region` for that name, or `None` if the region was never
///   written or has been removed
/// - `write_region` is atomic: a crash mid-write leaves either the old
///   or the new content, never a mixture
/// - Media must be `Send + Sync`; implementations use interior
///   mutability so regions can be written through a shared handle
///
/// # Implementors
///
/// - [`crate::MemoryMedium`] - for tests and degraded fallback
/// - [`crate::FileMedium`] - for persistent on-disk storage
pub trait StorageMedium: Send + Sync {
    /// Reads the full content of a region.
    fn read_region(&self, name: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Replaces the full content of a region, creating it if absent.
    ///
    /// # Errors
    ///
    /// Returns `QuotaExceeded` if the write would exceed a configured
    /// quota; the region keeps its previous content in that case.
    fn write_region(&self, name: &str, data: &[u8]) -> StoreResult<()>;

    /// Removes a region. Removing an absent region is a no-op.
    fn remove_region(&self, name: &str) -> StoreResult<()>;

    /// Lists the names of all existing regions.
    fn list_regions(&self) -> StoreResult<Vec<String>>;

    /// Returns current space usage and quota.
    fn usage(&self) -> StoreResult<StorageUsage>;

    /// Returns true if data survives process restart.
    fn persistent(&self) -> bool;
}

/// Validates a region name.
///
/// Region names become file names on disk, so they are restricted to
/// ASCII alphanumerics, `.`, `_`, and `-`.
pub(crate) fn validate_region_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
}
