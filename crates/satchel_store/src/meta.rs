//! Meta area: a small key-value region distinct from versioned
//! collections.
//!
//! The device identity, authentication token, and similar markers live
//! here. Values persist through `clear_all` and restores, which only
//! touch collection data.

use crate::error::StoreResult;
use crate::medium::StorageMedium;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Region the meta map is persisted in.
const META_REGION: &str = "meta";

/// A persisted string-to-string map over its own region.
pub struct MetaArea {
    medium: Arc<dyn StorageMedium>,
    entries: RwLock<BTreeMap<String, String>>,
}

impl MetaArea {
    /// Loads the meta area from the medium, starting empty if absent.
    pub fn load(medium: Arc<dyn StorageMedium>) -> StoreResult<Self> {
        let entries = match medium.read_region(META_REGION)? {
            Some(bytes) => serde_json::from_slice(&bytes)?,
            None => BTreeMap::new(),
        };
        Ok(Self {
            medium,
            entries: RwLock::new(entries),
        })
    }

    /// Reads a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Writes a value and persists the area.
    pub fn set(&self, key: impl Into<String>, value: impl Into<String>) -> StoreResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.into(), value.into());
        self.persist(&entries)
    }

    /// Removes a value and persists the area.
    pub fn remove(&self, key: &str) -> StoreResult<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> StoreResult<()> {
        let bytes = serde_json::to_vec(entries)?;
        self.medium.write_region(META_REGION, &bytes)
    }
}

impl std::fmt::Debug for MetaArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetaArea")
            .field("keys", &self.entries.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryMedium;

    #[test]
    fn set_get_remove() {
        let medium = Arc::new(MemoryMedium::new());
        let meta = MetaArea::load(medium).unwrap();

        assert_eq!(meta.get("device_id"), None);

        meta.set("device_id", "dev-1").unwrap();
        assert_eq!(meta.get("device_id"), Some("dev-1".into()));

        meta.remove("device_id").unwrap();
        assert_eq!(meta.get("device_id"), None);
    }

    #[test]
    fn survives_reload() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryMedium::new());

        {
            let meta = MetaArea::load(Arc::clone(&medium)).unwrap();
            meta.set("schema_marker", "3").unwrap();
        }

        let meta = MetaArea::load(medium).unwrap();
        assert_eq!(meta.get("schema_marker"), Some("3".into()));
    }

    #[test]
    fn removing_absent_key_does_not_persist() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryMedium::new());
        let meta = MetaArea::load(Arc::clone(&medium)).unwrap();

        meta.remove("missing").unwrap();
        // Nothing was ever written
        assert_eq!(medium.read_region("meta").unwrap(), None);
    }
}
