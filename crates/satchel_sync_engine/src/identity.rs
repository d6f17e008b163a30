//! Stable per-install device identity.

use satchel_store::{MetaArea, StoreResult};
use uuid::Uuid;

/// Meta area key the device id is stored under.
pub(crate) const DEVICE_ID_KEY: &str = "device_id";

/// A stable random identifier distinguishing this install.
///
/// Generated once on first use and persisted in the meta area; it tags
/// queue envelopes and backups so the remote can attribute writes to
/// their origin. The id survives everything except an explicit
/// [`DeviceIdentity::reset`] (factory reset).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceIdentity {
    id: String,
}

impl DeviceIdentity {
    /// Loads the persisted identity, generating and persisting one on
    /// first use.
    pub fn load_or_create(meta: &MetaArea) -> StoreResult<Self> {
        if let Some(id) = meta.get(DEVICE_ID_KEY) {
            return Ok(Self { id });
        }

        let id = Uuid::new_v4().to_string();
        meta.set(DEVICE_ID_KEY, id.clone())?;
        Ok(Self { id })
    }

    /// Discards the current identity and generates a fresh one.
    pub fn reset(meta: &MetaArea) -> StoreResult<Self> {
        let id = Uuid::new_v4().to_string();
        meta.set(DEVICE_ID_KEY, id.clone())?;
        Ok(Self { id })
    }

    /// The identifier string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_store::{MemoryMedium, StorageMedium};
    use std::sync::Arc;

    #[test]
    fn generated_once_and_stable() {
        let medium: Arc<dyn StorageMedium> = Arc::new(MemoryMedium::new());
        let meta = MetaArea::load(Arc::clone(&medium)).unwrap();

        let first = DeviceIdentity::load_or_create(&meta).unwrap();
        let second = DeviceIdentity::load_or_create(&meta).unwrap();
        assert_eq!(first, second);

        // Survives a meta reload
        let meta = MetaArea::load(medium).unwrap();
        let third = DeviceIdentity::load_or_create(&meta).unwrap();
        assert_eq!(first, third);
    }

    #[test]
    fn reset_generates_fresh_id() {
        let meta = MetaArea::load(Arc::new(MemoryMedium::new())).unwrap();

        let original = DeviceIdentity::load_or_create(&meta).unwrap();
        let reset = DeviceIdentity::reset(&meta).unwrap();
        assert_ne!(original, reset);

        // The new id is the persisted one now
        let loaded = DeviceIdentity::load_or_create(&meta).unwrap();
        assert_eq!(reset, loaded);
    }

    #[test]
    fn id_is_uuid_shaped() {
        let meta = MetaArea::load(Arc::new(MemoryMedium::new())).unwrap();
        let identity = DeviceIdentity::load_or_create(&meta).unwrap();
        assert_eq!(identity.id().len(), 36);
    }
}
