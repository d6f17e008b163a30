//! On-disk storage medium.

use crate::error::{StoreError, StoreResult};
use crate::medium::{validate_region_name, StorageMedium, StorageUsage};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// File extension for region files.
const REGION_EXT: &str = "region";
/// Name of the exclusive lock file inside the store directory.
const LOCK_FILE: &str = ".satchel.lock";

/// A persistent storage medium backed by a directory.
///
/// Each region is one file (`<name>.region`). Writes go to a temporary
/// file first and are renamed into place, so a crash mid-write leaves
/// either the old or the new content.
///
/// The directory is protected by an exclusive advisory lock for the
/// lifetime of the medium: a second process opening the same directory
/// gets [`StoreError::Unavailable`], which callers treat as the signal
/// to degrade to a memory-only medium.
#[derive(Debug)]
pub struct FileMedium {
    dir: PathBuf,
    /// Held for the medium's lifetime; released when the medium drops.
    _lock: File,
    quota_bytes: Option<u64>,
}

impl FileMedium {
    /// Opens (creating if absent) the medium at `dir` with no quota.
    pub fn open(dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_quota(dir, None)
    }

    /// Opens the medium with a quota that writes may not exceed.
    pub fn open_with_quota(dir: impl AsRef<Path>, quota_bytes: Option<u64>) -> StoreResult<Self> {
        let dir = dir.as_ref().to_path_buf();

        fs::create_dir_all(&dir)
            .map_err(|e| StoreError::unavailable(format!("cannot create {}: {e}", dir.display())))?;

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(dir.join(LOCK_FILE))
            .map_err(|e| StoreError::unavailable(format!("cannot open lock file: {e}")))?;

        lock.try_lock_exclusive().map_err(|_| {
            StoreError::unavailable(format!(
                "store directory {} is locked by another process",
                dir.display()
            ))
        })?;

        Ok(Self {
            dir,
            _lock: lock,
            quota_bytes,
        })
    }

    /// Returns the directory this medium stores regions in.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn region_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.{REGION_EXT}"))
    }

    fn used_bytes(&self) -> StoreResult<u64> {
        let mut total = 0u64;
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(REGION_EXT) {
                total += entry.metadata()?.len();
            }
        }
        Ok(total)
    }
}

impl StorageMedium for FileMedium {
    fn read_region(&self, name: &str) -> StoreResult<Option<Vec<u8>>> {
        match fs::read(self.region_path(name)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_region(&self, name: &str, data: &[u8]) -> StoreResult<()> {
        if !validate_region_name(name) {
            return Err(StoreError::invalid_name(name));
        }

        if let Some(quota) = self.quota_bytes {
            let path = self.region_path(name);
            let existing = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            let needed = self.used_bytes()? - existing + data.len() as u64;
            if needed > quota {
                return Err(StoreError::QuotaExceeded { needed, quota });
            }
        }

        let final_path = self.region_path(name);
        let tmp_path = self.dir.join(format!("{name}.{REGION_EXT}.tmp"));

        let mut tmp = File::create(&tmp_path)?;
        tmp.write_all(data)?;
        tmp.sync_all()?;
        drop(tmp);

        fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }

    fn remove_region(&self, name: &str) -> StoreResult<()> {
        match fs::remove_file(self.region_path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn list_regions(&self) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some(REGION_EXT) {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn usage(&self) -> StoreResult<StorageUsage> {
        Ok(StorageUsage {
            used_bytes: self.used_bytes()?,
            quota_bytes: self.quota_bytes,
        })
    }

    fn persistent(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_read_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let medium = FileMedium::open(tmp.path()).unwrap();

        medium.write_region("collection.tasks", b"[1,2,3]").unwrap();
        assert_eq!(
            medium.read_region("collection.tasks").unwrap(),
            Some(b"[1,2,3]".to_vec())
        );
        assert_eq!(medium.read_region("missing").unwrap(), None);
    }

    #[test]
    fn survives_reopen() {
        let tmp = TempDir::new().unwrap();
        {
            let medium = FileMedium::open(tmp.path()).unwrap();
            medium.write_region("meta", b"persisted").unwrap();
        }

        let medium = FileMedium::open(tmp.path()).unwrap();
        assert_eq!(
            medium.read_region("meta").unwrap(),
            Some(b"persisted".to_vec())
        );
    }

    #[test]
    fn second_open_is_unavailable() {
        let tmp = TempDir::new().unwrap();
        let _first = FileMedium::open(tmp.path()).unwrap();

        let err = FileMedium::open(tmp.path()).unwrap_err();
        assert!(matches!(err, StoreError::Unavailable { .. }));
    }

    #[test]
    fn lock_released_on_drop() {
        let tmp = TempDir::new().unwrap();
        {
            let _medium = FileMedium::open(tmp.path()).unwrap();
        }
        // Previous lock dropped; reopening succeeds
        FileMedium::open(tmp.path()).unwrap();
    }

    #[test]
    fn list_and_remove() {
        let tmp = TempDir::new().unwrap();
        let medium = FileMedium::open(tmp.path()).unwrap();

        medium.write_region("b", b"1").unwrap();
        medium.write_region("a", b"2").unwrap();
        assert_eq!(medium.list_regions().unwrap(), vec!["a", "b"]);

        medium.remove_region("a").unwrap();
        assert_eq!(medium.list_regions().unwrap(), vec!["b"]);

        // Removing an absent region is a no-op
        medium.remove_region("a").unwrap();
    }

    #[test]
    fn quota_enforced() {
        let tmp = TempDir::new().unwrap();
        let medium = FileMedium::open_with_quota(tmp.path(), Some(8)).unwrap();

        medium.write_region("r", b"1234").unwrap();

        let err = medium.write_region("other", b"123456").unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { .. }));

        // Region keeps its previous content after a rejected write
        assert_eq!(medium.read_region("other").unwrap(), None);

        let usage = medium.usage().unwrap();
        assert_eq!(usage.used_bytes, 4);
        assert_eq!(usage.quota_bytes, Some(8));
    }

    #[test]
    fn overwrite_is_atomic_replacement() {
        let tmp = TempDir::new().unwrap();
        let medium = FileMedium::open(tmp.path()).unwrap();

        medium.write_region("r", b"old content").unwrap();
        medium.write_region("r", b"new").unwrap();

        assert_eq!(medium.read_region("r").unwrap(), Some(b"new".to_vec()));
        // No stray temporary files left behind
        let leftovers: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn invalid_name_rejected() {
        let tmp = TempDir::new().unwrap();
        let medium = FileMedium::open(tmp.path()).unwrap();

        let err = medium.write_region("../escape", b"x").unwrap_err();
        assert!(matches!(err, StoreError::InvalidName { .. }));
    }

    #[test]
    fn persistent_flag() {
        let tmp = TempDir::new().unwrap();
        assert!(FileMedium::open(tmp.path()).unwrap().persistent());
    }
}
