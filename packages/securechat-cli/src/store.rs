//! File-backed record store.
//!
//! ```text
//! <root>/
//! ├── identity/
//! │   ├── PRIVATE/<hex(user_id)>
//! │   └── PUBLIC/<hex(user_id)>
//! └── session/
//!     ├── PRIVATE/<hex(conversation_id)>
//!     └── PUBLIC/<hex(conversation_id)>
//! ```
//!
//! Ids are hex encoded in file names, so no id can name a path outside the
//! root. Writes go to a temporary file in the same directory, created
//! owner-only, and are renamed into place.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use securechat_core::{Error, RecordKey, RecordStore, Result};
use tempfile::NamedTempFile;

/// A [`RecordStore`] keeping one file per record under a root directory
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
}

impl FileRecordStore {
    /// Create a store rooted at `root`, creating the directory if needed
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::StorageWrite(format!("cannot create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &RecordKey) -> PathBuf {
        self.root
            .join(key.kind.as_str())
            .join(key.role.as_str())
            .join(hex::encode(key.id.as_bytes()))
    }
}

impl RecordStore for FileRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::StorageRead(format!("{}: {}", key, e))),
        }
    }

    fn set(&self, key: &RecordKey, value: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        let parent = path.parent().unwrap_or(self.root.as_path());
        std::fs::create_dir_all(parent)
            .map_err(|e| Error::StorageWrite(format!("{}: {}", key, e)))?;

        // Mode 0600 from creation; the file is deleted when dropped unpersisted
        let mut tmp = NamedTempFile::new_in(parent)
            .map_err(|e| Error::StorageWrite(format!("{}: {}", key, e)))?;
        tmp.write_all(value)
            .and_then(|()| tmp.as_file().sync_all())
            .map_err(|e| Error::StorageWrite(format!("{}: {}", key, e)))?;
        tmp.persist(&path)
            .map_err(|e| Error::StorageWrite(format!("{}: {}", key, e.error)))?;

        tracing::debug!(record = %key, "Record written");
        Ok(())
    }

    fn remove(&self, key: &RecordKey) -> Result<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => {
                tracing::debug!(record = %key, "Record removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::StorageWrite(format!("{}: {}", key, e))),
        }
    }

    fn exists(&self, key: &RecordKey) -> Result<bool> {
        self.path_for(key)
            .try_exists()
            .map_err(|e| Error::StorageRead(format!("{}: {}", key, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securechat_core::{KeyKind, KeyRole};
    use tempfile::TempDir;

    #[test]
    fn test_set_get_exists() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp_dir.path()).unwrap();
        let key = RecordKey::session_wrapped("123");

        assert!(!store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap(), None);

        store.set(&key, b"wrapped").unwrap();
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"wrapped"[..]));

        store.set(&key, b"replaced").unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"replaced"[..]));
    }

    #[test]
    fn test_records_are_separated_by_role_and_kind() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp_dir.path()).unwrap();

        store.set(&RecordKey::session_plaintext("1"), b"a").unwrap();
        store.set(&RecordKey::session_wrapped("1"), b"b").unwrap();
        store
            .set(&RecordKey::new("1", KeyRole::Private, KeyKind::Identity), b"c")
            .unwrap();

        assert_eq!(
            store.get(&RecordKey::session_plaintext("1")).unwrap().as_deref(),
            Some(&b"a"[..])
        );
        assert_eq!(
            store.get(&RecordKey::session_wrapped("1")).unwrap().as_deref(),
            Some(&b"b"[..])
        );
        assert!(!store.exists(&RecordKey::identity_public("1")).unwrap());
    }

    #[test]
    fn test_ids_cannot_escape_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("store");
        let store = FileRecordStore::open(&root).unwrap();

        let key = RecordKey::session_plaintext("../../etc/passwd");
        store.set(&key, b"x").unwrap();

        let path = store.path_for(&key);
        assert!(path.starts_with(&root));
        assert!(!path.to_string_lossy().contains(".."));
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"x"[..]));
    }

    #[cfg(unix)]
    #[test]
    fn test_private_records_are_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp_dir.path()).unwrap();
        let key = RecordKey::identity_private("alice");
        store.set(&key, b"pem").unwrap();

        let mode = std::fs::metadata(store.path_for(&key)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_failed_write_leaves_no_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp_dir.path()).unwrap();
        let key = RecordKey::session_plaintext("123");

        // A directory in the record's place makes the final rename fail
        let path = store.path_for(&key);
        std::fs::create_dir_all(&path).unwrap();

        let err = store.set(&key, b"secret").unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));

        let parent = path.parent().unwrap();
        let entries: Vec<_> = std::fs::read_dir(parent).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_write_and_remove_leave_only_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileRecordStore::open(temp_dir.path()).unwrap();
        let kept = RecordKey::identity_private("alice");
        let removed = RecordKey::identity_private("bob");

        store.set(&kept, b"one").unwrap();
        store.set(&kept, b"two").unwrap();
        store.set(&removed, b"three").unwrap();
        store.remove(&removed).unwrap();
        store.remove(&removed).unwrap();

        let parent = store.path_for(&kept).parent().unwrap().to_path_buf();
        let names: Vec<_> = std::fs::read_dir(&parent)
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from(hex::encode("alice"))]);
        assert!(!store.exists(&removed).unwrap());
    }
}
