//! In-process record store.

use std::collections::HashMap;

use parking_lot::RwLock;
use zeroize::Zeroizing;

use super::{RecordKey, RecordStore};
use crate::error::Result;

/// A [`RecordStore`] backed by a `HashMap`
///
/// Used by tests and by hosts that keep keys only for the lifetime of the
/// process. Values are wiped when overwritten or when the store is dropped.
#[derive(Default)]
pub struct MemoryRecordStore {
    records: RwLock<HashMap<RecordKey, Zeroizing<Vec<u8>>>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store holds no records
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl RecordStore for MemoryRecordStore {
    fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        Ok(self.records.read().get(key).map(|v| v.to_vec()))
    }

    fn set(&self, key: &RecordKey, value: &[u8]) -> Result<()> {
        self.records
            .write()
            .insert(key.clone(), Zeroizing::new(value.to_vec()));
        Ok(())
    }

    fn remove(&self, key: &RecordKey) -> Result<()> {
        self.records.write().remove(key);
        Ok(())
    }

    fn exists(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.records.read().contains_key(key))
    }
}

impl std::fmt::Debug for MemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryRecordStore")
            .field("records", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_exists() {
        let store = MemoryRecordStore::new();
        let key = RecordKey::session_wrapped("123");

        assert!(!store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap(), None);

        store.set(&key, b"blob").unwrap();
        assert!(store.exists(&key).unwrap());
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"blob"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryRecordStore::new();
        let key = RecordKey::identity_public("alice");

        store.set(&key, b"old").unwrap();
        store.set(&key, b"new").unwrap();
        assert_eq!(store.get(&key).unwrap().as_deref(), Some(&b"new"[..]));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = MemoryRecordStore::new();
        let key = RecordKey::session_plaintext("1");

        store.remove(&key).unwrap();
        store.set(&key, b"key").unwrap();
        store.remove(&key).unwrap();
        assert!(!store.exists(&key).unwrap());
        assert!(store.is_empty());
    }

    #[test]
    fn test_debug_hides_values() {
        let store = MemoryRecordStore::new();
        store.set(&RecordKey::session_plaintext("1"), b"secret").unwrap();
        let debug = format!("{:?}", store);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("records: 1"));
    }
}
