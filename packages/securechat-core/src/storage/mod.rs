//! # Storage Module
//!
//! Byte-blob records addressed by a composite [`RecordKey`].
//!
//! ## Storage Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  KeyStore ──► RecordStore trait                                        │
//! │               ──────────────────                                        │
//! │               • get(key)          - Read a record, None if absent      │
//! │               • set(key, value)   - Create or replace a record         │
//! │               • exists(key)       - Presence check                     │
//! │               • remove(key)       - Delete a record if present         │
//! │                                                                         │
//! │  Implementations:                                                      │
//! │  ┌───────────────────────┐  ┌───────────────────────┐                  │
//! │  │  MemoryRecordStore    │  │  FileRecordStore      │                  │
//! │  │  (this crate)         │  │  (securechat-cli)     │                  │
//! │  │  RwLock<HashMap>      │  │  one file per record  │                  │
//! │  └───────────────────────┘  └───────────────────────┘                  │
//! │                                                                         │
//! │  Record address: kind / ROLE / id                                      │
//! │  session/PRIVATE/<conversation>  plaintext session key                 │
//! │  session/PUBLIC/<conversation>   wrapped session key                   │
//! │  identity/PRIVATE/<user>         private key PEM                       │
//! │  identity/PUBLIC/<user>          public key PEM                        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stores only move bytes. Overwrite policy and locking live in the key store.

mod memory;
mod record;

pub use memory::MemoryRecordStore;
pub use record::{KeyKind, RecordKey};

use std::sync::Arc;

use crate::error::Result;

/// Key-value storage for key material, provided by the host
pub trait RecordStore: Send + Sync {
    /// Read a record, `None` if it does not exist
    fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>>;

    /// Create or replace a record
    fn set(&self, key: &RecordKey, value: &[u8]) -> Result<()>;

    /// Delete a record; removing an absent record is not an error
    fn remove(&self, key: &RecordKey) -> Result<()>;

    /// Check whether a record exists
    fn exists(&self, key: &RecordKey) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }
}

impl<T: RecordStore + ?Sized> RecordStore for Arc<T> {
    fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &RecordKey, value: &[u8]) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &RecordKey) -> Result<()> {
        (**self).remove(key)
    }

    fn exists(&self, key: &RecordKey) -> Result<bool> {
        (**self).exists(key)
    }
}
