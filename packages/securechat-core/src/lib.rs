//! # SecureChat Core
//!
//! Hybrid-encryption key lifecycle for chat conversations carried over an
//! untrusted store-and-forward channel.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       SECURECHAT CORE MODULES                           │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                          KeyStore                               │   │
//! │  │  - Identity keypairs per user                                   │   │
//! │  │  - Session keys per conversation                                │   │
//! │  │  - Overwrite policy, per-id locking                             │   │
//! │  └──────────────┬──────────────────────────────────┬───────────────┘   │
//! │                 │                                  │                   │
//! │  ┌──────────────▼──────────────┐   ┌───────────────▼───────────────┐   │
//! │  │          Crypto             │   │           Storage             │   │
//! │  │                             │   │                               │   │
//! │  │ - RSA keys + PEM            │   │ - RecordStore trait           │   │
//! │  │ - RSA-OAEP key wrapping     │   │ - RecordKey (kind/ROLE/id)    │   │
//! │  │ - AES-256-GCM messages      │   │ - MemoryRecordStore           │   │
//! │  └─────────────────────────────┘   └───────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`crypto`] - Key generation, PEM, session key wrapping, message cipher
//! - [`storage`] - Record store abstraction and in-memory implementation
//! - [`keystore`] - Key lifecycle over an injected record store
//! - [`config`] - Key store configuration
//! - [`context`] - Host-provided conversation and user ids
//!
//! ## Example
//!
//! ```ignore
//! use securechat_core::{KeyStore, MemoryRecordStore};
//!
//! let alice = KeyStore::with_defaults(MemoryRecordStore::new());
//! let bob = KeyStore::with_defaults(MemoryRecordStore::new());
//!
//! let bob_keys = bob.create_identity("bob", false)?;
//! let (_, wrapped) = alice.create_and_wrap_session("123", bob_keys.public(), false)?;
//! bob.accept_session("123", "bob", &wrapped, false)?;
//!
//! let envelope = alice.encrypt_outgoing("123", b"hello")?;
//! assert_eq!(bob.decrypt_incoming("123", &envelope)?, b"hello");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod context;
pub mod crypto;
pub mod error;
pub mod keystore;
pub mod storage;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::KeyStoreConfig;
pub use context::{ChatContext, StaticContext};
pub use crypto::{
    CiphertextEnvelope, KeyPair, KeyRole, PrivateKey, PublicKey, SessionKey, WrappedSessionKey,
};
pub use error::{Error, Result};
pub use keystore::{KeyStore, SessionStatus};
pub use storage::{KeyKind, MemoryRecordStore, RecordKey, RecordStore};

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
