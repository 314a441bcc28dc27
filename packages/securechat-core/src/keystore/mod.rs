//! # Key Store
//!
//! Persists identity keypairs and per-conversation session keys through an
//! injected [`RecordStore`], and drives the hybrid key exchange.
//!
//! ## Key Exchange Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        KEY EXCHANGE FLOW                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Alice                                   Bob                            │
//! │  ─────                                   ───                            │
//! │                                          create_identity("bob")         │
//! │                                          export_public_key("bob")       │
//! │                 ◄───── bob public PEM ──────┘                           │
//! │                                                                         │
//! │  create_and_wrap_session(conv, bob_pub)                                 │
//! │  ├─► session/PRIVATE/conv = session key                                 │
//! │  └─► session/PUBLIC/conv  = wrapped key                                 │
//! │           └────────── wrapped key (base64) ──────►                      │
//! │                                                                         │
//! │                                          accept_session(conv, "bob", w) │
//! │                                          ├─► unwrap with bob private    │
//! │                                          ├─► session/PRIVATE/conv       │
//! │                                          └─► session/PUBLIC/conv        │
//! │                                                                         │
//! │  encrypt_outgoing(conv, msg) ─── envelope ──► decrypt_incoming(conv, e) │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Overwrite Policy
//!
//! Creating or receiving a session for a conversation that already has one,
//! or creating an identity for a user that already has one, fails with
//! [`Error::OverwriteRefused`] unless `force` is set. A refused call leaves
//! every stored record untouched.
//!
//! ## Concurrency
//!
//! Every operation on one conversation id (or one user id) runs under a
//! per-id mutex held from the first read to the last write, so two callers
//! can never both pass the overwrite check.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use zeroize::Zeroizing;

use crate::config::KeyStoreConfig;
use crate::crypto::{
    self, export_session_key, import_session_key, CiphertextEnvelope, KeyPair, PrivateKey,
    PublicKey, SerializedKey, SessionKey, WrappedSessionKey,
};
use crate::error::{Error, Result};
use crate::storage::{KeyKind, RecordKey, RecordStore};

/// Which session records exist for a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionStatus {
    /// The plaintext session key (PRIVATE role) is stored
    pub has_plaintext: bool,
    /// The wrapped session key (PUBLIC role) is stored
    pub has_wrapped: bool,
}

impl SessionStatus {
    /// Check if any session material exists
    pub fn exists(&self) -> bool {
        self.has_plaintext || self.has_wrapped
    }

    /// Check if messages can be encrypted and decrypted
    pub fn is_ready(&self) -> bool {
        self.has_plaintext
    }
}

/// Key lifecycle manager over a host-provided record store
pub struct KeyStore<S: RecordStore> {
    /// Backing record storage
    store: S,
    /// Configuration
    config: KeyStoreConfig,
    /// Per-id locks, present only while an operation on the id is running
    locks: Mutex<HashMap<(KeyKind, String), Arc<Mutex<()>>>>,
}

impl<S: RecordStore> KeyStore<S> {
    /// Create a key store over `store`
    ///
    /// Fails with `InvalidConfig` if the configured modulus would be rejected
    /// by key generation.
    pub fn new(store: S, config: KeyStoreConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Create a key store with the default configuration
    pub fn with_defaults(store: S) -> Self {
        Self {
            store,
            config: KeyStoreConfig::default(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get the configuration
    pub fn config(&self) -> &KeyStoreConfig {
        &self.config
    }

    /// Get the backing record store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Run `op` while holding the lock for one id
    ///
    /// The table entry is dropped again once no other caller holds or waits
    /// on it, so the table only grows with the number of ids in use at once.
    fn with_lock<T>(
        &self,
        kind: KeyKind,
        id: &str,
        op: impl FnOnce() -> Result<T>,
    ) -> Result<T> {
        let entry = (kind, id.to_string());
        let lock = self.locks.lock().entry(entry.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock();
            op()
        };

        // Clones are only taken under the table lock, so the count is stable here
        let mut locks = self.locks.lock();
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&entry);
        }
        result
    }

    /// Write two records that must change together
    ///
    /// If the second write fails, the first record is put back to its
    /// previous value (or removed if it was absent) before the error is
    /// returned, so the pair is never left half replaced.
    fn write_pair(
        &self,
        first: &RecordKey,
        first_value: &[u8],
        second: &RecordKey,
        second_value: &[u8],
    ) -> Result<()> {
        let previous = self.store.get(first)?.map(Zeroizing::new);
        self.store.set(first, first_value)?;

        if let Err(err) = self.store.set(second, second_value) {
            let restored = match &previous {
                Some(bytes) => self.store.set(first, bytes),
                None => self.store.remove(first),
            };
            match restored {
                Ok(()) => tracing::warn!(record = %first, "Rolled back partial write"),
                Err(rollback) => tracing::error!(
                    record = %first,
                    error = %rollback,
                    "Failed to roll back partial write"
                ),
            }
            return Err(err);
        }
        Ok(())
    }

    // ========================================================================
    // SESSION KEYS
    // ========================================================================

    /// Check if a session key (plaintext or wrapped) exists for a conversation
    pub fn has_session_key(&self, conversation_id: &str) -> Result<bool> {
        Ok(self.session_status(conversation_id)?.exists())
    }

    /// Report which session records exist for a conversation
    pub fn session_status(&self, conversation_id: &str) -> Result<SessionStatus> {
        self.with_lock(KeyKind::Session, conversation_id, || {
            self.session_status_locked(conversation_id)
        })
    }

    fn session_status_locked(&self, conversation_id: &str) -> Result<SessionStatus> {
        Ok(SessionStatus {
            has_plaintext: self
                .store
                .exists(&RecordKey::session_plaintext(conversation_id))?,
            has_wrapped: self
                .store
                .exists(&RecordKey::session_wrapped(conversation_id))?,
        })
    }

    fn check_session_overwrite(&self, conversation_id: &str, force: bool) -> Result<()> {
        if !self.session_status_locked(conversation_id)?.exists() {
            return Ok(());
        }
        if !force {
            return Err(Error::OverwriteRefused(format!(
                "session key for conversation {}",
                conversation_id
            )));
        }
        tracing::warn!(conversation_id, "Replacing existing session key");
        Ok(())
    }

    fn persist_session(
        &self,
        conversation_id: &str,
        session_key: &SessionKey,
        wrapped: &WrappedSessionKey,
    ) -> Result<()> {
        self.write_pair(
            &RecordKey::session_plaintext(conversation_id),
            &export_session_key(session_key),
            &RecordKey::session_wrapped(conversation_id),
            wrapped.to_base64().as_bytes(),
        )
    }

    /// Generate a session key for a conversation and wrap it for the recipient
    ///
    /// Persists the plaintext key under the PRIVATE role and the wrapped key
    /// under the PUBLIC role, then returns both. The wrapped key is what the
    /// host sends to the recipient.
    pub fn create_and_wrap_session(
        &self,
        conversation_id: &str,
        recipient_public_key: &PublicKey,
        force: bool,
    ) -> Result<(SessionKey, WrappedSessionKey)> {
        self.with_lock(KeyKind::Session, conversation_id, || {
            self.check_session_overwrite(conversation_id, force)?;

            let session_key = crypto::generate_session_key();
            let wrapped = crypto::wrap(&session_key, recipient_public_key)?;
            self.persist_session(conversation_id, &session_key, &wrapped)?;

            tracing::info!(conversation_id, "Created session key");
            Ok((session_key, wrapped))
        })
    }

    /// Unwrap a received session key and store it for a conversation
    ///
    /// Both the recovered plaintext key and the received wrapped copy are
    /// persisted. Nothing is written if unwrapping fails.
    pub fn receive_and_unwrap_session(
        &self,
        conversation_id: &str,
        wrapped: &WrappedSessionKey,
        own_private_key: &PrivateKey,
        force: bool,
    ) -> Result<SessionKey> {
        self.with_lock(KeyKind::Session, conversation_id, || {
            self.check_session_overwrite(conversation_id, force)?;

            let session_key = crypto::unwrap(wrapped, own_private_key)?;
            self.persist_session(conversation_id, &session_key, wrapped)?;

            tracing::info!(conversation_id, "Accepted session key");
            Ok(session_key)
        })
    }

    /// Unwrap a received session key with the stored identity of `user_id`
    pub fn accept_session(
        &self,
        conversation_id: &str,
        user_id: &str,
        wrapped: &WrappedSessionKey,
        force: bool,
    ) -> Result<SessionKey> {
        let identity = self.load_identity(user_id)?;
        self.receive_and_unwrap_session(conversation_id, wrapped, identity.private(), force)
    }

    /// Load the plaintext session key of a conversation
    ///
    /// Returns `NoSessionKey` if no key exchange has completed.
    pub fn session_key(&self, conversation_id: &str) -> Result<SessionKey> {
        self.with_lock(KeyKind::Session, conversation_id, || {
            let key = RecordKey::session_plaintext(conversation_id);
            let bytes = Zeroizing::new(
                self.store
                    .get(&key)?
                    .ok_or_else(|| Error::NoSessionKey(conversation_id.to_string()))?,
            );
            import_session_key(&bytes)
                .map_err(|e| Error::StorageCorrupted(format!("{}: {}", key, e)))
        })
    }

    /// Load the wrapped session key of a conversation, if any
    ///
    /// This is the blob to resend when the recipient lost the first copy.
    pub fn wrapped_session_key(&self, conversation_id: &str) -> Result<Option<WrappedSessionKey>> {
        self.with_lock(KeyKind::Session, conversation_id, || {
            let key = RecordKey::session_wrapped(conversation_id);
            let Some(bytes) = self.store.get(&key)? else {
                return Ok(None);
            };
            let text = std::str::from_utf8(&bytes)
                .map_err(|_| Error::StorageCorrupted(format!("{}: not UTF-8", key)))?;
            WrappedSessionKey::from_base64(text)
                .map(Some)
                .map_err(|e| Error::StorageCorrupted(format!("{}: {}", key, e)))
        })
    }

    /// Encrypt a message for a conversation
    pub fn encrypt_outgoing(
        &self,
        conversation_id: &str,
        plaintext: &[u8],
    ) -> Result<CiphertextEnvelope> {
        let session_key = self.session_key(conversation_id)?;
        let envelope = crypto::encrypt(plaintext, &session_key)?;
        tracing::debug!(conversation_id, len = plaintext.len(), "Encrypted message");
        Ok(envelope)
    }

    /// Decrypt a message received in a conversation
    ///
    /// `NoSessionKey` means no key exchange has happened yet; `Decryption`
    /// means the envelope itself was rejected.
    pub fn decrypt_incoming(
        &self,
        conversation_id: &str,
        envelope: &CiphertextEnvelope,
    ) -> Result<Vec<u8>> {
        let session_key = self.session_key(conversation_id)?;
        crypto::decrypt(envelope, &session_key)
    }

    // ========================================================================
    // IDENTITY KEYS
    // ========================================================================

    /// Check if a keypair is stored for a user
    pub fn has_identity(&self, user_id: &str) -> Result<bool> {
        self.with_lock(KeyKind::Identity, user_id, || {
            self.store.exists(&RecordKey::identity_private(user_id))
        })
    }

    /// Generate and store a keypair for a user
    ///
    /// Uses the configured modulus size.
    pub fn create_identity(&self, user_id: &str, force: bool) -> Result<KeyPair> {
        self.with_lock(KeyKind::Identity, user_id, || {
            let private_record = RecordKey::identity_private(user_id);
            let public_record = RecordKey::identity_public(user_id);

            if self.store.exists(&private_record)? || self.store.exists(&public_record)? {
                if !force {
                    return Err(Error::OverwriteRefused(format!(
                        "identity keypair for user {}",
                        user_id
                    )));
                }
                tracing::warn!(user_id, "Replacing existing identity keypair");
            }

            let keypair = KeyPair::generate(self.config.modulus_bits)?;
            let private_pem = keypair.private().to_pem()?;
            let public_pem = keypair.public().to_pem()?;

            self.write_pair(
                &private_record,
                private_pem.as_bytes(),
                &public_record,
                public_pem.as_bytes(),
            )?;

            tracing::info!(
                user_id,
                modulus_bits = keypair.modulus_bits(),
                "Created identity keypair"
            );
            Ok(keypair)
        })
    }

    /// Load a user's keypair
    ///
    /// Returns `NoIdentityKey` if none was created.
    pub fn load_identity(&self, user_id: &str) -> Result<KeyPair> {
        self.with_lock(KeyKind::Identity, user_id, || {
            let key = RecordKey::identity_private(user_id);
            let bytes = Zeroizing::new(
                self.store
                    .get(&key)?
                    .ok_or_else(|| Error::NoIdentityKey(user_id.to_string()))?,
            );
            let pem = std::str::from_utf8(&bytes)
                .map_err(|_| Error::StorageCorrupted(format!("{}: not UTF-8", key)))?;
            let private = PrivateKey::from_pem(pem)
                .map_err(|e| Error::StorageCorrupted(format!("{}: {}", key, e)))?;

            Ok(KeyPair::from_private(private))
        })
    }

    /// Export a user's public key as PEM for sharing
    pub fn export_public_key(&self, user_id: &str) -> Result<SerializedKey> {
        self.with_lock(KeyKind::Identity, user_id, || {
            let key = RecordKey::identity_public(user_id);
            let bytes = self
                .store
                .get(&key)?
                .ok_or_else(|| Error::NoIdentityKey(user_id.to_string()))?;
            let pem = String::from_utf8(bytes)
                .map_err(|_| Error::StorageCorrupted(format!("{}: not UTF-8", key)))?;

            // Confirm the record still parses before handing it out
            PublicKey::from_pem(&pem)
                .map_err(|e| Error::StorageCorrupted(format!("{}: {}", key, e)))?;

            Ok(Zeroizing::new(pem))
        })
    }
}

impl<S: RecordStore> std::fmt::Debug for KeyStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyStore")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{generate_keypair, KeyRole};
    use crate::storage::MemoryRecordStore;
    use once_cell::sync::Lazy;
    use std::sync::atomic::{AtomicBool, Ordering};

    static ALICE: Lazy<KeyPair> = Lazy::new(|| generate_keypair(2048).unwrap());
    static BOB: Lazy<KeyPair> = Lazy::new(|| generate_keypair(2048).unwrap());

    fn keystore() -> KeyStore<MemoryRecordStore> {
        KeyStore::with_defaults(MemoryRecordStore::new())
    }

    /// Memory store whose PUBLIC-role writes fail while `fail_public` is set
    #[derive(Default)]
    struct FailingStore {
        inner: MemoryRecordStore,
        fail_public: AtomicBool,
    }

    impl FailingStore {
        fn fail_public_writes(&self, fail: bool) {
            self.fail_public.store(fail, Ordering::SeqCst);
        }
    }

    impl RecordStore for FailingStore {
        fn get(&self, key: &RecordKey) -> Result<Option<Vec<u8>>> {
            self.inner.get(key)
        }

        fn set(&self, key: &RecordKey, value: &[u8]) -> Result<()> {
            if key.role == KeyRole::Public && self.fail_public.load(Ordering::SeqCst) {
                return Err(Error::StorageWrite("disk full".into()));
            }
            self.inner.set(key, value)
        }

        fn remove(&self, key: &RecordKey) -> Result<()> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn test_new_rejects_bad_config() {
        let config = KeyStoreConfig::default().with_modulus_bits(1024);
        let err = KeyStore::new(MemoryRecordStore::new(), config).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn test_encrypt_without_session_fails() {
        let ks = keystore();
        let err = ks.encrypt_outgoing("123", b"hi").unwrap_err();
        assert!(matches!(err, Error::NoSessionKey(ref id) if id == "123"));
    }

    #[test]
    fn test_decrypt_without_session_is_not_decryption_error() {
        let ks = keystore();
        let envelope = crypto::encrypt(b"hi", &crypto::generate_session_key()).unwrap();
        let err = ks.decrypt_incoming("123", &envelope).unwrap_err();
        assert!(matches!(err, Error::NoSessionKey(_)));
    }

    #[test]
    fn test_create_session_then_encrypt_decrypt() {
        let ks = keystore();
        let (session_key, wrapped) = ks.create_and_wrap_session("123", BOB.public(), false).unwrap();

        assert!(ks.has_session_key("123").unwrap());
        assert_eq!(
            ks.session_status("123").unwrap(),
            SessionStatus {
                has_plaintext: true,
                has_wrapped: true
            }
        );
        assert_eq!(ks.session_key("123").unwrap(), session_key);
        assert_eq!(ks.wrapped_session_key("123").unwrap(), Some(wrapped));

        let envelope = ks.encrypt_outgoing("123", b"hello").unwrap();
        assert_eq!(ks.decrypt_incoming("123", &envelope).unwrap(), b"hello");
    }

    #[test]
    fn test_sessions_are_per_conversation() {
        let ks = keystore();
        ks.create_and_wrap_session("123", BOB.public(), false).unwrap();
        ks.create_and_wrap_session("456", BOB.public(), false).unwrap();

        let envelope = ks.encrypt_outgoing("123", b"only for 123").unwrap();
        let err = ks.decrypt_incoming("456", &envelope).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
        assert!(!ks.has_session_key("789").unwrap());
    }

    #[test]
    fn test_overwrite_refused_without_force() {
        let ks = keystore();
        let (original, original_wrapped) =
            ks.create_and_wrap_session("123", BOB.public(), false).unwrap();

        let err = ks.create_and_wrap_session("123", BOB.public(), false).unwrap_err();
        assert!(matches!(err, Error::OverwriteRefused(_)));

        // Stored material is untouched
        assert_eq!(ks.session_key("123").unwrap(), original);
        assert_eq!(ks.wrapped_session_key("123").unwrap(), Some(original_wrapped));
    }

    #[test]
    fn test_force_replaces_session() {
        let ks = keystore();
        ks.create_and_wrap_session("123", BOB.public(), false).unwrap();
        let old_envelope = ks.encrypt_outgoing("123", b"old").unwrap();

        let (new_key, _) = ks.create_and_wrap_session("123", BOB.public(), true).unwrap();
        assert_eq!(ks.session_key("123").unwrap(), new_key);

        let err = ks.decrypt_incoming("123", &old_envelope).unwrap_err();
        assert!(matches!(err, Error::Decryption(_)));
    }

    #[test]
    fn test_receive_refuses_overwrite() {
        let ks = keystore();
        let (original, _) = ks.create_and_wrap_session("123", BOB.public(), false).unwrap();

        let incoming = crypto::wrap(&crypto::generate_session_key(), BOB.public()).unwrap();
        let err = ks
            .receive_and_unwrap_session("123", &incoming, BOB.private(), false)
            .unwrap_err();
        assert!(matches!(err, Error::OverwriteRefused(_)));
        assert_eq!(ks.session_key("123").unwrap(), original);

        let replaced = ks
            .receive_and_unwrap_session("123", &incoming, BOB.private(), true)
            .unwrap();
        assert_eq!(ks.session_key("123").unwrap(), replaced);
        assert_eq!(ks.wrapped_session_key("123").unwrap(), Some(incoming));
    }

    #[test]
    fn test_receive_with_wrong_key_writes_nothing() {
        let ks = keystore();
        let wrapped = crypto::wrap(&crypto::generate_session_key(), ALICE.public()).unwrap();

        let err = ks
            .receive_and_unwrap_session("123", &wrapped, BOB.private(), false)
            .unwrap_err();
        assert!(matches!(err, Error::Unwrap(_)));
        assert_eq!(ks.session_status("123").unwrap(), SessionStatus::default());
    }

    #[test]
    fn test_corrupted_session_record() {
        let ks = keystore();
        ks.store()
            .set(&RecordKey::session_plaintext("123"), b"not a key")
            .unwrap();

        let err = ks.encrypt_outgoing("123", b"hi").unwrap_err();
        assert!(matches!(err, Error::StorageCorrupted(_)));
        assert!(!err.to_string().contains("not a key"));
    }

    #[test]
    fn test_identity_lifecycle() {
        let ks = keystore();
        assert!(!ks.has_identity("alice").unwrap());
        assert!(matches!(
            ks.load_identity("alice"),
            Err(Error::NoIdentityKey(_))
        ));
        assert!(matches!(
            ks.export_public_key("alice"),
            Err(Error::NoIdentityKey(_))
        ));

        let created = ks.create_identity("alice", false).unwrap();
        assert!(ks.has_identity("alice").unwrap());
        assert_eq!(created.modulus_bits(), 2048);

        let loaded = ks.load_identity("alice").unwrap();
        assert_eq!(loaded.public(), created.public());

        let pem = ks.export_public_key("alice").unwrap();
        assert_eq!(PublicKey::from_pem(&pem).unwrap(), *created.public());

        let err = ks.create_identity("alice", false).unwrap_err();
        assert!(matches!(err, Error::OverwriteRefused(_)));
        assert_eq!(ks.load_identity("alice").unwrap().public(), created.public());
    }

    #[test]
    fn test_accept_session_with_stored_identity() {
        let sender = keystore();
        let receiver = keystore();

        let bob = receiver.create_identity("bob", false).unwrap();
        let (sent_key, wrapped) = sender
            .create_and_wrap_session("123", bob.public(), false)
            .unwrap();

        let received = receiver.accept_session("123", "bob", &wrapped, false).unwrap();
        assert_eq!(received, sent_key);

        let envelope = sender.encrypt_outgoing("123", b"hi bob").unwrap();
        assert_eq!(receiver.decrypt_incoming("123", &envelope).unwrap(), b"hi bob");
    }

    #[test]
    fn test_accept_session_without_identity() {
        let ks = keystore();
        let wrapped = crypto::wrap(&crypto::generate_session_key(), BOB.public()).unwrap();
        let err = ks.accept_session("123", "bob", &wrapped, false).unwrap_err();
        assert!(matches!(err, Error::NoIdentityKey(_)));
    }

    #[test]
    fn test_concurrent_create_only_one_wins() {
        let ks = keystore();
        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| ks.create_and_wrap_session("race", BOB.public(), false).is_ok())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|ok| **ok).count(), 1);
        assert!(ks.locks.lock().is_empty());
    }

    #[test]
    fn test_lock_table_is_pruned() {
        let ks = keystore();
        for i in 0..100 {
            assert!(!ks.has_session_key(&format!("conversation-{}", i)).unwrap());
            assert!(!ks.has_identity(&format!("user-{}", i)).unwrap());
        }
        ks.create_and_wrap_session("123", BOB.public(), false).unwrap();
        ks.encrypt_outgoing("123", b"hi").unwrap();

        assert!(ks.locks.lock().is_empty());
    }

    #[test]
    fn test_failed_identity_write_keeps_previous_keypair() {
        let ks = KeyStore::with_defaults(FailingStore::default());
        let original = ks.create_identity("bob", false).unwrap();

        ks.store().fail_public_writes(true);
        let err = ks.create_identity("bob", true).unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
        ks.store().fail_public_writes(false);

        // Both halves are still the original pair
        let loaded = ks.load_identity("bob").unwrap();
        assert_eq!(loaded.public(), original.public());
        let exported = PublicKey::from_pem(&ks.export_public_key("bob").unwrap()).unwrap();
        assert_eq!(&exported, loaded.public());

        // A session wrapped to the exported key can still be accepted
        let sent = crypto::generate_session_key();
        let wrapped = crypto::wrap(&sent, &exported).unwrap();
        let received = ks.accept_session("123", "bob", &wrapped, false).unwrap();
        assert_eq!(received, sent);
    }

    #[test]
    fn test_failed_first_identity_write_leaves_nothing() {
        let ks = KeyStore::with_defaults(FailingStore::default());
        ks.store().fail_public_writes(true);

        let err = ks.create_identity("carol", false).unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
        assert!(!ks.has_identity("carol").unwrap());
        assert!(ks.store().inner.is_empty());
    }

    #[test]
    fn test_failed_session_write_keeps_previous_pair() {
        let ks = KeyStore::with_defaults(FailingStore::default());
        let (original, original_wrapped) =
            ks.create_and_wrap_session("123", BOB.public(), false).unwrap();

        ks.store().fail_public_writes(true);
        let err = ks.create_and_wrap_session("123", BOB.public(), true).unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));

        assert_eq!(ks.session_key("123").unwrap(), original);
        let stored_wrapped = ks.wrapped_session_key("123").unwrap().unwrap();
        assert_eq!(stored_wrapped, original_wrapped);
        assert_eq!(crypto::unwrap(&stored_wrapped, BOB.private()).unwrap(), original);

        // A first exchange that fails leaves no half session behind
        let err = ks
            .receive_and_unwrap_session("456", &original_wrapped, BOB.private(), false)
            .unwrap_err();
        assert!(matches!(err, Error::StorageWrite(_)));
        assert_eq!(ks.session_status("456").unwrap(), SessionStatus::default());
    }
}
