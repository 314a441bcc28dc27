//! # Session Keys
//!
//! Per-conversation AES-256 keys and their RSA-OAEP wrapping.
//!
//! ## Wrapping Flow
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      SESSION KEY WRAPPING                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SENDER (Alice)                       RECIPIENT (Bob)                  │
//! │                                                                         │
//! │  generate_session_key()                                                │
//! │        │  32 random bytes                                              │
//! │        ▼                                                                │
//! │  wrap(key, bob_public)                                                 │
//! │        │  RSA-OAEP(SHA-256)                                            │
//! │        ▼                                                                │
//! │  WrappedSessionKey ───── insecure channel ─────► unwrap(blob,          │
//! │  (modulus-sized blob)                                   bob_private)   │
//! │                                                         │              │
//! │  Alice keeps the plaintext key                          ▼              │
//! │  for her own messages                          same 32-byte key        │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The plaintext key never crosses the channel; only the wrapped blob does.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::Oaep;
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::keys::{PrivateKey, PublicKey, MIN_MODULUS_BITS};
use crate::error::{Error, Result};

/// Size of a session key in bytes (256 bits)
pub const SESSION_KEY_SIZE: usize = 32;

/// A plaintext AES-256 session key
///
/// Zeroized when dropped. `Debug` never prints the key bytes.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; SESSION_KEY_SIZE]);

impl SessionKey {
    /// Generate a fresh key from the OS random number generator
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_KEY_SIZE];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; SESSION_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let bytes: [u8; SESSION_KEY_SIZE] = bytes.try_into().map_err(|_| {
            Error::KeyFormat(format!(
                "session key must be {} bytes, got {}",
                SESSION_KEY_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// Get the raw key bytes
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey(..)")
    }
}

/// A session key encrypted under a recipient's public key
///
/// Safe to send over the insecure channel.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WrappedSessionKey(Vec<u8>);

impl WrappedSessionKey {
    /// Create from raw ciphertext bytes
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw ciphertext bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encode as base64 text for transport or storage
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Decode from base64 text (surrounding whitespace is ignored)
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| Error::Unwrap(format!("wrapped key is not valid base64: {}", e)))?;
        if bytes.is_empty() {
            return Err(Error::Unwrap("wrapped key is empty".into()));
        }
        Ok(Self(bytes))
    }
}

/// Generate a fresh 256-bit session key
pub fn generate_session_key() -> SessionKey {
    SessionKey::generate()
}

/// Serialize a session key as base64 text bytes
pub fn export_session_key(key: &SessionKey) -> Zeroizing<Vec<u8>> {
    Zeroizing::new(STANDARD.encode(key.as_bytes()).into_bytes())
}

/// Parse the output of [`export_session_key`]
pub fn import_session_key(bytes: &[u8]) -> Result<SessionKey> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| Error::KeyFormat("session key is not base64 text".into()))?;
    let raw = Zeroizing::new(
        STANDARD
            .decode(text.trim())
            .map_err(|e| Error::KeyFormat(format!("session key is not valid base64: {}", e)))?,
    );
    SessionKey::from_slice(&raw)
}

/// Wrap a session key for a recipient with RSA-OAEP (SHA-256)
///
/// ## Errors
///
/// `Wrap` if the key cannot carry a 32-byte payload under OAEP (this would be
/// a configuration bug and is reported, never truncated), if the recipient
/// key is below the 2048-bit minimum, or if encryption fails.
pub fn wrap(session_key: &SessionKey, recipient: &PublicKey) -> Result<WrappedSessionKey> {
    let capacity = recipient.max_oaep_payload();
    if SESSION_KEY_SIZE > capacity {
        return Err(Error::Wrap(format!(
            "a {}-byte session key does not fit the {}-byte OAEP payload of a {}-bit key",
            SESSION_KEY_SIZE,
            capacity,
            recipient.modulus_bits()
        )));
    }
    if recipient.modulus_bits() < MIN_MODULUS_BITS {
        return Err(Error::Wrap(format!(
            "recipient key of {} bits is below the {}-bit minimum",
            recipient.modulus_bits(),
            MIN_MODULUS_BITS
        )));
    }

    let ciphertext = recipient
        .as_rsa()
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), session_key.as_bytes())
        .map_err(|e| Error::Wrap(e.to_string()))?;

    Ok(WrappedSessionKey(ciphertext))
}

/// Recover a session key with the holder's private key
///
/// ## Errors
///
/// `Unwrap` if the blob has the wrong length for the key, if OAEP decoding
/// fails (wrong private key or tampered blob), or if the payload is not a
/// 32-byte key.
pub fn unwrap(wrapped: &WrappedSessionKey, holder: &PrivateKey) -> Result<SessionKey> {
    let expected_len = holder.modulus_bits() / 8;
    if wrapped.0.len() != expected_len {
        return Err(Error::Unwrap(format!(
            "wrapped key is {} bytes but a {}-bit key expects {}",
            wrapped.0.len(),
            holder.modulus_bits(),
            expected_len
        )));
    }

    let plaintext = Zeroizing::new(
        holder
            .as_rsa()
            .decrypt(Oaep::new::<Sha256>(), &wrapped.0)
            .map_err(|_| {
                Error::Unwrap("decryption failed: wrong private key or corrupted blob".into())
            })?,
    );

    SessionKey::from_slice(&plaintext)
        .map_err(|_| Error::Unwrap(format!("unwrapped payload is {} bytes", plaintext.len())))
}

// ============================================================================
// TESTS
// ============================================================================
