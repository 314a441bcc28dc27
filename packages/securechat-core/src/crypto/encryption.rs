//! # Message Cipher
//!
//! AES-256-GCM encryption of chat messages under a conversation's session key.
//!
//! ## Envelope Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       CIPHERTEXT ENVELOPE                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  encrypt(plaintext, session_key)                                       │
//! │  ┌─────────────────────────────────────────────────────────────┐       │
//! │  │  nonce      = 12 random bytes from OsRng (fresh per call)   │       │
//! │  │  ciphertext = AES-256-GCM(key, nonce, plaintext)            │       │
//! │  │               └── includes the 16-byte auth tag at the end  │       │
//! │  └─────────────────────────────────────────────────────────────┘       │
//! │                                                                         │
//! │  Wire form (base64 text):                                              │
//! │  ┌────────────┬──────────────────────────────┬──────────────┐          │
//! │  │ nonce (12) │ ciphertext (len(plaintext))  │ tag (16)     │          │
//! │  └────────────┴──────────────────────────────┴──────────────┘          │
//! │                                                                         │
//! │  JSON form:                                                            │
//! │  { "nonce": "<base64>", "ciphertext": "<base64 ct||tag>" }             │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Properties
//!
//! | Property | Provided by |
//! |----------|-------------|
//! | Confidentiality | AES-256 in counter mode |
//! | Integrity | 128-bit GCM tag; any flipped bit is rejected |
//! | No partial output | Plaintext is only returned after the tag verifies |
//!
//! Random 96-bit nonces are safe for up to 2^32 messages per session key.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce as AesNonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::session_key::SessionKey;
use crate::error::{Error, Result};

/// Size of the AES-GCM nonce in bytes (96 bits)
pub const NONCE_SIZE: usize = 12;

/// Size of the AES-GCM authentication tag in bytes (128 bits)
pub const TAG_SIZE: usize = 16;

/// A nonce (number used once) for AES-GCM encryption
///
/// **Never reuse a nonce with the same key.** Reuse lets an attacker forge
/// messages and recover plaintext XORs. [`encrypt`] always draws a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Generate a cryptographically random nonce
    pub fn random() -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Create from existing bytes
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// An encrypted message, self-contained given the session key
///
/// Fields are kept as raw byte vectors so that an envelope received from the
/// transport can be represented even when malformed; [`decrypt`] validates
/// the lengths.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CiphertextEnvelope {
    /// AES-GCM nonce (12 bytes when well-formed)
    #[serde(with = "base64_bytes")]
    pub nonce: Vec<u8>,
    /// Ciphertext followed by the 16-byte authentication tag
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,
}

impl CiphertextEnvelope {
    /// Build an envelope from a nonce and tagged ciphertext
    pub fn new(nonce: Nonce, ciphertext: Vec<u8>) -> Self {
        Self {
            nonce: nonce.as_bytes().to_vec(),
            ciphertext,
        }
    }

    /// Concatenate into `nonce || ciphertext || tag`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.nonce.len() + self.ciphertext.len());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);
        bytes
    }

    /// Split `nonce || ciphertext || tag`
    ///
    /// Inputs too short to hold a nonce and a tag are rejected here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < NONCE_SIZE + TAG_SIZE {
            return Err(Error::Decryption(format!(
                "envelope is {} bytes, shorter than nonce and tag ({})",
                bytes.len(),
                NONCE_SIZE + TAG_SIZE
            )));
        }
        let (nonce, ciphertext) = bytes.split_at(NONCE_SIZE);
        Ok(Self {
            nonce: nonce.to_vec(),
            ciphertext: ciphertext.to_vec(),
        })
    }

    /// Encode the wire form as base64 text
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.to_bytes())
    }

    /// Decode base64 wire text (surrounding whitespace is ignored)
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text.trim())
            .map_err(|e| Error::Decryption(format!("envelope is not valid base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Encode as JSON with base64 fields
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the JSON form
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::Decryption(format!("envelope is not valid JSON: {}", e)))
    }
}

/// Encrypt a message under a session key
///
/// A fresh random nonce is drawn for every call, so encrypting the same
/// plaintext twice yields different envelopes.
///
/// ## Example
///
/// ```ignore
/// let key = generate_session_key();
/// let envelope = encrypt(b"Hello, Bob!", &key)?;
/// ```
pub fn encrypt(plaintext: &[u8], session_key: &SessionKey) -> Result<CiphertextEnvelope> {
    let nonce = Nonce::random();
    let cipher = Aes256Gcm::new_from_slice(session_key.as_bytes())
        .map_err(|e| Error::Encryption(format!("Invalid key: {}", e)))?;

    let ciphertext = cipher
        .encrypt(AesNonce::from_slice(nonce.as_bytes()), plaintext)
        .map_err(|e| Error::Encryption(format!("AES-GCM failed: {}", e)))?;

    Ok(CiphertextEnvelope::new(nonce, ciphertext))
}

/// Decrypt an envelope under a session key
///
/// ## Errors
///
/// Returns `Decryption` if:
/// - The nonce is not 12 bytes
/// - The ciphertext is shorter than the authentication tag
/// - The ciphertext, nonce or tag was tampered with
/// - The key is wrong
///
/// Nothing is returned unless the tag verifies.
pub fn decrypt(envelope: &CiphertextEnvelope, session_key: &SessionKey) -> Result<Vec<u8>> {
    let nonce: [u8; NONCE_SIZE] = envelope.nonce.as_slice().try_into().map_err(|_| {
        Error::Decryption(format!(
            "nonce must be {} bytes, got {}",
            NONCE_SIZE,
            envelope.nonce.len()
        ))
    })?;
    if envelope.ciphertext.len() < TAG_SIZE {
        return Err(Error::Decryption(format!(
            "ciphertext is {} bytes, shorter than the {}-byte tag",
            envelope.ciphertext.len(),
            TAG_SIZE
        )));
    }

    let cipher = Aes256Gcm::new_from_slice(session_key.as_bytes())
        .map_err(|e| Error::Decryption(format!("Invalid key: {}", e)))?;

    cipher
        .decrypt(AesNonce::from_slice(&nonce), envelope.ciphertext.as_slice())
        .map_err(|_| Error::Decryption("authentication tag mismatch".into()))
}

/// Encrypt a UTF-8 string
pub fn encrypt_text(plaintext: &str, session_key: &SessionKey) -> Result<CiphertextEnvelope> {
    encrypt(plaintext.as_bytes(), session_key)
}

/// Decrypt an envelope that is expected to carry UTF-8 text
pub fn decrypt_text(envelope: &CiphertextEnvelope, session_key: &SessionKey) -> Result<String> {
    let bytes = decrypt(envelope, session_key)?;
    String::from_utf8(bytes)
        .map_err(|_| Error::Decryption("decrypted message is not valid UTF-8".into()))
}

/// Serde helper for byte vectors as base64 strings
mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TESTS
// ============================================================================
