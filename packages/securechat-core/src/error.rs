//! # Error Handling
//!
//! This module provides the error types for SecureChat Core.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── KeyGeneration         - Unsafe parameters / RNG failure       │
//! │  │   ├── KeyFormat             - Malformed serialized key              │
//! │  │   ├── Wrap                  - Session key could not be wrapped      │
//! │  │   ├── Unwrap                - Wrong private key / bad blob          │
//! │  │   ├── Encryption            - Message encryption failed             │
//! │  │   └── Decryption            - Tampered or malformed envelope        │
//! │  │                                                                      │
//! │  ├── Key Store Errors                                                  │
//! │  │   ├── NoSessionKey          - Key exchange not completed yet        │
//! │  │   ├── NoIdentityKey         - No keypair generated for this user    │
//! │  │   └── OverwriteRefused      - Replacement needs explicit `force`    │
//! │  │                                                                      │
//! │  ├── Storage Errors                                                    │
//! │  │   ├── StorageRead           - Failed to read a record               │
//! │  │   ├── StorageWrite          - Failed to write a record              │
//! │  │   └── StorageCorrupted      - Stored record does not parse          │
//! │  │                                                                      │
//! │  └── Internal Errors                                                   │
//! │      ├── InvalidConfig         - Rejected configuration value          │
//! │      └── Serialization         - JSON encode/decode failure            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant is recoverable at the call site: the in-progress action is
//! aborted and [`Error::stage`] tells the caller which step failed. Messages
//! carry ids, lengths and library descriptions, never key bytes.

use thiserror::Error;

/// Result type alias for SecureChat Core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for SecureChat Core
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// Keypair generation rejected or failed
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// Serialized key could not be parsed
    #[error("Invalid key format: {0}")]
    KeyFormat(String),

    /// Session key could not be wrapped for the recipient
    #[error("Failed to wrap session key: {0}")]
    Wrap(String),

    /// Wrapped session key could not be recovered
    #[error("Failed to unwrap session key: {0}")]
    Unwrap(String),

    /// Message encryption failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Message authentication or envelope parsing failed
    #[error("Decryption failed: {0}")]
    Decryption(String),

    // ========================================================================
    // Key Store Errors (400-499)
    // ========================================================================

    /// No session key has been established for the conversation
    #[error("No session key for conversation {0}. Exchange keys first.")]
    NoSessionKey(String),

    /// No identity keypair is stored for the user
    #[error("No identity keypair for user {0}. Generate one first.")]
    NoIdentityKey(String),

    /// Existing key material would be replaced without confirmation
    #[error("Refusing to overwrite existing {0} without force")]
    OverwriteRefused(String),

    // ========================================================================
    // Storage Errors (500-599)
    // ========================================================================

    /// Failed to read from the record store
    #[error("Failed to read from storage: {0}")]
    StorageRead(String),

    /// Failed to write to the record store
    #[error("Failed to write to storage: {0}")]
    StorageWrite(String),

    /// A stored record exists but cannot be decoded
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),

    // ========================================================================
    // Internal Errors (900-999)
    // ========================================================================

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 300-399: Crypto
    /// - 400-499: Key store
    /// - 500-599: Storage
    /// - 900-999: Internal
    pub fn code(&self) -> i32 {
        match self {
            // Crypto (300-399)
            Error::KeyGeneration(_) => 300,
            Error::KeyFormat(_) => 301,
            Error::Wrap(_) => 302,
            Error::Unwrap(_) => 303,
            Error::Decryption(_) => 304,
            Error::Encryption(_) => 305,

            // Key store (400-499)
            Error::NoSessionKey(_) => 400,
            Error::NoIdentityKey(_) => 401,
            Error::OverwriteRefused(_) => 402,

            // Storage (500-599)
            Error::StorageRead(_) => 500,
            Error::StorageWrite(_) => 501,
            Error::StorageCorrupted(_) => 502,

            // Internal (900-999)
            Error::Serialization(_) => 900,
            Error::InvalidConfig(_) => 901,
        }
    }

    /// Name of the stage that failed, suitable for showing to a user
    pub fn stage(&self) -> &'static str {
        match self {
            Error::KeyGeneration(_) => "key generation",
            Error::KeyFormat(_) => "key import",
            Error::Wrap(_) => "wrap",
            Error::Unwrap(_) => "unwrap",
            Error::Encryption(_) => "encrypt",
            Error::Decryption(_) => "decrypt",
            Error::NoSessionKey(_) => "session lookup",
            Error::NoIdentityKey(_) => "identity lookup",
            Error::OverwriteRefused(_) => "overwrite check",
            Error::StorageRead(_) | Error::StorageWrite(_) | Error::StorageCorrupted(_) => {
                "storage"
            }
            Error::InvalidConfig(_) => "configuration",
            Error::Serialization(_) => "serialization",
        }
    }

    /// Check if this error is resolved by the user completing a step first
    /// (generating a keypair, exchanging keys, or confirming an overwrite)
    /// rather than by fixing bad input.
    pub fn requires_user_action(&self) -> bool {
        matches!(
            self,
            Error::NoSessionKey(_) | Error::NoIdentityKey(_) | Error::OverwriteRefused(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::KeyGeneration("test".into()).code(), 300);
        assert_eq!(Error::Unwrap("test".into()).code(), 303);
        assert_eq!(Error::NoSessionKey("123".into()).code(), 400);
        assert_eq!(Error::StorageRead("test".into()).code(), 500);
        assert_eq!(Error::Serialization("test".into()).code(), 900);
    }

    #[test]
    fn test_stages() {
        assert_eq!(Error::KeyFormat("x".into()).stage(), "key import");
        assert_eq!(Error::Wrap("x".into()).stage(), "wrap");
        assert_eq!(Error::Unwrap("x".into()).stage(), "unwrap");
        assert_eq!(Error::Decryption("x".into()).stage(), "decrypt");
    }

    #[test]
    fn test_no_session_distinct_from_decryption() {
        let missing = Error::NoSessionKey("123".into());
        let failed = Error::Decryption("tag mismatch".into());

        assert_ne!(missing.code(), failed.code());
        assert!(missing.requires_user_action());
        assert!(!failed.requires_user_action());
    }

    #[test]
    fn test_json_conversion() {
        let json = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: Error = json.into();
        assert!(matches!(err, Error::Serialization(_)));
        assert_eq!(err.code(), 900);
    }
}
