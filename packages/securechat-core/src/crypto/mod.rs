//! # Cryptography Module
//!
//! The three building blocks of the hybrid scheme. None of them touch
//! storage; persistence belongs to [`crate::keystore`].
//!
//! ## Hybrid Scheme
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         HYBRID ENCRYPTION                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  keys (Asymmetric Key Manager)                                  │   │
//! │  │  ─────────────────────────────                                  │   │
//! │  │  RSA keypair, 2048-4096 bits                                    │   │
//! │  │  PEM export/import: SPKI (public), PKCS#8 (private)             │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 │ recipient public key                 │
//! │                                 ▼                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  session_key (Symmetric Key Wrapper)                            │   │
//! │  │  ───────────────────────────────────                            │   │
//! │  │  32-byte session key per conversation                           │   │
//! │  │  RSA-OAEP(SHA-256) wrap / unwrap                                │   │
//! │  └──────────────────────────────┬──────────────────────────────────┘   │
//! │                                 │ plaintext session key                │
//! │                                 ▼                                       │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  encryption (Message Cipher)                                    │   │
//! │  │  ───────────────────────────                                    │   │
//! │  │  AES-256-GCM, random 96-bit nonce, 128-bit tag                  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Algorithm Choices
//!
//! | Algorithm | Purpose |
//! |-----------|---------|
//! | RSA-OAEP (SHA-256) | Session key transport |
//! | AES-256-GCM | Message encryption (AEAD) |
//! | SHA-256 | Public key fingerprints |
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: Session keys and decoded private key buffers are
//!    zeroized when dropped
//! 2. **Secure Random**: `rand::rngs::OsRng` for keys, nonces and OAEP seeds
//! 3. **No Key Reuse**: Unique nonces for every encryption operation
//! 4. **Timing**: the `rsa` crate's private-key operations are not fully
//!    constant time (RUSTSEC-2023-0071); unwrapping only happens locally on
//!    blobs the user chose to accept

mod encryption;
mod keys;
mod pem;
mod session_key;

pub use encryption::{
    decrypt, decrypt_text, encrypt, encrypt_text, CiphertextEnvelope, Nonce, NONCE_SIZE, TAG_SIZE,
};
pub use keys::{
    export_key, generate_keypair, import_key, validate_modulus_bits, AsymmetricKey, KeyPair,
    KeyRole, PrivateKey, PublicKey, SerializedKey, DEFAULT_MODULUS_BITS, MAX_MODULUS_BITS,
    MIN_MODULUS_BITS,
};
pub use session_key::{
    export_session_key, generate_session_key, import_session_key, unwrap, wrap, SessionKey,
    WrappedSessionKey, SESSION_KEY_SIZE,
};

/// Hex SHA-256 fingerprint of a public key's SPKI encoding
pub fn fingerprint(public_key: &PublicKey) -> crate::error::Result<String> {
    public_key.fingerprint()
}
