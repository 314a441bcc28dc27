//! Key store configuration.

use serde::{Deserialize, Serialize};

use crate::crypto::{validate_modulus_bits, DEFAULT_MODULUS_BITS};
use crate::error::{Error, Result};

/// Configuration for a [`KeyStore`](crate::keystore::KeyStore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyStoreConfig {
    /// RSA modulus size for newly created identity keypairs
    pub modulus_bits: usize,
}

impl Default for KeyStoreConfig {
    fn default() -> Self {
        Self {
            modulus_bits: DEFAULT_MODULUS_BITS,
        }
    }
}

impl KeyStoreConfig {
    /// Use a specific modulus size
    pub fn with_modulus_bits(mut self, modulus_bits: usize) -> Self {
        self.modulus_bits = modulus_bits;
        self
    }

    /// Reject values that key generation would refuse later
    pub fn validate(&self) -> Result<()> {
        validate_modulus_bits(self.modulus_bits)
            .map_err(|e| Error::InvalidConfig(format!("modulus_bits: {}", e)))
    }
}
