//! Composite addressing for stored key material.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::KeyRole;

/// What kind of key a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// A per-conversation session key, addressed by conversation id
    Session,
    /// A user's RSA identity keypair, addressed by user id
    Identity,
}

impl KeyKind {
    /// Lowercase name used in record addresses
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyKind::Session => "session",
            KeyKind::Identity => "identity",
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Address of one record in a [`RecordStore`](super::RecordStore)
///
/// | kind | role | id | value |
/// |------|------|----|-------|
/// | Session | PRIVATE | conversation | plaintext session key (base64) |
/// | Session | PUBLIC | conversation | wrapped session key (base64) |
/// | Identity | PRIVATE | user | private key PEM |
/// | Identity | PUBLIC | user | public key PEM |
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordKey {
    /// Conversation id or user id
    pub id: String,
    /// Which half of the material the record holds
    pub role: KeyRole,
    /// Session or identity material
    pub kind: KeyKind,
}

impl RecordKey {
    /// Create a record key
    pub fn new(id: impl Into<String>, role: KeyRole, kind: KeyKind) -> Self {
        Self {
            id: id.into(),
            role,
            kind,
        }
    }

    /// Plaintext session key of a conversation
    pub fn session_plaintext(conversation_id: &str) -> Self {
        Self::new(conversation_id, KeyRole::Private, KeyKind::Session)
    }

    /// Wrapped session key of a conversation
    pub fn session_wrapped(conversation_id: &str) -> Self {
        Self::new(conversation_id, KeyRole::Public, KeyKind::Session)
    }

    /// Private identity key of a user
    pub fn identity_private(user_id: &str) -> Self {
        Self::new(user_id, KeyRole::Private, KeyKind::Identity)
    }

    /// Public identity key of a user
    pub fn identity_public(user_id: &str) -> Self {
        Self::new(user_id, KeyRole::Public, KeyKind::Identity)
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.role, self.id)
    }
}
