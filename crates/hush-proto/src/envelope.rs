//! Envelope wire format.
//!
//! Every frame exchanged over the relay is one JSON-encoded [`Envelope`].
//! The relay only looks at `kind` and `target`; `body` is opaque to it.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Prefix the relay puts in a Discovery body to tell a client its own identity.
pub const SELF_MARKER: &str = "(me) ";

/// Envelope decode/encode errors
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("malformed envelope: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Envelope kind.
///
/// On the wire this is an integer code. Any code other than Discovery or
/// KeyExchange is read as [`EnvelopeKind::Direct`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    /// Encrypted message addressed to one recipient
    #[default]
    Direct,
    /// Announcement of a newly connected identity
    Discovery,
    /// Public key broadcast
    KeyExchange,
}

impl EnvelopeKind {
    pub const DIRECT_CODE: i64 = 100;
    pub const DISCOVERY_CODE: i64 = 101;
    pub const KEY_EXCHANGE_CODE: i64 = 102;

    pub fn code(self) -> i64 {
        match self {
            EnvelopeKind::Direct => Self::DIRECT_CODE,
            EnvelopeKind::Discovery => Self::DISCOVERY_CODE,
            EnvelopeKind::KeyExchange => Self::KEY_EXCHANGE_CODE,
        }
    }

    pub fn from_code(code: i64) -> Self {
        match code {
            Self::DISCOVERY_CODE => EnvelopeKind::Discovery,
            Self::KEY_EXCHANGE_CODE => EnvelopeKind::KeyExchange,
            _ => EnvelopeKind::Direct,
        }
    }
}

impl Serialize for EnvelopeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.code())
    }
}

impl<'de> Deserialize<'de> for EnvelopeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Ok(Self::from_code(code))
    }
}

/// A single relay frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Envelope {
    pub kind: EnvelopeKind,
    /// Raw public key bytes, base64 on the wire. Only meaningful for KeyExchange.
    #[serde(with = "base64_bytes")]
    pub key: Vec<u8>,
    pub sender: String,
    /// Recipient identity; empty means every connected client.
    pub target: String,
    pub body: String,
}

impl Envelope {
    /// Discovery envelope announcing `new_id` to `target`.
    ///
    /// When the two are equal the body carries [`SELF_MARKER`] so the new
    /// client can learn which identity it was given.
    pub fn discovery(new_id: &str, target: &str) -> Self {
        let body = if new_id == target {
            format!("{SELF_MARKER}{new_id}")
        } else {
            new_id.to_string()
        };
        Self {
            kind: EnvelopeKind::Discovery,
            key: Vec::new(),
            sender: new_id.to_string(),
            target: target.to_string(),
            body,
        }
    }

    /// Public key broadcast from `sender`.
    pub fn key_exchange(sender: &str, public_key: &[u8]) -> Self {
        Self {
            kind: EnvelopeKind::KeyExchange,
            key: public_key.to_vec(),
            sender: sender.to_string(),
            target: String::new(),
            body: String::new(),
        }
    }

    /// Encrypted message from `sender` to `target`.
    pub fn direct(sender: &str, target: &str, ciphertext: String) -> Self {
        Self {
            kind: EnvelopeKind::Direct,
            key: Vec::new(),
            sender: sender.to_string(),
            target: target.to_string(),
            body: ciphertext,
        }
    }

    /// True if routing must deliver this envelope to every live connection,
    /// whatever `target` says.
    pub fn is_broadcast(&self) -> bool {
        self.target.is_empty() || self.kind == EnvelopeKind::KeyExchange
    }

    /// True for a Discovery envelope telling the receiver its own identity.
    pub fn is_self_identification(&self) -> bool {
        self.kind == EnvelopeKind::Discovery && self.body.starts_with(SELF_MARKER)
    }

    pub fn decode(frame: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(frame)?)
    }

    pub fn encode(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }
}

mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    // A null key decodes as empty
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        match Option::<String>::deserialize(deserializer)? {
            Some(text) => STANDARD.decode(text.as_bytes()).map_err(de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}
