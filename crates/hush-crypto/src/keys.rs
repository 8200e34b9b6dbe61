//! X25519 key pair and shared secret derivation.
//!
//! Each client generates one key pair when it starts and keeps it for the
//! lifetime of the process. The raw 32-byte Diffie-Hellman output is used
//! directly as the message cipher key.

use rand_core::OsRng;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an encoded X25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Error type for key agreement.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("invalid public key length: expected {PUBLIC_KEY_LEN}, got {0}")]
    InvalidPublicKeyLength(usize),
    #[error("key agreement failed: peer public key is a low-order point")]
    NonContributory,
}

/// Symmetric key material shared with one peer.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret(Vec<u8>);

impl SharedSecret {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SharedSecret([REDACTED; {}])", self.0.len())
    }
}

/// Process-lifetime key agreement key pair.
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair from the OS RNG.
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    /// Rebuild a key pair from raw private key bytes.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self::from_secret(StaticSecret::from(bytes))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Encoded public key, as broadcast in KeyExchange envelopes.
    pub fn public_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        *self.public.as_bytes()
    }

    /// Derive the secret shared with the holder of `peer_public`.
    pub fn agree(&self, peer_public: &[u8]) -> Result<SharedSecret, KeyError> {
        let bytes: [u8; PUBLIC_KEY_LEN] = peer_public
            .try_into()
            .map_err(|_| KeyError::InvalidPublicKeyLength(peer_public.len()))?;
        let shared = self.secret.diffie_hellman(&PublicKey::from(bytes));
        if !shared.was_contributory() {
            return Err(KeyError::NonContributory);
        }
        Ok(SharedSecret(shared.as_bytes().to_vec()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &self.public.as_bytes())
            .finish_non_exhaustive()
    }
}
