//! Client key exchange state machine.
//!
//! A session starts Unidentified. The first Discovery carrying the
//! self-identification marker tells the client which identity the relay
//! gave it; the client then broadcasts its public key. Every KeyExchange
//! from another client moves that peer to Keyed by storing the derived
//! secret, and Direct envelopes are decrypted with the sender's secret.

use std::sync::Arc;

use hush_crypto::{CipherCodec, CipherError, KeyError, KeyPair};
use hush_proto::{Envelope, EnvelopeKind};
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, info};

use crate::peers::PeerKeyStore;

#[derive(Debug, Error)]
pub enum KexError {
    #[error("local identity not yet assigned by the relay")]
    NotIdentified,
    #[error("no shared key for peer {0}")]
    UnknownPeer(String),
    #[error("bad public key from {peer}: {source}")]
    BadPublicKey {
        peer: String,
        #[source]
        source: KeyError,
    },
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),
}

/// Result of feeding one envelope through the machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to do
    Ignored,
    /// Local identity learned; `reply` announces our key
    Identified { identity: String, reply: Envelope },
    /// Another client joined; `reply` re-announces our key once identified
    PeerAnnounced {
        peer: String,
        reply: Option<Envelope>,
    },
    /// Shared secret stored for `peer`
    PeerKeyed { peer: String, rekeyed: bool },
    /// Decrypted direct message
    Message { from: String, plaintext: String },
}

/// Per-session key exchange state
#[derive(Debug)]
pub struct KeyExchangeMachine {
    keypair: KeyPair,
    identity: RwLock<Option<String>>,
    peers: Arc<PeerKeyStore>,
    codec: CipherCodec,
}

impl KeyExchangeMachine {
    /// New machine with a freshly generated key pair
    pub fn new(codec: CipherCodec) -> Self {
        Self::with_keypair(KeyPair::generate(), codec)
    }

    pub fn with_keypair(keypair: KeyPair, codec: CipherCodec) -> Self {
        Self {
            keypair,
            identity: RwLock::new(None),
            peers: Arc::new(PeerKeyStore::new()),
            codec,
        }
    }

    /// Identity assigned by the relay, once known
    pub fn identity(&self) -> Option<String> {
        self.identity.read().clone()
    }

    pub fn is_identified(&self) -> bool {
        self.identity.read().is_some()
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keypair.public_bytes()
    }

    pub fn peers(&self) -> Arc<PeerKeyStore> {
        self.peers.clone()
    }

    /// KeyExchange broadcast of our public key, once identified
    pub fn announcement(&self) -> Option<Envelope> {
        self.identity()
            .map(|identity| Envelope::key_exchange(&identity, &self.keypair.public_bytes()))
    }

    /// Advance the machine with one inbound envelope.
    pub fn handle(&self, envelope: &Envelope) -> Result<Outcome, KexError> {
        match envelope.kind {
            EnvelopeKind::Discovery => Ok(self.on_discovery(envelope)),
            EnvelopeKind::KeyExchange => self.on_key_exchange(envelope),
            EnvelopeKind::Direct => self.on_direct(envelope),
        }
    }

    fn on_discovery(&self, envelope: &Envelope) -> Outcome {
        if envelope.is_self_identification() {
            let mut identity = self.identity.write();
            if identity.is_some() {
                debug!(sender = %envelope.sender, "Already identified, ignoring marker");
                return Outcome::Ignored;
            }
            *identity = Some(envelope.sender.clone());
            drop(identity);

            info!(identity = %envelope.sender, "Identity assigned by relay");
            let reply = Envelope::key_exchange(&envelope.sender, &self.keypair.public_bytes());
            return Outcome::Identified {
                identity: envelope.sender.clone(),
                reply,
            };
        }

        if self.is_own(&envelope.sender) {
            return Outcome::Ignored;
        }
        debug!(peer = %envelope.sender, "Peer announced");
        Outcome::PeerAnnounced {
            peer: envelope.sender.clone(),
            reply: self.announcement(),
        }
    }

    fn on_key_exchange(&self, envelope: &Envelope) -> Result<Outcome, KexError> {
        // Our own broadcast comes back to us through the relay
        if envelope.sender.is_empty()
            || self.is_own(&envelope.sender)
            || envelope.key == self.keypair.public_bytes()
        {
            return Ok(Outcome::Ignored);
        }

        let secret = self
            .keypair
            .agree(&envelope.key)
            .map_err(|source| KexError::BadPublicKey {
                peer: envelope.sender.clone(),
                source,
            })?;
        let rekeyed = self.peers.insert(&envelope.sender, secret);
        debug!(peer = %envelope.sender, rekeyed, "Peer keyed");

        Ok(Outcome::PeerKeyed {
            peer: envelope.sender.clone(),
            rekeyed,
        })
    }

    fn on_direct(&self, envelope: &Envelope) -> Result<Outcome, KexError> {
        let secret = self
            .peers
            .get(&envelope.sender)
            .ok_or_else(|| KexError::UnknownPeer(envelope.sender.clone()))?;
        let plaintext = self.codec.decrypt(secret.as_bytes(), &envelope.body)?;

        Ok(Outcome::Message {
            from: envelope.sender.clone(),
            plaintext: String::from_utf8_lossy(&plaintext).into_owned(),
        })
    }

    /// Encrypt `plaintext` for `peer` and address it.
    pub fn seal_direct(&self, peer: &str, plaintext: &str) -> Result<Envelope, KexError> {
        let identity = self.identity().ok_or(KexError::NotIdentified)?;
        let secret = self
            .peers
            .get(peer)
            .ok_or_else(|| KexError::UnknownPeer(peer.to_string()))?;
        let body = self.codec.encrypt(plaintext.as_bytes(), secret.as_bytes())?;
        Ok(Envelope::direct(&identity, peer, body))
    }

    fn is_own(&self, sender: &str) -> bool {
        self.identity.read().as_deref() == Some(sender)
    }
}
