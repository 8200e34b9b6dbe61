//! Shared secrets keyed by peer identity.

use std::collections::HashMap;

use hush_crypto::SharedSecret;
use parking_lot::RwLock;

/// Peer identity to shared secret map.
///
/// Written by the inbound task, read by the console. Entries are replaced
/// when a peer re-announces its key and are never removed.
#[derive(Debug, Default)]
pub struct PeerKeyStore {
    secrets: RwLock<HashMap<String, SharedSecret>>,
}

impl PeerKeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the secret for `peer`. Returns `true` if one was replaced.
    pub fn insert(&self, peer: &str, secret: SharedSecret) -> bool {
        self.secrets.write().insert(peer.to_string(), secret).is_some()
    }

    pub fn get(&self, peer: &str) -> Option<SharedSecret> {
        self.secrets.read().get(peer).cloned()
    }

    /// Keyed peer identities, sorted
    pub fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.secrets.read().keys().cloned().collect();
        peers.sort();
        peers
    }

    pub fn len(&self) -> usize {
        self.secrets.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.read().is_empty()
    }
}
