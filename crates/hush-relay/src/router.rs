//! Delivery rules for inbound frames.
//!
//! Rules are checked in order:
//!
//! 1. a frame that does not decode goes to every live client (fail-open),
//! 2. an empty target goes to every live client,
//! 3. a KeyExchange goes to every live client whatever its target,
//! 4. anything else goes only to the client whose identity equals the target.

use hush_proto::{Envelope, EnvelopeKind};

/// Where a frame should be delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Not a valid envelope; forwarded to everyone unchanged
    Undecodable,
    /// Every live client
    Broadcast { kind: EnvelopeKind, sender: String },
    /// Exactly one client, if it is live
    Direct { kind: EnvelopeKind, sender: String, target: String },
}

impl Route {
    #[cfg(test)]
    pub fn is_broadcast(&self) -> bool {
        !matches!(self, Route::Direct { .. })
    }
}

/// Decide the route of a raw frame
pub fn route(frame: &str) -> Route {
    match Envelope::decode(frame) {
        Ok(envelope) => route_envelope(envelope),
        Err(_) => Route::Undecodable,
    }
}

/// Decide the route of a decoded envelope
pub fn route_envelope(envelope: Envelope) -> Route {
    if envelope.is_broadcast() {
        Route::Broadcast {
            kind: envelope.kind,
            sender: envelope.sender,
        }
    } else {
        Route::Direct {
            kind: envelope.kind,
            sender: envelope.sender,
            target: envelope.target,
        }
    }
}
