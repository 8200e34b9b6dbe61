//! hush-proto: wire format shared by the hush relay and clients.

#![forbid(unsafe_code)]

pub mod envelope;
pub mod framing;

#[cfg(test)]
mod proptests;

pub use envelope::{Envelope, EnvelopeError, EnvelopeKind, SELF_MARKER};
pub use framing::{join_frames, split_frames, FRAME_DELIMITER};
