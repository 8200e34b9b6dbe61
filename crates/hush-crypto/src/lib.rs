//! hush-crypto: pairwise key agreement and message body encryption.

#![forbid(unsafe_code)]

pub mod cipher;
pub mod keys;

#[cfg(test)]
mod proptests;

pub use cipher::{CipherCodec, CipherError, IvMode, BLOCK_SIZE, FIXED_IV};
pub use keys::{KeyError, KeyPair, SharedSecret, PUBLIC_KEY_LEN};
