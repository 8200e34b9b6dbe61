//! Message body cipher.
//!
//! AES in CBC mode keyed directly by the peer shared secret. The AES variant
//! follows the key length (16, 24 or 32 bytes). Ciphertext travels as
//! standard base64 in the envelope body.
//!
//! Two IV policies exist and they are not wire compatible with each other:
//!
//! - [`IvMode::Fixed`]: every message uses [`FIXED_IV`]. This is what existing
//!   clients speak. Identical plaintext prefixes under one key produce
//!   identical ciphertext prefixes.
//! - [`IvMode::Random`]: a fresh IV per message, sent as the first block of
//!   the decoded body.
//!
//! Padding appends `N` bytes of value `N` up to the next block boundary, and
//! nothing at all when the plaintext is already aligned. Unpadding therefore
//! cannot always tell padding from data; see [`unpad`].

use aes::{Aes128, Aes192, Aes256};
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

/// Cipher block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// IV shared by every session in [`IvMode::Fixed`].
pub const FIXED_IV: [u8; BLOCK_SIZE] = *b"my16digitIvKey12";

/// Error type for message encryption.
#[derive(Debug, thiserror::Error)]
pub enum CipherError {
    #[error("invalid key length {0}: expected 16, 24 or 32 bytes")]
    InvalidKeyLength(usize),
    #[error("ciphertext is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("ciphertext length {0} is not a multiple of the block size")]
    Unaligned(usize),
    #[error("ciphertext too short to carry an IV")]
    MissingIv,
    #[error("RNG failed")]
    Rng,
}

/// How the CBC initialization vector is chosen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IvMode {
    /// Static IV for every message (compatible with existing clients)
    #[default]
    Fixed,
    /// Random IV per message, prepended to the ciphertext
    Random,
}

impl std::str::FromStr for IvMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fixed" => Ok(IvMode::Fixed),
            "random" => Ok(IvMode::Random),
            other => Err(format!("unknown IV mode: {other} (expected fixed or random)")),
        }
    }
}

impl std::fmt::Display for IvMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IvMode::Fixed => write!(f, "fixed"),
            IvMode::Random => write!(f, "random"),
        }
    }
}

fn check_key_len(key: &[u8]) -> Result<(), CipherError> {
    match key.len() {
        16 | 24 | 32 => Ok(()),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}

/// CBC-encrypt block-aligned `data`; the AES variant follows the key length.
fn cbc_encrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>, CipherError> {
    let invalid = |_| CipherError::InvalidKeyLength(key.len());
    let out = match key.len() {
        16 => cbc::Encryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        24 => cbc::Encryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        32 => cbc::Encryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .encrypt_padded_vec_mut::<NoPadding>(data),
        n => return Err(CipherError::InvalidKeyLength(n)),
    };
    Ok(out)
}

/// CBC-decrypt block-aligned `data`. Padding is left for [`unpad`].
fn cbc_decrypt(key: &[u8], iv: &[u8; BLOCK_SIZE], data: &[u8]) -> Result<Vec<u8>, CipherError> {
    let invalid = |_| CipherError::InvalidKeyLength(key.len());
    let unaligned = |_| CipherError::Unaligned(data.len());
    match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
        24 => cbc::Decryptor::<Aes192>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(invalid)?
            .decrypt_padded_vec_mut::<NoPadding>(data)
            .map_err(unaligned),
        n => Err(CipherError::InvalidKeyLength(n)),
    }
}

/// Pad to a block boundary with `N` bytes of value `N`.
///
/// Already-aligned input (including empty input) is returned unchanged.
pub fn pad(plaintext: &[u8]) -> Vec<u8> {
    let mut out = plaintext.to_vec();
    let rem = plaintext.len() % BLOCK_SIZE;
    if rem != 0 {
        let n = BLOCK_SIZE - rem;
        out.resize(plaintext.len() + n, n as u8);
    }
    out
}

/// Strip padding added by [`pad`].
///
/// The trailing byte is read as the pad count `N`. It is stripped only when
/// `1 <= N <= BLOCK_SIZE` and the last `N` bytes all equal `N`; otherwise the
/// input is taken to be an aligned, unpadded message and returned whole.
///
/// Unlike truncate-always unpadding, a trailing byte above `BLOCK_SIZE` or a
/// non-uniform run leaves the data untouched instead of cutting it short.
///
/// An aligned plaintext that itself ends in such a run (for example a
/// trailing `0x01`) is still truncated. Padding never marks its own absence,
/// so that case cannot be told apart from a padded message.
pub fn unpad(mut data: Vec<u8>) -> Vec<u8> {
    let Some(&last) = data.last() else {
        return data;
    };
    let n = last as usize;
    if n == 0 || n > BLOCK_SIZE || n > data.len() {
        return data;
    }
    if data[data.len() - n..].iter().all(|&b| b == last) {
        data.truncate(data.len() - n);
    }
    data
}

/// Stateless body encryptor/decryptor.
#[derive(Debug, Clone, Copy, Default)]
pub struct CipherCodec {
    iv_mode: IvMode,
}

impl CipherCodec {
    pub fn new(iv_mode: IvMode) -> Self {
        Self { iv_mode }
    }

    pub fn iv_mode(&self) -> IvMode {
        self.iv_mode
    }

    /// Encrypt `plaintext` under `key` and return the base64 envelope body.
    pub fn encrypt(&self, plaintext: &[u8], key: &[u8]) -> Result<String, CipherError> {
        check_key_len(key)?;
        let data = pad(plaintext);

        let encoded = match self.iv_mode {
            IvMode::Fixed => STANDARD.encode(cbc_encrypt(key, &FIXED_IV, &data)?),
            IvMode::Random => {
                let mut iv = [0u8; BLOCK_SIZE];
                getrandom::getrandom(&mut iv).map_err(|_| CipherError::Rng)?;
                let mut out = Vec::with_capacity(BLOCK_SIZE + data.len());
                out.extend_from_slice(&iv);
                out.extend_from_slice(&cbc_encrypt(key, &iv, &data)?);
                STANDARD.encode(&out)
            }
        };
        Ok(encoded)
    }

    /// Decrypt a base64 envelope body with `key`.
    pub fn decrypt(&self, key: &[u8], encoded: &str) -> Result<Vec<u8>, CipherError> {
        check_key_len(key)?;
        let raw = STANDARD.decode(encoded.trim())?;

        let (iv, data) = match self.iv_mode {
            IvMode::Fixed => (FIXED_IV, raw),
            IvMode::Random => {
                if raw.len() < BLOCK_SIZE {
                    return Err(CipherError::MissingIv);
                }
                let mut iv = [0u8; BLOCK_SIZE];
                iv.copy_from_slice(&raw[..BLOCK_SIZE]);
                (iv, raw[BLOCK_SIZE..].to_vec())
            }
        };

        if data.len() % BLOCK_SIZE != 0 {
            return Err(CipherError::Unaligned(data.len()));
        }
        Ok(unpad(cbc_decrypt(key, &iv, &data)?))
    }
}
