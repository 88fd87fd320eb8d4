//! Sealed key records.
//!
//! ```text
//! version u32 | params_len u32 | params (ParamSet wire form) | nonce [12] | ciphertext
//! ```
//!
//! The raw key is sealed with ChaCha20-Poly1305 under the device blob key.
//! The version and the serialized parameter set are the AAD, so a record
//! whose policy was edited fails to open.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use keystore_core::{Error, ParamSet, Result};
use tracing::warn;
use zeroize::Zeroizing;

pub const KEY_BLOB_VERSION: u32 = 1;
const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 8;

/// An opened key record.
pub struct KeyRecord {
    pub params: ParamSet,
    pub key: Zeroizing<Vec<u8>>,
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("params", &self.params)
            .field("key_len", &self.key.len())
            .finish()
    }
}

fn aad(params: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(4 + params.len());
    aad.extend_from_slice(&KEY_BLOB_VERSION.to_le_bytes());
    aad.extend_from_slice(params);
    aad
}

pub fn seal(params: &ParamSet, key: &[u8], blob_key: &[u8; 32]) -> Result<Vec<u8>> {
    let encoded = params.to_bytes();
    let mut nonce = [0u8; NONCE_LEN];
    keystore_crypto::hal::fill_random(&mut nonce)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(blob_key));
    let aad = aad(&encoded);
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), Payload { msg: key, aad: &aad })
        .map_err(|_| Error::CryptoEngine)?;

    let mut out = Vec::with_capacity(HEADER_LEN + encoded.len() + NONCE_LEN + sealed.len());
    out.extend_from_slice(&KEY_BLOB_VERSION.to_le_bytes());
    out.extend_from_slice(&(encoded.len() as u32).to_le_bytes());
    out.extend_from_slice(&encoded);
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&sealed);
    Ok(out)
}

pub fn open(blob: &[u8], blob_key: &[u8; 32]) -> Result<KeyRecord> {
    if blob.len() < HEADER_LEN {
        return Err(Error::InvalidKeyFile);
    }
    let version = u32::from_le_bytes([blob[0], blob[1], blob[2], blob[3]]);
    if version != KEY_BLOB_VERSION {
        warn!(version, "unknown key blob version");
        return Err(Error::InvalidKeyFile);
    }
    let params_len = u32::from_le_bytes([blob[4], blob[5], blob[6], blob[7]]) as usize;
    let rest = &blob[HEADER_LEN..];
    if rest.len() < params_len + NONCE_LEN {
        return Err(Error::InvalidKeyFile);
    }
    let (encoded, rest) = rest.split_at(params_len);
    let (nonce, sealed) = rest.split_at(NONCE_LEN);

    let params = ParamSet::from_bytes(encoded).map_err(|_| Error::InvalidKeyFile)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(blob_key));
    let aad = aad(encoded);
    let key = cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: sealed, aad: &aad })
        .map_err(|_| {
            warn!("key blob failed authentication");
            Error::InvalidKeyFile
        })?;
    Ok(KeyRecord {
        params,
        key: Zeroizing::new(key),
    })
}
