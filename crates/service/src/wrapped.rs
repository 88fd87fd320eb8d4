//! Wrapped-key import format and unwrap suites.
//!
//! ```text
//! [u32 len | peer public key]
//! [u32 len | agree aad] [u32 len | agree nonce] [u32 len | agree tag]
//! [u32 len | encrypted kek]
//! [u32 len | kek aad] [u32 len | kek nonce] [u32 len | kek tag]
//! [u32 len = 4 | key material length u32]
//! [u32 len | encrypted key material]
//! ```
//!
//! The agreement between the wrapping key and the peer public key yields an
//! AES-256-GCM key that opens the KEK; the KEK opens the key material.

use keystore_core::{Algorithm, Error, Result, UnwrapSuite};
use keystore_crypto::engine::aes::{gcm_open, gcm_seal, GCM_NONCE_LEN, GCM_TAG_LEN};
use keystore_crypto::{hal, KeySpec};
use tracing::warn;
use zeroize::Zeroizing;

pub const MAX_WRAPPED_DATA: usize = 1024 * 1024;
const FIELD_COUNT: usize = 10;
const KEK_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey {
    pub peer_public_key: Vec<u8>,
    pub agree_aad: Vec<u8>,
    pub agree_nonce: Vec<u8>,
    pub agree_tag: Vec<u8>,
    pub kek_ciphertext: Vec<u8>,
    pub kek_aad: Vec<u8>,
    pub kek_nonce: Vec<u8>,
    pub kek_tag: Vec<u8>,
    pub key_material_len: u32,
    pub key_ciphertext: Vec<u8>,
}

fn read_field<'a>(data: &'a [u8], offset: &mut usize) -> Result<&'a [u8]> {
    let rest = &data[*offset..];
    if rest.len() < 4 {
        return Err(Error::InvalidWrappedFormat);
    }
    let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
    let field = rest
        .get(4..)
        .and_then(|r| r.get(..len))
        .ok_or(Error::InvalidWrappedFormat)?;
    *offset += 4 + len;
    Ok(field)
}

fn write_field(out: &mut Vec<u8>, field: &[u8]) {
    out.extend_from_slice(&(field.len() as u32).to_le_bytes());
    out.extend_from_slice(field);
}

impl WrappedKey {
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() > MAX_WRAPPED_DATA {
            warn!(size = data.len(), "wrapped key data too large");
            return Err(Error::InvalidWrappedFormat);
        }
        let mut offset = 0;
        let mut fields = Vec::with_capacity(FIELD_COUNT);
        for _ in 0..FIELD_COUNT {
            fields.push(read_field(data, &mut offset)?);
        }
        if offset != data.len() {
            return Err(Error::InvalidWrappedFormat);
        }
        let len_field: [u8; 4] = fields[8]
            .try_into()
            .map_err(|_| Error::InvalidWrappedFormat)?;

        Ok(Self {
            peer_public_key: fields[0].to_vec(),
            agree_aad: fields[1].to_vec(),
            agree_nonce: fields[2].to_vec(),
            agree_tag: fields[3].to_vec(),
            kek_ciphertext: fields[4].to_vec(),
            kek_aad: fields[5].to_vec(),
            kek_nonce: fields[6].to_vec(),
            kek_tag: fields[7].to_vec(),
            key_material_len: u32::from_le_bytes(len_field),
            key_ciphertext: fields[9].to_vec(),
        })
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.key_material_len.to_le_bytes();
        let fields: [&[u8]; FIELD_COUNT] = [
            &self.peer_public_key,
            &self.agree_aad,
            &self.agree_nonce,
            &self.agree_tag,
            &self.kek_ciphertext,
            &self.kek_aad,
            &self.kek_nonce,
            &self.kek_tag,
            &len,
            &self.key_ciphertext,
        ];
        let mut out = Vec::new();
        for field in fields {
            write_field(&mut out, field);
        }
        out
    }

    /// Wrap `key_material` for the holder of `wrapping_public_key`.
    ///
    /// This is the sender side: a fresh ephemeral key pair, KEK and nonces
    /// are drawn for every call.
    pub fn wrap(
        suite: UnwrapSuite,
        wrapping_public_key: &[u8],
        key_material: &[u8],
        aad: &[u8],
    ) -> Result<Self> {
        let (key_alg, agree_alg) = suite_algorithms(suite);
        let ephemeral = hal::generate_key(&KeySpec::new(key_alg, 256))?;
        let peer_public_key = hal::get_public_key(key_alg, &ephemeral)?.into_vec();
        let shared = Zeroizing::new(hal::agree_key(agree_alg, &ephemeral, wrapping_public_key)?.into_vec());

        let mut kek = Zeroizing::new([0u8; KEK_LEN]);
        let mut agree_nonce = [0u8; GCM_NONCE_LEN];
        let mut kek_nonce = [0u8; GCM_NONCE_LEN];
        hal::fill_random(&mut *kek)?;
        hal::fill_random(&mut agree_nonce)?;
        hal::fill_random(&mut kek_nonce)?;

        let (kek_ciphertext, agree_tag) = split_tag(gcm_seal(&shared, &agree_nonce, aad, &*kek)?);
        let (key_ciphertext, kek_tag) = split_tag(gcm_seal(&*kek, &kek_nonce, aad, key_material)?);

        Ok(Self {
            peer_public_key,
            agree_aad: aad.to_vec(),
            agree_nonce: agree_nonce.to_vec(),
            agree_tag,
            kek_ciphertext,
            kek_aad: aad.to_vec(),
            kek_nonce: kek_nonce.to_vec(),
            kek_tag,
            key_material_len: key_material.len() as u32,
            key_ciphertext,
        })
    }
}

fn split_tag(mut sealed: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    let tag = sealed.split_off(sealed.len() - GCM_TAG_LEN);
    (sealed, tag)
}

fn joined(ciphertext: &[u8], tag: &[u8]) -> Result<Vec<u8>> {
    if tag.len() != GCM_TAG_LEN {
        return Err(Error::InvalidWrappedFormat);
    }
    let mut out = Vec::with_capacity(ciphertext.len() + tag.len());
    out.extend_from_slice(ciphertext);
    out.extend_from_slice(tag);
    Ok(out)
}

/// (wrapping key algorithm, agreement algorithm) of a suite.
fn suite_algorithms(suite: UnwrapSuite) -> (Algorithm, Algorithm) {
    match suite {
        UnwrapSuite::X25519Aes256Gcm => (Algorithm::X25519, Algorithm::X25519),
        UnwrapSuite::EcdhAes256Gcm => (Algorithm::Ecc, Algorithm::Ecdh),
    }
}

/// Recover the key material of `wrapped` with the private wrapping key.
pub fn unwrap(
    suite: UnwrapSuite,
    wrapping_algorithm: Algorithm,
    wrapping_key: &[u8],
    wrapped: &WrappedKey,
) -> Result<Zeroizing<Vec<u8>>> {
    let (key_alg, agree_alg) = suite_algorithms(suite);
    if wrapping_algorithm != key_alg {
        warn!(?suite, ?wrapping_algorithm, "wrapping key does not match unwrap suite");
        return Err(Error::InvalidAlgorithm);
    }

    let shared = Zeroizing::new(hal::agree_key(agree_alg, wrapping_key, &wrapped.peer_public_key)?.into_vec());
    let kek = Zeroizing::new(gcm_open(
        &shared,
        &wrapped.agree_nonce,
        &wrapped.agree_aad,
        &joined(&wrapped.kek_ciphertext, &wrapped.agree_tag)?,
    )?);
    if kek.len() != KEK_LEN {
        return Err(Error::InvalidWrappedFormat);
    }
    let key = Zeroizing::new(gcm_open(
        &kek,
        &wrapped.kek_nonce,
        &wrapped.kek_aad,
        &joined(&wrapped.key_ciphertext, &wrapped.kek_tag)?,
    )?);
    if key.len() != wrapped.key_material_len as usize {
        warn!(declared = wrapped.key_material_len, actual = key.len(), "wrapped key length mismatch");
        return Err(Error::InvalidWrappedFormat);
    }
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x25519_pair() -> (Vec<u8>, Vec<u8>) {
        let private = hal::generate_key(&KeySpec::new(Algorithm::X25519, 256)).unwrap();
        let public = hal::get_public_key(Algorithm::X25519, &private).unwrap();
        (private.into_vec(), public.into_vec())
    }

    #[test]
    fn test_wrap_unwrap_x25519() {
        let (private, public) = x25519_pair();
        let wrapped = WrappedKey::wrap(UnwrapSuite::X25519Aes256Gcm, &public, &[0x5a; 32], b"aad").unwrap();
        let parsed = WrappedKey::from_bytes(&wrapped.to_bytes()).unwrap();
        assert_eq!(parsed, wrapped);
        let key = unwrap(UnwrapSuite::X25519Aes256Gcm, Algorithm::X25519, &private, &parsed).unwrap();
        assert_eq!(&key[..], &[0x5a; 32]);
    }

    #[test]
    fn test_wrap_unwrap_ecdh() {
        let private = hal::generate_key(&KeySpec::new(Algorithm::Ecc, 256)).unwrap();
        let public = hal::get_public_key(Algorithm::Ecc, &private).unwrap();
        let wrapped = WrappedKey::wrap(UnwrapSuite::EcdhAes256Gcm, &public, b"0123456789abcdef", b"x").unwrap();
        let key = unwrap(UnwrapSuite::EcdhAes256Gcm, Algorithm::Ecc, &private, &wrapped).unwrap();
        assert_eq!(&key[..], b"0123456789abcdef");
    }

    #[test]
    fn test_suite_must_match_wrapping_key() {
        let (private, public) = x25519_pair();
        let wrapped = WrappedKey::wrap(UnwrapSuite::X25519Aes256Gcm, &public, &[1; 16], b"a").unwrap();
        assert_eq!(
            unwrap(UnwrapSuite::EcdhAes256Gcm, Algorithm::X25519, &private, &wrapped).err(),
            Some(Error::InvalidAlgorithm)
        );
    }

    #[test]
    fn test_declared_length_checked() {
        let (private, public) = x25519_pair();
        let mut wrapped = WrappedKey::wrap(UnwrapSuite::X25519Aes256Gcm, &public, &[1; 16], b"a").unwrap();
        wrapped.key_material_len = 32;
        assert_eq!(
            unwrap(UnwrapSuite::X25519Aes256Gcm, Algorithm::X25519, &private, &wrapped).err(),
            Some(Error::InvalidWrappedFormat)
        );
    }

    #[test]
    fn test_tampered_kek_rejected() {
        let (private, public) = x25519_pair();
        let mut wrapped = WrappedKey::wrap(UnwrapSuite::X25519Aes256Gcm, &public, &[1; 16], b"a").unwrap();
        wrapped.kek_ciphertext[0] ^= 1;
        assert!(unwrap(UnwrapSuite::X25519Aes256Gcm, Algorithm::X25519, &private, &wrapped).is_err());
    }

    #[test]
    fn test_malformed_rejected() {
        let (_, public) = x25519_pair();
        let bytes = WrappedKey::wrap(UnwrapSuite::X25519Aes256Gcm, &public, &[1; 16], b"a")
            .unwrap()
            .to_bytes();
        for len in [0, 3, 10, bytes.len() - 1] {
            assert_eq!(
                WrappedKey::from_bytes(&bytes[..len]).err(),
                Some(Error::InvalidWrappedFormat)
            );
        }
        let mut trailing = bytes.clone();
        trailing.push(0);
        assert_eq!(
            WrappedKey::from_bytes(&trailing).err(),
            Some(Error::InvalidWrappedFormat)
        );
        assert_eq!(
            WrappedKey::from_bytes(&vec![0u8; MAX_WRAPPED_DATA + 1]).err(),
            Some(Error::InvalidWrappedFormat)
        );
    }
}
