//! AES in GCM, CBC and CTR modes.
//!
//! GCM input is buffered until final because the tag covers the whole
//! message, up to `MAX_CACHED_DATA` bytes. CBC holds back a partial block between updates (and, when
//! decrypting with padding, the last full block so the padding can be
//! stripped at final). CTR is a plain keystream.

use crate::ability::{Ability, OperationKind};
use crate::ctx::CryptoCtx;
use crate::spec::{KeySpec, UsageSpec};
use aes::{Aes128, Aes192, Aes256};
use aes_gcm::aead::consts::U12;
use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::AesGcm;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockCipher, BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use keystore_core::{Algorithm, Blob, BlockMode, Error, Padding, Purpose, Result, MAX_CACHED_DATA};
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub const GCM_TAG_LEN: usize = 16;
pub const GCM_NONCE_LEN: usize = 12;
const BLOCK_LEN: usize = 16;

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    let alg = Algorithm::Aes.value();
    vec![
        (OperationKind::GenerateKey, alg, Ability::GenerateKey(generate_key)),
        (OperationKind::Encrypt, alg, Ability::Cipher(encrypt)),
        (OperationKind::Decrypt, alg, Ability::Cipher(decrypt)),
        (OperationKind::EncryptInit, alg, Ability::CipherInit(encrypt_init)),
        (OperationKind::DecryptInit, alg, Ability::CipherInit(decrypt_init)),
        (OperationKind::EncryptUpdate, alg, Ability::CipherUpdate(update)),
        (OperationKind::DecryptUpdate, alg, Ability::CipherUpdate(update)),
        (OperationKind::EncryptFinal, alg, Ability::CipherFinal(finish)),
        (OperationKind::DecryptFinal, alg, Ability::CipherFinal(finish)),
        (OperationKind::EncryptFreeCtx, alg, Ability::FreeCtx(free_ctx)),
        (OperationKind::DecryptFreeCtx, alg, Ability::FreeCtx(free_ctx)),
    ]
}

fn check_key_len(len: usize) -> Result<()> {
    match len {
        16 | 24 | 32 => Ok(()),
        _ => Err(Error::InvalidKeySize),
    }
}

fn generate_key(spec: &KeySpec) -> Result<Blob> {
    if !matches!(spec.key_size, 128 | 192 | 256) {
        return Err(Error::InvalidKeySize);
    }
    let mut key = vec![0u8; spec.key_size as usize / 8];
    super::random::fill_random(&mut key)?;
    Ok(Blob::new(key))
}

fn encrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let mut ctx = encrypt_init(key, spec)?;
    let mut out = update(&mut ctx, input)?.into_vec();
    out.extend_from_slice(&finish(ctx, &[])?);
    Ok(Blob::new(out))
}

fn decrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let mut ctx = decrypt_init(key, spec)?;
    let mut out = update(&mut ctx, input)?.into_vec();
    out.extend_from_slice(&finish(ctx, &[])?);
    Ok(Blob::new(out))
}

fn encrypt_init(key: &[u8], spec: &UsageSpec) -> Result<CryptoCtx> {
    AesCtx::new(key, spec, true).map(CryptoCtx::new)
}

fn decrypt_init(key: &[u8], spec: &UsageSpec) -> Result<CryptoCtx> {
    AesCtx::new(key, spec, false).map(CryptoCtx::new)
}

fn update(ctx: &mut CryptoCtx, input: &[u8]) -> Result<Blob> {
    ctx.downcast_mut::<AesCtx>()?.update(input).map(Blob::new)
}

fn finish(ctx: CryptoCtx, input: &[u8]) -> Result<Blob> {
    let mut state = ctx.into_inner::<AesCtx>()?;
    let mut out = state.update(input)?;
    out.extend_from_slice(&state.finish()?);
    Ok(Blob::new(out))
}

fn free_ctx(ctx: CryptoCtx) {
    drop(ctx);
}

/// Block-by-block CBC engine, erased over key size and direction.
trait BlockStream: Send {
    fn process_blocks(&mut self, data: &mut [u8]);
}

impl<C> BlockStream for cbc::Encryptor<C>
where
    C: BlockEncryptMut + BlockCipher + Send,
{
    fn process_blocks(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            self.encrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    }
}

impl<C> BlockStream for cbc::Decryptor<C>
where
    C: BlockDecryptMut + BlockCipher + Send,
{
    fn process_blocks(&mut self, data: &mut [u8]) {
        for chunk in data.chunks_exact_mut(BLOCK_LEN) {
            self.decrypt_block_mut(GenericArray::from_mut_slice(chunk));
        }
    }
}

trait KeyStream: Send {
    fn apply(&mut self, data: &mut [u8]);
}

impl<S: StreamCipher + Send> KeyStream for S {
    fn apply(&mut self, data: &mut [u8]) {
        self.apply_keystream(data);
    }
}

enum Mode {
    Gcm {
        key: Zeroizing<Vec<u8>>,
        nonce: Vec<u8>,
        aad: Vec<u8>,
        tag: Option<Vec<u8>>,
        buffer: Zeroizing<Vec<u8>>,
    },
    Cbc {
        stream: Box<dyn BlockStream>,
        pkcs7: bool,
        pending: Zeroizing<Vec<u8>>,
    },
    Ctr {
        stream: Box<dyn KeyStream>,
    },
}

struct AesCtx {
    encrypt: bool,
    mode: Mode,
}

impl AesCtx {
    fn new(key: &[u8], spec: &UsageSpec, encrypt: bool) -> Result<Self> {
        check_key_len(key.len())?;
        let expected = if encrypt { Purpose::ENCRYPT } else { Purpose::DECRYPT };
        if spec.purpose != expected {
            return Err(Error::InvalidPurpose);
        }

        let mode = match spec.mode.ok_or(Error::CheckGetModeFail)? {
            BlockMode::Gcm => {
                if spec.padding != Padding::None {
                    return Err(Error::InvalidPadding);
                }
                let nonce = spec.nonce.as_ref().ok_or(Error::CheckGetNonceFail)?;
                if nonce.len() != GCM_NONCE_LEN {
                    return Err(Error::InvalidNonce);
                }
                let tag = match &spec.ae_tag {
                    Some(t) if t.len() != GCM_TAG_LEN => return Err(Error::InvalidAeTag),
                    Some(t) => Some(t.to_vec()),
                    None => None,
                };
                Mode::Gcm {
                    key: Zeroizing::new(key.to_vec()),
                    nonce: nonce.to_vec(),
                    aad: spec.aad.as_ref().map(|a| a.to_vec()).unwrap_or_default(),
                    tag,
                    buffer: Zeroizing::new(Vec::new()),
                }
            }
            BlockMode::Cbc => {
                let pkcs7 = match spec.padding {
                    Padding::None => false,
                    Padding::Pkcs7 | Padding::Pkcs5 => true,
                    _ => return Err(Error::InvalidPadding),
                };
                let iv = spec.iv.as_ref().ok_or(Error::CheckGetIvFail)?;
                if iv.len() != BLOCK_LEN {
                    return Err(Error::InvalidIv);
                }
                Mode::Cbc {
                    stream: cbc_stream(key, iv, encrypt)?,
                    pkcs7,
                    pending: Zeroizing::new(Vec::new()),
                }
            }
            BlockMode::Ctr => {
                if spec.padding != Padding::None {
                    return Err(Error::InvalidPadding);
                }
                let iv = spec.iv.as_ref().ok_or(Error::CheckGetIvFail)?;
                if iv.len() != BLOCK_LEN {
                    return Err(Error::InvalidIv);
                }
                Mode::Ctr {
                    stream: ctr_stream(key, iv)?,
                }
            }
            other => {
                debug!(?other, "unsupported AES mode");
                return Err(Error::InvalidMode);
            }
        };
        Ok(Self { encrypt, mode })
    }

    fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        match &mut self.mode {
            Mode::Gcm { buffer, .. } => {
                if buffer.len() + input.len() > MAX_CACHED_DATA {
                    warn!(
                        buffered = buffer.len(),
                        adding = input.len(),
                        "GCM buffer limit exceeded"
                    );
                    return Err(Error::InvalidArgument);
                }
                buffer.extend_from_slice(input);
                Ok(Vec::new())
            }
            Mode::Cbc {
                stream,
                pkcs7,
                pending,
            } => {
                pending.extend_from_slice(input);
                let mut ready = pending.len() / BLOCK_LEN * BLOCK_LEN;
                // Padded decryption keeps the final block for unpadding.
                if !self.encrypt && *pkcs7 && ready == pending.len() && ready > 0 {
                    ready -= BLOCK_LEN;
                }
                let mut out: Vec<u8> = pending.drain(..ready).collect();
                stream.process_blocks(&mut out);
                Ok(out)
            }
            Mode::Ctr { stream } => {
                let mut out = input.to_vec();
                stream.apply(&mut out);
                Ok(out)
            }
        }
    }

    fn finish(&mut self) -> Result<Vec<u8>> {
        let encrypt = self.encrypt;
        match &mut self.mode {
            Mode::Gcm {
                key,
                nonce,
                aad,
                tag,
                buffer,
            } => {
                if encrypt {
                    gcm_seal(key, nonce, aad, buffer)
                } else {
                    let sealed = match tag.take() {
                        Some(t) => {
                            let mut joined = buffer.to_vec();
                            joined.extend_from_slice(&t);
                            joined
                        }
                        None if buffer.len() >= GCM_TAG_LEN => buffer.to_vec(),
                        None => return Err(Error::InvalidAeTag),
                    };
                    gcm_open(key, nonce, aad, &sealed)
                }
            }
            Mode::Cbc {
                stream,
                pkcs7,
                pending,
            } => {
                if encrypt && *pkcs7 {
                    let pad = BLOCK_LEN - pending.len() % BLOCK_LEN;
                    pending.extend(std::iter::repeat(pad as u8).take(pad));
                }
                if pending.len() % BLOCK_LEN != 0 {
                    return Err(Error::InvalidArgument);
                }
                let mut out: Vec<u8> = std::mem::take(&mut **pending);
                stream.process_blocks(&mut out);
                if !encrypt && *pkcs7 {
                    strip_pkcs7(&mut out)?;
                }
                Ok(out)
            }
            Mode::Ctr { .. } => Ok(Vec::new()),
        }
    }
}

fn strip_pkcs7(data: &mut Vec<u8>) -> Result<()> {
    let pad = *data.last().ok_or(Error::InvalidPadding)? as usize;
    if pad == 0 || pad > BLOCK_LEN || pad > data.len() {
        return Err(Error::InvalidPadding);
    }
    if !data[data.len() - pad..].iter().all(|b| *b as usize == pad) {
        return Err(Error::InvalidPadding);
    }
    data.truncate(data.len() - pad);
    Ok(())
}

fn cbc_stream(key: &[u8], iv: &[u8], encrypt: bool) -> Result<Box<dyn BlockStream>> {
    let bad = |_| Error::InvalidKeySize;
    let stream: Box<dyn BlockStream> = match (key.len(), encrypt) {
        (16, true) => Box::new(cbc::Encryptor::<Aes128>::new_from_slices(key, iv).map_err(bad)?),
        (24, true) => Box::new(cbc::Encryptor::<Aes192>::new_from_slices(key, iv).map_err(bad)?),
        (32, true) => Box::new(cbc::Encryptor::<Aes256>::new_from_slices(key, iv).map_err(bad)?),
        (16, false) => Box::new(cbc::Decryptor::<Aes128>::new_from_slices(key, iv).map_err(bad)?),
        (24, false) => Box::new(cbc::Decryptor::<Aes192>::new_from_slices(key, iv).map_err(bad)?),
        (32, false) => Box::new(cbc::Decryptor::<Aes256>::new_from_slices(key, iv).map_err(bad)?),
        _ => return Err(Error::InvalidKeySize),
    };
    Ok(stream)
}

fn ctr_stream(key: &[u8], iv: &[u8]) -> Result<Box<dyn KeyStream>> {
    let bad = |_| Error::InvalidKeySize;
    let stream: Box<dyn KeyStream> = match key.len() {
        16 => Box::new(ctr::Ctr128BE::<Aes128>::new_from_slices(key, iv).map_err(bad)?),
        24 => Box::new(ctr::Ctr128BE::<Aes192>::new_from_slices(key, iv).map_err(bad)?),
        32 => Box::new(ctr::Ctr128BE::<Aes256>::new_from_slices(key, iv).map_err(bad)?),
        _ => return Err(Error::InvalidKeySize),
    };
    Ok(stream)
}

fn seal_with<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeySize)?;
    cipher
        .encrypt(GenericArray::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| Error::CryptoEngine)
}

fn open_with<C: Aead + KeyInit>(key: &[u8], nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    let cipher = C::new_from_slice(key).map_err(|_| Error::InvalidKeySize)?;
    cipher
        .decrypt(GenericArray::from_slice(nonce), Payload { msg, aad })
        .map_err(|_| {
            debug!("AES-GCM tag mismatch");
            Error::CryptoEngine
        })
}

/// AES-GCM encryption with a 12-byte nonce; output is `ciphertext || tag`.
pub fn gcm_seal(key: &[u8], nonce: &[u8], aad: &[u8], msg: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != GCM_NONCE_LEN {
        return Err(Error::InvalidNonce);
    }
    match key.len() {
        16 => seal_with::<AesGcm<Aes128, U12>>(key, nonce, aad, msg),
        24 => seal_with::<AesGcm<Aes192, U12>>(key, nonce, aad, msg),
        32 => seal_with::<AesGcm<Aes256, U12>>(key, nonce, aad, msg),
        _ => Err(Error::InvalidKeySize),
    }
}

/// AES-GCM decryption of `ciphertext || tag`.
pub fn gcm_open(key: &[u8], nonce: &[u8], aad: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if nonce.len() != GCM_NONCE_LEN {
        return Err(Error::InvalidNonce);
    }
    if sealed.len() < GCM_TAG_LEN {
        return Err(Error::InvalidAeTag);
    }
    match key.len() {
        16 => open_with::<AesGcm<Aes128, U12>>(key, nonce, aad, sealed),
        24 => open_with::<AesGcm<Aes192, U12>>(key, nonce, aad, sealed),
        32 => open_with::<AesGcm<Aes256, U12>>(key, nonce, aad, sealed),
        _ => Err(Error::InvalidKeySize),
    }
}
