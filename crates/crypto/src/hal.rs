//! Typed entry points over the ability registry.
//!
//! Each call looks the `(kind, algorithm)` slot up in the process-wide
//! registry; an empty slot surfaces as `NotSupported`.

use crate::ability::{registry, Ability, OperationKind, ALG_ANY};
use crate::ctx::CryptoCtx;
use crate::spec::{DeriveSpec, KeySpec, UsageSpec};
use keystore_core::{Algorithm, Blob, Digest, Error, Result};
use tracing::debug;

fn lookup(kind: OperationKind, algorithm: u32) -> Result<Ability> {
    registry().lookup(kind, algorithm).ok_or_else(|| {
        debug!(?kind, algorithm, "no ability registered");
        Error::NotSupported
    })
}

macro_rules! expect_ability {
    ($kind:expr, $alg:expr, $variant:ident) => {
        match lookup($kind, $alg)? {
            Ability::$variant(f) => f,
            _ => return Err(Error::NotSupported),
        }
    };
}

pub fn generate_key(spec: &KeySpec) -> Result<Blob> {
    let f = expect_ability!(OperationKind::GenerateKey, spec.algorithm.value(), GenerateKey);
    f(spec)
}

pub fn get_public_key(algorithm: Algorithm, key: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::GetPublicKey, algorithm.value(), GetPublicKey);
    f(key)
}

/// Sign a prepared message: the prehash when `spec.digest` is set, the raw
/// message otherwise.
pub fn sign(key: &[u8], spec: &UsageSpec, message: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::Sign, spec.algorithm.value(), Sign);
    f(key, spec, message)
}

pub fn verify(public_key: &[u8], spec: &UsageSpec, message: &[u8], signature: &[u8]) -> Result<()> {
    let f = expect_ability!(OperationKind::Verify, spec.algorithm.value(), Verify);
    f(public_key, spec, message, signature)
}

/// Whether `algorithm` signs whole messages rather than a prehash.
pub fn signs_full_message(algorithm: Algorithm, digest: Digest) -> bool {
    algorithm == Algorithm::Ed25519 || digest == Digest::None
}

/// Prepare `message` for [`sign`]/[`verify`]: hash it unless the algorithm
/// signs full messages.
pub fn prepare_message(spec: &UsageSpec, message: &[u8]) -> Result<Blob> {
    if signs_full_message(spec.algorithm, spec.digest) {
        Ok(Blob::from_slice(message))
    } else {
        hash(spec.digest, message)
    }
}

pub fn encrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::Encrypt, spec.algorithm.value(), Cipher);
    f(key, spec, input)
}

pub fn decrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::Decrypt, spec.algorithm.value(), Cipher);
    f(key, spec, input)
}

/// Staged cipher entry points for one direction.
#[derive(Clone, Copy)]
pub struct CipherOps {
    pub init: crate::ability::CipherInitFn,
    pub update: crate::ability::CipherUpdateFn,
    pub finish: crate::ability::CipherFinalFn,
    pub free: crate::ability::FreeCtxFn,
}

impl CipherOps {
    /// Resolve every staged entry point up front so a session never finds a
    /// hole halfway through.
    pub fn resolve(algorithm: Algorithm, encrypt: bool) -> Result<Self> {
        let alg = algorithm.value();
        let (init, update, finish, free) = if encrypt {
            (
                OperationKind::EncryptInit,
                OperationKind::EncryptUpdate,
                OperationKind::EncryptFinal,
                OperationKind::EncryptFreeCtx,
            )
        } else {
            (
                OperationKind::DecryptInit,
                OperationKind::DecryptUpdate,
                OperationKind::DecryptFinal,
                OperationKind::DecryptFreeCtx,
            )
        };
        Ok(Self {
            init: expect_ability!(init, alg, CipherInit),
            update: expect_ability!(update, alg, CipherUpdate),
            finish: expect_ability!(finish, alg, CipherFinal),
            free: expect_ability!(free, alg, FreeCtx),
        })
    }

    /// Whether `algorithm` has staged cipher support in this direction.
    pub fn is_supported(algorithm: Algorithm, encrypt: bool) -> bool {
        Self::resolve(algorithm, encrypt).is_ok()
    }
}

pub fn agree_key(algorithm: Algorithm, private_key: &[u8], peer_public_key: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::AgreeKey, algorithm.value(), Agree);
    f(private_key, peer_public_key)
}

pub fn derive_key(spec: &DeriveSpec, main_key: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::DeriveKey, spec.algorithm.value(), Derive);
    f(spec, main_key)
}

pub fn hash(digest: Digest, message: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::Hash, ALG_ANY, Hash);
    f(digest, message)
}

/// Staged digest (hash or HMAC) entry points.
#[derive(Clone, Copy)]
pub struct DigestOps {
    pub update: crate::ability::DigestUpdateFn,
    pub finish: crate::ability::DigestFinalFn,
    pub free: crate::ability::FreeCtxFn,
}

pub fn hash_init(digest: Digest) -> Result<(CryptoCtx, DigestOps)> {
    let init = expect_ability!(OperationKind::HashInit, ALG_ANY, HashInit);
    let ops = DigestOps {
        update: expect_ability!(OperationKind::HashUpdate, ALG_ANY, DigestUpdate),
        finish: expect_ability!(OperationKind::HashFinal, ALG_ANY, DigestFinal),
        free: expect_ability!(OperationKind::HashFreeCtx, ALG_ANY, FreeCtx),
    };
    Ok((init(digest)?, ops))
}

pub fn hmac(digest: Digest, key: &[u8], message: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::Hmac, Algorithm::Hmac.value(), Hmac);
    f(digest, key, message)
}

pub fn hmac_init(digest: Digest, key: &[u8]) -> Result<(CryptoCtx, DigestOps)> {
    let alg = Algorithm::Hmac.value();
    let init = expect_ability!(OperationKind::HmacInit, alg, HmacInit);
    let ops = DigestOps {
        update: expect_ability!(OperationKind::HmacUpdate, alg, DigestUpdate),
        finish: expect_ability!(OperationKind::HmacFinal, alg, DigestFinal),
        free: expect_ability!(OperationKind::HmacFreeCtx, alg, FreeCtx),
    };
    Ok((init(digest, key)?, ops))
}

pub fn fill_random(out: &mut [u8]) -> Result<()> {
    let f = expect_ability!(OperationKind::FillRandom, ALG_ANY, FillRandom);
    f(out)
}

pub fn bn_exp_mod(a: &[u8], e: &[u8], n: &[u8]) -> Result<Blob> {
    let f = expect_ability!(OperationKind::BnExpMod, ALG_ANY, BnExpMod);
    f(a, e, n)
}
