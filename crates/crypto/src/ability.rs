//! Crypto ability registry.
//!
//! Maps `(operation kind, algorithm id)` to the function implementing it.
//! The process-wide table is built once on first use and is read-only
//! afterwards. A slot can be filled only once; a second registration for the
//! same key is rejected so misconfigured feature sets show up in the logs
//! instead of silently replacing an implementation.

use crate::ctx::CryptoCtx;
use crate::spec::{DeriveSpec, KeySpec, UsageSpec};
use keystore_core::{Algorithm, Blob, Digest, Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Algorithm id used for process-wide abilities (random, big numbers).
pub const ALG_ANY: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    GenerateKey,
    GetPublicKey,
    Sign,
    Verify,
    Encrypt,
    EncryptInit,
    EncryptUpdate,
    EncryptFinal,
    EncryptFreeCtx,
    Decrypt,
    DecryptInit,
    DecryptUpdate,
    DecryptFinal,
    DecryptFreeCtx,
    AgreeKey,
    DeriveKey,
    Hash,
    HashInit,
    HashUpdate,
    HashFinal,
    HashFreeCtx,
    Hmac,
    HmacInit,
    HmacUpdate,
    HmacFinal,
    HmacFreeCtx,
    FillRandom,
    BnExpMod,
}

pub type GenerateKeyFn = fn(&KeySpec) -> Result<Blob>;
pub type GetPublicKeyFn = fn(key: &[u8]) -> Result<Blob>;
/// `message` is the prehash when the spec names a digest.
pub type SignFn = fn(key: &[u8], spec: &UsageSpec, message: &[u8]) -> Result<Blob>;
pub type VerifyFn =
    fn(public_key: &[u8], spec: &UsageSpec, message: &[u8], signature: &[u8]) -> Result<()>;
pub type CipherFn = fn(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob>;
pub type CipherInitFn = fn(key: &[u8], spec: &UsageSpec) -> Result<CryptoCtx>;
pub type CipherUpdateFn = fn(ctx: &mut CryptoCtx, input: &[u8]) -> Result<Blob>;
pub type CipherFinalFn = fn(ctx: CryptoCtx, input: &[u8]) -> Result<Blob>;
pub type FreeCtxFn = fn(ctx: CryptoCtx);
pub type AgreeFn = fn(private_key: &[u8], peer_public_key: &[u8]) -> Result<Blob>;
pub type DeriveFn = fn(spec: &DeriveSpec, main_key: &[u8]) -> Result<Blob>;
pub type HashFn = fn(digest: Digest, message: &[u8]) -> Result<Blob>;
pub type HashInitFn = fn(digest: Digest) -> Result<CryptoCtx>;
pub type DigestUpdateFn = fn(ctx: &mut CryptoCtx, input: &[u8]) -> Result<()>;
pub type DigestFinalFn = fn(ctx: CryptoCtx, input: &[u8]) -> Result<Blob>;
pub type HmacFn = fn(digest: Digest, key: &[u8], message: &[u8]) -> Result<Blob>;
pub type HmacInitFn = fn(digest: Digest, key: &[u8]) -> Result<CryptoCtx>;
pub type FillRandomFn = fn(out: &mut [u8]) -> Result<()>;
pub type BnExpModFn = fn(a: &[u8], e: &[u8], n: &[u8]) -> Result<Blob>;

/// One registered implementation. The variant fixes the call signature.
#[derive(Clone, Copy)]
pub enum Ability {
    GenerateKey(GenerateKeyFn),
    GetPublicKey(GetPublicKeyFn),
    Sign(SignFn),
    Verify(VerifyFn),
    Cipher(CipherFn),
    CipherInit(CipherInitFn),
    CipherUpdate(CipherUpdateFn),
    CipherFinal(CipherFinalFn),
    FreeCtx(FreeCtxFn),
    Agree(AgreeFn),
    Derive(DeriveFn),
    Hash(HashFn),
    HashInit(HashInitFn),
    DigestUpdate(DigestUpdateFn),
    DigestFinal(DigestFinalFn),
    Hmac(HmacFn),
    HmacInit(HmacInitFn),
    FillRandom(FillRandomFn),
    BnExpMod(BnExpModFn),
}

impl Ability {
    /// Whether this ability's signature is the one `kind` is called with.
    pub fn fits(&self, kind: OperationKind) -> bool {
        use OperationKind as K;
        matches!(
            (self, kind),
            (Ability::GenerateKey(_), K::GenerateKey)
                | (Ability::GetPublicKey(_), K::GetPublicKey)
                | (Ability::Sign(_), K::Sign)
                | (Ability::Verify(_), K::Verify)
                | (Ability::Cipher(_), K::Encrypt | K::Decrypt)
                | (Ability::CipherInit(_), K::EncryptInit | K::DecryptInit)
                | (Ability::CipherUpdate(_), K::EncryptUpdate | K::DecryptUpdate)
                | (Ability::CipherFinal(_), K::EncryptFinal | K::DecryptFinal)
                | (
                    Ability::FreeCtx(_),
                    K::EncryptFreeCtx | K::DecryptFreeCtx | K::HashFreeCtx | K::HmacFreeCtx
                )
                | (Ability::Agree(_), K::AgreeKey)
                | (Ability::Derive(_), K::DeriveKey)
                | (Ability::Hash(_), K::Hash)
                | (Ability::HashInit(_), K::HashInit)
                | (Ability::DigestUpdate(_), K::HashUpdate | K::HmacUpdate)
                | (Ability::DigestFinal(_), K::HashFinal | K::HmacFinal)
                | (Ability::Hmac(_), K::Hmac)
                | (Ability::HmacInit(_), K::HmacInit)
                | (Ability::FillRandom(_), K::FillRandom)
                | (Ability::BnExpMod(_), K::BnExpMod)
        )
    }

    /// Address of the implementation, for identity comparisons.
    fn addr(&self) -> usize {
        match *self {
            Ability::GenerateKey(f) => f as usize,
            Ability::GetPublicKey(f) => f as usize,
            Ability::Sign(f) => f as usize,
            Ability::Verify(f) => f as usize,
            Ability::Cipher(f) => f as usize,
            Ability::CipherInit(f) => f as usize,
            Ability::CipherUpdate(f) => f as usize,
            Ability::CipherFinal(f) => f as usize,
            Ability::FreeCtx(f) => f as usize,
            Ability::Agree(f) => f as usize,
            Ability::Derive(f) => f as usize,
            Ability::Hash(f) => f as usize,
            Ability::HashInit(f) => f as usize,
            Ability::DigestUpdate(f) => f as usize,
            Ability::DigestFinal(f) => f as usize,
            Ability::Hmac(f) => f as usize,
            Ability::HmacInit(f) => f as usize,
            Ability::FillRandom(f) => f as usize,
            Ability::BnExpMod(f) => f as usize,
        }
    }
}

impl PartialEq for Ability {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other) && self.addr() == other.addr()
    }
}

impl fmt::Debug for Ability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ability({:?}@{:#x})", std::mem::discriminant(self), self.addr())
    }
}

/// Registry key: operation kind plus algorithm id (`ALG_ANY` for
/// process-wide abilities).
pub type AbilityKey = (OperationKind, u32);

#[derive(Debug, Default)]
pub struct Registry {
    table: HashMap<AbilityKey, Ability>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fill one slot. Occupied slots are never overwritten.
    pub fn register(&mut self, kind: OperationKind, algorithm: u32, ability: Ability) -> Result<()> {
        if !ability.fits(kind) {
            warn!(?kind, algorithm, "ability signature does not fit operation kind");
            return Err(Error::InvalidArgument);
        }
        if self.table.contains_key(&(kind, algorithm)) {
            warn!(?kind, algorithm, "ability already registered");
            return Err(Error::AlreadyExists);
        }
        self.table.insert((kind, algorithm), ability);
        Ok(())
    }

    /// Register a batch, tolerating slots that are already filled.
    pub fn register_all(&mut self, entries: &[(OperationKind, u32, Ability)]) -> Result<()> {
        for &(kind, algorithm, ability) in entries {
            match self.register(kind, algorithm, ability) {
                Ok(()) | Err(Error::AlreadyExists) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn lookup(&self, kind: OperationKind, algorithm: u32) -> Option<Ability> {
        self.table.get(&(kind, algorithm)).copied()
    }

    /// Lookup keyed by algorithm enum.
    pub fn lookup_alg(&self, kind: OperationKind, algorithm: Algorithm) -> Option<Ability> {
        self.lookup(kind, algorithm.value())
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Every filled slot; order is unspecified.
    pub fn keys(&self) -> impl Iterator<Item = &AbilityKey> {
        self.table.keys()
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

/// Register every compiled-in algorithm module. Safe to call repeatedly;
/// only the first call populates the table.
pub fn init_all() -> &'static Registry {
    REGISTRY.get_or_init(|| {
        let mut registry = Registry::new();
        crate::engine::register_abilities(&mut registry);
        debug!(abilities = registry.len(), "crypto abilities registered");
        registry
    })
}

/// The process-wide registry, initialized on first use.
pub fn registry() -> &'static Registry {
    init_all()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(out: &mut [u8]) -> Result<()> {
        out.fill(1);
        Ok(())
    }

    fn fill_other(out: &mut [u8]) -> Result<()> {
        out.fill(2);
        Ok(())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut r = Registry::new();
        r.register(OperationKind::FillRandom, ALG_ANY, Ability::FillRandom(fill))
            .unwrap();
        assert_eq!(
            r.lookup(OperationKind::FillRandom, ALG_ANY),
            Some(Ability::FillRandom(fill))
        );
        assert_eq!(r.lookup(OperationKind::FillRandom, 1), None);
        assert_eq!(r.lookup(OperationKind::Hash, ALG_ANY), None);
    }

    #[test]
    fn test_duplicate_rejected() {
        let mut r = Registry::new();
        r.register(OperationKind::FillRandom, ALG_ANY, Ability::FillRandom(fill))
            .unwrap();
        let err = r
            .register(OperationKind::FillRandom, ALG_ANY, Ability::FillRandom(fill_other))
            .unwrap_err();
        assert_eq!(err, Error::AlreadyExists);
        assert_eq!(
            r.lookup(OperationKind::FillRandom, ALG_ANY),
            Some(Ability::FillRandom(fill))
        );
    }

    #[test]
    fn test_signature_mismatch_rejected() {
        let mut r = Registry::new();
        let err = r
            .register(OperationKind::Hash, ALG_ANY, Ability::FillRandom(fill))
            .unwrap_err();
        assert_eq!(err, Error::InvalidArgument);
        assert!(r.is_empty());
    }

    #[test]
    fn test_engine_registration_idempotent() {
        let mut r = Registry::new();
        crate::engine::register_abilities(&mut r);
        let before: HashMap<AbilityKey, Ability> =
            r.keys().map(|k| (*k, r.lookup(k.0, k.1).unwrap())).collect();
        crate::engine::register_abilities(&mut r);
        assert_eq!(r.len(), before.len());
        for (k, ability) in &before {
            assert_eq!(r.lookup(k.0, k.1).as_ref(), Some(ability));
        }
    }

    #[test]
    fn test_global_init_all_idempotent() {
        let first = init_all() as *const Registry;
        let second = init_all() as *const Registry;
        assert_eq!(first, second);
        assert!(registry()
            .lookup(OperationKind::FillRandom, ALG_ANY)
            .is_some());
    }
}
