//! HMAC keys and MACs over SHA-2.

use crate::ability::{Ability, OperationKind};
use crate::ctx::CryptoCtx;
use crate::spec::KeySpec;
use hmac::{Hmac, Mac};
use keystore_core::{Algorithm, Blob, Digest, Error, Result};
use sha2::{Sha224, Sha256, Sha384, Sha512};

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    let alg = Algorithm::Hmac.value();
    vec![
        (OperationKind::GenerateKey, alg, Ability::GenerateKey(generate_key)),
        (OperationKind::Hmac, alg, Ability::Hmac(hmac)),
        (OperationKind::HmacInit, alg, Ability::HmacInit(hmac_init)),
        (OperationKind::HmacUpdate, alg, Ability::DigestUpdate(hmac_update)),
        (OperationKind::HmacFinal, alg, Ability::DigestFinal(hmac_final)),
        (OperationKind::HmacFreeCtx, alg, Ability::FreeCtx(free_ctx)),
    ]
}

fn generate_key(spec: &KeySpec) -> Result<Blob> {
    if spec.key_size == 0 || spec.key_size % 8 != 0 || spec.key_size > 1024 {
        return Err(Error::InvalidKeySize);
    }
    let mut key = vec![0u8; spec.key_size as usize / 8];
    super::random::fill_random(&mut key)?;
    Ok(Blob::new(key))
}

enum HmacState {
    Sha224(Hmac<Sha224>),
    Sha256(Hmac<Sha256>),
    Sha384(Hmac<Sha384>),
    Sha512(Hmac<Sha512>),
}

impl HmacState {
    fn new(digest: Digest, key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidKeySize);
        }
        let bad = |_| Error::InvalidKeySize;
        Ok(match digest {
            Digest::Sha224 => HmacState::Sha224(Hmac::new_from_slice(key).map_err(bad)?),
            Digest::Sha256 => HmacState::Sha256(Hmac::new_from_slice(key).map_err(bad)?),
            Digest::Sha384 => HmacState::Sha384(Hmac::new_from_slice(key).map_err(bad)?),
            Digest::Sha512 => HmacState::Sha512(Hmac::new_from_slice(key).map_err(bad)?),
            _ => return Err(Error::InvalidDigest),
        })
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            HmacState::Sha224(m) => m.update(data),
            HmacState::Sha256(m) => m.update(data),
            HmacState::Sha384(m) => m.update(data),
            HmacState::Sha512(m) => m.update(data),
        }
    }

    fn finalize(self) -> Vec<u8> {
        match self {
            HmacState::Sha224(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha256(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha384(m) => m.finalize().into_bytes().to_vec(),
            HmacState::Sha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }
}

pub fn hmac(digest: Digest, key: &[u8], message: &[u8]) -> Result<Blob> {
    let mut state = HmacState::new(digest, key)?;
    state.update(message);
    Ok(Blob::new(state.finalize()))
}

fn hmac_init(digest: Digest, key: &[u8]) -> Result<CryptoCtx> {
    HmacState::new(digest, key).map(CryptoCtx::new)
}

fn hmac_update(ctx: &mut CryptoCtx, input: &[u8]) -> Result<()> {
    ctx.downcast_mut::<HmacState>()?.update(input);
    Ok(())
}

fn hmac_final(ctx: CryptoCtx, input: &[u8]) -> Result<Blob> {
    let mut state = ctx.into_inner::<HmacState>()?;
    state.update(input);
    Ok(Blob::new(state.finalize()))
}

fn free_ctx(ctx: CryptoCtx) {
    drop(ctx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_case2() {
        let mac = hmac(Digest::Sha256, b"Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            hex::encode(mac.as_slice()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_staged_hmac() {
        let mut ctx = hmac_init(Digest::Sha512, b"key").unwrap();
        hmac_update(&mut ctx, b"part one, ").unwrap();
        let staged = hmac_final(ctx, b"part two").unwrap();
        assert_eq!(staged, hmac(Digest::Sha512, b"key", b"part one, part two").unwrap());
    }

    #[test]
    fn test_rejects_empty_key_and_bad_digest() {
        assert_eq!(hmac(Digest::Sha256, b"", b"x"), Err(Error::InvalidKeySize));
        assert_eq!(hmac(Digest::Md5, b"k", b"x"), Err(Error::InvalidDigest));
    }
}
