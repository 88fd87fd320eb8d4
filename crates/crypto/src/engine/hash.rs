//! SHA-2 digests, one-shot and staged.

use crate::ability::{Ability, OperationKind, ALG_ANY};
use crate::ctx::CryptoCtx;
use keystore_core::{Blob, Digest, Error, Result};
use sha2::digest::DynDigest;
use sha2::{Sha224, Sha256, Sha384, Sha512};

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    vec![
        (OperationKind::Hash, ALG_ANY, Ability::Hash(hash)),
        (OperationKind::HashInit, ALG_ANY, Ability::HashInit(hash_init)),
        (OperationKind::HashUpdate, ALG_ANY, Ability::DigestUpdate(hash_update)),
        (OperationKind::HashFinal, ALG_ANY, Ability::DigestFinal(hash_final)),
        (OperationKind::HashFreeCtx, ALG_ANY, Ability::FreeCtx(free_ctx)),
    ]
}

pub(crate) fn hasher(digest: Digest) -> Result<Box<dyn DynDigest + Send>> {
    let h: Box<dyn DynDigest + Send> = match digest {
        Digest::Sha224 => Box::new(Sha224::default()),
        Digest::Sha256 => Box::new(Sha256::default()),
        Digest::Sha384 => Box::new(Sha384::default()),
        Digest::Sha512 => Box::new(Sha512::default()),
        _ => return Err(Error::InvalidDigest),
    };
    Ok(h)
}

pub fn hash(digest: Digest, message: &[u8]) -> Result<Blob> {
    let mut h = hasher(digest)?;
    h.update(message);
    Ok(Blob::new(h.finalize().into_vec()))
}

struct HashCtx(Box<dyn DynDigest + Send>);

fn hash_init(digest: Digest) -> Result<CryptoCtx> {
    Ok(CryptoCtx::new(HashCtx(hasher(digest)?)))
}

fn hash_update(ctx: &mut CryptoCtx, input: &[u8]) -> Result<()> {
    ctx.downcast_mut::<HashCtx>()?.0.update(input);
    Ok(())
}

fn hash_final(ctx: CryptoCtx, input: &[u8]) -> Result<Blob> {
    let HashCtx(mut h) = ctx.into_inner::<HashCtx>()?;
    h.update(input);
    Ok(Blob::new(h.finalize().into_vec()))
}

fn free_ctx(ctx: CryptoCtx) {
    drop(ctx);
}
