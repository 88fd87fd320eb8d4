//! Big-number modular exponentiation.

use crate::ability::{Ability, OperationKind, ALG_ANY};
use keystore_core::{Blob, Error, Result};
use rsa::BigUint;

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    vec![(OperationKind::BnExpMod, ALG_ANY, Ability::BnExpMod(bn_exp_mod))]
}

/// `a^e mod n` over big-endian unsigned integers. The result is left-padded
/// to the length of `n`.
pub fn bn_exp_mod(a: &[u8], e: &[u8], n: &[u8]) -> Result<Blob> {
    if n.iter().all(|b| *b == 0) {
        return Err(Error::InvalidArgument);
    }
    let modulus = BigUint::from_bytes_be(n);
    let x = BigUint::from_bytes_be(a).modpow(&BigUint::from_bytes_be(e), &modulus);
    let bytes = x.to_bytes_be();
    let mut out = vec![0u8; n.len()];
    let start = n.len().checked_sub(bytes.len()).ok_or(Error::Failure)?;
    out[start..].copy_from_slice(&bytes);
    Ok(Blob::new(out))
}
