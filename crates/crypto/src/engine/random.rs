//! Random bytes from the OS.

use crate::ability::{Ability, OperationKind, ALG_ANY};
use keystore_core::{Error, Result};
use tracing::error;

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    vec![(OperationKind::FillRandom, ALG_ANY, Ability::FillRandom(fill_random))]
}

pub fn fill_random(out: &mut [u8]) -> Result<()> {
    getrandom::getrandom(out).map_err(|e| {
        error!(error = %e, "OS random source failed");
        Error::CryptoEngine
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_random() {
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        fill_random(&mut a).unwrap();
        fill_random(&mut b).unwrap();
        assert_ne!(a, b);
    }
}
