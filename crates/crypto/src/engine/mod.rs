//! Software crypto engine.
//!
//! Each module contributes a list of abilities. Which lists exist is decided
//! by the crate's algorithm features, so a disabled algorithm never fills a
//! registry slot.

use crate::ability::Registry;
use tracing::warn;

pub mod aes;
#[cfg(feature = "rsa")]
pub mod bn;
#[cfg(feature = "curve25519")]
pub mod curve25519;
#[cfg(feature = "ecc")]
pub mod ecc;
pub mod hash;
pub mod hmac;
pub mod kdf;
pub mod random;
#[cfg(feature = "rsa")]
pub mod rsa;

pub(crate) fn register_abilities(registry: &mut Registry) {
    let mut modules = vec![
        random::abilities(),
        hash::abilities(),
        hmac::abilities(),
        kdf::abilities(),
        aes::abilities(),
    ];
    #[cfg(feature = "rsa")]
    {
        modules.push(rsa::abilities());
        modules.push(bn::abilities());
    }
    #[cfg(feature = "ecc")]
    modules.push(ecc::abilities());
    #[cfg(feature = "curve25519")]
    modules.push(curve25519::abilities());

    for entries in modules {
        if let Err(e) = registry.register_all(&entries) {
            warn!(error = %e, "ability module failed to register");
        }
    }
}
