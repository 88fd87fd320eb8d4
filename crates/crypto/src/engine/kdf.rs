//! HKDF and PBKDF2.

use crate::ability::{Ability, OperationKind};
use crate::spec::DeriveSpec;
use hkdf::Hkdf;
use keystore_core::{Algorithm, Blob, Digest, Error, Result};
use sha2::{Sha256, Sha384, Sha512};
use tracing::debug;

/// Largest derived output accepted.
pub const MAX_DERIVE_LEN: usize = 1024;

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    vec![
        (OperationKind::DeriveKey, Algorithm::Hkdf.value(), Ability::Derive(hkdf)),
        (OperationKind::DeriveKey, Algorithm::Pbkdf2.value(), Ability::Derive(pbkdf2)),
    ]
}

fn check_len(spec: &DeriveSpec) -> Result<()> {
    if spec.output_len == 0 || spec.output_len > MAX_DERIVE_LEN {
        return Err(Error::InvalidKeySize);
    }
    Ok(())
}

fn hkdf(spec: &DeriveSpec, main_key: &[u8]) -> Result<Blob> {
    check_len(spec)?;
    let salt = spec.salt.as_deref();
    let info = spec.info.as_deref().unwrap_or_default();
    let mut out = vec![0u8; spec.output_len];
    let expanded = match spec.digest {
        Digest::Sha256 => Hkdf::<Sha256>::new(salt, main_key).expand(info, &mut out),
        Digest::Sha384 => Hkdf::<Sha384>::new(salt, main_key).expand(info, &mut out),
        Digest::Sha512 => Hkdf::<Sha512>::new(salt, main_key).expand(info, &mut out),
        _ => return Err(Error::InvalidDigest),
    };
    expanded.map_err(|_| {
        debug!(len = spec.output_len, "HKDF output too long");
        Error::InvalidKeySize
    })?;
    Ok(Blob::new(out))
}

fn pbkdf2(spec: &DeriveSpec, main_key: &[u8]) -> Result<Blob> {
    check_len(spec)?;
    if spec.iterations == 0 {
        return Err(Error::InvalidIteration);
    }
    let salt = spec.salt.as_deref().ok_or(Error::CheckGetSaltFail)?;
    let mut out = vec![0u8; spec.output_len];
    match spec.digest {
        Digest::Sha256 => pbkdf2::pbkdf2_hmac::<Sha256>(main_key, salt, spec.iterations, &mut out),
        Digest::Sha384 => pbkdf2::pbkdf2_hmac::<Sha384>(main_key, salt, spec.iterations, &mut out),
        Digest::Sha512 => pbkdf2::pbkdf2_hmac::<Sha512>(main_key, salt, spec.iterations, &mut out),
        _ => return Err(Error::InvalidDigest),
    }
    Ok(Blob::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(algorithm: Algorithm, output_len: usize) -> DeriveSpec {
        DeriveSpec {
            algorithm,
            digest: Digest::Sha256,
            salt: Some(Blob::from_slice(b"salt")),
            info: None,
            iterations: 1,
            output_len,
        }
    }

    #[test]
    fn test_pbkdf2_rfc6070_style_vector() {
        let out = pbkdf2(&spec(Algorithm::Pbkdf2, 32), b"password").unwrap();
        assert_eq!(
            hex::encode(out.as_slice()),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_hkdf_rfc5869_case1() {
        let ikm = [0x0bu8; 22];
        let mut s = spec(Algorithm::Hkdf, 42);
        s.salt = Some(Blob::new((0u8..=0x0c).collect()));
        s.info = Some(Blob::new((0xf0u8..=0xf9).collect()));
        let out = hkdf(&s, &ikm).unwrap();
        assert_eq!(
            hex::encode(out.as_slice()),
            "3cb25f25faacd57a90434f64d0362f2a2d2d0a90cf1a5a4c5db02d56ecc4c5bf34007208d5b887185865"
        );
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert_eq!(hkdf(&spec(Algorithm::Hkdf, 0), b"k"), Err(Error::InvalidKeySize));
        let mut s = spec(Algorithm::Pbkdf2, 16);
        s.iterations = 0;
        assert_eq!(pbkdf2(&s, b"k"), Err(Error::InvalidIteration));
    }
}
