//! RSA keys in PKCS#1 DER.
//!
//! Signatures are computed over a prehash supplied by the caller; digest
//! `None` selects unprefixed PKCS#1 v1.5. Encryption is one-shot only.

use crate::ability::{Ability, OperationKind};
use crate::spec::{KeySpec, UsageSpec};
use keystore_core::{Algorithm, Blob, Digest, Error, Padding, Result};
use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPrivateKey, EncodeRsaPublicKey};
use rsa::{Oaep, Pkcs1v15Encrypt, Pkcs1v15Sign, Pss, RsaPrivateKey, RsaPublicKey};
use sha2::{Sha224, Sha256, Sha384, Sha512};
use tracing::debug;

const KEY_SIZES: [u32; 4] = [1024, 2048, 3072, 4096];

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    let alg = Algorithm::Rsa.value();
    vec![
        (OperationKind::GenerateKey, alg, Ability::GenerateKey(generate_key)),
        (OperationKind::GetPublicKey, alg, Ability::GetPublicKey(get_public_key)),
        (OperationKind::Sign, alg, Ability::Sign(sign)),
        (OperationKind::Verify, alg, Ability::Verify(verify)),
        (OperationKind::Encrypt, alg, Ability::Cipher(encrypt)),
        (OperationKind::Decrypt, alg, Ability::Cipher(decrypt)),
    ]
}

fn engine_error(e: rsa::Error) -> Error {
    debug!(error = %e, "rsa operation failed");
    Error::CryptoEngine
}

fn private_key(der: &[u8]) -> Result<RsaPrivateKey> {
    RsaPrivateKey::from_pkcs1_der(der).map_err(|_| Error::InvalidPrivateKey)
}

fn public_key(der: &[u8]) -> Result<RsaPublicKey> {
    RsaPublicKey::from_pkcs1_der(der).map_err(|_| Error::InvalidPublicKey)
}

fn generate_key(spec: &KeySpec) -> Result<Blob> {
    if !KEY_SIZES.contains(&spec.key_size) {
        return Err(Error::InvalidKeySize);
    }
    let key = RsaPrivateKey::new(&mut OsRng, spec.key_size as usize).map_err(engine_error)?;
    let der = key.to_pkcs1_der().map_err(|_| Error::CryptoEngine)?;
    Ok(Blob::from_slice(der.as_bytes()))
}

fn get_public_key(key: &[u8]) -> Result<Blob> {
    let der = private_key(key)?
        .to_public_key()
        .to_pkcs1_der()
        .map_err(|_| Error::CryptoEngine)?;
    Ok(Blob::from_slice(der.as_bytes()))
}

fn pkcs1_scheme(digest: Digest) -> Result<Pkcs1v15Sign> {
    Ok(match digest {
        Digest::None => Pkcs1v15Sign::new_unprefixed(),
        Digest::Sha224 => Pkcs1v15Sign::new::<Sha224>(),
        Digest::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        Digest::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
        Digest::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        _ => return Err(Error::InvalidDigest),
    })
}

fn pss_scheme(digest: Digest) -> Result<Pss> {
    Ok(match digest {
        Digest::Sha224 => Pss::new::<Sha224>(),
        Digest::Sha256 => Pss::new::<Sha256>(),
        Digest::Sha384 => Pss::new::<Sha384>(),
        Digest::Sha512 => Pss::new::<Sha512>(),
        _ => return Err(Error::InvalidDigest),
    })
}

fn oaep_scheme(digest: Digest) -> Result<Oaep> {
    Ok(match digest {
        Digest::Sha224 => Oaep::new::<Sha224>(),
        Digest::Sha256 => Oaep::new::<Sha256>(),
        Digest::Sha384 => Oaep::new::<Sha384>(),
        Digest::Sha512 => Oaep::new::<Sha512>(),
        _ => return Err(Error::InvalidDigest),
    })
}

fn check_prehash(digest: Digest, message: &[u8]) -> Result<()> {
    if digest != Digest::None && digest.output_len()? != message.len() {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn sign(key: &[u8], spec: &UsageSpec, message: &[u8]) -> Result<Blob> {
    check_prehash(spec.digest, message)?;
    let key = private_key(key)?;
    let signature = match spec.padding {
        Padding::Pkcs1V15 => key.sign(pkcs1_scheme(spec.digest)?, message),
        Padding::Pss => key.sign_with_rng(&mut OsRng, pss_scheme(spec.digest)?, message),
        _ => return Err(Error::InvalidPadding),
    }
    .map_err(engine_error)?;
    Ok(Blob::new(signature))
}

fn verify(public: &[u8], spec: &UsageSpec, message: &[u8], signature: &[u8]) -> Result<()> {
    check_prehash(spec.digest, message)?;
    let key = public_key(public)?;
    let verified = match spec.padding {
        Padding::Pkcs1V15 => key.verify(pkcs1_scheme(spec.digest)?, message, signature),
        Padding::Pss => key.verify(pss_scheme(spec.digest)?, message, signature),
        _ => return Err(Error::InvalidPadding),
    };
    verified.map_err(|_| Error::VerificationFailed)
}

fn encrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let key = public_key(key)?;
    let out = match spec.padding {
        Padding::Pkcs1V15 => key.encrypt(&mut OsRng, Pkcs1v15Encrypt, input),
        Padding::Oaep => key.encrypt(&mut OsRng, oaep_scheme(spec.digest)?, input),
        _ => return Err(Error::InvalidPadding),
    }
    .map_err(engine_error)?;
    Ok(Blob::new(out))
}

fn decrypt(key: &[u8], spec: &UsageSpec, input: &[u8]) -> Result<Blob> {
    let key = private_key(key)?;
    let out = match spec.padding {
        Padding::Pkcs1V15 => key.decrypt(Pkcs1v15Encrypt, input),
        Padding::Oaep => key.decrypt(oaep_scheme(spec.digest)?, input),
        _ => return Err(Error::InvalidPadding),
    }
    .map_err(engine_error)?;
    Ok(Blob::new(out))
}
