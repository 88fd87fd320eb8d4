//! NIST P-256: ECDSA over a prehash and ECDH.
//!
//! Private keys are 32-byte scalars, public keys uncompressed SEC1 points,
//! signatures ASN.1 DER.

use crate::ability::{Ability, OperationKind};
use crate::spec::{KeySpec, UsageSpec};
use keystore_core::{Algorithm, Blob, Digest, Error, Result};
use p256::ecdsa::signature::hazmat::{PrehashSigner, PrehashVerifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::elliptic_curve::rand_core::OsRng;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    let alg = Algorithm::Ecc.value();
    vec![
        (OperationKind::GenerateKey, alg, Ability::GenerateKey(generate_key)),
        (OperationKind::GetPublicKey, alg, Ability::GetPublicKey(get_public_key)),
        (OperationKind::Sign, alg, Ability::Sign(sign)),
        (OperationKind::Verify, alg, Ability::Verify(verify)),
        (OperationKind::AgreeKey, Algorithm::Ecdh.value(), Ability::Agree(agree)),
    ]
}

fn secret_key(key: &[u8]) -> Result<SecretKey> {
    if key.len() != 32 {
        return Err(Error::InvalidPrivateKey);
    }
    SecretKey::from_slice(key).map_err(|_| Error::InvalidPrivateKey)
}

fn generate_key(spec: &KeySpec) -> Result<Blob> {
    if spec.key_size != 256 {
        return Err(Error::InvalidKeySize);
    }
    let key = SecretKey::random(&mut OsRng);
    Ok(Blob::from_slice(&key.to_bytes()))
}

fn get_public_key(key: &[u8]) -> Result<Blob> {
    let point = secret_key(key)?.public_key().to_encoded_point(false);
    Ok(Blob::from_slice(point.as_bytes()))
}

fn check_prehash(digest: Digest, message: &[u8]) -> Result<()> {
    match digest {
        Digest::None if message.len() < 16 => Err(Error::InvalidArgument),
        Digest::None => Ok(()),
        d if d.output_len()? != message.len() => Err(Error::InvalidArgument),
        _ => Ok(()),
    }
}

fn sign(key: &[u8], spec: &UsageSpec, message: &[u8]) -> Result<Blob> {
    check_prehash(spec.digest, message)?;
    let signer = SigningKey::from(secret_key(key)?);
    let signature: Signature = signer
        .sign_prehash(message)
        .map_err(|_| Error::CryptoEngine)?;
    Ok(Blob::from_slice(signature.to_der().as_bytes()))
}

fn verify(public: &[u8], spec: &UsageSpec, message: &[u8], signature: &[u8]) -> Result<()> {
    check_prehash(spec.digest, message)?;
    let verifier = VerifyingKey::from_sec1_bytes(public).map_err(|_| Error::InvalidPublicKey)?;
    let signature = Signature::from_der(signature).map_err(|_| Error::InvalidSignatureSize)?;
    verifier
        .verify_prehash(message, &signature)
        .map_err(|_| Error::VerificationFailed)
}

fn agree(private_key: &[u8], peer_public_key: &[u8]) -> Result<Blob> {
    let secret = secret_key(private_key)?;
    let peer = PublicKey::from_sec1_bytes(peer_public_key).map_err(|_| Error::InvalidPublicKey)?;
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), peer.as_affine());
    Ok(Blob::from_slice(shared.raw_secret_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystore_core::Purpose;

    #[test]
    fn test_sign_verify_prehash() {
        let private = generate_key(&KeySpec::new(Algorithm::Ecc, 256)).unwrap();
        let public = get_public_key(&private).unwrap();
        assert_eq!(public.len(), 65);

        let spec = UsageSpec::new(Algorithm::Ecc, Purpose::SIGN).with_digest(Digest::Sha256);
        let prehash = super::super::hash::hash(Digest::Sha256, b"message").unwrap();
        let sig = sign(&private, &spec, &prehash).unwrap();
        verify(&public, &spec, &prehash, &sig).unwrap();

        let mut tampered = prehash.to_vec();
        tampered[0] ^= 0xFF;
        assert_eq!(
            verify(&public, &spec, &tampered, &sig),
            Err(Error::VerificationFailed)
        );
    }

    #[test]
    fn test_ecdh_agrees() {
        let a = generate_key(&KeySpec::new(Algorithm::Ecc, 256)).unwrap();
        let b = generate_key(&KeySpec::new(Algorithm::Ecc, 256)).unwrap();
        let ab = agree(&a, &get_public_key(&b).unwrap()).unwrap();
        let ba = agree(&b, &get_public_key(&a).unwrap()).unwrap();
        assert_eq!(ab, ba);
        assert_eq!(ab.len(), 32);
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert_eq!(get_public_key(&[0u8; 31]), Err(Error::InvalidPrivateKey));
        let a = generate_key(&KeySpec::new(Algorithm::Ecc, 256)).unwrap();
        assert_eq!(agree(&a, &[4u8; 65]), Err(Error::InvalidPublicKey));
        assert!(generate_key(&KeySpec::new(Algorithm::Ecc, 384)).is_err());
    }
}
