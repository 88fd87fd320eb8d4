//! Ed25519 signatures and X25519 agreement. Keys are raw 32-byte values.

use crate::ability::{Ability, OperationKind};
use crate::spec::{KeySpec, UsageSpec};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use keystore_core::{Algorithm, Blob, Error, Result};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

pub(crate) fn abilities() -> Vec<(OperationKind, u32, Ability)> {
    let ed = Algorithm::Ed25519.value();
    let x = Algorithm::X25519.value();
    vec![
        (OperationKind::GenerateKey, ed, Ability::GenerateKey(generate_key)),
        (OperationKind::GetPublicKey, ed, Ability::GetPublicKey(ed25519_public_key)),
        (OperationKind::Sign, ed, Ability::Sign(ed25519_sign)),
        (OperationKind::Verify, ed, Ability::Verify(ed25519_verify)),
        (OperationKind::GenerateKey, x, Ability::GenerateKey(generate_key)),
        (OperationKind::GetPublicKey, x, Ability::GetPublicKey(x25519_public_key)),
        (OperationKind::AgreeKey, x, Ability::Agree(x25519_agree)),
    ]
}

fn array32(bytes: &[u8], err: Error) -> Result<Zeroizing<[u8; 32]>> {
    let arr: [u8; 32] = bytes.try_into().map_err(|_| err)?;
    Ok(Zeroizing::new(arr))
}

fn generate_key(spec: &KeySpec) -> Result<Blob> {
    if spec.key_size != 256 {
        return Err(Error::InvalidKeySize);
    }
    let mut seed = vec![0u8; 32];
    super::random::fill_random(&mut seed)?;
    Ok(Blob::new(seed))
}

fn ed25519_public_key(key: &[u8]) -> Result<Blob> {
    let seed = array32(key, Error::InvalidPrivateKey)?;
    let signer = SigningKey::from_bytes(&seed);
    Ok(Blob::from_slice(signer.verifying_key().as_bytes()))
}

fn ed25519_sign(key: &[u8], _spec: &UsageSpec, message: &[u8]) -> Result<Blob> {
    let seed = array32(key, Error::InvalidPrivateKey)?;
    let signer = SigningKey::from_bytes(&seed);
    Ok(Blob::from_slice(&signer.sign(message).to_bytes()))
}

fn ed25519_verify(public: &[u8], _spec: &UsageSpec, message: &[u8], signature: &[u8]) -> Result<()> {
    let public: [u8; 32] = public.try_into().map_err(|_| Error::InvalidPublicKey)?;
    let verifier = VerifyingKey::from_bytes(&public).map_err(|_| Error::InvalidPublicKey)?;
    let signature = Signature::from_slice(signature).map_err(|_| Error::InvalidSignatureSize)?;
    verifier
        .verify(message, &signature)
        .map_err(|_| Error::VerificationFailed)
}

fn x25519_public_key(key: &[u8]) -> Result<Blob> {
    let secret = StaticSecret::from(*array32(key, Error::InvalidPrivateKey)?);
    Ok(Blob::from_slice(PublicKey::from(&secret).as_bytes()))
}

fn x25519_agree(private_key: &[u8], peer_public_key: &[u8]) -> Result<Blob> {
    let secret = StaticSecret::from(*array32(private_key, Error::InvalidPrivateKey)?);
    let peer: [u8; 32] = peer_public_key
        .try_into()
        .map_err(|_| Error::InvalidPublicKey)?;
    let shared = secret.diffie_hellman(&PublicKey::from(peer));
    if !shared.was_contributory() {
        return Err(Error::InvalidPublicKey);
    }
    Ok(Blob::from_slice(shared.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystore_core::Purpose;

    #[test]
    fn test_ed25519_sign_verify() {
        let seed = generate_key(&KeySpec::new(Algorithm::Ed25519, 256)).unwrap();
        let public = ed25519_public_key(&seed).unwrap();
        let spec = UsageSpec::new(Algorithm::Ed25519, Purpose::SIGN);
        let sig = ed25519_sign(&seed, &spec, b"full message").unwrap();
        assert_eq!(sig.len(), 64);
        ed25519_verify(&public, &spec, b"full message", &sig).unwrap();
        assert_eq!(
            ed25519_verify(&public, &spec, b"other message", &sig),
            Err(Error::VerificationFailed)
        );
    }

    #[test]
    fn test_x25519_agree() {
        let a = generate_key(&KeySpec::new(Algorithm::X25519, 256)).unwrap();
        let b = generate_key(&KeySpec::new(Algorithm::X25519, 256)).unwrap();
        let ab = x25519_agree(&a, &x25519_public_key(&b).unwrap()).unwrap();
        let ba = x25519_agree(&b, &x25519_public_key(&a).unwrap()).unwrap();
        assert_eq!(ab, ba);
    }

    #[test]
    fn test_x25519_rejects_low_order_point() {
        let a = generate_key(&KeySpec::new(Algorithm::X25519, 256)).unwrap();
        assert_eq!(x25519_agree(&a, &[0u8; 32]), Err(Error::InvalidPublicKey));
    }
}
