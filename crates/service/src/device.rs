//! Device secrets derived from the root secret.
//!
//! Every long-lived service key is a BLAKE3 `derive_key` output under its own
//! context string, so no two purposes ever share key material.

use ed25519_dalek::{SigningKey, VerifyingKey};
use keystore_access::AuthTokenKey;
use keystore_core::{Error, Result};
use zeroize::Zeroizing;

const AUTH_TOKEN_CONTEXT: &str = "keystore device 2024 auth token mac key";
const KEY_BLOB_CONTEXT: &str = "keystore device 2024 key blob sealing key";
const ATTESTATION_CONTEXT: &str = "keystore device 2024 attestation ed25519 seed";

const MIN_ROOT_SECRET_LEN: usize = 16;

pub struct DeviceSecrets {
    auth_token_key: AuthTokenKey,
    blob_key: Zeroizing<[u8; 32]>,
    attestation_key: SigningKey,
}

impl DeviceSecrets {
    pub fn from_root_secret(root: &[u8]) -> Result<Self> {
        if root.len() < MIN_ROOT_SECRET_LEN {
            return Err(Error::InvalidArgument);
        }
        let mac_key = Zeroizing::new(blake3::derive_key(AUTH_TOKEN_CONTEXT, root));
        let seed = Zeroizing::new(blake3::derive_key(ATTESTATION_CONTEXT, root));
        Ok(Self {
            auth_token_key: AuthTokenKey::new(&*mac_key)?,
            blob_key: Zeroizing::new(blake3::derive_key(KEY_BLOB_CONTEXT, root)),
            attestation_key: SigningKey::from_bytes(&seed),
        })
    }

    /// Secrets for a device without a provisioned root: a fresh random root
    /// per process. Stored keys do not survive a restart.
    pub fn ephemeral() -> Result<Self> {
        let mut root = Zeroizing::new([0u8; 32]);
        keystore_crypto::hal::fill_random(&mut *root)?;
        Self::from_root_secret(&*root)
    }

    pub fn auth_token_key(&self) -> &AuthTokenKey {
        &self.auth_token_key
    }

    pub fn blob_key(&self) -> &[u8; 32] {
        &self.blob_key
    }

    pub fn attestation_key(&self) -> &SigningKey {
        &self.attestation_key
    }

    pub fn attestation_public_key(&self) -> VerifyingKey {
        self.attestation_key.verifying_key()
    }
}
