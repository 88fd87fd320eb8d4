//! User-authentication tokens.
//!
//! A token is a packed little-endian record produced by an authenticator
//! (fingerprint, face or PIN) after a successful authentication event:
//!
//! ```text
//! version u32 | challenge [32] | secure_uid u64 | enrolled_id u64 |
//! credential_id u64 | time u64 (ms) | auth_trust_level u32 | auth_type u32 |
//! auth_mode u32 | security_level u32 | sign [32]
//! ```
//!
//! `sign` is HMAC-SHA256 over every preceding byte, keyed with a key derived
//! from the device root secret.

use hmac::{Hmac, Mac};
use keystore_core::{Error, Result};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;
use zeroize::Zeroize;

type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_CHALLENGE_LEN: usize = 32;
pub const AUTH_TOKEN_MAC_LEN: usize = 32;
/// Serialized token length.
pub const AUTH_TOKEN_LEN: usize = 116;
/// Bytes covered by the MAC.
pub const AUTH_TOKEN_SIGNED_LEN: usize = AUTH_TOKEN_LEN - AUTH_TOKEN_MAC_LEN;

#[derive(Debug, Clone, PartialEq, Eq, Default, Zeroize)]
pub struct AuthToken {
    pub version: u32,
    pub challenge: [u8; TOKEN_CHALLENGE_LEN],
    pub secure_uid: u64,
    pub enrolled_id: u64,
    pub credential_id: u64,
    /// Authentication time, milliseconds since the Unix epoch.
    pub time: u64,
    pub auth_trust_level: u32,
    /// `UserAuthType` bits of the authenticator that produced the token.
    pub auth_type: u32,
    pub auth_mode: u32,
    pub security_level: u32,
    pub sign: [u8; AUTH_TOKEN_MAC_LEN],
}

struct Reader<'a> {
    bytes: &'a [u8],
    at: usize,
}

impl<'a> Reader<'a> {
    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bytes[self.at..self.at + N]);
        self.at += N;
        out
    }

    fn u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    fn u64(&mut self) -> u64 {
        u64::from_le_bytes(self.take())
    }
}

impl AuthToken {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != AUTH_TOKEN_LEN {
            warn!(len = bytes.len(), "auth token has wrong size");
            return Err(Error::InvalidAuthToken);
        }
        let mut r = Reader { bytes, at: 0 };
        Ok(Self {
            version: r.u32(),
            challenge: r.take(),
            secure_uid: r.u64(),
            enrolled_id: r.u64(),
            credential_id: r.u64(),
            time: r.u64(),
            auth_trust_level: r.u32(),
            auth_type: r.u32(),
            auth_mode: r.u32(),
            security_level: r.u32(),
            sign: r.take(),
        })
    }

    pub fn to_bytes(&self) -> [u8; AUTH_TOKEN_LEN] {
        let mut out = [0u8; AUTH_TOKEN_LEN];
        let mut at = 0;
        let mut put = |bytes: &[u8]| {
            out[at..at + bytes.len()].copy_from_slice(bytes);
            at += bytes.len();
        };
        put(&self.version.to_le_bytes());
        put(&self.challenge);
        put(&self.secure_uid.to_le_bytes());
        put(&self.enrolled_id.to_le_bytes());
        put(&self.credential_id.to_le_bytes());
        put(&self.time.to_le_bytes());
        put(&self.auth_trust_level.to_le_bytes());
        put(&self.auth_type.to_le_bytes());
        put(&self.auth_mode.to_le_bytes());
        put(&self.security_level.to_le_bytes());
        put(&self.sign);
        out
    }
}

/// MAC key shared by the verifier and the authenticators it trusts.
#[derive(Clone)]
pub struct AuthTokenKey {
    keyed: HmacSha256,
}

impl AuthTokenKey {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        let keyed = <HmacSha256 as Mac>::new_from_slice(key).map_err(|_| Error::InvalidArgument)?;
        Ok(Self { keyed })
    }

    pub fn compute(&self, token: &AuthToken) -> [u8; AUTH_TOKEN_MAC_LEN] {
        let mut mac = self.keyed.clone();
        mac.update(&token.to_bytes()[..AUTH_TOKEN_SIGNED_LEN]);
        mac.finalize().into_bytes().into()
    }

    /// Constant-time MAC check.
    pub fn verify(&self, token: &AuthToken) -> Result<()> {
        let mut mac = self.keyed.clone();
        mac.update(&token.to_bytes()[..AUTH_TOKEN_SIGNED_LEN]);
        mac.verify_slice(&token.sign).map_err(|_| {
            warn!("auth token MAC mismatch");
            Error::KeyAuthVerifyFailed
        })
    }
}

/// Signs tokens for an authenticator.
pub struct AuthTokenIssuer {
    key: AuthTokenKey,
}

impl AuthTokenIssuer {
    pub fn new(key: AuthTokenKey) -> Self {
        Self { key }
    }

    /// Fill in `sign` over the token's other fields.
    pub fn issue(&self, mut token: AuthToken) -> AuthToken {
        token.sign = self.key.compute(&token);
        token
    }
}

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> AuthToken {
        AuthToken {
            version: 1,
            challenge: [5u8; 32],
            secure_uid: 0x1122_3344_5566_7788,
            enrolled_id: 9,
            credential_id: 10,
            time: 1_700_000_000_000,
            auth_trust_level: 3,
            auth_type: 4,
            auth_mode: 0,
            security_level: 2,
            sign: [0u8; 32],
        }
    }

    #[test]
    fn test_layout() {
        let bytes = sample().to_bytes();
        assert_eq!(bytes.len(), 116);
        assert_eq!(&bytes[36..44], &0x1122_3344_5566_7788u64.to_le_bytes());
        assert_eq!(&bytes[76..80], &4u32.to_le_bytes());
        assert_eq!(AuthToken::from_bytes(&bytes).unwrap(), sample());
    }

    #[test]
    fn test_wrong_size() {
        assert_eq!(AuthToken::from_bytes(&[0u8; 115]), Err(Error::InvalidAuthToken));
        assert_eq!(AuthToken::from_bytes(&[0u8; 148]), Err(Error::InvalidAuthToken));
    }

    #[test]
    fn test_issue_and_verify() {
        let key = AuthTokenKey::new(&[7u8; 32]).unwrap();
        let token = AuthTokenIssuer::new(AuthTokenKey::new(&[7u8; 32]).unwrap()).issue(sample());
        key.verify(&token).unwrap();

        let other = AuthTokenKey::new(&[8u8; 32]).unwrap();
        assert_eq!(other.verify(&token), Err(Error::KeyAuthVerifyFailed));
    }

    #[test]
    fn test_any_field_change_breaks_mac() {
        let key = AuthTokenKey::new(&[7u8; 32]).unwrap();
        let token = AuthTokenIssuer::new(AuthTokenKey::new(&[7u8; 32]).unwrap()).issue(sample());
        let mut bytes = token.to_bytes();
        for i in 0..AUTH_TOKEN_LEN {
            bytes[i] ^= 0x01;
            let tampered = AuthToken::from_bytes(&bytes).unwrap();
            assert_eq!(key.verify(&tampered), Err(Error::KeyAuthVerifyFailed), "byte {i}");
            bytes[i] ^= 0x01;
        }
    }
}
