//! Access control for keys bound to user authentication.
//!
//! Three stages: [`check_key_creation_policy`] validates the policy when a
//! key is generated or imported, [`AuthRuntime::init`] captures per-session
//! state (challenge, access time) at Init, and [`AuthRuntime::verify`]
//! checks an auth token on Update/Finish.

use crate::auth_token::{AuthToken, AuthTokenKey, TOKEN_CHALLENGE_LEN};
use keystore_core::types::MAX_CHALLENGE_POS;
use keystore_core::{
    AuthAccessType, Blob, ChallengeType, Error, ParamSet, Purpose, Result, SecureSignType, Tag,
    UserAuthType,
};
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Bytes per custom-challenge slot.
pub const CHALLENGE_SLOT_LEN: usize = 8;

/// Secure-sign header version.
pub const SECURE_SIGN_VERSION: u32 = 0x0100_0001;
/// Serialized secure-sign header length.
pub const SECURE_SIGN_HEADER_LEN: usize = 24;

/// Authentication facts prepended to signed data by secure-sign keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecureSignHeader {
    pub user_auth_type: u32,
    pub authenticator_id: u64,
    pub credential_id: u64,
}

impl SecureSignHeader {
    pub fn from_token(token: &AuthToken) -> Self {
        Self {
            user_auth_type: token.auth_type,
            authenticator_id: token.enrolled_id,
            credential_id: token.credential_id,
        }
    }

    pub fn to_bytes(&self) -> [u8; SECURE_SIGN_HEADER_LEN] {
        let mut out = [0u8; SECURE_SIGN_HEADER_LEN];
        out[0..4].copy_from_slice(&SECURE_SIGN_VERSION.to_le_bytes());
        out[4..8].copy_from_slice(&self.user_auth_type.to_le_bytes());
        out[8..16].copy_from_slice(&self.authenticator_id.to_le_bytes());
        out[16..24].copy_from_slice(&self.credential_id.to_le_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECURE_SIGN_HEADER_LEN {
            return Err(Error::InvalidSignatureSize);
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let dword = |at: usize| {
            let mut b = [0u8; 8];
            b.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(b)
        };
        if word(0) != SECURE_SIGN_VERSION {
            return Err(Error::InvalidSignatureSize);
        }
        Ok(Self {
            user_auth_type: word(4),
            authenticator_id: dword(8),
            credential_id: dword(16),
        })
    }

    /// Split `header || signature` as produced by a secure-sign Finish.
    pub fn split(signed: &[u8]) -> Result<(Self, &[u8])> {
        if signed.len() <= SECURE_SIGN_HEADER_LEN {
            return Err(Error::InvalidSignatureSize);
        }
        let (header, signature) = signed.split_at(SECURE_SIGN_HEADER_LEN);
        Ok((Self::from_bytes(header)?, signature))
    }
}

/// Parse USER_AUTH_ENROLL_ID_INFO: `u32 count` then `count` x
/// `(u32 auth_type, u64 enrolled_id)`, little-endian.
pub fn parse_enroll_id_info(bytes: &[u8]) -> Result<Vec<(u32, u64)>> {
    const ENTRY: usize = 12;
    if bytes.len() < 4 {
        return Err(Error::InvalidArgument);
    }
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let body = &bytes[4..];
    if count.checked_mul(ENTRY) != Some(body.len()) {
        return Err(Error::InvalidArgument);
    }
    Ok(body
        .chunks_exact(ENTRY)
        .map(|c| {
            let mut id = [0u8; 8];
            id.copy_from_slice(&c[4..12]);
            (u32::from_le_bytes([c[0], c[1], c[2], c[3]]), u64::from_le_bytes(id))
        })
        .collect())
}

/// Encode enrollment entries in the USER_AUTH_ENROLL_ID_INFO layout.
pub fn encode_enroll_id_info(entries: &[(u32, u64)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + entries.len() * 12);
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for (auth_type, id) in entries {
        out.extend_from_slice(&auth_type.to_le_bytes());
        out.extend_from_slice(&id.to_le_bytes());
    }
    out
}

/// Auth policy stored with a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthPolicy {
    pub auth_type: UserAuthType,
    pub challenge_type: ChallengeType,
    pub timeout_secs: Option<u32>,
    pub access_type: AuthAccessType,
    pub secure_sign: bool,
    pub secure_uid: Option<u64>,
    pub enrolled_ids: Vec<(u32, u64)>,
}

impl AuthPolicy {
    /// Policy of a stored key, or `None` when the key needs no user auth.
    pub fn from_key_params(params: &ParamSet) -> Result<Option<Self>> {
        let auth_type = match params.find_u32(Tag::USER_AUTH_TYPE)? {
            Some(bits) => UserAuthType::from_bits(bits),
            None => return Ok(None),
        };
        let challenge_type = ChallengeType::try_from(
            params
                .get_u32(Tag::CHALLENGE_TYPE)
                .map_err(|_| Error::BadState)?,
        )?;
        let access_type = AuthAccessType::from_bits(
            params
                .get_u32(Tag::KEY_AUTH_ACCESS_TYPE)
                .map_err(|_| Error::BadState)?,
        );
        let secure_uid = match params.find_bytes(Tag::USER_AUTH_SECURE_UID)? {
            Some(b) => Some(read_secure_uid(b)?),
            None => None,
        };
        let enrolled_ids = match params.find_bytes(Tag::USER_AUTH_ENROLL_ID_INFO)? {
            Some(b) => parse_enroll_id_info(b)?,
            None => Vec::new(),
        };
        Ok(Some(Self {
            auth_type,
            challenge_type,
            timeout_secs: params.find_u32(Tag::AUTH_TIMEOUT)?,
            access_type,
            secure_sign: params.find_u32(Tag::KEY_SECURE_SIGN_TYPE)?.is_some(),
            secure_uid,
            enrolled_ids,
        }))
    }
}

fn read_secure_uid(bytes: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| Error::InvalidArgument)?;
    Ok(u64::from_le_bytes(arr))
}

/// Validate the auth policy carried by generate/import parameters.
pub fn check_key_creation_policy(params: &ParamSet, max_timeout_secs: u32) -> Result<()> {
    let auth_bits = match params.get_u32(Tag::USER_AUTH_TYPE) {
        Ok(bits) => bits,
        Err(Error::ParamNotExist) => {
            if params.contains(Tag::KEY_SECURE_SIGN_TYPE) {
                warn!("secure sign requested without user auth");
                return Err(Error::InvalidSecureSignType);
            }
            return Ok(());
        }
        Err(_) => return Err(Error::CheckGetAuthTypeFailed),
    };
    let auth_type = UserAuthType::from_bits(auth_bits);
    if auth_type.is_empty() || !auth_type.is_known() {
        return Err(Error::InvalidAuthType);
    }

    let challenge_type = ChallengeType::try_from(
        params
            .get_u32(Tag::CHALLENGE_TYPE)
            .map_err(|_| Error::CheckGetChallengeTypeFailed)?,
    )?;

    match params.find_u32(Tag::AUTH_TIMEOUT) {
        Ok(Some(t)) if t > max_timeout_secs => return Err(Error::InvalidTimeOut),
        Ok(Some(_)) => {}
        Ok(None) if challenge_type == ChallengeType::None => return Err(Error::InvalidTimeOut),
        Ok(None) => {}
        Err(_) => return Err(Error::InvalidTimeOut),
    }

    let access_type = AuthAccessType::from_bits(
        params
            .get_u32(Tag::KEY_AUTH_ACCESS_TYPE)
            .map_err(|_| Error::CheckGetAccessTypeFailed)?,
    );
    if access_type.is_empty() || !access_type.is_known() {
        return Err(Error::InvalidAccessType);
    }
    if access_type.contains(AuthAccessType::INVALID_NEW_BIO_ENROLL)
        && !auth_type.intersects(UserAuthType::BIOMETRIC)
    {
        return Err(Error::InvalidAccessType);
    }
    if access_type.contains(AuthAccessType::INVALID_CLEAR_PASSWORD) {
        let uid = params
            .find_bytes(Tag::USER_AUTH_SECURE_UID)?
            .ok_or(Error::InvalidArgument)?;
        read_secure_uid(uid)?;
    }
    if access_type.contains(AuthAccessType::INVALID_NEW_BIO_ENROLL) {
        let info = params
            .find_bytes(Tag::USER_AUTH_ENROLL_ID_INFO)?
            .ok_or(Error::InvalidArgument)?;
        parse_enroll_id_info(info)?;
    }

    if let Some(raw) = params.find_u32(Tag::KEY_SECURE_SIGN_TYPE)? {
        SecureSignType::try_from(raw)?;
        let purpose = Purpose::from_bits(params.get_u32(Tag::PURPOSE).map_err(|_| Error::CheckGetPurposeFail)?);
        if !purpose.intersects(Purpose::SIGN | Purpose::VERIFY) {
            return Err(Error::InvalidSecureSignType);
        }
    }
    Ok(())
}

/// Outcome of token verification within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// No token verified yet.
    Init,
    Success,
    /// A verification failed; every later call fails too.
    Failed,
}

/// Per-session authentication state.
#[derive(Debug, Clone)]
pub struct AuthRuntime {
    policy: AuthPolicy,
    challenge: [u8; TOKEN_CHALLENGE_LEN],
    challenge_pos: u32,
    access_time_secs: u64,
    default_timeout_secs: u32,
    secure_sign: bool,
    result: AuthResult,
    header: Option<SecureSignHeader>,
    header_consumed: bool,
}

impl AuthRuntime {
    /// Capture auth state at Init. Returns `None` for keys without an auth
    /// policy.
    pub fn init(
        key_params: &ParamSet,
        init_params: &ParamSet,
        purpose: Purpose,
        now_ms: u64,
        default_timeout_secs: u32,
    ) -> Result<Option<Self>> {
        let policy = match AuthPolicy::from_key_params(key_params)? {
            Some(p) => p,
            None => return Ok(None),
        };

        let challenge_pos = match policy.challenge_type {
            ChallengeType::Custom => {
                let pos = init_params
                    .get_u32(Tag::CHALLENGE_POS)
                    .map_err(|_| Error::InvalidArgument)?;
                if pos > MAX_CHALLENGE_POS {
                    return Err(Error::InvalidArgument);
                }
                pos
            }
            _ => 0,
        };

        let mut challenge = [0u8; TOKEN_CHALLENGE_LEN];
        keystore_crypto::hal::fill_random(&mut challenge)?;

        let secure_sign =
            policy.secure_sign && (purpose == Purpose::SIGN || purpose == Purpose::VERIFY);
        debug!(
            challenge_type = ?policy.challenge_type,
            secure_sign,
            "auth runtime initialized"
        );
        Ok(Some(Self {
            policy,
            challenge,
            challenge_pos,
            access_time_secs: now_ms / 1000,
            default_timeout_secs,
            secure_sign,
            result: AuthResult::Init,
            header: None,
            header_consumed: false,
        }))
    }

    /// Challenge handed back to the caller from Init. Empty for keys whose
    /// challenge type is `None`.
    pub fn challenge(&self) -> Blob {
        match self.policy.challenge_type {
            ChallengeType::None => Blob::empty(),
            _ => Blob::from_slice(&self.challenge),
        }
    }

    pub fn result(&self) -> AuthResult {
        self.result
    }

    pub fn access_time_secs(&self) -> u64 {
        self.access_time_secs
    }

    pub fn is_secure_sign(&self) -> bool {
        self.secure_sign
    }

    pub fn policy(&self) -> &AuthPolicy {
        &self.policy
    }

    /// Verify the AUTH_TOKEN carried by `params`, once per session.
    ///
    /// After one success further calls pass without a token. After a
    /// failure every call reports `KeyAuthFailed`.
    pub fn verify(&mut self, params: &ParamSet, key: &AuthTokenKey, now_ms: u64) -> Result<()> {
        match self.result {
            AuthResult::Success => return Ok(()),
            AuthResult::Failed => return Err(Error::KeyAuthFailed),
            AuthResult::Init => {}
        }
        match self.check_token(params, key, now_ms) {
            Ok(token) => {
                self.result = AuthResult::Success;
                if self.secure_sign {
                    self.header = Some(SecureSignHeader::from_token(&token));
                }
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "auth token rejected");
                self.result = AuthResult::Failed;
                Err(e)
            }
        }
    }

    fn check_token(&self, params: &ParamSet, key: &AuthTokenKey, now_ms: u64) -> Result<AuthToken> {
        let raw = params
            .get_bytes(Tag::AUTH_TOKEN)
            .map_err(|_| Error::CheckGetAuthTokenFailed)?;
        let token = AuthToken::from_bytes(raw)?;
        key.verify(&token)?;

        if UserAuthType::from_bits(token.auth_type).bits() & self.policy.auth_type.bits() == 0 {
            return Err(Error::UserAuthTypeNotSupport);
        }

        match self.policy.challenge_type {
            ChallengeType::Normal => {
                if !bool::from(token.challenge[..].ct_eq(&self.challenge[..])) {
                    return Err(Error::KeyAuthFailed);
                }
            }
            ChallengeType::Custom => {
                let at = self.challenge_pos as usize * CHALLENGE_SLOT_LEN;
                let range = at..at + CHALLENGE_SLOT_LEN;
                if !bool::from(token.challenge[range.clone()].ct_eq(&self.challenge[range])) {
                    return Err(Error::KeyAuthFailed);
                }
            }
            ChallengeType::None => {}
        }

        let timeout = match (self.policy.timeout_secs, self.policy.challenge_type) {
            (Some(t), _) => Some(t),
            (None, ChallengeType::None) => Some(self.default_timeout_secs),
            (None, _) => None,
        };
        if let Some(timeout) = timeout {
            if now_ms.abs_diff(token.time) > u64::from(timeout) * 1000 {
                return Err(Error::KeyAuthTimeOut);
            }
        }

        if self
            .policy
            .access_type
            .contains(AuthAccessType::INVALID_CLEAR_PASSWORD)
        {
            let uid = self.policy.secure_uid.ok_or(Error::BadState)?;
            if uid != token.secure_uid {
                return Err(Error::KeyAuthPermanentlyInvalidated);
            }
        }

        let token_type = UserAuthType::from_bits(token.auth_type);
        if self.policy.auth_type.intersects(UserAuthType::BIOMETRIC)
            && self
                .policy
                .access_type
                .contains(AuthAccessType::INVALID_NEW_BIO_ENROLL)
            && !self
                .policy
                .enrolled_ids
                .iter()
                .any(|&(t, id)| t == token_type.bits() && id == token.enrolled_id)
        {
            return Err(Error::KeyAuthPermanentlyInvalidated);
        }

        Ok(token)
    }

    /// The verified token's header, still to be prepended to signed data.
    /// Returns it once; later calls return `None`.
    pub fn take_sign_header(&mut self) -> Option<[u8; SECURE_SIGN_HEADER_LEN]> {
        if self.header_consumed {
            return None;
        }
        let header = self.header?;
        self.header_consumed = true;
        Some(header.to_bytes())
    }
}

impl Drop for AuthRuntime {
    fn drop(&mut self) {
        self.challenge.zeroize();
    }
}
