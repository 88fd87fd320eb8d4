//! User-authentication access control for keystore keys.
//!
//! Keys created with a `USER_AUTH_TYPE` can only be used inside a session
//! after an authenticator-issued [`AuthToken`] has been verified against the
//! session's challenge and the key's policy.

pub mod auth_token;
pub mod secure_access;

pub use auth_token::{
    now_millis, AuthToken, AuthTokenIssuer, AuthTokenKey, AUTH_TOKEN_LEN, TOKEN_CHALLENGE_LEN,
};
pub use secure_access::{
    check_key_creation_policy, encode_enroll_id_info, parse_enroll_id_info, AuthPolicy,
    AuthResult, AuthRuntime, SecureSignHeader, SECURE_SIGN_HEADER_LEN,
};
