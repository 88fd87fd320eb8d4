//! Fixtures shared by the end-to-end tests

use keystore_access::{now_millis, AuthToken, AuthTokenIssuer};
use keystore_core::{logging, KeystoreConfig, Param, ParamSet, Tag, UserAuthType};
use keystore_service::KeystoreService;

/// Fixed root so failures reproduce across runs
pub const TEST_ROOT_SECRET: &str =
    "6b657973746f72652d696e746567726174696f6e2d726f6f742d736563726574";

/// Install the keystore subscriber once; later calls are no-ops
pub fn init_tracing() {
    logging::try_init_from_config(&KeystoreConfig::default_config().logging);
}

pub fn test_service() -> KeystoreService {
    test_service_with_sessions(KeystoreConfig::default_config().session.max_sessions)
}

pub fn test_service_with_sessions(max_sessions: usize) -> KeystoreService {
    init_tracing();
    let mut config = KeystoreConfig::default_config();
    config.session.max_sessions = max_sessions;
    config.device.root_secret_hex = Some(TEST_ROOT_SECRET.to_string());
    tracing::debug!(max_sessions, "starting test keystore");
    KeystoreService::new(config).expect("service starts")
}

pub fn params(entries: Vec<Param>) -> ParamSet {
    ParamSet::from_params(entries).expect("valid test params")
}

/// A simulated authenticator that MACs tokens with the device key
pub struct TestAuthenticator {
    issuer: AuthTokenIssuer,
    pub auth_type: UserAuthType,
    pub secure_uid: u64,
    pub enrolled_id: u64,
    pub credential_id: u64,
}

impl TestAuthenticator {
    pub fn new(service: &KeystoreService, auth_type: UserAuthType) -> Self {
        Self {
            issuer: AuthTokenIssuer::new(service.auth_token_key().clone()),
            auth_type,
            secure_uid: 0x5EC0_0001,
            enrolled_id: 0xE1,
            credential_id: 0xC4,
        }
    }

    /// Token answering `challenge`, authenticated `age_ms` ago
    pub fn token(&self, challenge: &[u8], age_ms: u64) -> AuthToken {
        let mut token = AuthToken {
            version: 1,
            secure_uid: self.secure_uid,
            enrolled_id: self.enrolled_id,
            credential_id: self.credential_id,
            time: now_millis() - age_ms,
            auth_type: self.auth_type.bits(),
            ..Default::default()
        };
        let len = challenge.len().min(token.challenge.len());
        token.challenge[..len].copy_from_slice(&challenge[..len]);
        self.issuer.issue(token)
    }

    /// Token wrapped in the AUTH_TOKEN parameter
    pub fn token_params(&self, challenge: &[u8], age_ms: u64) -> ParamSet {
        let token = self.token(challenge, age_ms);
        params(vec![Param::bytes(Tag::AUTH_TOKEN, token.to_bytes().to_vec())])
    }
}
