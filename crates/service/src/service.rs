//! Keystore service verbs.
//!
//! Every verb takes a [`ParamSet`] and returns a typed `Result`. The
//! boundary form (`ExternalResult` plus optional output) is produced by
//! [`ServiceResponse::from_result`], which is what the dispatcher hands to
//! callers.

use crate::device::DeviceSecrets;
use crate::key_blob::{self, KeyRecord};
use crate::keynode::{lock_node, SessionTable};
use crate::storage::{KeyStorage, MemoryKeyStorage};
use crate::three_stage::{is_public_only, Session};
use crate::wrapped::{self, WrappedKey};
use ed25519_dalek::{Signature, Signer, VerifyingKey};
use keystore_access::{check_key_creation_policy, now_millis, AuthPolicy, AuthRuntime};
use keystore_core::{
    convert_result, Algorithm, Blob, Digest, Error, ExternalResult, KeyFlag, KeyStorageFlag,
    KeystoreConfig, Param, ParamSet, Purpose, Result, Tag, UnwrapSuite,
};
use keystore_crypto::{hal, KeySpec};
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

pub const MAX_ALIAS_LEN: usize = 64;
pub const MAX_RANDOM_LEN: usize = 1024;
pub const KEY_VERSION: u32 = 1;

/// Request-only tags, never persisted with a key.
const TRANSIENT_TAGS: &[Tag] = &[
    Tag::KEY_ALIAS,
    Tag::KEY_STORAGE_FLAG,
    Tag::AUTH_TOKEN,
    Tag::CHALLENGE_POS,
    Tag::IV,
    Tag::NONCE,
    Tag::ASSOCIATED_DATA,
    Tag::AE_TAG,
    Tag::SALT,
    Tag::INFO,
    Tag::KEY,
    Tag::CRYPTO_CTX,
    Tag::AGREE_PUBLIC_KEY,
    Tag::UNWRAP_ALGORITHM_SUITE,
    Tag::ATTESTATION_CHALLENGE,
    Tag::ATTESTATION_APPLICATION_ID,
];

/// Tags only the service writes into a stored set.
const SERVICE_TAGS: &[Tag] = &[Tag::KEY_FLAG, Tag::CREATION_DATETIME, Tag::KEY_VERSION];

/// Result of a session Init.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutput {
    pub handle: u64,
    /// Challenge for the authenticator. Empty when the key has no auth
    /// policy or uses the `None` challenge type.
    pub challenge: Blob,
}

/// A verb outcome in boundary form.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse<T> {
    pub result: ExternalResult,
    pub output: Option<T>,
}

impl<T> ServiceResponse<T> {
    pub fn from_result(result: Result<T>) -> Self {
        Self {
            result: convert_result(&result),
            output: result.ok(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}

fn check_alias(alias: &[u8]) -> Result<()> {
    if alias.is_empty() || alias.len() > MAX_ALIAS_LEN {
        return Err(Error::InvalidArgument);
    }
    Ok(())
}

fn alias_str(alias: &[u8]) -> String {
    String::from_utf8_lossy(alias).into_owned()
}

fn read_purpose(params: &ParamSet) -> Result<Purpose> {
    Ok(Purpose::from_bits(
        params
            .get_u32(Tag::PURPOSE)
            .map_err(|_| Error::CheckGetPurposeFail)?,
    ))
}

fn read_algorithm(params: &ParamSet) -> Result<Algorithm> {
    Algorithm::try_from(
        params
            .get_u32(Tag::ALGORITHM)
            .map_err(|_| Error::CheckGetAlgFail)?,
    )
}

fn is_asymmetric(algorithm: Algorithm) -> bool {
    matches!(
        algorithm,
        Algorithm::Rsa | Algorithm::Ecc | Algorithm::Ed25519 | Algorithm::X25519
    )
}

/// `params` with PURPOSE forced to `purpose`.
fn with_purpose(params: &ParamSet, purpose: Purpose) -> Result<ParamSet> {
    let forced = ParamSet::from_params([Param::uint32(Tag::PURPOSE, purpose.bits())])?;
    ParamSet::merge(params, &forced)
}

/// Policy set persisted next to a key.
fn stored_policy(params: &ParamSet, flag: KeyFlag) -> Result<ParamSet> {
    let mut policy = params.clone();
    policy.delete_params(TRANSIENT_TAGS);
    policy.delete_params(SERVICE_TAGS);
    policy.push_trusted(Param::uint32(Tag::KEY_FLAG, flag.value()));
    policy.push_trusted(Param::uint64(Tag::CREATION_DATETIME, now_millis()));
    policy.push_trusted(Param::uint32(Tag::KEY_VERSION, KEY_VERSION));
    policy.refresh()?;
    Ok(policy)
}

fn check_key_creation(params: &ParamSet, max_timeout_secs: u32) -> Result<KeySpec> {
    let spec = KeySpec::from_params(params)?;
    let purpose = read_purpose(params)?;
    if purpose.is_empty() || !purpose.is_known() {
        return Err(Error::InvalidPurpose);
    }
    check_key_creation_policy(params, max_timeout_secs)?;
    Ok(spec)
}

fn check_import_material(spec: &KeySpec, params: &ParamSet, key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument);
    }
    match spec.algorithm {
        Algorithm::Aes => {
            if !matches!(spec.key_size, 128 | 192 | 256) || key.len() * 8 != spec.key_size as usize {
                return Err(Error::InvalidKeySize);
            }
        }
        Algorithm::Hmac => {
            if key.len() * 8 != spec.key_size as usize {
                return Err(Error::InvalidKeySize);
            }
        }
        alg if is_asymmetric(alg) => {
            if !is_public_only(params)? {
                // The engine parses the private key to derive its public half.
                hal::get_public_key(alg, key)?;
            }
        }
        _ => return Err(Error::InvalidAlgorithm),
    }
    Ok(())
}

/// Stored form of a derived or agreed secret: an AES key when the length
/// fits, an HMAC key otherwise.
fn derived_key_policy(runtime: &ParamSet, secret: &[u8], flag: KeyFlag) -> Result<ParamSet> {
    let (algorithm, purpose) = match secret.len() {
        16 | 24 | 32 => (Algorithm::Aes, Purpose::ENCRYPT | Purpose::DECRYPT),
        _ => (Algorithm::Hmac, Purpose::MAC),
    };
    let mut params = ParamSet::from_params([
        Param::uint32(Tag::ALGORITHM, algorithm.value()),
        Param::uint32(Tag::KEY_SIZE, (secret.len() * 8) as u32),
        Param::uint32(Tag::PURPOSE, purpose.bits()),
    ])?;
    if let Some(user) = runtime.find_u32(Tag::USER_ID)? {
        params.add(&[Param::uint32(Tag::USER_ID, user)])?;
        params.build()?;
    }
    stored_policy(&params, flag)
}

/// Alias a derive/agree session stores its output under, if any.
fn storage_target(session: &Session) -> Result<Option<Vec<u8>>> {
    if !matches!(session.purpose(), Purpose::DERIVE | Purpose::AGREE) {
        return Ok(None);
    }
    let params = session.params();
    let persistent = match params.find_u32(Tag::KEY_STORAGE_FLAG)? {
        Some(v) => KeyStorageFlag::try_from(v)? == KeyStorageFlag::Persistent,
        None => false,
    };
    if !persistent {
        return Ok(None);
    }
    let alias = params
        .find_bytes(Tag::KEY_ALIAS)?
        .ok_or(Error::InvalidArgument)?;
    check_alias(alias)?;
    Ok(Some(alias.to_vec()))
}

pub struct KeystoreService {
    config: KeystoreConfig,
    secrets: DeviceSecrets,
    storage: Arc<dyn KeyStorage>,
    sessions: SessionTable<Session>,
}

impl KeystoreService {
    /// Service over in-memory key storage.
    pub fn new(config: KeystoreConfig) -> Result<Self> {
        Self::with_storage(config, Arc::new(MemoryKeyStorage::new()))
    }

    pub fn with_storage(config: KeystoreConfig, storage: Arc<dyn KeyStorage>) -> Result<Self> {
        let registry = keystore_crypto::init_all();
        let secrets = match config.device.root_secret()? {
            Some(root) => DeviceSecrets::from_root_secret(&root)?,
            None => {
                warn!("no device root secret configured, using a per-process one");
                DeviceSecrets::ephemeral()?
            }
        };
        info!(
            abilities = registry.len(),
            max_sessions = config.session.max_sessions,
            "keystore service ready"
        );
        Ok(Self {
            sessions: SessionTable::new(config.session.max_sessions),
            config,
            secrets,
            storage,
        })
    }

    pub fn config(&self) -> &KeystoreConfig {
        &self.config
    }

    /// Key under which the device's authenticators MAC their tokens.
    pub fn auth_token_key(&self) -> &keystore_access::AuthTokenKey {
        self.secrets.auth_token_key()
    }

    pub fn attestation_public_key(&self) -> VerifyingKey {
        self.secrets.attestation_public_key()
    }

    pub fn live_sessions(&self) -> usize {
        self.sessions.len()
    }

    fn store_key(&self, alias: &[u8], policy: &ParamSet, key: &[u8]) -> Result<()> {
        let blob = key_blob::seal(policy, key, self.secrets.blob_key())?;
        self.storage.put(alias, blob)
    }

    fn load_key(&self, alias: &[u8]) -> Result<KeyRecord> {
        check_alias(alias)?;
        let blob = self.storage.get(alias)?;
        key_blob::open(&blob, self.secrets.blob_key())
    }

    pub fn generate_key(&self, alias: &[u8], params: &ParamSet) -> Result<ParamSet> {
        check_alias(alias)?;
        let spec = check_key_creation(params, self.config.auth.max_timeout_secs)?;
        let key = Zeroizing::new(hal::generate_key(&spec)?.into_vec());
        let policy = stored_policy(params, KeyFlag::Generated)?;
        self.store_key(alias, &policy, &key)?;
        info!(alias = %alias_str(alias), algorithm = ?spec.algorithm, bits = spec.key_size, "key generated");
        Ok(policy)
    }

    pub fn import_key(&self, alias: &[u8], params: &ParamSet, key: &[u8]) -> Result<ParamSet> {
        check_alias(alias)?;
        let spec = check_key_creation(params, self.config.auth.max_timeout_secs)?;
        check_import_material(&spec, params, key)?;
        let policy = stored_policy(params, KeyFlag::Imported)?;
        self.store_key(alias, &policy, key)?;
        info!(alias = %alias_str(alias), algorithm = ?spec.algorithm, "key imported");
        Ok(policy)
    }

    pub fn import_wrapped_key(
        &self,
        alias: &[u8],
        wrapping_alias: &[u8],
        params: &ParamSet,
        wrapped: &[u8],
    ) -> Result<ParamSet> {
        check_alias(alias)?;
        let suite = UnwrapSuite::try_from(
            params
                .get_u32(Tag::UNWRAP_ALGORITHM_SUITE)
                .map_err(|_| Error::InvalidArgument)?,
        )?;
        let wrapping = self.load_key(wrapping_alias)?;
        if !read_purpose(&wrapping.params)?.contains(Purpose::UNWRAP) {
            warn!(alias = %alias_str(wrapping_alias), "wrapping key lacks unwrap purpose");
            return Err(Error::InvalidPurpose);
        }
        if AuthPolicy::from_key_params(&wrapping.params)?.is_some() {
            return Err(Error::KeyAuthFailed);
        }
        let wrapped = WrappedKey::from_bytes(wrapped)?;
        let key = wrapped::unwrap(suite, read_algorithm(&wrapping.params)?, &wrapping.key, &wrapped)?;
        self.import_key(alias, params, &key)
    }

    pub fn export_public_key(&self, alias: &[u8]) -> Result<Blob> {
        let record = self.load_key(alias)?;
        let algorithm = read_algorithm(&record.params)?;
        if !is_asymmetric(algorithm) {
            return Err(Error::InvalidAlgorithm);
        }
        if is_public_only(&record.params)? {
            Ok(Blob::from_slice(&record.key))
        } else {
            hal::get_public_key(algorithm, &record.key)
        }
    }

    pub fn delete_key(&self, alias: &[u8]) -> Result<()> {
        check_alias(alias)?;
        self.storage.delete(alias)?;
        info!(alias = %alias_str(alias), "key deleted");
        Ok(())
    }

    pub fn get_key_param_set(&self, alias: &[u8]) -> Result<ParamSet> {
        Ok(self.load_key(alias)?.params)
    }

    pub fn key_exists(&self, alias: &[u8]) -> Result<()> {
        check_alias(alias)?;
        if self.storage.exists(alias) {
            Ok(())
        } else {
            Err(Error::NotExist)
        }
    }

    /// Build a session for `alias`. One-shot callers pass `one_shot`, which
    /// refuses keys that need user authentication.
    fn open_session(&self, alias: &[u8], params: &ParamSet, one_shot: bool, now_ms: u64) -> Result<Session> {
        let record = self.load_key(alias)?;
        let purpose = read_purpose(params)?;
        if !purpose.is_single() {
            return Err(Error::InvalidPurpose);
        }
        if !read_purpose(&record.params)?.contains(purpose) {
            warn!(alias = %alias_str(alias), requested = purpose.bits(), "purpose not allowed by key");
            return Err(Error::InvalidPurpose);
        }
        if !matches!(purpose, Purpose::DERIVE | Purpose::AGREE) {
            if let Some(alg) = params.find_u32(Tag::ALGORITHM)? {
                if alg != read_algorithm(&record.params)?.value() {
                    return Err(Error::InvalidAlgorithm);
                }
            }
        }

        let auth = if one_shot {
            if AuthPolicy::from_key_params(&record.params)?.is_some() {
                warn!(alias = %alias_str(alias), "one-shot call on an auth-bound key");
                return Err(Error::KeyAuthFailed);
            }
            None
        } else {
            AuthRuntime::init(
                &record.params,
                params,
                purpose,
                now_ms,
                self.config.auth.default_timeout_secs,
            )?
        };

        let runtime = ParamSet::merge(&record.params, params)?;
        Session::new(purpose, runtime, &record.params, record.key, auth, now_ms)
    }

    /// Finish `session`, storing a derived or agreed secret when asked to.
    fn complete(&self, session: &mut Session, params: &ParamSet, data: &[u8], now_ms: u64) -> Result<Blob> {
        let target = storage_target(session)?;
        let output = session.finish(params, data, self.secrets.auth_token_key(), now_ms)?;
        match target {
            None => Ok(output),
            Some(alias) => {
                let flag = if session.purpose() == Purpose::DERIVE {
                    KeyFlag::Derived
                } else {
                    KeyFlag::Agreed
                };
                let policy = derived_key_policy(session.params(), &output, flag)?;
                self.store_key(&alias, &policy, &output)?;
                info!(alias = %alias_str(&alias), ?flag, "session output stored as key");
                Ok(Blob::empty())
            }
        }
    }

    fn run_once(
        &self,
        alias: &[u8],
        params: &ParamSet,
        purpose: Purpose,
        update: Option<&[u8]>,
        finish: &[u8],
    ) -> Result<Blob> {
        let now = now_millis();
        let params = with_purpose(params, purpose)?;
        let mut session = self.open_session(alias, &params, true, now)?;
        if let Some(data) = update {
            session.update(&params, data, self.secrets.auth_token_key(), now)?;
        }
        self.complete(&mut session, &params, finish, now)
    }

    pub fn sign(&self, alias: &[u8], params: &ParamSet, data: &[u8]) -> Result<Blob> {
        self.run_once(alias, params, Purpose::SIGN, None, data)
    }

    pub fn verify(&self, alias: &[u8], params: &ParamSet, data: &[u8], signature: &[u8]) -> Result<()> {
        self.run_once(alias, params, Purpose::VERIFY, Some(data), signature)?;
        Ok(())
    }

    pub fn encrypt(&self, alias: &[u8], params: &ParamSet, data: &[u8]) -> Result<Blob> {
        self.run_once(alias, params, Purpose::ENCRYPT, None, data)
    }

    pub fn decrypt(&self, alias: &[u8], params: &ParamSet, data: &[u8]) -> Result<Blob> {
        self.run_once(alias, params, Purpose::DECRYPT, None, data)
    }

    pub fn agree_key(&self, alias: &[u8], params: &ParamSet, peer_public_key: &[u8]) -> Result<Blob> {
        if peer_public_key.is_empty() {
            return Err(Error::InvalidArgument);
        }
        self.run_once(alias, params, Purpose::AGREE, None, peer_public_key)
    }

    pub fn derive_key(&self, alias: &[u8], params: &ParamSet) -> Result<Blob> {
        self.run_once(alias, params, Purpose::DERIVE, None, &[])
    }

    pub fn mac(&self, alias: &[u8], params: &ParamSet, data: &[u8]) -> Result<Blob> {
        self.run_once(alias, params, Purpose::MAC, None, data)
    }

    pub fn hash(&self, params: &ParamSet, data: &[u8]) -> Result<Blob> {
        let digest = Digest::try_from(
            params
                .get_u32(Tag::DIGEST)
                .map_err(|_| Error::CheckGetDigestFail)?,
        )?;
        hal::hash(digest, data)
    }

    pub fn generate_random(&self, len: usize) -> Result<Blob> {
        if len == 0 || len > MAX_RANDOM_LEN {
            return Err(Error::InvalidArgument);
        }
        let mut out = vec![0u8; len];
        hal::fill_random(&mut out)?;
        Ok(Blob::new(out))
    }

    /// Attestation statement for an asymmetric key, signed by the device
    /// attestation key. Check it with [`verify_attestation`].
    pub fn attest_key(&self, alias: &[u8], params: &ParamSet) -> Result<ParamSet> {
        let challenge = params
            .get_bytes(Tag::ATTESTATION_CHALLENGE)
            .map_err(|_| Error::InvalidArgument)?
            .clone();
        let public_key = self.export_public_key(alias)?;
        let record = self.load_key(alias)?;
        let created = match record.params.find_u64(Tag::CREATION_DATETIME)? {
            Some(t) => t,
            None => now_millis(),
        };

        let mut statement = ParamSet::from_params([
            Param::uint32(Tag::ALGORITHM, read_algorithm(&record.params)?.value()),
            Param::bytes(Tag::ATTESTATION_PUBLIC_KEY, public_key),
            Param::bytes(Tag::ATTESTATION_CHALLENGE, challenge),
            Param::uint64(Tag::CREATION_DATETIME, created),
        ])?;
        if let Some(app_id) = params.find_bytes(Tag::ATTESTATION_APPLICATION_ID)? {
            statement.add(&[Param::bytes(Tag::ATTESTATION_APPLICATION_ID, app_id.clone())])?;
            statement.build()?;
        }

        let signature = self.secrets.attestation_key().sign(&statement.to_bytes());
        statement.add(&[Param::bytes(
            Tag::ATTESTATION_SIGNATURE,
            signature.to_bytes().to_vec(),
        )])?;
        statement.build()?;
        debug!(alias = %alias_str(alias), "key attested");
        Ok(statement)
    }

    pub fn init(&self, alias: &[u8], params: &ParamSet) -> Result<InitOutput> {
        let session = self.open_session(alias, params, false, now_millis())?;
        let challenge = session.challenge();
        let handle = self.sessions.insert(session)?;
        Ok(InitOutput { handle, challenge })
    }

    pub fn update(&self, handle: u64, params: &ParamSet, data: &[u8]) -> Result<Blob> {
        let node = self.sessions.get(handle)?;
        let mut session = lock_node(&node);
        session.update(params, data, self.secrets.auth_token_key(), now_millis())
    }

    /// Run the final step. The session is gone afterwards, whatever the
    /// outcome.
    pub fn finish(&self, handle: u64, params: &ParamSet, data: &[u8]) -> Result<Blob> {
        let node = self.sessions.remove(handle)?;
        let mut session = lock_node(&node);
        self.complete(&mut session, params, data, now_millis())
    }

    pub fn abort(&self, handle: u64, _params: &ParamSet) -> Result<()> {
        let node = self.sessions.remove(handle)?;
        lock_node(&node).abort();
        debug!(handle, "session aborted");
        Ok(())
    }

    pub fn bn_exp_mod(&self, a: &[u8], e: &[u8], n: &[u8]) -> Result<Blob> {
        if n.is_empty() {
            return Err(Error::InvalidArgument);
        }
        hal::bn_exp_mod(a, e, n)
    }
}

/// Check an [`KeystoreService::attest_key`] statement against the device
/// attestation public key.
pub fn verify_attestation(statement: &ParamSet, public_key: &VerifyingKey) -> Result<()> {
    let signature = Signature::from_slice(
        statement
            .get_bytes(Tag::ATTESTATION_SIGNATURE)
            .map_err(|_| Error::InvalidArgument)?,
    )
    .map_err(|_| Error::InvalidSignatureSize)?;
    let mut unsigned = statement.clone();
    unsigned.delete_params(&[Tag::ATTESTATION_SIGNATURE]);
    unsigned.build()?;
    public_key
        .verify_strict(&unsigned.to_bytes(), &signature)
        .map_err(|_| Error::VerificationFailed)
}
