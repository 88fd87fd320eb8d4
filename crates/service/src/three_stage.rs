//! Init/Update/Finish/Abort behavior per key purpose.
//!
//! A [`Session`] owns the crypto context of one operation. The context is
//! released exactly once: by `finish`, by `abort`, or when the session is
//! dropped. Releasing leaves an [`Operation::Released`] tombstone behind, so a
//! late call on a session another thread already finished reports
//! `NotExist`.

use keystore_access::{AuthRuntime, AuthTokenKey, SecureSignHeader, SECURE_SIGN_HEADER_LEN};
use keystore_core::{
    Algorithm, Blob, Error, ImportKeyType, ParamSet, Purpose, Result, Tag,
};
use keystore_crypto::hal::{self, CipherOps, DigestOps};
use keystore_crypto::{CryptoCtx, DeriveSpec, UsageSpec};
use tracing::{debug, warn};
use zeroize::Zeroizing;

pub use keystore_core::MAX_CACHED_DATA;

/// Position of a live session in its lifecycle. Terminal sessions are gone
/// from the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// After Init, before any Update.
    Created,
    /// At least one Update accepted.
    Active,
}

fn cache_append(cache: &mut Zeroizing<Vec<u8>>, data: &[u8]) -> Result<()> {
    if cache.len() + data.len() > MAX_CACHED_DATA {
        warn!(cached = cache.len(), adding = data.len(), "session cache limit exceeded");
        return Err(Error::InvalidArgument);
    }
    cache.extend_from_slice(data);
    Ok(())
}

/// Where a signed or verified message accumulates.
enum MessageSink {
    Digest { ctx: CryptoCtx, ops: DigestOps },
    Cache(Zeroizing<Vec<u8>>),
}

impl MessageSink {
    fn new(spec: &UsageSpec, force_cache: bool) -> Result<Self> {
        if force_cache || hal::signs_full_message(spec.algorithm, spec.digest) {
            return Ok(MessageSink::Cache(Zeroizing::new(Vec::new())));
        }
        let (ctx, ops) = hal::hash_init(spec.digest)?;
        Ok(MessageSink::Digest { ctx, ops })
    }

    fn feed(&mut self, data: &[u8]) -> Result<()> {
        match self {
            MessageSink::Digest { ctx, ops } => (ops.update)(ctx, data),
            MessageSink::Cache(cache) => cache_append(cache, data),
        }
    }

    fn prepend(&mut self, prefix: &[u8]) -> Result<()> {
        match self {
            MessageSink::Cache(cache) => {
                if cache.len() + prefix.len() > MAX_CACHED_DATA {
                    return Err(Error::InvalidArgument);
                }
                cache.splice(0..0, prefix.iter().copied());
                Ok(())
            }
            MessageSink::Digest { .. } => Err(Error::BadState),
        }
    }

    /// The message in the form the sign/verify ability expects.
    fn finish(self, spec: &UsageSpec) -> Result<Blob> {
        match self {
            MessageSink::Digest { ctx, ops } => (ops.finish)(ctx, &[]),
            MessageSink::Cache(cache) => hal::prepare_message(spec, &cache),
        }
    }

    fn free(self) {
        if let MessageSink::Digest { ctx, ops } = self {
            (ops.free)(ctx);
        }
    }
}

struct SignOp {
    spec: UsageSpec,
    /// Private key for signing, public key for verifying.
    key: Zeroizing<Vec<u8>>,
    sink: MessageSink,
    /// Secure-sign header already fed into the message.
    header: Option<[u8; SECURE_SIGN_HEADER_LEN]>,
    secure_sign: bool,
}

enum CipherOp {
    Staged {
        ops: CipherOps,
        ctx: CryptoCtx,
    },
    /// Algorithms without staged support run once at Finish.
    OneShot {
        spec: UsageSpec,
        key: Zeroizing<Vec<u8>>,
        encrypt: bool,
        cache: Zeroizing<Vec<u8>>,
    },
}

struct DeriveOp {
    spec: DeriveSpec,
    key: Zeroizing<Vec<u8>>,
    output: Option<Blob>,
}

struct AgreeOp {
    algorithm: Algorithm,
    key: Zeroizing<Vec<u8>>,
    secret: Option<Blob>,
}

/// Purpose-specific state of one session.
enum Operation {
    Sign(SignOp),
    Verify(SignOp),
    Cipher(CipherOp),
    Mac { ctx: CryptoCtx, ops: DigestOps },
    Derive(DeriveOp),
    Agree(AgreeOp),
    Released,
}

fn is_signing_algorithm(algorithm: Algorithm) -> bool {
    matches!(algorithm, Algorithm::Rsa | Algorithm::Ecc | Algorithm::Ed25519)
}

/// Agreement algorithm used with a stored key of `algorithm`.
pub(crate) fn agreement_for(algorithm: Algorithm) -> Result<Algorithm> {
    match algorithm {
        Algorithm::Ecc | Algorithm::Ecdh => Ok(Algorithm::Ecdh),
        Algorithm::X25519 => Ok(Algorithm::X25519),
        _ => Err(Error::InvalidAlgorithm),
    }
}

/// Whether the stored key material is a public key only.
pub(crate) fn is_public_only(stored: &ParamSet) -> Result<bool> {
    Ok(match stored.find_u32(Tag::IMPORT_KEY_TYPE)? {
        Some(v) => ImportKeyType::try_from(v)? == ImportKeyType::Public,
        None => false,
    })
}

fn public_key_of(algorithm: Algorithm, stored: &ParamSet, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if is_public_only(stored)? {
        Ok(Zeroizing::new(key.to_vec()))
    } else {
        Ok(Zeroizing::new(hal::get_public_key(algorithm, key)?.into_vec()))
    }
}

impl Operation {
    fn init(
        purpose: Purpose,
        runtime: &ParamSet,
        stored: &ParamSet,
        key: Zeroizing<Vec<u8>>,
        secure_sign: bool,
    ) -> Result<Self> {
        match purpose {
            Purpose::SIGN | Purpose::VERIFY => {
                let spec = UsageSpec::from_params(runtime)?;
                if !is_signing_algorithm(spec.algorithm) {
                    return Err(Error::InvalidAlgorithm);
                }
                let verify = purpose == Purpose::VERIFY;
                let key = if verify {
                    public_key_of(spec.algorithm, stored, &key)?
                } else if is_public_only(stored)? {
                    return Err(Error::InvalidUsageOfKey);
                } else {
                    key
                };
                // Verify-side secure sign learns the header only at Finish.
                let sink = MessageSink::new(&spec, verify && secure_sign)?;
                let op = SignOp {
                    spec,
                    key,
                    sink,
                    header: None,
                    secure_sign,
                };
                Ok(if verify {
                    Operation::Verify(op)
                } else {
                    Operation::Sign(op)
                })
            }
            Purpose::ENCRYPT | Purpose::DECRYPT => {
                let encrypt = purpose == Purpose::ENCRYPT;
                let spec = UsageSpec::from_params(runtime)?;
                if CipherOps::is_supported(spec.algorithm, encrypt) {
                    let ops = CipherOps::resolve(spec.algorithm, encrypt)?;
                    let ctx = (ops.init)(&key, &spec)?;
                    return Ok(Operation::Cipher(CipherOp::Staged { ops, ctx }));
                }
                if spec.algorithm != Algorithm::Rsa {
                    return Err(Error::InvalidAlgorithm);
                }
                let key = if encrypt {
                    public_key_of(spec.algorithm, stored, &key)?
                } else {
                    key
                };
                Ok(Operation::Cipher(CipherOp::OneShot {
                    spec,
                    key,
                    encrypt,
                    cache: Zeroizing::new(Vec::new()),
                }))
            }
            Purpose::MAC => {
                let spec = UsageSpec::from_params(runtime)?;
                if spec.algorithm != Algorithm::Hmac {
                    return Err(Error::InvalidAlgorithm);
                }
                if !runtime.contains(Tag::DIGEST) {
                    return Err(Error::CheckGetDigestFail);
                }
                let (ctx, ops) = hal::hmac_init(spec.digest, &key)?;
                Ok(Operation::Mac { ctx, ops })
            }
            Purpose::DERIVE => {
                let spec = DeriveSpec::from_params(runtime)?;
                if !matches!(spec.algorithm, Algorithm::Hkdf | Algorithm::Pbkdf2) {
                    return Err(Error::InvalidAlgorithm);
                }
                Ok(Operation::Derive(DeriveOp {
                    spec,
                    key,
                    output: None,
                }))
            }
            Purpose::AGREE => {
                let stored_alg = Algorithm::try_from(
                    stored
                        .get_u32(Tag::ALGORITHM)
                        .map_err(|_| Error::CheckGetAlgFail)?,
                )?;
                if is_public_only(stored)? {
                    return Err(Error::InvalidUsageOfKey);
                }
                Ok(Operation::Agree(AgreeOp {
                    algorithm: agreement_for(stored_alg)?,
                    key,
                    secret: None,
                }))
            }
            _ => Err(Error::InvalidPurpose),
        }
    }

    fn update(&mut self, data: &[u8], header: Option<[u8; SECURE_SIGN_HEADER_LEN]>) -> Result<Blob> {
        match self {
            Operation::Sign(op) => {
                if let Some(header) = header.filter(|_| op.secure_sign) {
                    op.sink.feed(&header)?;
                    op.header = Some(header);
                }
                op.sink.feed(data)?;
                Ok(Blob::empty())
            }
            Operation::Verify(op) => {
                op.sink.feed(data)?;
                Ok(Blob::empty())
            }
            Operation::Cipher(CipherOp::Staged { ops, ctx }) => (ops.update)(ctx, data),
            Operation::Cipher(CipherOp::OneShot { cache, .. }) => {
                cache_append(cache, data)?;
                Ok(Blob::empty())
            }
            Operation::Mac { ctx, ops } => {
                (ops.update)(ctx, data)?;
                Ok(Blob::empty())
            }
            Operation::Derive(op) => {
                if op.output.is_some() {
                    warn!("derive already ran in this session");
                    return Err(Error::Failure);
                }
                op.output = Some(hal::derive_key(&op.spec, &op.key)?);
                Ok(Blob::empty())
            }
            Operation::Agree(op) => {
                if op.secret.is_some() {
                    warn!("agreement already ran in this session");
                    return Err(Error::Failure);
                }
                op.secret = Some(hal::agree_key(op.algorithm, &op.key, data)?);
                Ok(Blob::empty())
            }
            Operation::Released => Err(Error::NotExist),
        }
    }

    fn finish(self, data: &[u8], header: Option<[u8; SECURE_SIGN_HEADER_LEN]>) -> Result<Blob> {
        match self {
            Operation::Sign(mut op) => {
                if op.header.is_none() && op.secure_sign {
                    if let Some(header) = header {
                        op.sink.feed(&header)?;
                        op.header = Some(header);
                    }
                }
                if op.secure_sign && op.header.is_none() {
                    op.sink.free();
                    return Err(Error::BadState);
                }
                op.sink.feed(data)?;
                let message = op.sink.finish(&op.spec)?;
                let signature = hal::sign(&op.key, &op.spec, &message)?;
                match op.header {
                    Some(header) => {
                        let mut out = Blob::from_slice(&header);
                        out.extend_from_slice(&signature);
                        Ok(out)
                    }
                    None => Ok(signature),
                }
            }
            Operation::Verify(mut op) => {
                let signature = if op.secure_sign {
                    let (header, signature) = SecureSignHeader::split(data)?;
                    op.sink.prepend(&header.to_bytes())?;
                    signature
                } else {
                    data
                };
                let message = op.sink.finish(&op.spec)?;
                hal::verify(&op.key, &op.spec, &message, signature)?;
                Ok(Blob::empty())
            }
            Operation::Cipher(CipherOp::Staged { ops, ctx }) => (ops.finish)(ctx, data),
            Operation::Cipher(CipherOp::OneShot {
                spec,
                key,
                encrypt,
                mut cache,
            }) => {
                cache_append(&mut cache, data)?;
                if encrypt {
                    hal::encrypt(&key, &spec, &cache)
                } else {
                    hal::decrypt(&key, &spec, &cache)
                }
            }
            Operation::Mac { ctx, ops } => (ops.finish)(ctx, data),
            Operation::Derive(op) => match op.output {
                Some(output) => Ok(output),
                None => hal::derive_key(&op.spec, &op.key),
            },
            Operation::Agree(op) => match op.secret {
                Some(secret) => Ok(secret),
                None if !data.is_empty() => hal::agree_key(op.algorithm, &op.key, data),
                None => Err(Error::InvalidArgument),
            },
            Operation::Released => Err(Error::NotExist),
        }
    }

    /// Release the context through the purpose's free path.
    fn free(self) {
        match self {
            Operation::Sign(op) | Operation::Verify(op) => op.sink.free(),
            Operation::Cipher(CipherOp::Staged { ops, ctx }) => (ops.free)(ctx),
            Operation::Mac { ctx, ops } => (ops.free)(ctx),
            Operation::Cipher(CipherOp::OneShot { .. })
            | Operation::Derive(_)
            | Operation::Agree(_)
            | Operation::Released => {}
        }
    }
}

/// One live Init/Update/Finish operation.
pub struct Session {
    purpose: Purpose,
    params: ParamSet,
    auth: Option<AuthRuntime>,
    stage: Stage,
    created_at_ms: u64,
    op: Operation,
}

impl Session {
    /// Build the purpose-specific state for a key.
    ///
    /// `stored` is the key's policy set, `runtime` the policy merged with the
    /// Init parameters. The auth runtime, when present, was created from the
    /// stored policy.
    pub fn new(
        purpose: Purpose,
        runtime: ParamSet,
        stored: &ParamSet,
        key: Zeroizing<Vec<u8>>,
        auth: Option<AuthRuntime>,
        now_ms: u64,
    ) -> Result<Self> {
        let secure_sign = auth.as_ref().map_or(false, AuthRuntime::is_secure_sign);
        let op = Operation::init(purpose, &runtime, stored, key, secure_sign)?;
        debug!(purpose = purpose.bits(), auth = auth.is_some(), "session initialized");
        Ok(Self {
            purpose,
            params: runtime,
            auth,
            stage: Stage::Created,
            created_at_ms: now_ms,
            op,
        })
    }

    pub fn purpose(&self) -> Purpose {
        self.purpose
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn params(&self) -> &ParamSet {
        &self.params
    }

    pub fn created_at_ms(&self) -> u64 {
        self.created_at_ms
    }

    /// Challenge for the caller's authenticator; empty for keys without an
    /// auth policy.
    pub fn challenge(&self) -> Blob {
        self.auth
            .as_ref()
            .map(AuthRuntime::challenge)
            .unwrap_or_default()
    }

    fn authorize(
        &mut self,
        params: &ParamSet,
        token_key: &AuthTokenKey,
        now_ms: u64,
    ) -> Result<Option<[u8; SECURE_SIGN_HEADER_LEN]>> {
        match self.auth.as_mut() {
            None => Ok(None),
            Some(auth) => {
                auth.verify(params, token_key, now_ms)?;
                Ok(auth.take_sign_header())
            }
        }
    }

    pub fn update(
        &mut self,
        params: &ParamSet,
        data: &[u8],
        token_key: &AuthTokenKey,
        now_ms: u64,
    ) -> Result<Blob> {
        if matches!(self.op, Operation::Released) {
            return Err(Error::NotExist);
        }
        let header = self.authorize(params, token_key, now_ms)?;
        let out = self.op.update(data, header)?;
        self.stage = Stage::Active;
        Ok(out)
    }

    /// Run the final step. The context is released whatever the outcome.
    pub fn finish(
        &mut self,
        params: &ParamSet,
        data: &[u8],
        token_key: &AuthTokenKey,
        now_ms: u64,
    ) -> Result<Blob> {
        let op = std::mem::replace(&mut self.op, Operation::Released);
        if matches!(op, Operation::Released) {
            return Err(Error::NotExist);
        }
        match self.authorize(params, token_key, now_ms) {
            Ok(header) => op.finish(data, header),
            Err(e) => {
                op.free();
                Err(e)
            }
        }
    }

    pub fn abort(&mut self) {
        std::mem::replace(&mut self.op, Operation::Released).free();
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.abort();
    }
}
