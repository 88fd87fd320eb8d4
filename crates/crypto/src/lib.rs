//! Crypto ability registry and the software engine behind it.
//!
//! Callers never name an algorithm implementation directly. They resolve an
//! `(operation kind, algorithm)` pair through [`ability::registry`] (or the
//! typed wrappers in [`hal`]), so which algorithms exist is decided entirely
//! by what the engine registered at start-up.
//!
//! # Supported algorithms
//!
//! - **Symmetric**: AES-128/192/256 in GCM, CBC and CTR
//! - **Signatures**: RSA PKCS#1 v1.5 / PSS, ECDSA P-256, Ed25519
//! - **Agreement**: ECDH P-256, X25519
//! - **Digests and MACs**: SHA-224/256/384/512, HMAC over the same
//! - **Derivation**: HKDF, PBKDF2
//!
//! Key material is never logged.

pub mod ability;
pub mod ctx;
pub mod engine;
pub mod hal;
pub mod spec;

pub use ability::{init_all, registry, Ability, OperationKind, Registry, ALG_ANY};
pub use ctx::CryptoCtx;
pub use hal::{CipherOps, DigestOps};
pub use spec::{DeriveSpec, KeySpec, UsageSpec};
