//! Core types for the device keystore.
//!
//! Every other keystore crate speaks [`ParamSet`]: requests, responses and
//! stored key records are all parameter sets. This crate also carries the
//! error taxonomy, the external error-code adapter, the rendezvous primitive,
//! configuration and logging setup.

pub mod blob;
pub mod config;
pub mod errcode;
pub mod error;
pub mod logging;
pub mod param;
pub mod param_set;
pub mod rendezvous;
pub mod tag;
pub mod types;

pub use blob::Blob;
pub use config::KeystoreConfig;
pub use errcode::{convert_error_code, convert_result, ExternalCode, ExternalResult};
pub use error::{Error, Result};
pub use param::{Param, Value};
pub use param_set::ParamSet;
pub use rendezvous::Rendezvous;
pub use tag::{Tag, TagKind};
pub use types::{
    Algorithm, AuthAccessType, BlockMode, ChallengeType, Digest, ImportKeyType, KeyFlag,
    KeyStorageFlag, Padding, Purpose, SecureSignType, UnwrapSuite, UserAuthType, MAX_CACHED_DATA,
};
