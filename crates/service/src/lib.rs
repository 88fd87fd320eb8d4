//! Keystore service: key storage, sessions and the verbs callers reach.
//!
//! [`KeystoreService`] owns the device secrets, the key store and the live
//! session table. [`Dispatcher`] runs one behind a worker thread and hands
//! back boundary-form [`ServiceResponse`]s.

pub mod device;
pub mod dispatch;
pub mod key_blob;
pub mod keynode;
pub mod service;
pub mod storage;
pub mod three_stage;
pub mod wrapped;

pub use device::DeviceSecrets;
pub use dispatch::Dispatcher;
pub use keynode::SessionTable;
pub use service::{
    verify_attestation, InitOutput, KeystoreService, ServiceResponse, MAX_ALIAS_LEN,
    MAX_RANDOM_LEN,
};
pub use storage::{KeyStorage, MemoryKeyStorage};
pub use three_stage::{Session, Stage, MAX_CACHED_DATA};
pub use wrapped::{WrappedKey, MAX_WRAPPED_DATA};
