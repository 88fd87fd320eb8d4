//! Error taxonomy shared by every keystore crate.
//!
//! Each variant carries a stable internal numeric code. Internal codes never
//! cross the service boundary directly; [`crate::errcode`] translates them
//! into the externally published codes.

use thiserror::Error;

/// Keystore error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum Error {
    #[error("Operation failed")]
    Failure,
    #[error("Bad state")]
    BadState,
    #[error("Invalid argument")]
    InvalidArgument,
    #[error("Not supported")]
    NotSupported,
    #[error("No permission")]
    NoPermission,
    #[error("Insufficient data")]
    InsufficientData,
    #[error("Buffer too small")]
    BufferTooSmall,
    #[error("Insufficient memory")]
    InsufficientMemory,
    #[error("Communication failure")]
    CommunicationFailure,
    #[error("Storage failure")]
    StorageFailure,
    #[error("Hardware failure")]
    HardwareFailure,
    #[error("Already exists")]
    AlreadyExists,
    #[error("Entity does not exist")]
    NotExist,
    #[error("Null pointer")]
    NullPointer,
    #[error("Invalid file size")]
    FileSizeFail,
    #[error("Failed to read file")]
    ReadFileFail,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid key info")]
    InvalidKeyInfo,
    #[error("Allocation failed")]
    MallocFail,
    #[error("Failed to write file")]
    WriteFileFail,
    #[error("Failed to remove file")]
    RemoveFileFail,
    #[error("Invalid key file")]
    InvalidKeyFile,
    #[error("IPC message failure")]
    IpcMsgFail,
    #[error("Parameter does not exist")]
    ParamNotExist,
    #[error("Crypto engine error")]
    CryptoEngine,
    #[error("Communication timeout")]
    CommunicationTimeout,
    #[error("IPC initialization failed")]
    IpcInitFail,
    #[error("Verification failed")]
    VerificationFailed,
    #[error("Session limit reached")]
    SessionReachedLimit,
    #[error("User auth type not supported")]
    UserAuthTypeNotSupport,
    #[error("Key auth failed")]
    KeyAuthFailed,
    #[error("Device has no credential")]
    DeviceNoCredential,
    #[error("API not supported")]
    ApiNotSupported,
    #[error("Key auth permanently invalidated")]
    KeyAuthPermanentlyInvalidated,
    #[error("Key auth token verification failed")]
    KeyAuthVerifyFailed,
    #[error("Key auth token timed out")]
    KeyAuthTimeOut,
    #[error("Credential does not exist")]
    CredentialNotExist,
    #[error("Algorithm not set")]
    CheckGetAlgFail,
    #[error("Key size not set")]
    CheckGetKeySizeFail,
    #[error("Padding not set")]
    CheckGetPaddingFail,
    #[error("Purpose not set")]
    CheckGetPurposeFail,
    #[error("Digest not set")]
    CheckGetDigestFail,
    #[error("Block mode not set")]
    CheckGetModeFail,
    #[error("Nonce not set")]
    CheckGetNonceFail,
    #[error("AAD not set")]
    CheckGetAadFail,
    #[error("IV not set")]
    CheckGetIvFail,
    #[error("AE tag not set")]
    CheckGetAeTagFail,
    #[error("Salt not set")]
    CheckGetSaltFail,
    #[error("Iteration not set")]
    CheckGetIterationFail,
    #[error("Invalid algorithm")]
    InvalidAlgorithm,
    #[error("Invalid key size")]
    InvalidKeySize,
    #[error("Invalid padding")]
    InvalidPadding,
    #[error("Invalid purpose")]
    InvalidPurpose,
    #[error("Invalid block mode")]
    InvalidMode,
    #[error("Invalid digest")]
    InvalidDigest,
    #[error("Invalid signature size")]
    InvalidSignatureSize,
    #[error("Invalid IV")]
    InvalidIv,
    #[error("Invalid AAD")]
    InvalidAad,
    #[error("Invalid nonce")]
    InvalidNonce,
    #[error("Invalid AE tag")]
    InvalidAeTag,
    #[error("Invalid salt")]
    InvalidSalt,
    #[error("Invalid iteration")]
    InvalidIteration,
    #[error("Invalid operation")]
    InvalidOperation,
    #[error("Invalid wrapped key format")]
    InvalidWrappedFormat,
    #[error("Invalid usage of key")]
    InvalidUsageOfKey,
    #[error("User auth type not set")]
    CheckGetAuthTypeFailed,
    #[error("Challenge type not set")]
    CheckGetChallengeTypeFailed,
    #[error("Access type not set")]
    CheckGetAccessTypeFailed,
    #[error("Auth token not set")]
    CheckGetAuthTokenFailed,
    #[error("Invalid auth timeout")]
    InvalidTimeOut,
    #[error("Invalid user auth type")]
    InvalidAuthType,
    #[error("Invalid challenge type")]
    InvalidChallengeType,
    #[error("Invalid access type")]
    InvalidAccessType,
    #[error("Invalid auth token")]
    InvalidAuthToken,
    #[error("Invalid secure sign type")]
    InvalidSecureSignType,
    #[error("Internal error")]
    Internal,
    #[error("Unknown error")]
    Unknown,
}

/// Result type used across the keystore.
pub type Result<T> = std::result::Result<T, Error>;

/// Internal code reported for success.
pub const SUCCESS: i32 = 0;

impl Error {
    /// Every error kind, in code order.
    pub const ALL: &'static [Error] = &[
        Error::Failure,
        Error::BadState,
        Error::InvalidArgument,
        Error::NotSupported,
        Error::NoPermission,
        Error::InsufficientData,
        Error::BufferTooSmall,
        Error::InsufficientMemory,
        Error::CommunicationFailure,
        Error::StorageFailure,
        Error::HardwareFailure,
        Error::AlreadyExists,
        Error::NotExist,
        Error::NullPointer,
        Error::FileSizeFail,
        Error::ReadFileFail,
        Error::InvalidPublicKey,
        Error::InvalidPrivateKey,
        Error::InvalidKeyInfo,
        Error::MallocFail,
        Error::WriteFileFail,
        Error::RemoveFileFail,
        Error::InvalidKeyFile,
        Error::IpcMsgFail,
        Error::ParamNotExist,
        Error::CryptoEngine,
        Error::CommunicationTimeout,
        Error::IpcInitFail,
        Error::VerificationFailed,
        Error::SessionReachedLimit,
        Error::UserAuthTypeNotSupport,
        Error::KeyAuthFailed,
        Error::DeviceNoCredential,
        Error::ApiNotSupported,
        Error::KeyAuthPermanentlyInvalidated,
        Error::KeyAuthVerifyFailed,
        Error::KeyAuthTimeOut,
        Error::CredentialNotExist,
        Error::CheckGetAlgFail,
        Error::CheckGetKeySizeFail,
        Error::CheckGetPaddingFail,
        Error::CheckGetPurposeFail,
        Error::CheckGetDigestFail,
        Error::CheckGetModeFail,
        Error::CheckGetNonceFail,
        Error::CheckGetAadFail,
        Error::CheckGetIvFail,
        Error::CheckGetAeTagFail,
        Error::CheckGetSaltFail,
        Error::CheckGetIterationFail,
        Error::InvalidAlgorithm,
        Error::InvalidKeySize,
        Error::InvalidPadding,
        Error::InvalidPurpose,
        Error::InvalidMode,
        Error::InvalidDigest,
        Error::InvalidSignatureSize,
        Error::InvalidIv,
        Error::InvalidAad,
        Error::InvalidNonce,
        Error::InvalidAeTag,
        Error::InvalidSalt,
        Error::InvalidIteration,
        Error::InvalidOperation,
        Error::InvalidWrappedFormat,
        Error::InvalidUsageOfKey,
        Error::CheckGetAuthTypeFailed,
        Error::CheckGetChallengeTypeFailed,
        Error::CheckGetAccessTypeFailed,
        Error::CheckGetAuthTokenFailed,
        Error::InvalidTimeOut,
        Error::InvalidAuthType,
        Error::InvalidChallengeType,
        Error::InvalidAccessType,
        Error::InvalidAuthToken,
        Error::InvalidSecureSignType,
        Error::Internal,
        Error::Unknown,
    ];

    /// Stable internal numeric code.
    pub const fn code(self) -> i32 {
        match self {
            Error::Failure => -1,
            Error::BadState => -2,
            Error::InvalidArgument => -3,
            Error::NotSupported => -4,
            Error::NoPermission => -5,
            Error::InsufficientData => -6,
            Error::BufferTooSmall => -7,
            Error::InsufficientMemory => -8,
            Error::CommunicationFailure => -9,
            Error::StorageFailure => -10,
            Error::HardwareFailure => -11,
            Error::AlreadyExists => -12,
            Error::NotExist => -13,
            Error::NullPointer => -14,
            Error::FileSizeFail => -15,
            Error::ReadFileFail => -16,
            Error::InvalidPublicKey => -17,
            Error::InvalidPrivateKey => -18,
            Error::InvalidKeyInfo => -19,
            Error::MallocFail => -21,
            Error::WriteFileFail => -22,
            Error::RemoveFileFail => -23,
            Error::InvalidKeyFile => -27,
            Error::IpcMsgFail => -28,
            Error::ParamNotExist => -30,
            Error::CryptoEngine => -31,
            Error::CommunicationTimeout => -32,
            Error::IpcInitFail => -33,
            Error::VerificationFailed => -38,
            Error::SessionReachedLimit => -39,
            Error::UserAuthTypeNotSupport => -42,
            Error::KeyAuthFailed => -43,
            Error::DeviceNoCredential => -44,
            Error::ApiNotSupported => -45,
            Error::KeyAuthPermanentlyInvalidated => -46,
            Error::KeyAuthVerifyFailed => -47,
            Error::KeyAuthTimeOut => -48,
            Error::CredentialNotExist => -49,
            Error::CheckGetAlgFail => -100,
            Error::CheckGetKeySizeFail => -101,
            Error::CheckGetPaddingFail => -102,
            Error::CheckGetPurposeFail => -103,
            Error::CheckGetDigestFail => -104,
            Error::CheckGetModeFail => -105,
            Error::CheckGetNonceFail => -106,
            Error::CheckGetAadFail => -107,
            Error::CheckGetIvFail => -108,
            Error::CheckGetAeTagFail => -109,
            Error::CheckGetSaltFail => -110,
            Error::CheckGetIterationFail => -111,
            Error::InvalidAlgorithm => -112,
            Error::InvalidKeySize => -113,
            Error::InvalidPadding => -114,
            Error::InvalidPurpose => -115,
            Error::InvalidMode => -116,
            Error::InvalidDigest => -117,
            Error::InvalidSignatureSize => -118,
            Error::InvalidIv => -119,
            Error::InvalidAad => -120,
            Error::InvalidNonce => -121,
            Error::InvalidAeTag => -122,
            Error::InvalidSalt => -123,
            Error::InvalidIteration => -124,
            Error::InvalidOperation => -125,
            Error::InvalidWrappedFormat => -126,
            Error::InvalidUsageOfKey => -127,
            Error::CheckGetAuthTypeFailed => -128,
            Error::CheckGetChallengeTypeFailed => -129,
            Error::CheckGetAccessTypeFailed => -130,
            Error::CheckGetAuthTokenFailed => -131,
            Error::InvalidTimeOut => -132,
            Error::InvalidAuthType => -133,
            Error::InvalidChallengeType => -134,
            Error::InvalidAccessType => -135,
            Error::InvalidAuthToken => -136,
            Error::InvalidSecureSignType => -137,
            Error::Internal => -999,
            Error::Unknown => -1000,
        }
    }

    /// Reverse lookup of [`Error::code`].
    pub fn from_code(code: i32) -> Option<Error> {
        Error::ALL.iter().copied().find(|e| e.code() == code)
    }
}

/// Collapse a `Result<()>` into the internal numeric code.
pub fn result_code(result: &Result<impl Sized>) -> i32 {
    match result {
        Ok(_) => SUCCESS,
        Err(e) => e.code(),
    }
}
