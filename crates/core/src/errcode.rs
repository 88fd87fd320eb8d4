//! Translation of internal error kinds into externally stable codes.
//!
//! Callers outside the service only ever see an [`ExternalResult`]. Internal
//! kinds without an entry in the table collapse to
//! [`ExternalCode::ExternalError`] so no internal enumerator leaks.

use crate::error::{Error, Result, SUCCESS};
use serde::{Deserialize, Serialize};

/// Externally published result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ExternalCode {
    Success = 0,
    PermissionFail = 201,
    IllegalArgument = 401,
    NotSupportedApi = 801,
    FeatureNotSupported = 12_000_001,
    MissingCryptoAlgArgument = 12_000_002,
    InvalidCryptoAlgArgument = 12_000_003,
    FileOperationFail = 12_000_004,
    CommunicationFail = 12_000_005,
    CryptoFail = 12_000_006,
    KeyAuthPermanentlyInvalidated = 12_000_007,
    KeyAuthVerifyFailed = 12_000_008,
    KeyAuthTimeOut = 12_000_009,
    SessionLimit = 12_000_010,
    ItemNotExist = 12_000_011,
    ExternalError = 12_000_012,
    CredentialNotExist = 12_000_013,
    InsufficientMemory = 12_000_014,
    CallServiceFailed = 12_000_015,
}

impl ExternalCode {
    pub const fn value(self) -> i32 {
        self as i32
    }
}

/// Code and message returned across the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExternalResult {
    pub code: ExternalCode,
    pub message: &'static str,
}

impl ExternalResult {
    pub fn is_success(&self) -> bool {
        self.code == ExternalCode::Success
    }
}

struct ErrorMapping {
    inner: i32,
    external: ExternalCode,
    message: &'static str,
}

const fn map(inner: Error, external: ExternalCode, message: &'static str) -> ErrorMapping {
    ErrorMapping {
        inner: inner.code(),
        external,
        message,
    }
}

const FALLBACK_MESSAGE: &str = "System external error.";

static ERROR_CODE_TABLE: &[ErrorMapping] = &[
    ErrorMapping {
        inner: SUCCESS,
        external: ExternalCode::Success,
        message: "Success.",
    },
    map(
        Error::NoPermission,
        ExternalCode::PermissionFail,
        "Permission check failed. Apply for the required permissions first.",
    ),
    map(Error::InvalidArgument, ExternalCode::IllegalArgument, "Invalid parameters."),
    map(
        Error::InsufficientData,
        ExternalCode::IllegalArgument,
        "Some input parameters are not set.",
    ),
    map(Error::BufferTooSmall, ExternalCode::IllegalArgument, "Insufficient buffer size."),
    map(
        Error::NullPointer,
        ExternalCode::IllegalArgument,
        "The parameter value cannot be null.",
    ),
    map(Error::InvalidPublicKey, ExternalCode::IllegalArgument, "Invalid public key."),
    map(Error::InvalidKeyInfo, ExternalCode::IllegalArgument, "Invalid key information."),
    map(
        Error::ParamNotExist,
        ExternalCode::IllegalArgument,
        "The parameter does not exist.",
    ),
    map(
        Error::InvalidWrappedFormat,
        ExternalCode::IllegalArgument,
        "The wrapped key data is in invalid format.",
    ),
    map(
        Error::CheckGetAuthTypeFailed,
        ExternalCode::IllegalArgument,
        "Failed to obtain the authentication type. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetChallengeTypeFailed,
        ExternalCode::IllegalArgument,
        "Failed to obtain the challenge type. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetAccessTypeFailed,
        ExternalCode::IllegalArgument,
        "Failed to obtain the access type. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetAuthTokenFailed,
        ExternalCode::IllegalArgument,
        "Failed to obtain the authentication token. It is not set in ParamSet.",
    ),
    map(Error::InvalidTimeOut, ExternalCode::IllegalArgument, "Invalid timeout parameter."),
    map(Error::InvalidAuthType, ExternalCode::IllegalArgument, "Invalid authentication type."),
    map(Error::InvalidChallengeType, ExternalCode::IllegalArgument, "Invalid challenge type."),
    map(Error::InvalidAccessType, ExternalCode::IllegalArgument, "Invalid access type."),
    map(
        Error::InvalidAuthToken,
        ExternalCode::IllegalArgument,
        "Invalid authentication token.",
    ),
    map(
        Error::InvalidSecureSignType,
        ExternalCode::IllegalArgument,
        "Invalid secure sign type.",
    ),
    map(Error::ApiNotSupported, ExternalCode::NotSupportedApi, "This API is not supported."),
    map(Error::NotSupported, ExternalCode::FeatureNotSupported, "The feature is not support."),
    map(
        Error::UserAuthTypeNotSupport,
        ExternalCode::FeatureNotSupported,
        "The user authentication type is not supported.",
    ),
    map(
        Error::CheckGetAlgFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the algorithm. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetKeySizeFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the key size. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetPaddingFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the padding algorithm. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetPurposeFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the key purpose. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetDigestFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the digest algorithm. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetModeFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the cipher mode. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetNonceFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the nonce. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetAadFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the AAD. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetIvFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the IV. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetAeTagFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the AEAD. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetSaltFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the salt value. It is not set in ParamSet.",
    ),
    map(
        Error::CheckGetIterationFail,
        ExternalCode::MissingCryptoAlgArgument,
        "Failed to obtain the number of iterations. It is not set in ParamSet.",
    ),
    map(Error::InvalidAlgorithm, ExternalCode::InvalidCryptoAlgArgument, "Invalid algorithm."),
    map(Error::InvalidKeySize, ExternalCode::InvalidCryptoAlgArgument, "Invalid key size."),
    map(
        Error::InvalidPadding,
        ExternalCode::InvalidCryptoAlgArgument,
        "Invalid padding algorithm.",
    ),
    map(Error::InvalidPurpose, ExternalCode::InvalidCryptoAlgArgument, "Invalid key purpose."),
    map(Error::InvalidMode, ExternalCode::InvalidCryptoAlgArgument, "Invalid cipher mode."),
    map(
        Error::InvalidDigest,
        ExternalCode::InvalidCryptoAlgArgument,
        "Invalid digest algorithm.",
    ),
    map(
        Error::InvalidSignatureSize,
        ExternalCode::InvalidCryptoAlgArgument,
        "Invalid signature size.",
    ),
    map(Error::InvalidIv, ExternalCode::InvalidCryptoAlgArgument, "Invalid IV."),
    map(Error::InvalidAad, ExternalCode::InvalidCryptoAlgArgument, "Invalid AAD."),
    map(Error::InvalidNonce, ExternalCode::InvalidCryptoAlgArgument, "Invalid nonce."),
    map(Error::InvalidAeTag, ExternalCode::InvalidCryptoAlgArgument, "Invalid AE."),
    map(Error::InvalidSalt, ExternalCode::InvalidCryptoAlgArgument, "Invalid salt value."),
    map(
        Error::InvalidIteration,
        ExternalCode::InvalidCryptoAlgArgument,
        "Invalid iteration count.",
    ),
    map(
        Error::InvalidUsageOfKey,
        ExternalCode::InvalidCryptoAlgArgument,
        "Invalid key purpose.",
    ),
    map(
        Error::StorageFailure,
        ExternalCode::FileOperationFail,
        "Insufficient storage space.",
    ),
    map(Error::FileSizeFail, ExternalCode::FileOperationFail, "Invalid file size."),
    map(Error::ReadFileFail, ExternalCode::FileOperationFail, "Failed to read the file."),
    map(Error::WriteFileFail, ExternalCode::FileOperationFail, "Failed to write the file."),
    map(Error::RemoveFileFail, ExternalCode::FileOperationFail, "Failed to remove the file."),
    map(
        Error::InvalidKeyFile,
        ExternalCode::FileOperationFail,
        "Failed to read the key from an invalid key file.",
    ),
    map(
        Error::IpcMsgFail,
        ExternalCode::CommunicationFail,
        "Failed to get message from IPC.",
    ),
    map(Error::CommunicationTimeout, ExternalCode::CommunicationFail, "IPC timed out."),
    map(Error::IpcInitFail, ExternalCode::CommunicationFail, "IPC initialization failed."),
    map(Error::Unknown, ExternalCode::CommunicationFail, "IPC async call failed."),
    map(Error::CryptoEngine, ExternalCode::CryptoFail, "Crypto engine error."),
    // KeyAuthFailed has no row: it reaches clients as the generic external
    // error, the same as the unmapped internal codes.
    map(
        Error::KeyAuthPermanentlyInvalidated,
        ExternalCode::KeyAuthPermanentlyInvalidated,
        "This credential is invalidated permanently.",
    ),
    map(
        Error::KeyAuthVerifyFailed,
        ExternalCode::KeyAuthVerifyFailed,
        "The authentication token verification failed.",
    ),
    map(
        Error::KeyAuthTimeOut,
        ExternalCode::KeyAuthTimeOut,
        "This authentication token timed out.",
    ),
    map(
        Error::SessionReachedLimit,
        ExternalCode::SessionLimit,
        "The number of key operation sessions has reached the limit.",
    ),
    map(Error::NotExist, ExternalCode::ItemNotExist, "The entity does not exist."),
    map(Error::Failure, ExternalCode::ExternalError, FALLBACK_MESSAGE),
    map(Error::BadState, ExternalCode::ExternalError, FALLBACK_MESSAGE),
    map(Error::Internal, ExternalCode::ExternalError, FALLBACK_MESSAGE),
    map(
        Error::CredentialNotExist,
        ExternalCode::CredentialNotExist,
        "The credential does not exist.",
    ),
    map(
        Error::InsufficientMemory,
        ExternalCode::InsufficientMemory,
        "Insufficient memory.",
    ),
    map(Error::MallocFail, ExternalCode::InsufficientMemory, "Malloc failed."),
];

/// Translate an internal numeric code.
pub fn convert_error_code(inner: i32) -> ExternalResult {
    ERROR_CODE_TABLE
        .iter()
        .find(|entry| entry.inner == inner)
        .map(|entry| ExternalResult {
            code: entry.external,
            message: entry.message,
        })
        .unwrap_or(ExternalResult {
            code: ExternalCode::ExternalError,
            message: FALLBACK_MESSAGE,
        })
}

/// Translate a result produced by an internal operation.
pub fn convert_result<T>(result: &Result<T>) -> ExternalResult {
    match result {
        Ok(_) => convert_error_code(SUCCESS),
        Err(e) => e.to_external(),
    }
}

impl Error {
    /// External code and message for this error kind.
    pub fn to_external(self) -> ExternalResult {
        convert_error_code(self.code())
    }
}
