//! Enumerations carried as `u32` parameter values.

use crate::error::{Error, Result};

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident ($invalid:expr) {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            pub const fn value(self) -> u32 {
                self as u32
            }
        }

        impl TryFrom<u32> for $name {
            type Error = Error;

            fn try_from(value: u32) -> Result<Self> {
                match value {
                    $($value => Ok($name::$variant),)+
                    _ => Err($invalid),
                }
            }
        }
    };
}

macro_rules! wire_flags {
    (
        $(#[$meta:meta])*
        pub struct $name:ident {
            $($(#[$vmeta:meta])* const $flag:ident = $value:literal;)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name(u32);

        impl $name {
            $($(#[$vmeta])* pub const $flag: $name = $name($value);)+

            const ALL_BITS: u32 = $($value)|+;

            pub const fn from_bits(bits: u32) -> Self {
                $name(bits)
            }

            pub const fn bits(self) -> u32 {
                self.0
            }

            pub const fn contains(self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn intersects(self, other: $name) -> bool {
                self.0 & other.0 != 0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }

            /// True when no bit outside the defined flags is set.
            pub const fn is_known(self) -> bool {
                self.0 & !Self::ALL_BITS == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

wire_enum! {
    /// Key algorithms.
    pub enum Algorithm(Error::InvalidAlgorithm) {
        Rsa = 1,
        Ecc = 2,
        Dsa = 3,
        Aes = 20,
        Hmac = 50,
        Hkdf = 51,
        Pbkdf2 = 52,
        Ecdh = 100,
        X25519 = 101,
        Ed25519 = 102,
        Dh = 103,
        Sm2 = 150,
        Sm3 = 151,
        Sm4 = 152,
    }
}

wire_enum! {
    pub enum Digest(Error::InvalidDigest) {
        None = 0,
        Md5 = 1,
        Sm3 = 2,
        Sha1 = 10,
        Sha224 = 11,
        Sha256 = 12,
        Sha384 = 13,
        Sha512 = 14,
    }
}

impl Digest {
    /// Output length in bytes, for the digests the engine implements.
    pub fn output_len(self) -> Result<usize> {
        match self {
            Digest::Sha224 => Ok(28),
            Digest::Sha256 => Ok(32),
            Digest::Sha384 => Ok(48),
            Digest::Sha512 => Ok(64),
            _ => Err(Error::InvalidDigest),
        }
    }
}

wire_enum! {
    pub enum Padding(Error::InvalidPadding) {
        None = 0,
        Oaep = 1,
        Pss = 2,
        Pkcs1V15 = 3,
        Pkcs5 = 4,
        Pkcs7 = 5,
    }
}

wire_enum! {
    pub enum BlockMode(Error::InvalidMode) {
        Ecb = 1,
        Cbc = 2,
        Ctr = 3,
        Ofb = 4,
        Ccm = 31,
        Gcm = 32,
    }
}

wire_enum! {
    /// How the verifier proves freshness of an auth token.
    pub enum ChallengeType(Error::InvalidChallengeType) {
        /// One 32-byte challenge per Init, compared in full.
        Normal = 0,
        /// Caller-assembled challenge, compared in one 8-byte slot.
        Custom = 1,
        /// No challenge; the token's timestamp is checked instead.
        None = 2,
    }
}

wire_enum! {
    pub enum SecureSignType(Error::InvalidSecureSignType) {
        WithAuthInfo = 1,
    }
}

wire_enum! {
    /// Agreement + AEAD suite used to unwrap an imported key.
    pub enum UnwrapSuite(Error::InvalidArgument) {
        X25519Aes256Gcm = 1,
        EcdhAes256Gcm = 2,
    }
}

wire_enum! {
    pub enum KeyStorageFlag(Error::InvalidArgument) {
        Temp = 0,
        Persistent = 1,
    }
}

wire_enum! {
    pub enum ImportKeyType(Error::InvalidArgument) {
        Public = 0,
        Private = 1,
        Pair = 2,
    }
}

wire_enum! {
    /// Origin of a stored key.
    pub enum KeyFlag(Error::InvalidArgument) {
        Imported = 1,
        Generated = 2,
        Agreed = 3,
        Derived = 4,
    }
}

wire_flags! {
    /// Key purposes; a stored key may combine several.
    pub struct Purpose {
        const ENCRYPT = 1;
        const DECRYPT = 2;
        const SIGN = 4;
        const VERIFY = 8;
        const DERIVE = 16;
        const WRAP = 32;
        const UNWRAP = 64;
        const MAC = 128;
        const AGREE = 256;
    }
}

impl Purpose {
    /// A single-purpose value as required by session Init.
    pub fn is_single(self) -> bool {
        self.0.count_ones() == 1 && self.is_known()
    }
}

wire_flags! {
    pub struct UserAuthType {
        const FINGERPRINT = 1;
        const FACE = 2;
        const PIN = 4;
    }
}

impl UserAuthType {
    /// Biometric kinds whose enrollment can change.
    pub const BIOMETRIC: UserAuthType = UserAuthType(1 | 2);
}

wire_flags! {
    /// Events that permanently invalidate an auth-bound key.
    pub struct AuthAccessType {
        const INVALID_CLEAR_PASSWORD = 1;
        const INVALID_NEW_BIO_ENROLL = 2;
    }
}

/// Highest 8-byte slot a custom challenge may use.
pub const MAX_CHALLENGE_POS: u32 = 3;

/// Most input one session may hold back before Finish, whether cached for
/// signing or buffered inside an AEAD context.
pub const MAX_CACHED_DATA: usize = 5 * 1024 * 1024;
