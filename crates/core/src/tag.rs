//! Typed parameter tags.
//!
//! The top four bits of a tag select the value kind; the low 28 bits select
//! the field. A tag's kind must agree with the value stored under it.

use std::fmt;

const KIND_SHIFT: u32 = 28;
const KIND_MASK: u32 = 0xF << KIND_SHIFT;

/// Value kind encoded in a tag's top bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum TagKind {
    Invalid = 0,
    Int = 1,
    Uint = 2,
    Ulong = 3,
    Bool = 4,
    Bytes = 5,
}

impl TagKind {
    fn from_bits(bits: u32) -> TagKind {
        match bits {
            1 => TagKind::Int,
            2 => TagKind::Uint,
            3 => TagKind::Ulong,
            4 => TagKind::Bool,
            5 => TagKind::Bytes,
            _ => TagKind::Invalid,
        }
    }
}

/// 32-bit parameter identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(u32);

const fn tag(kind: TagKind, field: u32) -> Tag {
    Tag(((kind as u32) << KIND_SHIFT) | field)
}

impl Tag {
    pub const ALGORITHM: Tag = tag(TagKind::Uint, 1);
    pub const PURPOSE: Tag = tag(TagKind::Uint, 2);
    pub const KEY_SIZE: Tag = tag(TagKind::Uint, 3);
    pub const DIGEST: Tag = tag(TagKind::Uint, 4);
    pub const PADDING: Tag = tag(TagKind::Uint, 5);
    pub const BLOCK_MODE: Tag = tag(TagKind::Uint, 6);
    pub const KEY_TYPE: Tag = tag(TagKind::Uint, 7);
    pub const ASSOCIATED_DATA: Tag = tag(TagKind::Bytes, 8);
    pub const NONCE: Tag = tag(TagKind::Bytes, 9);
    pub const IV: Tag = tag(TagKind::Bytes, 10);
    pub const INFO: Tag = tag(TagKind::Bytes, 11);
    pub const SALT: Tag = tag(TagKind::Bytes, 12);
    pub const PWD: Tag = tag(TagKind::Bytes, 13);
    pub const ITERATION: Tag = tag(TagKind::Uint, 14);
    pub const KEY_GENERATE_TYPE: Tag = tag(TagKind::Uint, 15);
    pub const DERIVE_MAIN_KEY: Tag = tag(TagKind::Bytes, 16);
    pub const DERIVE_FACTOR: Tag = tag(TagKind::Bytes, 17);
    pub const DERIVE_ALG: Tag = tag(TagKind::Uint, 18);
    pub const AGREE_ALG: Tag = tag(TagKind::Uint, 19);
    pub const AGREE_PUBLIC_KEY_IS_KEY_ALIAS: Tag = tag(TagKind::Bool, 20);
    pub const AGREE_PRIVATE_KEY_ALIAS: Tag = tag(TagKind::Bytes, 21);
    pub const AGREE_PUBLIC_KEY: Tag = tag(TagKind::Bytes, 22);
    pub const KEY_ALIAS: Tag = tag(TagKind::Bytes, 23);
    pub const DERIVE_KEY_SIZE: Tag = tag(TagKind::Uint, 24);
    pub const IMPORT_KEY_TYPE: Tag = tag(TagKind::Uint, 25);
    pub const UNWRAP_ALGORITHM_SUITE: Tag = tag(TagKind::Uint, 26);

    pub const ACTIVE_DATETIME: Tag = tag(TagKind::Ulong, 201);
    pub const ORIGINATION_EXPIRE_DATETIME: Tag = tag(TagKind::Ulong, 202);
    pub const USAGE_EXPIRE_DATETIME: Tag = tag(TagKind::Ulong, 203);
    pub const CREATION_DATETIME: Tag = tag(TagKind::Ulong, 204);

    pub const ALL_USERS: Tag = tag(TagKind::Bool, 301);
    pub const USER_ID: Tag = tag(TagKind::Uint, 302);
    pub const NO_AUTH_REQUIRED: Tag = tag(TagKind::Bool, 303);
    pub const USER_AUTH_TYPE: Tag = tag(TagKind::Uint, 304);
    pub const AUTH_TIMEOUT: Tag = tag(TagKind::Uint, 305);
    pub const AUTH_TOKEN: Tag = tag(TagKind::Bytes, 306);
    pub const KEY_AUTH_ACCESS_TYPE: Tag = tag(TagKind::Uint, 307);
    pub const KEY_SECURE_SIGN_TYPE: Tag = tag(TagKind::Uint, 308);
    pub const CHALLENGE_TYPE: Tag = tag(TagKind::Uint, 309);
    pub const CHALLENGE_POS: Tag = tag(TagKind::Uint, 310);

    pub const ATTESTATION_CHALLENGE: Tag = tag(TagKind::Bytes, 501);
    pub const ATTESTATION_APPLICATION_ID: Tag = tag(TagKind::Bytes, 502);

    pub const IS_KEY_ALIAS: Tag = tag(TagKind::Bool, 1001);
    pub const KEY_STORAGE_FLAG: Tag = tag(TagKind::Uint, 1002);
    pub const KEY_FLAG: Tag = tag(TagKind::Uint, 1007);

    pub const PROCESS_NAME: Tag = tag(TagKind::Bytes, 10001);
    pub const CRYPTO_CTX: Tag = tag(TagKind::Ulong, 10005);
    pub const KEY: Tag = tag(TagKind::Bytes, 10006);
    pub const KEY_VERSION: Tag = tag(TagKind::Uint, 10007);
    pub const PAYLOAD_LEN: Tag = tag(TagKind::Uint, 10008);
    pub const AE_TAG: Tag = tag(TagKind::Bytes, 10009);
    pub const KEY_INIT_CHALLENGE: Tag = tag(TagKind::Bytes, 10011);
    pub const IS_USER_AUTH_ACCESS: Tag = tag(TagKind::Bool, 10012);
    pub const USER_AUTH_ENROLL_ID_INFO: Tag = tag(TagKind::Bytes, 10014);
    pub const USER_AUTH_SECURE_UID: Tag = tag(TagKind::Bytes, 10015);
    pub const KEY_AUTH_RESULT: Tag = tag(TagKind::Int, 10016);
    pub const IF_NEED_APPEND_AUTH_INFO: Tag = tag(TagKind::Bool, 10017);
    pub const VERIFIED_AUTH_TOKEN: Tag = tag(TagKind::Bytes, 10018);
    pub const IS_APPEND_UPDATE_DATA: Tag = tag(TagKind::Bool, 10019);
    pub const KEY_ACCESS_TIME: Tag = tag(TagKind::Ulong, 10020);

    pub const OS_VERSION: Tag = tag(TagKind::Uint, 10101);

    pub const SYMMETRIC_KEY_DATA: Tag = tag(TagKind::Bytes, 20001);
    pub const ASYMMETRIC_PUBLIC_KEY_DATA: Tag = tag(TagKind::Bytes, 20002);
    pub const ASYMMETRIC_PRIVATE_KEY_DATA: Tag = tag(TagKind::Bytes, 20003);

    /// Attestation statement fields.
    pub const ATTESTATION_PUBLIC_KEY: Tag = tag(TagKind::Bytes, 520);
    pub const ATTESTATION_SIGNATURE: Tag = tag(TagKind::Bytes, 521);

    /// Every tag this keystore accepts inside a parameter set.
    pub const KNOWN: &'static [Tag] = &[
        Tag::ALGORITHM,
        Tag::PURPOSE,
        Tag::KEY_SIZE,
        Tag::DIGEST,
        Tag::PADDING,
        Tag::BLOCK_MODE,
        Tag::KEY_TYPE,
        Tag::ASSOCIATED_DATA,
        Tag::NONCE,
        Tag::IV,
        Tag::INFO,
        Tag::SALT,
        Tag::PWD,
        Tag::ITERATION,
        Tag::KEY_GENERATE_TYPE,
        Tag::DERIVE_MAIN_KEY,
        Tag::DERIVE_FACTOR,
        Tag::DERIVE_ALG,
        Tag::AGREE_ALG,
        Tag::AGREE_PUBLIC_KEY_IS_KEY_ALIAS,
        Tag::AGREE_PRIVATE_KEY_ALIAS,
        Tag::AGREE_PUBLIC_KEY,
        Tag::KEY_ALIAS,
        Tag::DERIVE_KEY_SIZE,
        Tag::IMPORT_KEY_TYPE,
        Tag::UNWRAP_ALGORITHM_SUITE,
        Tag::ACTIVE_DATETIME,
        Tag::ORIGINATION_EXPIRE_DATETIME,
        Tag::USAGE_EXPIRE_DATETIME,
        Tag::CREATION_DATETIME,
        Tag::ALL_USERS,
        Tag::USER_ID,
        Tag::NO_AUTH_REQUIRED,
        Tag::USER_AUTH_TYPE,
        Tag::AUTH_TIMEOUT,
        Tag::AUTH_TOKEN,
        Tag::KEY_AUTH_ACCESS_TYPE,
        Tag::KEY_SECURE_SIGN_TYPE,
        Tag::CHALLENGE_TYPE,
        Tag::CHALLENGE_POS,
        Tag::ATTESTATION_CHALLENGE,
        Tag::ATTESTATION_APPLICATION_ID,
        Tag::ATTESTATION_PUBLIC_KEY,
        Tag::ATTESTATION_SIGNATURE,
        Tag::IS_KEY_ALIAS,
        Tag::KEY_STORAGE_FLAG,
        Tag::KEY_FLAG,
        Tag::PROCESS_NAME,
        Tag::CRYPTO_CTX,
        Tag::KEY,
        Tag::KEY_VERSION,
        Tag::PAYLOAD_LEN,
        Tag::AE_TAG,
        Tag::KEY_INIT_CHALLENGE,
        Tag::IS_USER_AUTH_ACCESS,
        Tag::USER_AUTH_ENROLL_ID_INFO,
        Tag::USER_AUTH_SECURE_UID,
        Tag::KEY_AUTH_RESULT,
        Tag::IF_NEED_APPEND_AUTH_INFO,
        Tag::VERIFIED_AUTH_TOKEN,
        Tag::IS_APPEND_UPDATE_DATA,
        Tag::KEY_ACCESS_TIME,
        Tag::OS_VERSION,
        Tag::SYMMETRIC_KEY_DATA,
        Tag::ASYMMETRIC_PUBLIC_KEY_DATA,
        Tag::ASYMMETRIC_PRIVATE_KEY_DATA,
    ];

    pub const fn from_raw(raw: u32) -> Tag {
        Tag(raw)
    }

    pub const fn value(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> TagKind {
        TagKind::from_bits((self.0 & KIND_MASK) >> KIND_SHIFT)
    }

    pub const fn field(self) -> u32 {
        self.0 & !KIND_MASK
    }

    pub fn is_known(self) -> bool {
        Tag::KNOWN.contains(&self)
    }
}

impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag({:?}|{})", self.kind(), self.field())
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}
