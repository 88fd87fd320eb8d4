//! A single tagged parameter.

use crate::blob::Blob;
use crate::tag::{Tag, TagKind};
use std::fmt;

/// Serialized size of one entry without its blob payload: tag + 8-byte slot.
pub const PARAM_ENTRY_SIZE: usize = 12;

/// Parameter value. The variant is the discriminant; the tag's kind bits must
/// agree with it.
#[derive(Clone, PartialEq, Eq)]
pub enum Value {
    Int32(i32),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    Bytes(Blob),
}

impl Value {
    pub fn kind(&self) -> TagKind {
        match self {
            Value::Int32(_) => TagKind::Int,
            Value::Uint32(_) => TagKind::Uint,
            Value::Uint64(_) => TagKind::Ulong,
            Value::Bool(_) => TagKind::Bool,
            Value::Bytes(_) => TagKind::Bytes,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int32(v) => write!(f, "Int32({v})"),
            Value::Uint32(v) => write!(f, "Uint32({v})"),
            Value::Uint64(v) => write!(f, "Uint64({v})"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Bytes(b) => write!(f, "Bytes(len={})", b.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub tag: Tag,
    pub value: Value,
}

impl Param {
    pub fn new(tag: Tag, value: Value) -> Self {
        Self { tag, value }
    }

    pub fn int32(tag: Tag, v: i32) -> Self {
        Self::new(tag, Value::Int32(v))
    }

    pub fn uint32(tag: Tag, v: u32) -> Self {
        Self::new(tag, Value::Uint32(v))
    }

    pub fn uint64(tag: Tag, v: u64) -> Self {
        Self::new(tag, Value::Uint64(v))
    }

    pub fn boolean(tag: Tag, v: bool) -> Self {
        Self::new(tag, Value::Bool(v))
    }

    pub fn bytes(tag: Tag, v: impl Into<Blob>) -> Self {
        Self::new(tag, Value::Bytes(v.into()))
    }

    /// Whether the tag's kind bits agree with the stored variant.
    pub fn is_kind_consistent(&self) -> bool {
        self.tag.kind() == self.value.kind()
    }

    pub fn serialized_size(&self) -> usize {
        match &self.value {
            Value::Bytes(b) => PARAM_ENTRY_SIZE + b.len(),
            _ => PARAM_ENTRY_SIZE,
        }
    }

    /// Two params match when they share a tag and compare equal under that
    /// tag's kind.
    pub fn matches(&self, other: &Param) -> bool {
        self.tag == other.tag && self.value == other.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_consistency() {
        assert!(Param::uint32(Tag::ALGORITHM, 20).is_kind_consistent());
        assert!(!Param::uint64(Tag::ALGORITHM, 20).is_kind_consistent());
        assert!(!Param::bytes(Tag::PURPOSE, vec![1u8]).is_kind_consistent());
    }

    #[test]
    fn test_serialized_size() {
        assert_eq!(Param::boolean(Tag::IS_KEY_ALIAS, true).serialized_size(), 12);
        assert_eq!(
            Param::bytes(Tag::KEY_ALIAS, b"alias".to_vec()).serialized_size(),
            17
        );
    }

    #[test]
    fn test_debug_redacts_bytes() {
        let p = Param::bytes(Tag::KEY, vec![0xAA; 4]);
        assert!(!format!("{p:?}").contains("170"));
    }
}
