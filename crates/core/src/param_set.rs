//! Parameter sets: the request, response and record format of the keystore.
//!
//! A set is an owned sequence of [`Param`] values plus bookkeeping that is
//! finalized by [`ParamSet::build`]. Its canonical serialization is
//! little-endian:
//!
//! ```text
//! total_size: u32 | count: u32 | count x (tag: u32, slot: [u8; 8]) | blob payloads
//! ```
//!
//! A Bytes entry stores the payload length in its slot; the payloads follow
//! the entry table in entry order. Every set arriving from outside the
//! process goes through [`ParamSet::check_set_validity`] before anything
//! looks at its entries.

use crate::blob::Blob;
use crate::error::{Error, Result};
use crate::param::{Param, Value, PARAM_ENTRY_SIZE};
use crate::tag::{Tag, TagKind};
use tracing::{debug, warn};

/// Header: `total_size` + `count`.
pub const PARAM_SET_HEADER_SIZE: usize = 8;

/// Hard upper bound on the serialized size of one set.
pub const PARAM_SET_MAX_SIZE: usize = 4 * 1024 * 1024;

/// Upper bound on the number of entries in one set.
pub const MAX_PARAM_COUNT: usize = 2048;

/// Ordered collection of tagged parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamSet {
    params: Vec<Param>,
    total_size: u32,
    built: bool,
}

impl ParamSet {
    /// Empty, mutable set.
    pub fn new() -> Self {
        Self {
            params: Vec::new(),
            total_size: PARAM_SET_HEADER_SIZE as u32,
            built: false,
        }
    }

    /// Add `params` and build in one step.
    pub fn from_params(params: impl IntoIterator<Item = Param>) -> Result<Self> {
        let params: Vec<Param> = params.into_iter().collect();
        let mut set = Self::new();
        set.add(&params)?;
        set.build()?;
        Ok(set)
    }

    /// Append parameters.
    ///
    /// The batch is validated as a whole before anything is appended: every
    /// tag must be known and agree with its value's kind, Bytes values must
    /// be non-empty, no tag may already be present (in the set or earlier in
    /// the batch), and the grown set must stay within the size and count
    /// limits. Appending clears the finalized flag.
    pub fn add(&mut self, params: &[Param]) -> Result<()> {
        if self.params.len() + params.len() > MAX_PARAM_COUNT {
            warn!(
                count = self.params.len(),
                adding = params.len(),
                "param set count limit exceeded"
            );
            return Err(Error::InvalidArgument);
        }

        let mut grown = self.serialized_size();
        for (i, param) in params.iter().enumerate() {
            check_param(param)?;
            if self.contains(param.tag) || params[..i].iter().any(|p| p.tag == param.tag) {
                warn!(tag = %param.tag, "duplicate tag rejected");
                return Err(Error::InvalidArgument);
            }
            grown += param.serialized_size();
            if grown > PARAM_SET_MAX_SIZE {
                warn!(size = grown, "param set size limit exceeded");
                return Err(Error::InvalidArgument);
            }
        }

        self.params.extend_from_slice(params);
        self.built = false;
        Ok(())
    }

    /// Finalize `total_size`/`count` and run the structural validation pass.
    pub fn build(&mut self) -> Result<()> {
        self.check_tag_validity()?;
        let size = self.serialized_size();
        if size > PARAM_SET_MAX_SIZE {
            return Err(Error::InvalidArgument);
        }
        self.total_size = size as u32;
        self.built = true;
        Ok(())
    }

    /// Recompute bookkeeping after a trusted in-place edit such as
    /// [`ParamSet::push_trusted`]. Deep copies are plain `clone()`s since a
    /// set always owns its payloads.
    pub fn refresh(&mut self) -> Result<()> {
        let size = self.serialized_size();
        if size > PARAM_SET_MAX_SIZE || self.params.len() > MAX_PARAM_COUNT {
            return Err(Error::InvalidArgument);
        }
        self.total_size = size as u32;
        self.built = true;
        Ok(())
    }

    /// Append one parameter without the add pipeline. The set is left
    /// unfinalized until [`ParamSet::refresh`].
    pub fn push_trusted(&mut self, param: Param) {
        self.params.push(param);
        self.built = false;
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Finalized size. Only authoritative after `build`/`refresh`.
    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn count(&self) -> u32 {
        self.params.len() as u32
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.params.iter()
    }

    /// Serialized byte length recomputed from the entries.
    pub fn serialized_size(&self) -> usize {
        PARAM_SET_HEADER_SIZE
            + self
                .params
                .iter()
                .map(Param::serialized_size)
                .sum::<usize>()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.params.iter().any(|p| p.tag == tag)
    }

    /// First entry carrying `tag`.
    pub fn get(&self, tag: Tag) -> Result<&Param> {
        self.params
            .iter()
            .find(|p| p.tag == tag)
            .ok_or(Error::ParamNotExist)
    }

    pub fn get_i32(&self, tag: Tag) -> Result<i32> {
        match self.get(tag)?.value {
            Value::Int32(v) => Ok(v),
            _ => Err(Error::InvalidArgument),
        }
    }

    pub fn get_u32(&self, tag: Tag) -> Result<u32> {
        match self.get(tag)?.value {
            Value::Uint32(v) => Ok(v),
            _ => Err(Error::InvalidArgument),
        }
    }

    pub fn get_u64(&self, tag: Tag) -> Result<u64> {
        match self.get(tag)?.value {
            Value::Uint64(v) => Ok(v),
            _ => Err(Error::InvalidArgument),
        }
    }

    pub fn get_bool(&self, tag: Tag) -> Result<bool> {
        match self.get(tag)?.value {
            Value::Bool(v) => Ok(v),
            _ => Err(Error::InvalidArgument),
        }
    }

    pub fn get_bytes(&self, tag: Tag) -> Result<&Blob> {
        match &self.get(tag)?.value {
            Value::Bytes(b) => Ok(b),
            _ => Err(Error::InvalidArgument),
        }
    }

    /// Typed read of an optional parameter: `Ok(None)` when absent, an error
    /// only when present with the wrong kind.
    pub fn find_u32(&self, tag: Tag) -> Result<Option<u32>> {
        optional(self.get_u32(tag))
    }

    pub fn find_u64(&self, tag: Tag) -> Result<Option<u64>> {
        optional(self.get_u64(tag))
    }

    pub fn find_bool(&self, tag: Tag) -> Result<Option<bool>> {
        optional(self.get_bool(tag))
    }

    pub fn find_bytes(&self, tag: Tag) -> Result<Option<&Blob>> {
        optional(self.get_bytes(tag))
    }

    /// Re-validate every entry: known tag, matching kind, non-empty blob, no
    /// duplicates, and limits.
    pub fn check_tag_validity(&self) -> Result<()> {
        if self.params.len() > MAX_PARAM_COUNT {
            return Err(Error::InvalidArgument);
        }
        for (i, param) in self.params.iter().enumerate() {
            check_param(param)?;
            if self.params[..i].iter().any(|p| p.tag == param.tag) {
                warn!(tag = %param.tag, "duplicate tag in param set");
                return Err(Error::InvalidArgument);
            }
        }
        Ok(())
    }

    /// Remove every entry whose tag is in `tags`, returning how many went.
    pub fn delete_params(&mut self, tags: &[Tag]) -> usize {
        let before = self.params.len();
        self.params.retain(|p| !tags.contains(&p.tag));
        let removed = before - self.params.len();
        if removed > 0 {
            self.built = false;
        }
        removed
    }

    /// `base` with every entry of `extra` applied on top. Entries of `extra`
    /// replace same-tag entries of `base`.
    pub fn merge(base: &ParamSet, extra: &ParamSet) -> Result<ParamSet> {
        let mut merged = base.clone();
        let overridden: Vec<Tag> = extra.params.iter().map(|p| p.tag).collect();
        merged.delete_params(&overridden);
        merged.add(&extra.params)?;
        merged.build()?;
        Ok(merged)
    }

    /// Canonical serialization.
    pub fn to_bytes(&self) -> Vec<u8> {
        let size = self.serialized_size();
        let mut out = Vec::with_capacity(size);
        out.extend_from_slice(&(size as u32).to_le_bytes());
        out.extend_from_slice(&self.count().to_le_bytes());

        for param in &self.params {
            out.extend_from_slice(&param.tag.value().to_le_bytes());
            let mut slot = [0u8; 8];
            match &param.value {
                Value::Int32(v) => slot[..4].copy_from_slice(&v.to_le_bytes()),
                Value::Uint32(v) => slot[..4].copy_from_slice(&v.to_le_bytes()),
                Value::Uint64(v) => slot.copy_from_slice(&v.to_le_bytes()),
                Value::Bool(v) => slot[0] = u8::from(*v),
                Value::Bytes(b) => slot[..4].copy_from_slice(&b.size().to_le_bytes()),
            }
            out.extend_from_slice(&slot);
        }
        for param in &self.params {
            if let Value::Bytes(b) = &param.value {
                out.extend_from_slice(b.as_slice());
            }
        }
        out
    }

    /// Decode a serialized set. The header's own claimed size goes through
    /// [`ParamSet::check_set_validity`] first.
    pub fn from_bytes(bytes: &[u8]) -> Result<ParamSet> {
        let claimed = read_u32(bytes, 0)?;
        Self::check_set_validity(bytes, claimed)?;

        let count = read_u32(bytes, 4)? as usize;
        let mut params = Vec::with_capacity(count);
        let mut payload_at = PARAM_SET_HEADER_SIZE + count * PARAM_ENTRY_SIZE;

        for i in 0..count {
            let at = PARAM_SET_HEADER_SIZE + i * PARAM_ENTRY_SIZE;
            let tag = Tag::from_raw(read_u32(bytes, at)?);
            let slot = &bytes[at + 4..at + PARAM_ENTRY_SIZE];
            let used = match tag.kind() {
                TagKind::Ulong => 8,
                TagKind::Bool => 1,
                _ => 4,
            };
            // Unused slot bytes must be zero so every set has one encoding.
            if slot[used..].iter().any(|b| *b != 0) {
                return Err(Error::InvalidArgument);
            }
            let value = match tag.kind() {
                TagKind::Int => Value::Int32(i32::from_le_bytes(word(slot))),
                TagKind::Uint => Value::Uint32(u32::from_le_bytes(word(slot))),
                TagKind::Ulong => Value::Uint64(u64::from_le_bytes(dword(slot))),
                TagKind::Bool => match slot[0] {
                    0 => Value::Bool(false),
                    1 => Value::Bool(true),
                    _ => return Err(Error::InvalidArgument),
                },
                TagKind::Bytes => {
                    let len = u32::from_le_bytes(word(slot)) as usize;
                    let end = payload_at
                        .checked_add(len)
                        .filter(|end| *end <= bytes.len())
                        .ok_or(Error::InvalidArgument)?;
                    let blob = Blob::from_slice(&bytes[payload_at..end]);
                    payload_at = end;
                    Value::Bytes(blob)
                }
                TagKind::Invalid => return Err(Error::InvalidArgument),
            };
            params.push(Param::new(tag, value));
        }

        let mut set = ParamSet {
            params,
            total_size: 0,
            built: false,
        };
        set.build()?;
        debug!(count = set.len(), size = set.total_size, "param set decoded");
        Ok(set)
    }

    /// Trust-boundary check on serialized bytes.
    ///
    /// The transport's `claimed_size`, the header's `total_size`, the actual
    /// byte length and the size re-derived by walking the entry table must
    /// all agree, and the limits must hold.
    pub fn check_set_validity(bytes: &[u8], claimed_size: u32) -> Result<()> {
        let claimed = claimed_size as usize;
        if claimed < PARAM_SET_HEADER_SIZE || claimed > PARAM_SET_MAX_SIZE {
            warn!(claimed, "param set size out of range");
            return Err(Error::InvalidArgument);
        }
        if bytes.len() != claimed || read_u32(bytes, 0)? as usize != claimed {
            warn!(claimed, actual = bytes.len(), "param set size mismatch");
            return Err(Error::InvalidArgument);
        }

        let count = read_u32(bytes, 4)? as usize;
        if count > MAX_PARAM_COUNT {
            return Err(Error::InvalidArgument);
        }
        let table_end = PARAM_SET_HEADER_SIZE + count * PARAM_ENTRY_SIZE;
        if table_end > claimed {
            return Err(Error::InvalidArgument);
        }

        let mut derived = table_end;
        for i in 0..count {
            let at = PARAM_SET_HEADER_SIZE + i * PARAM_ENTRY_SIZE;
            let tag = Tag::from_raw(read_u32(bytes, at)?);
            if tag.kind() == TagKind::Bytes {
                derived = derived
                    .checked_add(read_u32(bytes, at + 4)? as usize)
                    .ok_or(Error::InvalidArgument)?;
            }
        }
        if derived != claimed {
            warn!(claimed, derived, "param set entries disagree with claimed size");
            return Err(Error::InvalidArgument);
        }
        Ok(())
    }

    /// Deep-copy a foreign set after it passes validation.
    pub fn copy(bytes: &[u8], claimed_size: u32) -> Result<ParamSet> {
        Self::check_set_validity(bytes, claimed_size)?;
        Self::from_bytes(bytes)
    }
}

impl<'a> IntoIterator for &'a ParamSet {
    type Item = &'a Param;
    type IntoIter = std::slice::Iter<'a, Param>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

/// Fail with `InvalidArgument` if any of `params` already has its tag in
/// `target`.
pub fn check_is_tag_already_exist(params: &[Param], target: &ParamSet) -> Result<()> {
    match params.iter().find(|p| target.contains(p.tag)) {
        Some(p) => {
            debug!(tag = %p.tag, "tag already present");
            Err(Error::InvalidArgument)
        }
        None => Ok(()),
    }
}

/// Compare two parameters by tag and kind-specific value.
pub fn check_param_match(a: &Param, b: &Param) -> Result<()> {
    if !a.is_kind_consistent() || !b.is_kind_consistent() {
        return Err(Error::InvalidArgument);
    }
    if a.matches(b) {
        Ok(())
    } else {
        Err(Error::InvalidArgument)
    }
}

fn check_param(param: &Param) -> Result<()> {
    if !param.tag.is_known() || !param.is_kind_consistent() {
        warn!(tag = %param.tag, "unknown tag or kind mismatch");
        return Err(Error::InvalidArgument);
    }
    if let Value::Bytes(b) = &param.value {
        if b.is_empty() || b.len() > PARAM_SET_MAX_SIZE {
            return Err(Error::InvalidArgument);
        }
    }
    Ok(())
}

fn optional<T>(found: Result<T>) -> Result<Option<T>> {
    match found {
        Ok(v) => Ok(Some(v)),
        Err(Error::ParamNotExist) => Ok(None),
        Err(e) => Err(e),
    }
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32> {
    bytes
        .get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or(Error::InvalidArgument)
}

fn word(slot: &[u8]) -> [u8; 4] {
    [slot[0], slot[1], slot[2], slot[3]]
}

fn dword(slot: &[u8]) -> [u8; 8] {
    let mut out = [0u8; 8];
    out.copy_from_slice(&slot[..8]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> ParamSet {
        ParamSet::from_params([
            Param::uint32(Tag::ALGORITHM, 20),
            Param::uint32(Tag::KEY_SIZE, 256),
            Param::bytes(Tag::KEY_ALIAS, b"alias".to_vec()),
            Param::boolean(Tag::IS_KEY_ALIAS, true),
            Param::uint64(Tag::CREATION_DATETIME, 1_700_000_000_000),
            Param::int32(Tag::KEY_AUTH_RESULT, -1),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_sizes() {
        let set = sample();
        assert!(set.is_built());
        assert_eq!(set.count(), 6);
        assert_eq!(set.total_size() as usize, 8 + 6 * 12 + 5);
        assert_eq!(set.to_bytes().len(), set.total_size() as usize);
    }

    #[test]
    fn test_typed_getters() {
        let set = sample();
        assert_eq!(set.get_u32(Tag::ALGORITHM).unwrap(), 20);
        assert_eq!(set.get_bytes(Tag::KEY_ALIAS).unwrap().as_slice(), b"alias");
        assert_eq!(set.get_i32(Tag::KEY_AUTH_RESULT).unwrap(), -1);
        assert_eq!(set.get_u32(Tag::PURPOSE), Err(Error::ParamNotExist));
        assert_eq!(set.get_u64(Tag::ALGORITHM), Err(Error::InvalidArgument));
        assert_eq!(set.find_u32(Tag::PURPOSE).unwrap(), None);
    }

    #[test]
    fn test_add_rejects_kind_mismatch() {
        let mut set = ParamSet::new();
        let err = set.add(&[Param::uint64(Tag::ALGORITHM, 1)]).unwrap_err();
        assert_eq!(err, Error::InvalidArgument);
        assert!(set.is_empty());
    }

    #[test]
    fn test_add_rejects_duplicates() {
        let mut set = ParamSet::new();
        set.add(&[Param::uint32(Tag::ALGORITHM, 1)]).unwrap();
        assert!(set.add(&[Param::uint32(Tag::ALGORITHM, 2)]).is_err());
        assert!(set
            .add(&[
                Param::uint32(Tag::PURPOSE, 4),
                Param::uint32(Tag::PURPOSE, 8)
            ])
            .is_err());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_add_rejects_empty_blob_and_unknown_tag() {
        let mut set = ParamSet::new();
        assert!(set.add(&[Param::bytes(Tag::KEY_ALIAS, Vec::new())]).is_err());
        let unknown = Param::uint32(Tag::from_raw((2 << 28) | 0x0777_0000), 1);
        assert!(set.add(&[unknown]).is_err());
    }

    #[test]
    fn test_add_rejects_oversized() {
        let mut set = ParamSet::new();
        let big = vec![0u8; PARAM_SET_MAX_SIZE];
        assert!(set.add(&[Param::bytes(Tag::KEY, big)]).is_err());
    }

    #[test]
    fn test_decode_roundtrip() {
        let set = sample();
        let decoded = ParamSet::from_bytes(&set.to_bytes()).unwrap();
        assert_eq!(decoded, set);
    }

    #[test]
    fn test_decode_rejects_dirty_slot_padding() {
        // The single entry's value slot spans bytes 12..20.
        let cases = [
            (Param::boolean(Tag::IS_KEY_ALIAS, true), 13),
            (Param::uint32(Tag::KEY_SIZE, 256), 16),
            (Param::int32(Tag::KEY_AUTH_RESULT, -1), 19),
            (Param::bytes(Tag::KEY_ALIAS, b"alias".to_vec()), 17),
        ];
        for (param, dirty) in cases {
            let bytes = ParamSet::from_params([param]).unwrap().to_bytes();
            assert!(ParamSet::from_bytes(&bytes).is_ok());
            let mut bad = bytes.clone();
            bad[dirty] = 0xAB;
            assert_eq!(ParamSet::from_bytes(&bad), Err(Error::InvalidArgument));
        }
    }

    #[test]
    fn test_validity_rejects_bad_count() {
        let mut bytes = sample().to_bytes();
        bytes[4] = 7;
        let claimed = bytes.len() as u32;
        assert!(ParamSet::check_set_validity(&bytes, claimed).is_err());
    }

    #[test]
    fn test_validity_rejects_bad_total_size() {
        let mut bytes = sample().to_bytes();
        bytes[0] = bytes[0].wrapping_add(1);
        let claimed = bytes.len() as u32;
        assert!(ParamSet::check_set_validity(&bytes, claimed).is_err());
        assert!(ParamSet::check_set_validity(&sample().to_bytes(), claimed + 1).is_err());
    }

    #[test]
    fn test_validity_rejects_truncated_blob() {
        let bytes = sample().to_bytes();
        let cut = &bytes[..bytes.len() - 1];
        assert!(ParamSet::from_bytes(cut).is_err());
    }

    #[test]
    fn test_copy_deep() {
        let set = sample();
        let bytes = set.to_bytes();
        let copied = ParamSet::copy(&bytes, bytes.len() as u32).unwrap();
        drop(bytes);
        assert_eq!(copied, set);
    }

    #[test]
    fn test_merge_overrides() {
        let base = sample();
        let extra = ParamSet::from_params([
            Param::uint32(Tag::KEY_SIZE, 128),
            Param::uint32(Tag::PURPOSE, 1),
        ])
        .unwrap();
        let merged = ParamSet::merge(&base, &extra).unwrap();
        assert_eq!(merged.get_u32(Tag::KEY_SIZE).unwrap(), 128);
        assert_eq!(merged.get_u32(Tag::PURPOSE).unwrap(), 1);
        assert_eq!(merged.len(), base.len() + 1);
    }

    #[test]
    fn test_delete_and_exist_check() {
        let mut set = sample();
        let probe = [Param::uint32(Tag::ALGORITHM, 1)];
        assert!(check_is_tag_already_exist(&probe, &set).is_err());
        assert_eq!(set.delete_params(&[Tag::ALGORITHM, Tag::PURPOSE]), 1);
        assert!(!set.is_built());
        assert!(check_is_tag_already_exist(&probe, &set).is_ok());
    }

    #[test]
    fn test_refresh_after_trusted_push() {
        let mut set = sample();
        set.push_trusted(Param::bytes(Tag::AUTH_TOKEN, vec![1u8; 10]));
        assert!(!set.is_built());
        set.refresh().unwrap();
        assert_eq!(set.total_size() as usize, set.serialized_size());
    }

    #[test]
    fn test_param_match() {
        let a = Param::bytes(Tag::KEY_ALIAS, b"x".to_vec());
        assert!(check_param_match(&a, &a.clone()).is_ok());
        assert!(check_param_match(&a, &Param::bytes(Tag::KEY_ALIAS, b"y".to_vec())).is_err());
    }

    fn arb_param() -> impl Strategy<Value = Param> {
        let tags = Tag::KNOWN.to_vec();
        (proptest::sample::select(tags), any::<u64>(), proptest::collection::vec(any::<u8>(), 1..32))
            .prop_map(|(tag, n, bytes)| {
                let value = match tag.kind() {
                    TagKind::Int => Value::Int32(n as i32),
                    TagKind::Uint => Value::Uint32(n as u32),
                    TagKind::Ulong => Value::Uint64(n),
                    TagKind::Bool => Value::Bool(n & 1 == 1),
                    _ => Value::Bytes(Blob::new(bytes)),
                };
                Param::new(tag, value)
            })
    }

    proptest! {
        #[test]
        fn prop_build_then_get(params in proptest::collection::vec(arb_param(), 0..24)) {
            let mut unique: Vec<Param> = Vec::new();
            for p in params {
                if !unique.iter().any(|u| u.tag == p.tag) {
                    unique.push(p);
                }
            }
            let set = ParamSet::from_params(unique.clone()).unwrap();
            let expected = PARAM_SET_HEADER_SIZE
                + unique.iter().map(Param::serialized_size).sum::<usize>();
            prop_assert_eq!(set.total_size() as usize, expected);
            for p in &unique {
                prop_assert_eq!(set.get(p.tag).unwrap(), p);
            }
            let bytes = set.to_bytes();
            prop_assert!(ParamSet::check_set_validity(&bytes, bytes.len() as u32).is_ok());
            prop_assert_eq!(ParamSet::from_bytes(&bytes).unwrap(), set);
        }

        #[test]
        fn prop_corrupt_length_rejected(params in proptest::collection::vec(arb_param(), 1..12), delta in 1u32..64) {
            let mut unique: Vec<Param> = Vec::new();
            for p in params {
                if !unique.iter().any(|u| u.tag == p.tag) {
                    unique.push(p);
                }
            }
            let set = ParamSet::from_params(unique).unwrap();
            let mut bytes = set.to_bytes();
            let size = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            bytes[..4].copy_from_slice(&size.wrapping_add(delta).to_le_bytes());
            prop_assert!(ParamSet::check_set_validity(&bytes, bytes.len() as u32).is_err());
        }
    }
}
