//! Operation specs distilled from parameter sets.
//!
//! Abilities never read parameter sets themselves; callers resolve the
//! handful of fields an algorithm needs into one of these specs first.

use keystore_core::{
    Algorithm, Blob, BlockMode, Digest, Error, Padding, ParamSet, Purpose, Result, Tag,
};

/// Key generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeySpec {
    pub algorithm: Algorithm,
    /// Key size in bits.
    pub key_size: u32,
}

impl KeySpec {
    pub fn new(algorithm: Algorithm, key_size: u32) -> Self {
        Self {
            algorithm,
            key_size,
        }
    }

    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let algorithm = read_algorithm(params)?;
        let key_size = params
            .get_u32(Tag::KEY_SIZE)
            .map_err(|_| Error::CheckGetKeySizeFail)?;
        Ok(Self::new(algorithm, key_size))
    }
}

/// Usage parameters for sign, verify, encrypt, decrypt and MAC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageSpec {
    pub algorithm: Algorithm,
    pub purpose: Purpose,
    pub digest: Digest,
    pub padding: Padding,
    pub mode: Option<BlockMode>,
    pub iv: Option<Blob>,
    pub nonce: Option<Blob>,
    pub aad: Option<Blob>,
    pub ae_tag: Option<Blob>,
}

impl UsageSpec {
    pub fn new(algorithm: Algorithm, purpose: Purpose) -> Self {
        Self {
            algorithm,
            purpose,
            digest: Digest::None,
            padding: Padding::None,
            mode: None,
            iv: None,
            nonce: None,
            aad: None,
            ae_tag: None,
        }
    }

    pub fn with_digest(mut self, digest: Digest) -> Self {
        self.digest = digest;
        self
    }

    pub fn with_padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_mode(mut self, mode: BlockMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_iv(mut self, iv: impl Into<Blob>) -> Self {
        self.iv = Some(iv.into());
        self
    }

    pub fn with_nonce(mut self, nonce: impl Into<Blob>) -> Self {
        self.nonce = Some(nonce.into());
        self
    }

    pub fn with_aad(mut self, aad: impl Into<Blob>) -> Self {
        self.aad = Some(aad.into());
        self
    }

    /// Build from a runtime set. PURPOSE must name exactly one purpose.
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let algorithm = read_algorithm(params)?;
        let purpose = Purpose::from_bits(
            params
                .get_u32(Tag::PURPOSE)
                .map_err(|_| Error::CheckGetPurposeFail)?,
        );
        if !purpose.is_single() {
            return Err(Error::InvalidPurpose);
        }

        let digest = match params.find_u32(Tag::DIGEST)? {
            Some(v) => Digest::try_from(v)?,
            None => Digest::None,
        };
        let padding = match params.find_u32(Tag::PADDING)? {
            Some(v) => Padding::try_from(v)?,
            None => Padding::None,
        };
        let mode = params
            .find_u32(Tag::BLOCK_MODE)?
            .map(BlockMode::try_from)
            .transpose()?;

        Ok(Self {
            algorithm,
            purpose,
            digest,
            padding,
            mode,
            iv: params.find_bytes(Tag::IV)?.cloned(),
            nonce: params.find_bytes(Tag::NONCE)?.cloned(),
            aad: params.find_bytes(Tag::ASSOCIATED_DATA)?.cloned(),
            ae_tag: params.find_bytes(Tag::AE_TAG)?.cloned(),
        })
    }
}

/// Key derivation parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveSpec {
    /// `Hkdf` or `Pbkdf2`.
    pub algorithm: Algorithm,
    pub digest: Digest,
    pub salt: Option<Blob>,
    pub info: Option<Blob>,
    pub iterations: u32,
    /// Output length in bytes.
    pub output_len: usize,
}

impl DeriveSpec {
    pub fn from_params(params: &ParamSet) -> Result<Self> {
        let algorithm = read_algorithm(params)?;
        let digest = Digest::try_from(
            params
                .get_u32(Tag::DIGEST)
                .map_err(|_| Error::CheckGetDigestFail)?,
        )?;
        let output_len = params
            .get_u32(Tag::DERIVE_KEY_SIZE)
            .map_err(|_| Error::CheckGetKeySizeFail)? as usize;

        let iterations = match algorithm {
            Algorithm::Pbkdf2 => params
                .get_u32(Tag::ITERATION)
                .map_err(|_| Error::CheckGetIterationFail)?,
            _ => 0,
        };
        let salt = params.find_bytes(Tag::SALT)?.cloned();
        if algorithm == Algorithm::Pbkdf2 && salt.is_none() {
            return Err(Error::CheckGetSaltFail);
        }

        Ok(Self {
            algorithm,
            digest,
            salt,
            info: params.find_bytes(Tag::INFO)?.cloned(),
            iterations,
            output_len,
        })
    }
}

fn read_algorithm(params: &ParamSet) -> Result<Algorithm> {
    let raw = params
        .get_u32(Tag::ALGORITHM)
        .map_err(|_| Error::CheckGetAlgFail)?;
    Algorithm::try_from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystore_core::Param;

    #[test]
    fn test_usage_from_params() {
        let params = ParamSet::from_params([
            Param::uint32(Tag::ALGORITHM, Algorithm::Aes.value()),
            Param::uint32(Tag::PURPOSE, Purpose::ENCRYPT.bits()),
            Param::uint32(Tag::BLOCK_MODE, BlockMode::Gcm.value()),
            Param::bytes(Tag::NONCE, vec![0u8; 12]),
        ])
        .unwrap();
        let spec = UsageSpec::from_params(&params).unwrap();
        assert_eq!(spec.mode, Some(BlockMode::Gcm));
        assert_eq!(spec.padding, Padding::None);
        assert_eq!(spec.nonce.unwrap().len(), 12);
    }

    #[test]
    fn test_usage_requires_single_purpose() {
        let params = ParamSet::from_params([
            Param::uint32(Tag::ALGORITHM, Algorithm::Aes.value()),
            Param::uint32(Tag::PURPOSE, (Purpose::ENCRYPT | Purpose::DECRYPT).bits()),
        ])
        .unwrap();
        assert_eq!(UsageSpec::from_params(&params), Err(Error::InvalidPurpose));
    }

    #[test]
    fn test_missing_algorithm() {
        let params = ParamSet::from_params([Param::uint32(Tag::KEY_SIZE, 256)]).unwrap();
        assert_eq!(KeySpec::from_params(&params), Err(Error::CheckGetAlgFail));
    }

    #[test]
    fn test_pbkdf2_requires_salt() {
        let params = ParamSet::from_params([
            Param::uint32(Tag::ALGORITHM, Algorithm::Pbkdf2.value()),
            Param::uint32(Tag::DIGEST, Digest::Sha256.value()),
            Param::uint32(Tag::DERIVE_KEY_SIZE, 32),
            Param::uint32(Tag::ITERATION, 1000),
        ])
        .unwrap();
        assert_eq!(DeriveSpec::from_params(&params), Err(Error::CheckGetSaltFail));
    }
}
