//! Key storage seam.

use keystore_core::{Error, Result};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Persistence for sealed key blobs, keyed by alias.
pub trait KeyStorage: Send + Sync {
    /// Sealed blob stored under `alias`, or `NotExist`.
    fn get(&self, alias: &[u8]) -> Result<Vec<u8>>;
    /// Store `blob`, replacing any previous blob under the same alias.
    fn put(&self, alias: &[u8], blob: Vec<u8>) -> Result<()>;
    fn delete(&self, alias: &[u8]) -> Result<()>;
    fn exists(&self, alias: &[u8]) -> bool;
    fn list(&self) -> Vec<Vec<u8>>;
}

/// In-process storage.
#[derive(Debug, Default)]
pub struct MemoryKeyStorage {
    entries: RwLock<HashMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryKeyStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStorage for MemoryKeyStorage {
    fn get(&self, alias: &[u8]) -> Result<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(alias).cloned().ok_or(Error::NotExist)
    }

    fn put(&self, alias: &[u8], blob: Vec<u8>) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(alias.to_vec(), blob);
        Ok(())
    }

    fn delete(&self, alias: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(alias).map(|_| ()).ok_or(Error::NotExist)
    }

    fn exists(&self, alias: &[u8]) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.contains_key(alias)
    }

    fn list(&self) -> Vec<Vec<u8>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let mut aliases: Vec<_> = entries.keys().cloned().collect();
        aliases.sort();
        aliases
    }
}
