//! Opaque per-operation crypto state.

use keystore_core::{Error, Result};
use std::any::Any;
use std::fmt;

/// State created by an ability's init entry point.
///
/// Only the ability that created a context knows its concrete type; every
/// other layer treats it as opaque and hands it back to the same ability
/// for update, final and free.
pub struct CryptoCtx(Box<dyn Any + Send>);

impl CryptoCtx {
    pub fn new<T: Any + Send>(state: T) -> Self {
        Self(Box::new(state))
    }

    pub fn downcast_mut<T: Any>(&mut self) -> Result<&mut T> {
        self.0.downcast_mut::<T>().ok_or(Error::BadState)
    }

    pub fn into_inner<T: Any>(self) -> Result<T> {
        self.0
            .downcast::<T>()
            .map(|b| *b)
            .map_err(|_| Error::BadState)
    }
}

impl fmt::Debug for CryptoCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CryptoCtx(..)")
    }
}
