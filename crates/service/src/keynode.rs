//! Live session table.
//!
//! Each Init inserts one node under a fresh random handle. The table lock is
//! only held to insert, look up or remove; callers work on a node through its
//! own lock so a slow crypto call never blocks other sessions.

use keystore_core::{Error, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

/// Shared handle to one live session.
pub type NodeRef<T> = Arc<Mutex<T>>;

/// Lock a session node, recovering from a poisoned lock.
pub fn lock_node<T>(node: &NodeRef<T>) -> MutexGuard<'_, T> {
    node.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
pub struct SessionTable<T> {
    nodes: Mutex<HashMap<u64, NodeRef<T>>>,
    capacity: usize,
}

impl<T> SessionTable<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            nodes: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    fn table(&self) -> MutexGuard<'_, HashMap<u64, NodeRef<T>>> {
        self.nodes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `node` under a new non-zero handle. Fails with
    /// `SessionReachedLimit` when the table is full; nothing is evicted.
    pub fn insert(&self, node: T) -> Result<u64> {
        let mut table = self.table();
        if table.len() >= self.capacity {
            warn!(live = table.len(), "session table full");
            return Err(Error::SessionReachedLimit);
        }
        let handle = loop {
            let candidate = OsRng.next_u64();
            if candidate != 0 && !table.contains_key(&candidate) {
                break candidate;
            }
        };
        table.insert(handle, Arc::new(Mutex::new(node)));
        debug!(handle, live = table.len(), "session created");
        Ok(handle)
    }

    pub fn get(&self, handle: u64) -> Result<NodeRef<T>> {
        self.table().get(&handle).cloned().ok_or(Error::NotExist)
    }

    /// Detach a session. Later lookups of `handle` report `NotExist`.
    pub fn remove(&self, handle: u64) -> Result<NodeRef<T>> {
        let mut table = self.table();
        let node = table.remove(&handle).ok_or(Error::NotExist)?;
        debug!(handle, live = table.len(), "session deleted");
        Ok(node)
    }

    pub fn len(&self) -> usize {
        self.table().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
