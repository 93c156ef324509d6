//! Serializing concurrent builds of the same output.
//!
//! Hosts that serve requests from several threads may ask for the URLs of
//! one bundle at once; with auto-build on, each request could start a build.
//! A [`KeyedLock`] lets only one of them write the output at a time.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::Result;
use crate::hunk::Hunk;

pub trait BuildLock: Send + Sync + fmt::Debug {
    /// Run `f` while holding the lock for `key` (an output template).
    fn run(&self, key: &str, f: &mut dyn FnMut() -> Result<Hunk>) -> Result<Hunk>;
}

/// No locking; the default for single-threaded use.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopLock;

impl BuildLock for NoopLock {
    fn run(&self, _key: &str, f: &mut dyn FnMut() -> Result<Hunk>) -> Result<Hunk> {
        f()
    }
}

/// One mutex per key.
#[derive(Debug, Default)]
pub struct KeyedLock {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BuildLock for KeyedLock {
    fn run(&self, key: &str, f: &mut dyn FnMut() -> Result<Hunk>) -> Result<Hunk> {
        // the shard guard must be gone before the key lock is taken
        let lock = self.locks.entry(key.to_string()).or_default().clone();
        let _guard = lock.lock();
        f()
    }
}
