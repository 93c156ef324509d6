//! Content-addressed store for intermediate filter results.
//!
//! # Module Structure
//!
//! ```text
//! cache/
//! ├── key.rs      # CacheKey + builder (blake3 over length-prefixed parts)
//! ├── memory.rs   # MemoryCache (bounded LRU)
//! ├── disk.rs     # FilesystemCache (one file per key, atomic writes)
//! └── mod.rs      # Cache trait, CacheKind (this file)
//! ```
//!
//! Caches are best effort: `get` failures are misses and `set` failures are
//! logged. Keys are opaque to the cache; [`crate::filter::FilterTool`],
//! the updater and the cache manifest build them.

mod disk;
mod key;
mod memory;

pub use disk::FilesystemCache;
pub use key::{CacheKey, CacheKeyBuilder};
pub use memory::MemoryCache;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Default directory name of the filesystem cache, under the environment directory.
pub const CACHE_DIR: &str = ".assets-cache";

/// Default capacity of the in-memory cache.
pub const DEFAULT_MEMORY_CAPACITY: usize = 100;

/// Key/value store of intermediate results.
pub trait Cache: Send + Sync + fmt::Debug {
    /// Cached bytes for `key`, or `None` on miss or unreadable entry.
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>>;

    /// Store `value` under `key`. Never fails; problems are logged.
    fn set(&self, key: &CacheKey, value: &[u8]);

    /// Backing directory, for caches that persist to disk.
    fn directory(&self) -> Option<&Path> {
        None
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// The `cache` setting: `false | true | "memory[:capacity]" | <path>`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CacheKind {
    Disabled,
    /// Filesystem cache at `<directory>/.assets-cache`.
    #[default]
    Default,
    Directory(PathBuf),
    Memory(usize),
}

impl FromStr for CacheKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s {
            "false" | "off" | "none" => Ok(Self::Disabled),
            "true" | "on" | "" => Ok(Self::Default),
            "memory" => Ok(Self::Memory(DEFAULT_MEMORY_CAPACITY)),
            _ => match s.strip_prefix("memory:") {
                Some(cap) => cap
                    .parse()
                    .map(Self::Memory)
                    .map_err(|_| Error::config(format!("invalid memory cache capacity `{cap}`"))),
                None => Ok(Self::Directory(PathBuf::from(s))),
            },
        }
    }
}

impl<'de> Deserialize<'de> for CacheKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(true) => Ok(Self::Default),
            Raw::Flag(false) => Ok(Self::Disabled),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

impl CacheKind {
    /// Instantiate the configured cache.
    ///
    /// Relative directories resolve against `base`. Without a base directory
    /// the default cache falls back to memory.
    pub fn build(&self, base: Option<&Path>) -> Result<Option<Arc<dyn Cache>>> {
        let cache: Arc<dyn Cache> = match self {
            Self::Disabled => return Ok(None),
            Self::Default => match base {
                Some(base) => Arc::new(FilesystemCache::new(base.join(CACHE_DIR))),
                None => {
                    crate::debug!("cache"; "no directory configured, using memory cache");
                    Arc::new(MemoryCache::new(DEFAULT_MEMORY_CAPACITY))
                }
            },
            Self::Directory(dir) => {
                let dir = match base {
                    Some(base) if dir.is_relative() => base.join(dir),
                    _ => dir.clone(),
                };
                Arc::new(FilesystemCache::new(dir))
            }
            Self::Memory(capacity) => Arc::new(MemoryCache::new(*capacity)),
        };
        Ok(Some(cache))
    }
}
