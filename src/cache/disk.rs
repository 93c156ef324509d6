//! Directory-backed cache: one file per key, named by the key's hex.
//!
//! Entries are raw bytes without metadata. Writes go through a temp file and
//! a rename, so concurrent writers never expose partial entries; the last
//! writer wins, which is harmless because keys are content-addressed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{Cache, CacheKey};
use crate::utils::fs::atomic_write;

#[derive(Debug, Clone)]
pub struct FilesystemCache {
    directory: PathBuf,
}

impl FilesystemCache {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.directory.join(key.as_hex())
    }
}

impl Cache for FilesystemCache {
    fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        match fs::read(&path) {
            Ok(data) => Some(data),
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                crate::debug!("cache"; "unreadable entry {}: {}", path.display(), e);
                None
            }
        }
    }

    fn set(&self, key: &CacheKey, value: &[u8]) {
        let path = self.entry_path(key);
        if let Err(e) = atomic_write(&path, value) {
            crate::log!("cache"; "failed to store {}: {}", path.display(), e);
        }
    }

    fn directory(&self) -> Option<&Path> {
        Some(&self.directory)
    }
}
