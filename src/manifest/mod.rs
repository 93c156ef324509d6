//! Persisted `output template → version` records.
//!
//! A manifest lets a process that did not build a bundle learn its current
//! version without rebuilding or re-hashing it.
//!
//! | Config value       | Manifest                                          |
//! |--------------------|---------------------------------------------------|
//! | `"cache"`          | entries in the environment cache (default)        |
//! | `"file[:path]"`    | JSON document, default `.assets-manifest.json`    |
//! | `"json[:path]"`    | same as `"file[:path]"`                           |
//! | `"lines[:path]"`   | line-delimited file, default `.assets-manifest`   |
//! | `false` / `"none"` | no manifest                                       |

mod file;

pub use file::{FileManifest, ManifestFormat};

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::bundle::Bundle;
use crate::cache::{Cache, CacheKey};
use crate::env::Environment;
use crate::error::{Error, Result};

pub trait Manifest: Send + Sync + fmt::Debug {
    /// Recorded version of `bundle`, if any.
    fn query(&self, bundle: &Bundle, env: &Environment) -> Result<Option<String>>;

    /// Record `version` as the current version of `bundle`.
    fn remember(&self, bundle: &Bundle, env: &Environment, version: &str) -> Result<()>;
}

// ============================================================================
// Cache-backed
// ============================================================================

/// Stores versions in the environment cache under `("manifest", output)`.
#[derive(Debug, Clone)]
pub struct CacheManifest {
    cache: Arc<dyn Cache>,
}

impl CacheManifest {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self { cache }
    }

    fn key(bundle: &Bundle) -> Option<CacheKey> {
        bundle.output().map(|output| CacheKey::simple("manifest", output))
    }
}

impl Manifest for CacheManifest {
    fn query(&self, bundle: &Bundle, _env: &Environment) -> Result<Option<String>> {
        Ok(Self::key(bundle)
            .and_then(|key| self.cache.get(&key))
            .and_then(|raw| String::from_utf8(raw).ok()))
    }

    fn remember(&self, bundle: &Bundle, _env: &Environment, version: &str) -> Result<()> {
        if let Some(key) = Self::key(bundle) {
            self.cache.set(&key, version.as_bytes());
        }
        Ok(())
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// The `manifest` setting.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ManifestKind {
    None,
    #[default]
    Cache,
    File {
        format: ManifestFormat,
        path: Option<PathBuf>,
    },
}

impl ManifestKind {
    /// Instantiate the configured manifest.
    ///
    /// A cache manifest needs a cache, and a file manifest without an
    /// explicit path needs a base directory; both are [`Error::Config`]
    /// when missing.
    pub fn build(
        &self,
        base: Option<&Path>,
        cache: Option<&Arc<dyn Cache>>,
    ) -> Result<Option<Arc<dyn Manifest>>> {
        let manifest: Arc<dyn Manifest> = match self {
            Self::None => return Ok(None),
            Self::Cache => {
                let cache = cache.ok_or_else(|| {
                    Error::config("manifest = \"cache\" requires the cache to be enabled")
                })?;
                Arc::new(CacheManifest::new(cache.clone()))
            }
            Self::File { format, path } => {
                let path = match (path, base) {
                    (Some(path), Some(base)) if path.is_relative() => base.join(path),
                    (Some(path), _) => path.clone(),
                    (None, Some(base)) => base.join(format.default_file_name()),
                    (None, None) => {
                        return Err(Error::config(
                            "a file manifest needs a path or an environment directory",
                        ));
                    }
                };
                Arc::new(FileManifest::new(path, *format))
            }
        };
        Ok(Some(manifest))
    }
}

impl FromStr for ManifestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (name, path) = match s.split_once(':') {
            Some((name, path)) => (name, Some(PathBuf::from(path))),
            None => (s, None),
        };
        match (name, path) {
            ("none" | "false" | "", None) => Ok(Self::None),
            ("cache", None) => Ok(Self::Cache),
            ("file" | "json", path) => Ok(Self::File {
                format: ManifestFormat::Json,
                path,
            }),
            ("lines", path) => Ok(Self::File {
                format: ManifestFormat::Lines,
                path,
            }),
            _ => Err(Error::config(format!(
                "invalid manifest value `{s}` (expected \"cache\", \"file[:path]\" or \"lines[:path]\")"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ManifestKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Ok(Self::None),
            Some(Raw::Flag(true)) => Ok(Self::Cache),
            Some(Raw::Text(s)) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
