//! Bundle versions: timestamps or content hashes.
//!
//! | Config value              | Versioner            | Version of a built bundle      |
//! |---------------------------|----------------------|--------------------------------|
//! | `"timestamp"`             | `TimestampVersioner` | newest source mtime, seconds   |
//! | `"hash"`                  | `HashVersioner`      | first 8 hex chars of MD5       |
//! | `"hash:12"`               | `HashVersioner`      | first 12 hex chars of MD5      |
//! | `"hash:16:sha256"`        | `HashVersioner`      | first 16 hex chars of SHA-256  |
//!
//! Given a hunk (during a build) the version describes the new content.
//! Without one it is derived from what is on disk.

mod hash;
mod timestamp;

pub use hash::{HashAlgorithm, HashVersioner};
pub use timestamp::TimestampVersioner;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer};

use crate::bundle::Bundle;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::hunk::Hunk;

pub trait Versioner: Send + Sync + fmt::Debug {
    /// Version of `bundle`, from `hunk` when given or from disk otherwise.
    ///
    /// Fails with [`Error::VersionIndeterminable`] when neither yields one.
    fn determine_version(
        &self,
        bundle: &Bundle,
        env: &Environment,
        hunk: Option<&Hunk>,
    ) -> Result<String>;
}

/// The `versions` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionerKind {
    Timestamp,
    Hash {
        length: usize,
        algorithm: HashAlgorithm,
    },
}

impl Default for VersionerKind {
    fn default() -> Self {
        Self::Hash {
            length: hash::DEFAULT_LENGTH,
            algorithm: HashAlgorithm::default(),
        }
    }
}

impl VersionerKind {
    pub fn build(self) -> Arc<dyn Versioner> {
        match self {
            Self::Timestamp => Arc::new(TimestampVersioner),
            Self::Hash { length, algorithm } => Arc::new(HashVersioner::new(length, algorithm)),
        }
    }
}

impl FromStr for VersionerKind {
    type Err = Error;

    /// `timestamp` or `hash[:length[:algorithm]]`.
    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.trim().split(':');
        match parts.next().unwrap_or_default() {
            "timestamp" if parts.next().is_none() => Ok(Self::Timestamp),
            "hash" => {
                let length = match parts.next() {
                    None | Some("") => hash::DEFAULT_LENGTH,
                    Some(n) => n
                        .parse()
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| Error::config(format!("invalid hash length `{n}`")))?,
                };
                let algorithm = match parts.next() {
                    None => HashAlgorithm::default(),
                    Some(name) => name.parse()?,
                };
                if parts.next().is_some() {
                    return Err(Error::config(format!("invalid versions value `{s}`")));
                }
                Ok(Self::Hash { length, algorithm })
            }
            _ => Err(Error::config(format!(
                "invalid versions value `{s}` (expected \"timestamp\" or \"hash[:length]\")"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for VersionerKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds() {
        assert_eq!("timestamp".parse::<VersionerKind>().unwrap(), VersionerKind::Timestamp);
        assert_eq!("hash".parse::<VersionerKind>().unwrap(), VersionerKind::default());
        assert_eq!(
            "hash:12".parse::<VersionerKind>().unwrap(),
            VersionerKind::Hash {
                length: 12,
                algorithm: HashAlgorithm::Md5
            }
        );
        assert_eq!(
            "hash:16:sha256".parse::<VersionerKind>().unwrap(),
            VersionerKind::Hash {
                length: 16,
                algorithm: HashAlgorithm::Sha256
            }
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("hash:zero".parse::<VersionerKind>().is_err());
        assert!("hash:0".parse::<VersionerKind>().is_err());
        assert!("hash:8:crc".parse::<VersionerKind>().is_err());
        assert!("mtime".parse::<VersionerKind>().is_err());
        assert!("timestamp:1".parse::<VersionerKind>().is_err());
    }
}
