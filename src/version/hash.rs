//! Content-hash versions.

use std::str::FromStr;

use md5::Md5;
use sha2::{Digest, Sha256, Sha384, Sha512};

use super::Versioner;
use crate::bundle::Bundle;
use crate::env::Environment;
use crate::error::{Error, IoResultExt, Result};
use crate::hunk::Hunk;
use crate::resolver::has_placeholder;

pub(super) const DEFAULT_LENGTH: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashAlgorithm {
    #[default]
    Md5,
    Sha256,
    Sha384,
    Sha512,
    Blake3,
}

impl HashAlgorithm {
    /// Lowercase hex digest of `data`.
    pub fn hex_digest(self, data: &[u8]) -> String {
        match self {
            Self::Md5 => hex::encode(Md5::digest(data)),
            Self::Sha256 => hex::encode(Sha256::digest(data)),
            Self::Sha384 => hex::encode(Sha384::digest(data)),
            Self::Sha512 => hex::encode(Sha512::digest(data)),
            Self::Blake3 => blake3::hash(data).to_hex().to_string(),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" => Ok(Self::Sha256),
            "sha384" => Ok(Self::Sha384),
            "sha512" => Ok(Self::Sha512),
            "blake3" => Ok(Self::Blake3),
            other => Err(Error::config(format!("unknown hash algorithm `{other}`"))),
        }
    }
}

/// Truncated hex digest of the built content.
#[derive(Debug, Clone, Copy)]
pub struct HashVersioner {
    length: usize,
    algorithm: HashAlgorithm,
}

impl HashVersioner {
    pub fn new(length: usize, algorithm: HashAlgorithm) -> Self {
        Self { length, algorithm }
    }

    fn version_of(&self, data: &[u8]) -> String {
        let mut digest = self.algorithm.hex_digest(data);
        digest.truncate(self.length);
        digest
    }
}

impl Default for HashVersioner {
    fn default() -> Self {
        Self::new(DEFAULT_LENGTH, HashAlgorithm::default())
    }
}

impl Versioner for HashVersioner {
    fn determine_version(
        &self,
        bundle: &Bundle,
        env: &Environment,
        hunk: Option<&Hunk>,
    ) -> Result<String> {
        if let Some(hunk) = hunk {
            return Ok(self.version_of(&hunk.bytes()?));
        }

        let Some(output) = bundle.output() else {
            return Err(Error::VersionIndeterminable(format!(
                "{} has no output to hash",
                bundle.label()
            )));
        };
        // the file name depends on the version we are looking for
        if has_placeholder(output) {
            return Err(Error::VersionIndeterminable(format!(
                "no built content to hash for `{output}`"
            )));
        }

        let path = env.resolver().resolve_output(env, output, None)?;
        if !path.is_file() {
            return Err(Error::VersionIndeterminable(format!(
                "`{output}` has not been built"
            )));
        }
        let data = std::fs::read(&path).at(&path)?;
        Ok(self.version_of(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digests() {
        assert_eq!(HashAlgorithm::Md5.hex_digest(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            HashAlgorithm::Sha256.hex_digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_truncation() {
        let versioner = HashVersioner::default();
        assert_eq!(versioner.version_of(b""), "d41d8cd9");
        assert_eq!(HashVersioner::new(100, HashAlgorithm::Md5).version_of(b"").len(), 32);
    }
}
