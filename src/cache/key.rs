//! Cache keys.

use std::fmt;

/// Opaque, content-addressed cache key: a blake3 digest rendered as hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Start a key in `namespace` (e.g. `"hunk"`, `"bdef"`, `"manifest"`).
    pub fn builder(namespace: &str) -> CacheKeyBuilder {
        CacheKeyBuilder::new(namespace)
    }

    /// Key made of a namespace and a single part.
    pub fn simple(namespace: &str, part: impl AsRef<[u8]>) -> Self {
        Self::builder(namespace).part(part).finish()
    }

    /// Hex form, used as the on-disk file name.
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // first 16 chars are plenty for log lines
        write!(f, "{}", &self.0[..16])
    }
}

/// Incremental key construction. Parts are length-prefixed, so
/// `["ab", "c"]` and `["a", "bc"]` give different keys.
pub struct CacheKeyBuilder {
    hasher: blake3::Hasher,
}

impl CacheKeyBuilder {
    fn new(namespace: &str) -> Self {
        let mut builder = Self {
            hasher: blake3::Hasher::new(),
        };
        builder.push(namespace.as_bytes());
        builder
    }

    fn push(&mut self, bytes: &[u8]) {
        self.hasher.update(&(bytes.len() as u64).to_le_bytes());
        self.hasher.update(bytes);
    }

    /// Append one part.
    pub fn part(mut self, part: impl AsRef<[u8]>) -> Self {
        self.push(part.as_ref());
        self
    }

    /// Append several parts, with their count so list boundaries stay unambiguous.
    pub fn parts<I, P>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<[u8]>,
    {
        let parts: Vec<P> = parts.into_iter().collect();
        self.hasher.update(&(parts.len() as u64).to_le_bytes());
        for part in &parts {
            self.push(part.as_ref());
        }
        self
    }

    pub fn finish(self) -> CacheKey {
        CacheKey(self.hasher.finalize().to_hex().to_string())
    }
}
