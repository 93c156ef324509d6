//! Hunks: immutable byte payloads with optional provenance.
//!
//! | Variant  | Payload                                        | Identity                 |
//! |----------|------------------------------------------------|--------------------------|
//! | `File`   | read lazily from disk, memoized                | path + content digest    |
//! | `Memory` | held in memory                                 | content digest           |
//! | `Url`    | fetched over HTTP once, memoized (cache-aware) | content digest           |
//!
//! Cloning a hunk is cheap: payloads are shared behind `Arc`.

mod url;

pub use url::UrlHunk;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::{IoResultExt, Result};
use crate::utils::fs::atomic_write;
use crate::utils::hash::digest_hex;

/// Shared payload bytes.
pub type Bytes = Arc<[u8]>;

#[derive(Clone)]
pub enum Hunk {
    File(FileHunk),
    Memory(MemoryHunk),
    Url(UrlHunk),
}

impl Hunk {
    /// Hunk over a file on disk (not read until needed).
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(FileHunk::new(path))
    }

    /// Hunk over in-memory bytes.
    pub fn memory(data: impl Into<Vec<u8>>) -> Self {
        Self::Memory(MemoryHunk::new(data))
    }

    /// The payload. File hunks read on first call; URL hunks fetch on first call.
    pub fn bytes(&self) -> Result<Bytes> {
        match self {
            Self::File(h) => h.bytes(),
            Self::Memory(h) => Ok(h.data.clone()),
            Self::Url(h) => h.bytes(),
        }
    }

    /// Payload decoded as UTF-8, lossily.
    pub fn text(&self) -> Result<String> {
        Ok(String::from_utf8_lossy(&self.bytes()?).into_owned())
    }

    /// Stable cache-key component.
    ///
    /// File hunks include their absolute path and a digest of their current
    /// contents, so an edited source never reuses a stale cached result.
    pub fn identity(&self) -> Result<String> {
        match self {
            Self::File(h) => Ok(format!(
                "file:{}:{}",
                h.path.display(),
                digest_hex(&*h.bytes()?)
            )),
            Self::Memory(h) => Ok(format!("mem:{}", digest_hex(&*h.data))),
            Self::Url(h) => Ok(format!("url:{}", digest_hex(&*h.bytes()?))),
        }
    }

    /// Write the payload to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let data = self.bytes()?;
        atomic_write(path, &data).at(path)
    }

    /// Filesystem origin, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::File(h) => Some(&h.path),
            Self::Memory(h) => h.origin.as_deref(),
            Self::Url(_) => None,
        }
    }

    /// Remote origin, if any.
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(h) => Some(h.url()),
            _ => None,
        }
    }
}

impl PartialEq for Hunk {
    /// Equal when both payloads are readable and identical.
    fn eq(&self, other: &Self) -> bool {
        match (self.bytes(), other.bytes()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(h) => write!(f, "FileHunk({})", h.path.display()),
            Self::Memory(h) => write!(f, "MemoryHunk({} bytes)", h.data.len()),
            Self::Url(h) => write!(f, "UrlHunk({})", h.url()),
        }
    }
}

// ============================================================================
// File / Memory
// ============================================================================

#[derive(Clone)]
pub struct FileHunk {
    path: PathBuf,
    data: Arc<OnceLock<Bytes>>,
}

impl FileHunk {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: Arc::new(OnceLock::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn bytes(&self) -> Result<Bytes> {
        if let Some(data) = self.data.get() {
            return Ok(data.clone());
        }
        let data: Bytes = std::fs::read(&self.path).at(&self.path)?.into();
        Ok(self.data.get_or_init(|| data).clone())
    }
}

#[derive(Clone)]
pub struct MemoryHunk {
    data: Bytes,
    origin: Option<PathBuf>,
}

impl MemoryHunk {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into().into(),
            origin: None,
        }
    }

    /// Remember which source file this payload was derived from.
    pub fn with_origin(mut self, origin: impl Into<PathBuf>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl From<MemoryHunk> for Hunk {
    fn from(h: MemoryHunk) -> Self {
        Self::Memory(h)
    }
}

/// Join hunks with newlines into one memory hunk.
pub fn merge(hunks: &[Hunk]) -> Result<Hunk> {
    let mut out = Vec::new();
    for (i, hunk) in hunks.iter().enumerate() {
        if i > 0 {
            out.push(b'\n');
        }
        out.extend_from_slice(&hunk.bytes()?);
    }
    Ok(Hunk::memory(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_hunk_reads_lazily() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.css");
        let hunk = Hunk::file(&path);

        // creating the hunk does not touch the disk
        fs::write(&path, "body {}").unwrap();
        assert_eq!(&*hunk.bytes().unwrap(), b"body {}");

        // memoized after first read
        fs::write(&path, "changed").unwrap();
        assert_eq!(&*hunk.bytes().unwrap(), b"body {}");
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let hunk = Hunk::file("/nonexistent/file.js");
        let err = hunk.bytes().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_identity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "x").unwrap();

        let file_id = Hunk::file(&path).identity().unwrap();
        assert!(file_id.contains(&path.display().to_string()));

        fs::write(&path, "y").unwrap();
        assert_ne!(Hunk::file(&path).identity().unwrap(), file_id);

        assert_eq!(
            Hunk::memory("same").identity().unwrap(),
            Hunk::memory("same").identity().unwrap()
        );
        assert_ne!(
            Hunk::memory("a").identity().unwrap(),
            Hunk::memory("b").identity().unwrap()
        );
    }

    #[test]
    fn test_equality_by_payload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.js");
        fs::write(&path, "same").unwrap();
        assert_eq!(Hunk::file(&path), Hunk::memory("same"));
        assert_ne!(Hunk::memory("a"), Hunk::memory("b"));
    }

    #[test]
    fn test_save_creates_directories() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("gen/deep/out.js");
        Hunk::memory("payload").save(&target).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "payload");
    }

    #[test]
    fn test_merge_joins_with_newline() {
        let merged = merge(&[Hunk::memory("A"), Hunk::memory("B")]).unwrap();
        assert_eq!(merged.text().unwrap(), "A\nB");
        assert_eq!(merge(&[]).unwrap().text().unwrap(), "");
    }

    #[test]
    fn test_memory_origin() {
        let hunk: Hunk = MemoryHunk::new("x").with_origin("/src/a.js").into();
        assert_eq!(hunk.path(), Some(Path::new("/src/a.js")));
        assert!(hunk.url().is_none());
    }
}
