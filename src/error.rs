//! Error taxonomy for the build engine.
//!
//! | Variant                 | Raised when                                         |
//! |-------------------------|-----------------------------------------------------|
//! | `Bundle`                | malformed bundle: missing source, bad filter setup  |
//! | `Build`                 | nothing to build, no output, debug forbids building |
//! | `Filter`                | a filter hook failed                                |
//! | `VersionIndeterminable` | a versioner cannot produce a version                |
//! | `Io` / `Http`           | filesystem or network failure                       |
//! | `Config`                | missing or invalid configuration                    |

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed cause carried by filter failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the build engine.
#[derive(Debug, Error)]
pub enum Error {
    #[error("bundle error: {0}")]
    Bundle(String),

    #[error("build error: {0}")]
    Build(String),

    #[error("filter `{name}` failed: {source}")]
    Filter {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("cannot determine version: {0}")]
    VersionIndeterminable(String),

    #[error("IO error at `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch `{url}`: {message}")]
    Http { url: String, message: String },

    #[error("config error: {0}")]
    Config(String),
}

/// Payload-free view of [`Error`], for callers that only branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Bundle,
    Build,
    Filter,
    VersionIndeterminable,
    Io,
    Config,
}

impl Error {
    pub fn bundle(message: impl Into<String>) -> Self {
        Self::Bundle(message.into())
    }

    pub fn build(message: impl Into<String>) -> Self {
        Self::Build(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn filter(name: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Filter {
            name: name.into(),
            source: source.into(),
        }
    }

    /// Classify this error. HTTP failures count as IO.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Bundle(_) => ErrorKind::Bundle,
            Self::Build(_) => ErrorKind::Build,
            Self::Filter { .. } => ErrorKind::Filter,
            Self::VersionIndeterminable(_) => ErrorKind::VersionIndeterminable,
            Self::Io { .. } | Self::Http { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Attach a path to `std::io::Result` failures.
pub(crate) trait IoResultExt<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn at(self, path: impl AsRef<Path>) -> Result<T> {
        self.map_err(|err| Error::io(path, err))
    }
}
