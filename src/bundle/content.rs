//! Bundle contents as declared and as resolved.

use std::path::PathBuf;
use std::sync::Arc;

use super::Bundle;

/// One declared contents entry.
#[derive(Debug, Clone)]
pub enum Content {
    /// Plain path, glob pattern or absolute URL.
    Source(String),
    /// Nested bundle.
    Bundle(Arc<Bundle>),
    /// Registered bundle, looked up by name at build time.
    Ref(String),
}

impl Content {
    /// Reference to a bundle registered in the environment.
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }
}

impl From<&str> for Content {
    fn from(item: &str) -> Self {
        Self::Source(item.to_string())
    }
}

impl From<String> for Content {
    fn from(item: String) -> Self {
        Self::Source(item)
    }
}

impl From<Bundle> for Content {
    fn from(bundle: Bundle) -> Self {
        Self::Bundle(Arc::new(bundle))
    }
}

impl From<Arc<Bundle>> for Content {
    fn from(bundle: Arc<Bundle>) -> Self {
        Self::Bundle(bundle)
    }
}

/// A contents entry after name lookup and glob expansion.
#[derive(Debug, Clone)]
pub enum ResolvedContent {
    Bundle(Arc<Bundle>),
    File { item: String, path: PathBuf },
    Url(String),
}
