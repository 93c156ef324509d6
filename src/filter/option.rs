//! Filter settings read from the environment.

/// A setting a filter reads at build time.
///
/// Lookup order: the environment's `config` table, then the OS environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    /// Key in the `config` table and name of the OS environment variable.
    pub key: String,
    pub required: bool,
}

impl FilterOption {
    pub fn optional(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            required: false,
        }
    }

    pub fn required(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            required: true,
        }
    }
}
