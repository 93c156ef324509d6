//! Mapping contents entries to files, and files to public URLs.
//!
//! # Module Structure
//!
//! ```text
//! resolver/
//! ├── mod.rs       # Resolver trait, Source, output templates (this file)
//! ├── search.rs    # load-path search and glob expansion
//! └── external.rs  # URL mapping and copies of files outside the public tree
//! ```
//!
//! Every method has a default implementation; [`DefaultResolver`] uses
//! them all. Host frameworks override individual methods to adapt lookup
//! to their own directory layout.

mod external;
mod search;

pub use external::EXTERNAL_CACHE_DIR;

use std::fmt;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::utils::path::{has_glob_magic, is_url, normalize_path};

/// Substitution point for the version in output templates.
pub const PLACEHOLDER: &str = "%(version)s";

/// Whether an output template embeds the version.
#[inline]
pub fn has_placeholder(template: &str) -> bool {
    template.contains(PLACEHOLDER)
}

/// A resolved contents entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A file on disk. `item` is the entry as declared, or the match
    /// relative to its search directory for glob entries.
    File { item: String, path: PathBuf },
    Url(String),
}

pub trait Resolver: Send + Sync + fmt::Debug {
    /// Resolve a contents entry to files (globs may yield several, or none)
    /// or pass a URL through unchanged.
    ///
    /// A plain path that exists nowhere is a [`Error::Bundle`].
    fn resolve_source(&self, env: &Environment, item: &str) -> Result<Vec<Source>> {
        if is_url(item) {
            return Ok(vec![Source::Url(item.to_string())]);
        }
        let matches = if has_glob_magic(item) {
            self.resolve_source_globbed(env, item)?
        } else {
            vec![(item.to_string(), self.search_for_source(env, item)?)]
        };
        Ok(matches
            .into_iter()
            .map(|(item, path)| Source::File { item, path })
            .collect())
    }

    /// Find a single file: load path entries in order, then the directory.
    fn search_for_source(&self, env: &Environment, item: &str) -> Result<PathBuf> {
        search::find_file(env, item)
    }

    /// Expand a glob into `(relative, absolute)` pairs, sorted, files only.
    fn resolve_source_globbed(
        &self,
        env: &Environment,
        pattern: &str,
    ) -> Result<Vec<(String, PathBuf)>> {
        search::expand_glob(env, pattern)
    }

    /// Absolute output path for `template`, with the version substituted.
    ///
    /// A template with a placeholder and no version is
    /// [`Error::VersionIndeterminable`].
    fn resolve_output(
        &self,
        env: &Environment,
        template: &str,
        version: Option<&str>,
    ) -> Result<PathBuf> {
        let rendered = match version {
            Some(version) => template.replace(PLACEHOLDER, version),
            None if has_placeholder(template) => {
                return Err(Error::VersionIndeterminable(format!(
                    "output `{template}` needs a version"
                )));
            }
            None => template.to_string(),
        };
        Ok(normalize_path(&env.directory()?.join(rendered)))
    }

    /// Public URL of a source file served in debug mode.
    fn resolve_source_to_url(&self, env: &Environment, path: &Path, _item: &str) -> Result<String> {
        self.query_url_mapping(env, path)
    }

    /// Public URL of a built output file.
    fn resolve_output_to_url(&self, env: &Environment, path: &Path) -> Result<String> {
        self.query_url_mapping(env, path)
    }

    /// URL of `path` under the most specific mapped directory.
    fn query_url_mapping(&self, env: &Environment, path: &Path) -> Result<String> {
        external::query_url_mapping(env, path)
    }

    /// Copy a file living outside every public directory into
    /// `<directory>/external-cache/`, returning the path to serve.
    fn pull_external(&self, env: &Environment, path: &Path) -> Result<PathBuf> {
        external::pull_external(env, path)
    }
}

/// Resolver with the stock behavior.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultResolver;

impl Resolver for DefaultResolver {}
