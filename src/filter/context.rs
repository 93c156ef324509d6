//! Per-invocation context handed to filter hooks.

use std::path::Path;

use crate::env::Environment;

/// Free-form bundle metadata passed through to filters.
pub type Extra = serde_json::Map<String, serde_json::Value>;

/// What a hook knows about the current build.
///
/// Source fields are set for per-source hooks (`open`, `input`) on file
/// sources only.
#[derive(Clone, Copy)]
pub struct FilterContext<'a> {
    pub env: &'a Environment,
    /// Contents entry as declared in the bundle.
    pub source: Option<&'a str>,
    pub source_path: Option<&'a Path>,
    /// Output template of the bundle being built.
    pub output: Option<&'a str>,
    pub output_path: Option<&'a Path>,
    pub extra: &'a Extra,
}

impl<'a> FilterContext<'a> {
    pub fn new(env: &'a Environment, extra: &'a Extra) -> Self {
        Self {
            env,
            source: None,
            source_path: None,
            output: None,
            output_path: None,
            extra,
        }
    }

    pub fn with_source(mut self, source: &'a str, path: Option<&'a Path>) -> Self {
        self.source = Some(source);
        self.source_path = path;
        self
    }

    pub fn with_output(mut self, output: Option<&'a str>, path: Option<&'a Path>) -> Self {
        self.output = output;
        self.output_path = path;
        self
    }

    /// Resolve a filter option (environment config first, then OS env).
    pub fn option(&self, key: &str) -> Option<String> {
        self.env.option(key)
    }
}
