//! Bundles: the recursive unit of composition.
//!
//! # Module Structure
//!
//! ```text
//! bundle/
//! ├── mod.rs      # Bundle definition, contents resolution, versions (this file)
//! ├── content.rs  # Content (declared) / ResolvedContent
//! ├── debug.rs    # DebugLevel and its inheritance
//! ├── build.rs    # build, build_to, the merge pipeline
//! └── urls.rs     # urls() with optional subresource integrity
//! ```
//!
//! # Shapes
//!
//! ```text
//! Bundle(a.js, b.js, output=out.js)        leaf: one output file
//! Bundle(Bundle(..), Bundle(..))            container: no output, each child built alone
//! Bundle(a.js, b.js)                        sources only: served individually in debug mode
//! ```

mod build;
mod content;
mod debug;
mod urls;

pub use build::BuildOptions;
pub use content::{Content, ResolvedContent};
pub use debug::DebugLevel;
pub use urls::{AssetUrl, subresource_integrity};

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use glob::Pattern;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::filter::{Extra, SharedFilter};
use crate::resolver::{Source, has_placeholder};
use crate::utils::fs::mtime;

#[derive(Debug, Default)]
pub struct Bundle {
    name: Option<String>,
    contents: Vec<Content>,
    output: Option<String>,
    filters: Vec<SharedFilter>,
    debug: Option<DebugLevel>,
    depends: Vec<String>,
    extra: Extra,
    /// Last known version.
    version: Mutex<Option<String>>,
    /// Expansion of `depends`, dropped after each build.
    depends_cache: Mutex<Option<Vec<PathBuf>>>,
}

impl Bundle {
    pub fn new<I, C>(contents: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Content>,
    {
        Self {
            contents: contents.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    // ------------------------------------------------------------------------
    // Builder
    // ------------------------------------------------------------------------

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn with_filter(mut self, filter: SharedFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn with_filters(mut self, filters: impl IntoIterator<Item = SharedFilter>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn with_debug(mut self, debug: DebugLevel) -> Self {
        self.debug = Some(debug);
        self
    }

    pub fn with_depends<I, S>(mut self, depends: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends.extend(depends.into_iter().map(Into::into));
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = Some(name.into());
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    /// Output template, possibly containing `%(version)s`.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    pub fn filters(&self) -> &[SharedFilter] {
        &self.filters
    }

    /// Explicit debug setting; `None` inherits.
    pub fn debug(&self) -> Option<DebugLevel> {
        self.debug
    }

    pub fn depends(&self) -> &[String] {
        &self.depends
    }

    pub fn extra(&self) -> &Extra {
        &self.extra
    }

    /// Version computed by the last build or version query.
    pub fn version(&self) -> Option<String> {
        self.version.lock().clone()
    }

    /// A container has no output and at least one nested bundle; each
    /// child is built on its own.
    pub fn is_container(&self) -> bool {
        self.output.is_none()
            && self
                .contents
                .iter()
                .any(|c| matches!(c, Content::Bundle(_) | Content::Ref(_)))
    }

    /// Human-readable name for logs and errors.
    pub fn label(&self) -> String {
        match (&self.name, &self.output) {
            (Some(name), _) => format!("bundle `{name}`"),
            (None, Some(output)) => format!("bundle `{output}`"),
            (None, None) => "anonymous bundle".to_string(),
        }
    }

    /// Identity of this instance, for cycle detection.
    pub(crate) fn address(&self) -> usize {
        std::ptr::from_ref(self) as usize
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolve contents: look up references, expand globs, drop the
    /// bundle's own output and keep only the first occurrence of a file.
    pub fn resolve_contents(&self, env: &Environment) -> Result<Vec<ResolvedContent>> {
        let resolver = env.resolver();
        let mut seen = FxHashSet::default();
        let mut resolved = Vec::new();

        for content in &self.contents {
            match content {
                Content::Bundle(bundle) => resolved.push(ResolvedContent::Bundle(bundle.clone())),
                Content::Ref(name) => {
                    let bundle = env.bundle(name).ok_or_else(|| {
                        Error::bundle(format!("{} references unknown bundle `{name}`", self.label()))
                    })?;
                    resolved.push(ResolvedContent::Bundle(bundle));
                }
                Content::Source(item) => {
                    for source in resolver.resolve_source(env, item)? {
                        match source {
                            Source::Url(url) => resolved.push(ResolvedContent::Url(url)),
                            Source::File { item, path } => {
                                if self.is_own_output(env, &path)? {
                                    crate::debug!("bundle"; "{}: skipping own output {}", self.label(), path.display());
                                    continue;
                                }
                                if seen.insert(path.clone()) {
                                    resolved.push(ResolvedContent::File { item, path });
                                }
                            }
                        }
                    }
                }
            }
        }
        Ok(resolved)
    }

    /// Files declared in `depends`, expanded. Cached until the next build.
    pub fn resolve_depends(&self, env: &Environment) -> Result<Vec<PathBuf>> {
        if let Some(cached) = self.depends_cache.lock().as_ref() {
            return Ok(cached.clone());
        }

        let mut paths = Vec::new();
        for item in &self.depends {
            for source in env.resolver().resolve_source(env, item)? {
                if let Source::File { path, .. } = source {
                    paths.push(path);
                }
            }
        }
        *self.depends_cache.lock() = Some(paths.clone());
        Ok(paths)
    }

    pub(crate) fn clear_depends_cache(&self) {
        *self.depends_cache.lock() = None;
    }

    /// Whether `path` is (a version of) this bundle's own output file.
    fn is_own_output(&self, env: &Environment, path: &Path) -> Result<bool> {
        let Some(output) = &self.output else {
            return Ok(false);
        };
        let resolver = env.resolver();
        if !has_placeholder(output) {
            return Ok(resolver.resolve_output(env, output, None)? == path);
        }

        const MARK: &str = "__ASSETPIPE_VERSION__";
        let template = resolver.resolve_output(env, output, Some(MARK))?;
        let pattern = Pattern::escape(&template.to_string_lossy()).replace(MARK, "*");
        Ok(Pattern::new(&pattern).is_ok_and(|p| p.matches_path(path)))
    }

    /// Newest mtime over all content files (nested bundles included) and
    /// dependencies. `None` when the bundle has no local files.
    pub fn max_source_mtime(&self, env: &Environment) -> Result<Option<SystemTime>> {
        self.collect_mtime(env, &mut Vec::new())
    }

    fn collect_mtime(&self, env: &Environment, stack: &mut Vec<usize>) -> Result<Option<SystemTime>> {
        if stack.contains(&self.address()) {
            return Err(Error::bundle(format!(
                "circular bundle reference through {}",
                self.label()
            )));
        }
        stack.push(self.address());

        let mut newest = None;
        for item in self.resolve_contents(env)? {
            let time = match item {
                ResolvedContent::Bundle(child) => child.collect_mtime(env, stack)?,
                ResolvedContent::File { path, .. } => mtime(&path),
                ResolvedContent::Url(_) => None,
            };
            newest = newest.max(time);
        }
        for path in self.resolve_depends(env)? {
            newest = newest.max(mtime(&path));
        }

        stack.pop();
        Ok(newest)
    }

    // ------------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------------

    /// Current version: memory, then manifest, then the versioner.
    ///
    /// `refresh` skips the in-memory value. Failure is an [`Error::Bundle`].
    pub fn get_version(&self, env: &Environment, refresh: bool) -> Result<String> {
        if !refresh && let Some(version) = self.version() {
            return Ok(version);
        }

        if let Some(manifest) = env.manifest() {
            match manifest.query(self, env) {
                Ok(Some(version)) => {
                    self.remember_version(&version);
                    return Ok(version);
                }
                Ok(None) => {}
                Err(e) => crate::debug!("manifest"; "{}: query failed: {}", self.label(), e),
            }
        }

        match env.versioner().determine_version(self, env, None) {
            Ok(version) => {
                self.remember_version(&version);
                Ok(version)
            }
            Err(e) => Err(Error::bundle(format!(
                "cannot determine version of {}: {e}",
                self.label()
            ))),
        }
    }

    fn remember_version(&self, version: &str) {
        *self.version.lock() = Some(version.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvConfig;
    use crate::error::ErrorKind;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn env_at(dir: &Path) -> Environment {
        Environment::new(EnvConfig {
            directory: Some(dir.to_path_buf()),
            url: Some("/static".into()),
            ..EnvConfig::default()
        })
        .unwrap()
    }

    fn files(resolved: &[ResolvedContent]) -> Vec<String> {
        resolved
            .iter()
            .filter_map(|r| match r {
                ResolvedContent::File { item, .. } => Some(item.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_container_detection() {
        assert!(Bundle::new([Bundle::new(["a.js"])]).is_container());
        assert!(Bundle::new([Content::reference("js")]).is_container());
        assert!(!Bundle::new([Bundle::new(["a.js"])]).with_output("out.js").is_container());
        assert!(!Bundle::new(["a.js"]).is_container());
    }

    #[test]
    fn test_resolve_dedupes_and_skips_output() {
        let dir = TempDir::new().unwrap();
        for name in ["a.js", "b.js", "out.js"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let env = env_at(dir.path());
        let bundle = Bundle::new(["b.js", "*.js"]).with_output("out.js");

        let resolved = bundle.resolve_contents(&env).unwrap();
        assert_eq!(files(&resolved), ["b.js", "a.js"]);
    }

    #[test]
    fn test_versioned_outputs_are_skipped() {
        let dir = TempDir::new().unwrap();
        for name in ["a.js", "app-1234abcd.js"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let env = env_at(dir.path());
        let bundle = Bundle::new(["*.js"]).with_output("app-%(version)s.js");

        let resolved = bundle.resolve_contents(&env).unwrap();
        assert_eq!(files(&resolved), ["a.js"]);
    }

    #[test]
    fn test_unknown_reference_is_bundle_error() {
        let dir = TempDir::new().unwrap();
        let env = env_at(dir.path());
        let bundle = Bundle::new([Content::reference("missing")]).with_output("out.js");
        let err = bundle.resolve_contents(&env).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bundle);
    }

    #[test]
    fn test_label() {
        assert_eq!(Bundle::new(["a.js"]).label(), "anonymous bundle");
        assert_eq!(
            Bundle::new(["a.js"]).with_output("out.js").label(),
            "bundle `out.js`"
        );
        let mut named = Bundle::new(["a.js"]);
        named.set_name("js");
        assert_eq!(named.label(), "bundle `js`");
    }

    #[test]
    fn test_max_source_mtime_includes_nested_and_depends() {
        use crate::utils::fs::set_mtime;
        use std::time::Duration;

        let dir = TempDir::new().unwrap();
        for name in ["a.js", "b.js", "dep.sass"] {
            fs::write(dir.path().join(name), name).unwrap();
        }
        let at = |secs| SystemTime::UNIX_EPOCH + Duration::from_secs(secs);
        set_mtime(&dir.path().join("a.js"), at(100)).unwrap();
        set_mtime(&dir.path().join("b.js"), at(300)).unwrap();
        set_mtime(&dir.path().join("dep.sass"), at(200)).unwrap();

        let env = env_at(dir.path());
        let nested = Bundle::new([Content::from("a.js"), Arc::new(Bundle::new(["b.js"])).into()]);
        assert_eq!(nested.max_source_mtime(&env).unwrap(), Some(at(300)));

        let with_dep = Bundle::new(["a.js"]).with_depends(["*.sass"]);
        assert_eq!(with_dep.max_source_mtime(&env).unwrap(), Some(at(200)));

        let remote = Bundle::new(["https://cdn.example.com/lib.js"]);
        assert_eq!(remote.max_source_mtime(&env).unwrap(), None);
    }

    #[test]
    fn test_depends_cache_cleared() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.sass"), "").unwrap();
        let env = env_at(dir.path());
        let bundle = Bundle::new(["x.js"]).with_depends(["*.sass"]);

        assert_eq!(bundle.resolve_depends(&env).unwrap().len(), 1);
        fs::write(dir.path().join("b.sass"), "").unwrap();
        assert_eq!(bundle.resolve_depends(&env).unwrap().len(), 1);

        bundle.clear_depends_cache();
        assert_eq!(bundle.resolve_depends(&env).unwrap().len(), 2);
    }
}
