//! The environment: shared settings, collaborators and the bundle registry.
//!
//! # Module Structure
//!
//! ```text
//! env/
//! ├── mod.rs     # Environment (this file)
//! ├── config.rs  # EnvConfig, the serde view of the settings
//! └── lock.rs    # BuildLock: NoopLock, KeyedLock
//! ```
//!
//! An environment is configured once, then shared read-only: every method
//! used while building or serving takes `&self`.

mod config;
mod lock;

pub use config::EnvConfig;
pub use lock::{BuildLock, KeyedLock, NoopLock};

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::bundle::{AssetUrl, BuildOptions, Bundle, Content, DebugLevel};
use crate::cache::Cache;
use crate::error::{Error, Result};
use crate::filter::{FilterArgs, FilterRegistry, SharedFilter};
use crate::hunk::Hunk;
use crate::manifest::Manifest;
use crate::resolver::{DefaultResolver, Resolver};
use crate::updater::Updater;
use crate::utils::path::normalize_path;
use crate::version::Versioner;

#[derive(Debug)]
pub struct Environment {
    directory: Option<PathBuf>,
    url: Option<String>,
    debug: DebugLevel,
    auto_build: bool,
    url_expire: Option<bool>,
    load_path: Vec<PathBuf>,
    url_mapping: Vec<(PathBuf, String)>,
    config: BTreeMap<String, String>,

    cache: Option<Arc<dyn Cache>>,
    resolver: Arc<dyn Resolver>,
    versioner: Arc<dyn Versioner>,
    manifest: Option<Arc<dyn Manifest>>,
    updater: Arc<dyn Updater>,
    lock: Arc<dyn BuildLock>,
    filters: FilterRegistry,

    /// Named bundles in registration order.
    named: Vec<Arc<Bundle>>,
    index: FxHashMap<String, usize>,
    anonymous: Vec<Arc<Bundle>>,
}

impl Environment {
    /// Create an environment, instantiating every configured collaborator.
    pub fn new(config: EnvConfig) -> Result<Self> {
        let directory = config.directory.as_deref().map(expand_directory);
        let base = directory.as_deref();

        let cache = config.cache.build(base)?;
        let manifest = config.manifest.build(base, cache.as_ref())?;

        let load_path = config
            .load_path
            .iter()
            .map(|path| anchor(path, base))
            .collect();
        let url_mapping = config
            .url_mapping
            .into_iter()
            .map(|(path, url)| (anchor(&path, base), url))
            .collect();

        Ok(Self {
            directory,
            url: config.url,
            debug: config.debug,
            auto_build: config.auto_build,
            url_expire: config.url_expire,
            load_path,
            url_mapping,
            config: config.config,
            cache,
            resolver: Arc::new(DefaultResolver),
            versioner: config.versions.build(),
            manifest,
            updater: config.updater.build(),
            lock: Arc::new(NoopLock),
            filters: FilterRegistry::new(),
            named: Vec::new(),
            index: FxHashMap::default(),
            anonymous: Vec::new(),
        })
    }

    // ========================================================================
    // Collaborators
    // ========================================================================

    pub fn with_cache(mut self, cache: Option<Arc<dyn Cache>>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn Resolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_versioner(mut self, versioner: Arc<dyn Versioner>) -> Self {
        self.versioner = versioner;
        self
    }

    pub fn with_manifest(mut self, manifest: Option<Arc<dyn Manifest>>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn with_updater(mut self, updater: Arc<dyn Updater>) -> Self {
        self.updater = updater;
        self
    }

    pub fn with_lock(mut self, lock: Arc<dyn BuildLock>) -> Self {
        self.lock = lock;
        self
    }

    pub fn cache(&self) -> Option<&Arc<dyn Cache>> {
        self.cache.as_ref()
    }

    pub fn resolver(&self) -> &dyn Resolver {
        &*self.resolver
    }

    pub fn versioner(&self) -> &dyn Versioner {
        &*self.versioner
    }

    pub fn manifest(&self) -> Option<&dyn Manifest> {
        self.manifest.as_deref()
    }

    pub fn updater(&self) -> &dyn Updater {
        &*self.updater
    }

    pub fn lock(&self) -> &dyn BuildLock {
        &*self.lock
    }

    // ========================================================================
    // Settings
    // ========================================================================

    /// Base directory. [`Error::Config`] when unset.
    pub fn directory(&self) -> Result<&Path> {
        self.directory
            .as_deref()
            .ok_or_else(|| Error::config("environment `directory` is not set"))
    }

    /// Public URL prefix. [`Error::Config`] when unset.
    pub fn url(&self) -> Result<&str> {
        self.url
            .as_deref()
            .ok_or_else(|| Error::config("environment `url` is not set"))
    }

    pub fn debug(&self) -> DebugLevel {
        self.debug
    }

    pub fn set_debug(&mut self, debug: DebugLevel) {
        self.debug = debug;
    }

    pub fn auto_build(&self) -> bool {
        self.auto_build
    }

    pub fn url_expire(&self) -> Option<bool> {
        self.url_expire
    }

    /// Absolute load path directories, in search order.
    pub fn load_path(&self) -> &[PathBuf] {
        &self.load_path
    }

    /// Absolute directories with their URL prefixes.
    pub fn url_mapping(&self) -> &[(PathBuf, String)] {
        &self.url_mapping
    }

    /// A filter option: the `config` table first, then the OS environment.
    pub fn option(&self, key: &str) -> Option<String> {
        self.config
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    // ========================================================================
    // Filters
    // ========================================================================

    pub fn filters(&self) -> &FilterRegistry {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterRegistry {
        &mut self.filters
    }

    /// Instantiate a registered filter. Unknown names are [`Error::Bundle`].
    pub fn create_filter(&self, name: &str, args: &FilterArgs) -> Result<SharedFilter> {
        self.filters.create(name, args)
    }

    // ========================================================================
    // Bundles
    // ========================================================================

    /// Register `bundle` under `name`, making it available to
    /// [`Content::Ref`] entries.
    pub fn register(&mut self, name: impl Into<String>, mut bundle: Bundle) -> Result<Arc<Bundle>> {
        let name = name.into();
        if self.index.contains_key(&name) {
            return Err(Error::bundle(format!("bundle `{name}` is already registered")));
        }
        bundle.set_name(name.clone());
        let bundle = Arc::new(bundle);
        self.index.insert(name, self.named.len());
        self.named.push(bundle.clone());
        Ok(bundle)
    }

    /// Add an anonymous bundle.
    pub fn add(&mut self, bundle: Bundle) -> Arc<Bundle> {
        let bundle = Arc::new(bundle);
        self.anonymous.push(bundle.clone());
        bundle
    }

    pub fn bundle(&self, name: &str) -> Option<Arc<Bundle>> {
        self.index.get(name).map(|&i| self.named[i].clone())
    }

    /// Named bundles in registration order, then anonymous ones.
    pub fn bundles(&self) -> impl Iterator<Item = &Arc<Bundle>> {
        self.named.iter().chain(&self.anonymous)
    }

    /// Build every bundle. One failing bundle does not stop the others.
    pub fn build_all(&self, options: BuildOptions) -> Vec<(Arc<Bundle>, Result<Vec<Hunk>>)> {
        self.bundles()
            .map(|bundle| (bundle.clone(), bundle.build(self, options)))
            .collect()
    }

    /// URLs of the bundle registered as `name`.
    pub fn urls(&self, name: &str, sri: bool) -> Result<Vec<AssetUrl>> {
        let bundle = self
            .bundle(name)
            .ok_or_else(|| Error::bundle(format!("unknown bundle `{name}`")))?;
        bundle.urls(self, sri)
    }

    /// URLs for an ad-hoc list of sources and bundle names, as a template
    /// tag would pass them. Registered names become references.
    pub fn urls_for<S: AsRef<str>>(&self, items: &[S], sri: bool) -> Result<Vec<AssetUrl>> {
        let contents = items.iter().map(|item| {
            let item = item.as_ref();
            if self.index.contains_key(item) {
                Content::reference(item)
            } else {
                Content::from(item)
            }
        });
        Bundle::new(contents).urls(self, sri)
    }
}

/// Expand `~` and make absolute.
fn expand_directory(path: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
    normalize_path(Path::new(&expanded))
}

/// Resolve `path` against `base` when relative.
fn anchor(path: &Path, base: Option<&Path>) -> PathBuf {
    match base {
        Some(base) if path.is_relative() => normalize_path(&base.join(path)),
        _ => normalize_path(path),
    }
}
