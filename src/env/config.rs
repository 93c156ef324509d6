//! Environment settings as written in a bundle file.
//!
//! ```toml
//! [environment]
//! directory = "static"
//! url = "/static"
//! debug = "merge"
//! cache = "memory:256"
//! manifest = "json"
//! versions = "hash:12:sha256"
//! url_expire = false
//! load_path = ["assets", "vendor"]
//!
//! [environment.url_mapping]
//! vendor = "/vendor"
//!
//! [environment.config]
//! UGLIFY_BIN = "/opt/node/bin/uglifyjs"
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Deserialize;

use crate::bundle::DebugLevel;
use crate::cache::CacheKind;
use crate::manifest::ManifestKind;
use crate::updater::UpdaterKind;
use crate::version::VersionerKind;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    /// Base directory of sources and outputs. `~` is expanded.
    pub directory: Option<PathBuf>,
    /// Public URL prefix of `directory`.
    pub url: Option<String>,
    pub debug: DebugLevel,
    /// Build bundles on demand when their URLs are requested.
    pub auto_build: bool,
    pub cache: CacheKind,
    pub manifest: ManifestKind,
    pub versions: VersionerKind,
    pub updater: UpdaterKind,
    /// `None`: append `?version` only when the output has no placeholder.
    pub url_expire: Option<bool>,
    /// Source directories searched before `directory`.
    pub load_path: Vec<PathBuf>,
    /// Directory to URL prefix, for files outside `directory`.
    pub url_mapping: BTreeMap<PathBuf, String>,
    /// Filter options, looked up before the OS environment.
    pub config: BTreeMap<String, String>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            directory: None,
            url: None,
            debug: DebugLevel::Off,
            auto_build: true,
            cache: CacheKind::default(),
            manifest: ManifestKind::default(),
            versions: VersionerKind::default(),
            updater: UpdaterKind::default(),
            url_expire: None,
            load_path: Vec::new(),
            url_mapping: BTreeMap::new(),
            config: BTreeMap::new(),
        }
    }
}
