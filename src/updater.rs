//! Rebuild decisions.
//!
//! | Check                         | Triggered by                                   | Result      |
//! |-------------------------------|------------------------------------------------|-------------|
//! | bundle definition             | contents, filters, output or debug changed     | `Yes`       |
//! | output missing                | no file at the resolved output path            | `Yes`       |
//! | source timestamps             | a content file newer than the output           | `Yes`       |
//! | dependency timestamps         | a `depends` file newer than the output         | `SkipCache` |
//!
//! `SkipCache` exists because dependencies are not part of per-step cache
//! keys: a cached step may embed the old contents of a dependency.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::SystemTime;

use serde::{Deserialize, Deserializer};

use crate::bundle::{Bundle, ResolvedContent};
use crate::cache::CacheKey;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::resolver::has_placeholder;
use crate::utils::fs::mtime;

/// Outcome of [`Updater::needs_rebuild`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rebuild {
    No,
    Yes,
    /// Rebuild without reading the per-step cache (results are still stored).
    SkipCache,
}

impl Rebuild {
    pub fn is_needed(self) -> bool {
        self != Self::No
    }

    /// The stronger of two decisions (`SkipCache` > `Yes` > `No`).
    pub fn max(self, other: Self) -> Self {
        match (self, other) {
            (Self::SkipCache, _) | (_, Self::SkipCache) => Self::SkipCache,
            (Self::Yes, _) | (_, Self::Yes) => Self::Yes,
            _ => Self::No,
        }
    }
}

pub trait Updater: Send + Sync + fmt::Debug {
    fn needs_rebuild(&self, bundle: &Bundle, env: &Environment) -> Result<Rebuild>;

    /// Called after `bundle` was built successfully.
    ///
    /// Records the bundle definition hash (when a cache is available) and
    /// forgets the cached expansion of `depends`.
    fn build_done(&self, bundle: &Bundle, env: &Environment) -> Result<()> {
        bundle.clear_depends_cache();
        if let (Some(cache), Some(output)) = (env.cache(), bundle.output()) {
            let hash = bundle_definition_hash(bundle, env)?;
            cache.set(&definition_key(output), hash.as_bytes());
        }
        Ok(())
    }
}

// ============================================================================
// Bundle definition
// ============================================================================

fn definition_key(output: &str) -> CacheKey {
    CacheKey::simple("bdef", output)
}

/// Hash over everything that shapes a bundle's output besides file contents:
/// resolved contents, filter identities, output template and debug setting.
pub fn bundle_definition_hash(bundle: &Bundle, env: &Environment) -> Result<String> {
    let mut stack = Vec::new();
    definition_hash(bundle, env, &mut stack)
}

fn definition_hash(bundle: &Bundle, env: &Environment, stack: &mut Vec<usize>) -> Result<String> {
    let id = bundle.address();
    if stack.contains(&id) {
        return Err(Error::bundle(format!(
            "circular bundle reference through {}",
            bundle.label()
        )));
    }
    stack.push(id);

    let mut contents = Vec::new();
    for item in bundle.resolve_contents(env)? {
        contents.push(match item {
            ResolvedContent::Bundle(child) => {
                format!("bundle:{}", definition_hash(&child, env, stack)?)
            }
            ResolvedContent::File { path, .. } => format!("file:{}", path.display()),
            ResolvedContent::Url(url) => format!("url:{url}"),
        });
    }
    stack.pop();

    let key = CacheKey::builder("bundle-definition")
        .parts(contents)
        .parts(bundle.filters().iter().map(|f| f.identity()))
        .part(bundle.output().unwrap_or_default())
        .part(bundle.debug().map(|d| d.as_str()).unwrap_or("inherit"))
        .parts(bundle.depends())
        .finish();
    Ok(key.as_hex().to_string())
}

// ============================================================================
// Updaters
// ============================================================================

/// Rebuilds when the definition changed or any file is newer than the output.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampUpdater;

impl TimestampUpdater {
    fn definition_changed(bundle: &Bundle, env: &Environment) -> Result<bool> {
        let (Some(cache), Some(output)) = (env.cache(), bundle.output()) else {
            return Ok(false);
        };
        let Some(previous) = cache.get(&definition_key(output)) else {
            return Ok(false);
        };
        Ok(previous != bundle_definition_hash(bundle, env)?.as_bytes())
    }

    /// Newer content files give `Yes`, newer dependencies `SkipCache`.
    fn check_timestamps(
        bundle: &Bundle,
        env: &Environment,
        built: SystemTime,
        stack: &mut Vec<usize>,
    ) -> Result<Rebuild> {
        let id = bundle.address();
        if stack.contains(&id) {
            return Err(Error::bundle(format!(
                "circular bundle reference through {}",
                bundle.label()
            )));
        }
        stack.push(id);

        let mut decision = Rebuild::No;
        for item in bundle.resolve_contents(env)? {
            let found = match item {
                ResolvedContent::Bundle(child) => {
                    Self::check_timestamps(&child, env, built, stack)?
                }
                ResolvedContent::File { path, .. } => match mtime(&path) {
                    Some(time) if time > built => Rebuild::Yes,
                    _ => Rebuild::No,
                },
                ResolvedContent::Url(_) => Rebuild::No,
            };
            decision = decision.max(found);
        }

        for path in bundle.resolve_depends(env)? {
            if mtime(&path).is_none_or(|time| time > built) {
                crate::debug!("updater"; "dependency {} changed", path.display());
                decision = Rebuild::SkipCache;
                break;
            }
        }

        stack.pop();
        Ok(decision)
    }
}

impl Updater for TimestampUpdater {
    fn needs_rebuild(&self, bundle: &Bundle, env: &Environment) -> Result<Rebuild> {
        let Some(output) = bundle.output() else {
            return Ok(Rebuild::Yes);
        };

        if Self::definition_changed(bundle, env)? {
            crate::debug!("updater"; "{}: definition changed", bundle.label());
            return Ok(Rebuild::Yes);
        }

        // with a placeholder, the file to compare with is the one of the
        // version we know about
        let version = if has_placeholder(output) {
            match bundle.get_version(env, false) {
                Ok(version) => Some(version),
                Err(e) => {
                    crate::debug!("updater"; "{}: no known version ({})", bundle.label(), e);
                    return Ok(Rebuild::Yes);
                }
            }
        } else {
            None
        };
        let path = env.resolver().resolve_output(env, output, version.as_deref())?;
        let Some(built) = mtime(&path) else {
            crate::debug!("updater"; "{}: output missing", bundle.label());
            return Ok(Rebuild::Yes);
        };

        let decision = Self::check_timestamps(bundle, env, built, &mut Vec::new())?;
        crate::debug!("updater"; "{}: {:?}", bundle.label(), decision);
        Ok(decision)
    }
}

/// Rebuilds every time.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysUpdater;

impl Updater for AlwaysUpdater {
    fn needs_rebuild(&self, _bundle: &Bundle, _env: &Environment) -> Result<Rebuild> {
        Ok(Rebuild::Yes)
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// The `updater` setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdaterKind {
    #[default]
    Timestamp,
    Always,
}

impl UpdaterKind {
    pub fn build(self) -> Arc<dyn Updater> {
        match self {
            Self::Timestamp => Arc::new(TimestampUpdater),
            Self::Always => Arc::new(AlwaysUpdater),
        }
    }
}

impl FromStr for UpdaterKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "timestamp" => Ok(Self::Timestamp),
            "always" => Ok(Self::Always),
            other => Err(Error::config(format!(
                "invalid updater `{other}` (expected \"timestamp\" or \"always\")"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for UpdaterKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
