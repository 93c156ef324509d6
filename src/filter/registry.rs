//! Filter registry: maps names used in bundle files to factories.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::SharedFilter;
use crate::error::{Error, Result};

/// Options given to a factory (the `options` table of a filter reference).
pub type FilterArgs = serde_json::Map<String, serde_json::Value>;

pub type FilterFactory = Arc<dyn Fn(&FilterArgs) -> anyhow::Result<SharedFilter> + Send + Sync>;

/// Owned by the [`Environment`](crate::env::Environment); populated at
/// configuration time, read-only while building.
#[derive(Default, Clone)]
pub struct FilterRegistry {
    factories: FxHashMap<String, FilterFactory>,
}

impl FilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `factory` under `name`, replacing any previous entry.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn(&FilterArgs) -> anyhow::Result<SharedFilter> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
    }

    /// Register a ready-made instance; options are ignored.
    pub fn register_instance(&mut self, filter: SharedFilter) {
        let name = filter.name().to_string();
        self.register(name, move |_| Ok(filter.clone()));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Instantiate the filter registered as `name`.
    pub fn create(&self, name: &str, args: &FilterArgs) -> Result<SharedFilter> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| Error::bundle(format!("unknown filter `{name}`")))?;
        factory(args).map_err(|e| Error::bundle(format!("cannot create filter `{name}`: {e:#}")))
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FilterRegistry")
            .field("names", &self.names())
            .finish()
    }
}
