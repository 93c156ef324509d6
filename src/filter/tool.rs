//! Cached execution of one pipeline stage.
//!
//! # Cache key
//!
//! ```text
//! ("hunk", TOOL_VERSION, hook, input identity, [filter identities], [additional keys])
//! ```
//!
//! The key depends only on the immediate input and the filters applied at
//! this step, never on the bundle around it, so bundles sharing a source
//! share the cached result of its input stage.

use std::path::Path;

use super::{FilterContext, Hook, SharedFilter, merge_filters};
use crate::cache::{Cache, CacheKey};
use crate::error::{Error, Result};
use crate::hunk::{Hunk, MemoryHunk};

/// Bumped whenever the meaning of cached entries changes.
pub const TOOL_VERSION: &str = "1";

/// Arguments of the single-filter hooks.
#[derive(Debug, Clone, Copy)]
pub enum FuncInput<'a> {
    /// Produce the content of this source file.
    Open(&'a Path),
    /// Join these hunks.
    Concat(&'a [Hunk]),
}

impl FuncInput<'_> {
    pub fn hook(&self) -> Hook {
        match self {
            Self::Open(_) => Hook::Open,
            Self::Concat(_) => Hook::Concat,
        }
    }
}

/// Runs filter hooks against hunks, consulting a cache.
#[derive(Clone, Copy)]
pub struct FilterTool<'a> {
    cache: Option<&'a dyn Cache>,
    read_cache: bool,
}

impl<'a> FilterTool<'a> {
    pub fn new(cache: Option<&'a dyn Cache>) -> Self {
        Self {
            cache,
            read_cache: true,
        }
    }

    /// Skip cache lookups. Results are still stored.
    pub fn no_cache_read(mut self, skip: bool) -> Self {
        self.read_cache = !skip;
        self
    }

    /// Pass `hunk` through the `hook` of every filter exposing it, in order.
    ///
    /// `hook` must be [`Hook::Input`] or [`Hook::Output`]. Duplicate filters
    /// run once. Without any applicable filter the hunk is returned as is.
    pub fn apply(
        &self,
        hunk: &Hunk,
        filters: &[SharedFilter],
        hook: Hook,
        ctx: &FilterContext<'_>,
    ) -> Result<Hunk> {
        if !matches!(hook, Hook::Input | Hook::Output) {
            return Err(Error::bundle(format!(
                "`{hook}` is a single-filter hook, use apply_func"
            )));
        }

        let filters = applicable(filters, hook);
        if filters.is_empty() {
            return Ok(hunk.clone());
        }

        let key = self.key(hook, &[hunk.identity()?], &filters, ctx);
        if let Some(hit) = self.lookup(&key, hunk.path()) {
            return Ok(hit);
        }

        let mut data = hunk.bytes()?.to_vec();
        for filter in &filters {
            crate::debug!("filter"; "{} {} on {:?}", hook, filter.name(), hunk);
            let mut out = Vec::new();
            let result = match hook {
                Hook::Input => filter.as_input().map(|f| f.input(&data, &mut out, ctx)),
                _ => filter.as_output().map(|f| f.output(&data, &mut out, ctx)),
            };
            if let Some(result) = result {
                result.map_err(|e| Error::filter(filter.name(), e))?;
                data = out;
            }
        }

        self.store(&key, &data);
        Ok(result_hunk(data, hunk.path()))
    }

    /// Run the single filter exposing the hook of `input`.
    ///
    /// Returns `None` when no filter exposes it, leaving the default
    /// behavior (read the file, join with newlines) to the caller. More
    /// than one filter exposing it is a [`Error::Bundle`].
    pub fn apply_func(
        &self,
        filters: &[SharedFilter],
        input: FuncInput<'_>,
        ctx: &FilterContext<'_>,
    ) -> Result<Option<Hunk>> {
        let hook = input.hook();
        let filters = applicable(filters, hook);
        let filter = match filters.as_slice() {
            [] => return Ok(None),
            [filter] => filter,
            many => {
                let names: Vec<&str> = many.iter().map(|f| f.name()).collect();
                return Err(Error::bundle(format!(
                    "only one `{hook}` filter allowed per pipeline, got {}",
                    names.join(", ")
                )));
            }
        };

        let (identities, origin) = match input {
            FuncInput::Open(path) => (vec![Hunk::file(path).identity()?], Some(path)),
            FuncInput::Concat(hunks) => (
                hunks.iter().map(Hunk::identity).collect::<Result<Vec<_>>>()?,
                None,
            ),
        };

        let key = self.key(hook, &identities, &filters, ctx);
        if let Some(hit) = self.lookup(&key, origin) {
            return Ok(Some(hit));
        }

        crate::debug!("filter"; "{} {}", hook, filter.name());
        let mut out = Vec::new();
        let result = match input {
            FuncInput::Open(path) => filter.as_open().map(|f| f.open(&mut out, path, ctx)),
            FuncInput::Concat(hunks) => filter.as_concat().map(|f| f.concat(&mut out, hunks, ctx)),
        };
        if let Some(result) = result {
            result.map_err(|e| Error::filter(filter.name(), e))?;
        }

        self.store(&key, &out);
        Ok(Some(result_hunk(out, origin)))
    }

    fn key(
        &self,
        hook: Hook,
        inputs: &[String],
        filters: &[SharedFilter],
        ctx: &FilterContext<'_>,
    ) -> CacheKey {
        CacheKey::builder("hunk")
            .part(TOOL_VERSION)
            .part(hook.as_str())
            .parts(inputs)
            .parts(filters.iter().map(|f| f.identity()))
            .parts(filters.iter().flat_map(|f| f.additional_cache_keys(ctx)))
            .finish()
    }

    fn lookup(&self, key: &CacheKey, origin: Option<&Path>) -> Option<Hunk> {
        if !self.read_cache {
            return None;
        }
        let data = self.cache?.get(key)?;
        crate::debug!("cache"; "hit {}", key);
        Some(result_hunk(data, origin))
    }

    fn store(&self, key: &CacheKey, data: &[u8]) {
        if let Some(cache) = self.cache {
            crate::debug!("cache"; "store {} ({} bytes)", key, data.len());
            cache.set(key, data);
        }
    }
}

/// Deduplicated filters exposing `hook`, in order.
fn applicable(filters: &[SharedFilter], hook: Hook) -> Vec<SharedFilter> {
    merge_filters(filters, &[])
        .into_iter()
        .filter(|f| f.supports(hook))
        .collect()
}

fn result_hunk(data: Vec<u8>, origin: Option<&Path>) -> Hunk {
    let hunk = MemoryHunk::new(data);
    match origin {
        Some(path) => hunk.with_origin(path).into(),
        None => hunk.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::env::{EnvConfig, Environment};
    use crate::error::ErrorKind;
    use crate::filter::{Extra, FnFilter};
    use parking_lot::Mutex;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Memory cache that counts stores.
    #[derive(Debug, Default)]
    struct CountingCache {
        inner: Mutex<Vec<(CacheKey, Vec<u8>)>>,
        sets: AtomicUsize,
    }

    impl Cache for CountingCache {
        fn get(&self, key: &CacheKey) -> Option<Vec<u8>> {
            let inner = self.inner.lock();
            inner.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        }

        fn set(&self, key: &CacheKey, value: &[u8]) {
            self.sets.fetch_add(1, Ordering::SeqCst);
            self.inner.lock().push((key.clone(), value.to_vec()));
        }
    }

    fn env() -> Environment {
        Environment::new(EnvConfig::default()).unwrap()
    }

    fn replace(name: &str, from: &'static str, to: &'static str, calls: Arc<AtomicUsize>) -> SharedFilter {
        Arc::new(FnFilter::input(name, move |input, out, _| {
            calls.fetch_add(1, Ordering::SeqCst);
            let text = String::from_utf8_lossy(input).replace(from, to);
            Ok(out.write_all(text.as_bytes())?)
        }))
    }

    #[test]
    fn test_apply_runs_in_order() {
        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let calls = Arc::new(AtomicUsize::new(0));
        let filters = [
            replace("a", "foo", "bar", calls.clone()),
            replace("b", "bar", "baz", calls.clone()),
        ];

        let tool = FilterTool::new(None);
        let out = tool
            .apply(&Hunk::memory("foo"), &filters, Hook::Input, &ctx)
            .unwrap();
        assert_eq!(out.text().unwrap(), "baz");

        // no output hooks: returned untouched
        let out = tool
            .apply(&Hunk::memory("foo"), &filters, Hook::Output, &ctx)
            .unwrap();
        assert_eq!(out.text().unwrap(), "foo");
    }

    #[test]
    fn test_duplicates_collapse_into_one_store() {
        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let calls = Arc::new(AtomicUsize::new(0));
        let f = replace("f", "a", "b", calls.clone());
        let cache = CountingCache::default();
        let tool = FilterTool::new(Some(&cache));
        let hunk = Hunk::memory("aaa");

        let first = tool.apply(&hunk, &[f.clone(), f.clone()], Hook::Input, &ctx).unwrap();
        let second = tool.apply(&hunk, &[f.clone(), f], Hook::Input, &ctx).unwrap();

        assert_eq!(first, second);
        assert_eq!(first.text().unwrap(), "bbb");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.sets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_no_cache_read_still_writes() {
        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let calls = Arc::new(AtomicUsize::new(0));
        let f = replace("f", "a", "b", calls.clone());
        let cache = MemoryCache::new(10);
        let hunk = Hunk::memory("a");

        FilterTool::new(Some(&cache))
            .apply(&hunk, &[f.clone()], Hook::Input, &ctx)
            .unwrap();
        FilterTool::new(Some(&cache))
            .no_cache_read(true)
            .apply(&hunk, &[f], Hook::Input, &ctx)
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_filter_error_is_wrapped() {
        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let broken: SharedFilter = Arc::new(FnFilter::output("broken", |_, _, _| {
            anyhow::bail!("tool crashed")
        }));

        let err = FilterTool::new(None)
            .apply(&Hunk::memory("x"), &[broken], Hook::Output, &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Filter);
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn test_apply_func_rejects_two_concat_filters() {
        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let join = |name: &str| -> SharedFilter {
            Arc::new(FnFilter::concat(name, |out, hunks, _| {
                for hunk in hunks {
                    out.write_all(&hunk.bytes()?)?;
                }
                Ok(())
            }))
        };
        let hunks = [Hunk::memory("a"), Hunk::memory("b")];
        let tool = FilterTool::new(None);

        let none = tool.apply_func(&[], FuncInput::Concat(&hunks), &ctx).unwrap();
        assert!(none.is_none());

        let joined = tool
            .apply_func(&[join("j1")], FuncInput::Concat(&hunks), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(joined.text().unwrap(), "ab");

        let err = tool
            .apply_func(&[join("j1"), join("j2")], FuncInput::Concat(&hunks), &ctx)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bundle);
    }

    #[test]
    fn test_open_result_keeps_origin() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("tpl.html");
        std::fs::write(&path, "<p>").unwrap();

        let env = env();
        let extra = Extra::new();
        let ctx = FilterContext::new(&env, &extra);
        let compile: SharedFilter = Arc::new(FnFilter::open("compile", |out, path, _| {
            let raw = std::fs::read_to_string(path)?;
            Ok(write!(out, "tpl({raw})")?)
        }));

        let hunk = FilterTool::new(None)
            .apply_func(&[compile], FuncInput::Open(&path), &ctx)
            .unwrap()
            .unwrap();
        assert_eq!(hunk.text().unwrap(), "tpl(<p>)");
        assert_eq!(hunk.path(), Some(path.as_path()));
    }
}
