//! Building bundles.
//!
//! # Flow
//!
//! ```text
//! build()
//!   └── for_each_leaf()             containers fan out, their filters ride along
//!         └── build_leaf()          lock → updater → merge → version → save
//!               └── merge_and_apply()
//!                     ├── open / read      per file source
//!                     ├── input filters    ancestors' and own, per source
//!                     ├── child bundles    recursive, same rules
//!                     ├── concat / join
//!                     └── output filters   own only
//! ```
//!
//! Ancestor filters act on a nested bundle's sources through their input
//! hooks only. Output hooks run once, at the level that declared them.

use std::io::Write;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use super::{Bundle, DebugLevel, ResolvedContent};
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::filter::{
    FilterContext, FilterTool, FuncInput, Hook, SharedFilter, merge_filters, select_filters,
};
use crate::hunk::{self, Hunk, UrlHunk};
use crate::resolver::has_placeholder;
use crate::updater::Rebuild;
use crate::utils::fs::{mtime, set_mtime};

/// Knobs of a single [`Bundle::build`] call.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Rebuild even if the updater says the output is current.
    pub force: bool,
    /// Never read the per-step cache (results are still stored).
    pub disable_cache: bool,
}

impl BuildOptions {
    pub fn force() -> Self {
        Self {
            force: true,
            ..Self::default()
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// State shared by everything one build call touches.
#[derive(Debug, Default)]
pub(crate) struct Session {
    /// Bundles currently being visited, by address.
    stack: Vec<usize>,
    /// Identities of filters already set up.
    set_up: FxHashSet<String>,
}

impl Session {
    pub(super) fn enter(&mut self, bundle: &Bundle) -> Result<()> {
        if self.stack.contains(&bundle.address()) {
            return Err(Error::bundle(format!(
                "circular bundle reference through {}",
                bundle.label()
            )));
        }
        self.stack.push(bundle.address());
        Ok(())
    }

    pub(super) fn leave(&mut self) {
        self.stack.pop();
    }

    fn setup(&mut self, env: &Environment, filters: &[SharedFilter]) -> Result<()> {
        for filter in filters {
            if self.set_up.insert(filter.identity()) {
                filter.setup(env)?;
            }
        }
        Ok(())
    }
}

/// What a parent hands to [`Bundle::merge_and_apply`].
#[derive(Clone, Copy)]
struct Pass<'a> {
    /// Ancestor filters, applied to inputs only.
    parent_filters: &'a [SharedFilter],
    /// Container filters joining this bundle's own output stage.
    extra_output: &'a [SharedFilter],
    debug: DebugLevel,
    /// Inherited by nested bundles.
    no_cache_read: bool,
}

// ============================================================================
// Entry points
// ============================================================================

impl Bundle {
    /// Build this bundle, or every leaf of a container.
    ///
    /// Returns one hunk per leaf. A failing leaf of a container does not
    /// stop its siblings; the first error is returned once all have run.
    pub fn build(&self, env: &Environment, options: BuildOptions) -> Result<Vec<Hunk>> {
        let mut hunks = Vec::new();
        let mut session = Session::default();
        self.for_each_leaf(
            env,
            &[],
            env.debug(),
            &mut session,
            true,
            &mut |leaf, extra, debug, session| {
                hunks.push(leaf.build_leaf(env, extra, debug, options, session, None)?);
                Ok(())
            },
        )?;
        Ok(hunks)
    }

    /// Build and stream the result to `writer` instead of the output file.
    ///
    /// Works for bundles without an output. No version is computed and
    /// nothing is recorded in the manifest.
    pub fn build_to(
        &self,
        env: &Environment,
        writer: &mut dyn Write,
        options: BuildOptions,
    ) -> Result<()> {
        let mut session = Session::default();
        self.for_each_leaf(
            env,
            &[],
            env.debug(),
            &mut session,
            false,
            &mut |leaf, extra, debug, session| {
                leaf.build_leaf(env, extra, debug, options, session, Some(&mut *writer))
                    .map(drop)
            },
        )
    }

    /// Visit every leaf, handing it the filters collected from enclosing
    /// containers and its inherited debug level.
    pub(crate) fn for_each_leaf(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        inherited: DebugLevel,
        session: &mut Session,
        keep_going: bool,
        f: &mut dyn FnMut(&Bundle, &[SharedFilter], DebugLevel, &mut Session) -> Result<()>,
    ) -> Result<()> {
        if !self.is_container() {
            return f(self, extra, inherited, session);
        }

        session.enter(self)?;
        let result = self.visit_children(env, extra, inherited, session, keep_going, f);
        session.leave();
        result
    }

    fn visit_children(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        inherited: DebugLevel,
        session: &mut Session,
        keep_going: bool,
        f: &mut dyn FnMut(&Bundle, &[SharedFilter], DebugLevel, &mut Session) -> Result<()>,
    ) -> Result<()> {
        let passed = merge_filters(&self.filters, extra);
        let debug = DebugLevel::effective(self.debug, &passed, inherited);
        let mut first_error = None;

        for item in self.resolve_contents(env)? {
            match item {
                ResolvedContent::Bundle(child) => {
                    let result = child.for_each_leaf(env, &passed, debug, session, keep_going, f);
                    match result {
                        Ok(()) => {}
                        Err(e) if keep_going => {
                            if !child.is_container() {
                                crate::log!("error"; "{}: {}", child.label(), e);
                            }
                            first_error.get_or_insert(e);
                        }
                        Err(e) => return Err(e),
                    }
                }
                ResolvedContent::File { item, .. } => {
                    crate::debug!("bundle"; "{}: ignoring source `{}` in container", self.label(), item);
                }
                ResolvedContent::Url(url) => {
                    crate::debug!("bundle"; "{}: ignoring source `{}` in container", self.label(), url);
                }
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    // ========================================================================
    // Leaf builds
    // ========================================================================

    pub(super) fn build_leaf(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        inherited: DebugLevel,
        options: BuildOptions,
        session: &mut Session,
        mut writer: Option<&mut dyn Write>,
    ) -> Result<Hunk> {
        if self.output.is_none() && writer.is_none() {
            return Err(Error::build(format!(
                "{} has no output to build to",
                self.label()
            )));
        }

        let key = self.output.clone().unwrap_or_else(|| self.label());
        env.lock().run(&key, &mut || {
            let writer = writer.as_mut().map(|w| &mut **w as &mut dyn Write);
            self.build_locked(env, extra, inherited, options, session, writer)
        })
    }

    fn build_locked(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        inherited: DebugLevel,
        options: BuildOptions,
        session: &mut Session,
        writer: Option<&mut dyn Write>,
    ) -> Result<Hunk> {
        let debug = match DebugLevel::effective(self.debug, &merge_filters(&self.filters, extra), inherited) {
            DebugLevel::Full => {
                crate::debug!("bundle"; "{}: debug mode, building as production", self.label());
                DebugLevel::Off
            }
            level => level,
        };

        let decision = self.rebuild_decision(env, options)?;
        if !decision.is_needed()
            && let Some(existing) = self.existing_output(env)
        {
            crate::debug!("bundle"; "{}: up to date", self.label());
            let hunk = Hunk::file(existing);
            if let Some(writer) = writer {
                write_hunk(writer, &hunk)?;
            }
            return Ok(hunk);
        }

        let pass = Pass {
            parent_filters: &[],
            extra_output: extra,
            debug,
            no_cache_read: options.disable_cache || decision == Rebuild::SkipCache,
        };
        let hunk = self.merge_and_apply(env, pass, session)?;

        if let Some(writer) = writer {
            write_hunk(writer, &hunk)?;
            self.finish(env);
            return Ok(hunk);
        }

        let Some(output) = self.output() else {
            return Err(Error::build(format!("{} has no output to build to", self.label())));
        };
        let version = match env.versioner().determine_version(self, env, Some(&hunk)) {
            Ok(version) => Some(version),
            Err(e) if !has_placeholder(output) => {
                crate::debug!("version"; "{}: {}", self.label(), e);
                None
            }
            Err(e) => return Err(e),
        };

        let path = env.resolver().resolve_output(env, output, version.as_deref())?;
        hunk.save(&path)?;

        if let Some(version) = &version {
            self.remember_version(version);
            if let Some(manifest) = env.manifest()
                && let Err(e) = manifest.remember(self, env, version)
            {
                crate::log!("manifest"; "{}: {}", self.label(), e);
            }
        }
        self.stamp_output(env, &path);
        self.finish(env);

        crate::log!("build"; "{} -> {}", self.label(), path.display());
        Ok(hunk)
    }

    fn rebuild_decision(&self, env: &Environment, options: BuildOptions) -> Result<Rebuild> {
        if options.force {
            return Ok(Rebuild::Yes);
        }
        let Some(output) = self.output() else {
            return Ok(Rebuild::Yes);
        };
        if !has_placeholder(output)
            && mtime(&env.resolver().resolve_output(env, output, None)?).is_none()
        {
            return Ok(Rebuild::Yes);
        }

        Ok(env.updater().needs_rebuild(self, env).unwrap_or_else(|e| {
            crate::debug!("updater"; "{}: {}, rebuilding", self.label(), e);
            Rebuild::Yes
        }))
    }

    /// Output file of the current version, if it exists.
    fn existing_output(&self, env: &Environment) -> Option<PathBuf> {
        let output = self.output()?;
        let version = if has_placeholder(output) {
            Some(self.get_version(env, false).ok()?)
        } else {
            None
        };
        let path = env
            .resolver()
            .resolve_output(env, output, version.as_deref())
            .ok()?;
        path.is_file().then_some(path)
    }

    /// Give the output the newest source mtime, so rebuilding unchanged
    /// sources leaves it untouched.
    fn stamp_output(&self, env: &Environment, path: &Path) {
        match self.max_source_mtime(env) {
            Ok(Some(time)) => {
                if let Err(e) = set_mtime(path, time) {
                    crate::log!("build"; "cannot set mtime of {}: {}", path.display(), e);
                }
            }
            Ok(None) => {}
            Err(e) => crate::debug!("build"; "{}: {}", self.label(), e),
        }
    }

    fn finish(&self, env: &Environment) {
        if let Err(e) = env.updater().build_done(self, env) {
            crate::log!("updater"; "{}: {}", self.label(), e);
        }
    }

    // ========================================================================
    // Pipeline
    // ========================================================================

    fn merge_and_apply(&self, env: &Environment, pass: Pass<'_>, session: &mut Session) -> Result<Hunk> {
        session.enter(self)?;
        let result = self.merge_and_apply_inner(env, pass, session);
        session.leave();
        result
    }

    fn merge_and_apply_inner(
        &self,
        env: &Environment,
        pass: Pass<'_>,
        session: &mut Session,
    ) -> Result<Hunk> {
        let own = merge_filters(&self.filters, pass.extra_output);
        let selected_own = select_filters(&own, pass.debug);
        let to_run = merge_filters(&select_filters(pass.parent_filters, pass.debug), &selected_own);
        let pass_down = merge_filters(pass.parent_filters, &own);
        session.setup(env, &pass_down)?;

        let tool = FilterTool::new(env.cache().map(|c| &**c)).no_cache_read(pass.no_cache_read);
        let output_path = match self.output() {
            Some(output) if !has_placeholder(output) => {
                Some(env.resolver().resolve_output(env, output, None)?)
            }
            _ => None,
        };
        let ctx = FilterContext::new(env, &self.extra).with_output(self.output(), output_path.as_deref());

        let mut hunks = Vec::new();
        for item in self.resolve_contents(env)? {
            match item {
                ResolvedContent::Bundle(child) => {
                    let child_pass = Pass {
                        parent_filters: &pass_down,
                        extra_output: &[],
                        debug: DebugLevel::effective(child.debug, &child.filters, pass.debug),
                        no_cache_read: pass.no_cache_read,
                    };
                    hunks.push(child.merge_and_apply(env, child_pass, session)?);
                }
                ResolvedContent::File { item, path } => {
                    let ctx = ctx.with_source(&item, Some(path.as_path()));
                    let opened = match tool.apply_func(&to_run, FuncInput::Open(&path), &ctx)? {
                        Some(hunk) => hunk,
                        None => Hunk::file(&path),
                    };
                    hunks.push(tool.apply(&opened, &to_run, Hook::Input, &ctx)?);
                }
                ResolvedContent::Url(url) => {
                    let fetched = Hunk::Url(UrlHunk::new(url.clone(), env.cache().cloned()));
                    let ctx = ctx.with_source(&url, None);
                    hunks.push(tool.apply(&fetched, &to_run, Hook::Input, &ctx)?);
                }
            }
        }

        if hunks.is_empty() {
            return Err(Error::build(format!("{} has no contents", self.label())));
        }

        let joined = match tool.apply_func(&to_run, FuncInput::Concat(&hunks), &ctx)? {
            Some(hunk) => hunk,
            None => hunk::merge(&hunks)?,
        };
        tool.apply(&joined, &selected_own, Hook::Output, &ctx)
    }
}

fn write_hunk(writer: &mut dyn Write, hunk: &Hunk) -> Result<()> {
    writer
        .write_all(&hunk.bytes()?)
        .map_err(|e| Error::io("<output stream>", e))
}
