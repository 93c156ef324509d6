//! Closure-backed filters.
//!
//! Handy for host code and tests that need a one-off transformation
//! without declaring a type.
//!
//! ```ignore
//! let strip = FnFilter::input("strip", |input, out, _ctx| {
//!     out.write_all(input.trim_ascii())?;
//!     Ok(())
//! });
//! ```

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use super::{
    ConcatFilter, Filter, FilterContext, Hook, InputFilter, MaxDebugLevel, OpenFilter,
    OutputFilter,
};
use crate::hunk::Hunk;

type OpenFn =
    dyn Fn(&mut dyn Write, &Path, &FilterContext<'_>) -> anyhow::Result<()> + Send + Sync;
type TransformFn =
    dyn Fn(&[u8], &mut dyn Write, &FilterContext<'_>) -> anyhow::Result<()> + Send + Sync;
type ConcatFn =
    dyn Fn(&mut dyn Write, &[Hunk], &FilterContext<'_>) -> anyhow::Result<()> + Send + Sync;

#[derive(Clone)]
enum Func {
    Open(Arc<OpenFn>),
    Input(Arc<TransformFn>),
    Concat(Arc<ConcatFn>),
    Output(Arc<TransformFn>),
}

/// A filter implementing exactly one hook with a closure.
#[derive(Clone)]
pub struct FnFilter {
    name: String,
    identity: Option<String>,
    max_debug_level: MaxDebugLevel,
    func: Func,
}

impl FnFilter {
    fn with_func(name: impl Into<String>, func: Func) -> Self {
        Self {
            name: name.into(),
            identity: None,
            max_debug_level: MaxDebugLevel::default(),
            func,
        }
    }

    pub fn open<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Write, &Path, &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::with_func(name, Func::Open(Arc::new(f)))
    }

    pub fn input<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8], &mut dyn Write, &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::with_func(name, Func::Input(Arc::new(f)))
    }

    pub fn concat<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&mut dyn Write, &[Hunk], &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::with_func(name, Func::Concat(Arc::new(f)))
    }

    pub fn output<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&[u8], &mut dyn Write, &FilterContext<'_>) -> anyhow::Result<()>
            + Send
            + Sync
            + 'static,
    {
        Self::with_func(name, Func::Output(Arc::new(f)))
    }

    /// Override the identity (defaults to the name).
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn with_max_debug_level(mut self, level: MaxDebugLevel) -> Self {
        self.max_debug_level = level;
        self
    }

    pub fn hook(&self) -> Hook {
        match self.func {
            Func::Open(_) => Hook::Open,
            Func::Input(_) => Hook::Input,
            Func::Concat(_) => Hook::Concat,
            Func::Output(_) => Hook::Output,
        }
    }
}

impl Filter for FnFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn identity(&self) -> String {
        self.identity.clone().unwrap_or_else(|| self.name.clone())
    }

    fn max_debug_level(&self) -> MaxDebugLevel {
        self.max_debug_level
    }

    fn as_open(&self) -> Option<&dyn OpenFilter> {
        matches!(self.func, Func::Open(_)).then_some(self as &dyn OpenFilter)
    }

    fn as_input(&self) -> Option<&dyn InputFilter> {
        matches!(self.func, Func::Input(_)).then_some(self as &dyn InputFilter)
    }

    fn as_concat(&self) -> Option<&dyn ConcatFilter> {
        matches!(self.func, Func::Concat(_)).then_some(self as &dyn ConcatFilter)
    }

    fn as_output(&self) -> Option<&dyn OutputFilter> {
        matches!(self.func, Func::Output(_)).then_some(self as &dyn OutputFilter)
    }
}

impl OpenFilter for FnFilter {
    fn open(
        &self,
        out: &mut dyn Write,
        source_path: &Path,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        match &self.func {
            Func::Open(f) => f(out, source_path, ctx),
            _ => Ok(()),
        }
    }
}

impl InputFilter for FnFilter {
    fn input(
        &self,
        input: &[u8],
        out: &mut dyn Write,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        match &self.func {
            Func::Input(f) => f(input, out, ctx),
            _ => Ok(()),
        }
    }
}

impl ConcatFilter for FnFilter {
    fn concat(
        &self,
        out: &mut dyn Write,
        hunks: &[Hunk],
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        match &self.func {
            Func::Concat(f) => f(out, hunks, ctx),
            _ => Ok(()),
        }
    }
}

impl OutputFilter for FnFilter {
    fn output(
        &self,
        input: &[u8],
        out: &mut dyn Write,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()> {
        match &self.func {
            Func::Output(f) => f(input, out, ctx),
            _ => Ok(()),
        }
    }
}
