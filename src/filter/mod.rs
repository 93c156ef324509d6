//! Filter contract and pipeline execution.
//!
//! # Module Structure
//!
//! ```text
//! filter/
//! ├── mod.rs       # Filter trait, capability traits, Hook, MaxDebugLevel (this file)
//! ├── option.rs    # FilterOption: settings read from env config or OS env
//! ├── context.rs   # FilterContext handed to every hook
//! ├── registry.rs  # name -> factory
//! ├── tool.rs      # FilterTool: cached execution of one pipeline stage
//! ├── func.rs      # FnFilter: closure-backed filter
//! └── external.rs  # ExternalTool: subprocess-backed filter
//! ```
//!
//! # Hooks
//!
//! | Hook     | Runs                        | Per pipeline |
//! |----------|-----------------------------|--------------|
//! | `open`   | per source, instead of read | at most one  |
//! | `input`  | per source, after open      | any number   |
//! | `concat` | once, joins sources         | at most one  |
//! | `output` | once, after concat          | any number   |
//!
//! A filter advertises a hook by returning `Some` from the matching
//! `as_*` accessor. The engine never probes for methods.

mod context;
mod external;
mod func;
mod option;
mod registry;
mod tool;

pub use context::{Extra, FilterContext};
pub use external::ExternalTool;
pub use func::FnFilter;
pub use option::FilterOption;
pub use registry::{FilterArgs, FilterFactory, FilterRegistry};
pub use tool::{FilterTool, FuncInput};

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Deserializer};

use crate::bundle::DebugLevel;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::hunk::Hunk;

/// Filters are shared between bundles and pipeline stages.
pub type SharedFilter = Arc<dyn Filter>;

// ============================================================================
// Hooks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    Open,
    Input,
    Concat,
    Output,
}

impl Hook {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Input => "input",
            Self::Concat => "concat",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Hook {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "open" => Ok(Self::Open),
            "input" => Ok(Self::Input),
            "concat" => Ok(Self::Concat),
            "output" => Ok(Self::Output),
            other => Err(Error::config(format!("unknown filter hook `{other}`"))),
        }
    }
}

impl<'de> Deserialize<'de> for Hook {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Max debug level
// ============================================================================

/// Highest debug level at which a filter still runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaxDebugLevel {
    /// Runs at every level (`false`, or the legacy `null`).
    Always,
    /// Runs unless debugging is full (`"merge"`).
    Merge,
    /// Runs only in production builds (`true`).
    #[default]
    BuildOnly,
}

impl MaxDebugLevel {
    /// Whether a filter with this ceiling runs at `level`.
    pub fn runs_at(self, level: DebugLevel) -> bool {
        match level {
            DebugLevel::Off => true,
            DebugLevel::Merge => matches!(self, Self::Always | Self::Merge),
            DebugLevel::Full => self == Self::Always,
        }
    }
}

impl FromStr for MaxDebugLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "false" | "null" | "none" => Ok(Self::Always),
            "merge" => Ok(Self::Merge),
            "true" => Ok(Self::BuildOnly),
            other => Err(Error::config(format!("invalid max_debug_level `{other}`"))),
        }
    }
}

impl<'de> Deserialize<'de> for MaxDebugLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Option::<Raw>::deserialize(deserializer)? {
            None | Some(Raw::Flag(false)) => Ok(Self::Always),
            Some(Raw::Flag(true)) => Ok(Self::BuildOnly),
            Some(Raw::Text(s)) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

// ============================================================================
// Filter contract
// ============================================================================

/// A pluggable transformation exposing one or more hooks.
pub trait Filter: Send + Sync {
    /// Registry name, also used in error messages.
    fn name(&self) -> &str;

    /// Deduplication identity; filters with equal identity are interchangeable.
    ///
    /// Include every option that changes the output.
    fn identity(&self) -> String {
        self.name().to_string()
    }

    fn max_debug_level(&self) -> MaxDebugLevel {
        MaxDebugLevel::BuildOnly
    }

    /// Settings this filter reads from the environment.
    fn options(&self) -> Vec<FilterOption> {
        Vec::new()
    }

    /// Called before a build uses this filter. The default checks that
    /// every required option is available.
    fn setup(&self, env: &Environment) -> Result<()> {
        for option in self.options() {
            if option.required && env.option(&option.key).is_none() {
                return Err(Error::config(format!(
                    "filter `{}` requires option `{}`",
                    self.name(),
                    option.key
                )));
            }
        }
        Ok(())
    }

    /// Extra cache-key parts, e.g. contents of files the filter pulls in.
    fn additional_cache_keys(&self, _ctx: &FilterContext<'_>) -> Vec<String> {
        Vec::new()
    }

    fn as_open(&self) -> Option<&dyn OpenFilter> {
        None
    }

    fn as_input(&self) -> Option<&dyn InputFilter> {
        None
    }

    fn as_concat(&self) -> Option<&dyn ConcatFilter> {
        None
    }

    fn as_output(&self) -> Option<&dyn OutputFilter> {
        None
    }

    /// Whether this filter implements `hook`.
    fn supports(&self, hook: Hook) -> bool {
        match hook {
            Hook::Open => self.as_open().is_some(),
            Hook::Input => self.as_input().is_some(),
            Hook::Concat => self.as_concat().is_some(),
            Hook::Output => self.as_output().is_some(),
        }
    }
}

impl fmt::Debug for dyn Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filter({})", self.identity())
    }
}

/// Produces the content of a source file instead of reading it.
pub trait OpenFilter {
    fn open(
        &self,
        out: &mut dyn Write,
        source_path: &Path,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()>;
}

/// Transforms a single source.
pub trait InputFilter {
    fn input(&self, input: &[u8], out: &mut dyn Write, ctx: &FilterContext<'_>)
    -> anyhow::Result<()>;
}

/// Joins the processed sources into one stream.
pub trait ConcatFilter {
    fn concat(&self, out: &mut dyn Write, hunks: &[Hunk], ctx: &FilterContext<'_>)
    -> anyhow::Result<()>;
}

/// Transforms the joined stream.
pub trait OutputFilter {
    fn output(
        &self,
        input: &[u8],
        out: &mut dyn Write,
        ctx: &FilterContext<'_>,
    ) -> anyhow::Result<()>;
}

// ============================================================================
// List helpers
// ============================================================================

/// `first` followed by `second`, keeping only the first filter of each identity.
pub fn merge_filters(first: &[SharedFilter], second: &[SharedFilter]) -> Vec<SharedFilter> {
    let mut seen = FxHashSet::default();
    first
        .iter()
        .chain(second)
        .filter(|f| seen.insert(f.identity()))
        .cloned()
        .collect()
}

/// Filters allowed to run at `level`.
pub fn select_filters(filters: &[SharedFilter], level: DebugLevel) -> Vec<SharedFilter> {
    filters
        .iter()
        .filter(|f| f.max_debug_level().runs_at(level))
        .cloned()
        .collect()
}
