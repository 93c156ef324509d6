//! Serde schema of bundle files.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::bundle::DebugLevel;
use crate::env::EnvConfig;
use crate::filter::{Extra, FilterArgs, Hook, MaxDebugLevel};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BundleFile {
    pub environment: EnvConfig,
    /// Command-line tools, registered as filters under their key.
    pub filters: BTreeMap<String, ToolSpec>,
    pub bundles: BTreeMap<String, BundleSpec>,
}

#[derive(Debug, Deserialize)]
pub struct ToolSpec {
    pub command: Vec<String>,
    #[serde(default = "default_hook")]
    pub hook: Hook,
    #[serde(default)]
    pub max_debug_level: MaxDebugLevel,
}

fn default_hook() -> Hook {
    Hook::Output
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct BundleSpec {
    pub output: Option<String>,
    pub filters: FilterList,
    pub contents: Vec<ContentSpec>,
    pub depends: StringList,
    pub debug: Option<DebugLevel>,
    pub extra: Extra,
}

/// `"a, b"` or `["a", { name = "b", options = { ... } }]`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FilterList {
    Comma(String),
    List(Vec<FilterRef>),
}

impl Default for FilterList {
    fn default() -> Self {
        Self::List(Vec::new())
    }
}

impl FilterList {
    pub fn into_refs(self) -> Vec<FilterRef> {
        match self {
            Self::Comma(names) => names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(|name| FilterRef::Name(name.to_string()))
                .collect(),
            Self::List(refs) => refs,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum FilterRef {
    Name(String),
    Detailed {
        name: String,
        #[serde(default)]
        options: FilterArgs,
    },
}

impl FilterRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Name(name) | Self::Detailed { name, .. } => name,
        }
    }

    pub fn options(&self) -> FilterArgs {
        match self {
            Self::Name(_) => FilterArgs::new(),
            Self::Detailed { options, .. } => options.clone(),
        }
    }
}

/// One `contents` entry.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ContentSpec {
    /// Path, glob, URL, or the name of another bundle in the file.
    Source(String),
    Ref(RefSpec),
    Nested(Box<BundleSpec>),
}

/// `{ ref = "name" }`
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefSpec {
    #[serde(rename = "ref")]
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StringList {
    One(String),
    Many(Vec<String>),
}

impl Default for StringList {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl StringList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(item) => vec![item],
            Self::Many(items) => items,
        }
    }
}
