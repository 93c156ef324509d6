//! Debug levels and their inheritance through nested bundles.
//!
//! ```text
//! Full ("true")  ⊒  Merge ("merge")  ⊒  Off ("false")
//! ```
//!
//! A level can only move downward through nesting: a child asking for a
//! higher level than its parent is clamped to the parent's.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::filter::{MaxDebugLevel, SharedFilter};

/// How much of the pipeline runs for a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum DebugLevel {
    /// Production: every filter runs and sources are merged.
    #[default]
    Off,
    /// Sources are merged, only filters that tolerate debugging run.
    Merge,
    /// No build: every source is served individually.
    Full,
}

impl DebugLevel {
    /// Level of a bundle given the level it inherits.
    ///
    /// `explicit` is the bundle's own setting. Without one, a bundle whose
    /// filters include one that must always run is placed in merge mode.
    /// The result never exceeds `inherited`.
    pub fn effective(
        explicit: Option<DebugLevel>,
        filters: &[SharedFilter],
        inherited: DebugLevel,
    ) -> DebugLevel {
        let requested = explicit.or_else(|| {
            filters
                .iter()
                .any(|f| f.max_debug_level() == MaxDebugLevel::Always)
                .then_some(DebugLevel::Merge)
        });
        match requested {
            Some(level) if level < inherited => level,
            _ => inherited,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "false",
            Self::Merge => "merge",
            Self::Full => "true",
        }
    }
}

impl fmt::Display for DebugLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<bool> for DebugLevel {
    fn from(value: bool) -> Self {
        if value { Self::Full } else { Self::Off }
    }
}

impl FromStr for DebugLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "false" | "off" | "no" | "0" => Ok(Self::Off),
            "merge" => Ok(Self::Merge),
            "true" | "on" | "yes" | "1" => Ok(Self::Full),
            other => Err(Error::config(format!(
                "invalid debug level `{other}` (expected true, false or \"merge\")"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for DebugLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Flag(bool),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Flag(flag) => Ok(flag.into()),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FnFilter, MaxDebugLevel};
    use std::io::Write;
    use std::sync::Arc;

    fn always_filter() -> SharedFilter {
        Arc::new(
            FnFilter::input("always", |input, out, _| Ok(out.write_all(input)?))
                .with_max_debug_level(MaxDebugLevel::Always),
        )
    }

    #[test]
    fn test_ordering() {
        assert!(DebugLevel::Full > DebugLevel::Merge);
        assert!(DebugLevel::Merge > DebugLevel::Off);
    }

    #[test]
    fn test_parse() {
        assert_eq!("merge".parse::<DebugLevel>().unwrap(), DebugLevel::Merge);
        assert_eq!("True".parse::<DebugLevel>().unwrap(), DebugLevel::Full);
        assert_eq!("false".parse::<DebugLevel>().unwrap(), DebugLevel::Off);
        assert!("sometimes".parse::<DebugLevel>().is_err());
    }

    #[test]
    fn test_deserialize_bool_or_string() {
        #[derive(Deserialize)]
        struct Doc {
            debug: DebugLevel,
        }
        let doc: Doc = toml::from_str("debug = true").unwrap();
        assert_eq!(doc.debug, DebugLevel::Full);
        let doc: Doc = toml::from_str("debug = \"merge\"").unwrap();
        assert_eq!(doc.debug, DebugLevel::Merge);
    }

    #[test]
    fn test_child_is_clamped_downward() {
        let level = DebugLevel::effective(Some(DebugLevel::Full), &[], DebugLevel::Merge);
        assert_eq!(level, DebugLevel::Merge);

        let level = DebugLevel::effective(Some(DebugLevel::Off), &[], DebugLevel::Full);
        assert_eq!(level, DebugLevel::Off);

        let level = DebugLevel::effective(None, &[], DebugLevel::Full);
        assert_eq!(level, DebugLevel::Full);
    }

    #[test]
    fn test_always_filter_downgrades_to_merge() {
        let filters = [always_filter()];
        assert_eq!(
            DebugLevel::effective(None, &filters, DebugLevel::Full),
            DebugLevel::Merge
        );
        // an explicit setting wins over the downgrade
        assert_eq!(
            DebugLevel::effective(Some(DebugLevel::Full), &filters, DebugLevel::Full),
            DebugLevel::Full
        );
    }
}
