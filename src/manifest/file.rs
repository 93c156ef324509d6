//! File-backed manifest.
//!
//! Two on-disk formats:
//!
//! ```text
//! Lines:  one `template<TAB>version` record per line
//! Json:   {"gen/app-%(version)s.js": "3f2a91c0", ...}
//! ```
//!
//! Writes replace the whole file atomically. In auto-build mode every query
//! re-reads the file, so versions written by other processes are seen.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use super::Manifest;
use crate::bundle::Bundle;
use crate::env::Environment;
use crate::error::{Error, IoResultExt, Result};
use crate::utils::fs::atomic_write;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManifestFormat {
    Lines,
    #[default]
    Json,
}

impl ManifestFormat {
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Lines => ".assets-manifest",
            Self::Json => ".assets-manifest.json",
        }
    }

    fn parse(self, text: &str) -> Result<BTreeMap<String, String>> {
        match self {
            Self::Json => serde_json::from_str(text)
                .map_err(|e| Error::config(format!("corrupt manifest: {e}"))),
            Self::Lines => Ok(text
                .lines()
                .filter_map(|line| line.split_once('\t'))
                .map(|(template, version)| (template.to_string(), version.trim().to_string()))
                .collect()),
        }
    }

    fn render(self, entries: &BTreeMap<String, String>) -> Result<String> {
        match self {
            Self::Json => serde_json::to_string_pretty(entries)
                .map_err(|e| Error::config(format!("cannot encode manifest: {e}"))),
            Self::Lines => Ok(entries
                .iter()
                .map(|(template, version)| format!("{template}\t{version}\n"))
                .collect()),
        }
    }
}

#[derive(Debug)]
pub struct FileManifest {
    path: PathBuf,
    format: ManifestFormat,
    /// `None` until first read.
    entries: Mutex<Option<BTreeMap<String, String>>>,
}

impl FileManifest {
    pub fn new(path: impl Into<PathBuf>, format: ManifestFormat) -> Self {
        Self {
            path: path.into(),
            format,
            entries: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<BTreeMap<String, String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) => self.format.parse(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(Error::io(&self.path, e)),
        }
    }
}

impl Manifest for FileManifest {
    fn query(&self, bundle: &Bundle, env: &Environment) -> Result<Option<String>> {
        let Some(output) = bundle.output() else {
            return Ok(None);
        };
        let mut entries = self.entries.lock();
        if entries.is_none() || env.auto_build() {
            *entries = Some(self.read()?);
        }
        Ok(entries.as_ref().and_then(|e| e.get(output).cloned()))
    }

    fn remember(&self, bundle: &Bundle, _env: &Environment, version: &str) -> Result<()> {
        let Some(output) = bundle.output() else {
            return Ok(());
        };
        let mut entries = self.entries.lock();
        // merge with what other processes wrote since our last read
        let mut current = self.read().unwrap_or_else(|e| {
            crate::log!("manifest"; "discarding unreadable {}: {}", self.path.display(), e);
            BTreeMap::new()
        });
        current.insert(output.to_string(), version.to_string());

        let text = self.format.render(&current)?;
        *entries = Some(current);
        atomic_write(&self.path, text.as_bytes()).at(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvConfig;
    use tempfile::TempDir;

    fn env(auto_build: bool) -> Environment {
        Environment::new(EnvConfig {
            auto_build,
            ..EnvConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_roundtrip_both_formats() {
        let dir = TempDir::new().unwrap();
        let env = env(false);
        let bundle = Bundle::new(["a.js"]).with_output("gen/a-%(version)s.js");

        for format in [ManifestFormat::Lines, ManifestFormat::Json] {
            let path = dir.path().join(format.default_file_name());
            FileManifest::new(&path, format)
                .remember(&bundle, &env, "v1")
                .unwrap();

            let fresh = FileManifest::new(&path, format);
            assert_eq!(fresh.query(&bundle, &env).unwrap().as_deref(), Some("v1"));
        }
    }

    #[test]
    fn test_json_layout() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("m.json");
        let env = env(false);
        let bundle = Bundle::new(["a.js"]).with_output("out.js");
        FileManifest::new(&path, ManifestFormat::Json)
            .remember(&bundle, &env, "abc")
            .unwrap();

        let doc: BTreeMap<String, String> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc.get("out.js").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_auto_build_sees_other_writers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest");
        let bundle = Bundle::new(["a.js"]).with_output("out.js");

        for (auto_build, expected) in [(true, "v2"), (false, "v1")] {
            let env = env(auto_build);
            let ours = FileManifest::new(&path, ManifestFormat::Lines);
            ours.remember(&bundle, &env, "v1").unwrap();
            assert_eq!(ours.query(&bundle, &env).unwrap().as_deref(), Some("v1"));

            // another process records a newer version
            FileManifest::new(&path, ManifestFormat::Lines)
                .remember(&bundle, &env, "v2")
                .unwrap();
            assert_eq!(ours.query(&bundle, &env).unwrap().as_deref(), Some(expected));
        }
    }

    #[test]
    fn test_remember_keeps_other_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest");
        let env = env(false);
        let a = Bundle::new(["a.js"]).with_output("a.js");
        let b = Bundle::new(["b.js"]).with_output("b.js");

        FileManifest::new(&path, ManifestFormat::Lines)
            .remember(&a, &env, "1")
            .unwrap();
        FileManifest::new(&path, ManifestFormat::Lines)
            .remember(&b, &env, "2")
            .unwrap();

        let manifest = FileManifest::new(&path, ManifestFormat::Lines);
        assert_eq!(manifest.query(&a, &env).unwrap().as_deref(), Some("1"));
        assert_eq!(manifest.query(&b, &env).unwrap().as_deref(), Some("2"));
    }
}
