//! Public URLs of a bundle.
//!
//! | Effective debug     | URLs                                                   |
//! |---------------------|--------------------------------------------------------|
//! | `Full`              | one per source file or remote URL, nothing is built    |
//! | `Merge` / `Off`     | one for the output, built first when `auto_build` is on |
//!
//! With `url_expire` unset, the version is appended as a query string only
//! when the output template has no `%(version)s` to carry it.

use std::fmt;
use std::path::Path;

use base64::Engine as _;
use serde::Serialize;
use sha2::{Digest, Sha384};

use super::build::Session;
use super::{BuildOptions, Bundle, DebugLevel, ResolvedContent};
use crate::env::Environment;
use crate::error::{Error, IoResultExt, Result};
use crate::filter::{SharedFilter, merge_filters};
use crate::resolver::has_placeholder;

/// A URL to serve, with its subresource integrity hash when requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetUrl {
    pub uri: String,
    /// `sha384-<base64>`; absent for remote sources.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sri: Option<String>,
}

impl AssetUrl {
    fn plain(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            sri: None,
        }
    }
}

impl fmt::Display for AssetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl Bundle {
    /// URLs to reference this bundle from a page.
    pub fn urls(&self, env: &Environment, sri: bool) -> Result<Vec<AssetUrl>> {
        let mut session = Session::default();
        let mut urls = Vec::new();

        // a container in full debug mode still lists its loose sources
        if DebugLevel::effective(self.debug, &self.filters, env.debug()) == DebugLevel::Full {
            self.source_urls(env, &[], sri, &mut session, &mut urls)?;
            return Ok(urls);
        }

        self.for_each_leaf(
            env,
            &[],
            env.debug(),
            &mut session,
            false,
            &mut |leaf, extra, debug, session| {
                urls.extend(leaf.leaf_urls(env, extra, debug, sri, session)?);
                Ok(())
            },
        )?;
        Ok(urls)
    }

    fn leaf_urls(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        inherited: DebugLevel,
        sri: bool,
        session: &mut Session,
    ) -> Result<Vec<AssetUrl>> {
        let debug = DebugLevel::effective(self.debug, &merge_filters(&self.filters, extra), inherited);
        if debug == DebugLevel::Full {
            let mut urls = Vec::new();
            self.source_urls(env, extra, sri, session, &mut urls)?;
            return Ok(urls);
        }

        let Some(output) = self.output() else {
            return Err(Error::build(format!(
                "{} has no output and can only be served in debug mode",
                self.label()
            )));
        };
        if env.auto_build() {
            self.build_leaf(env, extra, inherited, BuildOptions::default(), session, None)?;
        }
        Ok(vec![self.output_url(env, output, env.auto_build(), sri)?])
    }

    /// Individual source URLs; nested bundles decide for themselves whether
    /// they are inlined or built.
    fn source_urls(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        sri: bool,
        session: &mut Session,
        urls: &mut Vec<AssetUrl>,
    ) -> Result<()> {
        session.enter(self)?;
        let result = self.collect_source_urls(env, extra, sri, session, urls);
        session.leave();
        result
    }

    fn collect_source_urls(
        &self,
        env: &Environment,
        extra: &[SharedFilter],
        sri: bool,
        session: &mut Session,
        urls: &mut Vec<AssetUrl>,
    ) -> Result<()> {
        let resolver = env.resolver();
        let passed = merge_filters(extra, &self.filters);

        for item in self.resolve_contents(env)? {
            match item {
                ResolvedContent::Bundle(child) => {
                    urls.extend(child.leaf_urls(env, &passed, DebugLevel::Full, sri, session)?);
                }
                ResolvedContent::File { item, path } => {
                    let served = resolver.pull_external(env, &path)?;
                    let uri = resolver.resolve_source_to_url(env, &served, &item)?;
                    let sri = sri.then(|| subresource_integrity(&served)).transpose()?;
                    urls.push(AssetUrl { uri, sri });
                }
                ResolvedContent::Url(url) => urls.push(AssetUrl::plain(url)),
            }
        }
        Ok(())
    }

    fn output_url(&self, env: &Environment, output: &str, refresh: bool, sri: bool) -> Result<AssetUrl> {
        let placeholder = has_placeholder(output);
        let version = if placeholder || env.url_expire() != Some(false) {
            match self.get_version(env, refresh) {
                Ok(version) => Some(version),
                Err(e) if !placeholder => {
                    crate::debug!("bundle"; "{}: serving without version ({})", self.label(), e);
                    None
                }
                Err(e) => return Err(e),
            }
        } else {
            None
        };

        let resolver = env.resolver();
        let path = resolver.resolve_output(env, output, version.as_deref())?;
        let mut uri = resolver.resolve_output_to_url(env, &path)?;

        let expire = env.url_expire().unwrap_or(!placeholder);
        if expire && let Some(version) = &version {
            uri = format!("{uri}?{version}");
        }

        let sri = sri.then(|| subresource_integrity(&path)).transpose()?;
        Ok(AssetUrl { uri, sri })
    }
}

/// `sha384-<base64>` over the bytes of `path`.
pub fn subresource_integrity(path: &Path) -> Result<String> {
    let data = std::fs::read(path).at(path)?;
    let digest = Sha384::digest(&data);
    Ok(format!(
        "sha384-{}",
        base64::engine::general_purpose::STANDARD.encode(digest)
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Content;
    use crate::env::EnvConfig;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    const EMPTY_SRI: &str = "sha384-OLBgp1GsljhM2TJ+sbHjaiH9txEUvgdDTAzHv2P24donTt6/529l+9Ua0vFImLlb";

    fn config_at(dir: &Path) -> EnvConfig {
        EnvConfig {
            directory: Some(dir.to_path_buf()),
            url: Some("/static".into()),
            cache: "memory".parse().unwrap(),
            ..EnvConfig::default()
        }
    }

    fn uris(urls: &[AssetUrl]) -> Vec<&str> {
        urls.iter().map(|u| u.uri.as_str()).collect()
    }

    #[test]
    fn test_url_expire_variants() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();

        let cases = [
            (None, "out.js", "/static/out.js?7fc56270"),
            (Some(false), "out.js", "/static/out.js"),
            (None, "out-%(version)s.js", "/static/out-7fc56270.js"),
            (Some(true), "out-%(version)s.js", "/static/out-7fc56270.js?7fc56270"),
        ];
        for (url_expire, output, expected) in cases {
            let env = Environment::new(EnvConfig {
                url_expire,
                ..config_at(dir.path())
            })
            .unwrap();
            let bundle = Bundle::new(["a.js"]).with_output(output);
            let urls = bundle.urls(&env, false).unwrap();
            assert_eq!(uris(&urls), [expected], "url_expire={url_expire:?} output={output}");
        }
    }

    #[test]
    fn test_debug_lists_sources() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        fs::write(dir.path().join("sub/b.js"), "B").unwrap();
        let env = Environment::new(EnvConfig {
            debug: DebugLevel::Full,
            ..config_at(dir.path())
        })
        .unwrap();

        let bundle = Bundle::new([
            Content::from("a.js"),
            Content::from("https://cdn.example.com/lib.js"),
            Bundle::new(["sub/*.js"]).into(),
        ])
        .with_output("out.js");

        let urls = bundle.urls(&env, true).unwrap();
        assert_eq!(
            uris(&urls),
            ["/static/a.js", "https://cdn.example.com/lib.js", "/static/sub/b.js"]
        );
        assert_eq!(urls[0].sri.as_deref(), Some(EMPTY_SRI));
        assert_eq!(urls[1].sri, None);
        assert!(!dir.path().join("out.js").exists());
    }

    #[test]
    fn test_output_sri() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "").unwrap();
        let env = Environment::new(EnvConfig {
            url_expire: Some(false),
            ..config_at(dir.path())
        })
        .unwrap();

        let urls = Bundle::new(["a.js"])
            .with_output("out.js")
            .urls(&env, true)
            .unwrap();
        assert_eq!(urls[0].uri, "/static/out.js");
        assert_eq!(urls[0].sri.as_deref(), Some(EMPTY_SRI));
    }

    #[test]
    fn test_container_urls() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();
        fs::write(dir.path().join("b.css"), "B").unwrap();
        let env = Environment::new(EnvConfig {
            url_expire: Some(false),
            ..config_at(dir.path())
        })
        .unwrap();

        let container = Bundle::new([
            Content::from(Bundle::new(["a.js"]).with_output("app.js")),
            Content::from(Bundle::new(["b.css"]).with_output("app.css")),
        ]);
        let urls = container.urls(&env, false).unwrap();
        assert_eq!(uris(&urls), ["/static/app.js", "/static/app.css"]);
    }

    #[test]
    fn test_without_output_only_debug_serves() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();
        let env = Environment::new(config_at(dir.path())).unwrap();

        let err = Bundle::new(["a.js"]).urls(&env, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Build);

        let debug = Bundle::new(["a.js"]).with_debug(DebugLevel::Full);
        let env = Environment::new(EnvConfig {
            debug: DebugLevel::Full,
            ..config_at(dir.path())
        })
        .unwrap();
        assert_eq!(uris(&debug.urls(&env, false).unwrap()), ["/static/a.js"]);
    }

    #[test]
    fn test_no_auto_build_needs_known_version() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();
        let env = Environment::new(EnvConfig {
            auto_build: false,
            ..config_at(dir.path())
        })
        .unwrap();

        let bundle = Bundle::new(["a.js"]).with_output("out-%(version)s.js");
        let err = bundle.urls(&env, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bundle);
        assert!(!dir.path().join("out-7fc56270.js").exists());

        bundle.build(&env, BuildOptions::default()).unwrap();
        assert_eq!(uris(&bundle.urls(&env, false).unwrap()), ["/static/out-7fc56270.js"]);
    }

    #[test]
    fn test_display_and_serialize() {
        let url = AssetUrl::plain("/static/a.js");
        assert_eq!(url.to_string(), "/static/a.js");
        assert_eq!(serde_json::to_string(&url).unwrap(), r#"{"uri":"/static/a.js"}"#);
    }
}
