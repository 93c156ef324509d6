//! Bundle files: an environment and its bundles described in TOML.
//!
//! ```toml
//! [environment]
//! directory = "static"
//! url = "/static"
//!
//! [filters.uglify]
//! command = ["uglifyjs", "{input}", "-c"]
//! hook = "output"
//!
//! [bundles.vendor]
//! contents = ["vendor/*.js"]
//!
//! [bundles.js]
//! output = "gen/app-%(version)s.js"
//! filters = "uglify"
//! contents = ["vendor", "app.js", { contents = ["late.js"], debug = false }]
//! ```
//!
//! A relative `directory` is taken relative to the bundle file; without one
//! the file's own directory is used. A string in `contents` that names
//! another bundle of the file refers to that bundle.

mod schema;

pub use schema::{BundleFile, BundleSpec, ContentSpec, FilterList, FilterRef, ToolSpec};

use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;

use crate::bundle::{Bundle, Content};
use crate::env::Environment;
use crate::error::{Error, IoResultExt, Result};
use crate::filter::ExternalTool;

/// Load a bundle file into a ready environment.
pub fn load_file(path: &Path) -> Result<Environment> {
    let text = std::fs::read_to_string(path).at(path)?;
    let base = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let (file, ignored) = parse_with_ignored(&text)
        .map_err(|e| Error::config(format!("{}: {e}", path.display())))?;
    if !ignored.is_empty() {
        print_unknown_fields_warning(&ignored, path);
    }
    into_environment(file, &base)
}

/// Load bundle file text. Relative paths resolve against `base`.
pub fn load_str(text: &str, base: &Path) -> Result<Environment> {
    let (file, ignored) = parse_with_ignored(text).map_err(|e| Error::config(e.to_string()))?;
    for field in &ignored {
        crate::log!("warning"; "ignoring unknown field `{}`", field);
    }
    into_environment(file, base)
}

/// Parse TOML content, collecting any unknown fields.
fn parse_with_ignored(content: &str) -> std::result::Result<(BundleFile, Vec<String>), toml::de::Error> {
    let mut ignored = Vec::new();
    let deserializer = toml::Deserializer::new(content);
    let file = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
        ignored.push(path.to_string());
    })?;
    Ok((file, ignored))
}

fn print_unknown_fields_warning(fields: &[String], path: &Path) {
    let display_path = path
        .file_name()
        .map(|n| n.to_string_lossy())
        .unwrap_or_else(|| path.to_string_lossy());
    crate::log!("warning"; "unknown fields in {}:", display_path);
    for field in fields {
        crate::log!("warning"; "- {}", field);
    }
}

fn into_environment(file: BundleFile, base: &Path) -> Result<Environment> {
    let mut config = file.environment;
    config.directory = Some(match config.directory.take() {
        Some(dir) => {
            let dir = PathBuf::from(shellexpand::tilde(&dir.to_string_lossy()).into_owned());
            if dir.is_relative() { base.join(dir) } else { dir }
        }
        None => base.to_path_buf(),
    });

    let mut env = Environment::new(config)?;

    for (name, spec) in file.filters {
        let tool = ExternalTool::new(&name, spec.command, spec.hook)?
            .with_max_debug_level(spec.max_debug_level);
        crate::debug!("loader"; "registered tool filter `{}`", name);
        env.filters_mut().register_instance(std::sync::Arc::new(tool));
    }

    let names: FxHashSet<String> = file.bundles.keys().cloned().collect();
    for (name, spec) in file.bundles {
        let bundle = build_bundle(&env, spec, &names)
            .map_err(|e| Error::bundle(format!("bundle `{name}`: {e}")))?;
        env.register(name, bundle)?;
    }
    Ok(env)
}

fn build_bundle(env: &Environment, spec: BundleSpec, names: &FxHashSet<String>) -> Result<Bundle> {
    let mut contents = Vec::with_capacity(spec.contents.len());
    for item in spec.contents {
        contents.push(match item {
            ContentSpec::Source(item) if names.contains(&item) => Content::reference(item),
            ContentSpec::Source(item) => Content::from(item),
            ContentSpec::Ref(spec) => Content::reference(spec.name),
            ContentSpec::Nested(nested) => Content::from(build_bundle(env, *nested, names)?),
        });
    }

    let filters = spec
        .filters
        .into_refs()
        .iter()
        .map(|filter| env.create_filter(filter.name(), &filter.options()))
        .collect::<Result<Vec<_>>>()?;

    let mut bundle = Bundle::new(contents)
        .with_filters(filters)
        .with_depends(spec.depends.into_vec());
    if let Some(output) = spec.output {
        bundle = bundle.with_output(output);
    }
    if let Some(debug) = spec.debug {
        bundle = bundle.with_debug(debug);
    }
    for (key, value) in spec.extra {
        bundle = bundle.with_extra(key, value);
    }
    Ok(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{BuildOptions, DebugLevel};
    use crate::error::ErrorKind;
    use crate::filter::FnFilter;
    use std::fs;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_parse_collects_unknown_fields() {
        let (file, ignored) = parse_with_ignored(
            r#"
            colour = "blue"

            [environment]
            url = "/static"
            direktory = "static"

            [bundles.js]
            contents = ["a.js"]
            outptu = "app.js"
            "#,
        )
        .unwrap();

        assert_eq!(file.environment.url.as_deref(), Some("/static"));
        assert!(ignored.contains(&"colour".to_string()));
        assert!(ignored.contains(&"environment.direktory".to_string()));
        assert!(ignored.contains(&"bundles.js.outptu".to_string()));
    }

    #[test]
    fn test_content_forms() {
        let dir = TempDir::new().unwrap();
        let env = load_str(
            r#"
            [bundles.common]
            contents = ["lib.js"]

            [bundles.app]
            output = "app.js"
            contents = [
                "common",
                "a.js",
                { ref = "common" },
                { contents = ["b.js"], debug = "merge" },
            ]
            depends = "*.sass"
            extra = { media = "screen" }
            "#,
            dir.path(),
        )
        .unwrap();

        let app = env.bundle("app").unwrap();
        let contents = app.contents();
        assert!(matches!(&contents[0], Content::Ref(name) if name == "common"));
        assert!(matches!(&contents[1], Content::Source(item) if item == "a.js"));
        assert!(matches!(&contents[2], Content::Ref(name) if name == "common"));
        match &contents[3] {
            Content::Bundle(nested) => assert_eq!(nested.debug(), Some(DebugLevel::Merge)),
            other => panic!("expected nested bundle, got {other:?}"),
        }
        assert_eq!(app.depends(), ["*.sass"]);
        assert_eq!(app.extra()["media"], "screen");
    }

    #[test]
    fn test_filter_lists() {
        let dir = TempDir::new().unwrap();
        let text = r#"
            [filters.strip]
            command = ["tr", "-d", " "]
            hook = "input"
            max_debug_level = false

            [bundles.a]
            contents = ["a.js"]
            filters = "strip, upper"

            [bundles.b]
            contents = ["b.js"]
            filters = [{ name = "upper", options = { level = 2 } }]
        "#;

        // `upper` must be known when bundles are created
        let err = load_str(text, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Bundle);
        assert!(err.to_string().contains("upper"));

        let (mut file, _) = parse_with_ignored(text).unwrap();
        let refs = file.bundles.remove("a").unwrap().filters.into_refs();
        let names: Vec<&str> = refs.iter().map(FilterRef::name).collect();
        assert_eq!(names, ["strip", "upper"]);
    }

    #[test]
    fn test_relative_directory_follows_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("static")).unwrap();
        fs::write(dir.path().join("static/a.js"), "A").unwrap();
        let path = dir.path().join("assets.toml");
        fs::write(
            &path,
            r#"
            [environment]
            directory = "static"
            url = "/static"
            cache = false
            manifest = false

            [bundles.js]
            output = "app.js"
            contents = ["a.js"]
            "#,
        )
        .unwrap();

        let env = load_file(&path).unwrap();
        assert_eq!(env.directory().unwrap(), dir.path().join("static"));

        let js = env.bundle("js").unwrap();
        js.build(&env, BuildOptions::default()).unwrap();
        assert_eq!(fs::read_to_string(dir.path().join("static/app.js")).unwrap(), "A");
    }

    #[test]
    fn test_directory_defaults_to_file_location() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("assets.toml");
        fs::write(&path, "[environment]\nurl = \"/\"\n").unwrap();

        let env = load_file(&path).unwrap();
        assert_eq!(env.directory().unwrap(), dir.path());
    }

    #[test]
    fn test_syntax_error_is_config_error() {
        let dir = TempDir::new().unwrap();
        let err = load_str("[bundles.js\n", dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_registered_filters_resolve() {
        let (file, _) = parse_with_ignored(
            r#"
            [bundles.js]
            contents = ["a.js"]
            filters = ["upper"]
            "#,
        )
        .unwrap();

        let mut env = Environment::new(Default::default()).unwrap();
        env.filters_mut().register_instance(std::sync::Arc::new(FnFilter::output(
            "upper",
            |input, out, _| Ok(out.write_all(&input.to_ascii_uppercase())?),
        )));
        let names = FxHashSet::default();
        let spec = file.bundles.into_iter().next().unwrap().1;
        let bundle = build_bundle(&env, spec, &names).unwrap();
        assert_eq!(bundle.filters()[0].name(), "upper");
    }
}
