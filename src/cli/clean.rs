//! `clean` command.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use assetpipe::Environment;
use assetpipe::resolver::has_placeholder;

use super::common::{output_bundles, select_bundles};

/// Remove the filesystem cache and the outputs of the current versions.
pub fn run(env: &Environment) -> Result<()> {
    if let Some(cache) = env.cache()
        && let Some(dir) = cache.directory()
        && dir.exists()
    {
        fs::remove_dir_all(dir).with_context(|| format!("cannot remove {}", dir.display()))?;
        assetpipe::log!("clean"; "removed {}", dir.display());
    }

    let roots = select_bundles(env, &[])?;
    for bundle in output_bundles(env, &roots) {
        let Some(output) = bundle.output() else {
            continue;
        };
        let version = if has_placeholder(output) {
            match bundle.get_version(env, false) {
                Ok(version) => Some(version),
                Err(e) => {
                    assetpipe::debug!("clean"; "{}: skipped ({})", bundle.label(), e);
                    continue;
                }
            }
        } else {
            None
        };

        let path = env.resolver().resolve_output(env, output, version.as_deref())?;
        remove_file(&path)?;
    }
    Ok(())
}

fn remove_file(path: &Path) -> Result<()> {
    if path.is_file() {
        fs::remove_file(path).with_context(|| format!("cannot remove {}", path.display()))?;
        assetpipe::log!("clean"; "removed {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetpipe::{BuildOptions, Bundle, EnvConfig};
    use tempfile::TempDir;

    #[test]
    fn test_clean_removes_cache_and_outputs() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();
        let mut env = Environment::new(EnvConfig {
            directory: Some(dir.path().to_path_buf()),
            url: Some("/".into()),
            ..EnvConfig::default()
        })
        .unwrap();
        let js = env
            .register("js", Bundle::new(["a.js"]).with_output("app-%(version)s.js"))
            .unwrap();
        js.build(&env, BuildOptions::default()).unwrap();

        let output = dir.path().join("app-7fc56270.js");
        let cache_dir = env.cache().and_then(|c| c.directory()).unwrap().to_path_buf();
        assert!(output.exists());
        assert!(cache_dir.exists());

        run(&env).unwrap();
        assert!(!output.exists());
        assert!(!cache_dir.exists());
        assert!(dir.path().join("a.js").exists());
    }
}
