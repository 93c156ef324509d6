//! `build` command.

use anyhow::{Result, bail};
use assetpipe::{BuildOptions, DebugLevel, Environment};

use super::BuildArgs;
use super::common::select_bundles;

/// Build the selected bundles, reporting each one. Fails if any bundle failed.
pub fn run(env: &mut Environment, args: &BuildArgs) -> Result<()> {
    if args.production {
        env.set_debug(DebugLevel::Off);
    }
    let options = BuildOptions {
        force: args.force,
        disable_cache: args.no_cache,
    };

    let results = if args.names.is_empty() {
        env.build_all(options)
    } else {
        select_bundles(env, &args.names)?
            .into_iter()
            .map(|bundle| {
                let result = bundle.build(env, options);
                (bundle, result)
            })
            .collect()
    };

    let mut failed = 0;
    for (bundle, result) in &results {
        match result {
            Ok(hunks) => {
                let n = hunks.len();
                assetpipe::log!("build"; "{} ({} output{})", bundle.label(), n, if n == 1 { "" } else { "s" });
            }
            Err(e) => {
                failed += 1;
                assetpipe::log!("error"; "{}: {}", bundle.label(), e);
            }
        }
    }

    if failed > 0 {
        bail!("{failed} of {} bundles failed", results.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assetpipe::{Bundle, EnvConfig};
    use std::fs;
    use tempfile::TempDir;

    fn args(names: &[&str]) -> BuildArgs {
        BuildArgs {
            names: names.iter().map(|n| n.to_string()).collect(),
            force: false,
            no_cache: false,
            production: true,
        }
    }

    #[test]
    fn test_build_reports_failures() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.js"), "A").unwrap();
        let mut env = Environment::new(EnvConfig {
            directory: Some(dir.path().to_path_buf()),
            url: Some("/".into()),
            debug: DebugLevel::Merge,
            ..EnvConfig::default()
        })
        .unwrap();
        env.register("good", Bundle::new(["a.js"]).with_output("good.js")).unwrap();
        env.register("bad", Bundle::new(["missing.js"]).with_output("bad.js")).unwrap();

        run(&mut env, &args(&["good"])).unwrap();
        assert_eq!(env.debug(), DebugLevel::Off);
        assert_eq!(fs::read_to_string(dir.path().join("good.js")).unwrap(), "A");

        let err = run(&mut env, &args(&[])).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
    }
}
