//! `check` command.

use anyhow::{Result, bail};
use assetpipe::Environment;
use assetpipe::updater::Rebuild;

use super::common::{output_bundles, select_bundles};

/// List outputs the updater would rebuild. Fails when any is stale.
pub fn run(env: &Environment) -> Result<()> {
    let roots = select_bundles(env, &[])?;
    let mut stale = 0;

    for bundle in output_bundles(env, &roots) {
        let reason = match env.updater().needs_rebuild(&bundle, env)? {
            Rebuild::No => continue,
            Rebuild::Yes => "changed",
            Rebuild::SkipCache => "dependency changed",
        };
        stale += 1;
        println!("{} ({})", bundle.label(), reason);
    }

    if stale > 0 {
        bail!("{stale} bundle output(s) out of date");
    }
    assetpipe::log!("check"; "all bundles up to date");
    Ok(())
}
