//! `urls` command.

use anyhow::Result;
use assetpipe::Environment;

/// Print one URL per line, followed by its integrity hash when asked for.
pub fn run(env: &Environment, name: &str, sri: bool) -> Result<()> {
    for url in env.urls(name, sri)? {
        match &url.sri {
            Some(hash) => println!("{} {}", url.uri, hash),
            None => println!("{}", url.uri),
        }
    }
    Ok(())
}
