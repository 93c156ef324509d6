//! Timestamp versions.

use super::Versioner;
use crate::bundle::Bundle;
use crate::env::Environment;
use crate::error::{Error, Result};
use crate::hunk::Hunk;
use crate::resolver::has_placeholder;
use crate::utils::fs::{mtime, unix_seconds};

/// Newest modification time among a bundle's files, in whole seconds.
///
/// After a build the output's mtime is set to that same value, so an
/// existing output file yields the version it was built with.
#[derive(Debug, Default, Clone, Copy)]
pub struct TimestampVersioner;

impl Versioner for TimestampVersioner {
    fn determine_version(
        &self,
        bundle: &Bundle,
        env: &Environment,
        hunk: Option<&Hunk>,
    ) -> Result<String> {
        if hunk.is_none()
            && let Some(output) = bundle.output()
            && !has_placeholder(output)
        {
            let path = env.resolver().resolve_output(env, output, None)?;
            if let Some(time) = mtime(&path) {
                return Ok(unix_seconds(time).to_string());
            }
        }

        match bundle.max_source_mtime(env)? {
            Some(time) => Ok(unix_seconds(time).to_string()),
            None => Err(Error::VersionIndeterminable(format!(
                "{} has no local files to take a timestamp from",
                bundle.label()
            ))),
        }
    }
}
