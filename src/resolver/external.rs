//! URL mapping and external file pulls.

use std::fs;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::error::{Error, IoResultExt, Result};
use crate::utils::fs::mtime;
use crate::utils::hash::fingerprint;
use crate::utils::path::{normalize_path, relative_to, to_url_path, url_prefix_join};

/// Directory under the environment directory holding pulled external files.
pub const EXTERNAL_CACHE_DIR: &str = "external-cache";

/// `(directory, url)` pairs a file can be served from.
fn mappings(env: &Environment) -> Vec<(PathBuf, Result<String>)> {
    let mut pairs: Vec<(PathBuf, Result<String>)> = env
        .url_mapping()
        .iter()
        .map(|(dir, url)| (normalize_path(dir), Ok(url.clone())))
        .collect();
    if let Ok(directory) = env.directory() {
        pairs.push((normalize_path(directory), env.url().map(str::to_string)));
    }
    pairs
}

pub(super) fn query_url_mapping(env: &Environment, path: &Path) -> Result<String> {
    let path = normalize_path(path);
    let best = mappings(env)
        .into_iter()
        .filter(|(dir, _)| path.starts_with(dir))
        .max_by_key(|(dir, _)| dir.components().count());

    let Some((dir, url)) = best else {
        return Err(Error::bundle(format!(
            "cannot determine url for `{}`: outside of directory and every url mapping",
            path.display()
        )));
    };
    let relative = relative_to(&path, &dir).unwrap_or_default();
    Ok(url_prefix_join(&url?, &to_url_path(&relative)))
}

pub(super) fn pull_external(env: &Environment, path: &Path) -> Result<PathBuf> {
    let path = normalize_path(path);
    if mappings(env).iter().any(|(dir, _)| path.starts_with(dir)) {
        return Ok(path);
    }

    let basename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let target = normalize_path(env.directory()?)
        .join(EXTERNAL_CACHE_DIR)
        .join(format!("{}_{}", fingerprint(path.as_os_str().as_encoded_bytes()), basename));

    let fresh = match (mtime(&target), mtime(&path)) {
        (Some(copied), Some(original)) => copied >= original,
        _ => false,
    };
    if !fresh {
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).at(parent)?;
        }
        fs::copy(&path, &target).at(&path)?;
        crate::debug!("resolver"; "pulled {} -> {}", path.display(), target.display());
    }
    Ok(target)
}
