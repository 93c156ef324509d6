//! Helpers shared by the commands.

use std::sync::Arc;

use anyhow::{Result, bail};
use assetpipe::{Bundle, Content, Environment};
use rustc_hash::FxHashSet;

/// Registered bundles by name, or all of them when `names` is empty.
pub fn select_bundles(env: &Environment, names: &[String]) -> Result<Vec<Arc<Bundle>>> {
    if names.is_empty() {
        return Ok(env.bundles().cloned().collect());
    }
    names
        .iter()
        .map(|name| match env.bundle(name) {
            Some(bundle) => Ok(bundle),
            None => bail!("no bundle named `{name}`"),
        })
        .collect()
}

/// Every bundle with an output reachable from `roots`, each listed once.
pub fn output_bundles(env: &Environment, roots: &[Arc<Bundle>]) -> Vec<Arc<Bundle>> {
    let mut seen = FxHashSet::default();
    let mut found = Vec::new();
    let mut pending: Vec<Arc<Bundle>> = roots.iter().rev().cloned().collect();

    while let Some(bundle) = pending.pop() {
        if !seen.insert(Arc::as_ptr(&bundle)) {
            continue;
        }
        if bundle.output().is_some() {
            found.push(bundle.clone());
        }
        for item in bundle.contents().iter().rev() {
            match item {
                Content::Bundle(child) => pending.push(child.clone()),
                Content::Ref(name) => pending.extend(env.bundle(name)),
                Content::Source(_) => {}
            }
        }
    }
    found
}
