//! Load-path search and glob expansion.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};

use crate::env::Environment;
use crate::error::{Error, Result};
use crate::utils::path::{normalize_path, relative_to, to_url_path};

/// Directories searched for sources, in order. The environment directory
/// always comes last.
fn search_dirs(env: &Environment) -> Result<Vec<PathBuf>> {
    let mut dirs: Vec<PathBuf> = env.load_path().to_vec();
    let directory = env.directory()?.to_path_buf();
    if !dirs.contains(&directory) {
        dirs.push(directory);
    }
    Ok(dirs)
}

pub(super) fn find_file(env: &Environment, item: &str) -> Result<PathBuf> {
    let candidate = Path::new(item);
    if candidate.is_absolute() {
        return if candidate.is_file() {
            Ok(normalize_path(candidate))
        } else {
            Err(Error::bundle(format!("source file `{item}` not found")))
        };
    }

    for dir in search_dirs(env)? {
        let path = dir.join(item);
        if path.is_file() {
            return Ok(normalize_path(&path));
        }
    }
    Err(Error::bundle(format!(
        "source `{item}` not found in load path or directory"
    )))
}

/// Matches of `pattern` in every search directory, sorted per directory.
///
/// Results from the load path win over the directory fallback: once any
/// load path entry matches, the directory is not searched.
pub(super) fn expand_glob(env: &Environment, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    if Path::new(pattern).is_absolute() {
        return glob_in(None, pattern);
    }

    let mut matches = Vec::new();
    for dir in env.load_path() {
        matches.extend(glob_in(Some(dir), pattern)?);
    }
    if matches.is_empty() {
        let directory = env.directory()?;
        if !env.load_path().iter().any(|d| d == directory) {
            matches = glob_in(Some(directory), pattern)?;
        }
    }
    Ok(matches)
}

fn glob_in(dir: Option<&Path>, pattern: &str) -> Result<Vec<(String, PathBuf)>> {
    let full = match dir {
        Some(dir) => format!(
            "{}/{}",
            Pattern::escape(&dir.to_string_lossy()).trim_end_matches('/'),
            pattern
        ),
        None => pattern.to_string(),
    };
    let options = MatchOptions {
        require_literal_leading_dot: true,
        ..MatchOptions::new()
    };
    let entries = glob::glob_with(&full, options)
        .map_err(|e| Error::bundle(format!("invalid glob `{pattern}`: {e}")))?;

    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| match entry {
            Ok(path) => Some(path),
            Err(e) => {
                crate::debug!("resolver"; "skipping unreadable match: {}", e);
                None
            }
        })
        .filter(|path| path.is_file())
        .map(|path| normalize_path(&path))
        .collect();
    found.sort();

    Ok(found
        .into_iter()
        .map(|path| {
            let relative = dir
                .and_then(|d| relative_to(&path, &normalize_path(d)))
                .map(|rel| to_url_path(&rel))
                .unwrap_or_else(|| path.display().to_string());
            (relative, path)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvConfig;
    use crate::error::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn env(directory: &Path, load_path: Vec<PathBuf>) -> Environment {
        let config = EnvConfig {
            directory: Some(directory.to_path_buf()),
            load_path,
            ..EnvConfig::default()
        };
        Environment::new(config).unwrap()
    }

    #[test]
    fn test_load_path_order() {
        let dir = TempDir::new().unwrap();
        let (first, second) = (dir.path().join("first"), dir.path().join("second"));
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        fs::write(first.join("a.js"), "1").unwrap();
        fs::write(second.join("a.js"), "2").unwrap();
        fs::write(second.join("b.js"), "2").unwrap();

        let env = env(dir.path(), vec![first.clone(), second.clone()]);
        assert_eq!(find_file(&env, "a.js").unwrap(), normalize_path(&first.join("a.js")));
        assert_eq!(find_file(&env, "b.js").unwrap(), normalize_path(&second.join("b.js")));
    }

    #[test]
    fn test_directory_fallback() {
        let dir = TempDir::new().unwrap();
        let lib = dir.path().join("lib");
        fs::create_dir_all(&lib).unwrap();
        fs::write(dir.path().join("root.js"), "r").unwrap();

        let env = env(dir.path(), vec![lib]);
        assert_eq!(
            find_file(&env, "root.js").unwrap(),
            normalize_path(&dir.path().join("root.js"))
        );
        assert_eq!(find_file(&env, "gone.js").unwrap_err().kind(), ErrorKind::Bundle);
    }

    #[test]
    fn test_glob_sorted_files_only() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("js/sub.js")).unwrap();
        fs::write(dir.path().join("js/b.js"), "b").unwrap();
        fs::write(dir.path().join("js/a.js"), "a").unwrap();
        fs::write(dir.path().join("js/c.css"), "c").unwrap();

        let env = env(dir.path(), Vec::new());
        let found = expand_glob(&env, "js/*.js").unwrap();
        let relative: Vec<&str> = found.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(relative, ["js/a.js", "js/b.js"]);
    }

    #[test]
    fn test_glob_combines_load_paths() {
        let dir = TempDir::new().unwrap();
        let (one, two) = (dir.path().join("one"), dir.path().join("two"));
        fs::create_dir_all(&one).unwrap();
        fs::create_dir_all(&two).unwrap();
        fs::write(one.join("x.css"), "").unwrap();
        fs::write(two.join("y.css"), "").unwrap();

        let env = env(dir.path(), vec![one, two]);
        let found = expand_glob(&env, "*.css").unwrap();
        let relative: Vec<&str> = found.iter().map(|(r, _)| r.as_str()).collect();
        assert_eq!(relative, ["x.css", "y.css"]);
    }
}
