//! Path normalization utilities.
//!
//! Provides consistent path handling across the codebase:
//! - `normalize_path` - absolute, lexically cleaned paths
//! - `relative_to` - strip a base directory
//! - `has_glob_magic` - detect glob patterns in contents entries

use std::path::{Component, Path, PathBuf};

/// Normalize a file system path to absolute form.
///
/// Relative paths are joined with the current directory. `.` and `..`
/// components are folded lexically; symlinks are left alone so that
/// paths compare equal whether or not the file exists yet.
///
/// # Example
/// ```ignore
/// use assetpipe::utils::path::normalize_path;
/// let abs = normalize_path(Path::new("./static/../static/app.js"));
/// ```
pub fn normalize_path(path: &Path) -> PathBuf {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().map_or_else(|_| path.to_path_buf(), |cwd| cwd.join(path))
    };

    let mut cleaned = PathBuf::new();
    for component in absolute.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                cleaned.pop();
            }
            other => cleaned.push(other.as_os_str()),
        }
    }
    cleaned
}

/// Path of `path` relative to `base`, if `path` lies inside `base`.
pub fn relative_to(path: &Path, base: &Path) -> Option<PathBuf> {
    path.strip_prefix(base).ok().map(Path::to_path_buf)
}

/// Whether a contents entry is a glob pattern rather than a plain path.
#[inline]
pub fn has_glob_magic(item: &str) -> bool {
    item.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_absolute() {
        let normalized = normalize_path(Path::new("/absolute/./path/../file.txt"));
        assert_eq!(normalized, PathBuf::from("/absolute/file.txt"));
    }

    #[test]
    fn test_normalize_path_relative() {
        let normalized = normalize_path(Path::new("relative/path/file.txt"));
        assert!(normalized.is_absolute());
        assert!(normalized.ends_with("relative/path/file.txt"));
    }

    #[test]
    fn test_relative_to() {
        let rel = relative_to(Path::new("/site/static/a.js"), Path::new("/site"));
        assert_eq!(rel, Some(PathBuf::from("static/a.js")));
        assert_eq!(relative_to(Path::new("/other/a.js"), Path::new("/site")), None);
    }

    #[test]
    fn test_has_glob_magic() {
        assert!(has_glob_magic("js/*.js"));
        assert!(has_glob_magic("file?.css"));
        assert!(has_glob_magic("[ab].css"));
        assert!(!has_glob_magic("js/app.js"));
    }
}
