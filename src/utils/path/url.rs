//! URL processing utilities.
//!
//! Provides consistent URL handling across the codebase:
//! - Remote source detection (`is_url`)
//! - Joining a public prefix with a relative path
//! - Converting filesystem paths into URL paths

use std::path::Path;

/// Check if a contents entry is a remote URL rather than a filesystem path.
///
/// Only `http`, `https` and protocol-relative (`//host/...`) references
/// count; `C:\...` style paths do not.
///
/// # Examples
/// ```
/// use assetpipe::utils::path::is_url;
/// assert!(is_url("https://cdn.example.com/lib.js"));
/// assert!(is_url("//cdn.example.com/lib.js"));
/// assert!(!is_url("js/app.js"));
/// ```
#[inline]
pub fn is_url(item: &str) -> bool {
    if item.starts_with("//") {
        return true;
    }
    url::Url::parse(item).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// Join a URL prefix and a relative path with exactly one slash between them.
///
/// # Examples
/// ```
/// use assetpipe::utils::path::url_prefix_join;
/// assert_eq!(url_prefix_join("/static/", "/gen/a.js"), "/static/gen/a.js");
/// assert_eq!(url_prefix_join("", "a.js"), "/a.js");
/// ```
pub fn url_prefix_join(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Render a relative filesystem path with `/` separators.
pub fn to_url_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
