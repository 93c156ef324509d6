//! Path and URL utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `relative_to`)
//! - [`url`]: URL utilities (`is_url`, `url_prefix_join`, `to_url_path`)

pub mod fs;
pub mod url;

pub use fs::{has_glob_magic, normalize_path, relative_to};
pub use url::{is_url, to_url_path, url_prefix_join};
