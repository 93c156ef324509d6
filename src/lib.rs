//! assetpipe - a web asset build pipeline.
//!
//! Bundles group source files, remote URLs and other bundles; filters
//! transform them; the result is written to a versioned output file and
//! served under a public URL.
//!
//! ```text
//! Environment ── directory, url, debug, collaborators, registry
//!   ├── Resolver    contents entry -> files, file -> URL
//!   ├── Cache       per-step filter results
//!   ├── Versioner   hunk / output -> version string
//!   ├── Manifest    output template -> version, across processes
//!   ├── Updater     needs rebuild? (No / Yes / SkipCache)
//!   └── Bundle*     contents + filters + output + debug
//!         └── build() -> Hunk per leaf, urls() -> AssetUrl list
//! ```
//!
//! # Example
//!
//! ```no_run
//! use assetpipe::{BuildOptions, Bundle, EnvConfig, Environment};
//!
//! let env = Environment::new(EnvConfig {
//!     directory: Some("static".into()),
//!     url: Some("/static".into()),
//!     ..EnvConfig::default()
//! })?;
//! let js = Bundle::new(["js/a.js", "js/vendor/*.js"]).with_output("gen/app-%(version)s.js");
//! js.build(&env, BuildOptions::default())?;
//! for url in js.urls(&env, false)? {
//!     println!("{url}");
//! }
//! # Ok::<(), assetpipe::Error>(())
//! ```

pub mod logger;

pub mod bundle;
pub mod cache;
pub mod env;
pub mod error;
pub mod filter;
pub mod hunk;
pub mod loader;
pub mod manifest;
pub mod resolver;
pub mod updater;
pub mod utils;
pub mod version;

pub use bundle::{AssetUrl, BuildOptions, Bundle, Content, DebugLevel};
pub use env::{EnvConfig, Environment};
pub use error::{Error, ErrorKind, Result};
pub use filter::{Filter, FnFilter, Hook, MaxDebugLevel, SharedFilter};
pub use hunk::Hunk;
