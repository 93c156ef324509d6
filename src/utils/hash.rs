//! Hashing utilities.
//!
//! - `fingerprint`: short FxHash-based tag for readable file names
//! - `digest_hex`: blake3 content digest, used wherever the result is persisted
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash;
//!
//! let fp = hash::fingerprint("/abs/path/lib.css"); // -> "a1b2c3d4"
//! let d = hash::digest_hex(b"body {}");            // -> 64 hex chars
//! ```

use rustc_hash::FxHasher;
use std::hash::Hasher;

/// Compute 64-bit hash from byte data.
#[inline]
pub fn compute<T: AsRef<[u8]> + ?Sized>(data: &T) -> u64 {
    let mut hasher = FxHasher::default();
    hasher.write(data.as_ref());
    hasher.finish()
}

/// Compute hash and return as 8-char hex fingerprint.
#[inline]
pub fn fingerprint<T: AsRef<[u8]> + ?Sized>(value: &T) -> String {
    format!("{:016x}", compute(value))[..8].to_string()
}

/// Full blake3 digest of `data` as lowercase hex.
#[inline]
pub fn digest_hex<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    blake3::hash(data.as_ref()).to_hex().to_string()
}
