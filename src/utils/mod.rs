//! Utility modules shared by the build engine.

pub mod exec;
pub mod fs;
pub mod hash;
pub mod path;
