//! Configuration management for ovgen.
//!
//! Configuration lives in a TOML file in the user's config directory,
//! created with defaults on first run. Every value is validated before any
//! wave is decoded.

pub mod file;

pub use file::{config_path, OvgenConfig};
