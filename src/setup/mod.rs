//! Setup module for initial application configuration.
//!
//! Writes the default config file on first run and keeps its version stamp
//! current across upgrades.

pub mod version;

use std::path::Path;

/// Embedded default configuration template.
const DEFAULT_CONFIG: &str = include_str!("../../environments/ovgen.toml");

/// Current application version from Cargo.toml
const CURRENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Writes the default config to `config_path`, stamped with the current version.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn run_setup(config_path: &Path) -> anyhow::Result<()> {
    if let Some(config_dir) = config_path.parent() {
        std::fs::create_dir_all(config_dir)?;
    }

    let config_with_version = format!(r#"config_version = "{}""#, CURRENT_VERSION);
    let full_config = format!("{}\n{}", config_with_version, DEFAULT_CONFIG);
    std::fs::write(config_path, full_config)?;

    tracing::info!("Wrote default configuration to {}", config_path.display());
    Ok(())
}

/// Makes sure a usable config exists at `config_path`.
///
/// A missing file gets the defaults. An existing file from an older version
/// keeps its values and only has its version stamp refreshed.
///
/// # Errors
/// Returns an error if the file cannot be read or written.
pub fn ensure_config(config_path: &Path) -> anyhow::Result<()> {
    if !config_path.exists() {
        return run_setup(config_path);
    }

    if let Some(previous) = version::check_setup_needed(config_path)? {
        tracing::info!(
            "Migrating config from version {} to {}",
            previous,
            CURRENT_VERSION
        );
        version::update_config_version(config_path)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OvgenConfig;

    #[test]
    fn default_config_is_written_and_valid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ovgen").join("ovgen.toml");

        ensure_config(&path).unwrap();

        let config = OvgenConfig::load(&path).unwrap();
        assert_eq!(config.config_version.as_deref(), Some(CURRENT_VERSION));
        assert_eq!(
            OvgenConfig {
                config_version: None,
                ..config
            },
            OvgenConfig::default()
        );
    }

    #[test]
    fn legacy_config_keeps_values_and_gains_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ovgen.toml");
        std::fs::write(&path, "fps = 24\n").unwrap();

        ensure_config(&path).unwrap();

        let config = OvgenConfig::load(&path).unwrap();
        assert_eq!(config.fps, 24);
        assert_eq!(config.config_version.as_deref(), Some(CURRENT_VERSION));
    }
}
