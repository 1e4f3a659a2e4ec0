//! Configuration file management for ovgen.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory unless a path is given
//! on the command line.

use crate::error::ConfigError;
use crate::render::RenderConfig;
use crate::trigger::TriggerConfig;
use crate::wave::WaveConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OvgenConfig {
    /// Version of ovgen that last wrote the file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_version: Option<String>,
    /// Output frame rate
    #[serde(default = "default_fps")]
    pub fps: u32,
    /// Width of the visible window in milliseconds
    #[serde(default = "default_time_visible_ms")]
    pub time_visible_ms: f64,
    /// Trigger scan length as a multiple of the visible window
    #[serde(default = "default_scan_ratio")]
    pub scan_ratio: f64,
    /// Recording that sets the video length and becomes its audio track
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_wave: Option<PathBuf>,
    #[serde(default)]
    pub trigger: TriggerConfig,
    #[serde(default)]
    pub wave: WaveConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_fps() -> u32 {
    60
}

fn default_time_visible_ms() -> f64 {
    25.0
}

fn default_scan_ratio() -> f64 {
    1.0
}

impl Default for OvgenConfig {
    fn default() -> Self {
        Self {
            config_version: None,
            fps: default_fps(),
            time_visible_ms: default_time_visible_ms(),
            scan_ratio: default_scan_ratio(),
            master_wave: None,
            trigger: TriggerConfig::default(),
            wave: WaveConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

impl OvgenConfig {
    /// Loads and validates the configuration at `path`.
    ///
    /// # Errors
    /// - If the file cannot be read
    /// - If the TOML is malformed
    /// - If any value is out of range
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config = Self::parse(&content)?;
        tracing::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parses and validates a TOML document.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: OvgenConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks every value against its allowed range.
    ///
    /// # Errors
    /// Returns the first offending field as `ConfigError::OutOfRange`, or
    /// `ConfigError::InvalidColor` for an unparsable colour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps == 0 {
            return Err(ConfigError::out_of_range("fps", self.fps, "an integer > 0"));
        }
        if !self.time_visible_ms.is_finite() || self.time_visible_ms <= 0.0 {
            return Err(ConfigError::out_of_range(
                "time_visible_ms",
                self.time_visible_ms,
                "a number > 0",
            ));
        }
        if !self.scan_ratio.is_finite() || self.scan_ratio <= 0.0 {
            return Err(ConfigError::out_of_range(
                "scan_ratio",
                self.scan_ratio,
                "a number > 0",
            ));
        }
        self.trigger.validate()?;
        self.wave.validate()?;
        self.render.validate()?;
        Ok(())
    }

    /// Visible window width in seconds.
    pub fn time_visible_s(&self) -> f64 {
        self.time_visible_ms / 1000.0
    }
}

/// Retrieves the path to the default config file.
///
/// # Errors
/// - If the home directory cannot be determined
pub fn config_path() -> Result<PathBuf, std::io::Error> {
    let home_dir = dirs::home_dir().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "Could not find home directory",
        )
    })?;
    Ok(home_dir.join(".config").join("ovgen").join("ovgen.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let config = OvgenConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.time_visible_s(), 0.025);
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let config = OvgenConfig::parse("fps = 30\n[trigger]\nresponsiveness = 0.5\n").unwrap();
        assert_eq!(config.fps, 30);
        assert_eq!(config.trigger.responsiveness, 0.5);
        assert_eq!(config.trigger.trigger_strength, 10.0);
        assert!(config.trigger.use_edge_trigger);
        assert_eq!(config.render, RenderConfig::default());
        assert_eq!(config.master_wave, None);
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        for doc in [
            "fps = 0",
            "time_visible_ms = -5.0",
            "scan_ratio = 0.0",
            "[trigger]\nresponsiveness = 2.0",
            "[trigger]\nfalloff_width = -1.0",
            "[trigger]\ntrigger_strength = 0.0",
            "[render]\nwidth = 0\nheight = 720",
        ] {
            let err = OvgenConfig::parse(doc).unwrap_err();
            assert!(
                matches!(err, ConfigError::OutOfRange { .. }),
                "{doc}: {err}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        assert!(matches!(
            OvgenConfig::parse("fps = \"fast\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            OvgenConfig::load(&dir.path().join("absent.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
