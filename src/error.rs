//! Error types for setup-time failures.
//!
//! Everything here is raised before the first frame is produced. The frame
//! loop itself absorbs numeric edge cases locally and never returns these.

use std::path::PathBuf;
use thiserror::Error;

/// A recording could not be turned into a sample sequence.
#[derive(Error, Debug)]
pub enum DecodeError {
    /// The file could not be opened or its header is not a valid WAV header
    #[error("Failed to open '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The sample data is truncated or malformed
    #[error("Failed to read samples from '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: hound::Error,
    },

    /// The recording contains no samples
    #[error("Recording '{0}' contains no samples")]
    Empty(String),

    /// The recording declares a sample rate of zero
    #[error("Recording '{0}' has an invalid sample rate")]
    InvalidSampleRate(String),

    /// A wave directory holds no WAV files
    #[error("No .wav files found in '{}'", .0.display())]
    NoWaves(PathBuf),

    /// A wave directory could not be listed
    #[error("Failed to read directory '{}': {source}", .path.display())]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// An out-of-range or unparsable configuration value.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for '{field}': {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("Invalid color '{0}' (expected \"#rrggbb\")")]
    InvalidColor(String),

    #[error("Malformed config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to access config file: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    pub(crate) fn out_of_range(
        field: &'static str,
        value: impl ToString,
        expected: &'static str,
    ) -> Self {
        ConfigError::OutOfRange {
            field,
            value: value.to_string(),
            expected,
        }
    }
}
