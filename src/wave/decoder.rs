//! WAV decoding and wave directory discovery.
//!
//! Integer PCM is normalized by its full-scale value, float PCM is taken as
//! is, and multi-channel files are folded to mono by averaging channels.

use super::source::Wave;
use crate::error::{ConfigError, DecodeError};
use hound::{SampleFormat, WavReader};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Per-wave decoding options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WaveConfig {
    /// Gain applied to every sample after normalization
    #[serde(default = "default_amplification")]
    pub amplification: f32,
}

fn default_amplification() -> f32 {
    1.0
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            amplification: default_amplification(),
        }
    }
}

impl WaveConfig {
    /// # Errors
    /// Returns `ConfigError::OutOfRange` for a non-finite amplification.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.amplification.is_finite() {
            return Err(ConfigError::out_of_range(
                "wave.amplification",
                self.amplification,
                "a finite number",
            ));
        }
        Ok(())
    }
}

impl Wave {
    /// Decodes a WAV file into a mono wave.
    ///
    /// # Errors
    /// - If the file cannot be opened or is not a WAV file
    /// - If the sample data is truncated
    /// - If the file holds no samples or declares a zero sample rate
    pub fn from_wav(path: &Path, cfg: &WaveConfig) -> Result<Self, DecodeError> {
        let reader = WavReader::open(path).map_err(|source| DecodeError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;
        let read_err = |source| DecodeError::Read {
            path: path.to_path_buf(),
            source,
        };

        let interleaved: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(read_err)?,
            SampleFormat::Int => {
                let full_scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / full_scale))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(read_err)?
            }
        };

        let samples: Vec<f32> = match channels {
            1 => interleaved,
            _ => interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect(),
        };
        let samples = if cfg.amplification == 1.0 {
            samples
        } else {
            samples.into_iter().map(|s| s * cfg.amplification).collect()
        };

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        tracing::debug!(
            "Decoded {}: {} samples at {}Hz ({} source channels, {} bits {:?})",
            path.display(),
            samples.len(),
            spec.sample_rate,
            channels,
            spec.bits_per_sample,
            spec.sample_format
        );

        Wave::from_samples(name, samples, spec.sample_rate)
    }
}

/// Lists the WAV files in `dir`, sorted by file name.
///
/// The extension match is case-insensitive. Subdirectories are not searched.
///
/// # Errors
/// - If the directory cannot be read
/// - If it contains no WAV files
pub fn discover_waves(dir: &Path) -> Result<Vec<PathBuf>, DecodeError> {
    let dir_err = |source| DecodeError::Directory {
        path: dir.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(dir_err)? {
        let path = entry.map_err(dir_err)?.path();
        let is_wav = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"));
        if is_wav && path.is_file() {
            paths.push(path);
        }
    }

    if paths.is_empty() {
        return Err(DecodeError::NoWaves(dir.to_path_buf()));
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    tracing::info!("Discovered {} waves in {}", paths.len(), dir.display());
    Ok(paths)
}
