//! Shared setup for the render and preview commands.
//!
//! Everything that can fail before the first frame happens here: loading
//! and validating the config, applying command-line overrides, decoding
//! every wave and planning the frame count.

use crate::channel::Channel;
use crate::config::{self, OvgenConfig};
use crate::pipeline::FramePipeline;
use crate::wave::{discover_waves, Wave};
use anyhow::Context;
use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Options shared by `render` and `preview`.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Directory of .wav files, one channel per file in name order
    #[arg(value_name = "WAVE_DIR")]
    pub wave_dir: PathBuf,

    /// Config file to use instead of ~/.config/ovgen/ovgen.toml
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output frame rate (overrides the config file)
    #[arg(long)]
    pub fps: Option<u32>,

    /// Recording that sets the video length and soundtrack
    #[arg(short, long, value_name = "FILE")]
    pub master_wave: Option<PathBuf>,

    /// Disable the correlation trigger and show raw time positions
    #[arg(long)]
    pub no_trigger: bool,

    /// Compute channels one after another on a single thread
    #[arg(long)]
    pub sequential: bool,
}

impl SessionArgs {
    /// Applies command-line values over `config` and revalidates it.
    pub fn apply_overrides(&self, config: &mut OvgenConfig) -> anyhow::Result<()> {
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(master) = &self.master_wave {
            config.master_wave = Some(master.clone());
        }
        config.validate()?;
        Ok(())
    }
}

/// A fully prepared render: validated config, decoded channels and plan.
pub struct Session {
    pub config: OvgenConfig,
    pub channels: Vec<Channel>,
    pub pipeline: FramePipeline,
    /// Audio to mux into the video, when a master wave is configured
    pub master_audio: Option<PathBuf>,
}

impl Session {
    /// Loads config and waves for `args`.
    ///
    /// # Errors
    /// - If the config cannot be loaded or a value is out of range
    /// - If the directory holds no WAV files or any of them fails to decode
    pub fn prepare(args: &SessionArgs) -> anyhow::Result<Self> {
        let config = load_config(args)?;
        Self::from_config(config, args)
    }

    /// Builds a session from an already loaded config.
    pub fn from_config(mut config: OvgenConfig, args: &SessionArgs) -> anyhow::Result<Self> {
        args.apply_overrides(&mut config)?;

        let paths = discover_waves(&args.wave_dir)?;
        let mut waves = Vec::with_capacity(paths.len());
        for path in &paths {
            let wave = Wave::from_wav(path, &config.wave)?;
            tracing::info!(
                "Loaded '{}': {}Hz, {:.2}s",
                wave.name(),
                wave.sample_rate(),
                wave.duration_secs()
            );
            waves.push(Arc::new(wave));
        }

        let master = match &config.master_wave {
            Some(path) => Some(Wave::from_wav(path, &config.wave)?),
            None => None,
        };
        let (duration_samples, sample_rate) = match (&master, waves.first()) {
            (Some(m), _) => (m.duration_samples(), m.sample_rate()),
            (None, Some(first)) => (first.duration_samples(), first.sample_rate()),
            (None, None) => (0, 1),
        };

        let time_visible_s = config.time_visible_s();
        let pipeline = FramePipeline::new(config.fps, time_visible_s, duration_samples, sample_rate);

        let channels = waves
            .into_iter()
            .map(|wave| {
                if args.no_trigger {
                    Channel::untriggered(wave)
                } else {
                    Channel::new(wave, config.trigger, time_visible_s, config.scan_ratio)
                }
            })
            .collect();

        tracing::info!(
            "Prepared {} channel(s), {} frames at {} fps",
            paths.len(),
            pipeline.nframes(),
            config.fps
        );

        Ok(Self {
            master_audio: config.master_wave.clone(),
            config,
            channels,
            pipeline,
        })
    }

    pub fn labels(&self) -> Vec<String> {
        self.channels.iter().map(|c| c.label().to_string()).collect()
    }
}

/// Loads the config named on the command line, or the default one.
pub fn load_config(args: &SessionArgs) -> anyhow::Result<OvgenConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config::config_path()?,
    };
    load_config_from(&path)
}

fn load_config_from(path: &Path) -> anyhow::Result<OvgenConfig> {
    OvgenConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
}
