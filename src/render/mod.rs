//! Frame renderers.
//!
//! The pipeline hands each [`Frame`] to a [`Renderer`]. Two renderers ship
//! with ovgen: [`FfmpegRenderer`] rasterizes frames and pipes them into an
//! ffmpeg encoder, [`TerminalRenderer`] plays them back live in the terminal.

pub mod ffmpeg;
pub mod raster;
pub mod terminal;

pub use ffmpeg::{find_ffmpeg, FfmpegRenderer};
pub use raster::FrameCanvas;
pub use terminal::TerminalRenderer;

use crate::error::ConfigError;
use crate::pipeline::Frame;
use serde::{Deserialize, Serialize};

/// Consumer of rendered frames, called strictly in frame order.
pub trait Renderer {
    /// Accepts the next frame.
    fn render_frame(&mut self, frame: &Frame) -> anyhow::Result<()>;

    /// Flushes output after the last frame.
    fn finish(&mut self) -> anyhow::Result<()>;
}

/// An RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    /// Parses `"#rrggbb"` (the leading `#` is optional).
    ///
    /// # Errors
    /// Returns `ConfigError::InvalidColor` for anything else.
    pub fn parse(hex: &str) -> Result<Self, ConfigError> {
        let digits = hex.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.is_ascii() {
            return Err(ConfigError::InvalidColor(hex.to_string()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| ConfigError::InvalidColor(hex.to_string()))
        };
        Ok(Rgb(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

/// Video output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Output width in pixels
    pub width: u32,
    /// Output height in pixels
    pub height: u32,
    /// Number of columns in the channel grid
    #[serde(default = "default_ncols")]
    pub ncols: u32,
    /// Background colour, "#rrggbb"
    #[serde(default = "default_background")]
    pub background: String,
    /// Waveform colour, "#rrggbb"
    #[serde(default = "default_line_color")]
    pub line_color: String,
    /// Colour of the centre and cell divider lines, "#rrggbb"
    #[serde(default = "default_grid_color")]
    pub grid_color: String,
    /// Output video format string: "codec [ffmpeg_options]"
    #[serde(default = "default_video_format")]
    pub video_format: String,
}

fn default_ncols() -> u32 {
    1
}

fn default_background() -> String {
    "#000000".to_string()
}

fn default_line_color() -> String {
    "#cee0dc".to_string()
}

fn default_grid_color() -> String {
    "#303838".to_string()
}

fn default_video_format() -> String {
    "libx264 -preset medium -crf 18".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            ncols: default_ncols(),
            background: default_background(),
            line_color: default_line_color(),
            grid_color: default_grid_color(),
            video_format: default_video_format(),
        }
    }
}

impl RenderConfig {
    /// Checks dimensions, grid and colours.
    ///
    /// # Errors
    /// - Zero or odd dimensions (most encoders need even sizes)
    /// - Zero columns
    /// - Unparsable colours or an empty video format
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.width % 2 != 0 {
            return Err(ConfigError::out_of_range(
                "render.width",
                self.width,
                "an even integer > 0",
            ));
        }
        if self.height == 0 || self.height % 2 != 0 {
            return Err(ConfigError::out_of_range(
                "render.height",
                self.height,
                "an even integer > 0",
            ));
        }
        if self.ncols == 0 {
            return Err(ConfigError::out_of_range(
                "render.ncols",
                self.ncols,
                "an integer > 0",
            ));
        }
        if self.video_format.split_whitespace().next().is_none() {
            return Err(ConfigError::out_of_range(
                "render.video_format",
                "\"\"",
                "\"codec [ffmpeg_options]\"",
            ));
        }
        self.palette()?;
        Ok(())
    }

    /// Parsed (background, line, grid) colours.
    pub fn palette(&self) -> Result<(Rgb, Rgb, Rgb), ConfigError> {
        Ok((
            Rgb::parse(&self.background)?,
            Rgb::parse(&self.line_color)?,
            Rgb::parse(&self.grid_color)?,
        ))
    }
}
