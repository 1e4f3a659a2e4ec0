//! Oscilloscope video generation with correlation triggering.
//!
//! Each WAV recording becomes a [`channel::Channel`]: a decoded
//! [`wave::Wave`] paired with a [`trigger::Trigger`] that picks, frame by
//! frame, the sample the display window is centred on. The
//! [`pipeline::FramePipeline`] walks the frames in order and hands each
//! set of windows to a [`render::Renderer`].

pub mod app;
pub mod channel;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod render;
pub mod setup;
pub mod trigger;
pub mod wave;

pub use error::{ConfigError, DecodeError};
