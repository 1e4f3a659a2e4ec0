//! Decoded audio channels and bounds-safe sample access.
//!
//! A [`Wave`] holds one mono recording in memory and hands out fixed-length
//! windows around arbitrary sample indices. Decoding and directory discovery
//! live alongside it because they are the only way waves enter the program.

pub mod decoder;
pub mod source;

pub use decoder::{discover_waves, WaveConfig};
pub use source::Wave;
