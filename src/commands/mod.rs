//! Application command handlers for ovgen.
//!
//! # Commands
//! - `render`: Encode a triggered oscilloscope video through ffmpeg
//! - `preview`: Play the triggered channels back in the terminal
//! - `probe`: List the waves a render would use
//! - `config`: Open configuration file in user's preferred editor
//! - `logs`: Display recent log entries

pub mod config;
pub mod logs;
pub mod preview;
pub mod probe;
pub mod render;
pub mod session;

pub use config::handle_config;
pub use logs::handle_logs;
pub use preview::handle_preview;
pub use probe::handle_probe;
pub use render::handle_render;
pub use session::SessionArgs;
