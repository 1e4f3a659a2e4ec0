//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands::{self, SessionArgs};
use crate::{config, logging, setup};
use anyhow::anyhow;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;

/// Writes the default config on first run and refreshes stale version stamps.
///
/// Only the default config location is managed. Files passed with
/// `--config` are used as they are.
fn check_and_run_setup() -> anyhow::Result<()> {
    let config_path = config::config_path()?;
    setup::ensure_config(&config_path).map_err(|e| {
        tracing::error!("Setup failed: {e}");
        anyhow!("Setup failed: {e}")
    })?;
    tracing::debug!(
        "Config ready at {} ({})",
        config_path.display(),
        env!("CARGO_PKG_VERSION")
    );
    Ok(())
}

/// Renders stabilized oscilloscope videos from WAV recordings
#[derive(Parser)]
#[command(name = "ovgen")]
#[command(version)]
#[command(about = "Renders stabilized oscilloscope videos from WAV recordings")]
#[command(long_about = "Renders stabilized oscilloscope videos from WAV recordings.\n\nEvery .wav file in a directory becomes one channel. A correlation trigger\nkeeps periodic waveforms stationary from frame to frame, and frames are\nencoded with ffmpeg.\n\nEXAMPLES:\n    # Render a directory of stems to stems.mp4\n    $ ovgen render stems/\n    \n    # Use a mixdown as soundtrack and length reference\n    $ ovgen render stems/ -m mix.wav -o video.mp4\n    \n    # Try trigger settings live in the terminal\n    $ ovgen preview stems/\n    \n    # Inspect sample rates and durations\n    $ ovgen probe stems/\n    \n    # Edit configuration file\n    $ ovgen config")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/ovgen/ovgen.toml\n    Logs:               ~/.local/state/ovgen/ovgen.log.*"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a video file
    ///
    /// Press Ctrl+C to stop early; the frames rendered so far are kept.
    #[command(visible_alias = "r")]
    Render {
        #[command(flatten)]
        session: SessionArgs,

        /// Output video file (defaults to <WAVE_DIR name>.mp4)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Play the channels back in the terminal
    ///
    /// Press q or Escape to stop.
    #[command(visible_alias = "p")]
    Preview {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// List the waves in a directory with their rates and durations
    Probe {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $VISUAL or $EDITOR, falling back to nano or vi.
    #[command(visible_alias = "c")]
    Config,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   ovgen completions bash > ovgen.bash
    ///   ovgen completions zsh > _ovgen
    ///   ovgen completions fish > ovgen.fish
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Exit Codes
/// - 0: Success
/// - 1: General error
/// - 2: Usage error (invalid arguments)
///
/// # Errors
/// - If setup fails
/// - If logging initialization fails
/// - If command execution fails
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't need logging or config setup
    match &cli.command {
        Commands::Completions { shell } => {
            generate(*shell, &mut Cli::command(), "ovgen", &mut io::stdout());
            return Ok(());
        }
        Commands::Logs => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;

    let uses_default_config = match &cli.command {
        Commands::Render { session, .. }
        | Commands::Preview { session }
        | Commands::Probe { session } => session.config.is_none(),
        _ => true,
    };
    if uses_default_config {
        check_and_run_setup()?;
    }

    match cli.command {
        Commands::Render { session, output } => {
            commands::handle_render(session, output).await?;
        }
        Commands::Preview { session } => {
            commands::handle_preview(session).await?;
        }
        Commands::Probe { session } => {
            commands::handle_probe(session)?;
        }
        Commands::Config => {
            commands::handle_config()?;
        }
        Commands::Completions { .. } | Commands::Logs => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}
