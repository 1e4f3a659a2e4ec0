//! Structured logging for ovgen using the tracing crate.
//!
//! Logs go to a daily-rotated file under the XDG state directory so they
//! never interfere with the progress bar or the terminal preview. Only the
//! 7 most recent log files are kept.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing_appender::rolling;
use tracing_subscriber::prelude::*;

/// Base name of the log files; the appender adds a `.YYYY-MM-DD` suffix.
pub const LOG_FILE_NAME: &str = "ovgen.log";

const MAX_LOG_FILES: usize = 7;

/// Keeps the non-blocking writer alive for the program lifetime.
static APPENDER_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();

/// Initializes file logging.
///
/// Log level is controlled by `RUST_LOG` (defaults to "info").
///
/// # Errors
/// - If the log directory cannot be determined or created
/// - If logging was already initialized
pub fn init_logging() -> anyhow::Result<()> {
    let log_dir = log_dir()?;

    if let Err(e) = cleanup_old_logs(&log_dir) {
        eprintln!("Warning: Failed to cleanup old logs: {e}");
    }

    let file_appender = rolling::daily(&log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    APPENDER_GUARD
        .set(guard)
        .map_err(|_| anyhow::anyhow!("Logging already initialized"))?;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
                .with_ansi(false),
        )
        .init();

    tracing::debug!("Logging initialized. Log dir: {}", log_dir.display());
    Ok(())
}

/// Log directory: `$XDG_STATE_HOME/ovgen`, else `~/.local/state/ovgen`.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the directory cannot be created
pub fn log_dir() -> anyhow::Result<PathBuf> {
    let log_dir = if let Ok(xdg_state) = std::env::var("XDG_STATE_HOME") {
        PathBuf::from(xdg_state).join("ovgen")
    } else {
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine home directory"))?;
        home.join(".local/state/ovgen")
    };

    fs::create_dir_all(&log_dir)?;
    Ok(log_dir)
}

/// Rotated log files in `log_dir`, newest first.
pub fn log_files(log_dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let prefix = format!("{LOG_FILE_NAME}.");
    let mut files: Vec<_> = fs::read_dir(log_dir)?
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let file_name = path.file_name()?.to_string_lossy().to_string();
            // ovgen.log.YYYY-MM-DD
            if file_name.starts_with(&prefix) && file_name.matches('-').count() == 2 {
                let modified = fs::metadata(&path).ok()?.modified().ok()?;
                Some((path, modified, file_name))
            } else {
                None
            }
        })
        .collect();

    // Date suffixes sort lexically; mtime breaks ties.
    files.sort_by(|a, b| b.2.cmp(&a.2).then(b.1.cmp(&a.1)));
    Ok(files.into_iter().map(|(path, _, _)| path).collect())
}

/// Deletes all but the most recent log files.
fn cleanup_old_logs(log_dir: &Path) -> anyhow::Result<()> {
    for path in log_files(log_dir)?.iter().skip(MAX_LOG_FILES) {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to delete old log file {}: {}", path.display(), e);
        }
    }
    Ok(())
}
