//! Configuration file editor command.
//!
//! Opens the ovgen configuration file in the user's preferred editor and
//! checks the edited file, so mistakes surface now rather than at the next
//! render.

use crate::config::{self, OvgenConfig};
use std::path::Path;
use std::process::Command;

/// Opens the ovgen configuration file in the user's preferred editor.
///
/// Writes the default config first if none exists.
///
/// # Errors
/// - If the default config cannot be written
/// - If no editor can be found or executed
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = config::config_path()?;
    crate::setup::ensure_config(&config_path)?;

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor)
        .arg(&config_path)
        .status()
        .map_err(|e| {
            anyhow::anyhow!(
                "Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible."
            )
        })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    tracing::info!("Config file edited successfully");
    report_validity(&config_path);
    Ok(())
}

/// Tells the user whether the edited file still loads.
fn report_validity(config_path: &Path) {
    match OvgenConfig::load(config_path) {
        Ok(_) => println!("Configuration OK: {}", config_path.display()),
        Err(e) => {
            tracing::warn!("Edited config does not validate: {e}");
            eprintln!("Warning: {}: {e}", config_path.display());
        }
    }
}

/// Finds the best available editor to use.
///
/// Tries in order: $VISUAL, $EDITOR, nano, vi
fn find_editor() -> anyhow::Result<String> {
    for var in ["VISUAL", "EDITOR"] {
        if let Ok(editor) = std::env::var(var) {
            if !editor.trim().is_empty() {
                return Ok(editor);
            }
        }
    }

    for editor in &["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!(
        "No editor found. Please set the $EDITOR environment variable."
    ))
}

/// Checks if an editor is available in the system PATH.
fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}
