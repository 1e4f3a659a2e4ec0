//! Live terminal preview.
//!
//! Plays the triggered channels back in the terminal at the configured fps
//! without encoding anything. Useful for tuning trigger settings before a
//! full render.

use super::session::{Session, SessionArgs};
use crate::render::TerminalRenderer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Plays `args.wave_dir` in the terminal until it ends or the user quits.
///
/// # Errors
/// - If the config is invalid or any wave fails to decode
/// - If the terminal cannot be initialized
pub async fn handle_preview(args: SessionArgs) -> anyhow::Result<()> {
    tracing::info!("=== ovgen preview started ===");

    let session = Session::prepare(&args).map_err(|e| {
        tracing::error!("Setup failed: {e:#}");
        e
    })?;

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .map_err(|e| anyhow::anyhow!("Failed to set Ctrl-C handler: {e}"))?;

    let labels = session.labels();
    let Session {
        config,
        mut channels,
        pipeline,
        ..
    } = session;

    let mut terminal = TerminalRenderer::new(
        &config.render,
        labels,
        pipeline.fps(),
        pipeline.nframes(),
        Arc::clone(&cancel),
    )?;

    let result = if args.sequential {
        tokio::task::block_in_place(|| pipeline.run(&mut channels, &mut terminal, &cancel))
    } else {
        pipeline
            .run_concurrent(channels, &mut terminal, Arc::clone(&cancel))
            .await
    };
    terminal.cleanup()?;

    let stats = result.map_err(|e| {
        tracing::error!("Preview failed: {e:#}");
        e
    })?;

    if stats.cancelled {
        println!("Preview stopped after {} of {} frames", stats.frames, pipeline.nframes());
    } else {
        println!("Played {} frames", stats.frames);
    }
    Ok(())
}
