//! Video rendering.
//!
//! Decodes the waves, then streams triggered frames through ffmpeg while a
//! progress bar tracks the frame count. Ctrl+C stops at the next frame
//! boundary and leaves a shorter but playable video.

use super::session::{Session, SessionArgs};
use crate::pipeline::{Frame, RenderStats};
use crate::render::{FfmpegRenderer, Renderer};
use cliclack::{intro, log, outro, outro_cancel, progress_bar, ProgressBar};
use console::style;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Advances a progress bar as frames pass through to the encoder.
struct ProgressRenderer<'a> {
    inner: &'a mut dyn Renderer,
    bar: &'a ProgressBar,
}

impl Renderer for ProgressRenderer<'_> {
    fn render_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
        self.inner.render_frame(frame)?;
        self.bar.inc(1);
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        self.bar.set_message("Finalizing video");
        self.inner.finish()
    }
}

/// Renders `args.wave_dir` to a video file.
///
/// # Errors
/// - If the config is invalid or any wave fails to decode
/// - If ffmpeg cannot be started or fails to encode
pub async fn handle_render(args: SessionArgs, output: Option<PathBuf>) -> anyhow::Result<()> {
    tracing::info!("=== ovgen render started ===");

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || handler_flag.store(true, Ordering::SeqCst))
        .map_err(|e| anyhow::anyhow!("Failed to set Ctrl-C handler: {e}"))?;

    intro(style(" render ").on_white().black())?;

    let session = Session::prepare(&args).map_err(|e| {
        tracing::error!("Setup failed: {e:#}");
        e
    })?;
    let output = output.unwrap_or_else(|| default_output(&args.wave_dir));

    log::info(format!(
        "{} channel(s), {} frames at {} fps -> {}",
        session.channels.len(),
        session.pipeline.nframes(),
        session.pipeline.fps(),
        output.display()
    ))?;

    let Session {
        config,
        mut channels,
        pipeline,
        master_audio,
    } = session;

    let mut encoder = FfmpegRenderer::spawn(
        &config.render,
        pipeline.fps(),
        master_audio.as_deref(),
        &output,
    )
    .map_err(|e| {
        tracing::error!("Failed to start encoder: {e:#}");
        e
    })?;

    let bar = progress_bar(pipeline.nframes() as u64);
    bar.start("Rendering frames");

    let mut progress = ProgressRenderer {
        inner: &mut encoder,
        bar: &bar,
    };
    let result = if args.sequential {
        tokio::task::block_in_place(|| pipeline.run(&mut channels, &mut progress, &cancel))
    } else {
        pipeline
            .run_concurrent(channels, &mut progress, Arc::clone(&cancel))
            .await
    };

    let stats = match result {
        Ok(stats) => stats,
        Err(e) => {
            tracing::error!("Render failed: {e:#}");
            bar.error(format!("{e}"));
            return Err(e);
        }
    };

    report(&bar, &stats, &output)
}

fn report(bar: &ProgressBar, stats: &RenderStats, output: &Path) -> anyhow::Result<()> {
    if stats.cancelled {
        bar.cancel(format!("Cancelled at frame {}", stats.frames));
        outro_cancel(format!(
            "Cancelled after {} frames, partial video at {}",
            stats.frames,
            output.display()
        ))?;
    } else {
        bar.stop(format!(
            "Rendered {} frames in {:.1}s ({:.1} fps)",
            stats.frames,
            stats.elapsed.as_secs_f64(),
            stats.render_fps()
        ));
        outro(format!("Saved {}", output.display()))?;
    }
    Ok(())
}

/// `<wave dir name>.mp4` in the current directory.
fn default_output(wave_dir: &Path) -> PathBuf {
    let stem = wave_dir
        .canonicalize()
        .ok()
        .and_then(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .unwrap_or_else(|| "ovgen".to_string());
    PathBuf::from(format!("{stem}.mp4"))
}
