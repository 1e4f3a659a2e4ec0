//! Video encoding through an ffmpeg subprocess.
//!
//! Frames are rasterized to RGB24 and streamed to ffmpeg's stdin as raw
//! video. The ffmpeg binary is looked up in the standard install locations
//! before falling back to a PATH search, so it is found even when ovgen runs
//! with a minimal PATH.

use super::{FrameCanvas, RenderConfig, Renderer};
use crate::pipeline::Frame;
use anyhow::{anyhow, Context, Result};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

/// Locates the ffmpeg binary on the system.
///
/// Checks in this order:
/// 1. macOS homebrew locations: `/opt/homebrew/bin/ffmpeg`, `/usr/local/bin/ffmpeg`
/// 2. Linux standard locations: `/usr/bin/ffmpeg`, `/usr/local/bin/ffmpeg`
/// 3. Windows standard locations: `C:\ffmpeg\bin\ffmpeg.exe`
/// 4. Falls back to PATH search via `which` or `where` command
pub fn find_ffmpeg() -> Result<PathBuf> {
    let candidates = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/opt/homebrew/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/usr/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "linux") {
        vec![
            PathBuf::from("/usr/bin/ffmpeg"),
            PathBuf::from("/usr/local/bin/ffmpeg"),
            PathBuf::from("/snap/bin/ffmpeg"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from("C:\\ffmpeg\\bin\\ffmpeg.exe"),
            PathBuf::from("C:\\Program Files\\ffmpeg\\bin\\ffmpeg.exe"),
        ]
    } else {
        vec![]
    };

    if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
        tracing::debug!("Found ffmpeg at: {}", path.display());
        return Ok(path);
    }

    let ffmpeg_path = find_in_path("ffmpeg")?;
    tracing::debug!("Found ffmpeg in PATH at: {}", ffmpeg_path.display());
    Ok(ffmpeg_path)
}

/// Searches for a binary in the system PATH.
fn find_in_path(binary_name: &str) -> Result<PathBuf> {
    let search_cmd = if cfg!(target_os = "windows") {
        "where"
    } else {
        "which"
    };

    let output = Command::new(search_cmd)
        .arg(binary_name)
        .output()
        .map_err(|e| anyhow!("Failed to search PATH for {binary_name}: {e}"))?;

    if output.status.success() {
        let path_str = String::from_utf8_lossy(&output.stdout);
        if let Some(first) = path_str.lines().next() {
            let path = PathBuf::from(first.trim());
            if !path.as_os_str().is_empty() {
                return Ok(path);
            }
        }
    }

    Err(anyhow!(
        "ffmpeg not found. Please install ffmpeg:\n\
         macOS: brew install ffmpeg\n\
         Linux: apt install ffmpeg (Debian/Ubuntu) or dnf install ffmpeg (Fedora)\n\
         Windows: Download from https://ffmpeg.org/download.html"
    ))
}

/// Builds the ffmpeg argument list for a raw RGB24 stream on stdin.
///
/// `video_format` is "codec [options]", e.g. "libx264 -preset fast -crf 18".
/// When `audio` is given it is muxed in as the soundtrack and the output is
/// cut to the shorter of the two streams.
pub fn ffmpeg_args(
    cfg: &RenderConfig,
    fps: u32,
    audio: Option<&Path>,
    output: &Path,
) -> Result<Vec<String>> {
    let mut format_parts = cfg.video_format.split_whitespace();
    let codec = format_parts
        .next()
        .ok_or_else(|| anyhow!("Invalid video format string: empty"))?;

    let mut args: Vec<String> = vec![
        "-loglevel".into(),
        "error".into(),
        "-y".into(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgb24".into(),
        "-s".into(),
        format!("{}x{}", cfg.width, cfg.height),
        "-r".into(),
        fps.to_string(),
        "-i".into(),
        "-".into(),
    ];

    if let Some(audio) = audio {
        args.push("-i".into());
        args.push(audio.display().to_string());
    }

    args.push("-c:v".into());
    args.push(codec.to_string());
    args.push("-pix_fmt".into());
    args.push("yuv420p".into());
    args.extend(format_parts.map(str::to_string));

    if audio.is_some() {
        args.push("-c:a".into());
        args.push("aac".into());
        args.push("-shortest".into());
    }

    args.push(output.display().to_string());
    Ok(args)
}

/// Streams rasterized frames into an ffmpeg encoder process.
pub struct FfmpegRenderer {
    canvas: FrameCanvas,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    output: PathBuf,
}

impl FfmpegRenderer {
    /// Spawns ffmpeg writing to `output`.
    ///
    /// # Errors
    /// - If the render config has invalid colours
    /// - If ffmpeg cannot be found or started
    pub fn spawn(
        cfg: &RenderConfig,
        fps: u32,
        audio: Option<&Path>,
        output: &Path,
    ) -> Result<Self> {
        let canvas = FrameCanvas::new(cfg)?;
        let ffmpeg_path = find_ffmpeg()?;
        let args = ffmpeg_args(cfg, fps, audio, output)?;
        tracing::debug!("Spawning {} {}", ffmpeg_path.display(), args.join(" "));

        let mut command = Command::new(&ffmpeg_path);
        command
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        // Keep Ctrl+C away from ffmpeg; cancellation closes stdin instead.
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command
            .spawn()
            .with_context(|| format!("Failed to start {}", ffmpeg_path.display()))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("ffmpeg stdin is not available"))?;

        Ok(Self {
            canvas,
            child: Some(child),
            stdin: Some(BufWriter::new(stdin)),
            output: output.to_path_buf(),
        })
    }
}

impl Renderer for FfmpegRenderer {
    fn render_frame(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| anyhow!("ffmpeg input already closed"))?;
        let pixels = self.canvas.draw(frame);
        stdin
            .write_all(pixels)
            .with_context(|| format!("ffmpeg stopped accepting frames at frame {}", frame.index))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut stdin) = self.stdin.take() {
            stdin.flush()?;
        }

        let Some(child) = self.child.take() else {
            return Ok(());
        };
        let output = child
            .wait_with_output()
            .context("Failed to wait for ffmpeg")?;

        if output.status.success() {
            let file_size = std::fs::metadata(&self.output)?.len();
            tracing::info!(
                "Video saved: {} ({} bytes)",
                self.output.display(),
                file_size
            );
            Ok(())
        } else {
            let error_msg = String::from_utf8_lossy(&output.stderr);
            tracing::error!("ffmpeg encoding failed: {}", error_msg);
            Err(anyhow!("Video encoding failed: {error_msg}"))
        }
    }
}

impl Drop for FfmpegRenderer {
    fn drop(&mut self) {
        // Closing stdin makes ffmpeg finalize whatever it has so far.
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}
