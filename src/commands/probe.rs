//! Inspect a wave directory without rendering.

use super::session::{load_config, SessionArgs};
use crate::pipeline::FramePipeline;
use crate::trigger::scan_nsamp;
use crate::wave::{discover_waves, Wave};
use console::style;

/// Lists the channels a render of `args.wave_dir` would show.
///
/// Prints each wave's sample rate, duration, peak level and trigger scan
/// length, followed by the planned frame count.
///
/// # Errors
/// - If the config is invalid
/// - If the directory holds no WAV files or one fails to decode
pub fn handle_probe(args: SessionArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args)?;
    args.apply_overrides(&mut config)?;

    let paths = discover_waves(&args.wave_dir)?;
    let time_visible_s = config.time_visible_s();

    println!();
    println!("{}", style(format!(" {} ", args.wave_dir.display())).on_white().black());
    println!();

    let mut first: Option<(usize, u32)> = None;
    for (i, path) in paths.iter().enumerate() {
        let wave = Wave::from_wav(path, &config.wave)?;
        let rate = wave.sample_rate();
        first.get_or_insert((wave.duration_samples(), rate));

        let peak = wave.peak();
        let peak_text = format!("peak {peak:.2}");
        let peak_styled = if peak >= 1.0 {
            style(peak_text).red()
        } else if peak < 0.01 {
            style(peak_text).yellow()
        } else {
            style(peak_text).dim()
        };
        let scan = if args.no_trigger {
            "untriggered".to_string()
        } else {
            format!("scan {}", scan_nsamp(time_visible_s, config.scan_ratio, rate))
        };

        println!(
            "  {:>2}  {:<24} {:>6} Hz  {:>8.2}s  {}  {}",
            style(i + 1).cyan(),
            style(wave.name()).bold(),
            rate,
            wave.duration_secs(),
            peak_styled,
            style(scan).dim()
        );
    }

    let (duration_samples, rate, source) = match &config.master_wave {
        Some(path) => {
            let master = Wave::from_wav(path, &config.wave)?;
            (
                master.duration_samples(),
                master.sample_rate(),
                format!("master {}", path.display()),
            )
        }
        None => {
            let (samples, rate) = first.unwrap_or((0, 1));
            (samples, rate, "first channel".to_string())
        }
    };
    let pipeline = FramePipeline::new(config.fps, time_visible_s, duration_samples, rate);

    println!();
    println!(
        "  {} frames at {} fps ({}), {} ms visible",
        style(pipeline.nframes()).green().bold(),
        config.fps,
        source,
        config.time_visible_ms
    );
    println!();
    Ok(())
}
