//! Frame loop driving channels and forwarding windows to a renderer.
//!
//! Frames are produced strictly in order. Within one frame the channels are
//! independent; across frames each channel is sequential because its trigger
//! adapts as it goes. [`FramePipeline::run`] walks channels one after another,
//! [`FramePipeline::run_concurrent`] gives each channel its own blocking task
//! and joins their windows per frame.

use crate::channel::Channel;
use crate::render::Renderer;
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Frames buffered per channel ahead of the renderer.
const CHANNEL_LOOKAHEAD: usize = 8;

/// One output frame: a display window per channel, in channel order.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub index: usize,
    pub time_s: f64,
    pub windows: Vec<Vec<f32>>,
}

/// Summary of a finished (or cancelled) run.
#[derive(Debug, Clone, Copy)]
pub struct RenderStats {
    pub frames: usize,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RenderStats {
    /// Frames produced per wall-clock second.
    pub fn render_fps(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }
}

/// Frame timing for one render.
#[derive(Debug, Clone, Copy)]
pub struct FramePipeline {
    fps: u32,
    time_visible_s: f64,
    nframes: usize,
}

impl FramePipeline {
    /// Plans a render whose length is `duration_samples` at `sample_rate`.
    ///
    /// The frame count is `ceil(fps * duration_samples / sample_rate)`.
    pub fn new(fps: u32, time_visible_s: f64, duration_samples: usize, sample_rate: u32) -> Self {
        let rate = sample_rate.max(1) as u128;
        let nframes = (fps as u128 * duration_samples as u128).div_ceil(rate) as usize;
        Self {
            fps,
            time_visible_s,
            nframes,
        }
    }

    pub fn nframes(&self) -> usize {
        self.nframes
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Timestamp of frame `index` in seconds.
    pub fn frame_time(&self, index: usize) -> f64 {
        index as f64 / self.fps.max(1) as f64
    }

    /// Window length in samples for a channel at `sample_rate`.
    pub fn region_len(&self, sample_rate: u32) -> usize {
        (sample_rate as f64 * self.time_visible_s).round().max(0.0) as usize
    }

    fn frame_for(&self, index: usize, channels: &mut [Channel]) -> Frame {
        let time_s = self.frame_time(index);
        let windows = channels
            .iter_mut()
            .map(|channel| {
                let len = self.region_len(channel.sample_rate());
                channel.frame_window(time_s, len)
            })
            .collect();
        Frame {
            index,
            time_s,
            windows,
        }
    }

    /// Renders every frame, channel by channel, on the calling thread.
    ///
    /// Stops at the next frame boundary once `cancel` is set.
    ///
    /// # Errors
    /// - If the renderer fails to accept a frame or to finish
    pub fn run(
        &self,
        channels: &mut [Channel],
        renderer: &mut dyn Renderer,
        cancel: &AtomicBool,
    ) -> anyhow::Result<RenderStats> {
        let begin = Instant::now();
        let mut frames = 0;

        for index in 0..self.nframes {
            if cancel.load(Ordering::Relaxed) {
                return Ok(self.finish_cancelled(frames, begin));
            }
            let frame = self.frame_for(index, channels);
            renderer.render_frame(&frame)?;
            frames += 1;
            if index % 60 == 0 {
                tracing::debug!("Rendered frame {}/{}", index, self.nframes);
            }
        }

        renderer.finish()?;
        Ok(self.finish_complete(frames, begin))
    }

    /// Renders every frame with one blocking task per channel.
    ///
    /// Produces exactly the frames [`run`](Self::run) would. Channels are
    /// consumed because each one moves onto its own task. The renderer runs
    /// through `block_in_place`, so this needs the multi-threaded runtime.
    ///
    /// # Errors
    /// - If the renderer fails to accept a frame or to finish
    /// - If a channel task panics
    pub async fn run_concurrent(
        &self,
        channels: Vec<Channel>,
        renderer: &mut dyn Renderer,
        cancel: Arc<AtomicBool>,
    ) -> anyhow::Result<RenderStats> {
        let begin = Instant::now();
        let mut receivers = Vec::with_capacity(channels.len());
        let mut tasks = Vec::with_capacity(channels.len());

        for mut channel in channels {
            let (tx, rx) = mpsc::channel::<Vec<f32>>(CHANNEL_LOOKAHEAD);
            let pipeline = *self;
            let cancel = Arc::clone(&cancel);
            tasks.push(tokio::task::spawn_blocking(move || {
                let len = pipeline.region_len(channel.sample_rate());
                for index in 0..pipeline.nframes {
                    if cancel.load(Ordering::Relaxed) {
                        break;
                    }
                    let window = channel.frame_window(pipeline.frame_time(index), len);
                    if tx.blocking_send(window).is_err() {
                        break;
                    }
                }
            }));
            receivers.push(rx);
        }

        let mut frames = 0;
        let mut cancelled = false;
        'frames: for index in 0..self.nframes {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                break;
            }
            let mut windows = Vec::with_capacity(receivers.len());
            for rx in receivers.iter_mut() {
                match rx.recv().await {
                    Some(window) => windows.push(window),
                    None => {
                        cancelled = true;
                        break 'frames;
                    }
                }
            }
            let frame = Frame {
                index,
                time_s: self.frame_time(index),
                windows,
            };
            // renderers write to pipes and sleep
            tokio::task::block_in_place(|| renderer.render_frame(&frame))?;
            frames += 1;
        }

        // unblock producers still waiting on a full channel
        drop(receivers);
        for task in tasks {
            task.await
                .map_err(|e| anyhow!("Channel task failed: {e}"))?;
        }

        if cancelled {
            return Ok(self.finish_cancelled(frames, begin));
        }
        tokio::task::block_in_place(|| renderer.finish())?;
        Ok(self.finish_complete(frames, begin))
    }

    fn finish_complete(&self, frames: usize, begin: Instant) -> RenderStats {
        let stats = RenderStats {
            frames,
            cancelled: false,
            elapsed: begin.elapsed(),
        };
        tracing::info!(
            "Rendered {} frames in {:.2}s ({:.1} fps)",
            stats.frames,
            stats.elapsed.as_secs_f64(),
            stats.render_fps()
        );
        stats
    }

    fn finish_cancelled(&self, frames: usize, begin: Instant) -> RenderStats {
        tracing::warn!("Render cancelled after {} of {} frames", frames, self.nframes);
        RenderStats {
            frames,
            cancelled: true,
            elapsed: begin.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::TriggerConfig;
    use crate::wave::Wave;

    /// Keeps every frame it is handed.
    #[derive(Default)]
    struct Collect {
        frames: Vec<Frame>,
        finished: bool,
    }

    impl Renderer for Collect {
        fn render_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            self.finished = true;
            Ok(())
        }
    }

    fn sine_wave(name: &str, freq: f64, secs: f64, rate: u32) -> Arc<Wave> {
        let len = (rate as f64 * secs).round() as usize;
        let samples = (0..len)
            .map(|i| (2.0 * std::f64::consts::PI * freq * i as f64 / rate as f64).sin() as f32)
            .collect();
        Arc::new(Wave::from_samples(name, samples, rate).unwrap())
    }

    fn channels(cfg: TriggerConfig) -> Vec<Channel> {
        vec![
            Channel::new(sine_wave("a", 440.0, 1.0, 44_100), cfg, 0.025, 1.0),
            Channel::new(sine_wave("b", 110.0, 0.5, 44_100), cfg, 0.025, 1.0),
        ]
    }

    #[test]
    fn frame_count_is_ceiling_of_duration() {
        assert_eq!(FramePipeline::new(60, 0.025, 44_100, 44_100).nframes(), 60);
        assert_eq!(FramePipeline::new(60, 0.025, 44_101, 44_100).nframes(), 61);
        assert_eq!(FramePipeline::new(30, 0.025, 22_050, 44_100).nframes(), 15);
        assert_eq!(FramePipeline::new(60, 0.025, 1, 48_000).nframes(), 1);
    }

    #[test]
    fn end_to_end_sine_render() {
        let rate = 44_100;
        let period = rate as f64 / 440.0;
        let wave = sine_wave("a440", 440.0, 1.0, rate);
        let pipeline = FramePipeline::new(60, 0.025, wave.duration_samples(), rate);

        // record the trigger-corrected centres alongside the windows
        let cfg = TriggerConfig::default();
        let mut trigger = crate::trigger::CorrelationTrigger::new(
            cfg,
            Arc::clone(&wave),
            crate::trigger::scan_nsamp(0.025, 1.0, rate),
        );
        let centres: Vec<i64> = (0..60)
            .map(|f| crate::trigger::Trigger::locate(&mut trigger, wave.index_at(f as f64 / 60.0)))
            .collect();

        let mut channels = vec![Channel::new(Arc::clone(&wave), cfg, 0.025, 1.0)];
        let mut sink = Collect::default();
        let stats = pipeline
            .run(&mut channels, &mut sink, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(stats.frames, 60);
        assert!(!stats.cancelled);
        assert!(sink.finished);
        assert_eq!(sink.frames.len(), 60);
        for (f, frame) in sink.frames.iter().enumerate() {
            assert_eq!(frame.index, f);
            assert_eq!(frame.windows.len(), 1);
            assert_eq!(frame.windows[0].len(), 1103);
            assert_eq!(frame.windows[0], wave.window(centres[f], 1103));
        }

        // each step is the nominal 735-sample advance pulled onto the period grid
        for pair in centres[5..].windows(2) {
            let step = (pair[1] - pair[0]) as f64;
            assert!((step - 735.0).abs() <= 551.0 * 2.0);
            let off_grid = (step.rem_euclid(period)).min(period - step.rem_euclid(period));
            assert!(off_grid <= 0.01 * period, "step {step} is {off_grid} off the period grid");
        }
    }

    #[test]
    fn frames_are_ordered_with_one_window_per_channel() {
        let mut channels = channels(TriggerConfig::default());
        let pipeline = FramePipeline::new(30, 0.025, 44_100, 44_100);
        let mut sink = Collect::default();
        pipeline
            .run(&mut channels, &mut sink, &AtomicBool::new(false))
            .unwrap();

        assert_eq!(sink.frames.len(), 30);
        for (f, frame) in sink.frames.iter().enumerate() {
            assert_eq!(frame.index, f);
            assert!((frame.time_s - f as f64 / 30.0).abs() < 1e-12);
            assert_eq!(frame.windows.len(), 2);
        }
        // the shorter channel runs out and is zero padded
        assert!(sink.frames[29].windows[1].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn cancelled_before_start_renders_nothing() {
        let mut channels = channels(TriggerConfig::default());
        let pipeline = FramePipeline::new(60, 0.025, 44_100, 44_100);
        let mut sink = Collect::default();
        let stats = pipeline
            .run(&mut channels, &mut sink, &AtomicBool::new(true))
            .unwrap();

        assert_eq!(stats.frames, 0);
        assert!(stats.cancelled);
        assert!(sink.frames.is_empty());
        assert!(!sink.finished);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_run_matches_sequential_run() {
        let cfg = TriggerConfig::default();
        let pipeline = FramePipeline::new(60, 0.025, 44_100, 44_100);

        let mut sequential = Collect::default();
        pipeline
            .run(&mut channels(cfg), &mut sequential, &AtomicBool::new(false))
            .unwrap();

        let mut concurrent = Collect::default();
        let stats = pipeline
            .run_concurrent(
                channels(cfg),
                &mut concurrent,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(stats.frames, 60);
        assert!(concurrent.finished);
        assert_eq!(sequential.frames, concurrent.frames);
    }

    /// Sleeps on every frame like a paced or back-pressured renderer.
    struct Slow(Collect);

    impl Renderer for Slow {
        fn render_frame(&mut self, frame: &Frame) -> anyhow::Result<()> {
            std::thread::sleep(std::time::Duration::from_millis(2));
            self.0.render_frame(frame)
        }

        fn finish(&mut self) -> anyhow::Result<()> {
            std::thread::sleep(std::time::Duration::from_millis(10));
            self.0.finish()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 1)]
    async fn blocking_renderer_does_not_starve_the_runtime() {
        let pipeline = FramePipeline::new(30, 0.025, 22_050, 44_100);
        let ticker = tokio::spawn(async {
            let mut ticks = 0u32;
            for _ in 0..5 {
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                ticks += 1;
            }
            ticks
        });

        let mut slow = Slow(Collect::default());
        let stats = pipeline
            .run_concurrent(
                channels(TriggerConfig::default()),
                &mut slow,
                Arc::new(AtomicBool::new(false)),
            )
            .await
            .unwrap();

        assert_eq!(stats.frames, 15);
        assert!(slow.0.finished);
        assert_eq!(ticker.await.unwrap(), 5);
    }
}
