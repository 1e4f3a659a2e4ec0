//! Per-track binding of a wave to its trigger.

use crate::trigger::{scan_nsamp, CorrelationTrigger, NullTrigger, Trigger, TriggerConfig};
use crate::wave::Wave;
use std::sync::Arc;

/// One displayed track: a wave plus the trigger that stabilizes it.
///
/// Created once during setup and kept for the whole render. Only the
/// trigger's internal state changes between frames.
pub struct Channel {
    wave: Arc<Wave>,
    trigger: Box<dyn Trigger + Send>,
}

impl Channel {
    /// Binds `wave` to a fresh correlation trigger.
    ///
    /// The scan length is `round(time_visible_s * scan_ratio * sample_rate)`.
    pub fn new(
        wave: Arc<Wave>,
        cfg: TriggerConfig,
        time_visible_s: f64,
        scan_ratio: f64,
    ) -> Self {
        let nsamp = scan_nsamp(time_visible_s, scan_ratio, wave.sample_rate());
        tracing::debug!(
            "Channel '{}': {}Hz, scan_nsamp={}",
            wave.name(),
            wave.sample_rate(),
            nsamp
        );
        let trigger = CorrelationTrigger::new(cfg, Arc::clone(&wave), nsamp);
        Self::with_trigger(wave, Box::new(trigger))
    }

    /// Binds `wave` to a pass-through trigger (no stabilization).
    pub fn untriggered(wave: Arc<Wave>) -> Self {
        Self::with_trigger(wave, Box::new(NullTrigger))
    }

    pub fn with_trigger(wave: Arc<Wave>, trigger: Box<dyn Trigger + Send>) -> Self {
        Self { wave, trigger }
    }

    /// Returns the trigger-corrected display window for a frame at `time_s`.
    pub fn frame_window(&mut self, time_s: f64, length: usize) -> Vec<f32> {
        let hint = self.wave.index_at(time_s);
        let center = self.trigger.locate(hint);
        self.wave.window(center, length)
    }

    pub fn sample_rate(&self) -> u32 {
        self.wave.sample_rate()
    }

    pub fn label(&self) -> &str {
        self.wave.name()
    }
}
