//! Trigger algorithms that pick a stable alignment point per frame.
//!
//! A trigger receives the nominal sample index of a frame and returns the
//! index the display window should be centred on. Triggers are stateful and
//! must be called once per frame, in frame order.

pub mod correlation;
pub mod xcorr;

pub use correlation::CorrelationTrigger;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Picks the display alignment index for a frame.
pub trait Trigger {
    /// Returns the corrected alignment index near `hint`.
    ///
    /// Never fails: when no better point exists the hint is returned as is.
    fn locate(&mut self, hint: i64) -> i64;
}

/// Pass-through trigger used when stabilization is turned off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTrigger;

impl Trigger for NullTrigger {
    fn locate(&mut self, hint: i64) -> i64 {
        hint
    }
}

/// Correlation trigger tuning, shared read-only by every channel of a run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TriggerConfig {
    /// Exponent applied to the normalized correlation before it is weighed
    /// against distance from the hint. Higher values favour exact shape
    /// matches, lower values favour the smallest correction.
    pub trigger_strength: f32,
    /// Only align on rising zero crossings
    pub use_edge_trigger: bool,
    /// Blend rate of the reference buffer toward each newly selected window
    pub responsiveness: f32,
    /// Fraction of the window length tapered at each edge before blending
    pub falloff_width: f32,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            trigger_strength: 10.0,
            use_edge_trigger: true,
            responsiveness: 0.1,
            falloff_width: 0.5,
        }
    }
}

impl TriggerConfig {
    /// Checks every field against its allowed range.
    ///
    /// # Errors
    /// - `trigger_strength` not finite or not > 0
    /// - `responsiveness` or `falloff_width` outside [0, 1]
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.trigger_strength.is_finite() || self.trigger_strength <= 0.0 {
            return Err(ConfigError::out_of_range(
                "trigger.trigger_strength",
                self.trigger_strength,
                "a number > 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.responsiveness) {
            return Err(ConfigError::out_of_range(
                "trigger.responsiveness",
                self.responsiveness,
                "a number in [0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.falloff_width) {
            return Err(ConfigError::out_of_range(
                "trigger.falloff_width",
                self.falloff_width,
                "a number in [0, 1]",
            ));
        }
        Ok(())
    }
}

/// Length of the neighbourhood a trigger searches each frame.
///
/// `round(time_visible_s * scan_ratio * sample_rate)`, never below 2.
pub fn scan_nsamp(time_visible_s: f64, scan_ratio: f64, sample_rate: u32) -> usize {
    let nsamp = (time_visible_s * scan_ratio * sample_rate as f64).round();
    if nsamp.is_finite() && nsamp > 2.0 {
        nsamp as usize
    } else {
        2
    }
}
