//! Correlation trigger with an adaptive reference waveform.
//!
//! Each frame the trigger scans `scan_nsamp` candidate alignment points
//! around the hint, scores each candidate window against the reference
//! buffer by normalized cross-correlation, and moves the reference a little
//! toward whichever window won. The reference therefore tracks slow pitch and
//! timbre drift while staying locked to one phase of the waveform.
//!
//! Scoring: `max(ncc, 0) ^ trigger_strength * proximity(d)`, where `d` is
//! the candidate's distance from the hint and
//! `proximity(d) = exp(-0.5 * (d / (scan_nsamp / 2))^2)`.
//! Candidates are ranked by the logarithm of that score so large strengths
//! cannot underflow every candidate to zero. Whether a peak exists at all is
//! decided on the raw correlation, before the exponent is applied.

use super::xcorr::CrossCorrelator;
use super::{Trigger, TriggerConfig};
use crate::wave::Wave;
use std::f32::consts::PI;
use std::sync::Arc;

/// Norms below this are treated as silence.
const SILENCE_NORM: f64 = 1e-9;

/// A best raw correlation below this means no meaningful peak exists.
const MIN_SCORE: f32 = 1e-6;

/// Scores within this fraction of the best score count as ties.
const TIE_TOLERANCE: f64 = 1e-6;

/// Stateful per-channel trigger.
///
/// Owns its reference buffer exclusively; two channels never share one.
pub struct CorrelationTrigger {
    cfg: TriggerConfig,
    wave: Arc<Wave>,
    scan_nsamp: usize,
    /// Current belief of the waveform shape around the trigger point
    reference: Vec<f32>,
    seeded: bool,
    /// Edge taper applied to windows before they enter the reference
    taper: Vec<f32>,
    /// Log of the distance weighting per candidate offset
    log_proximity: Vec<f64>,
    correlator: CrossCorrelator,
    /// Scan region: candidate `o` is `span[o..o + scan_nsamp]`
    span: Vec<f32>,
    dots: Vec<f32>,
    /// Prefix sums of squared span samples
    energy: Vec<f64>,
}

impl CorrelationTrigger {
    /// Creates a trigger for `wave` searching `scan_nsamp` samples per frame.
    ///
    /// `scan_nsamp` below 2 is raised to 2.
    pub fn new(cfg: TriggerConfig, wave: Arc<Wave>, scan_nsamp: usize) -> Self {
        let n = scan_nsamp.max(2);
        let half = n / 2;
        let span_len = 2 * n;

        let log_proximity = (0..n)
            .map(|o| {
                let d = (o as f64 - half as f64) / half as f64;
                -0.5 * d * d
            })
            .collect();

        Self {
            cfg,
            wave,
            scan_nsamp: n,
            reference: vec![0.0; n],
            seeded: false,
            taper: edge_taper(n, cfg.falloff_width),
            log_proximity,
            correlator: CrossCorrelator::new(span_len),
            span: vec![0.0; span_len],
            dots: vec![0.0; n],
            energy: vec![0.0; span_len + 1],
        }
    }

    /// The adaptive reference buffer.
    pub fn reference(&self) -> &[f32] {
        &self.reference
    }

    /// Whether the reference has been seeded from a non-silent window.
    pub fn is_seeded(&self) -> bool {
        self.seeded
    }

    fn half(&self) -> usize {
        self.scan_nsamp / 2
    }

    /// Offsets whose candidate centre sample is a rising zero crossing.
    fn rising_edges(&self) -> Vec<usize> {
        let half = self.half();
        (0..self.scan_nsamp)
            .filter(|&o| {
                let centre = o + half;
                centre >= 1 && self.span[centre - 1] < 0.0 && self.span[centre] >= 0.0
            })
            .collect()
    }

    fn candidate(&self, offset: usize) -> &[f32] {
        &self.span[offset..offset + self.scan_nsamp]
    }

    /// First usable window: adopt it as the reference without blending.
    fn seed(&mut self, hint: i64) -> i64 {
        let half = self.half();
        let offset = if self.cfg.use_edge_trigger {
            self.rising_edges()
                .into_iter()
                .min_by_key(|&o| o.abs_diff(half))
                .unwrap_or(half)
        } else {
            half
        };

        if norm(self.candidate(offset)) < SILENCE_NORM {
            return hint;
        }

        let (span, taper) = (&self.span[offset..offset + self.scan_nsamp], &self.taper);
        for ((r, &s), &w) in self.reference.iter_mut().zip(span).zip(taper) {
            *r = s * w;
        }
        self.seeded = true;
        let index = shifted(hint, offset, half);
        tracing::trace!("Reference seeded at sample {index}");
        index
    }

    /// Moves the reference toward the tapered candidate at `offset`.
    fn blend(&mut self, offset: usize) {
        let rate = self.cfg.responsiveness;
        let window = &self.span[offset..offset + self.scan_nsamp];
        for ((r, &s), &w) in self.reference.iter_mut().zip(window).zip(&self.taper) {
            *r = (1.0 - rate) * *r + rate * s * w;
        }
    }

    /// Scores every allowed offset and returns the winner, or `None` when no
    /// candidate correlates meaningfully.
    fn best_offset(&mut self) -> Option<usize> {
        let n = self.scan_nsamp;
        let half = self.half();

        let ref_norm = norm(&self.reference);
        if ref_norm < SILENCE_NORM {
            return None;
        }

        self.correlator
            .correlate(&self.reference, &self.span, &mut self.dots);

        self.energy[0] = 0.0;
        for (i, &s) in self.span.iter().enumerate() {
            self.energy[i + 1] = self.energy[i] + (s as f64) * (s as f64);
        }

        let mut allowed = if self.cfg.use_edge_trigger {
            self.rising_edges()
        } else {
            Vec::new()
        };
        if allowed.is_empty() {
            allowed = (0..n).collect();
        }

        let strength = self.cfg.trigger_strength as f64;
        let mut max_ncc = 0.0f32;
        let scores: Vec<(usize, f64)> = allowed
            .into_iter()
            .map(|o| {
                let cand_energy = (self.energy[o + n] - self.energy[o]).max(0.0);
                let cand_norm = cand_energy.sqrt();
                let ncc = if cand_norm < SILENCE_NORM {
                    0.0
                } else {
                    (self.dots[o] as f64 / (ref_norm * cand_norm)).clamp(0.0, 1.0)
                };
                max_ncc = max_ncc.max(ncc as f32);
                let log_shape = if ncc > 0.0 {
                    strength * ncc.ln()
                } else {
                    f64::NEG_INFINITY
                };
                (o, log_shape + self.log_proximity[o])
            })
            .collect();

        if max_ncc < MIN_SCORE {
            return None;
        }
        pick_offset(&scores, half)
    }
}

/// Picks the best `(offset, log score)` pair.
///
/// Scores within a relative `TIE_TOLERANCE` of the best are ties, resolved
/// by the smallest distance from `half` and then by the earlier offset.
fn pick_offset(scores: &[(usize, f64)], half: usize) -> Option<usize> {
    let best = scores
        .iter()
        .map(|&(_, s)| s)
        .fold(f64::NEG_INFINITY, f64::max);
    if !best.is_finite() {
        return None;
    }

    let floor = best + (1.0 - TIE_TOLERANCE).ln();
    scores
        .iter()
        .filter(|&&(_, s)| s >= floor)
        .map(|&(o, _)| o)
        .min_by_key(|&o| (o.abs_diff(half), o))
}

/// `hint + offset - half` without overflowing near the ends of the i64 range.
fn shifted(hint: i64, offset: usize, half: usize) -> i64 {
    hint.saturating_add(offset as i64 - half as i64)
}

impl Trigger for CorrelationTrigger {
    fn locate(&mut self, hint: i64) -> i64 {
        let half = self.half();
        // candidate o is centred on hint + o - half
        self.wave
            .read_into(hint.saturating_sub(2 * half as i64), &mut self.span);

        if !self.seeded {
            return self.seed(hint);
        }

        match self.best_offset() {
            Some(offset) => {
                self.blend(offset);
                shifted(hint, offset, half)
            }
            None => {
                self.blend(half);
                if norm(&self.reference) < SILENCE_NORM {
                    self.seeded = false;
                }
                hint
            }
        }
    }
}

fn norm(samples: &[f32]) -> f64 {
    samples
        .iter()
        .map(|&s| (s as f64) * (s as f64))
        .sum::<f64>()
        .sqrt()
}

/// Raised-cosine ramps over the first and last `falloff_width * len` samples.
///
/// Each ramp is capped at half the window.
fn edge_taper(len: usize, falloff_width: f32) -> Vec<f32> {
    let ramp = ((falloff_width.clamp(0.0, 1.0) * len as f32).round() as usize).min(len / 2);
    let mut taper = vec![1.0; len];
    for i in 0..ramp {
        let w = 0.5 * (1.0 - (PI * (i as f32 + 0.5) / ramp as f32).cos());
        taper[i] = w;
        taper[len - 1 - i] = w;
    }
    taper
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const RATE: u32 = 44_100;

    fn sine(freq: f64, secs: f64, amplitude: f32) -> Arc<Wave> {
        let len = (RATE as f64 * secs) as usize;
        let samples = (0..len)
            .map(|i| {
                amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / RATE as f64).sin() as f32
            })
            .collect();
        Arc::new(Wave::from_samples("sine", samples, RATE).unwrap())
    }

    /// Distance between two indices measured around a period of `period`.
    fn phase_distance(a: i64, b: i64, period: f64) -> f64 {
        let d = ((a - b) as f64).rem_euclid(period);
        d.min(period - d)
    }

    #[test]
    fn taper_shapes() {
        assert!(edge_taper(8, 0.0).iter().all(|&w| w == 1.0));

        let taper = edge_taper(100, 0.1);
        assert!(taper[0] < 0.05);
        assert!(taper[99] < 0.05);
        assert_relative_eq!(taper[0], taper[99]);
        assert!(taper[10..90].iter().all(|&w| w == 1.0));
        assert!(taper[..10].windows(2).all(|p| p[0] <= p[1]));

        // ramps never overlap, even at full falloff
        let full = edge_taper(101, 1.0);
        assert_eq!(full[50], 1.0);
    }

    #[test]
    fn first_call_seeds_reference_from_window() {
        let wave = sine(440.0, 0.5, 0.8);
        let cfg = TriggerConfig {
            use_edge_trigger: false,
            falloff_width: 0.0,
            ..Default::default()
        };
        let mut trigger = CorrelationTrigger::new(cfg, Arc::clone(&wave), 512);
        assert!(!trigger.is_seeded());

        let hint = 5_000;
        assert_eq!(trigger.locate(hint), hint);
        assert!(trigger.is_seeded());
        assert_eq!(trigger.reference(), wave.window(hint, 512).as_slice());
    }

    #[test]
    fn first_call_with_edge_trigger_snaps_to_rising_edge() {
        let wave = sine(440.0, 0.5, 1.0);
        let mut trigger = CorrelationTrigger::new(TriggerConfig::default(), wave.clone(), 1103);

        let index = trigger.locate(5_030);
        let around = wave.window(index, 2);
        assert!(around[0] < 0.0 && around[1] >= 0.0, "{around:?}");
        assert!((index - 5_030).abs() <= 551);
    }

    #[test]
    fn silence_returns_hint_unchanged() {
        let wave = Arc::new(Wave::from_samples("silence", vec![0.0; 44_100], RATE).unwrap());
        for edge in [false, true] {
            let cfg = TriggerConfig {
                use_edge_trigger: edge,
                ..Default::default()
            };
            let mut trigger = CorrelationTrigger::new(cfg, wave.clone(), 1103);
            for hint in (0..60).map(|f| f * 735) {
                assert_eq!(trigger.locate(hint), hint);
            }
            assert!(!trigger.is_seeded());
        }
    }

    #[test]
    fn sine_alignment_is_stable_modulo_period() {
        let freq = 440.0;
        let period = RATE as f64 / freq;
        let wave = sine(freq, 2.0, 1.0);

        for edge in [false, true] {
            let cfg = TriggerConfig {
                use_edge_trigger: edge,
                ..Default::default()
            };
            let mut trigger = CorrelationTrigger::new(cfg, wave.clone(), 1103);

            let indices: Vec<i64> = (0..100).map(|f| trigger.locate(f * 735 + 17)).collect();
            // skip the first frames while the reference fills in
            for pair in indices[5..].windows(2) {
                let jitter = phase_distance(pair[1], pair[0], period);
                assert!(
                    jitter <= 0.01 * period,
                    "edge={edge}: jitter {jitter} between {} and {}",
                    pair[0],
                    pair[1]
                );
            }
        }
    }

    #[test]
    fn high_strength_still_tracks_after_timbre_change() {
        let freq = 220.0;
        let period = RATE as f64 / freq;
        let switch = RATE as usize / 2;
        let samples = (0..RATE as usize * 2)
            .map(|i| {
                let phase = freq * i as f64 / RATE as f64;
                let s = if i < switch {
                    (2.0 * std::f64::consts::PI * phase).sin()
                } else {
                    // rising sawtooth, in phase with the sine's fundamental
                    2.0 * (phase + 0.5).fract() - 1.0
                };
                s as f32
            })
            .collect();
        let wave = Arc::new(Wave::from_samples("timbre", samples, RATE).unwrap());
        let cfg = TriggerConfig {
            trigger_strength: 60.0,
            use_edge_trigger: false,
            ..Default::default()
        };
        let mut trigger = CorrelationTrigger::new(cfg, wave, 1103);

        let frames: Vec<(i64, i64)> = (0..100)
            .map(|f| {
                let hint = f * 735 + 17;
                (hint, trigger.locate(hint))
            })
            .collect();

        // first frame whose scan span lies entirely inside the sawtooth
        let after = (switch as i64 + 2 * 1103) / 735 + 1;
        let after = &frames[after as usize..];
        assert!(
            after.iter().any(|&(hint, index)| hint != index),
            "trigger fell back to the hint for every sawtooth frame"
        );
        for pair in after.windows(2) {
            let jitter = phase_distance(pair[1].1, pair[0].1, period);
            assert!(jitter <= 0.01 * period, "jitter {jitter} at hint {}", pair[1].0);
        }
    }

    #[test]
    fn edge_trigger_falls_back_when_signal_never_crosses_zero() {
        let freq = 441.0;
        let period = RATE as f64 / freq;
        let samples = (0..RATE as usize)
            .map(|i| {
                let t = i as f64 / RATE as f64;
                (0.5 + 0.45 * (2.0 * std::f64::consts::PI * freq * t).sin()) as f32
            })
            .collect();
        let wave = Arc::new(Wave::from_samples("offset", samples, RATE).unwrap());
        let mut trigger = CorrelationTrigger::new(TriggerConfig::default(), wave, 1103);

        let indices: Vec<i64> = (0..50).map(|f| trigger.locate(f * 735 + 17)).collect();
        assert!(trigger.is_seeded());
        for pair in indices[5..].windows(2) {
            let jitter = phase_distance(pair[1], pair[0], period);
            assert!(jitter <= 0.01 * period, "jitter {jitter} between {pair:?}");
        }
    }

    #[test]
    fn ties_prefer_smallest_correction_then_earlier_offset() {
        assert_eq!(pick_offset(&[(3, -1.0), (7, -1.0), (5, -2.0)], 5), Some(3));
        assert_eq!(pick_offset(&[(7, -1.0), (4, -1.0)], 5), Some(4));
        // within the relative tolerance still counts as a tie
        assert_eq!(pick_offset(&[(2, -1.0), (6, -1.0 - 1e-9)], 5), Some(6));
        assert_eq!(pick_offset(&[(2, -1.0), (6, -1.1)], 5), Some(2));
        assert_eq!(pick_offset(&[(2, f64::NEG_INFINITY)], 5), None);
        assert_eq!(pick_offset(&[], 5), None);
    }

    #[test]
    fn extreme_hints_do_not_overflow() {
        let wave = sine(440.0, 0.1, 1.0);
        let mut trigger = CorrelationTrigger::new(TriggerConfig::default(), wave, 512);
        assert_eq!(trigger.locate(i64::MIN), i64::MIN);
        assert_eq!(trigger.locate(i64::MAX), i64::MAX);
        assert!(!trigger.is_seeded());

        // a seeded trigger falls back to the hint once the span is silent
        trigger.locate(2_000);
        assert!(trigger.is_seeded());
        assert_eq!(trigger.locate(i64::MIN), i64::MIN);
        assert_eq!(trigger.locate(i64::MAX), i64::MAX);
        assert_eq!(shifted(i64::MAX, 600, 256), i64::MAX);
        assert_eq!(shifted(i64::MIN, 0, 256), i64::MIN);
    }

    #[test]
    fn corrections_stay_inside_scan_window() {
        let wave = sine(220.0, 1.0, 0.5);
        let mut trigger = CorrelationTrigger::new(TriggerConfig::default(), wave, 800);
        for f in 0..60 {
            let hint = f * 735;
            let index = trigger.locate(hint);
            assert!((index - hint).abs() <= 400);
        }
    }

    #[test]
    fn reference_norm_stays_bounded() {
        let wave = sine(330.0, 10.0, 1.0);
        let n = 1103;
        let mut trigger = CorrelationTrigger::new(TriggerConfig::default(), wave, n);
        let bound = (n as f64).sqrt() + 1e-3;

        for f in 0..600 {
            trigger.locate(f * 735);
            assert!(norm(trigger.reference()) <= bound);
        }
        assert!(trigger.is_seeded());
    }

    #[test]
    fn zero_responsiveness_freezes_reference() {
        let wave = sine(440.0, 1.0, 1.0);
        let cfg = TriggerConfig {
            responsiveness: 0.0,
            ..Default::default()
        };
        let mut trigger = CorrelationTrigger::new(cfg, wave, 600);
        trigger.locate(1_000);
        let seeded = trigger.reference().to_vec();
        for f in 1..20 {
            trigger.locate(1_000 + f * 735);
        }
        assert_eq!(trigger.reference(), seeded.as_slice());
    }

    #[test]
    fn reference_reseeds_after_long_silence() {
        let mut samples: Vec<f32> = (0..22_050)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin())
            .collect();
        samples.extend(std::iter::repeat(0.0).take(RATE as usize * 4));
        let wave = Arc::new(Wave::from_samples("gap", samples, RATE).unwrap());
        let cfg = TriggerConfig {
            responsiveness: 1.0,
            ..Default::default()
        };
        let mut trigger = CorrelationTrigger::new(cfg, wave, 600);

        trigger.locate(5_000);
        assert!(trigger.is_seeded());
        assert_eq!(trigger.locate(100_000), 100_000);
        assert!(!trigger.is_seeded());
    }
}
