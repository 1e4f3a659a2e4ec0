//! In-memory sample source with zero-filled windowed reads.

use crate::error::DecodeError;

/// One decoded, mono audio channel.
///
/// Samples are immutable after construction, so a `Wave` can be shared
/// between a channel and its trigger through an `Arc` and read from several
/// threads at once.
#[derive(Debug, Clone)]
pub struct Wave {
    /// Display name (file stem for decoded files)
    name: String,
    /// Amplitude samples, nominally in [-1, 1]
    samples: Vec<f32>,
    /// Samples per second
    smp_s: u32,
}

impl Wave {
    /// Builds a wave from samples already in memory.
    ///
    /// # Errors
    /// - If `samples` is empty
    /// - If `sample_rate` is zero
    pub fn from_samples(
        name: impl Into<String>,
        samples: Vec<f32>,
        sample_rate: u32,
    ) -> Result<Self, DecodeError> {
        let name = name.into();
        if sample_rate == 0 {
            return Err(DecodeError::InvalidSampleRate(name));
        }
        if samples.is_empty() {
            return Err(DecodeError::Empty(name));
        }
        Ok(Self {
            name,
            samples,
            smp_s: sample_rate,
        })
    }

    /// Returns `length` samples starting at `center - length / 2`.
    ///
    /// Positions before the start or past the end of the recording read as
    /// `0.0`. The result always has exactly `length` elements.
    pub fn window(&self, center: i64, length: usize) -> Vec<f32> {
        let mut out = vec![0.0; length];
        self.read_into(center.saturating_sub((length / 2) as i64), &mut out);
        out
    }

    /// Fills `out` with the samples starting at absolute index `start`,
    /// zero-filling whatever falls outside the recording.
    pub fn read_into(&self, start: i64, out: &mut [f32]) {
        out.fill(0.0);

        let len = self.samples.len() as i64;
        let end = start.saturating_add(out.len() as i64);
        let lo = start.max(0);
        let hi = end.min(len);
        if lo >= hi {
            return;
        }

        let dst = (lo - start) as usize;
        let count = (hi - lo) as usize;
        out[dst..dst + count].copy_from_slice(&self.samples[lo as usize..hi as usize]);
    }

    /// Number of samples in the recording.
    pub fn duration_samples(&self) -> usize {
        self.samples.len()
    }

    pub fn sample_rate(&self) -> u32 {
        self.smp_s
    }

    /// Length of the recording in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.smp_s as f64
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
    }

    /// Converts a time in seconds to the nearest sample index.
    pub fn index_at(&self, time_s: f64) -> i64 {
        (self.smp_s as f64 * time_s).round() as i64
    }
}
