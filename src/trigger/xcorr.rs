//! FFT cross-correlation of a short reference against a longer span.

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Reusable correlator with cached plans and buffers.
///
/// Computes `out[o] = sum_k reference[k] * span[o + k]` for every `o` in
/// `0..out.len()`, which must satisfy `out.len() + reference.len() <=
/// span.len() + 1` so no product wraps around the circular transform.
pub struct CrossCorrelator {
    fft_len: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    span_buf: Vec<Complex<f32>>,
    ref_buf: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl CrossCorrelator {
    /// Plans transforms large enough for spans of up to `max_span` samples.
    pub fn new(max_span: usize) -> Self {
        let fft_len = max_span.max(1).next_power_of_two();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(fft_len);
        let inverse = planner.plan_fft_inverse(fft_len);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            fft_len,
            forward,
            inverse,
            span_buf: vec![Complex::new(0.0, 0.0); fft_len],
            ref_buf: vec![Complex::new(0.0, 0.0); fft_len],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn correlate(&mut self, reference: &[f32], span: &[f32], out: &mut [f32]) {
        debug_assert!(span.len() <= self.fft_len);
        debug_assert!(out.len() + reference.len() <= span.len() + 1);

        load(&mut self.span_buf, span);
        load(&mut self.ref_buf, reference);

        self.forward
            .process_with_scratch(&mut self.span_buf, &mut self.scratch);
        self.forward
            .process_with_scratch(&mut self.ref_buf, &mut self.scratch);

        for (s, r) in self.span_buf.iter_mut().zip(self.ref_buf.iter()) {
            *s *= r.conj();
        }

        self.inverse
            .process_with_scratch(&mut self.span_buf, &mut self.scratch);

        // rustfft leaves the inverse unnormalized
        let scale = 1.0 / self.fft_len as f32;
        for (o, value) in out.iter_mut().enumerate() {
            *value = self.span_buf[o].re * scale;
        }
    }
}

fn load(buf: &mut [Complex<f32>], samples: &[f32]) {
    for (slot, &s) in buf.iter_mut().zip(samples) {
        *slot = Complex::new(s, 0.0);
    }
    for slot in buf.iter_mut().skip(samples.len()) {
        *slot = Complex::new(0.0, 0.0);
    }
}
