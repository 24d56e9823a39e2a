//! # Spectral Analyzer Module
//!
//! Turns a time-domain audio frame into an amplitude spectrum for the
//! frequency-domain peak detector.
//!
//! ## Features
//! - FFT planned once per transform size using RustFFT
//! - Hamming windowing for reduced spectral leakage
//! - Allocation-free analysis path for the real-time capture callback
//! - Nyquist-limited output (`transform_size / 2` bins)

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Builds Hamming window coefficients for a frame of `n` samples.
///
/// # Arguments
/// * `n` - Frame length in samples
///
/// # Returns
/// * `Vec<f32>` - One multiplier per sample, `0.54 - 0.46 * cos(2πi / (n - 1))`
pub fn hamming_window(n: usize) -> Vec<f32> {
    if n < 2 {
        return vec![1.0; n];
    }
    let n_minus_1 = (n - 1) as f32;
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos())
        .collect()
}

/// A forward FFT with its window and scratch space prepared up front.
///
/// The only state carried between calls is the window, the plan and the
/// scratch buffers, all of which are fully overwritten on every call. Two
/// calls with the same frame give the same spectrum.
pub struct SpectralAnalyzer {
    transform_size: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("transform_size", &self.transform_size)
            .finish_non_exhaustive()
    }
}

impl SpectralAnalyzer {
    /// Plans an FFT of `transform_size` points and precomputes its window.
    pub fn new(transform_size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(transform_size);
        let scratch_len = fft.get_inplace_scratch_len();
        Self {
            transform_size,
            window: hamming_window(transform_size),
            fft,
            buffer: vec![Complex::new(0.0, 0.0); transform_size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
        }
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// Number of spectrum bins produced per frame.
    pub fn bin_count(&self) -> usize {
        self.transform_size / 2
    }

    /// Analyzes a frame and returns a freshly allocated spectrum.
    pub fn analyze(&mut self, frame: &[f32]) -> Vec<f32> {
        let mut bins = vec![0.0; self.bin_count()];
        self.analyze_into(frame, &mut bins);
        bins
    }

    /// Analyzes a frame into `out` without allocating.
    ///
    /// Samples past `transform_size` are ignored and a short frame is zero
    /// padded. At most `out.len()` bins are written, the rest of `out` is
    /// left untouched.
    pub fn analyze_into(&mut self, frame: &[f32], out: &mut [f32]) {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let sample = frame.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(sample * self.window[i], 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        for (bin, c) in out.iter_mut().zip(self.buffer.iter().take(self.bin_count())) {
            *bin = c.norm(); // .norm() is sqrt(re^2 + im^2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_shape() {
        let w = hamming_window(2048);
        assert!((w[0] - 0.08).abs() < 1e-6);
        assert!((w[2047] - 0.08).abs() < 1e-6);
        assert!(w[1023] > 0.99);
    }

    #[test]
    fn test_silence_gives_zero_spectrum() {
        let mut analyzer = SpectralAnalyzer::new(2048);
        let bins = analyzer.analyze(&vec![0.0; 2048]);
        assert_eq!(bins.len(), 1024);
        assert!(bins.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_sine_peaks_at_expected_bin() {
        let n = 2048;
        let mut analyzer = SpectralAnalyzer::new(n);
        // Exactly 64 cycles over the frame lands on bin 64
        let frame: Vec<f32> = (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * 64.0 * i as f32 / n as f32).sin())
            .collect();
        let bins = analyzer.analyze(&frame);
        let peak = bins
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 64);
    }

    #[test]
    fn test_no_carry_over_between_calls() {
        let n = 2048;
        let mut analyzer = SpectralAnalyzer::new(n);
        let tone: Vec<f32> = (0..n).map(|i| (i as f32 * 0.3).sin()).collect();
        let noise: Vec<f32> = (0..n).map(|i| ((i * 7919) % 13) as f32 / 13.0 - 0.5).collect();

        let first = analyzer.analyze(&tone);
        let _ = analyzer.analyze(&noise);
        let again = analyzer.analyze(&tone);
        assert_eq!(first, again);
    }

    #[test]
    fn test_short_frame_is_zero_padded() {
        let mut analyzer = SpectralAnalyzer::new(2048);
        let bins = analyzer.analyze(&[0.0; 16]);
        assert!(bins.iter().all(|&b| b == 0.0));
    }
}
