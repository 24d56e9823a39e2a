//! # Capture Bridge Module
//!
//! The work done once per filled capture frame, on the audio thread:
//! produce the frame for the current mode, normalize it, analyze it and
//! publish both buffers to the [`FrameExchange`].
//!
//! Everything here is sized at construction. `process` never allocates,
//! never does I/O and never logs. Its only blocking point is the exchange
//! lock, which is held for two buffer copies.

use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};

use crate::exchange::FrameExchange;
use crate::fft::SpectralAnalyzer;
use crate::signal;

/// Where the capture frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureMode {
    /// Hardware input, peak normalized.
    Live,
    /// Uniform noise in [-1, 1].
    Noise,
    /// A sine whose frequency follows the tone control.
    Tone,
}

impl CaptureMode {
    fn to_u8(self) -> u8 {
        match self {
            CaptureMode::Live => 0,
            CaptureMode::Noise => 1,
            CaptureMode::Tone => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => CaptureMode::Noise,
            2 => CaptureMode::Tone,
            _ => CaptureMode::Live,
        }
    }
}

/// Runtime switches read by the capture callback.
#[derive(Debug)]
pub struct CaptureControls {
    mode: AtomicU8,
    tone: AtomicU32,
}

impl Default for CaptureControls {
    fn default() -> Self {
        Self {
            mode: AtomicU8::new(CaptureMode::Live.to_u8()),
            tone: AtomicU32::new(0.0f32.to_bits()),
        }
    }
}

impl CaptureControls {
    pub fn mode(&self) -> CaptureMode {
        CaptureMode::from_u8(self.mode.load(Ordering::Relaxed))
    }

    pub fn set_mode(&self, mode: CaptureMode) {
        self.mode.store(mode.to_u8(), Ordering::Relaxed);
    }

    /// Tone frequency as a fraction of Nyquist.
    pub fn tone(&self) -> f32 {
        f32::from_bits(self.tone.load(Ordering::Relaxed))
    }

    /// Sets the tone control, clamped to [0, 1].
    pub fn set_tone(&self, control: f32) {
        let control = if control.is_nan() { 0.0 } else { control.clamp(0.0, 1.0) };
        self.tone.store(control.to_bits(), Ordering::Relaxed);
    }
}

/// Per-frame processing owned by the capture thread.
#[derive(Debug)]
pub struct CaptureBridge {
    analyzer: SpectralAnalyzer,
    audio: Vec<f32>,
    spectrum: Vec<f32>,
    exchange: Arc<FrameExchange>,
    controls: Arc<CaptureControls>,
    rng: Pcg32,
}

impl CaptureBridge {
    /// Prepares buffers and the FFT for frames of `frame_len` samples.
    pub fn new(
        frame_len: usize,
        exchange: Arc<FrameExchange>,
        controls: Arc<CaptureControls>,
        noise_seed: u64,
    ) -> Self {
        let analyzer = SpectralAnalyzer::new(frame_len);
        let bin_count = analyzer.bin_count();
        Self {
            analyzer,
            audio: vec![0.0; frame_len],
            spectrum: vec![0.0; bin_count],
            exchange,
            controls,
            rng: Pcg32::seed_from_u64(noise_seed),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.audio.len()
    }

    /// Handles one mono hardware frame.
    ///
    /// In live mode `input` is copied (zero padded or truncated to the frame
    /// length). The synthetic modes ignore it.
    pub fn process(&mut self, input: &[f32]) {
        match self.controls.mode() {
            CaptureMode::Live => {
                let n = input.len().min(self.audio.len());
                self.audio[..n].copy_from_slice(&input[..n]);
                self.audio[n..].fill(0.0);
            }
            CaptureMode::Noise => signal::fill_noise(&mut self.audio, &mut self.rng),
            CaptureMode::Tone => signal::fill_tone(&mut self.audio, self.controls.tone()),
        }
        signal::normalize_peak(&mut self.audio);

        self.analyzer.analyze_into(&self.audio, &mut self.spectrum);
        signal::normalize_peak(&mut self.spectrum);

        self.exchange.publish(&self.audio, &self.spectrum);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bridge(frame_len: usize) -> (CaptureBridge, Arc<FrameExchange>, Arc<CaptureControls>) {
        let exchange = Arc::new(FrameExchange::new(frame_len, frame_len / 2));
        let controls = Arc::new(CaptureControls::default());
        let bridge = CaptureBridge::new(frame_len, Arc::clone(&exchange), Arc::clone(&controls), 1);
        (bridge, exchange, controls)
    }

    fn peak(values: &[f32]) -> f32 {
        values.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }

    #[test]
    fn test_live_frame_is_normalized() {
        let (mut bridge, exchange, _) = bridge(2048);
        let input: Vec<f32> = (0..2048).map(|i| 0.2 * (i as f32 * 0.05).sin()).collect();
        bridge.process(&input);

        let pair = exchange.snapshot();
        assert_eq!(pair.sequence, 1);
        assert!((peak(&pair.audio) - 1.0).abs() < 1e-6);
        assert!((peak(&pair.spectrum) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_silent_live_frame_publishes_zeros() {
        let (mut bridge, exchange, _) = bridge(2048);
        bridge.process(&vec![0.0; 2048]);

        let pair = exchange.snapshot();
        assert_eq!(pair.sequence, 1);
        assert!(pair.audio.iter().all(|&s| s == 0.0));
        assert!(pair.spectrum.iter().all(|&b| b == 0.0));
    }

    #[test]
    fn test_short_live_input_is_padded() {
        let (mut bridge, exchange, _) = bridge(2048);
        bridge.process(&[0.5, -0.25]);
        let pair = exchange.snapshot();
        assert_eq!(pair.audio.len(), 2048);
        assert_eq!(&pair.audio[..2], &[1.0, -0.5]);
        assert!(pair.audio[2..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_mode_switch_at_runtime() {
        let (mut bridge, exchange, controls) = bridge(2048);

        controls.set_mode(CaptureMode::Noise);
        bridge.process(&vec![0.0; 2048]);
        let noisy = exchange.snapshot();
        assert!(noisy.audio.iter().any(|&s| s != 0.0));
        assert!(noisy.audio.iter().all(|s| (-1.0..=1.0).contains(s)));

        controls.set_mode(CaptureMode::Tone);
        controls.set_tone(0.25);
        bridge.process(&vec![0.0; 2048]);
        let tone = exchange.snapshot();
        assert!((tone.audio[2] - 1.0).abs() < 1e-6);
        assert_eq!(tone.sequence, 2);
    }

    #[test]
    fn test_synthetic_frames_are_normalized() {
        let (mut bridge, exchange, controls) = bridge(2048);

        // sin(pi * 2047 * 0.0001) peaks near 0.6 before normalization
        controls.set_mode(CaptureMode::Tone);
        controls.set_tone(0.0001);
        bridge.process(&[]);
        let tone = exchange.snapshot();
        assert_eq!(peak(&tone.audio), 1.0);
        assert_eq!(peak(&tone.spectrum), 1.0);

        controls.set_mode(CaptureMode::Noise);
        bridge.process(&[]);
        let noisy = exchange.snapshot();
        assert_eq!(peak(&noisy.audio), 1.0);
        assert_eq!(peak(&noisy.spectrum), 1.0);
    }

    #[test]
    fn test_tone_control_is_clamped() {
        let controls = CaptureControls::default();
        controls.set_tone(3.0);
        assert_eq!(controls.tone(), 1.0);
        controls.set_tone(f32::NAN);
        assert_eq!(controls.tone(), 0.0);
    }
}
