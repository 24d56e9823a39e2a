//! # Transcriber Module
//!
//! The consumer side of the pipeline. Each [`Transcriber::tick`] copies the
//! latest frame pair out of the exchange and re-runs both detectors with the
//! current thresholds. Detection and sequencing run on the copy, never under
//! the exchange lock.

use rand::Rng;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use crate::config::{SharedThresholds, Thresholds, TranscriberConfig};
use crate::error::Result;
use crate::exchange::{FrameExchange, FramePair};
use crate::export::{self, ExportOutcome};
use crate::peaks::{self, DetectorParams, MidiNotes, TimeMarkers};
use crate::sequencer::SequenceParams;

/// Read-only view of what the last tick produced, for display or dumping.
#[derive(Debug, Clone, Serialize)]
pub struct PeakReport<'a> {
    pub sequence: u64,
    pub time_threshold: f32,
    pub freq_threshold: f32,
    pub time_markers_ms: &'a TimeMarkers,
    pub midi_notes: &'a MidiNotes,
}

/// Owns the consumer's snapshot and the peak lists derived from it.
#[derive(Debug)]
pub struct Transcriber {
    config: TranscriberConfig,
    exchange: Arc<FrameExchange>,
    thresholds: Arc<SharedThresholds>,
    frame: FramePair,
    midi_notes: MidiNotes,
    time_markers: TimeMarkers,
    last_thresholds: Option<Thresholds>,
}

impl Transcriber {
    pub fn new(
        config: TranscriberConfig,
        exchange: Arc<FrameExchange>,
        thresholds: Arc<SharedThresholds>,
    ) -> Self {
        let frame = FramePair::silent(config.audio.buffer_size, config.audio.buffer_size / 2);
        Self {
            config,
            exchange,
            thresholds,
            frame,
            midi_notes: MidiNotes::new(),
            time_markers: TimeMarkers::new(),
            last_thresholds: None,
        }
    }

    pub fn config(&self) -> &TranscriberConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &Arc<SharedThresholds> {
        &self.thresholds
    }

    fn detector_params(&self) -> DetectorParams {
        DetectorParams {
            sample_rate: self.config.audio.sample_rate,
            analysis_window: self.config.detection.analysis_window,
            time_trigger: self.config.detection.time_trigger,
        }
    }

    /// Snapshots the exchange and rebuilds both peak lists.
    ///
    /// Returns `true` if a new frame arrived since the previous tick. The
    /// lists are rebuilt either way so threshold changes apply to a paused
    /// frame too.
    pub fn tick(&mut self) -> bool {
        let fresh = self.exchange.snapshot_into(&mut self.frame);
        self.detect();
        fresh
    }

    /// Re-runs both detectors over the held frame with the current thresholds.
    pub fn detect(&mut self) {
        let thresholds = self.thresholds.load();
        let params = self.detector_params();

        self.time_markers = peaks::detect_time_peaks(
            &self.frame.audio,
            self.config.time_scale(),
            thresholds.time,
            &params,
        );
        self.midi_notes = peaks::detect_frequency_peaks(
            &self.frame.spectrum,
            self.config.freq_scale(),
            thresholds.freq,
            &params,
        );

        if self.last_thresholds != Some(thresholds) {
            log::debug!(
                "Thresholds now time={} freq={} max_ticks={}",
                thresholds.time, thresholds.freq, thresholds.max_note_ticks
            );
            self.last_thresholds = Some(thresholds);
        }
    }

    pub fn frame(&self) -> &FramePair {
        &self.frame
    }

    pub fn midi_notes(&self) -> &MidiNotes {
        &self.midi_notes
    }

    pub fn time_markers(&self) -> &TimeMarkers {
        &self.time_markers
    }

    pub fn report(&self) -> PeakReport<'_> {
        let thresholds = self.thresholds.load();
        PeakReport {
            sequence: self.frame.sequence,
            time_threshold: thresholds.time,
            freq_threshold: thresholds.freq,
            time_markers_ms: &self.time_markers,
            midi_notes: &self.midi_notes,
        }
    }

    fn sequence_params(&self) -> SequenceParams {
        SequenceParams {
            chunk_time_ms: self.config.chunk_time_ms(),
            max_note_ticks: self.thresholds.load().max_note_ticks,
        }
    }

    /// Exports the current peak lists to `path`.
    pub fn export<R: Rng + ?Sized>(&self, path: &Path, rng: &mut R) -> Result<ExportOutcome> {
        export::export_midi_file(
            path,
            &self.midi_notes,
            &self.time_markers,
            &self.sequence_params(),
            rng,
        )
    }

    /// Picks random thresholds, re-detects on the held frame and exports.
    ///
    /// The new thresholds stay in effect afterwards.
    pub fn auto_generate<R: Rng + ?Sized>(
        &mut self,
        path: &Path,
        rng: &mut R,
    ) -> Result<ExportOutcome> {
        let (time_lo, time_hi) = self.thresholds.time_range();
        let (freq_lo, freq_hi) = self.thresholds.freq_range();
        let time = self.thresholds.set_time(rng.gen_range(time_lo..=time_hi));
        let freq = self.thresholds.set_freq(rng.gen_range(freq_lo..=freq_hi));
        log::info!("Auto-generate with time threshold {:.2}, freq threshold {:.2}", time, freq);

        self.detect();
        self.export(path, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::AbortReason;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn setup() -> (Transcriber, Arc<FrameExchange>) {
        let config = TranscriberConfig::default();
        let exchange = Arc::new(FrameExchange::new(2048, 1024));
        let thresholds = Arc::new(SharedThresholds::new(&config));
        let transcriber = Transcriber::new(config, Arc::clone(&exchange), thresholds);
        (transcriber, exchange)
    }

    #[test]
    fn test_tick_reports_fresh_frames() {
        let (mut transcriber, exchange) = setup();
        assert!(!transcriber.tick());

        exchange.publish(&vec![0.0; 2048], &vec![0.0; 1024]);
        assert!(transcriber.tick());
        assert!(!transcriber.tick());
    }

    #[test]
    fn test_threshold_change_applies_to_held_frame() {
        let (mut transcriber, exchange) = setup();
        let mut audio = vec![0.0; 2048];
        audio[10] = -0.5; // -32 in plot units
        exchange.publish(&audio, &vec![0.0; 1024]);

        transcriber.tick();
        assert_eq!(transcriber.time_markers().real_len(), 1);

        transcriber.thresholds().set_time(-40.0);
        transcriber.tick();
        assert!(transcriber.time_markers().is_empty());
    }

    #[test]
    fn test_export_of_silence_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("midi.mid");
        let (mut transcriber, exchange) = setup();
        exchange.publish(&vec![0.0; 2048], &vec![0.0; 1024]);
        transcriber.tick();

        let outcome = transcriber.export(&path, &mut Pcg32::seed_from_u64(0)).unwrap();
        assert!(matches!(
            outcome,
            ExportOutcome::Aborted { reason: AbortReason::NoNotes, .. }
        ));
        assert!(path.exists());
    }

    #[test]
    fn test_auto_generate_keeps_thresholds_in_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("midi.mid");
        let (mut transcriber, _) = setup();
        let mut rng = Pcg32::seed_from_u64(9);

        for _ in 0..20 {
            transcriber.auto_generate(&path, &mut rng).unwrap();
            let t = transcriber.thresholds().load();
            assert!((-64.0..=64.0).contains(&t.time));
            assert!((0.0..=128.0).contains(&t.freq));
        }
    }
}
