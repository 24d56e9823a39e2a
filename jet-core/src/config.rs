//! # Configuration Module
//!
//! Everything the pipeline reads at startup: capture format, detection
//! thresholds, sequencing limits and the output path. Values come from an
//! optional TOML file; every key has a default so an empty file is valid.
//!
//! The thresholds and the max note length are also adjustable while the
//! pipeline runs. Those live in [`SharedThresholds`], which the consumer reads
//! every tick and the control surface writes whenever it likes.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use crate::error::{JetError, Result};
use crate::sequencer::MAX_NOTE_TICKS;

/// Smallest and largest capture frame the pipeline accepts.
pub const MIN_BUFFER_SIZE: usize = 2048;
pub const MAX_BUFFER_SIZE: usize = 16384;

/// Top-level configuration, usually loaded from `audio-jet.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriberConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub sequencing: SequencingConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    /// Index into the enumerated input device list. `None` uses the host default.
    #[serde(default)]
    pub device_index: Option<usize>,
}

/// Which side of the threshold counts as a time-domain peak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeTrigger {
    /// `sample * scale < threshold`
    #[default]
    Below,
    /// `sample * scale > threshold`
    Above,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Maximum number of samples (or bins) a detector scans per frame.
    #[serde(default = "default_analysis_window")]
    pub analysis_window: usize,
    /// Full height of the plotting scale the thresholds are expressed in.
    #[serde(default = "default_plot_scale")]
    pub plot_scale: f32,
    #[serde(default = "default_time_threshold")]
    pub time_threshold: f32,
    #[serde(default = "default_freq_threshold")]
    pub freq_threshold: f32,
    #[serde(default)]
    pub time_trigger: TimeTrigger,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SequencingConfig {
    #[serde(default = "default_max_note_ticks")]
    pub max_note_ticks: u32,
    /// Seed for the note/duration shuffle. `None` seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_path")]
    pub path: PathBuf,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            buffer_size: default_buffer_size(),
            device_index: None,
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            analysis_window: default_analysis_window(),
            plot_scale: default_plot_scale(),
            time_threshold: default_time_threshold(),
            freq_threshold: default_freq_threshold(),
            time_trigger: TimeTrigger::default(),
        }
    }
}

impl Default for SequencingConfig {
    fn default() -> Self {
        Self {
            max_note_ticks: default_max_note_ticks(),
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: default_output_path(),
        }
    }
}

fn default_sample_rate() -> u32 { 44100 }
fn default_buffer_size() -> usize { MIN_BUFFER_SIZE }
fn default_analysis_window() -> usize { 1024 }
fn default_plot_scale() -> f32 { 128.0 }
fn default_time_threshold() -> f32 { -20.0 }
fn default_freq_threshold() -> f32 { 100.0 }
fn default_max_note_ticks() -> u32 { 384 }

fn default_output_path() -> PathBuf {
    match dirs::data_dir() {
        Some(dir) => dir.join("audio-jet").join("midi.mid"),
        None => PathBuf::from("midi.mid"),
    }
}

impl TranscriberConfig {
    /// Loads and validates a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TranscriberConfig = toml::from_str(&content)?;
        config.validate()?;
        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Checks that every value is usable by the pipeline.
    pub fn validate(&self) -> Result<()> {
        if self.audio.sample_rate == 0 {
            return Err(JetError::invalid_config("audio.sample_rate", "must be positive"));
        }
        if !(MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE).contains(&self.audio.buffer_size) {
            return Err(JetError::invalid_config(
                "audio.buffer_size",
                format!(
                    "{} is outside {}..={}",
                    self.audio.buffer_size, MIN_BUFFER_SIZE, MAX_BUFFER_SIZE
                ),
            ));
        }
        if self.detection.analysis_window == 0 {
            return Err(JetError::invalid_config("detection.analysis_window", "must be positive"));
        }
        if !(self.detection.plot_scale.is_finite() && self.detection.plot_scale > 0.0) {
            return Err(JetError::invalid_config(
                "detection.plot_scale",
                "must be positive and finite",
            ));
        }
        if !(1..=MAX_NOTE_TICKS).contains(&self.sequencing.max_note_ticks) {
            return Err(JetError::invalid_config(
                "sequencing.max_note_ticks",
                format!("{} is outside 1..={}", self.sequencing.max_note_ticks, MAX_NOTE_TICKS),
            ));
        }
        Ok(())
    }

    /// Duration of one capture frame in milliseconds.
    pub fn chunk_time_ms(&self) -> f32 {
        (self.audio.buffer_size as f32 * 1000.0) / self.audio.sample_rate as f32
    }

    /// Scale applied to time-domain samples before thresholding.
    pub fn time_scale(&self) -> f32 {
        self.detection.plot_scale / 2.0
    }

    /// Scale applied to spectrum bins before thresholding.
    pub fn freq_scale(&self) -> f32 {
        self.detection.plot_scale
    }
}

/// A snapshot of the live-adjustable detection parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub time: f32,
    pub freq: f32,
    pub max_note_ticks: u32,
}

/// Thresholds shared between the control surface and the consumer loop.
///
/// Each field is an independent relaxed atomic. A reader may see a mix of old
/// and new values for one tick, which only changes that tick's peak count.
#[derive(Debug)]
pub struct SharedThresholds {
    time: AtomicU32,
    freq: AtomicU32,
    max_note_ticks: AtomicU32,
    plot_scale: f32,
}

impl SharedThresholds {
    pub fn new(config: &TranscriberConfig) -> Self {
        let shared = Self {
            time: AtomicU32::new(0),
            freq: AtomicU32::new(0),
            max_note_ticks: AtomicU32::new(0),
            plot_scale: config.detection.plot_scale,
        };
        shared.set_time(config.detection.time_threshold);
        shared.set_freq(config.detection.freq_threshold);
        shared.set_max_note_ticks(config.sequencing.max_note_ticks);
        shared
    }

    pub fn load(&self) -> Thresholds {
        Thresholds {
            time: f32::from_bits(self.time.load(Ordering::Relaxed)),
            freq: f32::from_bits(self.freq.load(Ordering::Relaxed)),
            max_note_ticks: self.max_note_ticks.load(Ordering::Relaxed),
        }
    }

    /// Valid range of the time threshold: half the plot scale either side of zero.
    pub fn time_range(&self) -> (f32, f32) {
        (-self.plot_scale / 2.0, self.plot_scale / 2.0)
    }

    /// Valid range of the frequency threshold.
    pub fn freq_range(&self) -> (f32, f32) {
        (0.0, self.plot_scale)
    }

    /// Sets the time threshold, clamped into [`Self::time_range`]. Returns the stored value.
    pub fn set_time(&self, value: f32) -> f32 {
        let (lo, hi) = self.time_range();
        let value = value.clamp(lo, hi);
        self.time.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    /// Sets the frequency threshold, clamped into [`Self::freq_range`]. Returns the stored value.
    pub fn set_freq(&self, value: f32) -> f32 {
        let (lo, hi) = self.freq_range();
        let value = value.clamp(lo, hi);
        self.freq.store(value.to_bits(), Ordering::Relaxed);
        value
    }

    /// Sets the longest note the sequencer may emit, clamped to
    /// `1..=MAX_NOTE_TICKS`. Returns the stored value.
    pub fn set_max_note_ticks(&self, ticks: u32) -> u32 {
        let ticks = ticks.clamp(1, MAX_NOTE_TICKS);
        self.max_note_ticks.store(ticks, Ordering::Relaxed);
        ticks
    }
}
