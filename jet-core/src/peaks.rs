//! # Peak Detection Module
//!
//! Two threshold detectors run over the latest snapshot every tick:
//!
//! - time domain: samples past the time threshold become [`TimeMarkers`]
//!   (milliseconds since frame start)
//! - frequency domain: bins above the frequency threshold become
//!   [`MidiNotes`] via a log-frequency pitch mapping
//!
//! Both are pure functions and rebuild their list from scratch. Comparisons
//! are strict and there is no debouncing: every sample or bin past the
//! threshold is its own event, in scan order.

use serde::Serialize;

use crate::config::TimeTrigger;

/// An ordered event list whose index 0 is a reserved sentinel.
///
/// The sentinel holds `T::default()` and is always present. Real events start
/// at index 1 and are never mixed with it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EventList<T> {
    events: Vec<T>,
}

/// MIDI pitches from the frequency detector.
pub type MidiNotes = EventList<u8>;

/// Peak times in milliseconds from the time detector.
pub type TimeMarkers = EventList<f32>;

impl<T: Default> Default for EventList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> EventList<T> {
    /// A list holding only the sentinel.
    pub fn new() -> Self {
        Self {
            events: vec![T::default()],
        }
    }

    /// Drops every real event, keeping the sentinel.
    pub fn clear(&mut self) {
        self.events.truncate(1);
    }
}

impl<T> EventList<T> {
    /// Appends a real event after the existing ones.
    pub fn push(&mut self, event: T) {
        self.events.push(event);
    }

    /// Length including the sentinel.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Number of real events.
    pub fn real_len(&self) -> usize {
        self.events.len() - 1
    }

    /// Whether there are no real events.
    pub fn is_empty(&self) -> bool {
        self.real_len() == 0
    }

    /// The whole list, sentinel first.
    pub fn as_slice(&self) -> &[T] {
        &self.events
    }

    /// The real events, without the sentinel.
    pub fn real(&self) -> &[T] {
        &self.events[1..]
    }

    /// Mutable access to the real events only, e.g. for shuffling.
    pub fn real_mut(&mut self) -> &mut [T] {
        &mut self.events[1..]
    }
}

impl<T: Default> FromIterator<T> for EventList<T> {
    /// Builds a list whose real events are the iterator's items.
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut list = Self::new();
        list.events.extend(iter);
        list
    }
}

impl<T> std::ops::Index<usize> for EventList<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.events[index]
    }
}

/// Settings shared by both detectors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectorParams {
    pub sample_rate: u32,
    /// Upper bound on how many samples or bins are scanned.
    pub analysis_window: usize,
    pub time_trigger: TimeTrigger,
}

/// Converts a sample index to milliseconds since the frame start.
pub fn sample_to_ms(index: usize, sample_rate: u32) -> f32 {
    (index as f64 / sample_rate as f64 * 1000.0) as f32
}

/// Center frequency of spectrum bin `index` out of `bin_count` bins.
pub fn bin_to_frequency(index: usize, bin_count: usize, sample_rate: u32) -> f32 {
    if bin_count == 0 {
        return 0.0;
    }
    (sample_rate as f32 / 2.0) / bin_count as f32 * index as f32
}

/// Maps a frequency to the nearest MIDI pitch (A4 = 440 Hz = 69).
///
/// Returns `None` when the pitch falls outside 1..=127, which includes 0 Hz
/// and anything below C#-1.
pub fn frequency_to_midi(frequency: f32) -> Option<u8> {
    if !(frequency > 0.0) {
        return None;
    }
    let pitch = (12.0 * (frequency / 440.0).log2() + 69.0).round();
    if pitch > 0.0 && pitch <= 127.0 {
        Some(pitch as u8)
    } else {
        None
    }
}

/// Finds time-domain peaks in `buffer`.
///
/// A sample is a peak when `sample * scale` is strictly past `threshold` in
/// the direction given by `params.time_trigger`. Only the first
/// `params.analysis_window` samples are scanned.
///
/// # Arguments
/// * `buffer` - Normalized audio frame
/// * `scale` - Multiplier bringing samples into threshold units
/// * `threshold` - Trigger level in the same units
/// * `params` - Sample rate, scan window and trigger direction
///
/// # Returns
/// * `TimeMarkers` - Peak times in ms, in scan order, after the sentinel
pub fn detect_time_peaks(
    buffer: &[f32],
    scale: f32,
    threshold: f32,
    params: &DetectorParams,
) -> TimeMarkers {
    buffer
        .iter()
        .take(params.analysis_window)
        .enumerate()
        .filter(|&(_, &sample)| {
            let value = sample * scale;
            match params.time_trigger {
                TimeTrigger::Below => value < threshold,
                TimeTrigger::Above => value > threshold,
            }
        })
        .map(|(i, _)| sample_to_ms(i, params.sample_rate))
        .collect()
}

/// Finds frequency-domain peaks in `bins` and converts them to MIDI pitches.
///
/// A bin is a peak when `|bin * scale|` is strictly above `threshold`. Only
/// the first `params.analysis_window` bins are scanned, but bin frequencies
/// are always computed against the full spectrum length. Peaks whose pitch
/// falls outside the MIDI range are dropped.
///
/// # Returns
/// * `MidiNotes` - Pitches in scan order, after the sentinel
pub fn detect_frequency_peaks(
    bins: &[f32],
    scale: f32,
    threshold: f32,
    params: &DetectorParams,
) -> MidiNotes {
    let bin_count = bins.len();
    bins.iter()
        .take(params.analysis_window)
        .enumerate()
        .filter(|&(_, &bin)| (bin * scale).abs() > threshold)
        .filter_map(|(i, _)| {
            frequency_to_midi(bin_to_frequency(i, bin_count, params.sample_rate))
        })
        .collect()
}
