//! # Sequencer Module
//!
//! Pairs detected pitches with durations taken from the gaps between detected
//! time peaks and lays the resulting notes end to end on a 384 PPQN grid.
//!
//! The pairing is random: the real entries of both lists are
//! shuffled independently before pairing. Pass a seeded generator to get the
//! same file twice.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::peaks::{EventList, MidiNotes, TimeMarkers};

/// Shortest note the interval mapping produces, in ticks.
pub const MIN_NOTE_TICKS: u32 = 47;

/// Note lengths are rounded up to a multiple of this many ticks.
pub const QUANTUM_TICKS: u32 = 96;

/// Longest note the interval mapping may produce, in ticks (160 quarter notes).
/// A multiple of [`QUANTUM_TICKS`].
pub const MAX_NOTE_TICKS: u32 = 61_440;

/// Velocity used for every emitted note.
pub const NOTE_VELOCITY: u8 = 127;

/// One scheduled note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotePair {
    pub pitch: u8,
    pub velocity: u8,
    pub on_step: u32,
    pub off_step: u32,
}

impl NotePair {
    pub fn duration(&self) -> u32 {
        self.off_step - self.on_step
    }
}

/// Timing inputs for [`build_note_pairs`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SequenceParams {
    /// Length of one capture frame in ms; intervals are mapped from `[0, chunk_time_ms]`.
    pub chunk_time_ms: f32,
    /// Upper end of the duration range in ticks.
    pub max_note_ticks: u32,
}

/// Why no notes could be sequenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    NoNotes,
    NoTimeMarkers,
    /// The notes laid end to end run past the last representable tick.
    TickOverflow,
}

impl std::fmt::Display for AbortReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbortReason::NoNotes => write!(f, "no frequency peaks detected"),
            AbortReason::NoTimeMarkers => write!(f, "no time peaks detected"),
            AbortReason::TickOverflow => write!(f, "note track is longer than the tick range"),
        }
    }
}

/// Rounds `value` up to the next multiple of `multiple`. A zero multiple
/// leaves the value unchanged. `None` when the result does not fit in a `u32`.
pub fn round_up(value: u32, multiple: u32) -> Option<u32> {
    if multiple == 0 {
        return Some(value);
    }
    match value % multiple {
        0 => Some(value),
        remainder => value.checked_add(multiple - remainder),
    }
}

/// Linearly maps `value` from `[in_min, in_max]` onto `[out_min, out_max]`,
/// clamping the result to the output range.
pub fn map_clamped(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    let (lo, hi) = if out_min <= out_max { (out_min, out_max) } else { (out_max, out_min) };
    if (in_max - in_min).abs() < f32::EPSILON {
        return lo;
    }
    let mapped = out_min + (value - in_min) / (in_max - in_min) * (out_max - out_min);
    if mapped.is_nan() { lo } else { mapped.clamp(lo, hi) }
}

/// Duration in ticks for a gap of `interval_ms` between two time peaks.
///
/// `max_note_ticks` is capped at [`MAX_NOTE_TICKS`].
pub fn interval_to_ticks(interval_ms: f32, params: &SequenceParams) -> u32 {
    let max_ticks = params.max_note_ticks.min(MAX_NOTE_TICKS);
    let mapped = map_clamped(
        interval_ms,
        0.0,
        params.chunk_time_ms,
        MIN_NOTE_TICKS as f32,
        max_ticks as f32,
    );
    let ticks = mapped.round() as u32;
    round_up(ticks, QUANTUM_TICKS).unwrap_or(ticks)
}

/// Shuffles the real entries of `list`, leaving the sentinel at index 0.
pub fn shuffle_real<T, R: Rng + ?Sized>(list: &mut EventList<T>, rng: &mut R) {
    list.real_mut().shuffle(rng);
}

/// Builds note pairs from detected pitches and time peaks.
///
/// Both lists are taken by value because their real entries are shuffled in
/// place before pairing. For `i` in `1..min(len)`, note `i` gets the pitch
/// `notes[i]` and a duration derived from `|markers[i] - markers[i - 1]|`.
/// Notes follow each other without gaps, starting at tick 0.
///
/// # Returns
/// * `Ok(pairs)` - At least one note pair
/// * `Err(AbortReason)` - One of the lists has no real entries, or the
///   track would end past `u32::MAX` ticks
pub fn build_note_pairs<R: Rng + ?Sized>(
    mut notes: MidiNotes,
    mut markers: TimeMarkers,
    params: &SequenceParams,
    rng: &mut R,
) -> Result<Vec<NotePair>, AbortReason> {
    if notes.is_empty() {
        return Err(AbortReason::NoNotes);
    }
    if markers.is_empty() {
        return Err(AbortReason::NoTimeMarkers);
    }

    shuffle_real(&mut notes, rng);
    shuffle_real(&mut markers, rng);

    let count = notes.len().min(markers.len());
    let mut pairs = Vec::with_capacity(count - 1);
    let mut offset = 0u32;
    for i in 1..count {
        let interval = (markers[i] - markers[i - 1]).abs();
        let ticks = interval_to_ticks(interval, params);
        let off_step = offset.checked_add(ticks).ok_or(AbortReason::TickOverflow)?;
        pairs.push(NotePair {
            pitch: notes[i],
            velocity: NOTE_VELOCITY,
            on_step: offset,
            off_step,
        });
        offset = off_step;
    }
    Ok(pairs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn params() -> SequenceParams {
        SequenceParams { chunk_time_ms: 46.0, max_note_ticks: 384 }
    }

    #[test]
    fn test_round_up_properties() {
        for x in 0..1000u32 {
            let r = round_up(x, 96).unwrap();
            assert_eq!(r % 96, 0);
            assert!(r >= x);
            assert!(r < x + 96);
            assert_eq!(round_up(x, 0), Some(x));
        }
        assert_eq!(round_up(194, 96), Some(288));
        assert_eq!(round_up(192, 96), Some(192));
    }

    #[test]
    fn test_round_up_near_u32_max() {
        // u32::MAX % 96 == 63
        assert_eq!(round_up(u32::MAX, 96), None);
        assert_eq!(round_up(u32::MAX - 63, 96), Some(u32::MAX - 63));
        assert_eq!(round_up(u32::MAX, 0), Some(u32::MAX));
    }

    #[test]
    fn test_huge_max_note_ticks_is_capped() {
        let params = SequenceParams { chunk_time_ms: 46.0, max_note_ticks: u32::MAX };
        assert_eq!(interval_to_ticks(500.0, &params), MAX_NOTE_TICKS);
        assert_eq!(MAX_NOTE_TICKS % QUANTUM_TICKS, 0);
    }

    #[test]
    fn test_long_tracks_do_not_overflow() {
        let notes: MidiNotes = (40..80).collect();
        let markers: TimeMarkers = (0..40).map(|i| i as f32 * 10.0).collect();
        let params = SequenceParams { chunk_time_ms: 10.0, max_note_ticks: 200_000_000 };
        let pairs = build_note_pairs(notes, markers, &params, &mut Pcg32::seed_from_u64(3)).unwrap();

        assert_eq!(pairs.len(), 39);
        for pair in &pairs {
            assert!(pair.off_step > pair.on_step);
            assert!(pair.duration() <= MAX_NOTE_TICKS);
        }
    }

    #[test]
    fn test_track_past_tick_range_aborts() {
        // 70_000 notes of 61_440 ticks end past u32::MAX
        let notes: MidiNotes = std::iter::repeat(60).take(70_001).collect();
        let markers: TimeMarkers = (0..70_001).map(|i| i as f32 * 10.0).collect();
        let params = SequenceParams { chunk_time_ms: 10.0, max_note_ticks: MAX_NOTE_TICKS };
        assert_eq!(
            build_note_pairs(notes, markers, &params, &mut Pcg32::seed_from_u64(0)),
            Err(AbortReason::TickOverflow)
        );
    }

    #[test]
    fn test_map_clamped() {
        assert!((map_clamped(20.0, 0.0, 46.0, 47.0, 384.0) - 193.52).abs() < 0.01);
        assert_eq!(map_clamped(100.0, 0.0, 46.0, 47.0, 384.0), 384.0);
        assert_eq!(map_clamped(-5.0, 0.0, 46.0, 47.0, 384.0), 47.0);
        assert_eq!(map_clamped(3.0, 0.0, 0.0, 47.0, 384.0), 47.0);
    }

    #[test]
    fn test_interval_longer_than_chunk_is_clamped() {
        // 384 is already a multiple of 96
        assert_eq!(interval_to_ticks(500.0, &params()), 384);
        assert_eq!(interval_to_ticks(0.0, &params()), 96);
    }

    #[test]
    fn test_two_note_scenario() {
        let notes: MidiNotes = [64].into_iter().collect();
        let markers: TimeMarkers = [20.0].into_iter().collect();
        assert_eq!(notes.as_slice(), &[0, 64]);

        let mut rng = Pcg32::seed_from_u64(0);
        let pairs = build_note_pairs(notes, markers, &params(), &mut rng).unwrap();
        assert_eq!(
            pairs,
            vec![NotePair { pitch: 64, velocity: 127, on_step: 0, off_step: 288 }]
        );
    }

    #[test]
    fn test_empty_inputs_abort() {
        let mut rng = Pcg32::seed_from_u64(0);
        let some_notes: MidiNotes = [60].into_iter().collect();
        let some_markers: TimeMarkers = [1.0].into_iter().collect();

        assert_eq!(
            build_note_pairs(MidiNotes::new(), some_markers, &params(), &mut rng),
            Err(AbortReason::NoNotes)
        );
        assert_eq!(
            build_note_pairs(some_notes, TimeMarkers::new(), &params(), &mut rng),
            Err(AbortReason::NoTimeMarkers)
        );
    }

    #[test]
    fn test_pairs_follow_each_other() {
        let notes: MidiNotes = [60, 62, 64, 65, 67].into_iter().collect();
        let markers: TimeMarkers = [1.0, 5.0, 12.0].into_iter().collect();
        let mut rng = Pcg32::seed_from_u64(11);
        let pairs = build_note_pairs(notes, markers, &params(), &mut rng).unwrap();

        // min(6, 4) - 1 pairs
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].on_step, 0);
        for w in pairs.windows(2) {
            assert_eq!(w[0].off_step, w[1].on_step);
        }
        for pair in &pairs {
            assert_eq!(pair.duration() % QUANTUM_TICKS, 0);
            assert!(pair.duration() <= 384);
            assert!([60, 62, 64, 65, 67].contains(&pair.pitch));
        }
    }

    #[test]
    fn test_shuffle_keeps_sentinel_and_is_seedable() {
        let base: MidiNotes = (1..=40).collect();

        let mut a = base.clone();
        let mut b = base.clone();
        shuffle_real(&mut a, &mut Pcg32::seed_from_u64(5));
        shuffle_real(&mut b, &mut Pcg32::seed_from_u64(5));
        assert_eq!(a, b);
        assert_eq!(a[0], 0);

        let mut sorted = a.real().to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, base.real().to_vec());
    }
}
