//! # MIDI File Module
//!
//! A small note-event collector that serializes to a standard MIDI file:
//! format 0, one track, 384 ticks per quarter note, fixed 120 BPM tempo,
//! everything on channel 0.
//!
//! Files are written to a temporary file next to the destination and then
//! renamed over it, so readers never see a half-written file.

use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::io::Write;
use std::path::Path;

use crate::error::{JetError, Result};

/// Resolution of the sequencing grid.
pub const TICKS_PER_QUARTER: u16 = 384;

/// Microseconds per quarter note (120 BPM).
pub const TEMPO_US_PER_QUARTER: u32 = 500_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NoteEdge {
    Off,
    On,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct NoteEvent {
    tick: u32,
    edge: NoteEdge,
    pitch: u8,
    velocity: u8,
}

/// Note events waiting to be written, stored at absolute tick positions.
#[derive(Debug, Clone, Default)]
pub struct MidiFile {
    events: Vec<NoteEvent>,
}

impl MidiFile {
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes all notes. Saving afterwards writes an empty (but valid) file.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Number of note-on and note-off events held.
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    pub fn add_note_on(&mut self, pitch: u8, velocity: u8, tick: u32) {
        self.events.push(NoteEvent { tick, edge: NoteEdge::On, pitch, velocity });
    }

    pub fn add_note_off(&mut self, pitch: u8, velocity: u8, tick: u32) {
        self.events.push(NoteEvent { tick, edge: NoteEdge::Off, pitch, velocity });
    }

    /// Encodes the file. Events are ordered by tick, with note-offs ahead of
    /// note-ons on the same tick so back-to-back notes do not cut each other.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut events = self.events.clone();
        events.sort_by_key(|e| (e.tick, e.edge == NoteEdge::On));

        let mut track = Vec::with_capacity(events.len() + 2);
        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(TEMPO_US_PER_QUARTER))),
        });

        let mut last_tick = 0u32;
        for event in &events {
            let delta = u28::try_from(event.tick - last_tick)
                .ok_or_else(|| JetError::Midi(format!("delta {} too large", event.tick - last_tick)))?;
            let key = u7::try_from(event.pitch)
                .ok_or_else(|| JetError::Midi(format!("pitch {} out of range", event.pitch)))?;
            let vel = u7::try_from(event.velocity)
                .ok_or_else(|| JetError::Midi(format!("velocity {} out of range", event.velocity)))?;
            let message = match event.edge {
                NoteEdge::On => MidiMessage::NoteOn { key, vel },
                NoteEdge::Off => MidiMessage::NoteOff { key, vel },
            };
            track.push(TrackEvent {
                delta,
                kind: TrackEventKind::Midi { channel: u4::new(0), message },
            });
            last_tick = event.tick;
        }

        track.push(TrackEvent {
            delta: u28::new(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let mut smf = Smf::new(Header::new(
            Format::SingleTrack,
            Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
        ));
        smf.tracks.push(track);

        let mut bytes = Vec::new();
        smf.write_std(&mut bytes)?;
        Ok(bytes)
    }

    /// Writes the file to `path`, replacing whatever was there.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.flush()?;
        tmp.persist(path).map_err(|e| JetError::Io(e.error))?;
        Ok(())
    }
}
