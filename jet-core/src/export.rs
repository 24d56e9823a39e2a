//! # Export Module
//!
//! Turns the current peak lists into a MIDI file on disk.
//!
//! Every export starts by clearing the destination, so an aborted export
//! leaves an empty file behind rather than the previous take. An export with
//! nothing to sequence is reported as [`ExportOutcome::Aborted`]; only I/O
//! and encoding problems are errors.

use rand::Rng;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::midi::MidiFile;
use crate::peaks::{MidiNotes, TimeMarkers};
use crate::sequencer::{self, AbortReason, NotePair, SequenceParams};

/// How an export attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportOutcome {
    /// Notes were written to `path`.
    Written { path: PathBuf, pairs: Vec<NotePair> },
    /// Nothing to write; the file at `path` was cleared.
    Aborted { path: PathBuf, reason: AbortReason },
}

impl ExportOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, ExportOutcome::Written { .. })
    }

    pub fn path(&self) -> &Path {
        match self {
            ExportOutcome::Written { path, .. } | ExportOutcome::Aborted { path, .. } => path,
        }
    }
}

impl fmt::Display for ExportOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportOutcome::Written { path, pairs } => {
                let ticks = pairs.last().map_or(0, |p| p.off_step);
                write!(f, "exported {} notes ({} ticks) to {}", pairs.len(), ticks, path.display())
            }
            ExportOutcome::Aborted { path, reason } => {
                write!(f, "export aborted: {}; {} cleared", reason, path.display())
            }
        }
    }
}

/// Replaces the file at `path` with an empty MIDI file.
pub fn clear_midi_file(path: &Path) -> Result<()> {
    MidiFile::new().save(path)
}

/// Clears `path`, sequences the peak lists and writes the result.
///
/// # Arguments
/// * `path` - Destination file
/// * `notes` - Detected pitches (sentinel first)
/// * `markers` - Detected time peaks (sentinel first)
/// * `params` - Chunk time and max note length
/// * `rng` - Source for the pitch/duration shuffle
///
/// # Returns
/// * `Ok(ExportOutcome)` - Written, or aborted because a list was empty
/// * `Err(JetError)` - The file could not be written
pub fn export_midi_file<R: Rng + ?Sized>(
    path: &Path,
    notes: &MidiNotes,
    markers: &TimeMarkers,
    params: &SequenceParams,
    rng: &mut R,
) -> Result<ExportOutcome> {
    clear_midi_file(path)?;

    let pairs = match sequencer::build_note_pairs(notes.clone(), markers.clone(), params, rng) {
        Ok(pairs) => pairs,
        Err(reason) => {
            log::warn!("Export aborted: {}", reason);
            return Ok(ExportOutcome::Aborted { path: path.to_path_buf(), reason });
        }
    };

    let mut file = MidiFile::new();
    for pair in &pairs {
        file.add_note_on(pair.pitch, pair.velocity, pair.on_step);
        file.add_note_off(pair.pitch, pair.velocity, pair.off_step);
    }
    file.save(path)?;

    for pair in &pairs {
        log::debug!("note {} on {} off {}", pair.pitch, pair.on_step, pair.off_step);
    }
    log::info!("Exported {} notes to {}", pairs.len(), path.display());
    Ok(ExportOutcome::Written { path: path.to_path_buf(), pairs })
}
