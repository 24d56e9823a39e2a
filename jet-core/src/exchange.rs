//! # Frame Exchange Module
//!
//! The single synchronization point between the capture callback and the
//! consumer loop. The capture side publishes a normalized audio frame together
//! with its spectrum; the consumer copies out the latest complete pair.
//!
//! Both sides hold the lock only while copying buffers. Analysis never runs
//! under it.

use std::sync::{Mutex, MutexGuard};

/// An audio frame and the spectrum derived from it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FramePair {
    /// Normalized samples in [-1, 1].
    pub audio: Vec<f32>,
    /// Normalized spectrum bins in [0, 1].
    pub spectrum: Vec<f32>,
    /// Number of the publish call that produced this pair. Zero means nothing
    /// has been published yet.
    pub sequence: u64,
}

impl FramePair {
    /// An all-zero pair of the given sizes.
    pub fn silent(frame_len: usize, bin_count: usize) -> Self {
        Self {
            audio: vec![0.0; frame_len],
            spectrum: vec![0.0; bin_count],
            sequence: 0,
        }
    }
}

/// Holds the most recently published [`FramePair`].
#[derive(Debug)]
pub struct FrameExchange {
    latest: Mutex<FramePair>,
}

impl FrameExchange {
    /// Creates an exchange pre-sized so steady-state publishes never allocate.
    pub fn new(frame_len: usize, bin_count: usize) -> Self {
        Self {
            latest: Mutex::new(FramePair::silent(frame_len, bin_count)),
        }
    }

    // A panic on the other side can only interrupt a plain copy, so the
    // buffers are still usable.
    fn lock(&self) -> MutexGuard<'_, FramePair> {
        self.latest.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replaces the held pair with copies of `audio` and `spectrum`.
    ///
    /// Called from the capture context. Only reallocates if the frame sizes
    /// changed since the last publish.
    pub fn publish(&self, audio: &[f32], spectrum: &[f32]) {
        let mut latest = self.lock();
        copy_resizing(&mut latest.audio, audio);
        copy_resizing(&mut latest.spectrum, spectrum);
        latest.sequence += 1;
    }

    /// Copies the latest pair into `dst`, reusing its allocations.
    ///
    /// Never waits for a new frame. Returns `true` if the pair is newer than
    /// what `dst` held before.
    pub fn snapshot_into(&self, dst: &mut FramePair) -> bool {
        let latest = self.lock();
        let fresh = latest.sequence != dst.sequence;
        dst.audio.clone_from(&latest.audio);
        dst.spectrum.clone_from(&latest.spectrum);
        dst.sequence = latest.sequence;
        fresh
    }

    /// Returns a copy of the latest pair.
    pub fn snapshot(&self) -> FramePair {
        self.lock().clone()
    }

    /// Sequence number of the latest publish.
    pub fn sequence(&self) -> u64 {
        self.lock().sequence
    }
}

fn copy_resizing(dst: &mut Vec<f32>, src: &[f32]) {
    if dst.len() == src.len() {
        dst.copy_from_slice(src);
    } else {
        dst.clear();
        dst.extend_from_slice(src);
    }
}
