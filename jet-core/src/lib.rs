// jet-core/src/lib.rs

//! The core logic for the Audio JET transcriber.
//! This crate is responsible for audio capture, spectral analysis, peak
//! detection and MIDI sequencing. It is completely headless
//! and contains no UI code.
//!
//! Data flows capture → normalize → analyze → exchange → detect → sequence → file.
//! The capture half runs inside the audio callback ([`capture::CaptureBridge`]);
//! the rest runs on the consumer thread ([`pipeline::Transcriber`]).

pub mod audio;
pub mod capture;
pub mod config;
pub mod error;
pub mod exchange;
pub mod export;
pub mod fft;
pub mod midi;
pub mod peaks;
pub mod pipeline;
pub mod sequencer;
pub mod signal;

pub use capture::{CaptureBridge, CaptureControls, CaptureMode};
pub use config::{SharedThresholds, Thresholds, TimeTrigger, TranscriberConfig};
pub use error::{JetError, Result};
pub use exchange::{FrameExchange, FramePair};
pub use export::ExportOutcome;
pub use peaks::{MidiNotes, TimeMarkers};
pub use pipeline::Transcriber;
pub use sequencer::NotePair;
