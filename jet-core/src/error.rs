//! Error types for the transcription pipeline.
//!
//! Only resource and configuration failures are errors. Degenerate input
//! (silent frames, empty peak lists) is reported through ordinary return
//! values such as [`crate::export::ExportOutcome`].

use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, JetError>;

/// Errors that can occur while capturing, configuring or exporting.
#[derive(Debug, Error)]
pub enum JetError {
    /// I/O error while reading a config or persisting a MIDI file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A note or delta time does not fit the MIDI wire format.
    #[error("MIDI encoding error: {0}")]
    Midi(String),

    /// A configuration value is outside its allowed range.
    #[error("invalid configuration '{name}': {message}")]
    InvalidConfig {
        /// Config key.
        name: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// The config file is not valid TOML for [`crate::config::TranscriberConfig`].
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// The audio host has no input device at all.
    #[error("no audio input device available")]
    NoInputDevice,

    /// Device enumeration or configuration failed.
    #[error("audio device error: {0}")]
    Device(String),

    /// Building, starting or stopping the capture stream failed.
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl JetError {
    pub(crate) fn invalid_config(name: &'static str, message: impl Into<String>) -> Self {
        JetError::InvalidConfig {
            name,
            message: message.into(),
        }
    }
}

