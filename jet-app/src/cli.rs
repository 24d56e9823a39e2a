use clap::{Parser, ValueEnum};
use jet_core::CaptureMode;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "audio-jet", about = "Live audio to MIDI transcriber")]
pub struct Cli {
    /// Config file (TOML). Defaults to ./audio-jet.toml when present.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Input device index (see --list-devices)
    #[arg(short, long)]
    pub device: Option<usize>,

    /// MIDI file written on export
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Samples per capture frame (2048-16384)
    #[arg(long)]
    pub buffer_size: Option<usize>,

    /// Preferred capture sample rate in Hz
    #[arg(long)]
    pub sample_rate: Option<u32>,

    /// Seed for the note shuffle and noise generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Signal source at startup
    #[arg(long, value_enum, default_value_t = ModeArg::Live)]
    pub mode: ModeArg,

    /// Tone frequency as a fraction of Nyquist (used with --mode tone)
    #[arg(long, default_value_t = 0.02)]
    pub tone: f32,

    /// Export once after this many seconds, then exit
    #[arg(long)]
    pub export_after: Option<f64>,

    /// List available input devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModeArg {
    Live,
    Noise,
    Tone,
}

impl From<ModeArg> for CaptureMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Live => CaptureMode::Live,
            ModeArg::Noise => CaptureMode::Noise,
            ModeArg::Tone => CaptureMode::Tone,
        }
    }
}
