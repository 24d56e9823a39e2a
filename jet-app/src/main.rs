//! # Audio JET - Live Audio to MIDI
//!
//! Headless front end for the transcriber. It owns the capture stream, runs
//! the consumer loop and turns console commands into pipeline actions.
//!
//! ## Architecture
//! - **Audio Thread**: cpal callback running the capture bridge
//! - **Main Thread**: 60 FPS tick loop snapshotting frames and detecting peaks
//! - **Console Thread**: stdin reader sending commands over a crossbeam channel
//! - **Exports**: run on the main thread, never inside the audio callback

mod cli;
mod console;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{select, Receiver};
use jet_core::audio::{self, CaptureStream};
use jet_core::{
    export, CaptureBridge, CaptureControls, CaptureMode, FrameExchange, SharedThresholds,
    Transcriber, TranscriberConfig,
};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cli::Cli;

// Consumer loop cadence
const TICK_INTERVAL: Duration = Duration::from_millis(16);
const DEFAULT_CONFIG_FILE: &str = "audio-jet.toml";

/// Everything the main loop reacts to.
#[derive(Debug, Clone)]
pub enum Message {
    // Signal source (keys m / n / s)
    SetMode(CaptureMode),
    SetTone(f32),              // Tone control, fraction of Nyquist

    // Stream control
    TogglePause,

    // Output
    Export,                    // Export the current peaks
    AutoGenerate,              // Random thresholds, then export
    Show,                      // Log current notes and markers
    Dump(PathBuf),             // Write notes and markers as JSON

    // Live thresholds
    SetTimeThreshold(f32),
    SetFreqThreshold(f32),
    SetMaxNoteTicks(u32),

    ListDevices,
    Exit,

    // Continuous update message
    Tick,
}

/// Application state: the running stream plus the consumer side of the pipeline.
struct JetApp {
    stream: CaptureStream,
    controls: Arc<CaptureControls>,
    transcriber: Transcriber,
    rng: Pcg32,
    output: PathBuf,
}

impl JetApp {
    /// Builds the exchange, starts capture and wires the consumer to it.
    fn start(mut config: TranscriberConfig, seed: u64, initial_mode: CaptureMode, tone: f32) -> Result<Self> {
        let frame_len = config.audio.buffer_size;
        let exchange = Arc::new(FrameExchange::new(frame_len, frame_len / 2));
        let controls = Arc::new(CaptureControls::default());
        controls.set_mode(initial_mode);
        controls.set_tone(tone);

        let bridge = CaptureBridge::new(
            frame_len,
            Arc::clone(&exchange),
            Arc::clone(&controls),
            seed.wrapping_add(1),
        );
        let stream = CaptureStream::start(config.audio.device_index, config.audio.sample_rate, bridge)
            .context("failed to start audio capture")?;
        if stream.fell_back() {
            log::warn!(
                "Configured device {:?} is unavailable; capturing from '{}' instead",
                config.audio.device_index,
                stream.device_name()
            );
        }
        // Peak times and bin frequencies must use the rate the hardware runs at
        config.audio.sample_rate = stream.sample_rate();

        let output = config.output.path.clone();
        let thresholds = Arc::new(SharedThresholds::new(&config));
        let transcriber = Transcriber::new(config, exchange, thresholds);

        // Start every session from an empty file
        if let Err(e) = export::clear_midi_file(&output) {
            log::error!("Could not clear {}: {}", output.display(), e);
        }

        Ok(Self {
            stream,
            controls,
            transcriber,
            rng: Pcg32::seed_from_u64(seed),
            output,
        })
    }

    /// Runs until `Exit`, stdin-driven or for a fixed time with `export_after`.
    fn run(&mut self, commands: Receiver<Message>, export_after: Option<Duration>) {
        let ticker = crossbeam_channel::tick(TICK_INTERVAL);
        let deadline = match export_after {
            Some(d) => crossbeam_channel::after(d),
            None => crossbeam_channel::never(),
        };
        let idle = crossbeam_channel::never();
        let mut console_open = true;

        loop {
            let input = if console_open { &commands } else { &idle };
            select! {
                recv(input) -> msg => match msg {
                    Ok(message) => {
                        if !self.update(message) {
                            break;
                        }
                    }
                    Err(_) => {
                        if export_after.is_none() {
                            log::info!("Console closed");
                            break;
                        }
                        console_open = false;
                    }
                },
                recv(ticker) -> _ => {
                    self.update(Message::Tick);
                }
                recv(deadline) -> _ => {
                    self.update(Message::Tick);
                    self.update(Message::Export);
                    break;
                }
            }
        }
    }

    /// Applies one message. Returns `false` when the app should exit.
    fn update(&mut self, message: Message) -> bool {
        if !matches!(message, Message::Tick) {
            log::debug!("Received message: {:?}", message);
        }

        match message {
            Message::Tick => {
                self.transcriber.tick();
            }
            Message::SetMode(mode) => {
                self.controls.set_mode(mode);
                log::info!("Capture mode: {:?}", mode);
            }
            Message::SetTone(control) => {
                self.controls.set_tone(control);
                log::info!("Tone control: {:.4}", self.controls.tone());
            }
            Message::TogglePause => match self.stream.toggle_pause() {
                Ok(paused) => log::info!("PAUSE : {}", paused),
                Err(e) => log::error!("Could not toggle the capture stream: {}", e),
            },
            Message::Export => {
                log::info!("Exporting midi file");
                match self.transcriber.export(&self.output, &mut self.rng) {
                    Ok(outcome) => log::info!("{}", outcome),
                    Err(e) => log::error!("Export failed: {}", e),
                }
            }
            Message::AutoGenerate => {
                match self.transcriber.auto_generate(&self.output, &mut self.rng) {
                    Ok(outcome) => log::info!("{}", outcome),
                    Err(e) => log::error!("Auto-generate failed: {}", e),
                }
            }
            Message::Show => {
                log::info!("MIDI notes: {:?}", self.transcriber.midi_notes().real());
                log::info!("Time markers (ms): {:?}", self.transcriber.time_markers().real());
            }
            Message::Dump(path) => match dump_report(&self.transcriber, &path) {
                Ok(()) => log::info!("Wrote peak report to {}", path.display()),
                Err(e) => log::error!("{:#}", e),
            },
            Message::SetTimeThreshold(value) => {
                let stored = self.transcriber.thresholds().set_time(value);
                log::info!("Time threshold: {}", stored);
            }
            Message::SetFreqThreshold(value) => {
                let stored = self.transcriber.thresholds().set_freq(value);
                log::info!("Frequency threshold: {}", stored);
            }
            Message::SetMaxNoteTicks(ticks) => {
                let stored = self.transcriber.thresholds().set_max_note_ticks(ticks);
                log::info!("Max note length: {} ticks", stored);
            }
            Message::ListDevices => print_devices(),
            Message::Exit => {
                log::info!("Exit requested");
                if let Err(e) = self.stream.pause() {
                    log::error!("Error pausing stream: {}", e);
                }
                return false;
            }
        }
        true
    }
}

/// Writes the current notes and markers as pretty JSON.
fn dump_report(transcriber: &Transcriber, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&transcriber.report())
        .context("failed to serialize peak report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn print_devices() {
    match audio::list_input_devices() {
        Ok(devices) if devices.is_empty() => println!("No input devices found"),
        Ok(devices) => {
            for device in devices {
                let marker = if device.is_default { " (default)" } else { "" };
                println!("{:>3}: {}{}", device.index, device.name, marker);
            }
        }
        Err(e) => log::error!("Could not list input devices: {}", e),
    }
}

/// Config file values first, then command-line overrides.
fn build_config(cli: &Cli) -> Result<TranscriberConfig> {
    let path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        default.exists().then_some(default)
    });

    let mut config = match path {
        Some(path) => TranscriberConfig::load(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TranscriberConfig::default(),
    };

    if let Some(device) = cli.device {
        config.audio.device_index = Some(device);
    }
    if let Some(output) = &cli.output {
        config.output.path = output.clone();
    }
    if let Some(buffer_size) = cli.buffer_size {
        config.audio.buffer_size = buffer_size;
    }
    if let Some(sample_rate) = cli.sample_rate {
        config.audio.sample_rate = sample_rate;
    }
    if let Some(seed) = cli.seed {
        config.sequencing.seed = Some(seed);
    }
    config.validate()?;
    Ok(config)
}

/// `--export-after` seconds as a duration. Negative, NaN and infinite values are rejected.
fn export_delay(seconds: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(seconds)
        .with_context(|| format!("invalid --export-after value {}", seconds))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if cli.list_devices {
        print_devices();
        return Ok(());
    }

    let config = build_config(&cli)?;
    let seed = config.sequencing.seed.unwrap_or_else(rand::random);
    log::info!("Audio JET starting");
    log::info!(
        "Frame: {} samples @ {} Hz, output: {}",
        config.audio.buffer_size,
        config.audio.sample_rate,
        config.output.path.display()
    );
    log::info!("Shuffle seed: {}", seed);

    let export_after = cli
        .export_after
        .map(export_delay)
        .transpose()?;
    let mut app = JetApp::start(config, seed, cli.mode.into(), cli.tone)?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let _reader = console::spawn_reader(tx);
    log::info!("Ready. Commands: m n s | tone <x> | p | e | g | t <v> | f <v> | l <ticks> | show | dump <path> | devices | q");

    app.run(rx, export_after);

    log::info!("Audio JET finished");
    Ok(())
}
