//! # Console Input Module
//!
//! Reads commands from stdin on a dedicated thread and forwards them to the
//! main loop as [`Message`]s. Each line is one command:
//!
//! | command | effect |
//! |---|---|
//! | `m` / `n` / `s` | live input / noise / sine tone |
//! | `tone <0..1>` | tone frequency as a fraction of Nyquist |
//! | `p` | pause or resume the capture stream |
//! | `e` | export the current notes |
//! | `g` | auto-generate with random thresholds |
//! | `t <value>` / `f <value>` | time / frequency threshold |
//! | `l <ticks>` | maximum note length |
//! | `show` | log the current notes and time markers |
//! | `dump <path>` | write notes and markers as JSON |
//! | `devices` | list input devices |
//! | `q` | quit |

use crossbeam_channel::Sender;
use jet_core::CaptureMode;
use std::io::BufRead;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use crate::Message;

/// Parses one line of console input.
pub fn parse_command(line: &str) -> Result<Message, String> {
    let mut parts = line.split_whitespace();
    let Some(command) = parts.next() else {
        return Err("empty command".into());
    };
    let arg = parts.next();

    let message = match command {
        "m" => Message::SetMode(CaptureMode::Live),
        "n" => Message::SetMode(CaptureMode::Noise),
        "s" => Message::SetMode(CaptureMode::Tone),
        "tone" => Message::SetTone(parse_arg(command, arg)?),
        "p" => Message::TogglePause,
        "e" => Message::Export,
        "g" => Message::AutoGenerate,
        "t" => Message::SetTimeThreshold(parse_arg(command, arg)?),
        "f" => Message::SetFreqThreshold(parse_arg(command, arg)?),
        "l" => Message::SetMaxNoteTicks(parse_arg(command, arg)?),
        "show" => Message::Show,
        "dump" => match arg {
            Some(path) => Message::Dump(PathBuf::from(path)),
            None => return Err("dump needs a file path".into()),
        },
        "devices" => Message::ListDevices,
        "q" | "quit" | "exit" => Message::Exit,
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(message)
}

fn parse_arg<T: std::str::FromStr>(command: &str, arg: Option<&str>) -> Result<T, String> {
    let raw = arg.ok_or_else(|| format!("'{}' needs a value", command))?;
    raw.parse()
        .map_err(|_| format!("'{}' is not a valid value for '{}'", raw, command))
}

/// Spawns the stdin reader. The thread ends when stdin closes or the
/// receiving side is dropped.
pub fn spawn_reader(sender: Sender<Message>) -> JoinHandle<()> {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(e) => {
                    log::error!("Failed to read console input: {}", e);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match parse_command(&line) {
                Ok(message) => {
                    if sender.send(message).is_err() {
                        break;
                    }
                }
                Err(e) => log::warn!("{}", e),
            }
        }
        log::debug!("Console reader finished");
    })
}
