//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It enumerates input devices, resolves the configured device, and runs the input
//! stream whose callback feeds fixed-size frames to the [`CaptureBridge`].
//!
//! ## Features
//! - Device listing and index-based selection with fallback to the default device
//! - Closest-match stream configuration (f32, preferred sample rate, mono preferred)
//! - Interleaved multi-channel input down-mixed to mono
//! - Explicit pause/resume of the hardware stream

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfigRange;

use crate::capture::CaptureBridge;
use crate::error::{JetError, Result};
use crate::signal;

/// One entry of the input device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
}

/// Lists the host's input devices in enumeration order.
pub fn list_input_devices() -> Result<Vec<InputDeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| JetError::Device(e.to_string()))?;

    Ok(devices
        .enumerate()
        .map(|(index, device)| {
            let name = device.name().unwrap_or_else(|_| format!("<device {}>", index));
            let is_default = default_name.as_deref() == Some(name.as_str());
            InputDeviceInfo { index, name, is_default }
        })
        .collect())
}

/// The device chosen for capture, and whether the requested index had to be ignored.
pub struct DeviceSelection {
    pub device: cpal::Device,
    pub name: String,
    /// Set when a device index was requested but could not be used.
    pub fell_back: bool,
}

/// Resolves `requested` against the device list.
///
/// An out-of-range index is not fatal: the default input device is used and
/// `fell_back` is set so the caller can tell the user.
pub fn select_input_device(requested: Option<usize>) -> Result<DeviceSelection> {
    let host = cpal::default_host();

    if let Some(index) = requested {
        let found = host
            .input_devices()
            .map_err(|e| JetError::Device(e.to_string()))?
            .nth(index);
        match found {
            Some(device) => {
                let name = device.name().unwrap_or_else(|_| format!("<device {}>", index));
                return Ok(DeviceSelection { device, name, fell_back: false });
            }
            None => log::warn!("Input device {} not found, falling back to default", index),
        }
    }

    let device = host.default_input_device().ok_or(JetError::NoInputDevice)?;
    let name = device.name().unwrap_or_else(|_| "<default>".to_string());
    Ok(DeviceSelection {
        device,
        name,
        fell_back: requested.is_some(),
    })
}

/// Finds the best supported audio configuration for the target sample rate.
///
/// Only f32 formats qualify. Among those, a range containing the target rate
/// wins, then fewer channels, then the range edge closest to the target.
///
/// # Returns
/// * `Some(config)` - Best matching configuration
/// * `None` - No f32 configuration offered
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let rate_diff = if (min..=max).contains(&target_rate) {
                0
            } else {
                min.abs_diff(target_rate).min(max.abs_diff(target_rate))
            };
            (rate_diff, c.channels())
        })
}

/// Collects hardware callbacks into whole frames for the bridge.
///
/// All buffers are allocated up front with room for the largest callback we
/// expect, so the steady state never touches the allocator.
struct FrameAccumulator {
    channels: usize,
    frame_len: usize,
    mono: Vec<f32>,
    pending: Vec<f32>,
}

impl FrameAccumulator {
    fn new(channels: usize, frame_len: usize) -> Self {
        Self {
            channels: channels.max(1),
            frame_len,
            mono: vec![0.0; frame_len * 4],
            pending: Vec::with_capacity(frame_len * 8),
        }
    }

    fn push(&mut self, data: &[f32], bridge: &mut CaptureBridge) {
        for chunk in data.chunks(self.mono.len() * self.channels) {
            let n = signal::downmix_into(chunk, self.channels, &mut self.mono);
            self.pending.extend_from_slice(&self.mono[..n]);

            // While we have enough data for a full frame, process it.
            while self.pending.len() >= self.frame_len {
                bridge.process(&self.pending[..self.frame_len]);
                self.pending.drain(..self.frame_len);
            }
        }
    }
}

/// A running (or paused) capture stream.
pub struct CaptureStream {
    stream: cpal::Stream,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    fell_back: bool,
    paused: bool,
}

impl CaptureStream {
    /// Opens the selected device and starts feeding `bridge`.
    ///
    /// # Arguments
    /// * `device_index` - Index into [`list_input_devices`], or `None` for the default
    /// * `sample_rate` - Preferred rate in Hz
    /// * `bridge` - Moved into the audio callback
    ///
    /// # Audio Configuration
    /// - Format: 32-bit float
    /// - Buffer Size: the bridge's frame length (2048 samples is ~46ms at 44.1kHz)
    pub fn start(device_index: Option<usize>, sample_rate: u32, mut bridge: CaptureBridge) -> Result<Self> {
        let selection = select_input_device(device_index)?;
        log::info!("Using audio input device: {}", selection.name);

        let configs = selection
            .device
            .supported_input_configs()
            .map_err(|e| JetError::Device(e.to_string()))?
            .collect::<Vec<_>>();
        let supported = find_supported_config(configs, sample_rate)
            .ok_or_else(|| JetError::Device("no suitable f32 input format found".into()))?;

        let rate = sample_rate.clamp(supported.min_sample_rate().0, supported.max_sample_rate().0);
        if rate != sample_rate {
            log::warn!("Device does not support {} Hz, using {} Hz", sample_rate, rate);
        }
        let config: cpal::StreamConfig = supported.with_sample_rate(cpal::SampleRate(rate)).into();
        let channels = config.channels;
        log::info!("Selected sample rate: {} Hz, {} channel(s)", rate, channels);

        let mut accumulator = FrameAccumulator::new(channels as usize, bridge.frame_len());
        let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

        let stream = selection
            .device
            .build_input_stream(
                &config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    accumulator.push(data, &mut bridge);
                },
                err_fn,
                None,
            )
            .map_err(|e| JetError::Stream(e.to_string()))?;

        stream.play().map_err(|e| JetError::Stream(e.to_string()))?;

        Ok(Self {
            stream,
            device_name: selection.name,
            sample_rate: rate,
            channels,
            fell_back: selection.fell_back,
            paused: false,
        })
    }

    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Rate the hardware is actually running at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Whether the configured device index was unusable.
    pub fn fell_back(&self) -> bool {
        self.fell_back
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Stops the hardware stream. The exchange keeps its last frame.
    pub fn pause(&mut self) -> Result<()> {
        self.stream.pause().map_err(|e| JetError::Stream(e.to_string()))?;
        self.paused = true;
        Ok(())
    }

    pub fn resume(&mut self) -> Result<()> {
        self.stream.play().map_err(|e| JetError::Stream(e.to_string()))?;
        self.paused = false;
        Ok(())
    }

    /// Pauses if running, resumes if paused. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> Result<bool> {
        if self.paused {
            self.resume()?;
        } else {
            self.pause()?;
        }
        Ok(self.paused)
    }
}
