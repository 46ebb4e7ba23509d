//! Device backend on top of [cpal](https://crates.io/crates/cpal).
//!
//! The cpal callback runs on a thread owned by the host audio system. It
//! never calls into the mixer: it drains rendered periods from a
//! [`handoff`](crate::handoff) and substitutes silence when none is queued.
//! Capture works the same way in reverse, and the input stream is only
//! opened on the first [`capture`](Backend::capture) call.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Stream};

use crate::backend::{Backend, BackendConfig, StateRequest};
use crate::device::{DeviceInfo, DeviceIter};
use crate::handoff::{HandoffReceiver, HandoffSender, handoff};
use crate::{Error, Result};

/// Name of a cpal device (cpal 0.17 moved it behind `description()`).
fn device_name(device: &Device) -> std::result::Result<String, cpal::DeviceNameError> {
    device.description().map(|d| d.name().to_string())
}

struct Output {
    stream: Stream,
    sender: HandoffSender,
}

struct Input {
    stream: Stream,
    receiver: HandoffReceiver,
}

/// Backend driving the platform's default cpal host.
pub struct CpalBackend {
    host: Host,
    device: Option<String>,
    config: Option<BackendConfig>,
    output: Option<Output>,
    input: Option<Input>,
    gain: Arc<AtomicU32>,
    running: bool,
}

impl std::fmt::Debug for CpalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpalBackend")
            .field("host", &self.host.id().name())
            .field("device", &self.device)
            .field("config", &self.config)
            .field("running", &self.running)
            .finish_non_exhaustive()
    }
}

impl CpalBackend {
    /// Backend on the default host. Nothing is opened until `setup`.
    pub fn new() -> Self {
        let host = cpal::default_host();
        tracing::debug!(host = host.id().name(), "cpal backend created");
        Self {
            host,
            device: None,
            config: None,
            output: None,
            input: None,
            gain: Arc::new(AtomicU32::new(1.0f32.to_bits())),
            running: false,
        }
    }

    fn find_device(&self, input: bool) -> Result<Device> {
        let Some(search) = self.device.as_deref() else {
            let device = if input {
                self.host.default_input_device()
            } else {
                self.host.default_output_device()
            };
            return device.ok_or(Error::NoDevice);
        };

        let search_lower = search.to_lowercase();
        let devices = if input {
            self.host.input_devices()
        } else {
            self.host.output_devices()
        }
        .map_err(|e| Error::Stream(e.to_string()))?;

        for device in devices {
            if let Ok(name) = device_name(&device)
                && name.to_lowercase().contains(&search_lower)
            {
                return Ok(device);
            }
        }
        Err(Error::DeviceNotFound(format!(
            "no {} device matching '{search}'",
            if input { "input" } else { "output" }
        )))
    }

    /// Adjusts `config` to a rate and channel count the device supports.
    fn negotiate(device: &Device, config: &mut BackendConfig) -> Result<()> {
        let supported = device
            .supported_output_configs()
            .map_err(|e| Error::Stream(e.to_string()))?
            .any(|range| {
                range.channels() == config.tracks
                    && range.min_sample_rate() <= config.sample_rate
                    && config.sample_rate <= range.max_sample_rate()
            });
        if !supported {
            let fallback = device
                .default_output_config()
                .map_err(|e| Error::UnsupportedFormat(e.to_string()))?;
            tracing::warn!(
                requested_rate = config.sample_rate,
                requested_tracks = config.tracks,
                rate = fallback.sample_rate(),
                tracks = fallback.channels(),
                "device does not support the requested stream, using its default"
            );
            config.sample_rate = fallback.sample_rate();
            config.tracks = fallback.channels();
        }
        config.periods = config.periods.max(2);
        Ok(())
    }

    fn stream_config(config: &BackendConfig) -> cpal::StreamConfig {
        cpal::StreamConfig {
            channels: config.tracks,
            sample_rate: config.sample_rate,
            buffer_size: cpal::BufferSize::Fixed(config.period_frames),
        }
    }

    fn open_input(&mut self, config: &BackendConfig) -> Result<()> {
        let device = self.find_device(true)?;
        let (sender, receiver) = handoff(
            config.format,
            config.periods as usize,
            config.period_bytes(),
            config.period_duration(),
        );
        let stream = device
            .build_input_stream(
                &Self::stream_config(config),
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    sender.offer(data);
                },
                |err| tracing::error!(error = %err, "input stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;
        tracing::info!(
            channels = config.tracks,
            sample_rate = config.sample_rate,
            "input stream started"
        );
        self.input = Some(Input { stream, receiver });
        Ok(())
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for CpalBackend {
    fn name(&self) -> &str {
        "cpal"
    }

    fn connect(&mut self, device: Option<&str>) -> Result<()> {
        self.output = None;
        self.input = None;
        self.device = device.map(str::to_string);
        // Fail early if nothing matches.
        self.find_device(false).map(|_| ())
    }

    fn setup(&mut self, config: &mut BackendConfig) -> Result<()> {
        self.output = None;
        self.input = None;

        let device = self.find_device(false)?;
        Self::negotiate(&device, config)?;

        let (sender, mut receiver) = handoff(
            config.format,
            config.periods as usize,
            config.period_bytes(),
            config.period_duration(),
        );
        let gain = Arc::clone(&self.gain);
        let stream = device
            .build_output_stream(
                &Self::stream_config(config),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    receiver.fill(data, f32::from_bits(gain.load(Ordering::Relaxed)));
                },
                |err| tracing::error!(error = %err, "output stream error"),
                None,
            )
            .map_err(|e| Error::Stream(e.to_string()))?;
        stream.play().map_err(|e| Error::Stream(e.to_string()))?;

        tracing::info!(
            device = device_name(&device).unwrap_or_default(),
            channels = config.tracks,
            sample_rate = config.sample_rate,
            period_frames = config.period_frames,
            "output stream started"
        );
        self.output = Some(Output { stream, sender });
        self.config = Some(*config);
        self.running = true;
        Ok(())
    }

    fn playback(&mut self, pcm: &[u8], gain: f32) -> Result<usize> {
        let output = self.output.as_ref().ok_or(Error::NotConnected)?;
        if !self.running {
            return Ok(0);
        }
        self.gain.store(gain.to_bits(), Ordering::Relaxed);
        output.sender.send(pcm)
    }

    fn capture(&mut self, pcm: &mut [u8]) -> Result<usize> {
        let config = self.config.ok_or(Error::NotConnected)?;
        if self.input.is_none() {
            self.open_input(&config)?;
        }
        match self.input.as_mut() {
            Some(input) if self.running => Ok(input.receiver.read(pcm)),
            _ => Ok(0),
        }
    }

    fn state(&mut self, request: StateRequest) -> Result<bool> {
        let streams = self
            .output
            .iter()
            .map(|o| &o.stream)
            .chain(self.input.iter().map(|i| &i.stream));
        match request {
            StateRequest::Pause => {
                for stream in streams {
                    stream.pause().map_err(|e| Error::Stream(e.to_string()))?;
                }
                self.running = false;
            }
            StateRequest::Resume => {
                for stream in streams {
                    stream.play().map_err(|e| Error::Stream(e.to_string()))?;
                }
                self.running = self.output.is_some();
            }
            StateRequest::Query => {}
        }
        Ok(self.running)
    }

    fn devices(&self) -> Result<DeviceIter> {
        let mut devices: Vec<DeviceInfo> = Vec::new();

        if let Ok(inputs) = self.host.input_devices() {
            for device in inputs {
                if let Ok(name) = device_name(&device) {
                    devices.push(DeviceInfo {
                        name,
                        is_input: true,
                        is_output: device.default_output_config().is_ok(),
                        default_sample_rate: device
                            .default_input_config()
                            .map(|c| c.sample_rate())
                            .unwrap_or(48000),
                    });
                }
            }
        }

        if let Ok(outputs) = self.host.output_devices() {
            for device in outputs {
                if let Ok(name) = device_name(&device) {
                    if devices.iter().any(|d| d.name == name) {
                        continue;
                    }
                    devices.push(DeviceInfo {
                        name,
                        is_input: false,
                        is_output: true,
                        default_sample_rate: device
                            .default_output_config()
                            .map(|c| c.sample_rate())
                            .unwrap_or(48000),
                    });
                }
            }
        }

        Ok(DeviceIter::new(devices))
    }

    fn underruns(&self) -> u64 {
        self.output.as_ref().map_or(0, |o| o.sender.underruns())
    }

    fn close(&mut self) -> Result<()> {
        self.output = None;
        self.input = None;
        self.running = false;
        Ok(())
    }
}
