//! Backend that discards playback and captures silence.

use std::time::{Duration, Instant};

use crate::backend::{Backend, BackendConfig, StateRequest};
use crate::device::{DeviceInfo, DeviceIter};
use crate::{Error, Result};

/// Discarding backend.
///
/// With [`paced`](NullBackend::paced) it consumes data at the negotiated
/// rate, which lets a mixer thread run in real time without a device.
#[derive(Debug, Default)]
pub struct NullBackend {
    config: Option<BackendConfig>,
    paced: bool,
    running: bool,
    next_deadline: Option<Instant>,
    bytes: u64,
}

impl NullBackend {
    /// A backend that accepts everything immediately.
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend that accepts one period per period of wall-clock time.
    pub fn paced() -> Self {
        Self {
            paced: true,
            ..Self::default()
        }
    }

    /// Bytes accepted by [`playback`](Backend::playback) so far.
    pub fn bytes_played(&self) -> u64 {
        self.bytes
    }

    fn pace(&mut self, bytes: usize) {
        let Some(config) = self.config.filter(|_| self.paced) else {
            return;
        };
        let frames = bytes / config.frame_bytes().max(1);
        let period = Duration::from_secs_f64(frames as f64 / f64::from(config.sample_rate.max(1)));
        let now = Instant::now();
        let deadline = self.next_deadline.map_or(now, |d| d.max(now)) + period;
        if let Some(wait) = deadline.checked_duration_since(now) {
            std::thread::sleep(wait);
        }
        self.next_deadline = Some(deadline);
    }
}

impl Backend for NullBackend {
    fn name(&self) -> &str {
        "null"
    }

    fn connect(&mut self, _device: Option<&str>) -> Result<()> {
        Ok(())
    }

    fn setup(&mut self, config: &mut BackendConfig) -> Result<()> {
        config.periods = config.periods.max(1);
        self.config = Some(*config);
        self.running = true;
        self.next_deadline = None;
        tracing::debug!(sample_rate = config.sample_rate, tracks = config.tracks, "null backend ready");
        Ok(())
    }

    fn playback(&mut self, pcm: &[u8], _gain: f32) -> Result<usize> {
        if self.config.is_none() {
            return Err(Error::NotConnected);
        }
        if !self.running {
            return Ok(0);
        }
        self.pace(pcm.len());
        self.bytes += pcm.len() as u64;
        Ok(pcm.len())
    }

    fn capture(&mut self, pcm: &mut [u8]) -> Result<usize> {
        if self.config.is_none() {
            return Err(Error::NotConnected);
        }
        if !self.running {
            return Ok(0);
        }
        pcm.fill(0);
        self.pace(pcm.len());
        Ok(pcm.len())
    }

    fn state(&mut self, request: StateRequest) -> Result<bool> {
        match request {
            StateRequest::Pause => self.running = false,
            StateRequest::Resume => {
                self.running = self.config.is_some();
                self.next_deadline = None;
            }
            StateRequest::Query => {}
        }
        Ok(self.running)
    }

    fn devices(&self) -> Result<DeviceIter> {
        Ok(DeviceIter::new(vec![DeviceInfo {
            name: "null".to_string(),
            is_input: true,
            is_output: true,
            default_sample_rate: 48000,
        }]))
    }
}
