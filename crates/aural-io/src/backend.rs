//! Backend driver contract.
//!
//! A backend moves interleaved integer PCM between the mixer thread and a
//! device, a file or nowhere. Every backend follows the same lifecycle:
//!
//! ```text
//! connect(device) ─► setup(&mut config) ─► playback / capture ... ─► close
//!                        ▲      │
//!                        └──────┘ renegotiate at any time
//! ```
//!
//! `setup` may change the requested configuration (sample rate, tracks,
//! period length, format) to what the backend actually runs at; callers read
//! the negotiated values back from the same struct. The trait is object
//! safe, so the backend can be chosen at runtime by name.

use crate::device::DeviceIter;
use crate::pcm::PcmFormat;
use crate::{Error, Result};

/// Stream parameters negotiated in [`Backend::setup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Interleaved tracks (channels).
    pub tracks: u16,
    /// Frames per period.
    pub period_frames: u32,
    /// Integer sample encoding.
    pub format: PcmFormat,
    /// Periods buffered between the mixer thread and the device.
    pub periods: u32,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            tracks: 2,
            period_frames: 1024,
            format: PcmFormat::Pcm16,
            periods: 2,
        }
    }
}

impl BackendConfig {
    /// Bytes per interleaved frame.
    pub fn frame_bytes(&self) -> usize {
        usize::from(self.tracks) * self.format.bytes()
    }

    /// Bytes per period.
    pub fn period_bytes(&self) -> usize {
        self.period_frames as usize * self.frame_bytes()
    }

    /// Wall-clock length of one period.
    pub fn period_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs_f64(
            f64::from(self.period_frames) / f64::from(self.sample_rate.max(1)),
        )
    }
}

/// Request passed to [`Backend::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateRequest {
    /// Stop moving data but keep the stream.
    Pause,
    /// Continue after a pause.
    Resume,
    /// Report without changing anything.
    Query,
}

/// A playback and capture driver.
pub trait Backend: Send {
    /// Short backend name (`"cpal"`, `"wav"`, `"null"`).
    fn name(&self) -> &str;

    /// Selects the endpoint. `None` picks the default device; file backends
    /// take a path.
    fn connect(&mut self, device: Option<&str>) -> Result<()>;

    /// Opens or reopens the stream, adjusting `config` to what the backend
    /// supports.
    fn setup(&mut self, config: &mut BackendConfig) -> Result<()>;

    /// Queues interleaved PCM for output at `gain`; returns the bytes
    /// consumed. Fewer bytes than offered means the backend could not take
    /// them within one period.
    fn playback(&mut self, pcm: &[u8], gain: f32) -> Result<usize>;

    /// Fills `pcm` with captured frames; returns the bytes produced.
    fn capture(&mut self, pcm: &mut [u8]) -> Result<usize>;

    /// Pauses, resumes or queries the stream; returns `true` if it is
    /// running afterwards.
    fn state(&mut self, request: StateRequest) -> Result<bool>;

    /// Available endpoints.
    fn devices(&self) -> Result<DeviceIter> {
        Ok(DeviceIter::empty())
    }

    /// Periods the device had to fill with silence so far.
    fn underruns(&self) -> u64 {
        0
    }

    /// Flushes and releases the stream.
    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Names accepted by [`backend_by_name`].
pub const BACKEND_NAMES: [&str; 3] = ["cpal", "wav", "null"];

/// Creates a backend by name.
///
/// `"wav"` creates a file writer; connect it to a path before setup.
pub fn backend_by_name(name: &str) -> Result<Box<dyn Backend>> {
    match name.to_ascii_lowercase().as_str() {
        "cpal" | "device" => Ok(Box::new(crate::CpalBackend::new())),
        "wav" | "file" => Ok(Box::new(crate::WavFileBackend::writer())),
        "null" | "none" => Ok(Box::new(crate::NullBackend::new())),
        _ => Err(Error::UnknownBackend(name.to_string())),
    }
}
