//! Backend drivers and the mixer thread for the aural mixing engine.
//!
//! This crate provides:
//!
//! - **Backend contract**: [`Backend`] with connect, setup, playback,
//!   capture and state, selectable at runtime via [`backend_by_name`]
//! - **Backends**: [`CpalBackend`] for devices, [`WavFileBackend`] for
//!   files and [`NullBackend`] for headless runs
//! - **PCM codecs**: signed 16- and 24-bit interleaved conversion in [`pcm`]
//! - **Handoff**: a bounded channel between the mixer thread and a device
//!   callback in [`handoff`](mod@handoff)
//! - **Mixer thread**: [`MixerThread`] renders periods and feeds a backend
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use aural_io::{Backend, BackendConfig, MixerThread, backend_by_name};
//! use aural_mixer::{Mixer, MixerSettings};
//!
//! # fn main() -> aural_io::Result<()> {
//! let mut backend = backend_by_name("cpal")?;
//! backend.connect(None)?;
//! let mut config = BackendConfig::default();
//! backend.setup(&mut config)?;
//!
//! let mixer = Mixer::new(MixerSettings {
//!     sample_rate: config.sample_rate as f32,
//!     tracks: usize::from(config.tracks),
//!     period_frames: config.period_frames as usize,
//!     ..MixerSettings::default()
//! });
//! mixer.play().ok();
//! let thread = MixerThread::spawn(mixer, backend, config)?;
//! // ... mutate the graph through thread.handle() ...
//! let stats = thread.stop()?;
//! println!("{} periods, {} underruns", stats.periods, stats.underruns);
//! # Ok(())
//! # }
//! ```

mod backend;
mod cpal_backend;
mod device;
pub mod handoff;
mod null;
pub mod pcm;
mod thread;
mod wav;

pub use backend::{BACKEND_NAMES, Backend, BackendConfig, StateRequest, backend_by_name};
pub use cpal_backend::CpalBackend;
pub use device::{DeviceInfo, DeviceIter};
pub use handoff::{HandoffReceiver, HandoffSender, handoff};
pub use null::NullBackend;
pub use pcm::PcmFormat;
pub use thread::{MixerThread, ThreadStats};
pub use wav::{WavClip, WavFileBackend, read_wav};

/// Error types for backend and stream operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// Stream setup or runtime error.
    #[error("Audio stream error: {0}")]
    Stream(String),

    /// No audio device available on the system.
    #[error("No audio device available")]
    NoDevice,

    /// The requested stream format is not supported.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// The requested device was not found.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The backend was used before a successful `setup`.
    #[error("Backend is not set up")]
    NotConnected,

    /// The other end of a handoff was dropped.
    #[error("Handoff disconnected")]
    Disconnected,

    /// No backend has this name.
    #[error("Unknown backend '{0}'")]
    UnknownBackend(String),

    /// Standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type for backend operations.
pub type Result<T> = std::result::Result<T, Error>;
