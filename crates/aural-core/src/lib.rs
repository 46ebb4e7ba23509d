//! Aural Core - buffers, resampling and DSP primitives for spatial mixing
//!
//! This crate holds the leaf components of the aural mixing engine: the
//! storage every other stage is built on and the numeric kernels that run
//! inside the render deadline.
//!
//! # Core Abstractions
//!
//! ## Storage
//!
//! - [`DataBuffer`] - Multi-slot byte FIFO with per-slot fill levels
//! - [`HistoryRing`] - Per-track sample run with a negative-offset history region
//!
//! ## Sample-Rate Conversion
//!
//! - [`Resampler`] - Stateful stream resampler
//! - [`resample`] - One-shot kernel call ([`Kernel`] x [`ResampleBackend`])
//!
//! ## Modulation & Filtering
//!
//! - [`Lfo`] - Range-mapped low-frequency oscillator
//! - [`SectionCoefficients`] / [`SectionState`] - Second-order filter section
//!
//! ## Spatial
//!
//! - [`Distance`] - Distance attenuation curves
//! - [`Cone`] - Directional gain around a source's forward axis
//! - [`doppler_factor`] - Doppler pitch shift
//!
//! ## Effect System
//!
//! - [`Effect`] - Object-safe block-processing trait
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (with `alloc`). Disable the default
//! `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! aural-core = { version = "0.1", default-features = false }
//! ```
//!
//! # Design Principles
//!
//! - **Real-time safe**: No allocations in processing paths
//! - **Bounded reads**: Windows and kernels validate every index
//! - **Status, not panics**: Misuse returns 0/`false`/`None` in release builds

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod biquad;
pub mod data_buffer;
pub mod effect;
pub mod lfo;
pub mod math;
pub mod resample;
pub mod ring;
pub mod spatial;

// Re-export main types at crate root
pub use biquad::{
    BUTTERWORTH_Q, SectionCoefficients, SectionState, butterworth_q, lowpass_coefficients,
    one_pole_coefficient,
};
pub use data_buffer::{DataBuffer, Slot};
pub use effect::Effect;
pub use lfo::{Lfo, LfoWaveform, MAX_TRACKS};
pub use math::{
    all_finite, db_to_linear, flush_denormal, hard_clip, linear_to_db, mix_add, ms_to_samples,
    rms, scale, soft_clip, wet_dry_mix,
};
pub use resample::{Backend as ResampleBackend, Kernel, Position, Resampler, resample};
pub use ring::HistoryRing;
pub use spatial::{Cone, Distance, DistanceModel, SPEED_OF_SOUND, doppler_factor};
