//! Aural Effects - filter and effect stages for spatial mixing
//!
//! Every stage implements [`aural_core::Effect`]: it processes one track
//! block in place, keeps its own per-track history across blocks and
//! advances its modulation once per render period in
//! [`end_block`](aural_core::Effect::end_block).
//!
//! # Stages
//!
//! | Stage | Type | Notes |
//! |-------|------|-------|
//! | Frequency filter | [`FrequencyFilter`] | 6–48 dB/oct, lf/hf band gains, LFO sweep |
//! | Phasing / chorus / flanging / echo | [`DelayEffect`] | LFO-modulated tap, feedback, wet filter |
//! | Reverb | [`Reverb`] | [`Reflections`] + [`Loopback`] |
//! | Distortion | [`Distortion`] | drive, clip ceiling, mix, asymmetry |
//! | Equalizer | [`Equalizer`] | two crossovers, three bands |
//! | Dynamic gain | [`DynamicGain`] | LFO tremolo or envelope ducking |
//!
//! # Descriptors
//!
//! Callers configure nodes with [`Dsp`] values: a filter or effect kind,
//! four parameter slots and an enable flag. An [`EffectsChain`] turns the
//! descriptors of one node into running stages and applies them in a fixed
//! order.
//!
//! # no_std Support
//!
//! Like `aural-core`, this crate builds without `std` (with `alloc`) when
//! the default feature is disabled.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod chain;
pub mod delay;
pub mod distortion;
pub mod dsp;
pub mod dynamic_gain;
pub mod equalizer;
pub mod filter;
pub mod reverb;

pub use chain::EffectsChain;
pub use delay::{DelayEffect, DelayMode};
pub use distortion::Distortion;
pub use dsp::{
    Dsp, DspFlags, DspKind, EffectType, FilterType, MAX_SLOTS, ParamRange, Params, SLOT_PARAMS,
};
pub use dynamic_gain::DynamicGain;
pub use equalizer::{Band, Equalizer};
pub use filter::{FilterOrder, FrequencyFilter, MIN_CUTOFF};
pub use reverb::{
    LOOPBACK_TAPS, Loopback, REFLECTION_TAPS, Reflections, Reverb, SILENT_TAP, Tap,
};
