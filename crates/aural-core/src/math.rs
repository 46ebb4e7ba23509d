//! Mathematical utility functions for DSP.
//!
//! Scalar helpers plus the block primitives the mixer is built from:
//! additive mixing ([`mix_add`]), gain ([`scale`]) and level measurement
//! ([`rms`]). All functions are allocation-free and suitable for `no_std`.

use libm::{expf, logf, sqrtf, tanhf};

/// Convert decibels to linear gain.
///
/// # Example
/// ```rust
/// use aural_core::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    expf(db * FACTOR)
}

/// Convert linear gain to decibels.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    logf(linear.max(1e-10)) * FACTOR
}

/// Soft clip using hyperbolic tangent.
///
/// Smooth saturation that approaches ±1 asymptotically.
#[inline]
pub fn soft_clip(x: f32) -> f32 {
    tanhf(x)
}

/// Hard clip to ±threshold range.
#[inline]
pub fn hard_clip(x: f32, threshold: f32) -> f32 {
    x.clamp(-threshold, threshold)
}

/// Flush values in the subnormal neighbourhood to zero.
///
/// Use this in feedback loops (filter history, loopback reverb, echo
/// feedback) where a signal can decay indefinitely toward zero.
#[allow(clippy::inline_always)]
#[inline(always)]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}

/// Crossfade between dry and wet signals.
///
/// `mix` = 0.0 is all dry, 1.0 is all wet.
#[inline]
pub fn wet_dry_mix(dry: f32, wet: f32, mix: f32) -> f32 {
    dry + (wet - dry) * mix
}

/// Converts milliseconds to samples.
#[inline]
pub fn ms_to_samples(ms: f32, sample_rate: f32) -> f32 {
    ms * sample_rate / 1000.0
}

/// Adds `src * gain` onto `dst` sample by sample.
///
/// Processes `min(dst.len(), src.len())` samples.
#[inline]
pub fn mix_add(dst: &mut [f32], src: &[f32], gain: f32) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s * gain;
    }
}

/// Multiplies every sample of `block` by `gain`.
#[inline]
pub fn scale(block: &mut [f32], gain: f32) {
    if gain == 1.0 {
        return;
    }
    block.iter_mut().for_each(|s| *s *= gain);
}

/// Root-mean-square level of a block; 0 for an empty block.
pub fn rms(block: &[f32]) -> f32 {
    if block.is_empty() {
        return 0.0;
    }
    let sum: f32 = block.iter().map(|s| s * s).sum();
    sqrtf(sum / block.len() as f32)
}

/// Returns `true` if every sample is finite.
#[inline]
pub fn all_finite(block: &[f32]) -> bool {
    block.iter().all(|s| s.is_finite())
}
