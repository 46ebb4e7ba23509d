//! Second-order filter sections for the frequency filter.
//!
//! Coefficients come from the RBJ Audio EQ Cookbook and are folded into a
//! Direct Form II section that produces the lowpass split of its input:
//!
//! ```text
//! w[n]  = k*x[n] - c0*w[n-1] - c1*w[n-2]
//! lp[n] = w[n]   + c2*w[n-1] + c3*w[n-2]
//! ```
//!
//! The complementary band is `x - lp`, so one section serves both lowpass
//! and highpass shelving: `out = lp*lf_gain + (x - lp)*hf_gain`.
//!
//! Each section's state is exactly one complex-pole pair (`w[n-1]`,
//! `w[n-2]`), kept per track by the caller.

use core::f32::consts::PI;
use libm::{cosf, expf, sinf};

/// Q of a single-section Butterworth response.
pub const BUTTERWORTH_Q: f32 = core::f32::consts::FRAC_1_SQRT_2;

/// Folded section coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SectionCoefficients {
    /// Input gain.
    pub k: f32,
    /// Feedback and feedforward terms `[c0, c1, c2, c3]`.
    pub c: [f32; 4],
}

impl SectionCoefficients {
    /// Passes the input through as the lowpass band.
    pub const PASSTHROUGH: Self = Self {
        k: 1.0,
        c: [0.0; 4],
    };

    /// Lowpass section at `frequency` Hz.
    ///
    /// `frequency` is clamped below Nyquist and `q` to a small positive
    /// minimum, so the returned set is always finite.
    pub fn lowpass(frequency: f32, q: f32, sample_rate: f32) -> Self {
        let nyquist = sample_rate * 0.5;
        let fc = frequency.max(10.0).min(nyquist * 0.999);
        let (b0, _, _, a0, a1, a2) = lowpass_coefficients(fc, q.max(0.05), sample_rate);
        // b1/b0 = 2 and b2/b0 = 1 for every lowpass section
        Self {
            k: b0 / a0,
            c: [a1 / a0, a2 / a0, 2.0, 1.0],
        }
    }

    /// Returns `true` if every coefficient is finite.
    pub fn is_finite(&self) -> bool {
        self.k.is_finite() && self.c.iter().all(|c| c.is_finite())
    }
}

impl Default for SectionCoefficients {
    fn default() -> Self {
        Self::PASSTHROUGH
    }
}

/// Two-cell history of one section.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SectionState {
    h0: f32,
    h1: f32,
}

impl SectionState {
    /// Runs one sample and returns its lowpass band.
    #[inline]
    pub fn process(&mut self, coeffs: &SectionCoefficients, x: f32) -> f32 {
        let [c0, c1, c2, c3] = coeffs.c;
        let w = x * coeffs.k - self.h0 * c0 - self.h1 * c1;
        let lp = w + self.h0 * c2 + self.h1 * c3;
        self.h1 = self.h0;
        self.h0 = crate::math::flush_denormal(w);
        lp
    }

    /// Clears the history.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Smoothing factor of a one-pole (6 dB/oct) lowpass at `frequency`.
pub fn one_pole_coefficient(frequency: f32, sample_rate: f32) -> f32 {
    let fc = frequency.max(1.0).min(sample_rate * 0.5);
    1.0 - expf(-2.0 * PI * fc / sample_rate)
}

/// Q of section `index` in a Butterworth cascade of `sections` sections,
/// scaled by `resonance / BUTTERWORTH_Q`.
pub fn butterworth_q(sections: usize, index: usize, resonance: f32) -> f32 {
    if sections <= 1 {
        return resonance;
    }
    let order = 2 * sections;
    let theta = PI * (2 * index + 1) as f32 / (2 * order) as f32;
    let q = 1.0 / (2.0 * cosf(theta));
    q * resonance / BUTTERWORTH_Q
}

/// Calculates low-pass filter coefficients using the RBJ cookbook formula.
///
/// Returns `(b0, b1, b2, a0, a1, a2)`.
pub fn lowpass_coefficients(frequency: f32, q: f32, sample_rate: f32) -> (f32, f32, f32, f32, f32, f32) {
    let omega = 2.0 * PI * frequency / sample_rate;
    let cos_omega = cosf(omega);
    let alpha = sinf(omega) / (2.0 * q);

    let b0 = (1.0 - cos_omega) / 2.0;
    let b1 = 1.0 - cos_omega;
    let b2 = (1.0 - cos_omega) / 2.0;
    let a0 = 1.0 + alpha;
    let a1 = -2.0 * cos_omega;
    let a2 = 1.0 - alpha;

    (b0, b1, b2, a0, a1, a2)
}
