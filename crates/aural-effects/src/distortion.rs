//! Saturating distortion with asymmetry and a clip ceiling.

use aural_core::{Effect, hard_clip, soft_clip, wet_dry_mix};

/// Largest input drive multiplier minus one.
const MAX_DRIVE: f32 = 64.0;

/// Waveshaping distortion.
///
/// The input is driven by `1 + 64 * factor`, positive excursions are pushed
/// harder by `asymmetry`, the result is compressed with `tanh` and limited
/// to a ceiling that drops as `clipping` rises, then crossfaded with the
/// dry signal by `mix`.
///
/// ## Parameters
///
/// | Parameter | Range | Default |
/// |-----------|-------|---------|
/// | factor | 0.0–1.0 | 0.3 |
/// | clipping | 0.0–1.0 | 0.3 |
/// | mix | 0.0–1.0 | 1.0 |
/// | asymmetry | 0.0–1.0 | 0.0 |
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::Distortion;
///
/// let mut dist = Distortion::new();
/// dist.set_params(0.8, 0.5, 0.7, 0.2);
///
/// let mut block = [0.5f32, -0.5, 0.25];
/// dist.process_track(0, &mut block);
/// assert!(block.iter().all(|s| s.abs() <= 1.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Distortion {
    factor: f32,
    clipping: f32,
    mix: f32,
    asymmetry: f32,
}

impl Default for Distortion {
    fn default() -> Self {
        Self::new()
    }
}

impl Distortion {
    /// Creates a distortion with moderate drive, fully wet.
    pub fn new() -> Self {
        Self {
            factor: 0.3,
            clipping: 0.3,
            mix: 1.0,
            asymmetry: 0.0,
        }
    }

    /// Sets all four parameters, each clamped to `[0, 1]`.
    /// Non-finite values keep the previous setting.
    pub fn set_params(&mut self, factor: f32, clipping: f32, mix: f32, asymmetry: f32) {
        let unit = |v: f32, old: f32| if v.is_finite() { v.clamp(0.0, 1.0) } else { old };
        self.factor = unit(factor, self.factor);
        self.clipping = unit(clipping, self.clipping);
        self.mix = unit(mix, self.mix);
        self.asymmetry = unit(asymmetry, self.asymmetry);
    }

    /// Drive factor.
    pub fn factor(&self) -> f32 {
        self.factor
    }

    /// Dry/wet mix.
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Shapes one sample.
    #[inline]
    pub fn shape(&self, x: f32) -> f32 {
        let mut y = x * (1.0 + MAX_DRIVE * self.factor);
        if y > 0.0 {
            y *= 1.0 + self.asymmetry;
        }
        let ceiling = 1.0 - 0.9 * self.clipping;
        let wet = hard_clip(soft_clip(y), ceiling);
        wet_dry_mix(x, wet, self.mix)
    }
}

impl Effect for Distortion {
    fn process_track(&mut self, _track: usize, block: &mut [f32]) {
        if self.mix == 0.0 {
            return;
        }
        for s in block.iter_mut() {
            *s = self.shape(*s);
        }
    }

    fn set_sample_rate(&mut self, _sample_rate: f32) {}

    fn reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mix_is_identity() {
        let mut dist = Distortion::new();
        dist.set_params(1.0, 1.0, 0.0, 1.0);
        let mut block = [0.3f32, -0.7, 0.0];
        dist.process_track(0, &mut block);
        assert_eq!(block, [0.3, -0.7, 0.0]);
    }

    #[test]
    fn output_respects_ceiling() {
        let mut dist = Distortion::new();
        dist.set_params(1.0, 1.0, 1.0, 0.0);
        for x in [-1.0f32, -0.1, 0.1, 1.0] {
            assert!(dist.shape(x).abs() <= 0.1 + 1e-6);
        }
    }

    #[test]
    fn asymmetry_favours_positive_half() {
        let mut dist = Distortion::new();
        dist.set_params(0.0, 0.0, 1.0, 1.0);
        let pos = dist.shape(0.2);
        let neg = dist.shape(-0.2);
        assert!(pos > -neg);
    }

    #[test]
    fn non_finite_params_are_ignored() {
        let mut dist = Distortion::new();
        dist.set_params(f32::NAN, 0.5, f32::INFINITY, 0.5);
        assert_eq!(dist.factor(), 0.3);
        assert_eq!(dist.mix(), 1.0);
    }
}
