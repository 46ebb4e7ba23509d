//! Distance attenuation, directional cones and doppler pitch models.
//!
//! All are plain scalar functions of already-resolved distances, angles and
//! velocities; the node graph derives those from its 4×4 matrices.

use libm::{cosf, powf};

/// Speed of sound in air at 20 °C, metres per second.
pub const SPEED_OF_SOUND: f32 = 343.0;

/// Distance attenuation curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DistanceModel {
    /// No attenuation.
    None,
    /// `ref / (ref + rolloff * (d - ref))`
    Inverse,
    /// `1 - rolloff * (d - ref) / (max - ref)`
    Linear,
    /// `(d / ref) ^ -rolloff`
    #[default]
    Exponential,
}

/// Parameters of a distance curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distance {
    /// Curve shape.
    pub model: DistanceModel,
    /// Distance at which the gain is 1.
    pub ref_distance: f32,
    /// Distance beyond which the gain stops changing when clamped.
    pub max_distance: f32,
    /// Steepness of the curve.
    pub rolloff: f32,
    /// Clamps the distance to `[ref_distance, max_distance]` first.
    pub clamped: bool,
}

impl Default for Distance {
    fn default() -> Self {
        Self {
            model: DistanceModel::Exponential,
            ref_distance: 1.0,
            max_distance: f32::MAX,
            rolloff: 1.0,
            clamped: false,
        }
    }
}

impl Distance {
    /// Gain for a source `distance` units away, in `[0, +inf)`.
    ///
    /// Degenerate parameter sets (zero reference distance, zero span) yield
    /// unity gain instead of dividing by zero.
    pub fn gain(&self, distance: f32) -> f32 {
        let mut d = if distance.is_finite() { distance.max(0.0) } else { self.max_distance };
        if self.clamped {
            d = d.max(self.ref_distance).min(self.max_distance);
        }

        let gain = match self.model {
            DistanceModel::None => 1.0,
            DistanceModel::Inverse => {
                let denom = self.ref_distance + self.rolloff * (d - self.ref_distance);
                if denom > 0.0 { self.ref_distance / denom } else { 1.0 }
            }
            DistanceModel::Linear => {
                let span = self.max_distance - self.ref_distance;
                if span > 0.0 {
                    (1.0 - self.rolloff * (d - self.ref_distance) / span).clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
            DistanceModel::Exponential => {
                if self.ref_distance > 0.0 && d > 0.0 {
                    powf(d / self.ref_distance, -self.rolloff)
                } else {
                    1.0
                }
            }
        };

        if gain.is_finite() { gain.max(0.0) } else { 1.0 }
    }
}

/// Directional sound cone.
///
/// A source radiates at full gain inside `inner_angle` around its forward
/// axis, fades linearly (in cosine space) to `outer_gain` at `outer_angle`
/// and stays there behind it. With `forward_gain` below 1 the inside of the
/// inner cone fades too, towards the axis, giving a donut-shaped pattern.
/// Angles are full cone apertures in degrees; 360 is omnidirectional.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cone {
    /// Aperture of the full-gain cone, degrees.
    pub inner_angle: f32,
    /// Aperture beyond which `outer_gain` applies, degrees.
    pub outer_angle: f32,
    /// Gain outside the outer cone.
    pub outer_gain: f32,
    /// Gain on the forward axis.
    pub forward_gain: f32,
}

impl Default for Cone {
    fn default() -> Self {
        Self {
            inner_angle: 360.0,
            outer_angle: 360.0,
            outer_gain: 1.0,
            forward_gain: 1.0,
        }
    }
}

impl Cone {
    /// Gain for a listener seen at an angle whose cosine is `cos_angle`
    /// from the source's forward axis.
    pub fn gain(&self, cos_angle: f32) -> f32 {
        if !cos_angle.is_finite() {
            return 1.0;
        }
        let c = cos_angle.clamp(-1.0, 1.0);
        let inner = half_angle_cos(self.inner_angle);
        let outer = half_angle_cos(self.outer_angle).min(inner);

        let gain = if c < inner {
            if c > outer {
                1.0 + (c - inner) * (self.outer_gain - 1.0) / (outer - inner)
            } else {
                self.outer_gain
            }
        } else if self.forward_gain != 1.0 && inner < 1.0 {
            let t = (c - inner) / (1.0 - inner);
            (1.0 - t) + t * self.forward_gain
        } else {
            1.0
        };
        if gain.is_finite() { gain.max(0.0) } else { 1.0 }
    }
}

/// Cosine of half an aperture given in degrees.
fn half_angle_cos(degrees: f32) -> f32 {
    cosf(degrees.clamp(0.0, 360.0).to_radians() * 0.5)
}

/// Doppler pitch factor.
///
/// `listener_approach` is the listener's speed toward the source and
/// `source_approach` the source's speed toward the listener, both along the
/// axis between them. Receding speeds are negative. The result is capped so
/// that neither party moving at or above `speed_of_sound` produces an
/// infinite or negative pitch.
pub fn doppler_factor(listener_approach: f32, source_approach: f32, speed_of_sound: f32) -> f32 {
    let c = speed_of_sound.max(1.0);
    let num = (c + listener_approach.max(-c)).max(0.0);
    let den = (c - source_approach.min(c)).max(1.0);
    let factor = num / den;
    if factor.is_finite() { factor } else { 1.0 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_default_halves_per_doubling() {
        let d = Distance::default();
        assert_eq!(d.gain(1.0), 1.0);
        assert!((d.gain(2.0) - 0.5).abs() < 1e-6);
        assert!((d.gain(4.0) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn inverse_clamped_below_reference() {
        let d = Distance {
            model: DistanceModel::Inverse,
            ref_distance: 2.0,
            max_distance: 10.0,
            rolloff: 1.0,
            clamped: true,
        };
        assert_eq!(d.gain(0.5), 1.0);
        assert!((d.gain(4.0) - 0.5).abs() < 1e-6);
        assert_eq!(d.gain(100.0), d.gain(10.0));
    }

    #[test]
    fn linear_reaches_zero_at_max() {
        let d = Distance {
            model: DistanceModel::Linear,
            ref_distance: 0.0,
            max_distance: 10.0,
            rolloff: 1.0,
            clamped: false,
        };
        assert!((d.gain(5.0) - 0.5).abs() < 1e-6);
        assert_eq!(d.gain(20.0), 0.0);
    }

    #[test]
    fn degenerate_parameters_are_unity() {
        let d = Distance {
            ref_distance: 0.0,
            ..Distance::default()
        };
        assert_eq!(d.gain(3.0), 1.0);
        assert!(Distance::default().gain(f32::NAN).is_finite());
    }

    #[test]
    fn omnidirectional_cone_is_unity() {
        let cone = Cone::default();
        for c in [-1.0, -0.3, 0.0, 0.7, 1.0] {
            assert!((cone.gain(c) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn cone_fades_to_outer_gain() {
        let cone = Cone {
            inner_angle: 90.0,
            outer_angle: 180.0,
            outer_gain: 0.2,
            forward_gain: 1.0,
        };
        assert_eq!(cone.gain(1.0), 1.0);
        // facing away
        assert!((cone.gain(-1.0) - 0.2).abs() < 1e-6);
        // halfway between the inner (cos 45°) and outer (cos 90°) edges
        let mid = (core::f32::consts::FRAC_1_SQRT_2 + 0.0) * 0.5;
        assert!((cone.gain(mid) - 0.6).abs() < 1e-4);
    }

    #[test]
    fn forward_gain_shapes_the_inner_cone() {
        let cone = Cone {
            inner_angle: 180.0,
            outer_angle: 360.0,
            outer_gain: 1.0,
            forward_gain: 0.0,
        };
        assert!(cone.gain(1.0).abs() < 1e-6);
        assert!((cone.gain(0.5) - 0.5).abs() < 1e-4);
    }

    #[test]
    fn doppler_static_is_unity() {
        assert_eq!(doppler_factor(0.0, 0.0, SPEED_OF_SOUND), 1.0);
    }

    #[test]
    fn doppler_direction() {
        assert!(doppler_factor(0.0, 50.0, SPEED_OF_SOUND) > 1.0, "approaching source");
        assert!(doppler_factor(0.0, -50.0, SPEED_OF_SOUND) < 1.0, "receding source");
        assert!(doppler_factor(50.0, 0.0, SPEED_OF_SOUND) > 1.0, "approaching listener");
    }

    #[test]
    fn doppler_caps_supersonic_motion() {
        assert_eq!(doppler_factor(-1000.0, 0.0, SPEED_OF_SOUND), 0.0);
        let f = doppler_factor(0.0, 1000.0, SPEED_OF_SOUND);
        assert!(f.is_finite() && f > 1.0);
    }
}
