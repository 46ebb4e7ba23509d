//! Low Frequency Oscillator for modulated parameters.
//!
//! Drives the tap offset of delay-family effects and the cutoff sweep of the
//! frequency filter. Unlike an audio-rate oscillator the output is a value
//! between a configured `min` and `max` (samples, Hz, ...), evaluated per
//! track and per block.

use core::f32::consts::PI;
use libm::{floorf, sinf};

/// Maximum number of tracks an LFO keeps separate state for.
pub const MAX_TRACKS: usize = 8;

/// Phase spread between unlinked tracks, in cycles.
const TRACK_SPREAD: f32 = 0.25;

/// LFO waveform type
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LfoWaveform {
    /// Linear ramp up then down
    #[default]
    Triangle,
    /// Sinusoid
    Sine,
    /// Alternates between `min` and `max`
    Square,
    /// Rising ramp with a hard reset
    Sawtooth,
    /// Follows the level fed through [`Lfo::follow`] instead of oscillating.
    Envelope,
}

/// Low Frequency Oscillator producing a value between `min` and `max`.
///
/// Phase is accumulated per sample with [`advance`](Lfo::advance). Tracks
/// share one phase when stereo-linked; otherwise each track is offset by a
/// quarter cycle so multichannel chorus and phasing decorrelate.
///
/// # Example
///
/// ```rust
/// use aural_core::{Lfo, LfoWaveform};
///
/// let mut lfo = Lfo::new(48000.0, 0.5);
/// lfo.set_waveform(LfoWaveform::Sine);
/// lfo.set_range(48.0, 480.0);
///
/// lfo.advance(256);
/// let offset = lfo.value(0);
/// assert!((48.0..=480.0).contains(&offset));
/// ```
#[derive(Debug, Clone)]
pub struct Lfo {
    /// Current phase position [0.0, 1.0)
    phase: f32,
    /// Phase increment per sample
    phase_inc: f32,
    sample_rate: f32,
    waveform: LfoWaveform,
    min: f32,
    max: f32,
    inverse: bool,
    stereo_link: bool,
    /// Per-track follower level for [`LfoWaveform::Envelope`].
    envelope: [f32; MAX_TRACKS],
}

impl Default for Lfo {
    fn default() -> Self {
        Self::new(48000.0, 1.0)
    }
}

impl Lfo {
    /// Create new LFO with given sample rate and frequency, range `[0, 1]`.
    pub fn new(sample_rate: f32, freq_hz: f32) -> Self {
        Self {
            phase: 0.0,
            phase_inc: freq_hz / sample_rate,
            sample_rate,
            waveform: LfoWaveform::Triangle,
            min: 0.0,
            max: 1.0,
            inverse: false,
            stereo_link: true,
            envelope: [0.0; MAX_TRACKS],
        }
    }

    /// Set frequency in Hz
    pub fn set_frequency(&mut self, freq_hz: f32) {
        self.phase_inc = freq_hz.max(0.0) / self.sample_rate;
    }

    /// Get current frequency in Hz
    pub fn frequency(&self) -> f32 {
        self.phase_inc * self.sample_rate
    }

    /// Set waveform
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.waveform = waveform;
    }

    /// Get current waveform
    pub fn waveform(&self) -> LfoWaveform {
        self.waveform
    }

    /// Sets the output range. Arguments may be given in either order.
    pub fn set_range(&mut self, min: f32, max: f32) {
        self.min = min.min(max);
        self.max = max.max(min);
    }

    /// Lower bound of the output.
    pub fn min(&self) -> f32 {
        self.min
    }

    /// Upper bound of the output.
    pub fn max(&self) -> f32 {
        self.max
    }

    /// Runs the waveform from `max` down to `min`.
    pub fn set_inverse(&mut self, inverse: bool) {
        self.inverse = inverse;
    }

    /// Shares one phase across all tracks.
    pub fn set_stereo_link(&mut self, linked: bool) {
        self.stereo_link = linked;
    }

    /// Reset phase to 0
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.envelope = [0.0; MAX_TRACKS];
    }

    /// Sync phase to a specific value (0.0 - 1.0)
    pub fn set_phase(&mut self, phase: f32) {
        self.phase = phase.clamp(0.0, 1.0);
    }

    /// Get current phase (0.0 - 1.0)
    pub fn phase(&self) -> f32 {
        self.phase
    }

    /// Returns `true` when the output cannot change: no rate, or a range
    /// narrower than `epsilon`.
    pub fn is_constant(&self, epsilon: f32) -> bool {
        (self.phase_inc == 0.0 && self.waveform != LfoWaveform::Envelope)
            || (self.max - self.min) < epsilon
    }

    /// Advances the phase by `samples`.
    #[inline]
    pub fn advance(&mut self, samples: usize) {
        self.phase += self.phase_inc * samples as f32;
        if self.phase >= 1.0 {
            self.phase -= floorf(self.phase);
        }
    }

    /// Feeds the envelope follower of `track` with a block level in `[0, 1]`.
    pub fn follow(&mut self, track: usize, level: f32) {
        if let Some(env) = self.envelope.get_mut(track) {
            *env = if level.is_finite() {
                level.clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
    }

    /// Current output for `track`, between `min` and `max`.
    #[inline]
    pub fn value(&self, track: usize) -> f32 {
        let mut unit = self.unipolar(track);
        if self.inverse {
            unit = 1.0 - unit;
        }
        self.min + (self.max - self.min) * unit
    }

    /// Waveform position in `[0, 1]` for `track`.
    fn unipolar(&self, track: usize) -> f32 {
        let phase = if self.stereo_link {
            self.phase
        } else {
            let p = self.phase + (track % MAX_TRACKS) as f32 * TRACK_SPREAD;
            p - floorf(p)
        };

        match self.waveform {
            LfoWaveform::Sine => 0.5 + 0.5 * sinf(phase * 2.0 * PI),
            LfoWaveform::Triangle => {
                if phase < 0.5 {
                    2.0 * phase
                } else {
                    2.0 - 2.0 * phase
                }
            }
            LfoWaveform::Sawtooth => phase,
            LfoWaveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    0.0
                }
            }
            LfoWaveform::Envelope => self.envelope[track % MAX_TRACKS],
        }
    }

    /// Set sample rate
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        let freq = self.frequency();
        self.sample_rate = sample_rate;
        self.set_frequency(freq);
    }
}
