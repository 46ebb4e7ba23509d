//! Two-band equalizer.
//!
//! Two [`FrequencyFilter`]s in series: the low filter splits at the lower
//! crossover, the high filter at the upper one. Each weights its own low and
//! high band, so the pair covers shelving, band-pass and band-stop shapes.

use aural_core::Effect;

use crate::filter::{FilterOrder, FrequencyFilter};

/// Closest the two crossovers may sit before they are pushed apart, in Hz.
const MIN_SPLIT: f32 = 200.0;

/// One equalizer band: crossover, low/high band gains and resonance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    /// Crossover frequency in Hz.
    pub cutoff: f32,
    /// Gain below the crossover.
    pub lf_gain: f32,
    /// Gain above the crossover.
    pub hf_gain: f32,
    /// Resonance at the crossover.
    pub resonance: f32,
}

/// Two-band equalizer.
///
/// ## Parameters
///
/// | Slot | Values |
/// |------|--------|
/// | 0 | low crossover, gain below, gain above, resonance |
/// | 1 | high crossover, gain below, gain above, resonance |
///
/// Crossovers closer than 200 Hz are spread to 0.9× and 1.1×; reversed
/// crossovers are swapped.
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::equalizer::{Band, Equalizer};
///
/// let mut eq = Equalizer::new(48000.0);
/// eq.set_bands(
///     Band { cutoff: 200.0, lf_gain: 0.5, hf_gain: 1.0, resonance: 0.7071 },
///     Band { cutoff: 6000.0, lf_gain: 1.0, hf_gain: 1.5, resonance: 0.7071 },
/// );
/// let mut block = [0.25f32; 64];
/// eq.process_track(0, &mut block);
/// ```
#[derive(Debug, Clone)]
pub struct Equalizer {
    low: FrequencyFilter,
    high: FrequencyFilter,
}

impl Equalizer {
    /// Creates a flat equalizer.
    pub fn new(sample_rate: f32) -> Self {
        Self {
            low: FrequencyFilter::new(sample_rate),
            high: FrequencyFilter::new(sample_rate),
        }
    }

    /// Configures both bands. Non-finite values keep the previous setting.
    pub fn set_bands(&mut self, low: Band, high: Band) {
        let (mut fl, mut fh) = (low.cutoff, high.cutoff);
        if fl.is_finite() && fh.is_finite() {
            if (fh - fl).abs() < MIN_SPLIT {
                fl *= 0.9;
                fh *= 1.1;
            } else if fh < fl {
                core::mem::swap(&mut fl, &mut fh);
            }
        }
        configure(&mut self.low, fl, low);
        configure(&mut self.high, fh, high);
    }

    /// Sets the roll-off of both bands.
    pub fn set_order(&mut self, order: FilterOrder) {
        self.low.set_order(order);
        self.high.set_order(order);
    }

    /// Crossover frequencies after ordering, `(low, high)`.
    pub fn crossovers(&self) -> (f32, f32) {
        (self.low.cutoff(), self.high.cutoff())
    }

    /// Returns `true` when both bands are flat.
    pub fn is_identity(&self) -> bool {
        self.low.is_identity() && self.high.is_identity()
    }
}

fn configure(filter: &mut FrequencyFilter, cutoff: f32, band: Band) {
    filter.set_cutoff(cutoff);
    filter.set_gains(band.lf_gain, band.hf_gain);
    filter.set_resonance(band.resonance);
}

impl Effect for Equalizer {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        if !self.low.is_identity() {
            self.low.process_track(track, block);
        }
        if !self.high.is_identity() {
            self.high.process_track(track, block);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.low.set_sample_rate(sample_rate);
        self.high.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.low.reset();
        self.high.reset();
    }
}
