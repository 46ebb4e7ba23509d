//! Frequency filter with weighted low and high bands.
//!
//! A lowpass cascade splits every sample into a low band `lp` and its
//! complement `x - lp`. The output recombines them as
//! `lp * lf_gain + (x - lp) * hf_gain`, so one structure covers lowpass
//! (`hf_gain < lf_gain`), highpass (`lf_gain < hf_gain`) and shelving
//! responses. The slope is selected by [`FilterOrder`].
//!
//! The cutoff can be swept between two frequencies by an [`Lfo`], including
//! the envelope-follow waveform for auto-wah style filtering.

use aural_core::{
    BUTTERWORTH_Q, Effect, Lfo, LfoWaveform, MAX_TRACKS, SectionCoefficients, SectionState,
    butterworth_q, flush_denormal, one_pole_coefficient, rms,
};

/// Lowest cutoff the filter accepts, in Hz.
pub const MIN_CUTOFF: f32 = 20.0;

/// Largest number of second-order sections in the cascade.
pub const MAX_SECTIONS: usize = 4;

/// Roll-off slope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOrder {
    /// One-pole, 6 dB/octave.
    Db6,
    /// One section, 12 dB/octave.
    #[default]
    Db12,
    /// Two sections, 24 dB/octave.
    Db24,
    /// Three sections, 36 dB/octave.
    Db36,
    /// Four sections, 48 dB/octave.
    Db48,
}

impl FilterOrder {
    /// Number of second-order sections; 0 selects the one-pole path.
    pub const fn sections(self) -> usize {
        match self {
            Self::Db6 => 0,
            Self::Db12 => 1,
            Self::Db24 => 2,
            Self::Db36 => 3,
            Self::Db48 => 4,
        }
    }

    /// Slope for a section count, saturating at [`MAX_SECTIONS`].
    pub const fn from_sections(sections: usize) -> Self {
        match sections {
            0 => Self::Db6,
            1 => Self::Db12,
            2 => Self::Db24,
            3 => Self::Db36,
            _ => Self::Db48,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct TrackHistory {
    pole: f32,
    sections: [SectionState; MAX_SECTIONS],
}

/// Per-track frequency filter.
///
/// History is one state cell per section per track and persists across
/// blocks; only [`reset`](Effect::reset) clears it.
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::{FilterOrder, FrequencyFilter};
///
/// let mut filter = FrequencyFilter::new(48000.0);
/// filter.set_cutoff(1000.0);
/// filter.set_gains(1.0, 0.0);
/// filter.set_order(FilterOrder::Db24);
///
/// let mut block = [0.5f32; 64];
/// filter.process_track(0, &mut block);
/// ```
#[derive(Debug, Clone)]
pub struct FrequencyFilter {
    sample_rate: f32,
    cutoff: f32,
    lf_gain: f32,
    hf_gain: f32,
    resonance: f32,
    order: FilterOrder,
    sweep: Option<Lfo>,
    coeffs: [SectionCoefficients; MAX_SECTIONS],
    pole: f32,
    history: [TrackHistory; MAX_TRACKS],
}

impl FrequencyFilter {
    /// Creates a 12 dB/oct identity filter (both gains 1) at 1 kHz.
    pub fn new(sample_rate: f32) -> Self {
        let mut filter = Self {
            sample_rate,
            cutoff: 1000.0,
            lf_gain: 1.0,
            hf_gain: 1.0,
            resonance: BUTTERWORTH_Q,
            order: FilterOrder::Db12,
            sweep: None,
            coeffs: [SectionCoefficients::PASSTHROUGH; MAX_SECTIONS],
            pole: 1.0,
            history: [TrackHistory::default(); MAX_TRACKS],
        };
        filter.update_coefficients();
        filter
    }

    /// A lowpass at `cutoff` Hz: low band passes, high band is removed.
    pub fn lowpass(sample_rate: f32, cutoff: f32, order: FilterOrder) -> Self {
        let mut filter = Self::new(sample_rate);
        filter.set_gains(1.0, 0.0);
        filter.set_order(order);
        filter.set_cutoff(cutoff);
        filter
    }

    /// Sets the cutoff in Hz, clamped to `[MIN_CUTOFF, nyquist)`.
    /// Non-finite values are ignored.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        if !cutoff.is_finite() {
            return;
        }
        self.cutoff = cutoff.clamp(MIN_CUTOFF, self.max_cutoff());
        self.update_coefficients();
    }

    /// Current static cutoff in Hz.
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    /// Sets the low-band and high-band gains. Non-finite gains are ignored.
    pub fn set_gains(&mut self, lf_gain: f32, hf_gain: f32) {
        if lf_gain.is_finite() {
            self.lf_gain = lf_gain.clamp(0.0, 10.0);
        }
        if hf_gain.is_finite() {
            self.hf_gain = hf_gain.clamp(0.0, 10.0);
        }
    }

    /// Low-band gain.
    pub fn lf_gain(&self) -> f32 {
        self.lf_gain
    }

    /// High-band gain.
    pub fn hf_gain(&self) -> f32 {
        self.hf_gain
    }

    /// Sets the resonance (Q of a single section), clamped to `[0.01, 80]`.
    pub fn set_resonance(&mut self, q: f32) {
        if !q.is_finite() {
            return;
        }
        self.resonance = q.clamp(0.01, 80.0);
        self.update_coefficients();
    }

    /// Current resonance.
    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    /// Sets the roll-off slope.
    pub fn set_order(&mut self, order: FilterOrder) {
        self.order = order;
        self.update_coefficients();
    }

    /// Current roll-off slope.
    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// Installs or removes the cutoff sweep.
    ///
    /// The LFO output is read as a cutoff in Hz and clamped like
    /// [`set_cutoff`](Self::set_cutoff).
    pub fn set_sweep(&mut self, sweep: Option<Lfo>) {
        self.sweep = sweep.map(|mut lfo| {
            lfo.set_sample_rate(self.sample_rate);
            lfo
        });
    }

    /// The installed cutoff sweep.
    pub fn sweep(&self) -> Option<&Lfo> {
        self.sweep.as_ref()
    }

    /// Returns `true` when the filter leaves every sample unchanged.
    pub fn is_identity(&self) -> bool {
        self.lf_gain == 1.0 && self.hf_gain == 1.0
    }

    fn max_cutoff(&self) -> f32 {
        (self.sample_rate * 0.5 * 0.999).max(MIN_CUTOFF)
    }

    fn update_coefficients(&mut self) {
        let (coeffs, pole) = self.coefficients_at(self.cutoff);
        self.coeffs = coeffs;
        self.pole = pole;
    }

    fn coefficients_at(&self, cutoff: f32) -> ([SectionCoefficients; MAX_SECTIONS], f32) {
        let fc = cutoff.clamp(MIN_CUTOFF, self.max_cutoff());
        let sections = self.order.sections();
        let mut coeffs = [SectionCoefficients::PASSTHROUGH; MAX_SECTIONS];
        for (i, c) in coeffs.iter_mut().enumerate().take(sections) {
            let q = butterworth_q(sections, i, self.resonance);
            *c = SectionCoefficients::lowpass(fc, q, self.sample_rate);
        }
        (coeffs, one_pole_coefficient(fc, self.sample_rate))
    }
}

impl Effect for FrequencyFilter {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        if track >= MAX_TRACKS || block.is_empty() {
            return;
        }

        let swept = match self.sweep.as_mut() {
            Some(lfo) => {
                if lfo.waveform() == LfoWaveform::Envelope {
                    lfo.follow(track, rms(block));
                }
                Some(lfo.value(track))
            }
            None => None,
        };
        let (coeffs, pole) = match swept {
            Some(fc) => self.coefficients_at(fc),
            None => (self.coeffs, self.pole),
        };

        let sections = self.order.sections();
        let (lf, hf) = (self.lf_gain, self.hf_gain);
        let passthrough = lf == hf;
        let history = &mut self.history[track];

        for sample in block.iter_mut() {
            let x = *sample;
            let lp = if sections == 0 {
                history.pole = flush_denormal(history.pole + pole * (x - history.pole));
                history.pole
            } else {
                let mut y = x;
                for (state, c) in history.sections[..sections].iter_mut().zip(&coeffs) {
                    y = state.process(c, y);
                }
                y
            };
            // equal gains: keep the history running, skip the band split
            *sample = if passthrough {
                x * lf
            } else {
                lp * lf + (x - lp) * hf
            };
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        if let Some(lfo) = self.sweep.as_mut() {
            lfo.set_sample_rate(sample_rate);
        }
        self.cutoff = self.cutoff.clamp(MIN_CUTOFF, self.max_cutoff());
        self.update_coefficients();
    }

    fn reset(&mut self) {
        self.history = [TrackHistory::default(); MAX_TRACKS];
        if let Some(lfo) = self.sweep.as_mut() {
            lfo.reset();
        }
    }

    fn end_block(&mut self, frames: usize) {
        if let Some(lfo) = self.sweep.as_mut() {
            lfo.advance(frames);
        }
    }
}
