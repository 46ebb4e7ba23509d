//! Filter-or-effect descriptors.
//!
//! A [`Dsp`] is the value callers hand to a node: its kind, up to four
//! parameter slots of four values each, an enable flag and a small amount
//! of mode state (LFO waveform, roll-off, distance model, flags). The kind
//! is fixed at construction; every parameter write goes through the range
//! table in [`DspKind::param`], so the render path only ever sees validated
//! values.
//!
//! ## Slot layout
//!
//! | Kind | Slot 0 | Slot 1 |
//! |------|--------|--------|
//! | Frequency | cutoff, lf gain, hf gain, resonance | cutoff hf, -, -, sweep rate |
//! | Volume | gain, min gain, max gain, - | |
//! | Distance | ref distance, max distance, rolloff, - | |
//! | Equalizer | low cutoff, lf gain, hf gain, resonance | high cutoff, lf gain, hf gain, resonance |
//! | Dynamic gain | rate, depth, -, - | |
//! | Directional | inner angle, outer angle, outer gain, forward gain | |
//! | Pitch | pitch, max pitch, -, - | |
//! | Distortion | factor, clipping, mix, asymmetry | |
//! | Phasing / Chorus / Flanging / Echo | gain, LFO rate, LFO depth, LFO offset | cutoff, cutoff hf, feedback, resonance |
//! | Reverb | cutoff, delay depth, decay level, decay depth | |
//! | Velocity | speed of sound, doppler factor, -, - | |

use aural_core::{BUTTERWORTH_Q, DistanceModel, LfoWaveform, SPEED_OF_SOUND};

use crate::delay::DelayMode;
use crate::filter::FilterOrder;

/// Number of parameter slots per descriptor.
pub const MAX_SLOTS: usize = 4;

/// Parameters per slot.
pub const SLOT_PARAMS: usize = 4;

/// Filter kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterType {
    /// Low/high band filter with optional cutoff sweep.
    Frequency,
    /// Static gain with limits.
    Volume,
    /// Distance attenuation curve.
    Distance,
    /// Two-band equalizer.
    Equalizer,
    /// LFO-driven gain (tremolo).
    DynamicGain,
    /// Emission cone of a source.
    Directional,
}

/// Effect kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EffectType {
    /// Playback pitch multiplier.
    Pitch,
    /// Waveshaping distortion.
    Distortion,
    /// Very short modulated delay.
    Phasing,
    /// Modulated delay.
    Chorus,
    /// Short modulated delay with loopback.
    Flanging,
    /// Feedback delay line.
    Echo,
    /// Reflections and loopback reverberation.
    Reverb,
    /// Speed of sound and doppler scaling.
    Velocity,
}

impl EffectType {
    /// Delay mode of the delay-family kinds.
    pub const fn delay_mode(self) -> Option<DelayMode> {
        match self {
            Self::Phasing => Some(DelayMode::Phasing),
            Self::Chorus => Some(DelayMode::Chorus),
            Self::Flanging => Some(DelayMode::Flanging),
            Self::Echo => Some(DelayMode::Echo),
            _ => None,
        }
    }
}

/// Kind of a descriptor, usable as a lookup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DspKind {
    /// A filter.
    Filter(FilterType),
    /// An effect.
    Effect(EffectType),
}

/// Description of one parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamRange {
    /// Display name.
    pub name: &'static str,
    /// Minimum value.
    pub min: f32,
    /// Maximum value.
    pub max: f32,
    /// Default value.
    pub default: f32,
}

impl ParamRange {
    const fn new(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            min,
            max,
            default,
        }
    }

    /// Clamps `value` into the range.
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }
}

const NYQUIST_MAX: f32 = 22050.0;

const DELAY_SLOTS: [[Option<ParamRange>; SLOT_PARAMS]; 2] = [
    [
        Some(ParamRange::new("gain", 0.0, 1.0, 0.5)),
        Some(ParamRange::new("rate", 0.0, 10.0, 0.0)),
        Some(ParamRange::new("depth", 0.0, 1.0, 0.0)),
        Some(ParamRange::new("offset", 0.0, 1.0, 0.5)),
    ],
    [
        Some(ParamRange::new("cutoff", 20.0, NYQUIST_MAX, NYQUIST_MAX)),
        Some(ParamRange::new("cutoff_hf", 20.0, NYQUIST_MAX, NYQUIST_MAX)),
        Some(ParamRange::new("feedback", 0.0, 0.99, 0.0)),
        Some(ParamRange::new("resonance", 0.01, 80.0, BUTTERWORTH_Q)),
    ],
];

const EQ_SLOTS: [[Option<ParamRange>; SLOT_PARAMS]; 2] = [
    [
        Some(ParamRange::new("low_cutoff", 20.0, NYQUIST_MAX, 500.0)),
        Some(ParamRange::new("low_lf_gain", 0.0, 10.0, 1.0)),
        Some(ParamRange::new("low_hf_gain", 0.0, 10.0, 1.0)),
        Some(ParamRange::new("low_resonance", 0.01, 80.0, BUTTERWORTH_Q)),
    ],
    [
        Some(ParamRange::new("high_cutoff", 20.0, NYQUIST_MAX, 8000.0)),
        Some(ParamRange::new("high_lf_gain", 0.0, 10.0, 1.0)),
        Some(ParamRange::new("high_hf_gain", 0.0, 10.0, 1.0)),
        Some(ParamRange::new("high_resonance", 0.01, 80.0, BUTTERWORTH_Q)),
    ],
];

impl DspKind {
    /// Every kind, filters first.
    pub const ALL: [DspKind; 14] = [
        DspKind::Filter(FilterType::Frequency),
        DspKind::Filter(FilterType::Volume),
        DspKind::Filter(FilterType::Distance),
        DspKind::Filter(FilterType::Equalizer),
        DspKind::Filter(FilterType::DynamicGain),
        DspKind::Filter(FilterType::Directional),
        DspKind::Effect(EffectType::Pitch),
        DspKind::Effect(EffectType::Distortion),
        DspKind::Effect(EffectType::Phasing),
        DspKind::Effect(EffectType::Chorus),
        DspKind::Effect(EffectType::Flanging),
        DspKind::Effect(EffectType::Echo),
        DspKind::Effect(EffectType::Reverb),
        DspKind::Effect(EffectType::Velocity),
    ];

    /// Lower-case name used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Filter(FilterType::Frequency) => "frequency",
            Self::Filter(FilterType::Volume) => "volume",
            Self::Filter(FilterType::Distance) => "distance",
            Self::Filter(FilterType::Equalizer) => "equalizer",
            Self::Filter(FilterType::DynamicGain) => "dynamic_gain",
            Self::Filter(FilterType::Directional) => "directional",
            Self::Effect(EffectType::Pitch) => "pitch",
            Self::Effect(EffectType::Distortion) => "distortion",
            Self::Effect(EffectType::Phasing) => "phasing",
            Self::Effect(EffectType::Chorus) => "chorus",
            Self::Effect(EffectType::Flanging) => "flanging",
            Self::Effect(EffectType::Echo) => "echo",
            Self::Effect(EffectType::Reverb) => "reverb",
            Self::Effect(EffectType::Velocity) => "velocity",
        }
    }

    /// Looks a kind up by its [`name`](Self::name).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name().eq_ignore_ascii_case(name))
    }

    /// Range of parameter `index` in `slot`, or `None` if unused.
    pub fn param(self, slot: usize, index: usize) -> Option<ParamRange> {
        if index >= SLOT_PARAMS {
            return None;
        }
        let range = |name, min, max, default| Some(ParamRange::new(name, min, max, default));
        match (self, slot) {
            (Self::Filter(FilterType::Frequency), 0) => match index {
                0 => range("cutoff", 20.0, NYQUIST_MAX, 1000.0),
                1 => range("lf_gain", 0.0, 10.0, 1.0),
                2 => range("hf_gain", 0.0, 10.0, 1.0),
                _ => range("resonance", 0.01, 80.0, BUTTERWORTH_Q),
            },
            (Self::Filter(FilterType::Frequency), 1) => match index {
                0 => range("cutoff_hf", 20.0, NYQUIST_MAX, 1000.0),
                3 => range("sweep_rate", 0.0, 50.0, 0.0),
                _ => None,
            },
            (Self::Filter(FilterType::Volume), 0) => match index {
                0 => range("gain", 0.0, 10.0, 1.0),
                1 => range("min_gain", 0.0, 10.0, 0.0),
                2 => range("max_gain", 0.0, 10.0, 10.0),
                _ => None,
            },
            (Self::Filter(FilterType::Distance), 0) => match index {
                0 => range("ref_distance", 0.0, f32::MAX, 1.0),
                1 => range("max_distance", 0.1, f32::MAX, f32::MAX),
                2 => range("rolloff", 0.0, 10.0, 1.0),
                _ => None,
            },
            (Self::Filter(FilterType::Equalizer), s @ (0 | 1)) => EQ_SLOTS[s][index],
            (Self::Filter(FilterType::DynamicGain), 0) => match index {
                0 => range("rate", 0.0, 50.0, 1.0),
                1 => range("depth", 0.0, 1.0, 0.5),
                _ => None,
            },
            (Self::Filter(FilterType::Directional), 0) => match index {
                0 => range("inner_angle", 0.0, 360.0, 360.0),
                1 => range("outer_angle", 0.0, 360.0, 360.0),
                2 => range("outer_gain", 0.0, 1.0, 1.0),
                _ => range("forward_gain", 0.0, 1.0, 1.0),
            },
            (Self::Effect(EffectType::Pitch), 0) => match index {
                0 => range("pitch", 0.01, 4.0, 1.0),
                1 => range("max_pitch", 0.01, 4.0, 4.0),
                _ => None,
            },
            (Self::Effect(EffectType::Distortion), 0) => match index {
                0 => range("factor", 0.0, 1.0, 0.3),
                1 => range("clipping", 0.0, 1.0, 0.3),
                2 => range("mix", 0.0, 1.0, 1.0),
                _ => range("asymmetry", 0.0, 1.0, 0.0),
            },
            (Self::Effect(e), s @ (0 | 1)) if e.delay_mode().is_some() => DELAY_SLOTS[s][index],
            (Self::Effect(EffectType::Reverb), 0) => match index {
                0 => range("cutoff", 50.0, 22000.0, 10000.0),
                1 => range("delay_depth", 0.0, 0.07, 0.035),
                2 => range("decay_level", 0.0, 1.0, 0.5),
                _ => range("decay_depth", 0.0, 0.7, 0.35),
            },
            (Self::Effect(EffectType::Velocity), 0) => match index {
                0 => range("speed_of_sound", 1.0, f32::MAX, SPEED_OF_SOUND),
                1 => range("doppler_factor", 0.0, 10.0, 1.0),
                _ => None,
            },
            _ => None,
        }
    }

    /// Finds `(slot, index)` of a parameter by name.
    pub fn param_by_name(self, name: &str) -> Option<(usize, usize)> {
        (0..MAX_SLOTS)
            .flat_map(|s| (0..SLOT_PARAMS).map(move |i| (s, i)))
            .find(|&(s, i)| self.param(s, i).is_some_and(|p| p.name == name))
    }

    fn defaults(self) -> [[f32; SLOT_PARAMS]; MAX_SLOTS] {
        let mut slots = [[0.0; SLOT_PARAMS]; MAX_SLOTS];
        for (s, slot) in slots.iter_mut().enumerate() {
            for (i, v) in slot.iter_mut().enumerate() {
                if let Some(p) = self.param(s, i) {
                    *v = p.default;
                }
            }
        }
        slots
    }
}

/// Mode bits of a descriptor.
///
/// ```rust
/// use aural_effects::DspFlags;
///
/// let flags = DspFlags::INVERSE.union(DspFlags::CLAMPED);
/// assert!(flags.contains(DspFlags::INVERSE));
/// assert!(!flags.contains(DspFlags::UNLINKED));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DspFlags(u8);

impl DspFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Run the LFO from its maximum down to its minimum.
    pub const INVERSE: Self = Self(1 << 0);
    /// Give every track its own LFO phase.
    pub const UNLINKED: Self = Self(1 << 1);
    /// Clamp distances to `[ref_distance, max_distance]`.
    pub const CLAMPED: Self = Self(1 << 2);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two flag sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Slots and state shared by both descriptor variants.
#[derive(Debug, Clone, PartialEq)]
pub struct Params {
    slots: [[f32; SLOT_PARAMS]; MAX_SLOTS],
    enabled: bool,
    waveform: LfoWaveform,
    order: FilterOrder,
    distance: DistanceModel,
    flags: DspFlags,
}

/// A filter or an effect with its parameters.
///
/// # Example
///
/// ```rust
/// use aural_effects::{Dsp, EffectType};
///
/// let mut chorus = Dsp::effect(EffectType::Chorus);
/// assert!(!chorus.is_enabled());
/// assert!(chorus.set(0, 0, 0.8));
/// assert!(!chorus.set(0, 0, f32::NAN));
/// chorus.set(0, 2, 5.0); // clamped
/// assert_eq!(chorus.get(0, 2), Some(1.0));
/// chorus.set_enabled(true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Dsp {
    /// A filter stage.
    Filter {
        /// Filter kind.
        kind: FilterType,
        /// Parameters.
        params: Params,
    },
    /// An effect stage.
    Effect {
        /// Effect kind.
        kind: EffectType,
        /// Parameters.
        params: Params,
    },
}

impl Dsp {
    /// A disabled filter with default parameters.
    pub fn filter(kind: FilterType) -> Self {
        Self::Filter {
            kind,
            params: Params::defaults(DspKind::Filter(kind)),
        }
    }

    /// A disabled effect with default parameters.
    pub fn effect(kind: EffectType) -> Self {
        Self::Effect {
            kind,
            params: Params::defaults(DspKind::Effect(kind)),
        }
    }

    /// A disabled descriptor of `kind` with default parameters.
    pub fn new(kind: DspKind) -> Self {
        match kind {
            DspKind::Filter(f) => Self::filter(f),
            DspKind::Effect(e) => Self::effect(e),
        }
    }

    /// Kind of this descriptor.
    pub fn kind(&self) -> DspKind {
        match self {
            Self::Filter { kind, .. } => DspKind::Filter(*kind),
            Self::Effect { kind, .. } => DspKind::Effect(*kind),
        }
    }

    /// Parameters and state.
    pub fn params(&self) -> &Params {
        match self {
            Self::Filter { params, .. } | Self::Effect { params, .. } => params,
        }
    }

    fn params_mut(&mut self) -> &mut Params {
        match self {
            Self::Filter { params, .. } | Self::Effect { params, .. } => params,
        }
    }

    /// Value of parameter `index` in `slot`, or `None` if unused.
    pub fn get(&self, slot: usize, index: usize) -> Option<f32> {
        self.kind().param(slot, index)?;
        Some(self.params().slots[slot][index])
    }

    /// Sets parameter `index` in `slot`, clamped to its range.
    ///
    /// Returns `false` and leaves the descriptor unchanged for an unused
    /// parameter or a non-finite value.
    pub fn set(&mut self, slot: usize, index: usize, value: f32) -> bool {
        let Some(range) = self.kind().param(slot, index) else {
            return false;
        };
        if !value.is_finite() {
            return false;
        }
        self.params_mut().slots[slot][index] = range.clamp(value);
        true
    }

    /// Sets a parameter by name.
    pub fn set_named(&mut self, name: &str, value: f32) -> bool {
        match self.kind().param_by_name(name) {
            Some((slot, index)) => self.set(slot, index, value),
            None => false,
        }
    }

    /// The four values of `slot`; unused parameters read as 0.
    pub fn slot(&self, slot: usize) -> Option<[f32; SLOT_PARAMS]> {
        self.params().slots.get(slot).copied()
    }

    /// Sets every used parameter of `slot`. Returns `false` if any value was
    /// rejected; accepted values are kept.
    pub fn set_slot(&mut self, slot: usize, values: [f32; SLOT_PARAMS]) -> bool {
        if slot >= MAX_SLOTS {
            return false;
        }
        let mut ok = true;
        for (index, value) in values.into_iter().enumerate() {
            if self.kind().param(slot, index).is_some() {
                ok &= self.set(slot, index, value);
            }
        }
        ok
    }

    /// Returns `true` if the stage is armed.
    pub fn is_enabled(&self) -> bool {
        self.params().enabled
    }

    /// Arms or disarms the stage.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.params_mut().enabled = enabled;
    }

    /// LFO waveform of modulated kinds.
    pub fn waveform(&self) -> LfoWaveform {
        self.params().waveform
    }

    /// Sets the LFO waveform.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.params_mut().waveform = waveform;
    }

    /// Roll-off of filtering kinds.
    pub fn order(&self) -> FilterOrder {
        self.params().order
    }

    /// Sets the roll-off.
    pub fn set_order(&mut self, order: FilterOrder) {
        self.params_mut().order = order;
    }

    /// Distance curve of the distance filter.
    pub fn distance_model(&self) -> DistanceModel {
        self.params().distance
    }

    /// Sets the distance curve.
    pub fn set_distance_model(&mut self, model: DistanceModel) {
        self.params_mut().distance = model;
    }

    /// Mode bits.
    pub fn flags(&self) -> DspFlags {
        self.params().flags
    }

    /// Replaces the mode bits.
    pub fn set_flags(&mut self, flags: DspFlags) {
        self.params_mut().flags = flags;
    }
}

impl Params {
    fn defaults(kind: DspKind) -> Self {
        Self {
            slots: kind.defaults(),
            enabled: false,
            waveform: LfoWaveform::Triangle,
            order: FilterOrder::Db12,
            distance: DistanceModel::Exponential,
            flags: DspFlags::NONE,
        }
    }

    /// Raw slot values.
    pub fn slots(&self) -> &[[f32; SLOT_PARAMS]; MAX_SLOTS] {
        &self.slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_range_table() {
        let reverb = Dsp::effect(EffectType::Reverb);
        assert_eq!(reverb.slot(0), Some([10000.0, 0.035, 0.5, 0.35]));
        let freq = Dsp::filter(FilterType::Frequency);
        assert_eq!(freq.get(0, 1), Some(1.0));
        assert_eq!(freq.get(0, 2), Some(1.0));
    }

    #[test]
    fn unused_params_are_rejected() {
        let mut pitch = Dsp::effect(EffectType::Pitch);
        assert!(!pitch.set(0, 3, 1.0));
        assert_eq!(pitch.get(0, 3), None);
        assert!(!pitch.set(7, 0, 1.0));
        assert_eq!(pitch.get(2, 0), None);
    }

    #[test]
    fn values_are_clamped_at_the_setter() {
        let mut dist = Dsp::effect(EffectType::Distortion);
        assert!(dist.set(0, 0, 3.0));
        assert_eq!(dist.get(0, 0), Some(1.0));
        assert!(!dist.set(0, 1, f32::INFINITY));
        assert_eq!(dist.get(0, 1), Some(0.3));
    }

    #[test]
    fn delay_family_shares_layout() {
        for e in [
            EffectType::Phasing,
            EffectType::Chorus,
            EffectType::Flanging,
            EffectType::Echo,
        ] {
            let kind = DspKind::Effect(e);
            assert_eq!(kind.param_by_name("feedback"), Some((1, 2)));
            assert!(e.delay_mode().is_some());
        }
        assert!(EffectType::Reverb.delay_mode().is_none());
    }

    #[test]
    fn names_round_trip() {
        for kind in DspKind::ALL {
            assert_eq!(DspKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(DspKind::from_name("Chorus"), Some(DspKind::Effect(EffectType::Chorus)));
        assert_eq!(DspKind::from_name("wah"), None);
    }

    #[test]
    fn equalizer_and_cone_layouts() {
        let eq = DspKind::Filter(FilterType::Equalizer);
        assert_eq!(eq.param_by_name("high_hf_gain"), Some((1, 2)));
        assert_eq!(Dsp::new(eq).slot(1), Some([8000.0, 1.0, 1.0, BUTTERWORTH_Q]));

        let mut cone = Dsp::filter(FilterType::Directional);
        assert_eq!(cone.slot(0), Some([360.0, 360.0, 1.0, 1.0]));
        assert!(cone.set_named("outer_gain", 3.0));
        assert_eq!(cone.get(0, 2), Some(1.0));

        let tremolo = Dsp::filter(FilterType::DynamicGain);
        assert_eq!(tremolo.get(0, 1), Some(0.5));
        assert_eq!(tremolo.get(0, 2), None);
    }

    #[test]
    fn set_slot_reports_rejections() {
        let mut vol = Dsp::filter(FilterType::Volume);
        assert!(vol.set_slot(0, [0.5, 0.0, 2.0, 99.0]));
        assert_eq!(vol.get(0, 0), Some(0.5));
        assert!(!vol.set_slot(0, [f32::NAN, 0.0, 2.0, 0.0]));
        assert_eq!(vol.get(0, 0), Some(0.5));
    }

    #[test]
    fn variant_is_fixed_at_construction() {
        let dsp = Dsp::new(DspKind::Filter(FilterType::Distance));
        assert!(matches!(dsp, Dsp::Filter { kind: FilterType::Distance, .. }));
        assert_eq!(dsp.kind(), DspKind::Filter(FilterType::Distance));
    }
}
