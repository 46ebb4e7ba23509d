//! Per-node effects chain.
//!
//! An [`EffectsChain`] owns the processing stages of one node and the
//! [`Dsp`] descriptors that configure them. Stages run in a fixed order:
//!
//! ```text
//! in ─► distortion ─► frequency filter ─► equalizer ─► delay family
//!    ─► reverb ─► dynamic gain ─► volume ─► out
//! ```
//!
//! Pitch, velocity, distance and directional descriptors carry no stage of
//! their own; the node graph reads them through
//! [`pitch`](EffectsChain::pitch), [`velocity`](EffectsChain::velocity),
//! [`distance`](EffectsChain::distance) and [`cone`](EffectsChain::cone). Only one delay-family effect is
//! active per chain: setting chorus replaces a phasing descriptor.
//!
//! Re-setting a descriptor reconfigures its stage in place, so history
//! (filter memory, delay lines, reverb tails) survives parameter changes.
//! A stage whose output turns non-finite is disarmed and the block it
//! produced is replaced by its input.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use aural_core::{Cone, Distance, Effect, Lfo, LfoWaveform, MAX_TRACKS, all_finite, scale};

use crate::delay::{DelayEffect, DelayMode};
use crate::distortion::Distortion;
use crate::dsp::{Dsp, DspFlags, DspKind, EffectType, FilterType};
use crate::dynamic_gain::DynamicGain;
use crate::equalizer::{Band, Equalizer};
use crate::filter::FrequencyFilter;
use crate::reverb::Reverb;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Distortion,
    Filter,
    Equalizer,
    Delay,
    Reverb,
    DynamicGain,
}

const STAGES: usize = Stage::ORDER.len();

impl Stage {
    const ORDER: [Stage; 6] = [
        Stage::Distortion,
        Stage::Filter,
        Stage::Equalizer,
        Stage::Delay,
        Stage::Reverb,
        Stage::DynamicGain,
    ];

    fn of(kind: DspKind) -> Option<Self> {
        match kind {
            DspKind::Filter(FilterType::Frequency) => Some(Self::Filter),
            DspKind::Filter(FilterType::Equalizer) => Some(Self::Equalizer),
            DspKind::Filter(FilterType::DynamicGain) => Some(Self::DynamicGain),
            DspKind::Effect(EffectType::Distortion) => Some(Self::Distortion),
            DspKind::Effect(EffectType::Reverb) => Some(Self::Reverb),
            DspKind::Effect(e) if e.delay_mode().is_some() => Some(Self::Delay),
            _ => None,
        }
    }

    #[cfg(feature = "tracing")]
    fn name(self) -> &'static str {
        match self {
            Self::Distortion => "distortion",
            Self::Filter => "frequency",
            Self::Equalizer => "equalizer",
            Self::Delay => "delay",
            Self::Reverb => "reverb",
            Self::DynamicGain => "dynamic_gain",
        }
    }
}

/// Ordered processing stages of one node.
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::{Dsp, DspKind, EffectType, EffectsChain, FilterType};
///
/// let mut chain = EffectsChain::new(48000.0, 2, 256);
///
/// let mut lowpass = Dsp::filter(FilterType::Frequency);
/// lowpass.set_slot(0, [2000.0, 1.0, 0.0, 0.7071]);
/// lowpass.set_enabled(true);
/// chain.set(lowpass);
///
/// let mut echo = Dsp::effect(EffectType::Echo);
/// echo.set_named("feedback", 0.4);
/// echo.set_enabled(true);
/// chain.set(echo);
///
/// let mut block = [0.1f32; 256];
/// chain.process_track(0, &mut block);
/// chain.process_track(1, &mut block);
/// chain.end_block(256);
///
/// assert!(chain.get(DspKind::Effect(EffectType::Echo)).is_some());
/// ```
#[derive(Debug, Clone)]
pub struct EffectsChain {
    sample_rate: f32,
    tracks: usize,
    max_block: usize,
    dsps: Vec<Dsp>,
    distortion: Option<Distortion>,
    filter: Option<FrequencyFilter>,
    equalizer: Option<Equalizer>,
    delay: Option<DelayEffect>,
    reverb: Option<Reverb>,
    dynamic_gain: Option<DynamicGain>,
    armed: [bool; STAGES],
    faulted: [bool; STAGES],
    volume: f32,
    dry: Vec<f32>,
}

impl EffectsChain {
    /// Creates an empty chain for `tracks` tracks and blocks of up to
    /// `max_block` samples.
    pub fn new(sample_rate: f32, tracks: usize, max_block: usize) -> Self {
        let max_block = max_block.max(1);
        Self {
            sample_rate,
            tracks: tracks.clamp(1, MAX_TRACKS),
            max_block,
            dsps: Vec::new(),
            distortion: None,
            filter: None,
            equalizer: None,
            delay: None,
            reverb: None,
            dynamic_gain: None,
            armed: [false; STAGES],
            faulted: [false; STAGES],
            volume: 1.0,
            dry: vec![0.0; max_block],
        }
    }

    /// Installs or replaces the descriptor of `dsp`'s kind and reconfigures
    /// its stage. A previously disarmed stage is re-armed.
    pub fn set(&mut self, dsp: Dsp) {
        let kind = dsp.kind();
        let stage = Stage::of(kind);
        if stage == Some(Stage::Delay) {
            self.dsps
                .retain(|d| Stage::of(d.kind()) != Some(Stage::Delay) || d.kind() == kind);
        }
        match self.dsps.iter_mut().find(|d| d.kind() == kind) {
            Some(slot) => *slot = dsp,
            None => self.dsps.push(dsp),
        }
        if let Some(stage) = stage {
            self.faulted[stage as usize] = false;
        }
        self.apply(kind);
    }

    /// Descriptor of `kind`, if installed.
    pub fn get(&self, kind: DspKind) -> Option<&Dsp> {
        self.dsps.iter().find(|d| d.kind() == kind)
    }

    /// All installed descriptors in installation order.
    pub fn dsps(&self) -> &[Dsp] {
        &self.dsps
    }

    /// Sets one parameter of an installed descriptor.
    ///
    /// Returns `false` if `kind` is not installed or the value is rejected.
    pub fn set_param(&mut self, kind: DspKind, slot: usize, index: usize, value: f32) -> bool {
        let Some(dsp) = self.dsps.iter_mut().find(|d| d.kind() == kind) else {
            return false;
        };
        if !dsp.set(slot, index, value) {
            return false;
        }
        self.apply(kind);
        true
    }

    /// Arms or disarms an installed descriptor.
    pub fn set_enabled(&mut self, kind: DspKind, enabled: bool) -> bool {
        let Some(dsp) = self.dsps.iter_mut().find(|d| d.kind() == kind) else {
            return false;
        };
        dsp.set_enabled(enabled);
        self.apply(kind);
        true
    }

    /// Removes a descriptor and drops its stage with all history.
    pub fn remove(&mut self, kind: DspKind) -> Option<Dsp> {
        let pos = self.dsps.iter().position(|d| d.kind() == kind)?;
        let dsp = self.dsps.remove(pos);
        match Stage::of(kind) {
            Some(Stage::Distortion) => self.distortion = None,
            Some(Stage::Filter) => self.filter = None,
            Some(Stage::Equalizer) => self.equalizer = None,
            Some(Stage::Delay) => self.delay = None,
            Some(Stage::Reverb) => self.reverb = None,
            Some(Stage::DynamicGain) => self.dynamic_gain = None,
            None => {}
        }
        self.refresh();
        Some(dsp)
    }

    /// Returns `true` if the stage of `kind` disarmed itself after producing
    /// non-finite output.
    pub fn is_faulted(&self, kind: DspKind) -> bool {
        Stage::of(kind).is_some_and(|s| self.faulted[s as usize])
    }

    /// Returns `true` if no stage processes audio and the volume is unity.
    pub fn is_bypassed(&self) -> bool {
        self.volume == 1.0 && !self.armed.iter().any(|&a| a)
    }

    /// Pitch multiplier of an enabled pitch effect, else 1.
    pub fn pitch(&self) -> f32 {
        self.enabled(DspKind::Effect(EffectType::Pitch))
            .and_then(|d| d.slot(0))
            .map_or(1.0, |[pitch, max, ..]| pitch.min(max))
    }

    /// Upper bound of the pitch effect, else 1.
    pub fn max_pitch(&self) -> f32 {
        self.enabled(DspKind::Effect(EffectType::Pitch))
            .and_then(|d| d.get(0, 1))
            .unwrap_or(1.0)
    }

    /// `(speed_of_sound, doppler_factor)` of an enabled velocity effect.
    pub fn velocity(&self) -> Option<(f32, f32)> {
        let [speed, factor, ..] = self.enabled(DspKind::Effect(EffectType::Velocity))?.slot(0)?;
        Some((speed, factor))
    }

    /// Distance curve of an enabled distance filter.
    pub fn distance(&self) -> Option<Distance> {
        let dsp = self.enabled(DspKind::Filter(FilterType::Distance))?;
        let [ref_distance, max_distance, rolloff, _] = dsp.slot(0)?;
        Some(Distance {
            model: dsp.distance_model(),
            ref_distance,
            max_distance,
            rolloff,
            clamped: dsp.flags().contains(DspFlags::CLAMPED),
        })
    }

    /// Emission cone of an enabled directional filter.
    pub fn cone(&self) -> Option<Cone> {
        let [inner_angle, outer_angle, outer_gain, forward_gain] = self
            .enabled(DspKind::Filter(FilterType::Directional))?
            .slot(0)?;
        Some(Cone {
            inner_angle,
            outer_angle,
            outer_gain,
            forward_gain,
        })
    }

    /// Output gain of the volume filter, 1 when disabled.
    pub fn gain(&self) -> f32 {
        self.volume
    }

    fn enabled(&self, kind: DspKind) -> Option<&Dsp> {
        self.get(kind).filter(|d| d.is_enabled())
    }

    fn apply(&mut self, kind: DspKind) {
        let Some(dsp) = self.get(kind).cloned() else {
            return;
        };
        let sr = self.sample_rate;
        match kind {
            DspKind::Filter(FilterType::Frequency) => {
                let filter = self.filter.get_or_insert_with(|| FrequencyFilter::new(sr));
                configure_filter(filter, &dsp, sr);
            }
            DspKind::Filter(FilterType::Equalizer) => {
                let eq = self.equalizer.get_or_insert_with(|| Equalizer::new(sr));
                let low = dsp.slot(0).unwrap_or_default();
                let high = dsp.slot(1).unwrap_or_default();
                eq.set_bands(band(low), band(high));
                eq.set_order(dsp.order());
            }
            DspKind::Filter(FilterType::DynamicGain) => {
                let fx = self.dynamic_gain.get_or_insert_with(|| DynamicGain::new(sr));
                let [rate, depth, ..] = dsp.slot(0).unwrap_or_default();
                let flags = dsp.flags();
                fx.set_rate(rate);
                fx.set_depth(depth);
                fx.set_waveform(dsp.waveform());
                fx.set_inverse(flags.contains(DspFlags::INVERSE));
                fx.set_stereo_link(!flags.contains(DspFlags::UNLINKED));
            }
            DspKind::Effect(EffectType::Distortion) => {
                if let Some([factor, clipping, mix, asymmetry]) = dsp.slot(0) {
                    self.distortion
                        .get_or_insert_with(Distortion::new)
                        .set_params(factor, clipping, mix, asymmetry);
                }
            }
            DspKind::Effect(EffectType::Reverb) => {
                let (tracks, max_block) = (self.tracks, self.max_block);
                let reverb = self
                    .reverb
                    .get_or_insert_with(|| Reverb::new(sr, tracks, max_block));
                if let Some([cutoff, delay_depth, decay_level, decay_depth]) = dsp.slot(0) {
                    reverb.set_cutoff(cutoff);
                    reverb.configure(delay_depth, decay_level, decay_depth);
                }
            }
            DspKind::Effect(e) => {
                if let Some(mode) = e.delay_mode() {
                    if self.delay.as_ref().is_none_or(|d| d.mode() != mode) {
                        self.delay = Some(DelayEffect::new(mode, sr, self.tracks, self.max_block));
                    }
                    if let Some(delay) = self.delay.as_mut() {
                        configure_delay(delay, &dsp, sr);
                    }
                }
            }
            DspKind::Filter(_) => {}
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        for stage in Stage::ORDER {
            let present = match stage {
                Stage::Distortion => self.distortion.is_some(),
                Stage::Filter => self.filter.as_ref().is_some_and(|f| !f.is_identity()),
                Stage::Equalizer => self.equalizer.as_ref().is_some_and(|e| !e.is_identity()),
                Stage::Delay => self.delay.is_some(),
                Stage::Reverb => self.reverb.is_some(),
                Stage::DynamicGain => self.dynamic_gain.as_ref().is_some_and(|g| !g.is_identity()),
            };
            let enabled = self
                .dsps
                .iter()
                .any(|d| d.is_enabled() && Stage::of(d.kind()) == Some(stage));
            self.armed[stage as usize] = present && enabled && !self.faulted[stage as usize];
        }
        self.volume = self
            .enabled(DspKind::Filter(FilterType::Volume))
            .and_then(|d| d.slot(0))
            .map_or(1.0, |[gain, min, max, _]| gain.clamp(min.min(max), max.max(min)));
    }

    fn stage_mut(&mut self, stage: Stage) -> Option<&mut dyn Effect> {
        match stage {
            Stage::Distortion => self.distortion.as_mut().map(|e| e as &mut dyn Effect),
            Stage::Filter => self.filter.as_mut().map(|e| e as &mut dyn Effect),
            Stage::Equalizer => self.equalizer.as_mut().map(|e| e as &mut dyn Effect),
            Stage::Delay => self.delay.as_mut().map(|e| e as &mut dyn Effect),
            Stage::Reverb => self.reverb.as_mut().map(|e| e as &mut dyn Effect),
            Stage::DynamicGain => self.dynamic_gain.as_mut().map(|e| e as &mut dyn Effect),
        }
    }

    fn each_stage(&mut self, mut f: impl FnMut(&mut dyn Effect)) {
        for stage in Stage::ORDER {
            if let Some(effect) = self.stage_mut(stage) {
                f(effect);
            }
        }
    }

    fn process_chunk(&mut self, track: usize, block: &mut [f32]) {
        let len = block.len();
        for stage in Stage::ORDER {
            if !self.armed[stage as usize] {
                continue;
            }
            self.dry[..len].copy_from_slice(block);
            if let Some(effect) = self.stage_mut(stage) {
                effect.process_track(track, block);
            }
            if !all_finite(block) {
                block.copy_from_slice(&self.dry[..len]);
                self.disarm(stage, track);
            }
        }
        if self.volume != 1.0 {
            scale(block, self.volume);
        }
    }

    fn disarm(&mut self, stage: Stage, _track: usize) {
        #[cfg(feature = "tracing")]
        tracing::warn!(
            "effects_chain: {} produced non-finite output on track {_track}, disabled",
            stage.name()
        );
        self.faulted[stage as usize] = true;
        self.armed[stage as usize] = false;
        for dsp in self.dsps.iter_mut().filter(|d| Stage::of(d.kind()) == Some(stage)) {
            dsp.set_enabled(false);
        }
        if let Some(effect) = self.stage_mut(stage) {
            effect.reset();
        }
    }
}

fn configure_filter(filter: &mut FrequencyFilter, dsp: &Dsp, sample_rate: f32) {
    let ([cutoff, lf_gain, hf_gain, resonance], [cutoff_hf, _, _, rate]) =
        (dsp.slot(0).unwrap_or_default(), dsp.slot(1).unwrap_or_default());
    filter.set_cutoff(cutoff);
    filter.set_gains(lf_gain, hf_gain);
    filter.set_resonance(resonance);
    filter.set_order(dsp.order());
    let sweep = sweep_lfo(filter.sweep(), dsp, sample_rate, rate, cutoff, cutoff_hf);
    filter.set_sweep(sweep);
}

fn band([cutoff, lf_gain, hf_gain, resonance]: [f32; 4]) -> Band {
    Band {
        cutoff,
        lf_gain,
        hf_gain,
        resonance,
    }
}

fn configure_delay(delay: &mut DelayEffect, dsp: &Dsp, sample_rate: f32) {
    let ([gain, rate, depth, offset], [cutoff, cutoff_hf, feedback, resonance]) =
        (dsp.slot(0).unwrap_or_default(), dsp.slot(1).unwrap_or_default());
    let flags = dsp.flags();
    delay.set_gain(gain);
    delay.set_rate(rate);
    delay.set_waveform(dsp.waveform());
    delay.set_inverse(flags.contains(DspFlags::INVERSE));
    delay.set_stereo_link(!flags.contains(DspFlags::UNLINKED));
    delay.set_timing(depth, offset);
    if delay.mode() != DelayMode::Flanging {
        delay.set_feedback(feedback);
    }

    // a cutoff at or above nyquist leaves the wet path unfiltered
    if cutoff >= sample_rate * 0.5 * 0.999 {
        delay.set_wet_filter(None);
        return;
    }
    if delay.wet_filter_mut().is_none() {
        delay.set_wet_filter(Some(FrequencyFilter::lowpass(sample_rate, cutoff, dsp.order())));
    }
    if let Some(filter) = delay.wet_filter_mut() {
        filter.set_cutoff(cutoff);
        filter.set_resonance(resonance);
        filter.set_order(dsp.order());
        let sweep = sweep_lfo(filter.sweep(), dsp, sample_rate, rate, cutoff, cutoff_hf);
        filter.set_sweep(sweep);
    }
}

/// Cutoff sweep between `from` and `to`, keeping the phase of `current`.
fn sweep_lfo(
    current: Option<&Lfo>,
    dsp: &Dsp,
    sample_rate: f32,
    rate: f32,
    from: f32,
    to: f32,
) -> Option<Lfo> {
    let envelope = dsp.waveform() == LfoWaveform::Envelope;
    if (!envelope && rate <= 0.0) || (to - from).abs() < 1.0 {
        return None;
    }
    let flags = dsp.flags();
    let mut lfo = current.cloned().unwrap_or_else(|| Lfo::new(sample_rate, rate));
    lfo.set_frequency(rate);
    lfo.set_waveform(dsp.waveform());
    lfo.set_range(from.min(to), from.max(to));
    lfo.set_inverse(flags.contains(DspFlags::INVERSE) != (from > to));
    lfo.set_stereo_link(!flags.contains(DspFlags::UNLINKED));
    Some(lfo)
}

impl Effect for EffectsChain {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        if track >= self.tracks || self.is_bypassed() {
            return;
        }
        let max_block = self.max_block;
        for chunk in block.chunks_mut(max_block) {
            self.process_chunk(track, chunk);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.each_stage(|e| e.set_sample_rate(sample_rate));
    }

    fn reset(&mut self) {
        self.each_stage(|e| e.reset());
    }

    fn end_block(&mut self, frames: usize) {
        for stage in Stage::ORDER {
            if !self.armed[stage as usize] {
                continue;
            }
            if let Some(effect) = self.stage_mut(stage) {
                effect.end_block(frames);
            }
        }
    }

    fn history_samples(&self) -> usize {
        let delay = self.delay.as_ref().map_or(0, |d| d.history_samples());
        let reverb = self.reverb.as_ref().map_or(0, |r| r.history_samples());
        delay.max(reverb)
    }
}
