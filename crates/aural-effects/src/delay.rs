//! Delay-family effects: phasing, chorus, flanging and echo.
//!
//! All four modes read the signal at `n - tap_offset(t)`, where the tap
//! offset is driven by an [`Lfo`] between a minimum and maximum derived
//! from the mode's time range, the LFO depth and the LFO offset.
//!
//! ```text
//!            ┌──────────── gain ───────────┐
//! in ──┬────►│ history ring ── tap(n-off) ─┴──► + ──► out
//!      │     └──────▲─── feedback ─────────┘    ▲
//!      └────────────┼───────────────────────────┘
//! ```
//!
//! Two read paths exist:
//!
//! - **Windowed** (phasing, chorus and echo without feedback): the live
//!   block is loaded behind its history and the tap-shifted window is
//!   resampled in one call. A tap offset that moves across the block turns
//!   into a read rate slightly above or below 1.
//! - **Recursive** (flanging, and any mode with feedback): the output is
//!   written back into the ring sample by sample, so later taps read
//!   already-processed samples.
//!
//! Every ring holds at least the mode's maximum tap offset of history; tap
//! offsets are clamped to it when they are configured.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use aural_core::{
    Effect, HistoryRing, Kernel, Lfo, LfoWaveform, MAX_TRACKS, ResampleBackend, flush_denormal,
    resample, rms,
};
use libm::{ceilf, floorf};

use crate::filter::FrequencyFilter;

/// Samples kept beyond the maximum tap offset for interpolation.
const GUARD: usize = 4;

/// Largest gain of the recursive flanging loop.
const MAX_LOOP_GAIN: f32 = 0.99;

/// Delay-family mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayMode {
    /// Very short modulated delay, up to 10 ms.
    Phasing,
    /// Modulated delay between 10 and 60 ms.
    Chorus,
    /// Short modulated delay with its output looped back, up to 10 ms.
    Flanging,
    /// Delay line with feedback, up to 1 s.
    Echo,
}

impl DelayMode {
    /// Tap offset range `(min, max)` in seconds.
    pub const fn range(self) -> (f32, f32) {
        match self {
            Self::Phasing => (50e-6, 10e-3),
            Self::Chorus => (10e-3, 60e-3),
            Self::Flanging => (50e-6, 10e-3),
            Self::Echo => (1e-3, 1.0),
        }
    }

    /// Returns `true` for the mode that writes its output into its own history.
    pub const fn is_recursive(self) -> bool {
        matches!(self, Self::Flanging)
    }
}

/// Modulated delay effect.
///
/// ## Parameters
///
/// | Parameter | Range | Default |
/// |-----------|-------|---------|
/// | gain | 0.0–1.0 | 0.5 |
/// | LFO rate | 0.0–10.0 Hz | 0.0 |
/// | LFO depth | 0.0–1.0 | 0.0 |
/// | LFO offset | 0.0–1.0 | 0.5 |
/// | feedback | 0.0–0.99 | 0.0 |
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::{DelayEffect, DelayMode};
///
/// let mut chorus = DelayEffect::new(DelayMode::Chorus, 48000.0, 2, 256);
/// chorus.set_gain(0.6);
/// chorus.set_rate(0.8);
/// chorus.set_timing(0.2, 0.5);
///
/// let mut block = [0.25f32; 256];
/// chorus.process_track(0, &mut block);
/// chorus.end_block(256);
/// ```
#[derive(Debug, Clone)]
pub struct DelayEffect {
    mode: DelayMode,
    sample_rate: f32,
    tracks: usize,
    max_block: usize,
    gain: f32,
    feedback: f32,
    offset: f32,
    depth: f32,
    lfo: Lfo,
    wet_filter: Option<FrequencyFilter>,
    rings: Vec<HistoryRing>,
    taps: [f32; MAX_TRACKS],
    primed: [bool; MAX_TRACKS],
    scratch: Vec<f32>,
}

impl DelayEffect {
    /// Creates a delay for `tracks` tracks and blocks of up to `max_block`
    /// samples. History is sized for the mode's maximum tap offset at
    /// `sample_rate`.
    pub fn new(mode: DelayMode, sample_rate: f32, tracks: usize, max_block: usize) -> Self {
        let tracks = tracks.clamp(1, MAX_TRACKS);
        let max_block = max_block.max(1);
        let history = Self::history_for(mode, sample_rate);
        let mut effect = Self {
            mode,
            sample_rate,
            tracks,
            max_block,
            gain: 0.5,
            feedback: 0.0,
            offset: 0.5,
            depth: 0.0,
            lfo: Lfo::new(sample_rate, 0.0),
            wet_filter: None,
            rings: (0..tracks).map(|_| HistoryRing::new(history, max_block)).collect(),
            taps: [0.0; MAX_TRACKS],
            primed: [false; MAX_TRACKS],
            scratch: vec![0.0; max_block],
        };
        effect.update_timing();
        effect
    }

    fn history_for(mode: DelayMode, sample_rate: f32) -> usize {
        let (_, max) = mode.range();
        ceilf(max * sample_rate.max(1.0)) as usize + GUARD
    }

    /// Current mode.
    pub fn mode(&self) -> DelayMode {
        self.mode
    }

    /// Sets the wet gain. Flanging keeps its loop gain below 1.
    pub fn set_gain(&mut self, gain: f32) {
        if !gain.is_finite() {
            return;
        }
        let max = if self.mode.is_recursive() { MAX_LOOP_GAIN } else { 1.0 };
        self.gain = gain.clamp(0.0, max);
    }

    /// Wet gain.
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Sets the amount of tap output fed back into the history.
    pub fn set_feedback(&mut self, feedback: f32) {
        if feedback.is_finite() {
            self.feedback = feedback.clamp(0.0, MAX_LOOP_GAIN);
            self.update_timing();
        }
    }

    /// Feedback amount.
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Sets the LFO rate in Hz.
    pub fn set_rate(&mut self, rate_hz: f32) {
        if rate_hz.is_finite() {
            self.lfo.set_frequency(rate_hz.clamp(0.0, 10.0));
        }
    }

    /// Sets the LFO waveform.
    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.lfo.set_waveform(waveform);
    }

    /// Runs the LFO from its maximum down to its minimum.
    pub fn set_inverse(&mut self, inverse: bool) {
        self.lfo.set_inverse(inverse);
    }

    /// Shares one LFO phase across tracks.
    pub fn set_stereo_link(&mut self, linked: bool) {
        self.lfo.set_stereo_link(linked);
    }

    /// Sets the LFO depth and offset as fractions of the mode's time range.
    ///
    /// `depth` is reduced so that `offset + depth <= 1`. The resulting tap
    /// offsets are clamped to the allocated history.
    pub fn set_timing(&mut self, depth: f32, offset: f32) {
        if depth.is_finite() {
            self.depth = depth.clamp(0.0, 1.0);
        }
        if offset.is_finite() {
            self.offset = offset.clamp(0.0, 1.0);
        }
        if self.offset + self.depth > 1.0 {
            self.depth = 1.0 - self.offset;
        }
        self.update_timing();
    }

    /// LFO depth.
    pub fn depth(&self) -> f32 {
        self.depth
    }

    /// LFO offset.
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Installs a frequency filter on the wet path.
    pub fn set_wet_filter(&mut self, filter: Option<FrequencyFilter>) {
        self.wet_filter = filter;
    }

    /// The wet-path filter, if any.
    pub fn wet_filter_mut(&mut self) -> Option<&mut FrequencyFilter> {
        self.wet_filter.as_mut()
    }

    /// Tap offset range in samples after clamping to the history.
    pub fn tap_range(&self) -> (f32, f32) {
        (self.lfo.min(), self.lfo.max())
    }

    /// Tap offset used for the last block of `track`, in samples.
    pub fn tap_offset(&self, track: usize) -> f32 {
        self.taps.get(track).copied().unwrap_or(0.0)
    }

    fn update_timing(&mut self) {
        let (min_sec, max_sec) = self.mode.range();
        let span = max_sec - min_sec;
        let lo = (min_sec + self.offset * span) * self.sample_rate;
        let hi = lo + self.depth * span * self.sample_rate;

        let floor = if self.needs_recursion() { 1.0 } else { 0.0 };
        let limit = self.rings.first().map_or(0, HistoryRing::history_len);
        let ceiling = (limit.saturating_sub(GUARD) as f32).max(floor);
        self.lfo.set_range(lo.clamp(floor, ceiling), hi.clamp(floor, ceiling));
    }

    fn needs_recursion(&self) -> bool {
        self.mode.is_recursive() || self.feedback > 0.0
    }

    /// Tap offset for `track` at the end of the current block.
    fn next_tap(&mut self, track: usize, block: &[f32]) -> f32 {
        if self.lfo.waveform() == LfoWaveform::Envelope {
            self.lfo.follow(track, rms(block));
        }
        let tap = self.lfo.value(track);
        let (lo, hi) = self.tap_range();
        let tap = if tap.is_finite() { tap.clamp(lo, hi) } else { lo };
        if !self.primed[track] {
            self.primed[track] = true;
            self.taps[track] = tap;
        }
        tap
    }

    fn process_chunk(&mut self, track: usize, block: &mut [f32]) {
        let len = block.len();
        let end = self.next_tap(track, block);
        let start = self.taps[track];
        // keep the read rate positive when the tap jumps
        let end = end.min(start + 0.5 * len as f32);
        self.taps[track] = end;
        let recursive = self.needs_recursion();

        let ring = &mut self.rings[track];
        ring.load(block);

        if self.gain == 0.0 && !recursive {
            ring.commit(len);
            return;
        }

        let wet = &mut self.scratch[..len];
        if self.mode.is_recursive() {
            let gain = self.gain;
            for (n, out) in block.iter_mut().enumerate() {
                let tap = interpolated_tap(ring, n, start, end, len);
                let y = flush_denormal(*out + gain * tap);
                ring.set(n, y);
                *out = y;
            }
            ring.commit(len);
            return;
        }

        if self.feedback > 0.0 {
            let feedback = self.feedback;
            for (n, w) in wet.iter_mut().enumerate() {
                let tap = interpolated_tap(ring, n, start, end, len);
                let x = block[n];
                ring.set(n, flush_denormal(x + feedback * tap));
                *w = tap;
            }
        } else {
            let history = ring.history_len();
            match ring.read_window(-(history as isize), history + len) {
                Some(window) => {
                    let pos = history as f32 - start;
                    let index = floorf(pos);
                    let factor = 1.0 + (start - end) / len as f32;
                    resample(
                        Kernel::for_factor(factor),
                        ResampleBackend::Scalar,
                        wet,
                        window,
                        index as usize,
                        pos - index,
                        factor,
                    );
                }
                None => wet.iter_mut().for_each(|w| *w = 0.0),
            }
        }
        ring.commit(len);

        if let Some(filter) = self.wet_filter.as_mut() {
            filter.process_track(track, wet);
        }
        let gain = self.gain;
        for (out, w) in block.iter_mut().zip(wet.iter()) {
            *out += gain * w;
        }
    }
}

/// Linearly interpolated read at `n - tap(n)`, the tap moving from `start`
/// to `end` across `len` samples.
#[inline]
fn interpolated_tap(ring: &HistoryRing, n: usize, start: f32, end: f32, len: usize) -> f32 {
    let tap = start + (end - start) * n as f32 / len as f32;
    let pos = n as f32 - tap.max(1.0);
    let base = floorf(pos);
    let mu = pos - base;
    let a = ring.get(base as isize);
    let b = ring.get(base as isize + 1);
    a + (b - a) * mu
}

impl Effect for DelayEffect {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        if track >= self.tracks {
            return;
        }
        let max_block = self.max_block;
        for chunk in block.chunks_mut(max_block) {
            self.process_chunk(track, chunk);
        }
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        let scale = sample_rate / self.sample_rate;
        self.sample_rate = sample_rate;
        self.lfo.set_sample_rate(sample_rate);
        if let Some(filter) = self.wet_filter.as_mut() {
            filter.set_sample_rate(sample_rate);
        }
        for tap in &mut self.taps {
            *tap *= scale;
        }
        self.update_timing();
    }

    fn reset(&mut self) {
        self.rings.iter_mut().for_each(HistoryRing::clear);
        self.lfo.reset();
        self.taps = [0.0; MAX_TRACKS];
        self.primed = [false; MAX_TRACKS];
        if let Some(filter) = self.wet_filter.as_mut() {
            filter.reset();
        }
    }

    fn end_block(&mut self, frames: usize) {
        self.lfo.advance(frames);
        if let Some(filter) = self.wet_filter.as_mut() {
            filter.end_block(frames);
        }
    }

    fn history_samples(&self) -> usize {
        self.rings.first().map_or(0, HistoryRing::history_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn impulse(len: usize) -> Vec<f32> {
        let mut v = vec![0.0; len];
        v[0] = 1.0;
        v
    }

    fn fixed(mode: DelayMode, offset: f32) -> DelayEffect {
        let mut fx = DelayEffect::new(mode, 48000.0, 2, 256);
        fx.set_timing(0.0, offset);
        fx
    }

    #[test]
    fn zero_gain_is_identity() {
        for mode in [DelayMode::Phasing, DelayMode::Chorus, DelayMode::Echo] {
            let mut fx = fixed(mode, 0.0);
            fx.set_gain(0.0);
            let input: Vec<f32> = (0..256).map(|i| (i as f32 * 0.1).sin()).collect();
            let mut block = input.clone();
            fx.process_track(0, &mut block);
            assert_eq!(block, input, "{mode:?}");
        }
    }

    #[test]
    fn chorus_delays_impulse_by_tap_offset() {
        let mut fx = fixed(DelayMode::Chorus, 0.0);
        fx.set_gain(1.0);
        let tap = fx.tap_range().0;
        assert_eq!(tap, 480.0, "10 ms at 48 kHz");

        let mut out = Vec::new();
        let mut input = impulse(1024);
        for chunk in input.chunks_mut(256) {
            fx.process_track(0, chunk);
            fx.end_block(chunk.len());
            out.extend_from_slice(chunk);
        }
        assert_eq!(out[0], 1.0);
        assert!((out[480] - 1.0).abs() < 1e-6, "echo at 480: {}", out[480]);
        assert!(out[1..480].iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn echo_feedback_repeats() {
        let mut fx = DelayEffect::new(DelayMode::Echo, 1000.0, 1, 64);
        fx.set_gain(1.0);
        fx.set_feedback(0.5);
        // 1 ms + 0.0 * range = 1 sample at 1 kHz; use an offset for 10 samples
        fx.set_timing(0.0, 9.0 / 999.0);
        let tap = fx.tap_range().0;
        assert!((tap - 10.0).abs() < 1e-3, "tap {tap}");

        let mut block = impulse(64);
        fx.process_track(0, &mut block);
        assert!((block[10] - 1.0).abs() < 1e-4);
        assert!((block[20] - 0.5).abs() < 1e-4);
        assert!((block[30] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn flanging_loop_stays_bounded() {
        let mut fx = DelayEffect::new(DelayMode::Flanging, 48000.0, 1, 128);
        fx.set_gain(5.0);
        assert_eq!(fx.gain(), MAX_LOOP_GAIN);
        fx.set_rate(2.0);
        fx.set_timing(0.8, 0.1);

        let mut peak = 0.0f32;
        for _ in 0..200 {
            let mut block = [0.1f32; 128];
            fx.process_track(0, &mut block);
            fx.end_block(128);
            peak = block.iter().fold(peak, |p, s| p.max(s.abs()));
            assert!(block.iter().all(|s| s.is_finite()));
        }
        assert!(peak < 20.0, "loop gain exploded: {peak}");
    }

    #[test]
    fn timing_clamps_depth_to_unit_sum() {
        let mut fx = DelayEffect::new(DelayMode::Chorus, 48000.0, 1, 64);
        fx.set_timing(0.9, 0.5);
        assert_eq!(fx.depth(), 0.5);
        let (lo, hi) = fx.tap_range();
        assert!(hi <= fx.history_samples() as f32);
        assert!(lo <= hi);
    }

    #[test]
    fn offsets_never_exceed_history() {
        let mut fx = DelayEffect::new(DelayMode::Echo, 48000.0, 1, 64);
        fx.set_sample_rate(96000.0);
        fx.set_timing(0.0, 1.0);
        let (_, hi) = fx.tap_range();
        assert!(hi <= fx.history_samples() as f32);
    }

    #[test]
    fn long_blocks_are_chunked() {
        let mut a = fixed(DelayMode::Chorus, 0.1);
        let mut b = a.clone();
        let input: Vec<f32> = (0..1024).map(|i| ((i % 37) as f32) / 37.0).collect();

        let mut whole = input.clone();
        a.process_track(1, &mut whole);

        let mut pieces = input;
        for chunk in pieces.chunks_mut(256) {
            b.process_track(1, chunk);
        }
        assert_eq!(whole, pieces);
    }

    #[test]
    fn untracked_index_is_ignored() {
        let mut fx = fixed(DelayMode::Chorus, 0.0);
        let mut block = [1.0f32; 8];
        fx.process_track(7, &mut block);
        assert_eq!(block, [1.0; 8]);
    }
}
