//! Reverberation: early reflections plus a recursive loopback tail.
//!
//! ```text
//! in ──┬──────────────────────────────────────────────► + ──► out
//!      └─► reflections (N taps, Σ g/N) ─► filter ─► loopback ─┘ x0.5
//! ```
//!
//! Reflections are a finite set of delayed copies of the dry signal with no
//! feedback; their sum is strictly linear in the input. The loopback stage
//! feeds its own output back at `M` taps with negative gain normalized by
//! `1 / (M + 1)`, producing the late tail. Both stages keep a per-track
//! history ring that persists across blocks.
//!
//! Tap times derive from `delay_depth` (reflections) and `decay_depth`
//! (loopback); `decay_level` sets the loopback gain.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use aural_core::{Effect, HistoryRing, MAX_TRACKS, flush_denormal};
use libm::{ceilf, roundf};

use crate::filter::{FilterOrder, FrequencyFilter};

/// Longest reflection time in seconds.
pub const REFLECTIONS_TIME: f32 = 0.15;

/// Longest loopback time in seconds.
pub const REVERB_TIME: f32 = 0.7;

/// Upper bound of the `delay_depth` parameter, in seconds.
pub const MAX_DELAY_DEPTH: f32 = 0.07;

/// Number of reflection taps.
pub const REFLECTION_TAPS: usize = 7;

/// Number of loopback taps.
pub const LOOPBACK_TAPS: usize = 5;

const REFLECTION_DELAYS: [f32; REFLECTION_TAPS] = [
    0.9876543, 0.3333333, 0.5019726, 0.0769231, 0.1428571, 0.0909091, 0.1992736,
];
const REFLECTION_GAINS: [f32; REFLECTION_TAPS] =
    [0.9484, 0.8935, 0.8254, 0.8997, 0.8346, 0.7718, 0.7946];

const LOOPBACK_DELAYS: [f32; LOOPBACK_TAPS] = [0.9876543, 0.4901861, 0.3333333, 0.2001743, 0.1428571];
const LOOPBACK_GAINS: [f32; LOOPBACK_TAPS] = [0.95015, 0.87075, 0.91917, 0.72317, 0.80317];

/// Reflection taps with a gain at or below this are skipped.
pub const SILENT_TAP: f32 = 0.001;

/// Q of the reflection filter.
const FILTER_Q: f32 = 0.6;

/// One delayed, scaled copy.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Tap {
    /// Delay in samples.
    pub offset: usize,
    /// Linear gain before normalization.
    pub gain: f32,
}

/// Non-recursive early reflections.
#[derive(Debug, Clone)]
pub struct Reflections {
    taps: [Tap; REFLECTION_TAPS],
    count: usize,
}

impl Default for Reflections {
    fn default() -> Self {
        Self {
            taps: [Tap::default(); REFLECTION_TAPS],
            count: 0,
        }
    }
}

impl Reflections {
    /// Builds reflections from explicit taps, at most [`REFLECTION_TAPS`].
    pub fn from_taps(taps: &[Tap]) -> Self {
        let mut reflections = Self::default();
        let count = taps.len().min(REFLECTION_TAPS);
        reflections.taps[..count].copy_from_slice(&taps[..count]);
        reflections.count = count;
        reflections
    }

    /// Active taps.
    pub fn taps(&self) -> &[Tap] {
        &self.taps[..self.count]
    }

    /// Longest tap offset in samples.
    pub fn max_offset(&self) -> usize {
        self.taps().iter().map(|t| t.offset).max().unwrap_or(0)
    }

    /// Writes the pure wet signal for the block loaded in `ring` into `out`.
    ///
    /// `out[n] = Σ (g_i / N) * x[n - offset_i]` over the taps with audible
    /// gain. Offsets beyond the ring's history read the oldest sample.
    pub fn render(&self, ring: &HistoryRing, out: &mut [f32]) {
        out.iter_mut().for_each(|s| *s = 0.0);
        if self.count == 0 {
            return;
        }
        let norm = 1.0 / self.count as f32;
        let len = out.len().min(ring.len());
        for tap in self.taps() {
            let gain = tap.gain * norm;
            if gain.abs() <= SILENT_TAP {
                continue;
            }
            let offset = tap.offset.min(ring.history_len()) as isize;
            match ring.read_window(-offset, len) {
                Some(window) => {
                    for (o, x) in out.iter_mut().zip(window) {
                        *o += gain * x;
                    }
                }
                None => {
                    for (n, o) in out[..len].iter_mut().enumerate() {
                        *o += gain * ring.get(n as isize - offset);
                    }
                }
            }
        }
    }
}

/// Recursive late reverb with negative feedback taps.
#[derive(Debug, Clone)]
pub struct Loopback {
    taps: [Tap; LOOPBACK_TAPS],
}

impl Loopback {
    /// Longest tap offset in samples.
    pub fn max_offset(&self) -> usize {
        self.taps.iter().map(|t| t.offset).max().unwrap_or(0)
    }

    /// Active taps.
    pub fn taps(&self) -> &[Tap] {
        &self.taps
    }

    /// Runs the loopback over the block loaded in `ring`, writing the wet
    /// output back into the ring and into `out`.
    fn run(&self, ring: &mut HistoryRing, out: &mut [f32]) {
        let norm = 1.0 / (LOOPBACK_TAPS + 1) as f32;
        for (n, o) in out.iter_mut().enumerate() {
            let mut y = *o;
            for tap in &self.taps {
                let offset = tap.offset.max(1) as isize;
                y -= tap.gain * norm * ring.get(n as isize - offset);
            }
            let y = flush_denormal(y);
            ring.set(n, y);
            *o = y;
        }
    }
}

/// Reflections, reflection filter and loopback for up to [`MAX_TRACKS`] tracks.
///
/// ## Parameters
///
/// | Parameter | Range | Default |
/// |-----------|-------|---------|
/// | cutoff | 50–22000 Hz | 10000 |
/// | delay depth | 0.0–0.07 s | 0.035 |
/// | decay level | 0.0–1.0 | 0.5 |
/// | decay depth | 0.0–0.7 s | 0.35 |
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
/// use aural_effects::Reverb;
///
/// let mut reverb = Reverb::new(48000.0, 2, 512);
/// reverb.configure(0.035, 0.6, 0.3);
///
/// let mut block = [0.0f32; 512];
/// block[0] = 1.0;
/// reverb.process_track(0, &mut block);
/// ```
#[derive(Debug, Clone)]
pub struct Reverb {
    sample_rate: f32,
    tracks: usize,
    max_block: usize,
    delay_depth: f32,
    decay_level: f32,
    decay_depth: f32,
    reflection_count: usize,
    reflections: Reflections,
    loopback: Loopback,
    filter: FrequencyFilter,
    dry: Vec<HistoryRing>,
    tail: Vec<HistoryRing>,
    scratch: Vec<f32>,
}

impl Reverb {
    /// Creates a reverb for `tracks` tracks and blocks of up to `max_block`
    /// samples, with three reflections active.
    pub fn new(sample_rate: f32, tracks: usize, max_block: usize) -> Self {
        let tracks = tracks.clamp(1, MAX_TRACKS);
        let max_block = max_block.max(1);
        let reflection_history = ceilf(REFLECTIONS_TIME * sample_rate) as usize + 1;
        let tail_history = ceilf(REVERB_TIME * sample_rate) as usize + 1;
        let mut reverb = Self {
            sample_rate,
            tracks,
            max_block,
            delay_depth: 0.035,
            decay_level: 0.5,
            decay_depth: 0.35,
            reflection_count: 3,
            reflections: Reflections::default(),
            loopback: Loopback {
                taps: [Tap::default(); LOOPBACK_TAPS],
            },
            filter: FrequencyFilter::lowpass(sample_rate, 10000.0, FilterOrder::Db12),
            dry: (0..tracks)
                .map(|_| HistoryRing::new(reflection_history, max_block))
                .collect(),
            tail: (0..tracks)
                .map(|_| HistoryRing::new(tail_history, max_block))
                .collect(),
            scratch: vec![0.0; max_block],
        };
        reverb.filter.set_resonance(FILTER_Q);
        reverb.update_taps();
        reverb
    }

    /// Sets the tap times and loopback gain.
    ///
    /// `delay_depth` (0–0.07 s) spreads the reflections, `decay_level`
    /// (0–1) sets the loopback gain and `decay_depth` (0–0.7 s) spreads the
    /// loopback taps. Non-finite values keep the previous setting.
    pub fn configure(&mut self, delay_depth: f32, decay_level: f32, decay_depth: f32) {
        if delay_depth.is_finite() {
            self.delay_depth = delay_depth.clamp(0.0, MAX_DELAY_DEPTH);
        }
        if decay_level.is_finite() {
            self.decay_level = decay_level.clamp(0.0, 1.0);
        }
        if decay_depth.is_finite() {
            self.decay_depth = decay_depth.clamp(0.0, REVERB_TIME);
        }
        self.update_taps();
    }

    /// Sets the cutoff of the reflection filter.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        self.filter.set_cutoff(cutoff.clamp(50.0, 22000.0));
    }

    /// Number of active reflections, clamped to `1..=REFLECTION_TAPS`.
    pub fn set_reflection_count(&mut self, count: usize) {
        self.reflection_count = count.clamp(1, REFLECTION_TAPS);
        self.update_taps();
    }

    /// Early reflections.
    pub fn reflections(&self) -> &Reflections {
        &self.reflections
    }

    /// Late loopback.
    pub fn loopback(&self) -> &Loopback {
        &self.loopback
    }

    fn update_taps(&mut self) {
        let fs = self.sample_rate;
        let reflection_limit = self.dry.first().map_or(0, HistoryRing::history_len);
        let tail_limit = self.tail.first().map_or(0, HistoryRing::history_len);

        let depth = self.delay_depth / MAX_DELAY_DEPTH;
        let idepth = 0.005 + 0.045 * depth;
        let idepth_offs = ((REFLECTIONS_TIME - idepth) * depth).clamp(0.01, REFLECTIONS_TIME - 0.05);

        let mut taps = [Tap::default(); REFLECTION_TAPS];
        for (i, tap) in taps.iter_mut().enumerate() {
            let seconds = idepth_offs + idepth * REFLECTION_DELAYS[i];
            *tap = Tap {
                offset: (roundf(seconds * fs) as usize).min(reflection_limit),
                gain: 0.5 * REFLECTION_GAINS[i],
            };
        }
        self.reflections = Reflections::from_taps(&taps[..self.reflection_count]);

        let lb_depth = self.decay_depth / REVERB_TIME;
        let lb_gain = 0.01 + self.decay_level * 0.99;
        let dlb = 0.01 + lb_depth * REVERB_TIME * 0.6877777;
        let dlbp = ((REVERB_TIME - dlb) * lb_depth).clamp(0.01, REVERB_TIME - 0.01);
        for (i, tap) in self.loopback.taps.iter_mut().enumerate() {
            let seconds = dlbp + dlb * LOOPBACK_DELAYS[i];
            *tap = Tap {
                offset: (roundf(seconds * fs) as usize).clamp(1, tail_limit.max(1)),
                gain: lb_gain * LOOPBACK_GAINS[i],
            };
        }
    }

    fn process_chunk(&mut self, track: usize, block: &mut [f32]) {
        let len = block.len();
        let dry = &mut self.dry[track];
        dry.load(block);

        let wet = &mut self.scratch[..len];
        self.reflections.render(dry, wet);
        dry.commit(len);

        self.filter.process_track(track, wet);

        let tail = &mut self.tail[track];
        tail.load(wet);
        self.loopback.run(tail, wet);
        tail.commit(len);

        for (out, w) in block.iter_mut().zip(wet.iter()) {
            *out += 0.5 * w;
        }
    }
}

impl Effect for Reverb {
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
        self.sample_rate = sample_rate;
        self.filter.set_sample_rate(sample_rate);
        self.update_taps();
    }

    fn reset(&mut self) {
        self.dry.iter_mut().for_each(HistoryRing::clear);
        self.tail.iter_mut().for_each(HistoryRing::clear);
        self.filter.reset();
    }

    fn history_samples(&self) -> usize {
        self.tail.first().map_or(0, HistoryRing::history_len)
    }
}
