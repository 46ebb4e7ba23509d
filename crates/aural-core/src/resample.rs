//! Sample-rate conversion kernels.
//!
//! A resampler walks a source run at `freq_factor` source samples per
//! destination sample (`source_rate / dest_rate`) and writes exactly
//! `dst.len()` samples. The read position is kept as an integer source index
//! plus a fractional phase `mu` in `[0, 1)`.
//!
//! # Kernels
//!
//! | Kernel    | Selected for               | Interpolation                           |
//! |-----------|----------------------------|-----------------------------------------|
//! | `Cubic`   | `factor < 0.25`            | Catmull-Rom through `s[i-1]..s[i+2]`    |
//! | `Linear`  | `0.25 <= factor < 0.95`    | between `s[i]` and `s[i+1]`             |
//! | `Nearest` | `0.95 <= factor <= 1.05`   | closest sample, exact copy at 1.0       |
//! | `Skip`    | `factor > 1.05`            | linear, stepping `floor(mu)` per output |
//!
//! # Backends
//!
//! [`Backend::Scalar`] evaluates one output at a time. [`Backend::Chunked`]
//! first resolves read positions for a lane of outputs and then evaluates
//! the kernel across the lane, a layout the compiler vectorizes. Both run the
//! same floating-point operations in the same order, so their output is
//! bit-identical.
//!
//! Reads are clamped to `[0, src.len() - 1]`: a kernel never touches memory
//! outside the slice it was given. Callers that want continuous output keep
//! the lookback/lookahead samples inside that slice.

/// Factors below this use the cubic kernel.
pub const CUBIC_THRESHOLD: f32 = 0.25;

/// Half-width of the band around 1.0 served by the nearest-sample kernel.
pub const NEAREST_TOLERANCE: f32 = 0.05;

/// Outputs resolved per lane by the chunked backend.
pub const LANES: usize = 8;

/// Interpolation kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    /// Closest source sample.
    Nearest,
    /// Linear interpolation for upsampling.
    Linear,
    /// 4-point cubic interpolation for strong upsampling.
    Cubic,
    /// Linear interpolation while stepping over source samples (decimation).
    Skip,
}

impl Kernel {
    /// Picks the kernel for a conversion factor.
    pub fn for_factor(freq_factor: f32) -> Self {
        if (freq_factor - 1.0).abs() <= NEAREST_TOLERANCE {
            Kernel::Nearest
        } else if freq_factor < CUBIC_THRESHOLD {
            Kernel::Cubic
        } else if freq_factor < 1.0 {
            Kernel::Linear
        } else {
            Kernel::Skip
        }
    }
}

/// Evaluation strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// One output per iteration.
    #[default]
    Scalar,
    /// Lanes of [`LANES`] outputs.
    Chunked,
}

/// Read position after a resample call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Integer source index of the next read.
    pub index: usize,
    /// Fractional phase in `[0, 1)`.
    pub mu: f32,
}

/// Resamples `src` into `dst` starting at `src[start] + smu`.
///
/// Returns the read position following the last output. A zero or
/// non-finite `freq_factor`, an empty source or an empty destination leaves
/// `dst` untouched and returns the start position.
pub fn resample(
    kernel: Kernel,
    backend: Backend,
    dst: &mut [f32],
    src: &[f32],
    start: usize,
    smu: f32,
    freq_factor: f32,
) -> Position {
    let begin = Position {
        index: start,
        mu: smu.clamp(0.0, 1.0 - f32::EPSILON),
    };
    if dst.is_empty() || src.is_empty() || freq_factor <= 0.0 || !freq_factor.is_finite() {
        return begin;
    }

    if kernel == Kernel::Nearest && freq_factor == 1.0 && begin.mu == 0.0 {
        return copy_run(dst, src, start);
    }

    match backend {
        Backend::Scalar => resample_scalar(kernel, dst, src, begin, freq_factor),
        Backend::Chunked => resample_chunked(kernel, dst, src, begin, freq_factor),
    }
}

/// Factor 1 with integer phase: verbatim copy, repeating the last sample if
/// the source runs out.
fn copy_run(dst: &mut [f32], src: &[f32], start: usize) -> Position {
    let last = src.len() - 1;
    let avail = src.len().saturating_sub(start).min(dst.len());
    dst[..avail].copy_from_slice(&src[start..start + avail]);
    let tail = src[last.min(start + avail.saturating_sub(1))];
    dst[avail..].iter_mut().for_each(|d| *d = tail);
    Position {
        index: start + dst.len(),
        mu: 0.0,
    }
}

#[inline]
fn at(src: &[f32], i: isize) -> f32 {
    let last = (src.len() - 1) as isize;
    src[i.clamp(0, last) as usize]
}

#[inline]
fn interpolate(kernel: Kernel, src: &[f32], i: usize, mu: f32) -> f32 {
    let i = i as isize;
    match kernel {
        Kernel::Nearest => {
            if mu < 0.5 {
                at(src, i)
            } else {
                at(src, i + 1)
            }
        }
        Kernel::Linear | Kernel::Skip => {
            let s0 = at(src, i);
            let s1 = at(src, i + 1);
            s0 + (s1 - s0) * mu
        }
        Kernel::Cubic => {
            let y0 = at(src, i - 1);
            let y1 = at(src, i);
            let y2 = at(src, i + 1);
            let y3 = at(src, i + 2);
            cubic(y0, y1, y2, y3, mu)
        }
    }
}

#[inline]
fn cubic(y0: f32, y1: f32, y2: f32, y3: f32, mu: f32) -> f32 {
    // Catmull-Rom
    let a0 = -0.5 * y0 + 1.5 * y1 - 1.5 * y2 + 0.5 * y3;
    let a1 = y0 - 2.5 * y1 + 2.0 * y2 - 0.5 * y3;
    let a2 = 0.5 * (y2 - y0);
    let mu2 = mu * mu;
    a0 * mu * mu2 + a1 * mu2 + a2 * mu + y1
}

#[inline]
fn advance(pos: &mut Position, freq_factor: f32) {
    pos.mu += freq_factor;
    let step = libm::floorf(pos.mu);
    pos.mu -= step;
    pos.index += step as usize;
}

fn resample_scalar(
    kernel: Kernel,
    dst: &mut [f32],
    src: &[f32],
    mut pos: Position,
    freq_factor: f32,
) -> Position {
    for d in dst.iter_mut() {
        *d = interpolate(kernel, src, pos.index, pos.mu);
        advance(&mut pos, freq_factor);
    }
    pos
}

fn resample_chunked(
    kernel: Kernel,
    dst: &mut [f32],
    src: &[f32],
    mut pos: Position,
    freq_factor: f32,
) -> Position {
    let mut index = [0usize; LANES];
    let mut mu = [0.0f32; LANES];

    for lane in dst.chunks_mut(LANES) {
        let n = lane.len();
        for k in 0..n {
            index[k] = pos.index;
            mu[k] = pos.mu;
            advance(&mut pos, freq_factor);
        }

        match kernel {
            Kernel::Nearest => {
                for k in 0..n {
                    let i = index[k] as isize + isize::from(mu[k] >= 0.5);
                    lane[k] = at(src, i);
                }
            }
            Kernel::Linear | Kernel::Skip => {
                let mut s0 = [0.0f32; LANES];
                let mut s1 = [0.0f32; LANES];
                for k in 0..n {
                    s0[k] = at(src, index[k] as isize);
                    s1[k] = at(src, index[k] as isize + 1);
                }
                for k in 0..n {
                    lane[k] = s0[k] + (s1[k] - s0[k]) * mu[k];
                }
            }
            Kernel::Cubic => {
                let mut y = [[0.0f32; 4]; LANES];
                for k in 0..n {
                    let i = index[k] as isize;
                    y[k] = [at(src, i - 1), at(src, i), at(src, i + 1), at(src, i + 2)];
                }
                for k in 0..n {
                    lane[k] = cubic(y[k][0], y[k][1], y[k][2], y[k][3], mu[k]);
                }
            }
        }
    }
    pos
}

/// Source samples kept before the read position between calls.
pub const LOOKBACK: usize = 1;

/// Source samples read past the integer read position by the widest kernel.
pub const LOOKAHEAD: usize = 2;

/// Stateful resampler for a continuous stream.
///
/// Keeps the fractional phase and any source overshoot between calls so
/// consecutive blocks join without a seam. The last [`LOOKBACK`] samples
/// before the read position are never reported as consumed, so the cubic
/// kernel finds its `s[i-1]` at the head of the next block. Only
/// [`reset`](Self::reset) restarts the phase.
#[derive(Debug, Clone, Default)]
pub struct Resampler {
    mu: f32,
    carry: usize,
    backend: Backend,
    kernel: Option<Kernel>,
}

impl Resampler {
    /// Creates a resampler at phase zero using the scalar backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects the evaluation backend.
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    /// Pins the kernel instead of choosing one per factor.
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = Some(kernel);
        self
    }

    /// Current fractional phase.
    #[inline]
    pub fn phase(&self) -> f32 {
        self.mu
    }

    /// Restarts at phase zero.
    pub fn reset(&mut self) {
        self.mu = 0.0;
        self.carry = 0;
    }

    /// Fills `dst` from `src` at `freq_factor`.
    ///
    /// Returns the number of source samples consumed; the caller drops that
    /// many samples and passes the rest again at the head of the next call.
    pub fn process(&mut self, src: &[f32], dst: &mut [f32], freq_factor: f32) -> usize {
        if src.is_empty() || dst.is_empty() {
            return 0;
        }
        let kernel = self.kernel.unwrap_or_else(|| Kernel::for_factor(freq_factor));
        let start = self.carry.min(src.len() - 1);
        let end = resample(kernel, self.backend, dst, src, start, self.mu, freq_factor);
        self.mu = end.mu;
        let consumed = end.index.saturating_sub(LOOKBACK).min(src.len());
        self.carry = end.index - consumed;
        consumed
    }

    /// Source samples needed to produce `frames` outputs at `freq_factor`
    /// without clamping, counting the retained lookback and the kernel
    /// lookahead.
    pub fn source_frames(&self, frames: usize, freq_factor: f32) -> usize {
        let span = self.mu + self.carry as f32 + frames as f32 * freq_factor;
        libm::ceilf(span) as usize + LOOKAHEAD
    }
}
