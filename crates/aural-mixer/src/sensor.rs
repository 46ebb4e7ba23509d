//! Sensor input: a shared FIFO of decoded frames and its render-side reader.
//!
//! Producers push interleaved `f32` frames into a [`SensorFeed`] from any
//! thread. The feed stores one [`DataBuffer`] slot per track, so every slot
//! holds a planar run of native-endian samples and transfers are always
//! whole samples. The render pass pulls exactly as many source frames as the
//! resampler needs for one period and drops only the frames it consumed, so
//! the stream stays continuous across periods and pitch changes.

use std::sync::atomic::{AtomicU64, Ordering};

use aural_core::{DataBuffer, MAX_TRACKS, Resampler, Slot};
use parking_lot::Mutex;

/// Bytes per stored sample.
const SAMPLE_BYTES: usize = core::mem::size_of::<f32>();

/// Largest source-to-mix step the reader supports (rate ratio times pitch).
pub const MAX_FREQ_FACTOR: f32 = 16.0;

/// Thread-safe input queue of a sensor node.
///
/// # Example
///
/// ```rust
/// use aural_mixer::SensorFeed;
///
/// let feed = SensorFeed::new(44100.0, 2, 4096).unwrap();
/// let frames = [0.0f32, 0.0, 0.5, -0.5, 1.0, -1.0];
/// assert_eq!(feed.push(&frames), 3);
/// assert_eq!(feed.available(), 3);
/// ```
#[derive(Debug)]
pub struct SensorFeed {
    sample_rate: f32,
    tracks: usize,
    fifo: Mutex<DataBuffer>,
    underruns: AtomicU64,
}

impl SensorFeed {
    /// Creates a feed for `tracks` tracks holding up to `capacity` frames.
    ///
    /// Returns `None` for zero tracks, zero capacity or a failed allocation.
    pub fn new(sample_rate: f32, tracks: usize, capacity: usize) -> Option<Self> {
        if tracks == 0 || tracks > MAX_TRACKS || sample_rate.is_nan() || sample_rate <= 0.0 {
            return None;
        }
        let fifo = DataBuffer::create(tracks, capacity.checked_mul(SAMPLE_BYTES)?, SAMPLE_BYTES)?;
        Some(Self {
            sample_rate,
            tracks,
            fifo: Mutex::new(fifo),
            underruns: AtomicU64::new(0),
        })
    }

    /// Source sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Number of tracks.
    pub fn tracks(&self) -> usize {
        self.tracks
    }

    /// Appends interleaved frames; returns the number of frames accepted.
    ///
    /// A short count is backpressure: push the rest later.
    pub fn push(&self, interleaved: &[f32]) -> usize {
        let mut fifo = self.fifo.lock();
        let frames = (interleaved.len() / self.tracks).min(fifo.free_space(0) / SAMPLE_BYTES);
        for track in 0..self.tracks {
            let region = fifo.free_region_mut(track);
            for (frame, dst) in region.chunks_exact_mut(SAMPLE_BYTES).take(frames).enumerate() {
                dst.copy_from_slice(&interleaved[frame * self.tracks + track].to_ne_bytes());
            }
            fifo.increase_offset(track, frames * SAMPLE_BYTES);
        }
        frames
    }

    /// Frames waiting to be rendered.
    pub fn available(&self) -> usize {
        self.fifo.lock().avail(0) / SAMPLE_BYTES
    }

    /// Frames that can still be pushed.
    pub fn free(&self) -> usize {
        self.fifo.lock().free_space(0) / SAMPLE_BYTES
    }

    /// Drops every queued frame.
    pub fn clear(&self) {
        self.fifo.lock().clear(Slot::All);
    }

    /// Periods rendered as silence because too few frames were queued.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Render-side state of one sensor: resampler phase and scratch space.
#[derive(Debug)]
pub(crate) struct SensorReader {
    resamplers: Vec<Resampler>,
    bytes: Vec<u8>,
    source: Vec<Vec<f32>>,
}

impl SensorReader {
    pub(crate) fn new(tracks: usize, max_frames: usize) -> Self {
        let max_source = (max_frames as f32 * MAX_FREQ_FACTOR) as usize + 8;
        Self {
            resamplers: vec![Resampler::new(); tracks],
            bytes: vec![0; max_source * SAMPLE_BYTES],
            source: vec![vec![0.0; max_source]; tracks],
        }
    }

    pub(crate) fn reset(&mut self) {
        self.resamplers.iter_mut().for_each(Resampler::reset);
    }

    /// Fills `out[t][..frames]` for every track from `feed` at `freq_factor`
    /// source frames per output frame.
    ///
    /// Returns `false` and writes silence when the feed holds fewer frames
    /// than one period needs; nothing is consumed in that case. The frame
    /// before the read position stays queued so interpolation has lookback
    /// across periods.
    pub(crate) fn read(
        &mut self,
        feed: &SensorFeed,
        out: &mut [Vec<f32>],
        frames: usize,
        freq_factor: f32,
    ) -> bool {
        let factor = if freq_factor.is_finite() {
            freq_factor.clamp(1.0 / MAX_FREQ_FACTOR, MAX_FREQ_FACTOR)
        } else {
            1.0
        };
        let tracks = feed.tracks().min(out.len()).min(self.resamplers.len());
        let need = self.resamplers[0]
            .source_frames(frames, factor)
            .min(self.source[0].len());

        {
            let fifo = feed.fifo.lock();
            if fifo.avail(0) / SAMPLE_BYTES < need {
                drop(fifo);
                feed.underruns.fetch_add(1, Ordering::Relaxed);
                for track in out.iter_mut() {
                    track[..frames].fill(0.0);
                }
                return false;
            }
            for track in 0..tracks {
                let bytes = &mut self.bytes[..need * SAMPLE_BYTES];
                fifo.copy(track, 0, bytes);
                for (s, b) in self.source[track].iter_mut().zip(bytes.chunks_exact(SAMPLE_BYTES)) {
                    *s = f32::from_ne_bytes([b[0], b[1], b[2], b[3]]);
                }
            }
        }

        let mut consumed = 0;
        for track in 0..tracks {
            let src = &self.source[track][..need];
            consumed = self.resamplers[track].process(src, &mut out[track][..frames], factor);
        }

        if consumed > 0 {
            let mut fifo = feed.fifo.lock();
            for track in 0..tracks {
                fifo.move_to(track, &mut self.bytes[..consumed * SAMPLE_BYTES]);
            }
        }
        true
    }
}
