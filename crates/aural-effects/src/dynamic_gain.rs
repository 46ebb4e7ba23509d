//! LFO-driven gain modulation (tremolo).
//!
//! The gain swings between `1 - depth` and `1` at the LFO rate. The LFO is
//! sampled once per block; within a block the gain ramps linearly from the
//! previous block's value so rate changes never step.

use aural_core::{Effect, Lfo, LfoWaveform, MAX_TRACKS, rms};

/// Tremolo stage.
///
/// ## Parameters
///
/// | Parameter | Range | Default |
/// |-----------|-------|---------|
/// | rate | 0–50 Hz | 1 Hz |
/// | depth | 0–1 | 0.5 |
///
/// With the envelope waveform the gain follows the block level instead of
/// oscillating, which ducks loud passages by up to `depth`.
///
/// # Example
///
/// ```rust
/// use aural_core::{Effect, LfoWaveform};
/// use aural_effects::DynamicGain;
///
/// let mut tremolo = DynamicGain::new(48000.0);
/// tremolo.set_rate(4.0);
/// tremolo.set_depth(0.8);
/// tremolo.set_waveform(LfoWaveform::Sine);
///
/// let mut block = [0.5f32; 256];
/// tremolo.process_track(0, &mut block);
/// tremolo.end_block(256);
/// ```
#[derive(Debug, Clone)]
pub struct DynamicGain {
    lfo: Lfo,
    depth: f32,
    last: [f32; MAX_TRACKS],
}

impl DynamicGain {
    /// Creates a tremolo at 1 Hz with half depth.
    pub fn new(sample_rate: f32) -> Self {
        let mut fx = Self {
            lfo: Lfo::new(sample_rate, 1.0),
            depth: 0.0,
            last: [1.0; MAX_TRACKS],
        };
        fx.set_depth(0.5);
        fx
    }

    /// Sets the modulation rate in Hz.
    pub fn set_rate(&mut self, hz: f32) {
        if hz.is_finite() {
            self.lfo.set_frequency(hz.clamp(0.0, 50.0));
        }
    }

    /// Modulation rate in Hz.
    pub fn rate(&self) -> f32 {
        self.lfo.frequency()
    }

    /// Sets how far the gain dips below unity, `0..=1`.
    pub fn set_depth(&mut self, depth: f32) {
        if depth.is_finite() {
            self.depth = depth.clamp(0.0, 1.0);
            self.lfo.set_range(1.0 - self.depth, 1.0);
        }
    }

    /// Modulation depth.
    pub fn depth(&self) -> f32 {
        self.depth
    }

    pub fn set_waveform(&mut self, waveform: LfoWaveform) {
        self.lfo.set_waveform(waveform);
    }

    pub fn set_inverse(&mut self, inverse: bool) {
        self.lfo.set_inverse(inverse);
    }

    pub fn set_stereo_link(&mut self, linked: bool) {
        self.lfo.set_stereo_link(linked);
    }

    /// Returns `true` when the stage cannot change the signal.
    pub fn is_identity(&self) -> bool {
        self.depth < 1e-6
    }
}

impl Effect for DynamicGain {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        if block.is_empty() {
            return;
        }
        let slot = track % MAX_TRACKS;
        if self.lfo.waveform() == LfoWaveform::Envelope {
            // Louder blocks pull the gain down.
            self.lfo.follow(track, rms(block));
        }
        let target = match self.lfo.waveform() {
            LfoWaveform::Envelope => 2.0 - self.depth - self.lfo.value(track),
            _ => self.lfo.value(track),
        };
        let from = self.last[slot];
        let step = (target - from) / block.len() as f32;
        for (i, s) in block.iter_mut().enumerate() {
            *s *= from + step * (i + 1) as f32;
        }
        self.last[slot] = target;
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        self.lfo.set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        self.lfo.reset();
        self.last = [1.0; MAX_TRACKS];
    }

    fn end_block(&mut self, frames: usize) {
        self.lfo.advance(frames);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(fx: &mut DynamicGain, blocks: usize, len: usize) -> Vec<f32> {
        let mut out = Vec::with_capacity(blocks * len);
        for _ in 0..blocks {
            let mut block = vec![1.0f32; len];
            fx.process_track(0, &mut block);
            fx.end_block(len);
            out.extend_from_slice(&block);
        }
        out
    }

    #[test]
    fn zero_depth_is_identity() {
        let mut fx = DynamicGain::new(48000.0);
        fx.set_depth(0.0);
        assert!(fx.is_identity());
        let out = run(&mut fx, 8, 64);
        assert!(out.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn gain_swings_across_depth() {
        let mut fx = DynamicGain::new(48000.0);
        fx.set_rate(10.0);
        fx.set_depth(0.6);
        fx.set_waveform(LfoWaveform::Triangle);
        // Two full cycles at 10 Hz.
        let out = run(&mut fx, 300, 32);
        let lo = out.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = out.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        assert!(lo >= 0.4 - 1e-4 && lo < 0.45, "min gain {lo}");
        assert!(hi <= 1.0 + 1e-6 && hi > 0.95, "max gain {hi}");
    }

    #[test]
    fn gain_ramps_without_steps() {
        let mut fx = DynamicGain::new(48000.0);
        fx.set_rate(20.0);
        fx.set_depth(1.0);
        fx.set_waveform(LfoWaveform::Square);
        let out = run(&mut fx, 100, 128);
        let jump = out
            .windows(2)
            .map(|w| (w[1] - w[0]).abs())
            .fold(0.0f32, f32::max);
        assert!(jump <= 1.0 / 128.0 + 1e-5, "largest step {jump}");
    }

    #[test]
    fn envelope_ducks_loud_blocks() {
        let mut fx = DynamicGain::new(48000.0);
        fx.set_depth(0.5);
        fx.set_waveform(LfoWaveform::Envelope);
        let mut quiet = [0.01f32; 64];
        fx.process_track(0, &mut quiet);
        let mut loud = [1.0f32; 64];
        fx.process_track(0, &mut loud);
        fx.process_track(0, &mut loud);
        assert!(quiet[63] > 0.0099 * 0.99);
        assert!((loud[63] - 0.5).abs() < 1e-4, "ducked to {}", loud[63]);
    }
}
