//! Block-based effect trait.
//!
//! The mixer hands effects one track of one render period at a time. State
//! that must survive between periods (filter history, delay taps, reverb
//! tails) is kept per track inside the effect.
//!
//! ## Design Decisions
//!
//! - **Per-track, in place**: `process_track` receives a mutable block for a
//!   single track. Multichannel effects keep an array of per-track state.
//!
//! - **Object-safe**: node effect chains are `Vec<Box<dyn Effect + Send>>`
//!   when the set of effects is only known at runtime.
//!
//! - **No allocations**: buffers are sized at construction from the maximum
//!   block length and track count; the processing path never allocates.

#[cfg(not(feature = "std"))]
use alloc::boxed::Box;

/// Core trait for block-processing effects.
///
/// # Example
///
/// ```rust
/// use aural_core::Effect;
///
/// struct Gain {
///     gain: f32,
/// }
///
/// impl Effect for Gain {
///     fn process_track(&mut self, _track: usize, block: &mut [f32]) {
///         block.iter_mut().for_each(|s| *s *= self.gain);
///     }
///
///     fn set_sample_rate(&mut self, _sample_rate: f32) {}
///
///     fn reset(&mut self) {}
/// }
/// ```
pub trait Effect {
    /// Processes one block of `track` in place.
    ///
    /// Blocks longer than the effect's configured maximum are processed in
    /// pieces; track indices past the configured track count are ignored.
    fn process_track(&mut self, track: usize, block: &mut [f32]);

    /// Update the sample rate.
    ///
    /// Effects recompute sample-rate-dependent coefficients and tap
    /// lengths. History is kept.
    fn set_sample_rate(&mut self, sample_rate: f32);

    /// Reset internal state.
    ///
    /// Clears all history (delay lines, filter memory, reverb tails)
    /// without changing parameters.
    fn reset(&mut self);

    /// Called once per render period after every track was processed.
    ///
    /// Modulated effects advance their LFO phase here so all tracks of one
    /// period see the same phase.
    fn end_block(&mut self, _frames: usize) {}

    /// Number of past samples per track this effect reads.
    ///
    /// Default returns 0 (memoryless).
    fn history_samples(&self) -> usize {
        0
    }
}

impl<E: Effect + ?Sized> Effect for Box<E> {
    fn process_track(&mut self, track: usize, block: &mut [f32]) {
        (**self).process_track(track, block);
    }

    fn set_sample_rate(&mut self, sample_rate: f32) {
        (**self).set_sample_rate(sample_rate);
    }

    fn reset(&mut self) {
        (**self).reset();
    }

    fn end_block(&mut self, frames: usize) {
        (**self).end_block(frames);
    }

    fn history_samples(&self) -> usize {
        (**self).history_samples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Invert;

    impl Effect for Invert {
        fn process_track(&mut self, _track: usize, block: &mut [f32]) {
            block.iter_mut().for_each(|s| *s = -*s);
        }
        fn set_sample_rate(&mut self, _sample_rate: f32) {}
        fn reset(&mut self) {}
    }

    #[test]
    fn boxed_effect_dispatches() {
        let mut fx: Box<dyn Effect> = Box::new(Invert);
        let mut block = [1.0, -2.0];
        fx.process_track(0, &mut block);
        assert_eq!(block, [-1.0, 2.0]);
        assert_eq!(fx.history_samples(), 0);
    }
}
