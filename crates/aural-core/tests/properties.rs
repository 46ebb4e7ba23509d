//! Property-based tests for aural-core buffers and resampler kernels.
//!
//! Checks the FIFO law of the data buffer, identity and silence laws of the
//! resampler, and bounds of history-ring windows using proptest.

use aural_core::{DataBuffer, HistoryRing, Kernel, ResampleBackend, resample};
use proptest::prelude::*;

const KERNELS: [Kernel; 4] = [Kernel::Nearest, Kernel::Linear, Kernel::Cubic, Kernel::Skip];
const BACKENDS: [ResampleBackend; 2] = [ResampleBackend::Scalar, ResampleBackend::Chunked];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Bytes added to a slot come back out unchanged and in order, rounded
    /// down to whole blocks.
    #[test]
    fn data_buffer_add_move_round_trip(
        slots in 1usize..4,
        size in 1usize..512,
        blocksize in 1usize..16,
        len in 0usize..600,
        seed in any::<u8>(),
    ) {
        let mut buf = DataBuffer::create(slots, size, blocksize).unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_add(seed)).collect();
        let slot = slots - 1;

        let added = buf.add(slot, &data);
        let expected = len.min(size) - len.min(size) % blocksize;
        prop_assert_eq!(added, expected, "add must round to blocksize");
        prop_assert!(buf.avail(slot) <= size);

        let mut out = vec![0u8; added.max(blocksize)];
        let moved = buf.move_to(slot, &mut out);
        prop_assert_eq!(moved, added);
        prop_assert_eq!(&out[..moved], &data[..added]);
        prop_assert_eq!(buf.avail(slot), 0);
    }

    /// At factor 1 with integer phase, every kernel on every backend copies
    /// the source verbatim.
    #[test]
    fn resample_unity_is_identity(
        input in prop::collection::vec(-1.0f32..=1.0f32, 1..256),
        kernel in 0usize..4,
        backend in 0usize..2,
    ) {
        let mut out = vec![0.0f32; input.len()];
        let end = resample(KERNELS[kernel], BACKENDS[backend], &mut out, &input, 0, 0.0, 1.0);
        prop_assert_eq!(&out, &input, "kernel {:?}", KERNELS[kernel]);
        prop_assert_eq!(end.index, input.len());
    }

    /// Interpolating kernels map silence to silence for any upsampling factor.
    #[test]
    fn resample_silence_stays_silent(
        factor in 0.01f32..=2.0f32,
        len in 1usize..128,
        out_len in 1usize..256,
        kernel in prop::sample::select(vec![Kernel::Linear, Kernel::Cubic]),
    ) {
        let input = vec![0.0f32; len];
        let mut out = vec![1.0f32; out_len];
        resample(kernel, ResampleBackend::Scalar, &mut out, &input, 0, 0.0, factor);
        prop_assert!(out.iter().all(|s| *s == 0.0), "factor {} produced non-silence", factor);
    }

    /// Scalar and chunked backends agree bit for bit.
    #[test]
    fn resample_backends_agree(
        input in prop::collection::vec(-1.0f32..=1.0f32, 4..128),
        factor in 0.05f32..3.0f32,
        mu in 0.0f32..0.99f32,
        out_len in 1usize..100,
    ) {
        for kernel in KERNELS {
            let mut a = vec![0.0f32; out_len];
            let mut b = vec![0.0f32; out_len];
            let pa = resample(kernel, ResampleBackend::Scalar, &mut a, &input, 1, mu, factor);
            let pb = resample(kernel, ResampleBackend::Chunked, &mut b, &input, 1, mu, factor);
            prop_assert_eq!(pa, pb);
            prop_assert!(
                a.iter().zip(&b).all(|(x, y)| x.to_bits() == y.to_bits()),
                "kernel {:?} diverged at factor {}", kernel, factor
            );
        }
    }

    /// Outputs stay within the source's range for the non-overshooting kernels.
    #[test]
    fn linear_output_is_bounded(
        input in prop::collection::vec(-1.0f32..=1.0f32, 2..64),
        factor in 0.1f32..4.0f32,
    ) {
        let lo = input.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = input.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let mut out = vec![0.0f32; 64];
        resample(Kernel::Linear, ResampleBackend::Scalar, &mut out, &input, 0, 0.0, factor);
        prop_assert!(out.iter().all(|s| *s >= lo - 1e-6 && *s <= hi + 1e-6));
    }

    /// A window is either fully inside `[-history, len)` or refused.
    #[test]
    fn history_window_bounds(
        history in 0usize..64,
        block in 0usize..64,
        offset in -128isize..128,
        len in 0usize..128,
    ) {
        let mut ring = HistoryRing::new(history, 64);
        ring.load(&vec![1.0; block]);
        let window = ring.read_window(offset, len);
        let inside = offset >= -(history as isize) && offset + len as isize <= block as isize;
        prop_assert_eq!(window.is_some(), inside);
        if let Some(w) = window {
            prop_assert_eq!(w.len(), len);
        }
    }
}
