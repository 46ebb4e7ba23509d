//! Fixed-capacity multi-slot byte FIFO.
//!
//! A [`DataBuffer`] owns one contiguous allocation split into `no_buffers`
//! equally sized slots. Every slot keeps its own fill level (`offset`) and all
//! transfers are rounded down to a multiple of the buffer's `blocksize`, so a
//! slot never holds a partial frame.
//!
//! The buffer is the hand-off point between producers and consumers of raw
//! PCM: sensors push decoded frames in with [`add`](DataBuffer::add), the
//! mixer pops whole frames out with [`move_to`](DataBuffer::move_to).
//!
//! # Invariants
//!
//! - `0 <= offset[i] <= size` for every slot
//! - bytes moved by `add`/`move_*` are always a multiple of `blocksize`
//! - the buffer is never resized after [`create`](DataBuffer::create)
//!
//! Out-of-range slot numbers are caller misuse: they trip a `debug_assert!`
//! in debug builds and turn the call into a no-op returning `0`/`false` in
//! release builds.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Selects one slot or every slot of a [`DataBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// A single slot by index.
    One(usize),
    /// All slots at once.
    All,
}

/// Multi-slot circular byte store with independent fill offsets.
///
/// # Example
///
/// ```rust
/// use aural_core::DataBuffer;
///
/// let mut buf = DataBuffer::create(2, 1024, 4).unwrap();
/// assert_eq!(buf.add(0, &[0u8; 600]), 600);
/// assert_eq!(buf.add(0, &[0u8; 600]), 424);
/// assert_eq!(buf.avail(0), 1024);
/// ```
#[derive(Debug, Clone)]
pub struct DataBuffer {
    data: Vec<u8>,
    offsets: Vec<usize>,
    size: usize,
    blocksize: usize,
}

impl DataBuffer {
    /// Allocates `slots` regions of `size` bytes each.
    ///
    /// A `blocksize` of zero is treated as one. Returns `None` when `slots`
    /// or `size` is zero or when the backing allocation cannot be obtained.
    pub fn create(slots: usize, size: usize, blocksize: usize) -> Option<Self> {
        if slots == 0 || size == 0 {
            return None;
        }
        let total = slots.checked_mul(size)?;

        let mut data = Vec::new();
        if data.try_reserve_exact(total).is_err() {
            #[cfg(feature = "tracing")]
            tracing::warn!(slots, size, "data buffer allocation failed");
            return None;
        }
        data.resize(total, 0);

        let mut offsets = Vec::new();
        offsets.try_reserve_exact(slots).ok()?;
        offsets.resize(slots, 0);

        Some(Self {
            data,
            offsets,
            size,
            blocksize: blocksize.max(1),
        })
    }

    /// Number of independent slots.
    #[inline]
    pub fn no_buffers(&self) -> usize {
        self.offsets.len()
    }

    /// Capacity of one slot in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Transfer granularity in bytes.
    #[inline]
    pub fn blocksize(&self) -> usize {
        self.blocksize
    }

    /// Bytes currently held by `slot`.
    pub fn avail(&self, slot: usize) -> usize {
        if !self.check_slot(slot) {
            return 0;
        }
        self.offsets[slot]
    }

    /// Bytes that can still be added to `slot`.
    pub fn free_space(&self, slot: usize) -> usize {
        if !self.check_slot(slot) {
            return 0;
        }
        self.size - self.offsets[slot]
    }

    /// Read-only view of the filled part of `slot`.
    pub fn data(&self, slot: usize) -> &[u8] {
        if !self.check_slot(slot) {
            return &[];
        }
        let start = slot * self.size;
        &self.data[start..start + self.offsets[slot]]
    }

    /// Appends as much of `data` as fits, rounded down to whole blocks.
    ///
    /// Returns the number of bytes written. A short count is backpressure:
    /// the caller retries the remainder later.
    pub fn add(&mut self, slot: usize, data: &[u8]) -> usize {
        if !self.check_slot(slot) {
            return 0;
        }
        let offset = self.offsets[slot];
        let n = self.round(data.len().min(self.size - offset));
        if n > 0 {
            let start = slot * self.size + offset;
            self.data[start..start + n].copy_from_slice(&data[..n]);
            self.offsets[slot] += n;
        }
        n
    }

    /// Pops bytes from the front of `slot` into `dst` (FIFO order).
    ///
    /// Moves `min(dst.len(), avail)` rounded down to whole blocks and shifts
    /// the remaining bytes to the front of the slot. Returns 0 when `dst` is
    /// smaller than one block.
    pub fn move_to(&mut self, slot: usize, dst: &mut [u8]) -> usize {
        if !self.check_slot(slot) || dst.len() < self.blocksize {
            return 0;
        }
        let n = self.round(dst.len().min(self.offsets[slot]));
        if n > 0 {
            let start = slot * self.size;
            dst[..n].copy_from_slice(&self.data[start..start + n]);
            self.shift_down(slot, 0, n);
        }
        n
    }

    /// Removes `dst.len()` bytes starting at byte `offset` of `slot`.
    ///
    /// Returns 0 if the requested window extends past the filled data or if
    /// `dst` is smaller than one block. Bytes after the window move down to
    /// close the gap.
    pub fn move_offset(&mut self, slot: usize, offset: usize, dst: &mut [u8]) -> usize {
        if !self.check_slot(slot) || dst.len() < self.blocksize {
            return 0;
        }
        let filled = self.offsets[slot];
        if offset.saturating_add(dst.len()) > filled {
            return 0;
        }
        let n = self.round(dst.len().min(filled - offset));
        if n > 0 {
            let start = slot * self.size + offset;
            dst[..n].copy_from_slice(&self.data[start..start + n]);
            self.shift_down(slot, offset, n);
        }
        n
    }

    /// Copies `dst.len()` bytes starting at `offset` without consuming them.
    ///
    /// Same bounds rules as [`move_offset`](Self::move_offset).
    pub fn copy(&self, slot: usize, offset: usize, dst: &mut [u8]) -> usize {
        if !self.check_slot(slot) || dst.len() < self.blocksize {
            return 0;
        }
        let filled = self.offsets[slot];
        if offset.saturating_add(dst.len()) > filled {
            return 0;
        }
        let n = self.round(dst.len().min(filled - offset));
        let start = slot * self.size + offset;
        dst[..n].copy_from_slice(&self.data[start..start + n]);
        n
    }

    /// Transfers up to `size` bytes from the front of `src`'s slot to the
    /// back of `dst`'s slot.
    ///
    /// The amount is bounded by the data available in the source, the free
    /// space in the destination and both blocksizes. Returns 0 when `size` is
    /// smaller than either blocksize.
    pub fn move_data(
        src: &mut DataBuffer,
        src_slot: usize,
        dst: &mut DataBuffer,
        dst_slot: usize,
        size: usize,
    ) -> usize {
        if !src.check_slot(src_slot) || !dst.check_slot(dst_slot) {
            return 0;
        }
        if size < src.blocksize || size < dst.blocksize {
            return 0;
        }

        let step = lcm(src.blocksize, dst.blocksize);
        let mut n = size.min(src.offsets[src_slot]);
        n = n.min(dst.size - dst.offsets[dst_slot]);
        n -= n % step;
        if n == 0 {
            return 0;
        }

        let from = src_slot * src.size;
        let to = dst_slot * dst.size + dst.offsets[dst_slot];
        dst.data[to..to + n].copy_from_slice(&src.data[from..from + n]);
        dst.offsets[dst_slot] += n;
        src.shift_down(src_slot, 0, n);
        n
    }

    /// Resets the fill level of one or all slots without deallocating.
    pub fn clear(&mut self, slot: Slot) {
        match slot {
            Slot::All => self.offsets.iter_mut().for_each(|o| *o = 0),
            Slot::One(i) => {
                if self.check_slot(i) {
                    self.offsets[i] = 0;
                }
            }
        }
    }

    /// Forces the fill level of `slot`, clamped to the slot size and rounded
    /// down to a whole block.
    ///
    /// Used after writing directly through [`free_region_mut`](Self::free_region_mut).
    pub fn set_offset(&mut self, slot: usize, offset: usize) -> bool {
        if !self.check_slot(slot) {
            return false;
        }
        self.offsets[slot] = self.round(offset.min(self.size));
        true
    }

    /// Advances the fill level of `slot` by `n` bytes, clamped to the slot
    /// size and rounded down to a whole block.
    pub fn increase_offset(&mut self, slot: usize, n: usize) -> bool {
        if !self.check_slot(slot) {
            return false;
        }
        let filled = self.offsets[slot].saturating_add(n).min(self.size);
        self.offsets[slot] = self.round(filled);
        true
    }

    /// Mutable view of the unused tail of `slot`.
    pub fn free_region_mut(&mut self, slot: usize) -> &mut [u8] {
        if !self.check_slot(slot) {
            return &mut [];
        }
        let start = slot * self.size + self.offsets[slot];
        let end = (slot + 1) * self.size;
        &mut self.data[start..end]
    }

    #[inline]
    fn round(&self, n: usize) -> usize {
        n - n % self.blocksize
    }

    /// Drops `n` bytes at `at` and closes the gap.
    fn shift_down(&mut self, slot: usize, at: usize, n: usize) {
        let base = slot * self.size;
        let filled = self.offsets[slot];
        let tail = filled - at - n;
        if tail > 0 {
            self.data
                .copy_within(base + at + n..base + filled, base + at);
        }
        self.offsets[slot] = filled - n;
    }

    #[inline]
    fn check_slot(&self, slot: usize) -> bool {
        debug_assert!(
            slot < self.offsets.len(),
            "slot {} out of range (no_buffers = {})",
            slot,
            self.offsets.len()
        );
        slot < self.offsets.len()
    }
}

fn lcm(a: usize, b: usize) -> usize {
    let (mut x, mut y) = (a, b);
    while y != 0 {
        (x, y) = (y, x % y);
    }
    a / x * b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(n: usize) -> Vec<u8> {
        (0..n).map(|i| (i % 251) as u8).collect()
    }

    #[test]
    fn create_rejects_empty_shapes() {
        assert!(DataBuffer::create(0, 16, 4).is_none());
        assert!(DataBuffer::create(2, 0, 4).is_none());
        assert!(DataBuffer::create(usize::MAX, 2, 1).is_none());
    }

    #[test]
    fn zero_blocksize_becomes_one() {
        let buf = DataBuffer::create(1, 8, 0).unwrap();
        assert_eq!(buf.blocksize(), 1);
    }

    #[test]
    fn add_stops_at_free_space() {
        let mut buf = DataBuffer::create(2, 1024, 4).unwrap();
        assert_eq!(buf.add(0, &[1u8; 600]), 600);
        assert_eq!(buf.add(0, &[2u8; 600]), 424);
        assert_eq!(buf.avail(0), 1024);
        assert_eq!(buf.free_space(0), 0);
        assert_eq!(buf.avail(1), 0, "slot 1 must be untouched");
    }

    #[test]
    fn add_rounds_to_blocksize() {
        let mut buf = DataBuffer::create(1, 64, 4).unwrap();
        assert_eq!(buf.add(0, &[0u8; 7]), 4);
        assert_eq!(buf.avail(0), 4);
    }

    #[test]
    fn move_is_fifo() {
        let mut buf = DataBuffer::create(1, 64, 2).unwrap();
        let data = ramp(20);
        buf.add(0, &data);

        let mut out = [0u8; 8];
        assert_eq!(buf.move_to(0, &mut out), 8);
        assert_eq!(&out, &data[..8]);
        assert_eq!(buf.data(0), &data[8..]);
    }

    #[test]
    fn move_smaller_than_block_returns_zero() {
        let mut buf = DataBuffer::create(1, 64, 8).unwrap();
        buf.add(0, &[9u8; 32]);
        let mut out = [0u8; 7];
        assert_eq!(buf.move_to(0, &mut out), 0);
        assert_eq!(buf.avail(0), 32);
    }

    #[test]
    fn move_offset_removes_window() {
        let mut buf = DataBuffer::create(1, 64, 2).unwrap();
        let data = ramp(16);
        buf.add(0, &data);

        let mut out = [0u8; 4];
        assert_eq!(buf.move_offset(0, 4, &mut out), 4);
        assert_eq!(&out, &data[4..8]);

        let mut expected = data[..4].to_vec();
        expected.extend_from_slice(&data[8..]);
        assert_eq!(buf.data(0), expected.as_slice());
    }

    #[test]
    fn move_offset_past_end_returns_zero() {
        let mut buf = DataBuffer::create(1, 64, 2).unwrap();
        buf.add(0, &ramp(16));
        let mut out = [0u8; 8];
        assert_eq!(buf.move_offset(0, 10, &mut out), 0);
        assert_eq!(buf.avail(0), 16);
    }

    #[test]
    fn copy_does_not_consume() {
        let mut buf = DataBuffer::create(1, 32, 4).unwrap();
        let data = ramp(16);
        buf.add(0, &data);
        let mut out = [0u8; 8];
        assert_eq!(buf.copy(0, 8, &mut out), 8);
        assert_eq!(&out, &data[8..]);
        assert_eq!(buf.avail(0), 16);
    }

    #[test]
    fn move_data_bounded_by_destination() {
        let mut src = DataBuffer::create(1, 64, 4).unwrap();
        let mut dst = DataBuffer::create(1, 16, 4).unwrap();
        let data = ramp(40);
        src.add(0, &data);
        dst.add(0, &[0u8; 8]);

        let moved = DataBuffer::move_data(&mut src, 0, &mut dst, 0, 40);
        assert_eq!(moved, 8);
        assert_eq!(dst.avail(0), 16);
        assert_eq!(&dst.data(0)[8..], &data[..8]);
        assert_eq!(src.data(0), &data[8..]);
    }

    #[test]
    fn move_data_respects_both_blocksizes() {
        let mut src = DataBuffer::create(1, 64, 4).unwrap();
        let mut dst = DataBuffer::create(1, 64, 6).unwrap();
        src.add(0, &ramp(40));
        assert_eq!(DataBuffer::move_data(&mut src, 0, &mut dst, 0, 5), 0);
        assert_eq!(DataBuffer::move_data(&mut src, 0, &mut dst, 0, 14), 12);
    }

    #[test]
    fn clear_all_and_one() {
        let mut buf = DataBuffer::create(3, 16, 1).unwrap();
        for slot in 0..3 {
            buf.add(slot, &[1, 2, 3]);
        }
        buf.clear(Slot::One(1));
        assert_eq!(buf.avail(1), 0);
        assert_eq!(buf.avail(0), 3);
        buf.clear(Slot::All);
        assert!((0..3).all(|s| buf.avail(s) == 0));
    }

    #[test]
    fn offsets_clamp_to_size() {
        let mut buf = DataBuffer::create(1, 16, 1).unwrap();
        assert!(buf.set_offset(0, 100));
        assert_eq!(buf.avail(0), 16);
        buf.set_offset(0, 10);
        assert!(buf.increase_offset(0, 10));
        assert_eq!(buf.avail(0), 16);
    }

    #[test]
    fn offsets_stay_block_aligned() {
        let mut buf = DataBuffer::create(1, 18, 4).unwrap();
        buf.set_offset(0, 7);
        assert_eq!(buf.avail(0), 4);
        buf.increase_offset(0, 6);
        assert_eq!(buf.avail(0), 8);
        buf.set_offset(0, 100);
        assert_eq!(buf.avail(0), 16);
        buf.increase_offset(0, 100);
        assert_eq!(buf.avail(0) % buf.blocksize(), 0);
    }

    #[test]
    fn free_region_write_then_commit() {
        let mut buf = DataBuffer::create(2, 8, 2).unwrap();
        buf.free_region_mut(1)[..4].copy_from_slice(&[5, 6, 7, 8]);
        buf.increase_offset(1, 4);
        assert_eq!(buf.data(1), &[5, 6, 7, 8]);
    }

    #[test]
    #[cfg(not(debug_assertions))]
    fn out_of_range_slot_is_noop_in_release() {
        let mut buf = DataBuffer::create(1, 8, 1).unwrap();
        assert_eq!(buf.add(5, &[1, 2]), 0);
        assert!(!buf.set_offset(5, 1));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic]
    fn out_of_range_slot_asserts_in_debug() {
        let mut buf = DataBuffer::create(1, 8, 1).unwrap();
        buf.add(5, &[1, 2]);
    }
}
