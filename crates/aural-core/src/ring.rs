//! Per-track sample ring with a history region in front of the live block.
//!
//! Delay, reverb and filter stages need to look "before" the first sample
//! of the current block. [`HistoryRing`] keeps the last `history` samples of
//! the stream directly in front of the live block so that any window
//! `[offset, offset + len)` with `offset >= -history` is one contiguous slice.
//!
//! ```text
//!  data: [ history (H samples) | block (up to C samples) ]
//!          ^ index -H            ^ index 0
//! ```
//!
//! After a block has been processed, [`commit`](HistoryRing::commit) slides
//! the tail of `history ++ block` back into the history region.

#[cfg(not(feature = "std"))]
use alloc::vec;
#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

/// Sample store with a negative-offset history region.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    data: Vec<f32>,
    history: usize,
    capacity: usize,
    len: usize,
}

impl HistoryRing {
    /// Creates a ring holding `history` past samples and blocks of up to
    /// `capacity` samples. All samples start at zero.
    pub fn new(history: usize, capacity: usize) -> Self {
        Self {
            data: vec![0.0; history + capacity],
            history,
            capacity,
            len: 0,
        }
    }

    /// Length of the history region in samples.
    #[inline]
    pub fn history_len(&self) -> usize {
        self.history
    }

    /// Largest block the ring accepts.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of samples in the live block.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no block is loaded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copies `input` into the live block.
    ///
    /// Returns the number of samples loaded, at most [`capacity`](Self::capacity).
    pub fn load(&mut self, input: &[f32]) -> usize {
        let n = input.len().min(self.capacity);
        let start = self.history;
        self.data[start..start + n].copy_from_slice(&input[..n]);
        self.len = n;
        n
    }

    /// Returns the window `[offset, offset + len)` relative to the block start.
    ///
    /// Negative offsets reach into the history region. Returns `None` if any
    /// part of the window falls outside `[-history, block_len)`.
    pub fn read_window(&self, offset: isize, len: usize) -> Option<&[f32]> {
        let start = self.index(offset)?;
        let end = start.checked_add(len)?;
        if end > self.history + self.len {
            return None;
        }
        Some(&self.data[start..end])
    }

    /// Reads one sample at `offset` relative to the block start.
    ///
    /// Positions outside the valid range clamp to the nearest valid sample.
    #[inline]
    pub fn get(&self, offset: isize) -> f32 {
        if self.history + self.len == 0 {
            return 0.0;
        }
        let last = (self.history + self.len).saturating_sub(1) as isize;
        let i = (offset + self.history as isize).clamp(0, last.max(0));
        self.data[i as usize]
    }

    /// Writes one sample of the live block. Out-of-block writes are ignored.
    #[inline]
    pub fn set(&mut self, index: usize, value: f32) {
        if index < self.len {
            self.data[self.history + index] = value;
        }
    }

    /// The live block.
    #[inline]
    pub fn block(&self) -> &[f32] {
        &self.data[self.history..self.history + self.len]
    }

    /// The live block, mutable.
    #[inline]
    pub fn block_mut(&mut self) -> &mut [f32] {
        let start = self.history;
        &mut self.data[start..start + self.len]
    }

    /// Retires the first `len` samples of the live block into history.
    ///
    /// `len` is clamped to the loaded block length. The live block is empty
    /// afterwards.
    pub fn commit(&mut self, len: usize) {
        let n = len.min(self.len);
        if self.history > 0 && n > 0 {
            // tail of history ++ block[..n]
            self.data.copy_within(n..n + self.history, 0);
        }
        self.len = 0;
    }

    /// Zeroes history and block.
    pub fn clear(&mut self) {
        self.data.iter_mut().for_each(|s| *s = 0.0);
        self.len = 0;
    }

    #[inline]
    fn index(&self, offset: isize) -> Option<usize> {
        let i = offset.checked_add(self.history as isize)?;
        usize::try_from(i).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_starts_silent() {
        let ring = HistoryRing::new(4, 8);
        assert_eq!(ring.read_window(-4, 4), Some(&[0.0; 4][..]));
    }

    #[test]
    fn window_spans_history_and_block() {
        let mut ring = HistoryRing::new(3, 4);
        ring.load(&[1.0, 2.0, 3.0, 4.0]);
        ring.commit(4);
        ring.load(&[5.0, 6.0]);

        assert_eq!(ring.read_window(-3, 5), Some(&[2.0, 3.0, 4.0, 5.0, 6.0][..]));
        assert_eq!(ring.read_window(-4, 1), None, "before history");
        assert_eq!(ring.read_window(1, 2), None, "past block");
    }

    #[test]
    fn commit_shorter_than_history_keeps_older_samples() {
        let mut ring = HistoryRing::new(4, 4);
        ring.load(&[1.0, 2.0, 3.0, 4.0]);
        ring.commit(4);
        ring.load(&[5.0, 6.0]);
        ring.commit(2);
        ring.load(&[]);
        assert_eq!(ring.read_window(-4, 4), Some(&[3.0, 4.0, 5.0, 6.0][..]));
    }

    #[test]
    fn get_clamps_out_of_range() {
        let mut ring = HistoryRing::new(2, 2);
        ring.load(&[7.0, 8.0]);
        assert_eq!(ring.get(-10), 0.0);
        assert_eq!(ring.get(5), 8.0);
        assert_eq!(ring.get(0), 7.0);
    }

    #[test]
    fn load_truncates_to_capacity() {
        let mut ring = HistoryRing::new(0, 2);
        assert_eq!(ring.load(&[1.0, 2.0, 3.0]), 2);
        assert_eq!(ring.block(), &[1.0, 2.0]);
    }

    #[test]
    fn zero_history_commit_is_noop() {
        let mut ring = HistoryRing::new(0, 4);
        ring.load(&[1.0; 4]);
        ring.commit(4);
        assert!(ring.is_empty());
    }
}
