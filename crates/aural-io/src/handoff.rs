//! Bounded handoff of rendered periods between two threads.
//!
//! One side produces whole periods of PCM, the other drains them in
//! whatever block size its device asks for. Buffers circulate through two
//! bounded channels (filled and free), so after start-up neither side
//! allocates:
//!
//! ```text
//!  producer ──send──► [filled: N periods] ──► consumer (device callback)
//!      ▲                                           │
//!      └──────────────── [free] ◄──────────────────┘
//! ```
//!
//! The producer blocks for at most its timeout when all `N` periods are
//! queued; the consumer never blocks and substitutes silence when nothing
//! is queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, SendTimeoutError, Sender, TrySendError, bounded};

use crate::pcm::{self, PcmFormat};
use crate::{Error, Result};

/// Creates a handoff holding up to `periods` queued periods of
/// `period_bytes` each.
pub fn handoff(
    format: PcmFormat,
    periods: usize,
    period_bytes: usize,
    timeout: Duration,
) -> (HandoffSender, HandoffReceiver) {
    let periods = periods.max(1);
    let pool = periods + 2;
    let (filled_tx, filled_rx) = bounded(periods);
    let (free_tx, free_rx) = bounded(pool);
    for _ in 0..pool {
        // The channel was sized for exactly this many buffers.
        let _ = free_tx.try_send(Vec::with_capacity(period_bytes));
    }
    let underruns = Arc::new(AtomicU64::new(0));
    (
        HandoffSender {
            format,
            filled: filled_tx,
            free: free_rx,
            timeout,
            underruns: Arc::clone(&underruns),
        },
        HandoffReceiver {
            format,
            filled: filled_rx,
            free: free_tx,
            current: None,
            pos: 0,
            underruns,
        },
    )
}

/// Producing side of a handoff.
#[derive(Debug)]
pub struct HandoffSender {
    format: PcmFormat,
    filled: Sender<Vec<u8>>,
    free: Receiver<Vec<u8>>,
    timeout: Duration,
    underruns: Arc<AtomicU64>,
}

impl HandoffSender {
    /// Queues a copy of `pcm`, waiting at most the timeout for room.
    ///
    /// Returns the bytes queued: `pcm.len()`, or 0 on timeout.
    pub fn send(&self, pcm: &[u8]) -> Result<usize> {
        let mut buf = self.take_buffer(pcm.len());
        buf.extend_from_slice(pcm);
        match self.filled.send_timeout(buf, self.timeout) {
            Ok(()) => Ok(pcm.len()),
            Err(SendTimeoutError::Timeout(_)) => Ok(0),
            Err(SendTimeoutError::Disconnected(_)) => Err(Error::Disconnected),
        }
    }

    /// Encodes and queues `samples` without waiting.
    ///
    /// Returns `false` if the queue is full or no spare buffer is left; the
    /// samples are dropped in that case. Safe to call from a device callback.
    pub fn offer(&self, samples: &[f32]) -> bool {
        let Ok(mut buf) = self.free.try_recv() else {
            return false;
        };
        buf.clear();
        buf.resize(samples.len() * self.format.bytes(), 0);
        pcm::encode(self.format, samples, &mut buf);
        match self.filled.try_send(buf) {
            Ok(()) => true,
            Err(TrySendError::Full(_) | TrySendError::Disconnected(_)) => false,
        }
    }

    /// Periods the consumer had to pad with silence.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    fn take_buffer(&self, capacity: usize) -> Vec<u8> {
        match self.free.try_recv() {
            Ok(mut buf) => {
                buf.clear();
                buf
            }
            Err(_) => Vec::with_capacity(capacity),
        }
    }
}

/// Consuming side of a handoff.
#[derive(Debug)]
pub struct HandoffReceiver {
    format: PcmFormat,
    filled: Receiver<Vec<u8>>,
    free: Sender<Vec<u8>>,
    current: Option<Vec<u8>>,
    pos: usize,
    underruns: Arc<AtomicU64>,
}

impl HandoffReceiver {
    /// Decodes queued PCM into `out` at `gain`.
    ///
    /// Samples nothing was queued for are zeroed and counted as one
    /// underrun. Returns `false` on underrun.
    pub fn fill(&mut self, out: &mut [f32], gain: f32) -> bool {
        let width = self.format.bytes();
        let mut written = 0;
        while written < out.len() && self.load() {
            let Some(buf) = self.current.as_ref() else {
                break;
            };
            let n = pcm::decode(self.format, &buf[self.pos..], &mut out[written..], gain);
            let len = buf.len();
            self.pos += n * width;
            written += n;
            if n == 0 || self.pos + width > len {
                self.recycle();
            }
        }
        if written < out.len() {
            out[written..].fill(0.0);
            self.underruns.fetch_add(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Copies queued PCM bytes into `out`; returns the bytes copied.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        let mut written = 0;
        while written < out.len() && self.load() {
            let Some(buf) = self.current.as_ref() else {
                break;
            };
            let n = (buf.len() - self.pos).min(out.len() - written);
            out[written..written + n].copy_from_slice(&buf[self.pos..self.pos + n]);
            let len = buf.len();
            self.pos += n;
            written += n;
            if self.pos >= len {
                self.recycle();
            }
        }
        written
    }

    /// Periods queued and not yet started.
    pub fn queued(&self) -> usize {
        self.filled.len()
    }

    /// Periods padded with silence so far.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }

    /// Drops everything queued.
    pub fn clear(&mut self) {
        self.recycle();
        while let Ok(buf) = self.filled.try_recv() {
            let _ = self.free.try_send(buf);
        }
    }

    /// Makes sure a buffer is being drained; `false` if none is queued.
    fn load(&mut self) -> bool {
        if self.current.is_none() {
            match self.filled.try_recv() {
                Ok(buf) => {
                    self.current = Some(buf);
                    self.pos = 0;
                }
                Err(_) => return false,
            }
        }
        true
    }

    fn recycle(&mut self) {
        if let Some(buf) = self.current.take() {
            let _ = self.free.try_send(buf);
        }
        self.pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(periods: usize) -> (HandoffSender, HandoffReceiver) {
        handoff(PcmFormat::Pcm16, periods, 8, Duration::from_millis(5))
    }

    fn encoded(samples: &[f32]) -> Vec<u8> {
        let mut bytes = Vec::new();
        pcm::encode_into(PcmFormat::Pcm16, samples, &mut bytes);
        bytes
    }

    #[test]
    fn blocks_span_period_boundaries() {
        let (tx, mut rx) = pair(4);
        assert_eq!(tx.send(&encoded(&[0.5; 4])).unwrap(), 8);
        assert_eq!(tx.send(&encoded(&[-0.5; 4])).unwrap(), 8);

        let mut out = [0.0f32; 6];
        assert!(rx.fill(&mut out, 1.0));
        assert!(out[..4].iter().all(|&s| (s - 0.5).abs() < 1e-4));
        assert!(out[4..].iter().all(|&s| (s + 0.5).abs() < 1e-4));

        let mut out = [1.0f32; 4];
        assert!(!rx.fill(&mut out, 1.0));
        assert!((out[1] + 0.5).abs() < 1e-4);
        assert_eq!(&out[2..], &[0.0, 0.0]);
        assert_eq!(tx.underruns(), 1);
    }

    #[test]
    fn full_queue_times_out() {
        let (tx, _rx) = pair(1);
        assert_eq!(tx.send(&encoded(&[0.1; 4])).unwrap(), 8);
        assert_eq!(tx.send(&encoded(&[0.1; 4])).unwrap(), 0);
    }

    #[test]
    fn dropped_receiver_disconnects() {
        let (tx, rx) = pair(1);
        drop(rx);
        assert!(matches!(tx.send(&[0, 0]), Err(Error::Disconnected)));
    }

    #[test]
    fn offered_samples_are_read_back_as_bytes() {
        let (tx, mut rx) = pair(2);
        assert!(tx.offer(&[0.25, -0.25]));
        let mut bytes = [0u8; 8];
        assert_eq!(rx.read(&mut bytes), 4);
        assert_eq!(&bytes[..4], encoded(&[0.25, -0.25]).as_slice());
        assert_eq!(rx.queued(), 0);
    }

    #[test]
    fn clear_discards_queue() {
        let (tx, mut rx) = pair(3);
        tx.send(&encoded(&[0.5; 4])).unwrap();
        tx.send(&encoded(&[0.5; 4])).unwrap();
        rx.clear();
        assert_eq!(rx.queued(), 0);
        let mut out = [1.0f32; 2];
        assert!(!rx.fill(&mut out, 1.0));
    }
}
