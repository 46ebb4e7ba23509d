//! The mixer thread: renders periods and hands them to a backend.
//!
//! ```text
//! MixerThread ── render ─► encode PCM ─► Backend::playback ─► device
//!      ▲                                      │
//!      └──── blocks here when the device ◄────┘
//!            still has enough queued
//! ```
//!
//! The loop owns the [`Mixer`] and the backend. Control threads keep
//! mutating the graph through the [`MixerHandle`]; the render pass only
//! takes the graph lock long enough to copy a snapshot.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread::JoinHandle;

use aural_mixer::{Mixer, MixerHandle};

use crate::backend::{Backend, BackendConfig, StateRequest};
use crate::pcm;
use crate::{Error, Result};

/// Totals reported when a mixer thread stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThreadStats {
    /// Periods rendered.
    pub periods: u64,
    /// Periods the backend padded with silence.
    pub underruns: u64,
    /// PCM bytes the backend accepted.
    pub bytes: u64,
}

#[derive(Debug, Default)]
struct Shared {
    stop: AtomicBool,
    gain: AtomicU32,
    periods: AtomicU64,
}

/// A running mixer thread.
#[derive(Debug)]
pub struct MixerThread {
    shared: Arc<Shared>,
    handle: MixerHandle,
    config: BackendConfig,
    join: Option<JoinHandle<Result<ThreadStats>>>,
}

impl MixerThread {
    /// Starts rendering `mixer` into a backend that has already been set up
    /// with `config`.
    ///
    /// The mixer's track count must match the negotiated one.
    pub fn spawn(mixer: Mixer, backend: Box<dyn Backend>, config: BackendConfig) -> Result<Self> {
        let tracks = mixer.settings().tracks;
        if tracks != usize::from(config.tracks) {
            return Err(Error::UnsupportedFormat(format!(
                "mixer renders {tracks} tracks, backend negotiated {}",
                config.tracks
            )));
        }

        let shared = Arc::new(Shared {
            gain: AtomicU32::new(1.0f32.to_bits()),
            ..Shared::default()
        });
        let handle = mixer.handle();
        let worker = Arc::clone(&shared);
        let join = std::thread::Builder::new()
            .name("aural-mixer".into())
            .spawn(move || run(mixer, backend, config, &worker))?;

        tracing::info!(
            sample_rate = config.sample_rate,
            tracks = config.tracks,
            period_frames = config.period_frames,
            bits = config.format.bits(),
            "mixer thread started"
        );
        Ok(Self {
            shared,
            handle,
            config,
            join: Some(join),
        })
    }

    /// Graph access for control threads.
    pub fn handle(&self) -> MixerHandle {
        self.handle.clone()
    }

    /// Negotiated stream parameters.
    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    /// Sets the master output gain passed to the backend.
    pub fn set_gain(&self, gain: f32) {
        let gain = if gain.is_finite() { gain.max(0.0) } else { 1.0 };
        self.shared.gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Master output gain.
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.shared.gain.load(Ordering::Relaxed))
    }

    /// Periods rendered so far.
    pub fn periods(&self) -> u64 {
        self.shared.periods.load(Ordering::Relaxed)
    }

    /// Whether the loop is still running.
    pub fn is_running(&self) -> bool {
        self.join.as_ref().is_some_and(|j| !j.is_finished())
    }

    /// Stops the loop, closes the backend and returns the totals.
    pub fn stop(mut self) -> Result<ThreadStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<ThreadStats> {
        self.shared.stop.store(true, Ordering::Relaxed);
        let Some(join) = self.join.take() else {
            return Ok(ThreadStats::default());
        };
        join.join()
            .map_err(|_| Error::Stream("mixer thread panicked".into()))?
    }
}

impl Drop for MixerThread {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::warn!(error = %e, "mixer thread ended with an error");
        }
    }
}

fn run(
    mut mixer: Mixer,
    mut backend: Box<dyn Backend>,
    config: BackendConfig,
    shared: &Shared,
) -> Result<ThreadStats> {
    let mut samples = vec![0.0f32; mixer.settings().period_samples()];
    let mut bytes = Vec::with_capacity(samples.len() * config.format.bytes());
    let mut stats = ThreadStats::default();
    let period = config.period_duration();

    let result = (|| -> Result<()> {
        while !shared.stop.load(Ordering::Relaxed) {
            let frames = mixer.render(&mut samples);
            pcm::encode_into(config.format, &samples[..frames * usize::from(config.tracks)], &mut bytes);
            stats.periods += 1;
            shared.periods.store(stats.periods, Ordering::Relaxed);

            let mut offset = 0;
            while offset < bytes.len() && !shared.stop.load(Ordering::Relaxed) {
                let gain = f32::from_bits(shared.gain.load(Ordering::Relaxed));
                let n = backend.playback(&bytes[offset..], gain)?;
                if n == 0 && !backend.state(StateRequest::Query)? {
                    std::thread::sleep(period);
                }
                offset += n;
            }
            stats.bytes += offset as u64;

            let underruns = backend.underruns();
            if underruns > stats.underruns {
                tracing::warn!(underruns, "backend ran out of rendered periods");
                stats.underruns = underruns;
            }
        }
        Ok(())
    })();

    backend.close()?;
    tracing::info!(
        periods = stats.periods,
        underruns = stats.underruns,
        "mixer thread stopped"
    );
    result.map(|()| stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullBackend;
    use aural_mixer::MixerSettings;
    use std::time::Duration;

    #[test]
    fn track_mismatch_is_rejected() {
        let mixer = Mixer::new(MixerSettings::default());
        let config = BackendConfig {
            tracks: 1,
            ..BackendConfig::default()
        };
        let result = MixerThread::spawn(mixer, Box::new(NullBackend::new()), config);
        assert!(matches!(result, Err(Error::UnsupportedFormat(_))));
    }

    #[test]
    fn renders_until_stopped() {
        let mut config = BackendConfig {
            period_frames: 64,
            ..BackendConfig::default()
        };
        let mut backend = NullBackend::paced();
        backend.setup(&mut config).unwrap();
        let mixer = Mixer::new(MixerSettings {
            period_frames: 64,
            ..MixerSettings::default()
        });

        let thread = MixerThread::spawn(mixer, Box::new(backend), config).unwrap();
        thread.set_gain(f32::NAN);
        assert_eq!(thread.gain(), 1.0);
        std::thread::sleep(Duration::from_millis(30));
        assert!(thread.is_running());

        let stats = thread.stop().unwrap();
        assert!(stats.periods > 0);
        assert_eq!(stats.underruns, 0);
        let period = config.period_bytes() as u64;
        assert!(stats.bytes <= stats.periods * period);
        assert!(stats.bytes >= (stats.periods - 1) * period);
    }
}
