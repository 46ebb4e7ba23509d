//! Mixer façade: a shared graph plus the renderer that drains it.
//!
//! A [`Mixer`] is owned by the thread that renders periods. Control code
//! keeps a cloned [`MixerHandle`] and mutates the graph through short locks;
//! the renderer only holds the lock while copying its snapshot.

use std::sync::Arc;
use std::time::Duration;

use aural_core::MAX_TRACKS;
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;
use crate::graph::Graph;
use crate::node::{NodeId, NodeState, StateCommand};
use crate::render::Renderer;

/// Output format and timing of a mixer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSettings {
    /// Mix sample rate in Hz.
    pub sample_rate: f32,
    /// Output tracks (channels).
    pub tracks: usize,
    /// Frames per render period.
    pub period_frames: usize,
    /// Render periods per matrix-update pass.
    pub update_interval: u32,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48000.0,
            tracks: 2,
            period_frames: 1024,
            update_interval: 4,
        }
    }
}

impl MixerSettings {
    /// Settings whose period length follows from a refresh rate in periods
    /// per second.
    ///
    /// ```rust
    /// use aural_mixer::MixerSettings;
    ///
    /// let s = MixerSettings::from_refresh_rate(48000.0, 2, 50.0, 4);
    /// assert_eq!(s.period_frames, 960);
    /// ```
    pub fn from_refresh_rate(
        sample_rate: f32,
        tracks: usize,
        refresh_rate: f32,
        update_interval: u32,
    ) -> Self {
        let period_frames = if refresh_rate > 0.0 {
            (sample_rate / refresh_rate).round().max(1.0) as usize
        } else {
            Self::default().period_frames
        };
        Self {
            sample_rate,
            tracks,
            period_frames,
            update_interval,
        }
    }

    /// Wall-clock length of one period.
    pub fn period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.period_frames as f64 / f64::from(self.sample_rate))
    }

    /// Interleaved samples per period.
    pub fn period_samples(&self) -> usize {
        self.period_frames * self.tracks
    }

    fn normalized(mut self) -> Self {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            self.sample_rate = Self::default().sample_rate;
        }
        self.tracks = self.tracks.clamp(1, MAX_TRACKS);
        self.period_frames = self.period_frames.max(1);
        self.update_interval = self.update_interval.max(1);
        self
    }
}

/// Cloneable access to a mixer's graph from control threads.
#[derive(Debug, Clone)]
pub struct MixerHandle {
    graph: Arc<Mutex<Graph>>,
    root: NodeId,
}

impl MixerHandle {
    /// Locks the graph. Keep the guard short; the render thread waits on it.
    pub fn lock(&self) -> MutexGuard<'_, Graph> {
        self.graph.lock()
    }

    /// The device-level mixing bus.
    pub fn root(&self) -> NodeId {
        self.root
    }
}

/// A node graph rooted at a device mixer, rendered one period at a time.
///
/// # Example
///
/// ```rust
/// use aural_mixer::{Mixer, MixerSettings, StateCommand};
///
/// let mut mixer = Mixer::new(MixerSettings { period_frames: 256, ..Default::default() });
/// let handle = mixer.handle();
/// let feed = {
///     let mut graph = handle.lock();
///     let (voice, feed) = graph.add_sensor("voice", 48000.0, 1, 4096).unwrap();
///     graph.register(handle.root(), voice).unwrap();
///     graph.set_state(voice, StateCommand::Initialize).unwrap();
///     graph.set_state(voice, StateCommand::Play).unwrap();
///     feed
/// };
/// mixer.play().unwrap();
///
/// feed.push(&[0.25; 1024]);
/// let mut out = vec![0.0f32; 256 * 2];
/// assert_eq!(mixer.render(&mut out), 256);
/// assert!(out.iter().any(|&s| s != 0.0));
/// ```
#[derive(Debug)]
pub struct Mixer {
    settings: MixerSettings,
    graph: Arc<Mutex<Graph>>,
    root: NodeId,
    renderer: Renderer,
}

impl Mixer {
    /// Creates a mixer with an uninitialized root bus named `"mixer"`.
    pub fn new(settings: MixerSettings) -> Self {
        let settings = settings.normalized();
        let mut graph = Graph::new(settings.tracks);
        let root = graph.add_mixer("mixer");
        tracing::info!(
            sample_rate = settings.sample_rate,
            tracks = settings.tracks,
            period_frames = settings.period_frames,
            "mixer created"
        );
        Self {
            settings,
            graph: Arc::new(Mutex::new(graph)),
            root,
            renderer: Renderer::new(
                settings.sample_rate,
                settings.tracks,
                settings.period_frames,
                settings.update_interval,
            ),
        }
    }

    /// Output format and timing.
    pub fn settings(&self) -> &MixerSettings {
        &self.settings
    }

    /// The device-level mixing bus every scene hangs off.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// A handle for mutating the graph from other threads.
    pub fn handle(&self) -> MixerHandle {
        MixerHandle {
            graph: Arc::clone(&self.graph),
            root: self.root,
        }
    }

    /// Initializes the root bus if needed and starts it playing.
    pub fn play(&self) -> Result<NodeState> {
        let mut graph = self.graph.lock();
        if graph.state(self.root) == Some(NodeState::Uninitialized) {
            graph.set_state(self.root, StateCommand::Initialize)?;
        }
        graph.set_state(self.root, StateCommand::Play)
    }

    /// Renders one period into interleaved `out` and returns the frames
    /// written. `out` shorter than a period renders a partial period.
    pub fn render(&mut self, out: &mut [f32]) -> usize {
        self.renderer.render(&self.graph, self.root, out)
    }

    /// Periods rendered so far.
    pub fn periods(&self) -> u64 {
        self.renderer.periods()
    }
}
