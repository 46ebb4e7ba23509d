//! Render pass and matrix-update pass.
//!
//! Every period the renderer:
//!
//! 1. copies the subtree under the root into its [`Snapshot`] under the graph
//!    lock and releases it,
//! 2. brings per-node runtime state (effects chain, sensor reader, buffers)
//!    in line with the snapshot,
//! 3. every `update_interval` periods, or when an update was requested,
//!    recomputes world matrices, distance and cone gains, pan gains and
//!    doppler,
//! 4. walks the snapshot children-first: sensors pull and resample input,
//!    each node applies distance gain then its effects chain, and the result
//!    is added into the parent's working buffer,
//! 5. interleaves the root buffer into the output block.
//!
//! Runtime state lives here, not in the graph, so only the mixer thread ever
//! touches effect history.

use aural_core::{Cone, Distance, Effect, MAX_TRACKS, doppler_factor, mix_add, scale};
use aural_effects::{Dsp, DspKind, EffectsChain, FilterType};
use glam::{Mat4, Vec3};
use parking_lot::Mutex;

use crate::graph::{Graph, Snapshot, SnapshotEntry};
use crate::node::{Capabilities, NodeId};
use crate::sensor::SensorReader;

const DISTANCE: DspKind = DspKind::Filter(FilterType::Distance);

/// Distances below this are treated as "at the listener": centred, no doppler.
const NEAR: f32 = 1e-6;

/// Local axis a node faces along.
const FORWARD: Vec3 = Vec3::NEG_Z;

#[derive(Debug)]
struct NodeRuntime {
    chain: EffectsChain,
    reader: Option<SensorReader>,
    buffers: Vec<Vec<f32>>,
    dsp_version: u64,
    reset_epoch: u64,
    world: Mat4,
    inverse: Mat4,
    velocity: Vec3,
    distance_gain: f32,
    pan: [f32; MAX_TRACKS],
    doppler: f32,
}

impl NodeRuntime {
    fn new(entry: &SnapshotEntry, sample_rate: f32, frames: usize) -> Self {
        let tracks = entry.tracks.clamp(1, MAX_TRACKS);
        Self {
            chain: EffectsChain::new(sample_rate, tracks, frames),
            reader: entry.sensor.as_ref().map(|feed| SensorReader::new(feed.tracks(), frames)),
            buffers: vec![vec![0.0; frames]; tracks],
            dsp_version: u64::MAX,
            reset_epoch: entry.reset_epoch,
            world: Mat4::IDENTITY,
            inverse: Mat4::IDENTITY,
            velocity: Vec3::ZERO,
            distance_gain: 1.0,
            pan: [1.0; MAX_TRACKS],
            doppler: 1.0,
        }
    }

    fn sync_dsps(&mut self, dsps: &[Dsp]) {
        for kind in DspKind::ALL {
            if self.chain.get(kind).is_some() && !dsps.iter().any(|d| d.kind() == kind) {
                self.chain.remove(kind);
            }
        }
        for dsp in dsps {
            if self.chain.get(dsp.kind()) != Some(dsp) {
                self.chain.set(dsp.clone());
            }
        }
    }

    fn reset(&mut self) {
        self.chain.reset();
        if let Some(reader) = &mut self.reader {
            reader.reset();
        }
    }

    /// Distance curve this node installs: `Some(None)` if present but off.
    fn distance(&self) -> Option<Option<Distance>> {
        self.chain.get(DISTANCE).map(|_| self.chain.distance())
    }
}

/// Per-period renderer owned by the mixer thread.
#[derive(Debug)]
pub(crate) struct Renderer {
    sample_rate: f32,
    tracks: usize,
    frames: usize,
    update_interval: u64,
    periods: u64,
    snapshot: Snapshot,
    runtimes: Vec<Option<NodeRuntime>>,
    listeners: Vec<usize>,
    force_update: bool,
}

impl Renderer {
    pub(crate) fn new(sample_rate: f32, tracks: usize, frames: usize, update_interval: u32) -> Self {
        Self {
            sample_rate,
            tracks: tracks.clamp(1, MAX_TRACKS),
            frames: frames.max(1),
            update_interval: u64::from(update_interval.max(1)),
            periods: 0,
            snapshot: Snapshot::new(),
            runtimes: Vec::new(),
            listeners: Vec::new(),
            force_update: true,
        }
    }

    pub(crate) fn periods(&self) -> u64 {
        self.periods
    }

    /// Renders one period of the subtree under `root` into interleaved
    /// `out` and returns the frames written.
    ///
    /// At most one period of frames is rendered; samples past that are
    /// zeroed.
    pub(crate) fn render(&mut self, graph: &Mutex<Graph>, root: NodeId, out: &mut [f32]) -> usize {
        let frames = (out.len() / self.tracks).min(self.frames);

        graph.lock().snapshot_into(root, &mut self.snapshot);

        self.reconcile();
        if self.force_update
            || self.snapshot.update_requested
            || self.periods % self.update_interval == 0
        {
            self.update();
            self.force_update = false;
        }
        self.mix(frames);
        self.interleave(out, frames);

        self.periods += 1;
        frames
    }

    fn reconcile(&mut self) {
        for id in &self.snapshot.removed {
            if let Some(slot) = self.runtimes.get_mut(id.index() as usize) {
                *slot = None;
            }
        }

        for entry in &self.snapshot.entries {
            let index = entry.id.index() as usize;
            if index >= self.runtimes.len() {
                self.runtimes.resize_with(index + 1, || None);
            }
            let slot = &mut self.runtimes[index];
            if slot.is_none() {
                *slot = Some(NodeRuntime::new(entry, self.sample_rate, self.frames));
                self.force_update = true;
            }
            let Some(rt) = slot.as_mut() else {
                continue;
            };
            if rt.reset_epoch != entry.reset_epoch {
                rt.reset();
                rt.reset_epoch = entry.reset_epoch;
            }
            if rt.dsp_version != entry.dsp_version {
                rt.sync_dsps(&entry.dsps);
                rt.dsp_version = entry.dsp_version;
            }
        }
    }

    /// Matrix-update pass.
    ///
    /// Entries are in pre-order, so a parent's world matrix is always final
    /// before its children read it.
    fn update(&mut self) {
        let entries = &self.snapshot.entries;
        let runtimes = &mut self.runtimes;
        self.listeners.clear();

        for (i, entry) in entries.iter().enumerate() {
            let parent = entry.parent.and_then(|p| runtime(&**runtimes, entries[p].id));
            let (parent_world, parent_velocity) =
                parent.map_or((Mat4::IDENTITY, Vec3::ZERO), |p| (p.world, p.velocity));

            // Positional buses are the listening point of their children.
            let listener = match entry.parent {
                None => i,
                Some(p) if entries[p].caps.contains(Capabilities::FRAME) => p,
                Some(p) => self.listeners[p],
            };
            self.listeners.push(listener);

            let (world, velocity) = if entry.relative {
                (
                    parent_world * entry.matrix,
                    parent_velocity + parent_world.transform_vector3(entry.velocity),
                )
            } else {
                (entry.matrix, entry.velocity)
            };

            let spatial = match entry.parent {
                Some(p) if entry.caps.contains(Capabilities::POSITIONAL) => {
                    let view = &**runtimes;
                    let (inverse, listener_velocity) = runtime(view, entries[listener].id)
                        .map_or((Mat4::IDENTITY, Vec3::ZERO), |l| (l.inverse, l.velocity));
                    Some(Spatial::resolve(
                        inverse,
                        listener_velocity,
                        world,
                        velocity,
                        distance_curve(entries, view, i),
                        velocity_params(entries, view, i),
                        runtime(view, entry.id).and_then(|rt| rt.chain.cone()),
                        entry.tracks,
                        entries[p].tracks,
                    ))
                }
                _ => None,
            };

            let Some(rt) = runtimes
                .get_mut(entry.id.index() as usize)
                .and_then(Option::as_mut)
            else {
                continue;
            };
            rt.world = world;
            rt.velocity = velocity;
            let inverse = world.inverse();
            rt.inverse = if inverse.is_finite() { inverse } else { Mat4::IDENTITY };
            match spatial {
                Some(s) => {
                    rt.distance_gain = s.gain;
                    rt.pan = s.pan;
                    rt.doppler = s.doppler;
                }
                None => {
                    rt.distance_gain = 1.0;
                    rt.pan = [1.0; MAX_TRACKS];
                    rt.doppler = 1.0;
                }
            }
        }
    }

    /// Render pass: children before parents.
    fn mix(&mut self, frames: usize) {
        let entries = &self.snapshot.entries;

        for entry in entries {
            if !entry.active || !entry.caps.contains(Capabilities::MIXING_BUS) {
                continue;
            }
            if let Some(rt) = runtime_mut(&mut self.runtimes, entry.id) {
                for buf in &mut rt.buffers {
                    buf[..frames].fill(0.0);
                }
            }
        }

        for entry in entries.iter().rev() {
            if !entry.active {
                continue;
            }
            let Some(rt) = runtime_mut(&mut self.runtimes, entry.id) else {
                continue;
            };

            if let (Some(reader), Some(feed)) = (rt.reader.as_mut(), entry.sensor.as_deref()) {
                let factor = feed.sample_rate() / self.sample_rate * rt.chain.pitch() * rt.doppler;
                if !reader.read(feed, &mut rt.buffers, frames, factor) {
                    tracing::trace!(node = %entry.id, "sensor starved, rendering silence");
                }
            }

            if rt.distance_gain != 1.0 {
                for buf in &mut rt.buffers {
                    scale(&mut buf[..frames], rt.distance_gain);
                }
            }
            if !rt.chain.is_bypassed() {
                for (track, buf) in rt.buffers.iter_mut().enumerate() {
                    rt.chain.process_track(track, &mut buf[..frames]);
                }
            }
            rt.chain.end_block(frames);

            let Some(parent) = entry.parent else {
                continue;
            };
            let gain = entry.gain;
            let pan = rt.pan;
            let source = std::mem::take(&mut rt.buffers);

            if let Some(dst) = runtime_mut(&mut self.runtimes, entries[parent].id) {
                for (track, buf) in dst.buffers.iter_mut().enumerate() {
                    let from = if source.len() == 1 { 0 } else { track };
                    let Some(src) = source.get(from) else {
                        continue;
                    };
                    let g = gain * pan[track];
                    if g != 0.0 {
                        mix_add(&mut buf[..frames], &src[..frames], g);
                    }
                }
            }

            if let Some(rt) = runtime_mut(&mut self.runtimes, entry.id) {
                rt.buffers = source;
            }
        }
    }

    fn interleave(&self, out: &mut [f32], frames: usize) {
        out.fill(0.0);
        let Some(root) = self.snapshot.entries.first().filter(|e| e.active) else {
            return;
        };
        let Some(rt) = runtime(&self.runtimes, root.id) else {
            return;
        };
        for (track, buf) in rt.buffers.iter().enumerate().take(self.tracks) {
            for (frame, &sample) in buf[..frames].iter().enumerate() {
                out[frame * self.tracks + track] = sample * root.gain;
            }
        }
    }
}

fn runtime(runtimes: &[Option<NodeRuntime>], id: NodeId) -> Option<&NodeRuntime> {
    runtimes.get(id.index() as usize).and_then(Option::as_ref)
}

fn runtime_mut(runtimes: &mut [Option<NodeRuntime>], id: NodeId) -> Option<&mut NodeRuntime> {
    runtimes.get_mut(id.index() as usize).and_then(Option::as_mut)
}

/// Nearest distance curve on the path from entry `i` to the root.
///
/// A node without any distance filter on its path uses the default curve.
fn distance_curve(
    entries: &[SnapshotEntry],
    runtimes: &[Option<NodeRuntime>],
    mut i: usize,
) -> Option<Distance> {
    loop {
        if let Some(found) = runtime(runtimes, entries[i].id).and_then(NodeRuntime::distance) {
            return found;
        }
        match entries[i].parent {
            Some(p) => i = p,
            None => return Some(Distance::default()),
        }
    }
}

/// `(speed_of_sound, doppler_factor)` from the node itself or the root.
fn velocity_params(
    entries: &[SnapshotEntry],
    runtimes: &[Option<NodeRuntime>],
    i: usize,
) -> Option<(f32, f32)> {
    runtime(runtimes, entries[i].id)
        .and_then(|rt| rt.chain.velocity())
        .or_else(|| runtime(runtimes, entries[0].id).and_then(|rt| rt.chain.velocity()))
}

/// Gains and pitch derived from one node's position relative to its
/// listening point.
#[derive(Debug, Clone, Copy)]
struct Spatial {
    gain: f32,
    pan: [f32; MAX_TRACKS],
    doppler: f32,
}

impl Spatial {
    #[allow(clippy::too_many_arguments)]
    fn resolve(
        listener_inverse: Mat4,
        listener_velocity: Vec3,
        world: Mat4,
        velocity: Vec3,
        curve: Option<Distance>,
        speed: Option<(f32, f32)>,
        cone: Option<Cone>,
        source_tracks: usize,
        bus_tracks: usize,
    ) -> Self {
        let rel = listener_inverse.transform_point3(world.w_axis.truncate());
        let dist = rel.length();
        let mut gain = curve.map_or(1.0, |c| c.gain(dist));

        if let Some(cone) = cone.filter(|_| dist > NEAR) {
            let facing = listener_inverse
                .transform_vector3(world.transform_vector3(FORWARD))
                .normalize_or_zero();
            if facing != Vec3::ZERO {
                gain *= cone.gain(facing.dot(-rel / dist));
            }
        }

        let mut pan = [1.0; MAX_TRACKS];
        if source_tracks == 1 && bus_tracks >= 2 {
            // Equal-power across the front pair; other tracks are not fed.
            let x = if dist > NEAR { (rel.x / dist).clamp(-1.0, 1.0) } else { 0.0 };
            pan = [0.0; MAX_TRACKS];
            pan[0] = ((1.0 - x) * 0.5).sqrt();
            pan[1] = ((1.0 + x) * 0.5).sqrt();
        }

        let doppler = match speed {
            Some((c, factor)) if dist > NEAR => {
                let towards_source = rel / dist;
                let source_v = listener_inverse.transform_vector3(velocity);
                let listener_v = listener_inverse.transform_vector3(listener_velocity);
                doppler_factor(
                    listener_v.dot(towards_source) * factor,
                    -source_v.dot(towards_source) * factor,
                    c,
                )
            }
            _ => 1.0,
        };

        Self { gain, pan, doppler }
    }
}
