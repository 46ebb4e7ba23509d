//! Node graph: registration table, node state and the render snapshot.
//!
//! [`Graph`] is the control side of the mixer. Callers mutate it under a
//! short lock (see [`MixerHandle`](crate::MixerHandle)); once per period the
//! renderer copies what it needs into a [`Snapshot`] and releases the lock
//! before touching any audio.
//!
//! Registration forms a tree: every node has at most one parent, only
//! mixing buses take children, and attaching a node that already has a
//! parent fails until it is deregistered.

use std::sync::Arc;

use aural_effects::{Dsp, DspKind, FilterType};
use glam::{Mat4, Vec3};

use crate::error::{GraphError, Result};
use crate::node::{Capabilities, NodeId, NodeState, StateCommand};
use crate::sensor::SensorFeed;

/// Children a mixing bus accepts unless told otherwise.
pub const DEFAULT_MAX_REGISTERED: usize = 256;

const DISTANCE: DspKind = DspKind::Filter(FilterType::Distance);

fn is_delay_family(kind: DspKind) -> bool {
    matches!(kind, DspKind::Effect(e) if e.delay_mode().is_some())
}

#[derive(Debug)]
struct NodeRecord {
    name: String,
    caps: Capabilities,
    state: NodeState,
    matrix: Mat4,
    velocity: Vec3,
    relative: bool,
    gain: f32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    max_registered: usize,
    dsps: Vec<Dsp>,
    dsp_version: u64,
    reset_epoch: u64,
    tracks: usize,
    sensor: Option<Arc<SensorFeed>>,
}

impl NodeRecord {
    fn new(name: String, caps: Capabilities, tracks: usize) -> Self {
        Self {
            name,
            caps,
            state: NodeState::Uninitialized,
            matrix: Mat4::IDENTITY,
            velocity: Vec3::ZERO,
            relative: false,
            gain: 1.0,
            parent: None,
            children: Vec::new(),
            max_registered: DEFAULT_MAX_REGISTERED,
            dsps: Vec::new(),
            dsp_version: 0,
            reset_epoch: 0,
            tracks,
            sensor: None,
        }
    }

    fn put_dsp(&mut self, dsp: Dsp) {
        let kind = dsp.kind();
        if is_delay_family(kind) {
            self.dsps.retain(|d| d.kind() == kind || !is_delay_family(d.kind()));
        }
        match self.dsps.iter_mut().find(|d| d.kind() == kind) {
            Some(slot) => *slot = dsp,
            None => self.dsps.push(dsp),
        }
        self.dsp_version += 1;
    }
}

/// One node as seen by a render period.
#[derive(Debug, Clone)]
pub struct SnapshotEntry {
    /// Node identifier.
    pub id: NodeId,
    /// Index of the parent entry; `None` for the root.
    pub parent: Option<usize>,
    /// Capability set.
    pub caps: Capabilities,
    /// State at snapshot time.
    pub state: NodeState,
    /// `true` if the node and all its ancestors are playing.
    pub active: bool,
    /// Local transform.
    pub matrix: Mat4,
    /// Local velocity.
    pub velocity: Vec3,
    /// Transform is relative to the parent.
    pub relative: bool,
    /// Output gain.
    pub gain: f32,
    /// Output tracks.
    pub tracks: usize,
    /// Filter and effect descriptors.
    pub dsps: Vec<Dsp>,
    /// Bumped whenever `dsps` changes.
    pub dsp_version: u64,
    /// Bumped by every [`StateCommand::Initialize`].
    pub reset_epoch: u64,
    /// Input queue of a sensor.
    pub sensor: Option<Arc<SensorFeed>>,
}

/// Flattened depth-first view of one root's subtree.
///
/// Entries are in pre-order: every parent precedes its children, so walking
/// the list backwards visits children before their parent.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Reachable nodes, root first.
    pub entries: Vec<SnapshotEntry>,
    /// A [`StateCommand::Update`] arrived since the last snapshot.
    pub update_requested: bool,
    /// Nodes destroyed since the last snapshot.
    pub removed: Vec<NodeId>,
    stack: Vec<(NodeId, Option<usize>)>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registration table and per-node control state.
///
/// # Example
///
/// ```rust
/// use aural_mixer::{Graph, GraphError, StateCommand};
///
/// let mut graph = Graph::new(2);
/// let mixer = graph.add_mixer("out");
/// let frame = graph.add_frame("room");
/// let (voice, feed) = graph.add_sensor("voice", 44100.0, 1, 8192).unwrap();
///
/// graph.register(mixer, frame).unwrap();
/// graph.register(frame, voice).unwrap();
/// assert!(matches!(
///     graph.register(mixer, voice),
///     Err(GraphError::AlreadyRegistered { .. })
/// ));
/// assert_eq!(graph.parent(voice), Some(frame));
///
/// graph.set_state(voice, StateCommand::Initialize).unwrap();
/// graph.set_state(voice, StateCommand::Play).unwrap();
/// feed.push(&[0.0; 512]);
/// ```
#[derive(Debug)]
pub struct Graph {
    nodes: Vec<Option<NodeRecord>>,
    tracks: usize,
    update_requested: bool,
    removed: Vec<NodeId>,
}

impl Graph {
    /// Creates an empty graph whose buses carry `tracks` tracks.
    pub fn new(tracks: usize) -> Self {
        Self {
            nodes: Vec::new(),
            tracks: tracks.clamp(1, aural_core::MAX_TRACKS),
            update_requested: false,
            removed: Vec::new(),
        }
    }

    /// Tracks carried by mixing buses.
    pub fn tracks(&self) -> usize {
        self.tracks
    }

    // --- Nodes ---

    /// Adds an uninitialized node with the given capabilities.
    pub fn add_node(&mut self, name: impl Into<String>, caps: Capabilities) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(NodeRecord::new(name.into(), caps, self.tracks)));
        tracing::debug!("graph_add: {id} {caps:?}");
        id
    }

    /// Adds a device-level mixing bus.
    pub fn add_mixer(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, Capabilities::MIXER)
    }

    /// Adds a positional sub-mix.
    pub fn add_frame(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, Capabilities::FRAME)
    }

    /// Adds a sensor and returns it with the queue its frames are pushed to.
    ///
    /// `capacity` is the queue length in frames at `sample_rate`.
    pub fn add_sensor(
        &mut self,
        name: impl Into<String>,
        sample_rate: f32,
        tracks: usize,
        capacity: usize,
    ) -> Result<(NodeId, Arc<SensorFeed>)> {
        let feed = SensorFeed::new(sample_rate, tracks, capacity)
            .map(Arc::new)
            .ok_or(GraphError::Allocation {
                frames: capacity,
                tracks,
            })?;
        let id = self.add_node(name, Capabilities::SENSOR);
        let record = self.record_mut(id)?;
        record.tracks = tracks;
        record.sensor = Some(Arc::clone(&feed));
        Ok((id, feed))
    }

    /// Destroys a node. It must be deregistered and have no children.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let record = self.record(id)?;
        if record.parent.is_some() || !record.children.is_empty() {
            return Err(GraphError::StillRegistered(id));
        }
        self.nodes[id.0 as usize] = None;
        self.removed.push(id);
        tracing::debug!("graph_remove: {id}");
        Ok(())
    }

    /// Returns `true` if `id` names a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.record(id).is_ok()
    }

    /// Live node IDs in creation order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_some())
            .map(|(i, _)| NodeId(i as u32))
    }

    /// Display name of a node.
    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.record(id).ok().map(|r| r.name.as_str())
    }

    /// Capability set of a node.
    pub fn capabilities(&self, id: NodeId) -> Option<Capabilities> {
        self.record(id).ok().map(|r| r.caps)
    }

    /// Input queue of a sensor node.
    pub fn sensor(&self, id: NodeId) -> Option<Arc<SensorFeed>> {
        self.record(id).ok().and_then(|r| r.sensor.clone())
    }

    // --- Registration ---

    /// Attaches `child` to the mixing bus `parent`.
    ///
    /// Fails if `child` already has a parent (including `parent` itself),
    /// if `parent` is not a mixing bus or is full, or if `child` is an
    /// ancestor of `parent`. A child without a distance filter inherits the
    /// parent's.
    pub fn register(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        let p = self.record(parent)?;
        let c = self.record(child)?;
        if let Some(current) = c.parent {
            debug_assert!(current != parent || p.children.contains(&child));
            return Err(GraphError::AlreadyRegistered {
                node: child,
                parent: current,
            });
        }
        if !p.caps.contains(Capabilities::MIXING_BUS) {
            return Err(GraphError::NotAMixingBus(parent));
        }
        if p.children.len() >= p.max_registered {
            return Err(GraphError::CapacityReached {
                parent,
                max: p.max_registered,
            });
        }
        if self.is_ancestor(child, parent) {
            return Err(GraphError::Cycle {
                node: child,
                parent,
            });
        }

        let inherited = p.dsps.iter().find(|d| d.kind() == DISTANCE).cloned();
        self.record_mut(parent)?.children.push(child);
        let c = self.record_mut(child)?;
        c.parent = Some(parent);
        if let Some(distance) = inherited {
            if !c.dsps.iter().any(|d| d.kind() == DISTANCE) {
                c.put_dsp(distance);
            }
        }
        tracing::debug!("graph_register: {child} -> {parent}");
        Ok(())
    }

    /// Detaches `child` from `parent`.
    pub fn deregister(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.record(parent)?;
        if self.record(child)?.parent != Some(parent) {
            return Err(GraphError::NotRegistered {
                node: child,
                parent,
            });
        }
        self.record_mut(parent)?.children.retain(|&c| c != child);
        self.record_mut(child)?.parent = None;
        tracing::debug!("graph_deregister: {child} -x- {parent}");
        Ok(())
    }

    /// Parent of a node.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.record(id).ok().and_then(|r| r.parent)
    }

    /// Children of a node in registration order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.record(id).map_or(&[], |r| r.children.as_slice())
    }

    /// Limits how many children a bus accepts. Existing children stay.
    pub fn set_max_registered(&mut self, id: NodeId, max: usize) -> Result<()> {
        self.record_mut(id)?.max_registered = max;
        Ok(())
    }

    /// Registration limit of a bus.
    pub fn max_registered(&self, id: NodeId) -> Option<usize> {
        self.record(id).ok().map(|r| r.max_registered)
    }

    fn is_ancestor(&self, candidate: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == candidate {
                return true;
            }
            match self.parent(node) {
                Some(p) => node = p,
                None => return false,
            }
        }
    }

    // --- State ---

    /// Applies a state command and returns the new state.
    pub fn set_state(&mut self, id: NodeId, command: StateCommand) -> Result<NodeState> {
        let record = self.record_mut(id)?;
        let from = record.state;
        let to = from.apply(command).ok_or(GraphError::InvalidTransition {
            node: id,
            from,
            command,
        })?;
        record.state = to;
        if command == StateCommand::Initialize {
            record.reset_epoch += 1;
        }
        if command == StateCommand::Update {
            self.update_requested = true;
        }
        tracing::debug!("graph_state: {id} {from:?} -> {to:?}");
        Ok(to)
    }

    /// Current state of a node.
    pub fn state(&self, id: NodeId) -> Option<NodeState> {
        self.record(id).ok().map(|r| r.state)
    }

    // --- Transforms ---

    /// Sets the 4x4 position and orientation. Rejects non-finite matrices.
    pub fn set_matrix(&mut self, id: NodeId, matrix: Mat4) -> Result<()> {
        if !matrix.is_finite() {
            return Err(GraphError::InvalidTransform(id));
        }
        self.record_mut(id)?.matrix = matrix;
        Ok(())
    }

    /// Current matrix.
    pub fn matrix(&self, id: NodeId) -> Option<Mat4> {
        self.record(id).ok().map(|r| r.matrix)
    }

    /// Sets the velocity in units per second. Rejects non-finite vectors.
    pub fn set_velocity(&mut self, id: NodeId, velocity: Vec3) -> Result<()> {
        if !velocity.is_finite() {
            return Err(GraphError::InvalidTransform(id));
        }
        self.record_mut(id)?.velocity = velocity;
        Ok(())
    }

    /// Current velocity.
    pub fn velocity(&self, id: NodeId) -> Option<Vec3> {
        self.record(id).ok().map(|r| r.velocity)
    }

    /// Interprets the matrix and velocity relative to the parent's.
    pub fn set_relative(&mut self, id: NodeId, relative: bool) -> Result<()> {
        self.record_mut(id)?.relative = relative;
        Ok(())
    }

    /// Returns `true` if the node is positioned relative to its parent.
    pub fn is_relative(&self, id: NodeId) -> Option<bool> {
        self.record(id).ok().map(|r| r.relative)
    }

    /// Sets the gain applied when mixing into the parent.
    pub fn set_gain(&mut self, id: NodeId, gain: f32) -> Result<()> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(GraphError::InvalidValue {
                node: id,
                what: "gain",
                value: gain,
            });
        }
        self.record_mut(id)?.gain = gain;
        Ok(())
    }

    /// Mixing gain.
    pub fn gain(&self, id: NodeId) -> Option<f32> {
        self.record(id).ok().map(|r| r.gain)
    }

    // --- Filters and effects ---

    /// Installs or replaces the descriptor of `dsp`'s kind.
    ///
    /// Stage history survives; only parameters change.
    pub fn set_dsp(&mut self, id: NodeId, dsp: Dsp) -> Result<()> {
        self.record_mut(id)?.put_dsp(dsp);
        Ok(())
    }

    /// Descriptor of `kind`, if installed.
    pub fn dsp(&self, id: NodeId, kind: DspKind) -> Option<Dsp> {
        self.record(id).ok()?.dsps.iter().find(|d| d.kind() == kind).cloned()
    }

    /// Every descriptor of a node.
    pub fn dsps(&self, id: NodeId) -> &[Dsp] {
        self.record(id).map_or(&[], |r| r.dsps.as_slice())
    }

    /// Removes a descriptor.
    pub fn remove_dsp(&mut self, id: NodeId, kind: DspKind) -> Result<Option<Dsp>> {
        let record = self.record_mut(id)?;
        let Some(pos) = record.dsps.iter().position(|d| d.kind() == kind) else {
            return Ok(None);
        };
        let dsp = record.dsps.remove(pos);
        record.dsp_version += 1;
        Ok(Some(dsp))
    }

    // --- Snapshot ---

    /// Copies the subtree under `root` into `snap` in depth-first pre-order.
    ///
    /// Reuses the snapshot's storage, so after the first few periods this
    /// does not allocate. Clears the pending update request.
    pub fn snapshot_into(&mut self, root: NodeId, snap: &mut Snapshot) {
        snap.update_requested = std::mem::take(&mut self.update_requested);
        snap.removed.clear();
        snap.removed.append(&mut self.removed);

        let mut len = 0;
        snap.stack.clear();
        if self.contains(root) {
            snap.stack.push((root, None));
        }
        while let Some((id, parent)) = snap.stack.pop() {
            let Ok(record) = self.record(id) else {
                continue;
            };
            let active = record.state.is_playing()
                && parent.is_none_or(|p| snap.entries[p].active);

            if len == snap.entries.len() {
                snap.entries.push(SnapshotEntry {
                    id,
                    parent,
                    caps: record.caps,
                    state: record.state,
                    active,
                    matrix: record.matrix,
                    velocity: record.velocity,
                    relative: record.relative,
                    gain: record.gain,
                    tracks: record.tracks,
                    dsps: record.dsps.clone(),
                    dsp_version: record.dsp_version,
                    reset_epoch: record.reset_epoch,
                    sensor: record.sensor.clone(),
                });
            } else {
                let entry = &mut snap.entries[len];
                entry.id = id;
                entry.parent = parent;
                entry.caps = record.caps;
                entry.state = record.state;
                entry.active = active;
                entry.matrix = record.matrix;
                entry.velocity = record.velocity;
                entry.relative = record.relative;
                entry.gain = record.gain;
                entry.tracks = record.tracks;
                entry.dsps.clear();
                entry.dsps.extend_from_slice(&record.dsps);
                entry.dsp_version = record.dsp_version;
                entry.reset_epoch = record.reset_epoch;
                entry.sensor.clone_from(&record.sensor);
            }
            let index = len;
            len += 1;
            for &child in record.children.iter().rev() {
                snap.stack.push((child, Some(index)));
            }
        }
        snap.entries.truncate(len);
    }

    fn record(&self, id: NodeId) -> Result<&NodeRecord> {
        self.nodes
            .get(id.0 as usize)
            .and_then(Option::as_ref)
            .ok_or(GraphError::NodeNotFound(id))
    }

    fn record_mut(&mut self, id: NodeId) -> Result<&mut NodeRecord> {
        self.nodes
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(GraphError::NodeNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aural_effects::EffectType;

    fn tree() -> (Graph, NodeId, NodeId, NodeId) {
        let mut g = Graph::new(2);
        let mixer = g.add_mixer("mixer");
        let frame = g.add_frame("frame");
        let (sensor, _) = g.add_sensor("sensor", 48000.0, 1, 64).unwrap();
        g.register(mixer, frame).unwrap();
        g.register(frame, sensor).unwrap();
        (g, mixer, frame, sensor)
    }

    #[test]
    fn reparenting_requires_deregistration() {
        let (mut g, mixer, frame, sensor) = tree();
        let err = g.register(mixer, sensor).unwrap_err();
        assert_eq!(
            err,
            GraphError::AlreadyRegistered {
                node: sensor,
                parent: frame
            }
        );
        assert_eq!(g.parent(sensor), Some(frame));
        assert_eq!(g.children(mixer), &[frame]);

        g.deregister(frame, sensor).unwrap();
        g.register(mixer, sensor).unwrap();
        assert_eq!(g.parent(sensor), Some(mixer));
        assert!(g.children(frame).is_empty());
    }

    #[test]
    fn only_buses_take_children() {
        let (mut g, _, _, sensor) = tree();
        let other = g.add_frame("other");
        assert_eq!(g.register(sensor, other), Err(GraphError::NotAMixingBus(sensor)));
    }

    #[test]
    fn cycles_are_rejected() {
        let (mut g, mixer, frame, _) = tree();
        let inner = g.add_frame("inner");
        g.register(frame, inner).unwrap();
        assert!(matches!(g.register(inner, mixer), Err(GraphError::Cycle { .. })));
        assert!(matches!(g.register(frame, frame), Err(GraphError::AlreadyRegistered { .. })));
    }

    #[test]
    fn max_registered_is_enforced() {
        let mut g = Graph::new(2);
        let mixer = g.add_mixer("mixer");
        g.set_max_registered(mixer, 1).unwrap();
        let a = g.add_frame("a");
        let b = g.add_frame("b");
        g.register(mixer, a).unwrap();
        assert_eq!(
            g.register(mixer, b),
            Err(GraphError::CapacityReached { parent: mixer, max: 1 })
        );
    }

    #[test]
    fn deregister_checks_parent() {
        let (mut g, mixer, _, sensor) = tree();
        assert!(matches!(g.deregister(mixer, sensor), Err(GraphError::NotRegistered { .. })));
    }

    #[test]
    fn remove_requires_detached_node() {
        let (mut g, _, frame, sensor) = tree();
        assert_eq!(g.remove_node(sensor), Err(GraphError::StillRegistered(sensor)));
        g.deregister(frame, sensor).unwrap();
        g.remove_node(sensor).unwrap();
        assert!(!g.contains(sensor));
        assert_eq!(g.state(sensor), None);
        let next = g.add_frame("next");
        assert_ne!(next, sensor);
    }

    #[test]
    fn distance_model_is_inherited() {
        let mut g = Graph::new(2);
        let mixer = g.add_mixer("mixer");
        let mut distance = Dsp::filter(FilterType::Distance);
        distance.set(0, 0, 3.0);
        distance.set_enabled(true);
        g.set_dsp(mixer, distance.clone()).unwrap();

        let frame = g.add_frame("frame");
        g.register(mixer, frame).unwrap();
        assert_eq!(g.dsp(frame, DISTANCE), Some(distance));

        let own = g.add_frame("own");
        let mut custom = Dsp::filter(FilterType::Distance);
        custom.set(0, 0, 9.0);
        g.set_dsp(own, custom.clone()).unwrap();
        g.register(mixer, own).unwrap();
        assert_eq!(g.dsp(own, DISTANCE), Some(custom));
    }

    #[test]
    fn state_commands_follow_lifecycle() {
        let (mut g, _, _, sensor) = tree();
        assert!(matches!(
            g.set_state(sensor, StateCommand::Play),
            Err(GraphError::InvalidTransition { .. })
        ));
        g.set_state(sensor, StateCommand::Initialize).unwrap();
        assert_eq!(g.set_state(sensor, StateCommand::Play), Ok(NodeState::Playing));
        assert_eq!(g.set_state(sensor, StateCommand::Update), Ok(NodeState::Playing));
        assert!(g.update_requested);
    }

    #[test]
    fn non_finite_inputs_are_rejected() {
        let (mut g, _, frame, _) = tree();
        let mut m = Mat4::IDENTITY;
        m.w_axis.x = f32::NAN;
        assert_eq!(g.set_matrix(frame, m), Err(GraphError::InvalidTransform(frame)));
        assert!(g.set_velocity(frame, Vec3::splat(f32::INFINITY)).is_err());
        assert!(g.set_gain(frame, -1.0).is_err());
        assert_eq!(g.matrix(frame), Some(Mat4::IDENTITY));
    }

    #[test]
    fn snapshot_is_preorder_with_activity() {
        let (mut g, mixer, frame, sensor) = tree();
        let second = g.add_frame("second");
        g.register(mixer, second).unwrap();
        for id in [mixer, frame, sensor] {
            g.set_state(id, StateCommand::Initialize).unwrap();
            g.set_state(id, StateCommand::Play).unwrap();
        }

        let mut snap = Snapshot::new();
        g.snapshot_into(mixer, &mut snap);
        let ids: Vec<NodeId> = snap.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![mixer, frame, sensor, second]);
        assert_eq!(snap.entries[2].parent, Some(1));
        assert!(snap.entries[2].active);
        assert!(!snap.entries[3].active);

        g.set_state(frame, StateCommand::Suspend).unwrap();
        g.snapshot_into(mixer, &mut snap);
        assert!(!snap.entries[2].active, "suspended parent silences subtree");
    }

    #[test]
    fn dsp_changes_bump_version() {
        let (mut g, mixer, _, _) = tree();
        let mut snap = Snapshot::new();
        g.snapshot_into(mixer, &mut snap);
        let before = snap.entries[0].dsp_version;
        g.set_dsp(mixer, Dsp::effect(EffectType::Reverb)).unwrap();
        g.snapshot_into(mixer, &mut snap);
        assert!(snap.entries[0].dsp_version > before);
        assert_eq!(snap.entries[0].dsps.len(), 1);
    }

    #[test]
    fn one_delay_family_effect_per_node() {
        let (mut g, _, frame, _) = tree();
        g.set_dsp(frame, Dsp::effect(EffectType::Chorus)).unwrap();
        g.set_dsp(frame, Dsp::effect(EffectType::Reverb)).unwrap();
        g.set_dsp(frame, Dsp::effect(EffectType::Echo)).unwrap();
        let kinds: Vec<DspKind> = g.dsps(frame).iter().map(Dsp::kind).collect();
        assert_eq!(
            kinds,
            vec![DspKind::Effect(EffectType::Reverb), DspKind::Effect(EffectType::Echo)]
        );
    }
}
