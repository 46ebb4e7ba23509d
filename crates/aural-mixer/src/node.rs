//! Node identifiers, capabilities and the node state machine.
//!
//! There is one node type. What a node can do is described by its
//! [`Capabilities`]: a sensor is positional, an audio-frame is a positional
//! mixing bus, the device mixer is a plain mixing bus.

use core::fmt;

/// Unique identifier for a node in the graph.
///
/// IDs are assigned sequentially and never reused within a graph, so a
/// stale ID of a destroyed node can never address a newer one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// What a node can do.
///
/// ```rust
/// use aural_mixer::Capabilities;
///
/// let frame = Capabilities::FRAME;
/// assert!(frame.contains(Capabilities::POSITIONAL));
/// assert!(frame.contains(Capabilities::MIXING_BUS));
/// assert!(!Capabilities::SENSOR.contains(Capabilities::MIXING_BUS));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    /// No capabilities.
    pub const NONE: Self = Self(0);
    /// Attenuated by distance and panned by direction from the listener.
    pub const POSITIONAL: Self = Self(1 << 0);
    /// Sums child nodes.
    pub const MIXING_BUS: Self = Self(1 << 1);
    /// Accepts note events from a sequencing layer.
    pub const NOTE_ADDRESSABLE: Self = Self(1 << 2);

    /// An input stream.
    pub const SENSOR: Self = Self::POSITIONAL;
    /// A positional sub-mix.
    pub const FRAME: Self = Self::POSITIONAL.union(Self::MIXING_BUS);
    /// A device-level mix.
    pub const MIXER: Self = Self::MIXING_BUS;
    /// A sub-mix driven by note events.
    pub const INSTRUMENT: Self = Self::MIXING_BUS.union(Self::NOTE_ADDRESSABLE);

    /// Returns `true` if all bits in `other` are set in `self`.
    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns the union of two capability sets.
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeState {
    /// Created, not yet set up.
    #[default]
    Uninitialized,
    /// Set up and silent.
    Initialized,
    /// Rendered every period.
    Playing,
    /// Paused; keeps its position in the input stream.
    Suspended,
    /// Skipped by the render pass; effect history is kept.
    Stopped,
}

/// Request to change a node's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateCommand {
    /// Set up, or re-set-up a stopped node (clears effect history).
    Initialize,
    /// Start or resume rendering.
    Play,
    /// Pause rendering.
    Suspend,
    /// Stop rendering.
    Stop,
    /// Schedule a matrix refresh at the next period without changing state.
    Update,
}

impl NodeState {
    /// State after `command`, or `None` if the transition is not allowed.
    ///
    /// ```text
    /// Uninitialized ─Initialize─► Initialized ─Play─► Playing ◄─Play/Suspend─► Suspended
    ///                                  ▲                 └──────Stop───► Stopped ◄──┘
    ///                                  └─────────────Initialize─────────────┘
    /// ```
    pub fn apply(self, command: StateCommand) -> Option<NodeState> {
        use NodeState::{Initialized, Playing, Stopped, Suspended, Uninitialized};
        match (self, command) {
            (Uninitialized | Stopped, StateCommand::Initialize) => Some(Initialized),
            (Initialized | Suspended | Stopped | Playing, StateCommand::Play) => Some(Playing),
            (Playing | Suspended, StateCommand::Suspend) => Some(Suspended),
            (Initialized | Playing | Suspended | Stopped, StateCommand::Stop) => Some(Stopped),
            (s, StateCommand::Update) if s != Uninitialized => Some(s),
            _ => None,
        }
    }

    /// Returns `true` if the render pass processes the node.
    #[inline]
    pub fn is_playing(self) -> bool {
        self == NodeState::Playing
    }
}
