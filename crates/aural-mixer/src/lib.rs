//! Aural Mixer - spatial node graph and per-period render pass
//!
//! A scene is a tree of nodes hanging off one device-level mixer:
//!
//! ```text
//! sensor ─► (resample) ─► distance gain ─► effects ─┐
//! sensor ─► ...                                     ├─► frame ─► effects ─┐
//!                                                   │                    ├─► mixer ─► output
//! sensor ─► ...  ───────────────────────────────────┴────────────────────┘
//! ```
//!
//! - [`Graph`] holds registration, state, matrices and effect descriptors.
//!   It is shared behind a [`MixerHandle`] and mutated under short locks.
//! - [`Mixer`] owns the renderer. Each [`render`](Mixer::render) call copies
//!   a snapshot of the graph, refreshes spatial parameters every
//!   `update_interval` periods and mixes one period children-first.
//! - [`SensorFeed`] is the input side of a sensor: any thread pushes
//!   decoded frames, the render pass pulls and resamples them.
//!
//! Node kinds are capability sets ([`Capabilities`]): sensors are
//! positional, audio-frames are positional mixing buses and the device
//! mixer is a plain mixing bus. A node is attached to at most one parent;
//! re-attaching fails until it is deregistered.
//!
//! # Coordinates
//!
//! Each positional node is heard from its listening point: the nearest
//! enclosing audio-frame, or the root mixer. An absolute node's matrix is
//! in world space; a relative node's matrix is composed onto its parent's
//! world matrix. Distance gain and stereo pan follow from the node's
//! position in the listener's space; velocities feed the doppler model when
//! a velocity effect is enabled on the node or the root.

pub mod error;
pub mod graph;
pub mod mixer;
pub mod node;
mod render;
pub mod sensor;

pub use error::{GraphError, Result};
pub use graph::{DEFAULT_MAX_REGISTERED, Graph, Snapshot, SnapshotEntry};
pub use mixer::{Mixer, MixerHandle, MixerSettings};
pub use node::{Capabilities, NodeId, NodeState, StateCommand};
pub use sensor::{MAX_FREQ_FACTOR, SensorFeed};
