//! Error types for graph operations.

use thiserror::Error;

use crate::node::{NodeId, NodeState, StateCommand};

/// Errors returned by [`Graph`](crate::Graph) mutations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    /// The node does not exist or was destroyed.
    #[error("{0} not found")]
    NodeNotFound(NodeId),

    /// The child already has a parent.
    #[error("{node} is already registered with {parent}")]
    AlreadyRegistered {
        /// Node being registered.
        node: NodeId,
        /// Its current parent.
        parent: NodeId,
    },

    /// The child is not registered with this parent.
    #[error("{node} is not registered with {parent}")]
    NotRegistered {
        /// Node being deregistered.
        node: NodeId,
        /// Parent named in the request.
        parent: NodeId,
    },

    /// The parent cannot hold more children.
    #[error("{parent} already holds its maximum of {max} nodes")]
    CapacityReached {
        /// The full parent.
        parent: NodeId,
        /// Its registration limit.
        max: usize,
    },

    /// The parent is not a mixing bus.
    #[error("{0} cannot mix child nodes")]
    NotAMixingBus(NodeId),

    /// Registering would make a node its own ancestor.
    #[error("registering {node} under {parent} would create a cycle")]
    Cycle {
        /// Node being registered.
        node: NodeId,
        /// Requested parent.
        parent: NodeId,
    },

    /// The node is still attached and cannot be destroyed.
    #[error("{0} is still registered")]
    StillRegistered(NodeId),

    /// The state command is not valid in the node's current state.
    #[error("{node}: cannot {command:?} while {from:?}")]
    InvalidTransition {
        /// Target node.
        node: NodeId,
        /// State at the time of the request.
        from: NodeState,
        /// Rejected command.
        command: StateCommand,
    },

    /// A matrix or vector contains non-finite values.
    #[error("{0}: non-finite transform")]
    InvalidTransform(NodeId),

    /// A scalar parameter is out of range or non-finite.
    #[error("{node}: invalid {what}: {value}")]
    InvalidValue {
        /// Target node.
        node: NodeId,
        /// Name of the parameter.
        what: &'static str,
        /// Rejected value.
        value: f32,
    },

    /// A sensor input could not be allocated.
    #[error("cannot allocate input buffer of {frames} frames x {tracks} tracks")]
    Allocation {
        /// Requested frame capacity.
        frames: usize,
        /// Requested track count.
        tracks: usize,
    },
}

/// Result alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
