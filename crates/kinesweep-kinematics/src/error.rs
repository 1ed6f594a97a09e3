//! Error types for kinematic state solving.

use thiserror::Error;

/// Errors that can occur while binding a scene graph or computing a state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// A query was issued before `init` succeeded.
    #[error("state solver has not been initialized")]
    Uninitialized,

    /// Joint name not present in the bound graph.
    #[error("joint not found: {0}")]
    UnknownJoint(String),

    /// A value was supplied for a joint that cannot move.
    #[error("joint {0} is fixed and takes no value")]
    FixedJoint(String),

    /// Link name not present in the bound graph.
    #[error("link not found: {0}")]
    UnknownLink(String),

    /// Parallel name/value inputs have different lengths.
    #[error("{names} joint names but {values} values")]
    LengthMismatch {
        /// Number of names supplied.
        names: usize,
        /// Number of values supplied.
        values: usize,
    },

    /// The graph has no usable root.
    #[error("invalid root: {0}")]
    InvalidRoot(String),

    /// A link is the child of more than one joint.
    #[error("link {link} has more than one parent joint ({first}, {second})")]
    DuplicateParent {
        /// The link.
        link: String,
        /// First parent joint found.
        first: String,
        /// Second parent joint found.
        second: String,
    },

    /// The joint structure contains a cycle.
    #[error("scene graph contains a cycle through link {0}")]
    Cycle(String),

    /// Links that cannot be reached from the root.
    #[error("links not reachable from the root: {0:?}")]
    Disconnected(Vec<String>),

    /// The chain solver was given a branching graph.
    #[error("link {0} has more than one child; not a chain")]
    NotAChain(String),

    /// The tip link does not hang below the base link.
    #[error("no kinematic path from {base} to {tip}")]
    NoPath {
        /// Chain base link.
        base: String,
        /// Chain tip link.
        tip: String,
    },

    /// An edit command could not be applied; nothing in the batch was applied.
    #[error("command {index} failed: {reason}")]
    Command {
        /// Position of the failing command in the batch.
        index: usize,
        /// What went wrong.
        reason: String,
    },

    /// The configuration does not yield a usable state.
    #[error("state unavailable: {0}")]
    StateUnavailable(String),
}

/// Result type for kinematics operations.
pub type Result<T> = std::result::Result<T, KinematicsError>;
