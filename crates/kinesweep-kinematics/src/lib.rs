#![warn(missing_docs)]

//! Kinematic state solvers for kinesweep scene graphs.
//!
//! A [`StateSolver`] binds to a [`kinesweep_ir::SceneGraph`], validates its
//! structure, and turns joint values into [`EnvState`] snapshots holding the
//! world transform of every link.
//!
//! # Variants
//!
//! - [`TreeStateSolver`]: any tree-shaped graph
//! - [`ChainStateSolver`]: unbranched graphs, single running product
//!
//! [`KinematicChain`] computes poses and Jacobians along a base-to-tip path.
//!
//! # Example
//!
//! ```ignore
//! use kinesweep_kinematics::{StateSolver, StateSolverKind};
//!
//! let solver = StateSolverKind::Tree.create_for(graph)?;
//! let state = solver.get_state_lists(&["shoulder".into()], &[0.5])?;
//! let tool = state.transform("tool");
//! ```

mod chain;
mod error;
mod fwd_kin;
mod joints;
mod solver;
mod state;
mod topology;
mod tree;

pub use chain::ChainStateSolver;
pub use error::{KinematicsError, Result};
pub use fwd_kin::KinematicChain;
pub use joints::{joint_motion, pose_to_isometry};
pub use solver::{values_from_lists, StateSolver, StateSolverKind};
pub use state::{EnvState, JointValues, TransformMap};
pub use topology::{subtree_links, Topology};
pub use tree::TreeStateSolver;
