#![warn(missing_docs)]

//! The kinesweep environment: one scene graph, its state solver, and the
//! collision registry that follows it.
//!
//! Planners take independent contact managers from an [`Environment`] and
//! query kinematic states from it without mutating it.

mod environment;
mod error;

pub use environment::Environment;
pub use error::{EnvironmentError, Result};
