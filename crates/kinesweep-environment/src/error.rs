//! Error types for the environment.

use kinesweep_collision::CollisionError;
use kinesweep_kinematics::KinematicsError;
use thiserror::Error;

/// Errors raised while building or editing an environment.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnvironmentError {
    /// State solver failure.
    #[error("kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    /// Contact manager failure.
    #[error("collision error: {0}")]
    Collision(#[from] CollisionError),
}

/// Result type for environment operations.
pub type Result<T> = std::result::Result<T, EnvironmentError>;
