//! Error types for motion validation.

use kinesweep_collision::CollisionError;
use kinesweep_environment::EnvironmentError;
use kinesweep_kinematics::KinematicsError;
use thiserror::Error;

/// Errors raised while configuring a state space or a validator.
#[derive(Error, Debug)]
pub enum PlanningError {
    /// Invalid validator or state-space settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Settings text could not be parsed.
    #[error("settings parse error: {0}")]
    SettingsParse(#[from] toml::de::Error),

    /// Bounds are empty, reversed or non-finite.
    #[error("invalid bounds for dimension {index}: [{lower}, {upper}]")]
    InvalidBounds {
        /// Dimension index.
        index: usize,
        /// Lower bound.
        lower: f64,
        /// Upper bound.
        upper: f64,
    },

    /// Joint names and state-space dimension disagree.
    #[error("expected {expected} joints, got {actual}")]
    DimensionMismatch {
        /// State-space dimension.
        expected: usize,
        /// Number supplied.
        actual: usize,
    },

    /// State solver failure.
    #[error("kinematics error: {0}")]
    Kinematics(#[from] KinematicsError),

    /// Contact manager failure.
    #[error("collision error: {0}")]
    Collision(#[from] CollisionError),

    /// Environment failure.
    #[error("environment error: {0}")]
    Environment(#[from] EnvironmentError),
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanningError>;
