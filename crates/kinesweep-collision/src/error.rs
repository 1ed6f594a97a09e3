//! Error types for contact managers.

use thiserror::Error;

/// Errors raised by contact manager configuration and queries.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollisionError {
    /// No object registered under this name.
    #[error("collision object not found: {0}")]
    UnknownObject(String),

    /// An object with this name is already registered.
    #[error("collision object already exists: {0}")]
    DuplicateObject(String),

    /// Contact distance thresholds must be finite and non-negative.
    #[error("invalid contact distance threshold: {0}")]
    InvalidThreshold(f64),

    /// Geometry could not be turned into a collision shape.
    #[error("invalid geometry for {name}: {reason}")]
    InvalidGeometry {
        /// Owning object.
        name: String,
        /// What went wrong.
        reason: String,
    },

    /// The backend has no query for this shape pair.
    #[error("unsupported shape pair: {a} / {b}")]
    Unsupported {
        /// First object.
        a: String,
        /// Second object.
        b: String,
    },
}

/// Result type for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;
