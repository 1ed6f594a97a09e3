//! Collision objects registered with a contact manager.

use std::sync::Arc;

use kinesweep_ir::Link;

use crate::error::{CollisionError, Result};
use crate::shapes::{link_shapes, ShapePart};

/// A named rigid body's collision geometry.
///
/// Geometry is immutable and shared between manager clones.
#[derive(Debug, Clone)]
pub struct CollisionObject {
    name: String,
    parts: Arc<[ShapePart]>,
    enabled: bool,
}

impl CollisionObject {
    /// Create an enabled object from shape parts in the object's frame.
    pub fn new(name: impl Into<String>, parts: Vec<ShapePart>) -> Result<Self> {
        let name = name.into();
        if parts.is_empty() {
            return Err(CollisionError::InvalidGeometry {
                name,
                reason: "collision object has no shapes".to_string(),
            });
        }
        Ok(Self {
            name,
            parts: parts.into(),
            enabled: true,
        })
    }

    /// Object for a link's collision geometry, or `None` if it has none.
    pub fn from_link(link: &Link) -> Result<Option<Self>> {
        if link.collision.is_empty() {
            return Ok(None);
        }
        Self::new(link.name.clone(), link_shapes(link)?).map(Some)
    }

    /// Object name (the owning link).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shape parts in the object's frame.
    pub fn parts(&self) -> &[ShapePart] {
        &self.parts
    }

    /// Whether the object takes part in queries.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Set the enabled flag.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}
