#![warn(missing_docs)]

//! Discrete and continuous contact checking for kinesweep, using parry3d.
//!
//! Objects are named after the links they belong to. A
//! [`ContinuousContactManager`] additionally accepts a start/end pose pair
//! per object and checks the whole swept motion between them, so thin or
//! fast-moving bodies cannot pass through each other between samples.
//!
//! # Example
//!
//! ```ignore
//! use kinesweep_collision::{ContactManager, ContinuousContactManager, SweptContactManager};
//!
//! let mut manager = SweptContactManager::new();
//! manager.add_collision_object(tool)?;
//! manager.add_collision_object(table)?;
//! manager.set_collision_objects_transform_cast("tool", &start, &end)?;
//!
//! let mut results = ContactResultMap::new();
//! manager.contact_test(&mut results, ContactTestType::First)?;
//! ```

mod acm;
mod broad;
mod error;
mod manager;
mod narrow;
mod object;
mod shapes;
mod swept;
mod types;

pub use acm::{AllowedCollisionMatrix, ADJACENT};
pub use error::{CollisionError, Result};
pub use manager::{ContactManager, ContinuousContactManager};
pub use object::CollisionObject;
pub use shapes::{geometry_to_shape, link_shapes, ShapePart};
pub use swept::SweptContactManager;
pub use types::{
    contact_count, pair_key, ContactResult, ContactResultMap, ContactTestType,
    ContinuousCollisionType, IsContactAllowedFn,
};
