//! Contact manager interfaces.

use kinesweep_kinematics::TransformMap;
use nalgebra::Isometry3;

use crate::error::Result;
use crate::object::CollisionObject;
use crate::types::{ContactResultMap, ContactTestType, IsContactAllowedFn};

/// Discrete collision queries over a registry of named objects.
///
/// Queries take `&mut self`, so a manager is only ever shared read-only;
/// each worker thread queries its own clone.
pub trait ContactManager: Send + Sync {
    /// Register an object. Names are unique.
    fn add_collision_object(&mut self, object: CollisionObject) -> Result<()>;

    /// Unregister an object.
    fn remove_collision_object(&mut self, name: &str) -> Result<()>;

    /// Whether an object is registered under `name`.
    fn has_collision_object(&self, name: &str) -> bool;

    /// Let the object take part in queries again.
    fn enable_collision_object(&mut self, name: &str) -> Result<()>;

    /// Exclude the object from queries without unregistering it.
    fn disable_collision_object(&mut self, name: &str) -> Result<()>;

    /// Restrict the active set to `names`.
    ///
    /// Until this is first called every object is active. Names without a
    /// registered object are kept, so objects added later can join the set.
    fn set_active_collision_objects(&mut self, names: &[String]);

    /// Registered objects that are active, sorted.
    fn active_collision_objects(&self) -> Vec<String>;

    /// Every registered object name, sorted.
    fn collision_object_names(&self) -> Vec<String>;

    /// Report pairs separated by at most `distance`. Must be finite and
    /// non-negative.
    fn set_contact_distance_threshold(&mut self, distance: f64) -> Result<()>;

    /// Current threshold.
    fn contact_distance_threshold(&self) -> f64;

    /// Install the allowed-collision predicate; `None` allows nothing.
    fn set_is_contact_allowed_fn(&mut self, allowed: Option<IsContactAllowedFn>);

    /// The installed predicate.
    fn is_contact_allowed_fn(&self) -> Option<IsContactAllowedFn>;

    /// Set one object's world pose.
    fn set_collision_objects_transform(&mut self, name: &str, pose: &Isometry3<f64>) -> Result<()>;

    /// Set the pose of every registered object named in `transforms`;
    /// other names are ignored.
    fn set_collision_objects_transforms(&mut self, transforms: &TransformMap);

    /// Compute contacts between enabled objects where at least one side is
    /// active and the pair is not allowed.
    fn contact_test(
        &mut self,
        results: &mut ContactResultMap,
        test_type: ContactTestType,
    ) -> Result<()>;

    /// Independent copy sharing geometry.
    fn clone_box(&self) -> Box<dyn ContactManager>;
}

/// Contact queries that also account for motion between two poses.
///
/// A cast pair set on an object holds for exactly one `contact_test` and is
/// cleared by it; the object's static pose becomes the cast's start pose.
pub trait ContinuousContactManager: ContactManager {
    /// Move one object from `start` to `end` during the next query.
    fn set_collision_objects_transform_cast(
        &mut self,
        name: &str,
        start: &Isometry3<f64>,
        end: &Isometry3<f64>,
    ) -> Result<()>;

    /// Cast every registered object named in both maps; other names are
    /// ignored.
    fn set_collision_objects_transforms_cast(&mut self, start: &TransformMap, end: &TransformMap);

    /// Independent copy sharing geometry.
    fn clone_continuous(&self) -> Box<dyn ContinuousContactManager>;
}
