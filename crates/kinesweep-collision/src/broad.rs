//! Swept bounding boxes for pair culling.

use nalgebra::{Isometry3, Point3, Vector3};
use parry3d::bounding_volume::{Aabb, BoundingVolume};

use crate::shapes::ShapePart;

/// Rotation angle below which a cast is treated as a pure translation.
const ROTATION_EPS: f32 = 1.0e-6;

/// World AABB of all parts at `pose`.
pub fn parts_aabb(parts: &[ShapePart], pose: &Isometry3<f32>) -> Option<Aabb> {
    parts
        .iter()
        .map(|p| p.shape.compute_aabb(&(pose * p.local)))
        .reduce(|a, b| a.merged(&b))
}

/// AABB enclosing every pose the parts take while moving from `start` to
/// `end`.
///
/// A translating convex set sweeps exactly the hull of its endpoint boxes.
/// When the cast also rotates, every point stays within its distance to the
/// link origin of the origin's straight path, so the bound is that segment
/// inflated by the largest such distance.
pub fn swept_aabb(
    parts: &[ShapePart],
    start: &Isometry3<f32>,
    end: &Isometry3<f32>,
) -> Option<Aabb> {
    let delta = end.rotation * start.rotation.inverse();
    if delta.angle() <= ROTATION_EPS {
        let a = parts_aabb(parts, start)?;
        let b = parts_aabb(parts, end)?;
        return Some(a.merged(&b));
    }

    if parts.is_empty() {
        return None;
    }
    let reach = parts_reach(parts);
    let p0 = Point3::from(start.translation.vector);
    let p1 = Point3::from(end.translation.vector);
    let r = Vector3::repeat(reach);
    Some(Aabb::new(p0.inf(&p1) - r, p0.sup(&p1) + r))
}

/// Largest distance from the link origin to any point of the parts.
pub fn parts_reach(parts: &[ShapePart]) -> f32 {
    parts
        .iter()
        .map(|p| {
            let sphere = p.shape.compute_local_bounding_sphere();
            (p.local * sphere.center()).coords.norm() + sphere.radius()
        })
        .fold(0.0, f32::max)
}

/// Whether two boxes come within `margin` of each other.
pub fn within(a: &Aabb, b: &Aabb, margin: f32) -> bool {
    a.loosened(margin).intersects(b)
}
