//! Collision shape generation from scene-graph geometry.

use std::fmt;

use kinesweep_ir::{Geometry, Link, Vec3};
use kinesweep_kinematics::pose_to_isometry;
use nalgebra::{Isometry3, Point3, Quaternion, Translation3, UnitQuaternion, Vector3};
use parry3d::shape::{ConvexPolyhedron, SharedShape, TriMesh};

use crate::error::{CollisionError, Result};

/// A parry shape placed in its owning link's frame.
#[derive(Clone)]
pub struct ShapePart {
    /// Link frame to shape frame.
    pub local: Isometry3<f32>,
    /// The shape.
    pub shape: SharedShape,
}

impl fmt::Debug for ShapePart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShapePart")
            .field("local", &self.local)
            .field("shape", &self.shape.shape_type())
            .finish()
    }
}

/// Convert one IR geometry into a parry shape.
///
/// The returned part's `local` carries the alignment parry needs on top of
/// the geometry frame: parry cylinders run along Y, IR cylinders along Z.
pub fn geometry_to_shape(name: &str, geometry: &Geometry) -> Result<ShapePart> {
    let invalid = |reason: String| CollisionError::InvalidGeometry {
        name: name.to_string(),
        reason,
    };
    let positive = |what: &str, v: f64| {
        if v.is_finite() && v > 0.0 {
            Ok(v as f32)
        } else {
            Err(invalid(format!("{what} must be positive, got {v}")))
        }
    };

    let identity = Isometry3::identity();
    let (local, shape) = match geometry {
        Geometry::Box { size } => {
            let hx = positive("box size x", size.x)? / 2.0;
            let hy = positive("box size y", size.y)? / 2.0;
            let hz = positive("box size z", size.z)? / 2.0;
            (identity, SharedShape::cuboid(hx, hy, hz))
        }
        Geometry::Sphere { radius } => (identity, SharedShape::ball(positive("radius", *radius)?)),
        Geometry::Cylinder { radius, length } => {
            let r = positive("radius", *radius)?;
            let half = positive("length", *length)? / 2.0;
            let y_to_z = Isometry3::rotation(Vector3::x() * std::f32::consts::FRAC_PI_2);
            (y_to_z, SharedShape::cylinder(half, r))
        }
        Geometry::Capsule { radius, length } => {
            let r = positive("radius", *radius)?;
            if !(length.is_finite() && *length >= 0.0) {
                return Err(invalid(format!("capsule length must be non-negative, got {length}")));
            }
            (identity, SharedShape::capsule_z(*length as f32 / 2.0, r))
        }
        Geometry::ConvexMesh { vertices } => {
            let points = to_points(name, vertices)?;
            if points.len() < 4 {
                return Err(invalid("need at least 4 points for a convex hull".to_string()));
            }
            let hull = ConvexPolyhedron::from_convex_hull(&points)
                .ok_or_else(|| invalid("degenerate convex hull".to_string()))?;
            (identity, SharedShape::new(hull))
        }
        Geometry::Mesh { vertices, indices } => {
            let points = to_points(name, vertices)?;
            if indices.is_empty() {
                return Err(invalid("no triangles in mesh".to_string()));
            }
            if let Some(bad) = indices.iter().flatten().find(|&&i| i as usize >= points.len()) {
                return Err(invalid(format!(
                    "triangle index {bad} out of range for {} vertices",
                    points.len()
                )));
            }
            let trimesh = TriMesh::new(points, indices.clone())
                .map_err(|e| invalid(format!("failed to create trimesh: {e:?}")))?;
            (identity, SharedShape::new(trimesh))
        }
    };

    Ok(ShapePart { local, shape })
}

fn to_points(name: &str, vertices: &[Vec3]) -> Result<Vec<Point3<f32>>> {
    vertices
        .iter()
        .map(|v| {
            if v.x.is_finite() && v.y.is_finite() && v.z.is_finite() {
                Ok(Point3::new(v.x as f32, v.y as f32, v.z as f32))
            } else {
                Err(CollisionError::InvalidGeometry {
                    name: name.to_string(),
                    reason: "non-finite vertex".to_string(),
                })
            }
        })
        .collect()
}

/// Every collision geometry of a link, placed in the link frame.
pub fn link_shapes(link: &Link) -> Result<Vec<ShapePart>> {
    link.collision
        .iter()
        .map(|collision| {
            let part = geometry_to_shape(&link.name, &collision.geometry)?;
            let origin = iso_to_f32(&pose_to_isometry(&collision.origin));
            Ok(ShapePart {
                local: origin * part.local,
                shape: part.shape,
            })
        })
        .collect()
}

/// Narrow a kinematic transform to the backend's precision.
pub fn iso_to_f32(iso: &Isometry3<f64>) -> Isometry3<f32> {
    let t = iso.translation.vector;
    let q = iso.rotation.quaternion();
    Isometry3::from_parts(
        Translation3::new(t.x as f32, t.y as f32, t.z as f32),
        UnitQuaternion::new_normalize(Quaternion::new(
            q.w as f32, q.i as f32, q.j as f32, q.k as f32,
        )),
    )
}
