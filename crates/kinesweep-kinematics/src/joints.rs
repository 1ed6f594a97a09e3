//! Joint transforms in the solver's math types.

use kinesweep_ir::{JointKind, Pose, Vec3};
use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

/// Convert an IR pose (xyz + roll/pitch/yaw) to an isometry.
pub fn pose_to_isometry(pose: &Pose) -> Isometry3<f64> {
    Isometry3::from_parts(
        Translation3::new(pose.xyz.x, pose.xyz.y, pose.xyz.z),
        UnitQuaternion::from_euler_angles(pose.rpy.x, pose.rpy.y, pose.rpy.z),
    )
}

/// Normalized joint axis; a zero axis falls back to +Z.
pub fn unit_axis(axis: &Vec3) -> Unit<Vector3<f64>> {
    let v = Vector3::new(axis.x, axis.y, axis.z);
    Unit::try_new(v, 1.0e-12).unwrap_or_else(Vector3::z_axis)
}

/// Transform contributed by the joint's motion at `value`, in the joint frame.
///
/// - Revolute / continuous: rotation of `value` radians about the axis
/// - Prismatic: translation of `value` meters along the axis
/// - Fixed: identity
pub fn joint_motion(kind: &JointKind, value: f64) -> Isometry3<f64> {
    match kind {
        JointKind::Fixed => Isometry3::identity(),
        JointKind::Revolute { axis, .. } | JointKind::Continuous { axis } => {
            Isometry3::from_parts(
                Translation3::identity(),
                UnitQuaternion::from_axis_angle(&unit_axis(axis), value),
            )
        }
        JointKind::Prismatic { axis, .. } => {
            let t = unit_axis(axis).into_inner() * value;
            Isometry3::translation(t.x, t.y, t.z)
        }
    }
}

/// Default value for a joint: zero, moved inside the limits if needed.
pub fn initial_value(kind: &JointKind) -> f64 {
    match kind.limits() {
        Some(limits) if limits.lower > 0.0 => limits.lower,
        Some(limits) if limits.upper < 0.0 => limits.upper,
        _ => 0.0,
    }
}

/// Whether every component of the isometry is finite.
pub fn is_finite(iso: &Isometry3<f64>) -> bool {
    iso.translation.vector.iter().all(|v| v.is_finite())
        && iso.rotation.coords.iter().all(|v| v.is_finite())
}
