//! Environment state snapshots.

use std::collections::HashMap;

use nalgebra::Isometry3;

/// Joint values keyed by joint name.
pub type JointValues = HashMap<String, f64>;

/// World transforms keyed by link name.
pub type TransformMap = HashMap<String, Isometry3<f64>>;

/// Immutable snapshot of joint values and the link transforms they produce.
///
/// Every movable joint of the bound graph has a value and every link
/// reachable from the root has a transform. Snapshots carry no reference
/// back to the solver that produced them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnvState {
    /// Value of every movable joint.
    pub joints: JointValues,
    /// World transform of every link.
    pub transforms: TransformMap,
}

impl EnvState {
    /// Value of a joint, if present.
    pub fn joint(&self, name: &str) -> Option<f64> {
        self.joints.get(name).copied()
    }

    /// Transform of a link, if present.
    pub fn transform(&self, link: &str) -> Option<&Isometry3<f64>> {
        self.transforms.get(link)
    }
}
