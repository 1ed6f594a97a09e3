//! Forward kinematics and Jacobians along a base-to-tip chain.

use kinesweep_ir::{JointKind, SceneGraph};
use nalgebra::{DVector, Isometry3, Matrix6xX, Vector3};

use crate::error::{KinematicsError, Result};
use crate::joints::{is_finite, joint_motion, unit_axis};
use crate::state::TransformMap;
use crate::topology::{Segment, Topology};

/// The path of joints from a base link down to a tip link.
///
/// Values are indexed by [`KinematicChain::joint_names`]; transforms are
/// expressed in the base link frame.
#[derive(Debug, Clone)]
pub struct KinematicChain {
    base: String,
    tip: String,
    segments: Vec<Segment>,
    joint_names: Vec<String>,
    link_names: Vec<String>,
}

impl KinematicChain {
    /// Extract the chain from `base` down to `tip`.
    pub fn new(graph: &SceneGraph, base: &str, tip: &str) -> Result<Self> {
        let topology = Topology::build(graph)?;
        for link in [base, tip] {
            if graph.link(link).is_none() {
                return Err(KinematicsError::UnknownLink(link.to_string()));
            }
        }

        let mut segments = Vec::new();
        let mut current = tip;
        while current != base {
            let segment = topology
                .segments
                .iter()
                .find(|s| s.child_link == current)
                .ok_or_else(|| KinematicsError::NoPath {
                    base: base.to_string(),
                    tip: tip.to_string(),
                })?;
            segments.push(segment.clone());
            current = &segment.parent_link;
        }
        segments.reverse();

        let joint_names = segments
            .iter()
            .filter(|s| s.kind.is_movable())
            .map(|s| s.joint.clone())
            .collect();
        let link_names = std::iter::once(base.to_string())
            .chain(segments.iter().map(|s| s.child_link.clone()))
            .collect();

        Ok(Self {
            base: base.to_string(),
            tip: tip.to_string(),
            segments,
            joint_names,
            link_names,
        })
    }

    /// Base link.
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Tip link.
    pub fn tip(&self) -> &str {
        &self.tip
    }

    /// Movable joints, base to tip.
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    /// Links, base first.
    pub fn link_names(&self) -> &[String] {
        &self.link_names
    }

    fn check_len(&self, q: &DVector<f64>) -> Result<()> {
        if q.len() != self.joint_names.len() {
            return Err(KinematicsError::LengthMismatch {
                names: self.joint_names.len(),
                values: q.len(),
            });
        }
        Ok(())
    }

    /// Walk the chain, calling `visit` with each segment, its joint frame in
    /// the base frame, and the child link pose.
    fn walk<F>(&self, q: &DVector<f64>, mut visit: F) -> Result<()>
    where
        F: FnMut(&Segment, Option<usize>, &Isometry3<f64>, &Isometry3<f64>),
    {
        self.check_len(q)?;
        let mut pose = Isometry3::identity();
        let mut index = 0;
        for segment in &self.segments {
            let joint_frame = pose * segment.origin;
            let column = segment.kind.is_movable().then_some(index);
            let value = match column {
                Some(i) => {
                    index += 1;
                    q[i]
                }
                None => 0.0,
            };
            if !value.is_finite() {
                return Err(KinematicsError::StateUnavailable(format!(
                    "joint {} has non-finite value {value}",
                    segment.joint
                )));
            }
            pose = joint_frame * joint_motion(&segment.kind, value);
            if !is_finite(&pose) {
                return Err(KinematicsError::StateUnavailable(format!(
                    "non-finite transform for link {}",
                    segment.child_link
                )));
            }
            visit(segment, column, &joint_frame, &pose);
        }
        Ok(())
    }

    /// Pose of every chain link relative to the base.
    pub fn calc_fwd_kin(&self, q: &DVector<f64>) -> Result<TransformMap> {
        let mut transforms = TransformMap::with_capacity(self.link_names.len());
        transforms.insert(self.base.clone(), Isometry3::identity());
        self.walk(q, |segment, _, _, pose| {
            transforms.insert(segment.child_link.clone(), *pose);
        })?;
        Ok(transforms)
    }

    /// Geometric Jacobian of `link`'s origin, in the base frame.
    ///
    /// Rows 0..3 are linear velocity, rows 3..6 angular. Joints below `link`
    /// contribute zero columns.
    pub fn calc_jacobian(&self, q: &DVector<f64>, link: &str) -> Result<Matrix6xX<f64>> {
        let Some(link_index) = self.link_names.iter().position(|l| l == link) else {
            return Err(KinematicsError::UnknownLink(link.to_string()));
        };

        // (column, joint frame, kind) for joints above the link
        let mut frames: Vec<(usize, Isometry3<f64>, JointKind)> = Vec::new();
        let mut target = Isometry3::identity();
        let mut seen = 0;
        self.walk(q, |segment, column, joint_frame, pose| {
            seen += 1;
            if seen > link_index {
                return;
            }
            if let Some(c) = column {
                frames.push((c, *joint_frame, segment.kind.clone()));
            }
            if seen == link_index {
                target = *pose;
            }
        })?;

        let p_target = target.translation.vector;
        let mut jacobian = Matrix6xX::zeros(self.joint_names.len());
        for (c, frame, kind) in frames {
            let (linear, angular) = match &kind {
                JointKind::Revolute { axis, .. } | JointKind::Continuous { axis } => {
                    let w = frame.rotation * unit_axis(axis).into_inner();
                    (w.cross(&(p_target - frame.translation.vector)), w)
                }
                JointKind::Prismatic { axis, .. } => {
                    (frame.rotation * unit_axis(axis).into_inner(), Vector3::zeros())
                }
                JointKind::Fixed => continue,
            };
            jacobian.fixed_view_mut::<3, 1>(0, c).copy_from(&linear);
            jacobian.fixed_view_mut::<3, 1>(3, c).copy_from(&angular);
        }
        Ok(jacobian)
    }
}
