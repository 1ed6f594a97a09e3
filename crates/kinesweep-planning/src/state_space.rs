//! Joint-space geometry used to discretize edges.

use std::f64::consts::PI;

use kinesweep_environment::Environment;
use kinesweep_ir::JointKind;
use kinesweep_kinematics::KinematicsError;
use nalgebra::DVector;

use crate::error::{PlanningError, Result};
use crate::settings::ValidatorSettings;

/// The planner's configuration space, as far as motion validation needs it.
pub trait StateSpace: Send + Sync {
    /// Number of coordinates in a state.
    fn dimension(&self) -> usize;

    /// Number of sub-segments to split the edge `a -> b` into. At least 1.
    fn valid_segment_count(&self, a: &DVector<f64>, b: &DVector<f64>) -> usize;

    /// State at fraction `t` of the way from `a` to `b`.
    fn interpolate(&self, a: &DVector<f64>, b: &DVector<f64>, t: f64) -> DVector<f64>;
}

/// Lower and upper bound of one coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

impl Bounds {
    /// Bounds `[lower, upper]`.
    pub fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }
}

/// Bounded Euclidean space with linear interpolation.
///
/// The longest valid segment is a fraction of the maximum extent (the
/// diagonal of the bounds box); an edge of length `d` is split into
/// `factor * ceil(d / longest)` sub-segments.
#[derive(Debug, Clone)]
pub struct RealVectorStateSpace {
    bounds: Vec<Bounds>,
    longest_valid_segment_fraction: f64,
    longest_valid_segment_count_factor: u32,
    longest_valid_segment: f64,
}

impl RealVectorStateSpace {
    /// Space over `bounds` with default segment settings.
    pub fn new(bounds: Vec<Bounds>) -> Result<Self> {
        for (index, b) in bounds.iter().enumerate() {
            if !(b.lower.is_finite() && b.upper.is_finite() && b.lower <= b.upper) {
                return Err(PlanningError::InvalidBounds {
                    index,
                    lower: b.lower,
                    upper: b.upper,
                });
            }
        }
        let defaults = ValidatorSettings::default();
        let mut space = Self {
            bounds,
            longest_valid_segment_fraction: defaults.longest_valid_segment_fraction,
            longest_valid_segment_count_factor: defaults.longest_valid_segment_count_factor,
            longest_valid_segment: 0.0,
        };
        space.update_longest_valid_segment();
        Ok(space)
    }

    /// Space over the limits of `joint_names` in `env`.
    ///
    /// Revolute joints without limits and continuous joints span one turn;
    /// prismatic joints must carry limits.
    pub fn from_environment(env: &Environment, joint_names: &[String]) -> Result<Self> {
        let graph = env.scene_graph()?;
        let bounds = joint_names
            .iter()
            .map(|name| -> Result<Bounds> {
                let joint = graph
                    .joint(name)
                    .ok_or_else(|| KinematicsError::UnknownJoint(name.clone()))?;
                match (&joint.kind, joint.kind.limits()) {
                    (JointKind::Fixed, _) => Err(KinematicsError::FixedJoint(name.clone()).into()),
                    (_, Some(limits)) => Ok(Bounds::new(limits.lower, limits.upper)),
                    (JointKind::Prismatic { .. }, None) => Err(PlanningError::InvalidSettings(
                        format!("prismatic joint {name} has no limits"),
                    )),
                    _ => Ok(Bounds::new(-PI, PI)),
                }
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(bounds)
    }

    /// Apply the segment settings of `settings`.
    pub fn with_settings(mut self, settings: &ValidatorSettings) -> Result<Self> {
        settings.validate()?;
        self.longest_valid_segment_fraction = settings.longest_valid_segment_fraction;
        self.longest_valid_segment_count_factor = settings.longest_valid_segment_count_factor;
        self.update_longest_valid_segment();
        Ok(self)
    }

    /// Per-coordinate bounds.
    pub fn bounds(&self) -> &[Bounds] {
        &self.bounds
    }

    /// Length of the bounds box diagonal.
    pub fn maximum_extent(&self) -> f64 {
        self.bounds
            .iter()
            .map(|b| (b.upper - b.lower).powi(2))
            .sum::<f64>()
            .sqrt()
    }

    /// Longest edge checked as a single sub-segment (before the count
    /// factor).
    pub fn longest_valid_segment_length(&self) -> f64 {
        self.longest_valid_segment
    }

    /// Euclidean distance between two states.
    pub fn distance(&self, a: &DVector<f64>, b: &DVector<f64>) -> f64 {
        (b - a).norm()
    }

    fn update_longest_valid_segment(&mut self) {
        self.longest_valid_segment = self.longest_valid_segment_fraction * self.maximum_extent();
    }
}

impl StateSpace for RealVectorStateSpace {
    fn dimension(&self) -> usize {
        self.bounds.len()
    }

    fn valid_segment_count(&self, a: &DVector<f64>, b: &DVector<f64>) -> usize {
        let factor = self.longest_valid_segment_count_factor.max(1) as usize;
        if !(self.longest_valid_segment > 0.0) {
            return factor;
        }
        let steps = (self.distance(a, b) / self.longest_valid_segment).ceil();
        if !steps.is_finite() {
            return factor;
        }
        factor * (steps as usize).max(1)
    }

    fn interpolate(&self, a: &DVector<f64>, b: &DVector<f64>, t: f64) -> DVector<f64> {
        a + (b - a) * t
    }
}
