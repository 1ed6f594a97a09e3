//! Continuous motion validation of planner edges.

use std::sync::Arc;

use kinesweep_collision::{ContactResultMap, ContactTestType, ContinuousContactManager};
use kinesweep_environment::Environment;
use kinesweep_kinematics::{EnvState, StateSolver, TransformMap};
use nalgebra::DVector;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::error::{PlanningError, Result};
use crate::settings::ValidatorSettings;
use crate::state_space::StateSpace;

/// Last collision-free point of an edge.
#[derive(Debug, Clone, PartialEq)]
pub struct LastValid {
    /// The state at `fraction`, when requested and the edge is invalid.
    pub state: Option<DVector<f64>>,
    /// Fraction of the edge known to be free; `1.0` for a valid edge.
    pub fraction: f64,
}

/// Outcome of checking one edge.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionCheck {
    /// Whether the whole edge is collision free.
    pub valid: bool,
    /// Where the free part of the edge ends.
    pub last_valid: LastValid,
}

impl MotionCheck {
    fn valid() -> Self {
        Self {
            valid: true,
            last_valid: LastValid {
                state: None,
                fraction: 1.0,
            },
        }
    }

    fn invalid(fraction: f64, state: Option<DVector<f64>>) -> Self {
        Self {
            valid: false,
            last_valid: LastValid { state, fraction },
        }
    }
}

/// Checks that the swept motion between two configurations is collision
/// free.
///
/// An edge is split into the state space's valid segment count. Each
/// sub-segment is checked as one continuous cast of every manipulator link,
/// in order, stopping at the first sub-segment in contact. The validator
/// owns its contact manager; use [`ContinuousMotionValidator::fork`] to get
/// one per worker thread.
pub struct ContinuousMotionValidator {
    state_space: Arc<dyn StateSpace>,
    solver: Arc<dyn StateSolver>,
    manager: Box<dyn ContinuousContactManager>,
    joint_names: Vec<String>,
    links: Vec<String>,
}

impl std::fmt::Debug for ContinuousMotionValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContinuousMotionValidator")
            .field("dimension", &self.state_space.dimension())
            .field("joint_names", &self.joint_names)
            .field("links", &self.links)
            .finish_non_exhaustive()
    }
}

impl ContinuousMotionValidator {
    /// Validator over explicit collaborators.
    ///
    /// `joint_names` map state coordinates to joints; `links` are the
    /// manipulator links cast along each sub-segment and become the
    /// manager's active set. The contact threshold is reset to zero; the
    /// manager's allowed-collision predicate is kept.
    pub fn new(
        state_space: Arc<dyn StateSpace>,
        solver: Arc<dyn StateSolver>,
        mut manager: Box<dyn ContinuousContactManager>,
        joint_names: Vec<String>,
        links: Vec<String>,
    ) -> Result<Self> {
        if joint_names.len() != state_space.dimension() {
            return Err(PlanningError::DimensionMismatch {
                expected: state_space.dimension(),
                actual: joint_names.len(),
            });
        }
        manager.set_active_collision_objects(&links);
        manager.set_contact_distance_threshold(0.0)?;
        Ok(Self {
            state_space,
            solver,
            manager,
            joint_names,
            links,
        })
    }

    /// Validator for the links moved by `joint_names` in `env`, with zero
    /// contact threshold and the environment's allowed collisions.
    pub fn from_environment(
        env: &Environment,
        state_space: Arc<dyn StateSpace>,
        joint_names: &[String],
    ) -> Result<Self> {
        let settings = ValidatorSettings::default();
        Self::from_environment_with_settings(env, state_space, joint_names, &settings)
    }

    /// [`ContinuousMotionValidator::from_environment`] with the contact
    /// threshold taken from `settings`.
    pub fn from_environment_with_settings(
        env: &Environment,
        state_space: Arc<dyn StateSpace>,
        joint_names: &[String],
        settings: &ValidatorSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let links = env.active_link_names(joint_names)?;
        let solver: Arc<dyn StateSolver> = Arc::from(env.solver().clone_solver());
        let mut validator = Self::new(
            state_space,
            solver,
            env.continuous_manager(),
            joint_names.to_vec(),
            links,
        )?;
        validator
            .manager
            .set_contact_distance_threshold(settings.contact_distance)?;
        debug!(
            joints = joint_names.len(),
            links = validator.links.len(),
            contact_distance = settings.contact_distance,
            "motion validator ready"
        );
        Ok(validator)
    }

    /// Joint names backing the state coordinates.
    pub fn joint_names(&self) -> &[String] {
        &self.joint_names
    }

    /// Links cast along each sub-segment.
    pub fn link_names(&self) -> &[String] {
        &self.links
    }

    /// The contact manager used for queries.
    pub fn contact_manager(&self) -> &dyn ContinuousContactManager {
        self.manager.as_ref()
    }

    /// Copy with its own contact manager, sharing the state space and
    /// solver.
    pub fn fork(&self) -> Self {
        Self {
            state_space: Arc::clone(&self.state_space),
            solver: Arc::clone(&self.solver),
            manager: self.manager.clone_continuous(),
            joint_names: self.joint_names.clone(),
            links: self.links.clone(),
        }
    }

    /// Whether the motion from `a` to `b` is collision free.
    pub fn check_motion(&mut self, a: &DVector<f64>, b: &DVector<f64>) -> bool {
        self.check_motion_last_valid(a, b, false).valid
    }

    /// Check the motion from `a` to `b` and report how far it stays free.
    ///
    /// Failing at sub-segment `i` of `n` reports fraction `(i - 1) / n`;
    /// with `want_state` the state at that fraction is included. States of
    /// the wrong dimension fail at fraction 0.
    pub fn check_motion_last_valid(
        &mut self,
        a: &DVector<f64>,
        b: &DVector<f64>,
        want_state: bool,
    ) -> MotionCheck {
        let dimension = self.state_space.dimension();
        if a.len() != dimension || b.len() != dimension {
            warn!(expected = dimension, a = a.len(), b = b.len(), "state dimension mismatch");
            return MotionCheck::invalid(0.0, want_state.then(|| a.clone()));
        }

        let n = self.state_space.valid_segment_count(a, b).max(1);
        let mut start = match self.state_at(a, b, 0.0) {
            Ok(state) => state,
            Err(err) => {
                warn!(%err, "start state unavailable");
                return MotionCheck::invalid(0.0, want_state.then(|| a.clone()));
            }
        };

        for i in 1..=n {
            let t = i as f64 / n as f64;
            let free = self
                .state_at(a, b, t)
                .and_then(|end| {
                    let free = self.segment_is_free(&start, &end)?;
                    start = end;
                    Ok(free)
                })
                .unwrap_or_else(|err| {
                    warn!(segment = i, segments = n, %err, "sub-segment check failed");
                    false
                });
            trace!(segment = i, segments = n, free, "sub-segment checked");

            if !free {
                let fraction = (i - 1) as f64 / n as f64;
                debug!(segment = i, segments = n, fraction, "motion in collision");
                let state = want_state.then(|| self.state_space.interpolate(a, b, fraction));
                return MotionCheck::invalid(fraction, state);
            }
        }

        debug!(segments = n, "motion valid");
        MotionCheck::valid()
    }

    /// Check many edges in parallel, one fork per worker.
    pub fn check_motions(&self, edges: &[(DVector<f64>, DVector<f64>)]) -> Vec<MotionCheck> {
        edges
            .par_iter()
            .map_init(
                || self.fork(),
                |validator, (a, b)| validator.check_motion_last_valid(a, b, false),
            )
            .collect()
    }

    fn state_at(&self, a: &DVector<f64>, b: &DVector<f64>, t: f64) -> Result<EnvState> {
        let q = self.state_space.interpolate(a, b, t);
        Ok(self.solver.get_state_vector(&self.joint_names, &q)?)
    }

    fn segment_is_free(&mut self, start: &EnvState, end: &EnvState) -> Result<bool> {
        let start_poses = self.link_transforms(start);
        let end_poses = self.link_transforms(end);
        self.manager
            .set_collision_objects_transforms_cast(&start_poses, &end_poses);

        let mut results = ContactResultMap::new();
        self.manager.contact_test(&mut results, ContactTestType::First)?;
        if let Some(((a, b), _)) = results.iter().next() {
            trace!(link1 = %a, link2 = %b, "contact");
        }
        Ok(results.is_empty())
    }

    fn link_transforms(&self, state: &EnvState) -> TransformMap {
        self.links
            .iter()
            .filter_map(|link| state.transform(link).map(|pose| (link.clone(), *pose)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_space::{Bounds, RealVectorStateSpace};
    use kinesweep_ir::{Geometry, Joint, JointKind, JointLimits, Link, Pose, SceneGraph, Vec3};
    use kinesweep_kinematics::StateSolverKind;

    /// world -> x (prismatic, [0, 1]) -> tool (ball 0.05); post (box) at x=0.5
    fn track() -> Environment {
        let mut graph = SceneGraph::new("track");
        graph.insert_link(Link::new("world"));
        graph.insert_link(
            Link::new("tool").with_collision(Pose::default(), Geometry::Sphere { radius: 0.05 }),
        );
        graph.insert_link(Link::new("post").with_collision(
            Pose::default(),
            Geometry::Box {
                size: Vec3::new(0.08, 0.4, 0.4),
            },
        ));
        graph.insert_joint(Joint::new(
            "x",
            "world",
            "tool",
            Pose::default(),
            JointKind::Prismatic {
                axis: Vec3::new(1.0, 0.0, 0.0),
                limits: Some(JointLimits { lower: 0.0, upper: 1.0 }),
            },
        ));
        let mount = Pose::from_xyz(0.5, 0.0, 0.0);
        graph.insert_joint(Joint::fixed("post_mount", "world", "post", mount));
        Environment::new(graph, StateSolverKind::Tree).unwrap()
    }

    fn validator(env: &Environment) -> ContinuousMotionValidator {
        let joints = vec!["x".to_string()];
        let space = Arc::new(RealVectorStateSpace::from_environment(env, &joints).unwrap());
        ContinuousMotionValidator::from_environment(env, space, &joints).unwrap()
    }

    fn q(x: f64) -> DVector<f64> {
        DVector::from_vec(vec![x])
    }

    #[test]
    fn test_links_follow_joints() {
        let env = track();
        let validator = validator(&env);

        assert_eq!(validator.link_names().to_vec(), vec!["tool".to_string()]);
        let manager = validator.contact_manager();
        assert_eq!(manager.active_collision_objects(), vec!["tool".to_string()]);
        assert_eq!(validator.contact_manager().contact_distance_threshold(), 0.0);
    }

    #[test]
    fn test_free_edge_is_valid() {
        let env = track();
        let mut validator = validator(&env);

        assert!(validator.check_motion(&q(0.0), &q(0.3)));
        let check = validator.check_motion_last_valid(&q(0.7), &q(1.0), true);
        assert_eq!(check, MotionCheck::valid());
    }

    #[test]
    fn test_blocked_edge_reports_last_valid() {
        let env = track();
        let mut validator = validator(&env);

        let check = validator.check_motion_last_valid(&q(0.0), &q(1.0), true);
        assert!(!check.valid);
        // contact starts at x = 0.41
        let fraction = check.last_valid.fraction;
        assert!((0.39..0.42).contains(&fraction), "fraction {fraction}");
        let state = check.last_valid.state.unwrap();
        assert!((state[0] - fraction).abs() < 1e-12);
    }

    #[test]
    fn test_wrong_dimension_is_invalid() {
        let env = track();
        let mut validator = validator(&env);

        let check = validator.check_motion_last_valid(&q(0.0), &DVector::zeros(2), false);
        assert!(!check.valid);
        assert_eq!(check.last_valid.fraction, 0.0);
        assert!(check.last_valid.state.is_none());
    }

    #[test]
    fn test_new_checks_joint_count() {
        let env = track();
        let space: Arc<dyn StateSpace> = Arc::new(
            RealVectorStateSpace::new(vec![Bounds::new(0.0, 1.0), Bounds::new(0.0, 1.0)]).unwrap(),
        );
        let solver: Arc<dyn StateSolver> = Arc::from(env.solver().clone_solver());
        let err = ContinuousMotionValidator::new(
            space,
            solver,
            env.continuous_manager(),
            vec!["x".to_string()],
            vec!["tool".to_string()],
        )
        .unwrap_err();

        assert!(matches!(err, PlanningError::DimensionMismatch { expected: 2, actual: 1 }));
    }

    #[test]
    fn test_unknown_joint_rejected() {
        let env = track();
        let space = Arc::new(RealVectorStateSpace::new(vec![Bounds::new(0.0, 1.0)]).unwrap());
        let joints = ["nope".to_string()];
        let result = ContinuousMotionValidator::from_environment(&env, space, &joints);
        assert!(result.is_err());
    }

    #[test]
    fn test_fork_keeps_configuration() {
        let env = track();
        let mut validator = validator(&env);
        let mut fork = validator.fork();

        assert_eq!(fork.link_names(), validator.link_names());
        assert_eq!(
            fork.check_motion_last_valid(&q(0.0), &q(1.0), false),
            validator.check_motion_last_valid(&q(0.0), &q(1.0), false)
        );
    }

    #[test]
    fn test_check_motions_preserves_order() {
        let env = track();
        let validator = validator(&env);
        let edges = vec![(q(0.0), q(0.3)), (q(0.0), q(1.0)), (q(0.7), q(0.9))];

        let valid: Vec<bool> = validator.check_motions(&edges).iter().map(|c| c.valid).collect();
        assert_eq!(valid, vec![true, false, true]);
    }
}
