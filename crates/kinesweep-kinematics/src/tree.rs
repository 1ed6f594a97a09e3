//! State solver for tree-shaped scene graphs.

use std::sync::Arc;

use kinesweep_ir::{Command, SceneGraph};
use nalgebra::Isometry3;
use tracing::debug;

use crate::error::{KinematicsError, Result};
use crate::joints::{is_finite, joint_motion};
use crate::solver::{segment_value, Binding, StateSolver};
use crate::state::{EnvState, JointValues, TransformMap};
use crate::topology::Topology;

/// Solver that walks the whole tree from the root, parent before child.
#[derive(Debug, Clone, Default)]
pub struct TreeStateSolver {
    binding: Option<Binding>,
}

impl TreeStateSolver {
    /// Create an uninitialized solver.
    pub fn new() -> Self {
        Self::default()
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or(KinematicsError::Uninitialized)
    }
}

/// Compose every link's transform from its parent's.
pub(crate) fn propagate_tree(topology: &Topology, values: &JointValues) -> Result<TransformMap> {
    let mut transforms = TransformMap::with_capacity(topology.links.len());
    transforms.insert(topology.root.clone(), Isometry3::identity());

    for segment in &topology.segments {
        let parent = transforms.get(&segment.parent_link).copied().ok_or_else(|| {
            KinematicsError::StateUnavailable(format!(
                "parent {} of {} not computed",
                segment.parent_link, segment.child_link
            ))
        })?;
        let value = segment_value(segment, values)?;
        let pose = parent * segment.origin * joint_motion(&segment.kind, value);
        if !is_finite(&pose) {
            return Err(KinematicsError::StateUnavailable(format!(
                "non-finite transform for link {}",
                segment.child_link
            )));
        }
        transforms.insert(segment.child_link.clone(), pose);
    }

    Ok(transforms)
}

fn accept_any(_: &Topology) -> Result<()> {
    Ok(())
}

impl StateSolver for TreeStateSolver {
    fn init(&mut self, scene_graph: Arc<SceneGraph>) -> Result<()> {
        let topology = Topology::build(&scene_graph)?;
        let binding = Binding::new(scene_graph, topology, propagate_tree)?;
        debug!(
            graph = %binding.graph.name,
            links = binding.topology.links.len(),
            joints = binding.topology.movable_joints.len(),
            "tree solver bound"
        );
        self.binding = Some(binding);
        Ok(())
    }

    fn set_state(&mut self, joints: &JointValues) -> Result<()> {
        let state = self.binding()?.get_state(joints, propagate_tree)?;
        if let Some(binding) = self.binding.as_mut() {
            binding.current = state;
        }
        Ok(())
    }

    fn get_state(&self, joints: &JointValues) -> Result<EnvState> {
        self.binding()?.get_state(joints, propagate_tree)
    }

    fn current_state(&self) -> Result<&EnvState> {
        Ok(&self.binding()?.current)
    }

    fn on_environment_changed(&mut self, commands: &[Command]) -> Result<()> {
        let edited = self.binding()?.edited(commands, accept_any, propagate_tree)?;
        debug!(
            commands = commands.len(),
            links = edited.topology.links.len(),
            "tree solver rebuilt"
        );
        self.binding = Some(edited);
        Ok(())
    }

    fn scene_graph(&self) -> Result<&Arc<SceneGraph>> {
        Ok(&self.binding()?.graph)
    }

    fn joint_names(&self) -> Result<&[String]> {
        Ok(&self.binding()?.topology.movable_joints)
    }

    fn link_names(&self) -> Result<&[String]> {
        Ok(&self.binding()?.topology.links)
    }

    fn active_link_names(&self, joint_names: &[String]) -> Result<Vec<String>> {
        self.binding()?.topology.active_link_names(joint_names)
    }

    fn clone_solver(&self) -> Box<dyn StateSolver> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use kinesweep_ir::{Joint, JointKind, Link, Pose, Vec3};
    use nalgebra::{DVector, Vector3};

    /// base -> (shoulder, rev z) -> upper -> (elbow, rev z, x=1) -> fore
    ///      -> (tip, fixed, x=1) -> tool
    /// base -> (rail, prismatic x, y=2) -> cart
    fn arm_graph() -> Arc<SceneGraph> {
        let mut graph = SceneGraph::new("arm");
        for name in ["base", "upper", "fore", "tool", "cart"] {
            graph.insert_link(Link::new(name));
        }
        let rev_z = JointKind::Revolute {
            axis: Vec3::new(0.0, 0.0, 1.0),
            limits: None,
        };
        graph.insert_joint(Joint::new("shoulder", "base", "upper", Pose::default(), rev_z.clone()));
        let elbow = Pose::from_xyz(1.0, 0.0, 0.0);
        graph.insert_joint(Joint::new("elbow", "upper", "fore", elbow, rev_z));
        graph.insert_joint(Joint::fixed("tip", "fore", "tool", Pose::from_xyz(1.0, 0.0, 0.0)));
        graph.insert_joint(Joint::new(
            "rail",
            "base",
            "cart",
            Pose::from_xyz(0.0, 2.0, 0.0),
            JointKind::Prismatic {
                axis: Vec3::new(1.0, 0.0, 0.0),
                limits: None,
            },
        ));
        Arc::new(graph)
    }

    fn solver() -> TreeStateSolver {
        let mut solver = TreeStateSolver::new();
        solver.init(arm_graph()).unwrap();
        solver
    }

    fn values(pairs: &[(&str, f64)]) -> JointValues {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[test]
    fn test_uninitialized() {
        let solver = TreeStateSolver::new();
        assert_eq!(solver.current_state().unwrap_err(), KinematicsError::Uninitialized);
        assert_eq!(
            solver.get_state(&JointValues::new()).unwrap_err(),
            KinematicsError::Uninitialized
        );
    }

    #[test]
    fn test_initial_state_covers_every_link() {
        let solver = solver();
        let state = solver.current_state().unwrap();

        assert_eq!(state.transforms.len(), 5);
        assert_eq!(state.joints.len(), 3);
        assert_eq!(state.transform("base"), Some(&Isometry3::identity()));
        assert_relative_eq!(
            state.transform("tool").unwrap().translation.vector,
            Vector3::new(2.0, 0.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_forward_transforms() {
        let solver = solver();
        let state = solver
            .get_state(&values(&[
                ("shoulder", std::f64::consts::FRAC_PI_2),
                ("rail", 0.5),
            ]))
            .unwrap();

        assert_relative_eq!(
            state.transform("tool").unwrap().translation.vector,
            Vector3::new(0.0, 2.0, 0.0),
            epsilon = 1e-12
        );
        assert_relative_eq!(
            state.transform("cart").unwrap().translation.vector,
            Vector3::new(0.5, 2.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_get_state_is_pure() {
        let mut solver = solver();
        solver.set_state(&values(&[("elbow", 0.3)])).unwrap();
        let before = solver.current_state().unwrap().clone();

        let _ = solver.get_state(&values(&[("shoulder", 1.0), ("rail", -0.2)])).unwrap();

        assert_eq!(solver.current_state().unwrap(), &before);
    }

    #[test]
    fn test_set_state_matches_prior_get_state() {
        let mut solver = solver();
        solver.set_state(&values(&[("rail", 0.25)])).unwrap();

        let update = values(&[("shoulder", -0.7)]);
        let expected = solver.get_state(&update).unwrap();
        solver.set_state(&update).unwrap();

        assert_eq!(solver.current_state().unwrap(), &expected);
        assert_eq!(expected.joint("rail"), Some(0.25));
    }

    #[test]
    fn test_unknown_and_fixed_joint_rejected() {
        let mut solver = solver();
        let before = solver.current_state().unwrap().clone();

        assert_eq!(
            solver.set_state(&values(&[("wrist", 0.1)])).unwrap_err(),
            KinematicsError::UnknownJoint("wrist".to_string())
        );
        assert_eq!(
            solver.get_state(&values(&[("tip", 0.1)])).unwrap_err(),
            KinematicsError::FixedJoint("tip".to_string())
        );
        assert_eq!(solver.current_state().unwrap(), &before);
    }

    #[test]
    fn test_non_finite_value_is_unavailable() {
        let solver = solver();
        assert!(matches!(
            solver.get_state(&values(&[("elbow", f64::NAN)])),
            Err(KinematicsError::StateUnavailable(_))
        ));
    }

    #[test]
    fn test_list_and_vector_inputs() {
        let solver = solver();
        let names = vec!["shoulder".to_string(), "rail".to_string()];

        let from_lists = solver.get_state_lists(&names, &[0.4, 0.1]).unwrap();
        let from_vector = solver
            .get_state_vector(&names, &DVector::from_vec(vec![0.4, 0.1]))
            .unwrap();
        assert_eq!(from_lists, from_vector);

        assert_eq!(
            solver.get_state_lists(&names, &[0.4]).unwrap_err(),
            KinematicsError::LengthMismatch { names: 2, values: 1 }
        );
    }

    #[test]
    fn test_empty_edit_is_idempotent() {
        let mut solver = solver();
        solver.set_state(&values(&[("shoulder", 0.2), ("rail", 0.3)])).unwrap();
        let before = solver.current_state().unwrap().clone();
        let elbow_down = values(&[("elbow", -0.4)]);
        let elbow_down_before = solver.get_state(&elbow_down).unwrap();

        solver.on_environment_changed(&[]).unwrap();

        assert_eq!(solver.current_state().unwrap(), &before);
        assert_eq!(solver.get_state(&elbow_down).unwrap(), elbow_down_before);
    }

    #[test]
    fn test_edit_revalidates_current_state() {
        let mut solver = solver();
        solver.set_state(&values(&[("rail", 0.3)])).unwrap();

        solver
            .on_environment_changed(&[
                Command::RemoveLink {
                    link: "cart".to_string(),
                },
                Command::AddLink {
                    link: Link::new("wrist_link"),
                    joint: Joint::new(
                        "wrist",
                        "tool",
                        "wrist_link",
                        Pose::default(),
                        JointKind::Continuous {
                            axis: Vec3::new(1.0, 0.0, 0.0),
                        },
                    ),
                },
            ])
            .unwrap();

        let state = solver.current_state().unwrap();
        assert_eq!(state.joint("rail"), None);
        assert_eq!(state.joint("wrist"), Some(0.0));
        assert!(state.transform("wrist_link").is_some());
        assert!(state.transform("cart").is_none());
        assert_eq!(
            solver.get_state(&values(&[("rail", 0.1)])).unwrap_err(),
            KinematicsError::UnknownJoint("rail".to_string())
        );
    }

    #[test]
    fn test_failed_edit_leaves_solver_unchanged() {
        let mut solver = solver();
        let before = solver.current_state().unwrap().clone();

        let result = solver.on_environment_changed(&[
            Command::ChangeJointOrigin {
                joint: "elbow".to_string(),
                origin: Pose::from_xyz(3.0, 0.0, 0.0),
            },
            Command::RemoveLink {
                link: "base".to_string(),
            },
        ]);

        assert!(matches!(result, Err(KinematicsError::Command { index: 1, .. })));
        assert_eq!(solver.current_state().unwrap(), &before);
        assert!(solver.scene_graph().unwrap().link("base").is_some());
    }

    #[test]
    fn test_active_links() {
        let solver = solver();
        let active = solver.active_link_names(&["elbow".to_string()]).unwrap();
        assert_eq!(active, vec!["fore", "tool"]);
    }
}
