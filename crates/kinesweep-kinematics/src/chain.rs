//! State solver for unbranched scene graphs.

use std::sync::Arc;

use kinesweep_ir::{Command, SceneGraph};
use nalgebra::Isometry3;
use tracing::debug;

use crate::error::{KinematicsError, Result};
use crate::joints::{is_finite, joint_motion};
use crate::solver::{segment_value, Binding, StateSolver};
use crate::state::{EnvState, JointValues, TransformMap};
use crate::topology::Topology;

/// Solver for graphs where every link has at most one child joint.
///
/// Transforms are a single running product from root to tip. Binding to a
/// branching graph fails with [`KinematicsError::NotAChain`], and so does an
/// edit that would introduce a branch.
#[derive(Debug, Clone, Default)]
pub struct ChainStateSolver {
    binding: Option<Binding>,
}

impl ChainStateSolver {
    /// Create an uninitialized solver.
    pub fn new() -> Self {
        Self::default()
    }

    fn binding(&self) -> Result<&Binding> {
        self.binding.as_ref().ok_or(KinematicsError::Uninitialized)
    }
}

fn check_chain(topology: &Topology) -> Result<()> {
    for pair in topology.segments.windows(2) {
        if pair[1].parent_link != pair[0].child_link {
            return Err(KinematicsError::NotAChain(pair[1].parent_link.clone()));
        }
    }
    Ok(())
}

fn propagate_chain(topology: &Topology, values: &JointValues) -> Result<TransformMap> {
    let mut transforms = TransformMap::with_capacity(topology.links.len());
    let mut pose = Isometry3::identity();
    transforms.insert(topology.root.clone(), pose);

    for segment in &topology.segments {
        pose *= segment.origin * joint_motion(&segment.kind, segment_value(segment, values)?);
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

impl StateSolver for ChainStateSolver {
    fn init(&mut self, scene_graph: Arc<SceneGraph>) -> Result<()> {
        let topology = Topology::build(&scene_graph)?;
        check_chain(&topology)?;
        let binding = Binding::new(scene_graph, topology, propagate_chain)?;
        debug!(
            graph = %binding.graph.name,
            links = binding.topology.links.len(),
            "chain solver bound"
        );
        self.binding = Some(binding);
        Ok(())
    }

    fn set_state(&mut self, joints: &JointValues) -> Result<()> {
        let state = self.binding()?.get_state(joints, propagate_chain)?;
        if let Some(binding) = self.binding.as_mut() {
            binding.current = state;
        }
        Ok(())
    }

    fn get_state(&self, joints: &JointValues) -> Result<EnvState> {
        self.binding()?.get_state(joints, propagate_chain)
    }

    fn current_state(&self) -> Result<&EnvState> {
        Ok(&self.binding()?.current)
    }

    fn on_environment_changed(&mut self, commands: &[Command]) -> Result<()> {
        let edited = self.binding()?.edited(commands, check_chain, propagate_chain)?;
        debug!(commands = commands.len(), "chain solver rebuilt");
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
