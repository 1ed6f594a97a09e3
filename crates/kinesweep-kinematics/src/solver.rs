//! The state solver interface and the pieces its variants share.

use std::sync::Arc;

use kinesweep_ir::{Command, SceneGraph};
use nalgebra::DVector;

use crate::chain::ChainStateSolver;
use crate::error::{KinematicsError, Result};
use crate::joints::initial_value;
use crate::state::{EnvState, JointValues, TransformMap};
use crate::topology::{apply_commands, Segment, Topology};
use crate::tree::TreeStateSolver;

/// Converts joint configurations into [`EnvState`]s and owns the current one.
///
/// `get_state*` never touches the owned state and takes `&self`, so one
/// solver can serve concurrent queries. `set_state*` and
/// `on_environment_changed` are the only mutators; callers serialize them.
/// Supplied values are merged with the current values of joints they do not
/// mention; naming a joint the bound graph does not have is an error.
pub trait StateSolver: Send + Sync {
    /// Bind the solver to a scene graph.
    fn init(&mut self, scene_graph: Arc<SceneGraph>) -> Result<()>;

    /// Replace the current state with the one produced by `joints`.
    fn set_state(&mut self, joints: &JointValues) -> Result<()>;

    /// Compute the state produced by `joints` without changing the solver.
    fn get_state(&self, joints: &JointValues) -> Result<EnvState>;

    /// The owned current state.
    fn current_state(&self) -> Result<&EnvState>;

    /// Apply a batch of edit commands to the bound graph and rebuild.
    ///
    /// On failure nothing changes.
    fn on_environment_changed(&mut self, commands: &[Command]) -> Result<()>;

    /// The bound scene graph.
    fn scene_graph(&self) -> Result<&Arc<SceneGraph>>;

    /// Movable joints in traversal order.
    fn joint_names(&self) -> Result<&[String]>;

    /// Links in traversal order, root first.
    fn link_names(&self) -> Result<&[String]>;

    /// Links moved by any of `joint_names`.
    fn active_link_names(&self, joint_names: &[String]) -> Result<Vec<String>>;

    /// Independent copy with the same binding and current state.
    fn clone_solver(&self) -> Box<dyn StateSolver>;

    /// [`StateSolver::set_state`] from parallel name/value lists.
    fn set_state_lists(&mut self, names: &[String], values: &[f64]) -> Result<()> {
        let joints = values_from_lists(names, values)?;
        self.set_state(&joints)
    }

    /// [`StateSolver::set_state`] from names and a value vector.
    fn set_state_vector(&mut self, names: &[String], values: &DVector<f64>) -> Result<()> {
        self.set_state_lists(names, values.as_slice())
    }

    /// [`StateSolver::get_state`] from parallel name/value lists.
    fn get_state_lists(&self, names: &[String], values: &[f64]) -> Result<EnvState> {
        let joints = values_from_lists(names, values)?;
        self.get_state(&joints)
    }

    /// [`StateSolver::get_state`] from names and a value vector.
    fn get_state_vector(&self, names: &[String], values: &DVector<f64>) -> Result<EnvState> {
        self.get_state_lists(names, values.as_slice())
    }
}

/// Available solver variants.
///
/// The composing application picks one; there is no global registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StateSolverKind {
    /// Any tree-shaped graph.
    #[default]
    Tree,
    /// Unbranched graphs only.
    Chain,
}

impl StateSolverKind {
    /// Create an uninitialized solver of this kind.
    pub fn create(self) -> Box<dyn StateSolver> {
        match self {
            StateSolverKind::Tree => Box::new(TreeStateSolver::new()),
            StateSolverKind::Chain => Box::new(ChainStateSolver::new()),
        }
    }

    /// Create a solver of this kind and bind it to `scene_graph`.
    pub fn create_for(self, scene_graph: Arc<SceneGraph>) -> Result<Box<dyn StateSolver>> {
        let mut solver = self.create();
        solver.init(scene_graph)?;
        Ok(solver)
    }
}

/// Zip parallel name/value lists into a map.
pub fn values_from_lists(names: &[String], values: &[f64]) -> Result<JointValues> {
    if names.len() != values.len() {
        return Err(KinematicsError::LengthMismatch {
            names: names.len(),
            values: values.len(),
        });
    }
    Ok(names.iter().cloned().zip(values.iter().copied()).collect())
}

/// Overlay `update` on `current`, rejecting unknown, fixed or non-finite
/// entries.
pub(crate) fn merge_values(
    graph: &SceneGraph,
    current: &JointValues,
    update: &JointValues,
) -> Result<JointValues> {
    let mut merged = current.clone();
    for (name, &value) in update {
        if !merged.contains_key(name) {
            return Err(match graph.joint(name) {
                Some(_) => KinematicsError::FixedJoint(name.clone()),
                None => KinematicsError::UnknownJoint(name.clone()),
            });
        }
        if !value.is_finite() {
            return Err(KinematicsError::StateUnavailable(format!(
                "joint {name} has non-finite value {value}"
            )));
        }
        merged.insert(name.clone(), value);
    }
    Ok(merged)
}

/// Joint values for a freshly built topology, keeping values of joints that
/// survive from `previous`.
pub(crate) fn carry_over_values(
    graph: &SceneGraph,
    topology: &Topology,
    previous: &JointValues,
) -> JointValues {
    topology
        .movable_joints
        .iter()
        .map(|name| {
            let value = previous.get(name).copied().unwrap_or_else(|| {
                graph
                    .joint(name)
                    .map(|j| initial_value(&j.kind))
                    .unwrap_or(0.0)
            });
            (name.clone(), value)
        })
        .collect()
}

/// Transform propagation strategy of a solver variant.
pub(crate) type Propagate = fn(&Topology, &JointValues) -> Result<TransformMap>;

/// A solver's binding to a validated graph and its current state.
#[derive(Debug, Clone)]
pub(crate) struct Binding {
    pub graph: Arc<SceneGraph>,
    pub topology: Topology,
    pub current: EnvState,
}

impl Binding {
    /// Bind to `graph`, starting every joint at its initial value.
    pub fn new(graph: Arc<SceneGraph>, topology: Topology, propagate: Propagate) -> Result<Self> {
        let joints = carry_over_values(&graph, &topology, &JointValues::new());
        let transforms = propagate(&topology, &joints)?;
        Ok(Self {
            graph,
            topology,
            current: EnvState { joints, transforms },
        })
    }

    pub fn get_state(&self, update: &JointValues, propagate: Propagate) -> Result<EnvState> {
        let joints = merge_values(&self.graph, &self.current.joints, update)?;
        let transforms = propagate(&self.topology, &joints)?;
        Ok(EnvState { joints, transforms })
    }

    /// Binding for the graph produced by `commands`, with the current values
    /// carried over.
    pub fn edited(
        &self,
        commands: &[Command],
        check: fn(&Topology) -> Result<()>,
        propagate: Propagate,
    ) -> Result<Self> {
        let (graph, topology) = apply_commands(&self.graph, commands)?;
        check(&topology)?;
        let joints = carry_over_values(&graph, &topology, &self.current.joints);
        let transforms = propagate(&topology, &joints)?;
        Ok(Self {
            graph: Arc::new(graph),
            topology,
            current: EnvState { joints, transforms },
        })
    }
}

/// Look up the value a segment's joint takes in `values`.
pub(crate) fn segment_value(segment: &Segment, values: &JointValues) -> Result<f64> {
    if !segment.kind.is_movable() {
        return Ok(0.0);
    }
    values.get(&segment.joint).copied().ok_or_else(|| {
        KinematicsError::StateUnavailable(format!("no value for joint {}", segment.joint))
    })
}
