//! An articulated scene: state solver and contact managers kept in sync.

use std::collections::HashSet;
use std::sync::Arc;

use kinesweep_collision::{
    AllowedCollisionMatrix, CollisionObject, ContactManager, ContinuousContactManager,
    IsContactAllowedFn, SweptContactManager, ADJACENT,
};
use kinesweep_ir::{Command, Joint, SceneGraph};
use kinesweep_kinematics::{
    EnvState, JointValues, KinematicsError, StateSolver, StateSolverKind,
};
use nalgebra::DVector;
use tracing::debug;

use crate::error::Result;

/// Scene graph, state solver, collision registry and allowed-collision
/// matrix, updated together.
///
/// Every state change pushes the new link transforms into the collision
/// registry, and every edit batch updates solver, registry and matrix
/// together or not at all. Managers handed out by
/// [`Environment::discrete_manager`] and
/// [`Environment::continuous_manager`] are independent copies.
pub struct Environment {
    solver: Box<dyn StateSolver>,
    manager: SweptContactManager,
    acm: AllowedCollisionMatrix,
    revision: u64,
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("manager", &self.manager)
            .field("acm", &self.acm)
            .field("revision", &self.revision)
            .finish_non_exhaustive()
    }
}

impl Environment {
    /// Build an environment over `scene_graph` with the given solver kind.
    ///
    /// Links with collision geometry become collision objects; links
    /// connected by a joint are allowed to touch.
    pub fn new(scene_graph: SceneGraph, kind: StateSolverKind) -> Result<Self> {
        let scene_graph = Arc::new(scene_graph);
        let solver = kind.create_for(Arc::clone(&scene_graph))?;

        let mut manager = SweptContactManager::new();
        for link in scene_graph.links.values() {
            if let Some(object) = CollisionObject::from_link(link)? {
                manager.add_collision_object(object)?;
            }
        }
        manager.set_collision_objects_transforms(&solver.current_state()?.transforms);

        let acm = AllowedCollisionMatrix::adjacent(&scene_graph);
        debug!(
            graph = %scene_graph.name,
            ?kind,
            objects = manager.collision_object_names().len(),
            allowed = acm.len(),
            "environment created"
        );

        Ok(Self {
            solver,
            manager,
            acm,
            revision: 0,
        })
    }

    /// The bound scene graph.
    pub fn scene_graph(&self) -> Result<&Arc<SceneGraph>> {
        Ok(self.solver.scene_graph()?)
    }

    /// The state solver.
    pub fn solver(&self) -> &dyn StateSolver {
        self.solver.as_ref()
    }

    /// Movable joints in traversal order.
    pub fn joint_names(&self) -> Result<&[String]> {
        Ok(self.solver.joint_names()?)
    }

    /// Links in traversal order.
    pub fn link_names(&self) -> Result<&[String]> {
        Ok(self.solver.link_names()?)
    }

    /// Links moved by any of `joint_names`.
    pub fn active_link_names(&self, joint_names: &[String]) -> Result<Vec<String>> {
        Ok(self.solver.active_link_names(joint_names)?)
    }

    /// Number of edit batches applied so far.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// The current state.
    pub fn current_state(&self) -> Result<&EnvState> {
        Ok(self.solver.current_state()?)
    }

    /// Set joint values and move the collision objects accordingly.
    pub fn set_state(&mut self, joints: &JointValues) -> Result<()> {
        self.solver.set_state(joints)?;
        self.current_state_changed()
    }

    /// [`Environment::set_state`] from parallel name/value lists.
    pub fn set_state_lists(&mut self, names: &[String], values: &[f64]) -> Result<()> {
        self.solver.set_state_lists(names, values)?;
        self.current_state_changed()
    }

    /// [`Environment::set_state`] from names and a value vector.
    pub fn set_state_vector(&mut self, names: &[String], values: &DVector<f64>) -> Result<()> {
        self.solver.set_state_vector(names, values)?;
        self.current_state_changed()
    }

    /// State for `joints` merged over the current values; changes nothing.
    pub fn get_state(&self, joints: &JointValues) -> Result<EnvState> {
        Ok(self.solver.get_state(joints)?)
    }

    /// [`Environment::get_state`] from parallel name/value lists.
    pub fn get_state_lists(&self, names: &[String], values: &[f64]) -> Result<EnvState> {
        Ok(self.solver.get_state_lists(names, values)?)
    }

    /// [`Environment::get_state`] from names and a value vector.
    pub fn get_state_vector(&self, names: &[String], values: &DVector<f64>) -> Result<EnvState> {
        Ok(self.solver.get_state_vector(names, values)?)
    }

    fn current_state_changed(&mut self) -> Result<()> {
        let state = self.solver.current_state()?;
        self.manager.set_collision_objects_transforms(&state.transforms);
        Ok(())
    }

    /// Apply a batch of edit commands.
    ///
    /// Either every command applies or the environment is left as it was.
    /// An empty batch changes nothing, the revision included.
    pub fn apply_commands(&mut self, commands: &[Command]) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let before = self.solver.scene_graph()?;
        let edited = if commands.iter().any(Command::is_structural) {
            let mut solver = self.solver.clone_solver();
            solver.on_environment_changed(commands)?;
            Some(solver)
        } else {
            check_link_references(before, commands)?;
            None
        };
        let after = match &edited {
            Some(solver) => solver.scene_graph()?,
            None => before,
        };
        let mut manager = self.manager.clone();
        let mut acm = self.acm.clone();

        for name in before.links.keys().filter(|l| !after.links.contains_key(*l)) {
            if manager.has_collision_object(name) {
                manager.remove_collision_object(name)?;
            }
            acm.remove_link(name);
        }

        for command in commands {
            match command {
                Command::AddLink { link, joint } => {
                    if manager.has_collision_object(&link.name) {
                        manager.remove_collision_object(&link.name)?;
                    }
                    if let Some(object) = CollisionObject::from_link(link)? {
                        manager.add_collision_object(object)?;
                    }
                    acm.add_allowed_collision(&joint.parent_link, &joint.child_link, ADJACENT);
                }
                Command::MoveLink { joint } => {
                    drop_adjacency(&mut acm, before.parent_joints(&joint.child_link).next());
                    acm.add_allowed_collision(&joint.parent_link, &joint.child_link, ADJACENT);
                }
                Command::MoveJoint { joint, parent_link } => {
                    drop_adjacency(&mut acm, before.joint(joint));
                    if let Some(moved) = after.joint(joint) {
                        acm.add_allowed_collision(parent_link, &moved.child_link, ADJACENT);
                    }
                }
                Command::ChangeLinkCollisionEnabled { link, enabled } => {
                    if manager.has_collision_object(link) {
                        if *enabled {
                            manager.enable_collision_object(link)?;
                        } else {
                            manager.disable_collision_object(link)?;
                        }
                    }
                }
                Command::AddAllowedCollision { link1, link2, reason } => {
                    acm.add_allowed_collision(link1, link2, reason);
                }
                Command::RemoveAllowedCollision { link1, link2 } => {
                    acm.remove_allowed_collision(link1, link2);
                }
                Command::RemoveLink { .. } | Command::ChangeJointOrigin { .. } => {}
            }
        }

        // links removed and re-added within the batch
        let stale: Vec<String> = manager
            .collision_object_names()
            .into_iter()
            .filter(|name| !after.links.contains_key(name))
            .collect();
        for name in &stale {
            manager.remove_collision_object(name)?;
        }

        let structural = edited.is_some();
        if let Some(solver) = edited {
            manager.set_collision_objects_transforms(&solver.current_state()?.transforms);
            self.solver = solver;
        }
        self.manager = manager;
        self.acm = acm;
        self.revision += 1;
        debug!(
            commands = commands.len(),
            structural,
            revision = self.revision,
            "environment edited"
        );
        Ok(())
    }

    /// The allowed-collision matrix.
    pub fn allowed_collision_matrix(&self) -> &AllowedCollisionMatrix {
        &self.acm
    }

    /// Predicate over a snapshot of the allowed-collision matrix.
    pub fn is_contact_allowed_fn(&self) -> IsContactAllowedFn {
        self.acm.to_predicate()
    }

    /// Independent discrete manager at the current state, with the allowed
    /// predicate installed.
    pub fn discrete_manager(&self) -> Box<dyn ContactManager> {
        let mut manager = self.manager.clone();
        manager.set_is_contact_allowed_fn(Some(self.is_contact_allowed_fn()));
        Box::new(manager)
    }

    /// Independent continuous manager at the current state, with the allowed
    /// predicate installed.
    pub fn continuous_manager(&self) -> Box<dyn ContinuousContactManager> {
        let mut manager = self.manager.clone();
        manager.set_is_contact_allowed_fn(Some(self.is_contact_allowed_fn()));
        Box::new(manager)
    }

    /// Names of links carrying collision geometry.
    pub fn collision_link_names(&self) -> HashSet<String> {
        self.manager.collision_object_names().into_iter().collect()
    }
}

/// Drop the adjacency entry of a replaced joint's old parent/child pair.
fn drop_adjacency(acm: &mut AllowedCollisionMatrix, old: Option<&Joint>) {
    if let Some(old) = old {
        if acm.reason(&old.parent_link, &old.child_link) == Some(ADJACENT) {
            acm.remove_allowed_collision(&old.parent_link, &old.child_link);
        }
    }
}

/// Links named by a batch that leaves the structure alone must exist.
fn check_link_references(graph: &SceneGraph, commands: &[Command]) -> Result<()> {
    for (index, command) in commands.iter().enumerate() {
        if let Command::ChangeLinkCollisionEnabled { link, .. } = command {
            if graph.link(link).is_none() {
                return Err(KinematicsError::Command {
                    index,
                    reason: format!("link {link} not found"),
                }
                .into());
            }
        }
    }
    Ok(())
}
