//! Structural validation of a scene graph and the traversal order used for
//! transform propagation.

use std::collections::{HashMap, HashSet, VecDeque};

use kinesweep_ir::{Command, JointKind, SceneGraph};
use nalgebra::Isometry3;

use crate::error::{KinematicsError, Result};
use crate::joints::pose_to_isometry;

/// One joint of the traversal, with its origin already converted.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Joint name.
    pub joint: String,
    /// Parent link name.
    pub parent_link: String,
    /// Child link name.
    pub child_link: String,
    /// Parent link to joint frame.
    pub origin: Isometry3<f64>,
    /// Motion type.
    pub kind: JointKind,
}

/// Validated structure of a scene graph.
///
/// `segments` is ordered parent-before-child, so walking it front to back
/// always finds a link's parent transform already computed.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Root link.
    pub root: String,
    /// Joints in parent-before-child order.
    pub segments: Vec<Segment>,
    /// Links in traversal order, root first.
    pub links: Vec<String>,
    /// Movable joints in traversal order.
    pub movable_joints: Vec<String>,
}

impl Topology {
    /// Validate `graph` and compute its traversal order.
    ///
    /// Fails when a joint references a missing link, a link has two parent
    /// joints, the root is missing or ambiguous, the joints form a cycle, or
    /// some link cannot be reached from the root.
    pub fn build(graph: &SceneGraph) -> Result<Self> {
        // child link -> (parent joint, parent link)
        let mut parent_of: HashMap<&str, (&str, &str)> = HashMap::new();
        for joint in graph.joints.values() {
            for link in [&joint.parent_link, &joint.child_link] {
                if !graph.links.contains_key(link) {
                    return Err(KinematicsError::UnknownLink(link.clone()));
                }
            }
            let entry = (joint.name.as_str(), joint.parent_link.as_str());
            if let Some((first, _)) = parent_of.insert(joint.child_link.as_str(), entry) {
                return Err(KinematicsError::DuplicateParent {
                    link: joint.child_link.clone(),
                    first: first.to_string(),
                    second: joint.name.clone(),
                });
            }
        }

        let root = find_root(graph, &parent_of)?;

        let mut segments = Vec::with_capacity(graph.joints.len());
        let mut links = vec![root.clone()];
        let mut visited: HashSet<&str> = HashSet::from([root.as_str()]);
        let mut queue = VecDeque::from([root.as_str()]);

        while let Some(link) = queue.pop_front() {
            for joint in graph.child_joints(link) {
                if !visited.insert(joint.child_link.as_str()) {
                    return Err(KinematicsError::Cycle(joint.child_link.clone()));
                }
                segments.push(Segment {
                    joint: joint.name.clone(),
                    parent_link: joint.parent_link.clone(),
                    child_link: joint.child_link.clone(),
                    origin: pose_to_isometry(&joint.origin),
                    kind: joint.kind.clone(),
                });
                links.push(joint.child_link.clone());
                queue.push_back(joint.child_link.as_str());
            }
        }

        if visited.len() != graph.links.len() {
            let unreachable: Vec<&str> = graph
                .links
                .keys()
                .map(String::as_str)
                .filter(|l| !visited.contains(l))
                .collect();
            if let Some(link) = unreachable.iter().find(|l| on_cycle(l, &parent_of)) {
                return Err(KinematicsError::Cycle(link.to_string()));
            }
            return Err(KinematicsError::Disconnected(
                unreachable.into_iter().map(str::to_string).collect(),
            ));
        }

        let movable_joints = segments
            .iter()
            .filter(|s| s.kind.is_movable())
            .map(|s| s.joint.clone())
            .collect();

        Ok(Self {
            root,
            segments,
            links,
            movable_joints,
        })
    }

    /// Find a segment by joint name.
    pub fn segment(&self, joint: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.joint == joint)
    }

    /// Links whose transform depends on any of `joint_names`, in traversal
    /// order.
    pub fn active_link_names(&self, joint_names: &[String]) -> Result<Vec<String>> {
        let mut moved: HashSet<&str> = HashSet::new();
        for name in joint_names {
            let segment = self
                .segment(name)
                .ok_or_else(|| KinematicsError::UnknownJoint(name.clone()))?;
            moved.insert(segment.child_link.as_str());
        }

        let mut active = Vec::new();
        for segment in &self.segments {
            if moved.contains(segment.child_link.as_str())
                || moved.contains(segment.parent_link.as_str())
            {
                moved.insert(segment.child_link.as_str());
                active.push(segment.child_link.clone());
            }
        }
        Ok(active)
    }
}

fn find_root(graph: &SceneGraph, parent_of: &HashMap<&str, (&str, &str)>) -> Result<String> {
    if let Some(root) = &graph.root {
        if !graph.links.contains_key(root) {
            return Err(KinematicsError::InvalidRoot(format!("root link {root} not found")));
        }
        if let Some((joint, _)) = parent_of.get(root.as_str()) {
            return Err(KinematicsError::InvalidRoot(format!(
                "root link {root} is the child of joint {joint}"
            )));
        }
        return Ok(root.clone());
    }

    let candidates = graph.root_candidates();
    match candidates.as_slice() {
        [root] => Ok(root.to_string()),
        [] if graph.links.is_empty() => Err(KinematicsError::InvalidRoot(
            "scene graph has no links".to_string(),
        )),
        [] => Err(KinematicsError::InvalidRoot(
            "every link is the child of a joint".to_string(),
        )),
        many => Err(KinematicsError::InvalidRoot(format!(
            "ambiguous root, candidates: {}",
            many.join(", ")
        ))),
    }
}

fn on_cycle(start: &str, parent_of: &HashMap<&str, (&str, &str)>) -> bool {
    let mut seen = HashSet::from([start]);
    let mut current = start;
    while let Some((_, parent)) = parent_of.get(current) {
        if !seen.insert(*parent) {
            return true;
        }
        current = *parent;
    }
    false
}

/// Apply a batch of edit commands to a copy of `graph`.
///
/// Either every command applies and the result validates, or an error is
/// returned and `graph` is untouched.
pub fn apply_commands(graph: &SceneGraph, commands: &[Command]) -> Result<(SceneGraph, Topology)> {
    let mut edited = graph.clone();
    for (index, command) in commands.iter().enumerate() {
        apply_command(&mut edited, command)
            .map_err(|reason| KinematicsError::Command { index, reason })?;
    }
    let topology = Topology::build(&edited)?;
    Ok((edited, topology))
}

fn apply_command(graph: &mut SceneGraph, command: &Command) -> std::result::Result<(), String> {
    match command {
        Command::AddLink { link, joint } => {
            if graph.links.contains_key(&link.name) {
                return Err(format!("link {} already exists", link.name));
            }
            if graph.joints.contains_key(&joint.name) {
                return Err(format!("joint {} already exists", joint.name));
            }
            if joint.child_link != link.name {
                return Err(format!(
                    "joint {} has child {}, expected {}",
                    joint.name, joint.child_link, link.name
                ));
            }
            if !graph.links.contains_key(&joint.parent_link) {
                return Err(format!("parent link {} not found", joint.parent_link));
            }
            graph.insert_link(link.clone());
            graph.insert_joint(joint.clone());
        }
        Command::RemoveLink { link } => {
            if !graph.links.contains_key(link) {
                return Err(format!("link {link} not found"));
            }
            if graph.parent_joints(link).next().is_none() {
                return Err(format!("link {link} is the root and cannot be removed"));
            }
            let subtree = subtree_links(graph, link);
            graph.joints.retain(|_, j| !subtree.contains(&j.child_link));
            graph.links.retain(|name, _| !subtree.contains(name));
        }
        Command::MoveLink { joint } => {
            if !graph.links.contains_key(&joint.child_link) {
                return Err(format!("link {} not found", joint.child_link));
            }
            if !graph.links.contains_key(&joint.parent_link) {
                return Err(format!("parent link {} not found", joint.parent_link));
            }
            let old = graph
                .parent_joints(&joint.child_link)
                .next()
                .map(|j| j.name.clone())
                .ok_or_else(|| {
                    format!("link {} has no parent joint to replace", joint.child_link)
                })?;
            if old != joint.name && graph.joints.contains_key(&joint.name) {
                return Err(format!("joint {} already exists", joint.name));
            }
            graph.joints.remove(&old);
            graph.insert_joint(joint.clone());
        }
        Command::MoveJoint { joint, parent_link } => {
            if !graph.links.contains_key(parent_link) {
                return Err(format!("parent link {parent_link} not found"));
            }
            let entry = graph
                .joints
                .get_mut(joint)
                .ok_or_else(|| format!("joint {joint} not found"))?;
            entry.parent_link = parent_link.clone();
        }
        Command::ChangeJointOrigin { joint, origin } => {
            let entry = graph
                .joints
                .get_mut(joint)
                .ok_or_else(|| format!("joint {joint} not found"))?;
            entry.origin = *origin;
        }
        Command::ChangeLinkCollisionEnabled { link, .. } => {
            if !graph.links.contains_key(link) {
                return Err(format!("link {link} not found"));
            }
        }
        Command::AddAllowedCollision { .. } | Command::RemoveAllowedCollision { .. } => {}
    }
    Ok(())
}

/// `link` and every link below it.
pub fn subtree_links(graph: &SceneGraph, link: &str) -> HashSet<String> {
    let mut subtree = HashSet::from([link.to_string()]);
    let mut queue = VecDeque::from([link.to_string()]);
    while let Some(current) = queue.pop_front() {
        for joint in graph.child_joints(&current) {
            if subtree.insert(joint.child_link.clone()) {
                queue.push_back(joint.child_link.clone());
            }
        }
    }
    subtree
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinesweep_ir::{Joint, Link, Pose, Vec3};

    fn revolute_z() -> JointKind {
        JointKind::Revolute {
            axis: Vec3::new(0.0, 0.0, 1.0),
            limits: None,
        }
    }

    fn forked_graph() -> SceneGraph {
        let mut graph = SceneGraph::new("fork");
        for name in ["base", "left", "right", "left_tip"] {
            graph.insert_link(Link::new(name));
        }
        graph.insert_joint(Joint::new("j_left", "base", "left", Pose::default(), revolute_z()));
        graph.insert_joint(Joint::new("j_right", "base", "right", Pose::default(), revolute_z()));
        let tip = Pose::from_xyz(1.0, 0.0, 0.0);
        graph.insert_joint(Joint::fixed("j_tip", "left", "left_tip", tip));
        graph
    }

    #[test]
    fn test_parent_before_child() {
        let topology = Topology::build(&forked_graph()).unwrap();

        assert_eq!(topology.root, "base");
        assert_eq!(topology.links[0], "base");
        let pos = |l: &str| topology.links.iter().position(|x| x == l).unwrap();
        assert!(pos("left") < pos("left_tip"));
        assert_eq!(topology.movable_joints, vec!["j_left", "j_right"]);
    }

    #[test]
    fn test_missing_link_reference() {
        let mut graph = forked_graph();
        graph.insert_joint(Joint::fixed("dangling", "base", "nowhere", Pose::default()));
        assert_eq!(
            Topology::build(&graph).unwrap_err(),
            KinematicsError::UnknownLink("nowhere".to_string())
        );
    }

    #[test]
    fn test_duplicate_parent() {
        let mut graph = forked_graph();
        graph.insert_joint(Joint::fixed("again", "right", "left_tip", Pose::default()));
        assert!(matches!(
            Topology::build(&graph),
            Err(KinematicsError::DuplicateParent { .. })
        ));
    }

    #[test]
    fn test_disconnected_and_cycle() {
        let mut graph = forked_graph();
        graph.root = Some("base".to_string());
        graph.insert_link(Link::new("island"));
        assert_eq!(
            Topology::build(&graph).unwrap_err(),
            KinematicsError::Disconnected(vec!["island".to_string()])
        );

        let mut graph = forked_graph();
        graph.insert_link(Link::new("a"));
        graph.insert_link(Link::new("b"));
        graph.insert_joint(Joint::fixed("ab", "a", "b", Pose::default()));
        graph.insert_joint(Joint::fixed("ba", "b", "a", Pose::default()));
        assert!(matches!(Topology::build(&graph), Err(KinematicsError::Cycle(_))));
    }

    #[test]
    fn test_ambiguous_root() {
        let mut graph = forked_graph();
        graph.insert_link(Link::new("island"));
        assert!(matches!(
            Topology::build(&graph),
            Err(KinematicsError::InvalidRoot(_))
        ));
        assert!(matches!(
            Topology::build(&SceneGraph::new("empty")),
            Err(KinematicsError::InvalidRoot(_))
        ));
    }

    #[test]
    fn test_active_links_follow_subtree() {
        let topology = Topology::build(&forked_graph()).unwrap();
        let active = topology.active_link_names(&["j_left".to_string()]).unwrap();
        assert_eq!(active, vec!["left", "left_tip"]);

        assert_eq!(
            topology.active_link_names(&["nope".to_string()]).unwrap_err(),
            KinematicsError::UnknownJoint("nope".to_string())
        );
    }

    #[test]
    fn test_commands_are_atomic() {
        let graph = forked_graph();
        let commands = vec![
            Command::AddLink {
                link: Link::new("extra"),
                joint: Joint::fixed("j_extra", "right", "extra", Pose::default()),
            },
            Command::ChangeJointOrigin {
                joint: "missing".to_string(),
                origin: Pose::default(),
            },
        ];

        let err = apply_commands(&graph, &commands).unwrap_err();
        assert!(matches!(err, KinematicsError::Command { index: 1, .. }));
        assert!(!graph.links.contains_key("extra"));
    }

    #[test]
    fn test_remove_link_takes_subtree() {
        let graph = forked_graph();
        let (edited, topology) = apply_commands(
            &graph,
            &[Command::RemoveLink {
                link: "left".to_string(),
            }],
        )
        .unwrap();

        assert!(!edited.links.contains_key("left_tip"));
        assert!(!edited.joints.contains_key("j_tip"));
        assert_eq!(topology.links, vec!["base", "right"]);
    }

    #[test]
    fn test_move_joint_into_cycle_fails() {
        let graph = forked_graph();
        let result = apply_commands(
            &graph,
            &[Command::MoveJoint {
                joint: "j_left".to_string(),
                parent_link: "left_tip".to_string(),
            }],
        );
        assert!(result.is_err());
    }
}
