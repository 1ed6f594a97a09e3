//! Scene description for the kinesweep motion-validity core.
//!
//! This crate defines the declarative model of an articulated mechanism:
//! links carrying collision geometry, joints connecting them, and the edit
//! commands used to change the structure after it has been loaded.
//!
//! The model is purely data. Validation, transform propagation and collision
//! queries are handled by the kinematics and collision crates.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 3D vector with f64 components (meters or a unit direction).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// X component.
    pub x: f64,
    /// Y component.
    pub y: f64,
    /// Z component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new Vec3.
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }
}

/// Rigid offset expressed as a translation and roll/pitch/yaw angles.
///
/// Angles are in radians and follow the URDF convention (fixed-axis X, Y, Z).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Translation in meters.
    pub xyz: Vec3,
    /// Roll, pitch, yaw in radians.
    pub rpy: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            xyz: Vec3::zero(),
            rpy: Vec3::zero(),
        }
    }
}

impl Pose {
    /// A pure translation.
    pub fn from_xyz(x: f64, y: f64, z: f64) -> Self {
        Self {
            xyz: Vec3::new(x, y, z),
            rpy: Vec3::zero(),
        }
    }
}

/// Collision geometry primitive, defined in the frame of its [`Collision`].
///
/// Cylinders and capsules are aligned with the local Z axis and centered on
/// the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Geometry {
    /// Box with full side lengths.
    Box {
        /// Size along each axis.
        size: Vec3,
    },
    /// Sphere centered at the origin.
    Sphere {
        /// Radius.
        radius: f64,
    },
    /// Cylinder along Z.
    Cylinder {
        /// Radius.
        radius: f64,
        /// Full length along Z.
        length: f64,
    },
    /// Capsule along Z; `length` is the distance between the cap centers.
    Capsule {
        /// Radius of the caps and the shaft.
        radius: f64,
        /// Distance between the two cap centers.
        length: f64,
    },
    /// Convex hull of a point cloud.
    ConvexMesh {
        /// Hull input points.
        vertices: Vec<Vec3>,
    },
    /// Triangle mesh (may be concave).
    Mesh {
        /// Vertex positions.
        vertices: Vec<Vec3>,
        /// Triangles as vertex index triples.
        indices: Vec<[u32; 3]>,
    },
}

/// A collision geometry placed in its link's frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collision {
    /// Placement of the geometry relative to the link frame.
    #[serde(default)]
    pub origin: Pose,
    /// The geometry itself.
    pub geometry: Geometry,
}

/// A rigid body of the mechanism.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    /// Unique link name.
    pub name: String,
    /// Collision geometries; a link without any is kinematic-only.
    #[serde(default)]
    pub collision: Vec<Collision>,
}

impl Link {
    /// Create a link without collision geometry.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collision: Vec::new(),
        }
    }

    /// Add a collision geometry at the given origin.
    pub fn with_collision(mut self, origin: Pose, geometry: Geometry) -> Self {
        self.collision.push(Collision { origin, geometry });
        self
    }
}

/// Position limits of a bounded joint (radians or meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointLimits {
    /// Lower bound.
    pub lower: f64,
    /// Upper bound.
    pub upper: f64,
}

/// Kind of motion a joint allows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JointKind {
    /// No motion; only the origin contributes.
    Fixed,
    /// Rotation about `axis`, optionally bounded.
    Revolute {
        /// Rotation axis in the joint frame.
        axis: Vec3,
        /// Position limits in radians.
        limits: Option<JointLimits>,
    },
    /// Unbounded rotation about `axis`.
    Continuous {
        /// Rotation axis in the joint frame.
        axis: Vec3,
    },
    /// Translation along `axis`, optionally bounded.
    Prismatic {
        /// Translation axis in the joint frame.
        axis: Vec3,
        /// Position limits in meters.
        limits: Option<JointLimits>,
    },
}

impl JointKind {
    /// Whether the joint carries a value.
    pub fn is_movable(&self) -> bool {
        !matches!(self, JointKind::Fixed)
    }

    /// Position limits, if the joint has any.
    pub fn limits(&self) -> Option<JointLimits> {
        match self {
            JointKind::Revolute { limits, .. } | JointKind::Prismatic { limits, .. } => *limits,
            JointKind::Fixed | JointKind::Continuous { .. } => None,
        }
    }
}

/// A joint connecting a parent link to a child link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Joint {
    /// Unique joint name.
    pub name: String,
    /// Parent link name.
    pub parent_link: String,
    /// Child link name.
    pub child_link: String,
    /// Transform from the parent link frame to the joint frame.
    #[serde(default)]
    pub origin: Pose,
    /// Motion type.
    pub kind: JointKind,
}

impl Joint {
    /// Create a fixed joint.
    pub fn fixed(
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
        origin: Pose,
    ) -> Self {
        Self {
            name: name.into(),
            parent_link: parent.into(),
            child_link: child.into(),
            origin,
            kind: JointKind::Fixed,
        }
    }

    /// Create a joint of the given kind.
    pub fn new(
        name: impl Into<String>,
        parent: impl Into<String>,
        child: impl Into<String>,
        origin: Pose,
        kind: JointKind,
    ) -> Self {
        Self {
            name: name.into(),
            parent_link: parent.into(),
            child_link: child.into(),
            origin,
            kind,
        }
    }
}

/// The directed link/joint structure of a mechanism and its surroundings.
///
/// Links and joints are keyed by name. The root is either given explicitly or
/// is the unique link that is not the child of any joint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SceneGraph {
    /// Graph name.
    pub name: String,
    /// Explicit root link, if any.
    #[serde(default)]
    pub root: Option<String>,
    /// Links keyed by name.
    #[serde(default)]
    pub links: BTreeMap<String, Link>,
    /// Joints keyed by name.
    #[serde(default)]
    pub joints: BTreeMap<String, Joint>,
}

impl SceneGraph {
    /// Create an empty graph.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Insert a link, returning the one it replaced.
    pub fn insert_link(&mut self, link: Link) -> Option<Link> {
        self.links.insert(link.name.clone(), link)
    }

    /// Insert a joint, returning the one it replaced.
    pub fn insert_joint(&mut self, joint: Joint) -> Option<Joint> {
        self.joints.insert(joint.name.clone(), joint)
    }

    /// Look up a link by name.
    pub fn link(&self, name: &str) -> Option<&Link> {
        self.links.get(name)
    }

    /// Look up a joint by name.
    pub fn joint(&self, name: &str) -> Option<&Joint> {
        self.joints.get(name)
    }

    /// Joints whose child is `link`. A valid tree has at most one.
    pub fn parent_joints<'a>(&'a self, link: &'a str) -> impl Iterator<Item = &'a Joint> + 'a {
        self.joints.values().filter(move |j| j.child_link == link)
    }

    /// Joints whose parent is `link`, in name order.
    pub fn child_joints<'a>(&'a self, link: &'a str) -> impl Iterator<Item = &'a Joint> + 'a {
        self.joints.values().filter(move |j| j.parent_link == link)
    }

    /// Links that are not the child of any joint.
    pub fn root_candidates(&self) -> Vec<&str> {
        self.links
            .keys()
            .filter(|name| self.parent_joints(name).next().is_none())
            .map(String::as_str)
            .collect()
    }

    /// Names of the movable joints, in name order.
    pub fn movable_joint_names(&self) -> Vec<String> {
        self.joints
            .values()
            .filter(|j| j.kind.is_movable())
            .map(|j| j.name.clone())
            .collect()
    }

    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// One incremental change to a [`SceneGraph`] or to the collision setup
/// derived from it.
///
/// Batches of commands are applied all-or-nothing by the consumers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    /// Add a link and the joint attaching it to the existing graph.
    AddLink {
        /// The new link.
        link: Link,
        /// Joint whose child is the new link.
        joint: Joint,
    },
    /// Remove a link, its parent joint and everything below it.
    RemoveLink {
        /// Link to remove.
        link: String,
    },
    /// Replace the joint whose child is `joint.child_link`.
    MoveLink {
        /// The replacement joint.
        joint: Joint,
    },
    /// Attach an existing joint to a different parent link.
    MoveJoint {
        /// Joint to move.
        joint: String,
        /// New parent link.
        parent_link: String,
    },
    /// Change the fixed parent-to-joint transform of a joint.
    ChangeJointOrigin {
        /// Joint to change.
        joint: String,
        /// New origin.
        origin: Pose,
    },
    /// Enable or disable a link's collision geometry.
    ChangeLinkCollisionEnabled {
        /// Link to change.
        link: String,
        /// New enabled flag.
        enabled: bool,
    },
    /// Allow a pair of links to touch without being reported.
    AddAllowedCollision {
        /// First link.
        link1: String,
        /// Second link.
        link2: String,
        /// Why the pair is allowed.
        reason: String,
    },
    /// Remove a previously allowed pair.
    RemoveAllowedCollision {
        /// First link.
        link1: String,
        /// Second link.
        link2: String,
    },
}

impl Command {
    /// Whether this command changes the link/joint structure (as opposed to
    /// collision bookkeeping only).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Command::AddLink { .. }
                | Command::RemoveLink { .. }
                | Command::MoveLink { .. }
                | Command::MoveJoint { .. }
                | Command::ChangeJointOrigin { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_link_arm() -> SceneGraph {
        let mut graph = SceneGraph::new("arm");
        graph.insert_link(Link::new("base"));
        graph.insert_link(Link::new("upper").with_collision(
            Pose::from_xyz(0.0, 0.0, 0.25),
            Geometry::Capsule {
                radius: 0.05,
                length: 0.5,
            },
        ));
        graph.insert_joint(Joint::new(
            "shoulder",
            "base",
            "upper",
            Pose::from_xyz(0.0, 0.0, 0.1),
            JointKind::Revolute {
                axis: Vec3::new(0.0, 1.0, 0.0),
                limits: Some(JointLimits {
                    lower: -1.5,
                    upper: 1.5,
                }),
            },
        ));
        graph
    }

    #[test]
    fn roundtrip_scene_graph() {
        let graph = two_link_arm();

        let json = graph.to_json().expect("serialize");
        let restored = SceneGraph::from_json(&json).expect("deserialize");

        assert_eq!(graph, restored);
        assert_eq!(restored.links.len(), 2);
        assert_eq!(restored.joints.len(), 1);
    }

    #[test]
    fn root_candidates_skip_children() {
        let graph = two_link_arm();
        assert_eq!(graph.root_candidates(), vec!["base"]);
    }

    #[test]
    fn movable_joints_exclude_fixed() {
        let mut graph = two_link_arm();
        graph.insert_link(Link::new("tool"));
        graph.insert_joint(Joint::fixed("flange", "upper", "tool", Pose::default()));

        assert_eq!(graph.movable_joint_names(), vec!["shoulder".to_string()]);
        assert_eq!(graph.child_joints("upper").count(), 1);
        assert_eq!(graph.parent_joints("tool").next().map(|j| j.name.as_str()), Some("flange"));
    }

    #[test]
    fn serde_tagged_command() {
        let cmd = Command::ChangeJointOrigin {
            joint: "shoulder".to_string(),
            origin: Pose::from_xyz(0.0, 0.0, 0.2),
        };
        let json = serde_json::to_string(&cmd).unwrap();
        assert!(json.contains(r#""type":"ChangeJointOrigin""#));

        let restored: Command = serde_json::from_str(&json).unwrap();
        assert_eq!(cmd, restored);
        assert!(restored.is_structural());
    }

    #[test]
    fn geometry_defaults_origin() {
        let json = r#"{"name":"l","collision":[{"geometry":{"type":"Sphere","radius":0.1}}]}"#;
        let link: Link = serde_json::from_str(json).unwrap();
        assert_eq!(link.collision[0].origin, Pose::default());
    }
}
