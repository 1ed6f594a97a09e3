//! Allowed-collision matrix.

use std::collections::BTreeMap;
use std::sync::Arc;

use kinesweep_ir::SceneGraph;

use crate::types::{pair_key, IsContactAllowedFn};

/// Reason recorded for links joined directly by a joint.
pub const ADJACENT: &str = "Adjacent";

/// Unordered link pairs whose contact is never reported, with a reason.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedCollisionMatrix {
    entries: BTreeMap<(String, String), String>,
}

impl AllowedCollisionMatrix {
    /// Empty matrix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matrix allowing every parent/child pair of `graph`.
    pub fn adjacent(graph: &SceneGraph) -> Self {
        let mut acm = Self::new();
        for joint in graph.joints.values() {
            acm.add_allowed_collision(&joint.parent_link, &joint.child_link, ADJACENT);
        }
        acm
    }

    /// Allow a pair; replaces any previous reason.
    pub fn add_allowed_collision(&mut self, link1: &str, link2: &str, reason: &str) {
        self.entries.insert(pair_key(link1, link2), reason.to_string());
    }

    /// Forget a pair. Returns whether it was present.
    pub fn remove_allowed_collision(&mut self, link1: &str, link2: &str) -> bool {
        self.entries.remove(&pair_key(link1, link2)).is_some()
    }

    /// Forget every pair involving `link`.
    pub fn remove_link(&mut self, link: &str) {
        self.entries.retain(|(a, b), _| a != link && b != link);
    }

    /// Whether contact between the two links is allowed.
    pub fn is_collision_allowed(&self, link1: &str, link2: &str) -> bool {
        self.entries.contains_key(&pair_key(link1, link2))
    }

    /// Reason a pair is allowed.
    pub fn reason(&self, link1: &str, link2: &str) -> Option<&str> {
        self.entries.get(&pair_key(link1, link2)).map(String::as_str)
    }

    /// Number of allowed pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no pair is allowed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Allowed pairs with their reasons, sorted.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str, &str)> {
        self.entries
            .iter()
            .map(|((a, b), r)| (a.as_str(), b.as_str(), r.as_str()))
    }

    /// Predicate over a snapshot of the current entries.
    ///
    /// Later edits to the matrix do not affect the returned predicate.
    pub fn to_predicate(&self) -> IsContactAllowedFn {
        let snapshot = Arc::new(self.clone());
        Arc::new(move |a: &str, b: &str| snapshot.is_collision_allowed(a, b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kinesweep_ir::{Joint, Link, Pose};

    #[test]
    fn test_adjacent_pairs() {
        let mut graph = SceneGraph::new("g");
        for name in ["a", "b", "c"] {
            graph.insert_link(Link::new(name));
        }
        graph.insert_joint(Joint::fixed("ab", "a", "b", Pose::default()));
        graph.insert_joint(Joint::fixed("bc", "b", "c", Pose::default()));

        let acm = AllowedCollisionMatrix::adjacent(&graph);
        assert_eq!(acm.len(), 2);
        assert!(acm.is_collision_allowed("b", "a"));
        assert_eq!(acm.reason("c", "b"), Some(ADJACENT));
        assert!(!acm.is_collision_allowed("a", "c"));
    }

    #[test]
    fn test_predicate_is_a_snapshot() {
        let mut acm = AllowedCollisionMatrix::new();
        acm.add_allowed_collision("x", "y", "test");
        let allowed = acm.to_predicate();

        assert!(acm.remove_allowed_collision("y", "x"));
        assert!(!acm.is_collision_allowed("x", "y"));
        assert!(allowed("y", "x"));
    }

    #[test]
    fn test_remove_link() {
        let mut acm = AllowedCollisionMatrix::new();
        acm.add_allowed_collision("x", "y", "r");
        acm.add_allowed_collision("y", "z", "r");
        acm.add_allowed_collision("u", "v", "r");
        acm.remove_link("y");
        let pairs: Vec<_> = acm.entries().map(|(a, b, _)| (a, b)).collect();
        assert_eq!(pairs, vec![("u", "v")]);
    }
}
