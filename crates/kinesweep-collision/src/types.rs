//! Query modes and contact results.

use std::collections::BTreeMap;
use std::sync::Arc;

use nalgebra::{Point3, Vector3};

/// How much work a contact test does before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactTestType {
    /// Stop at the first contact found.
    #[default]
    First,
    /// Report only the single nearest contact over all pairs.
    Closest,
    /// Report every contact.
    All,
}

/// Where along a cast a contact occurs, per object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContinuousCollisionType {
    /// Static object, or a discrete query.
    #[default]
    None,
    /// At the start pose.
    Time0,
    /// At the end pose.
    Time1,
    /// Strictly between start and end.
    Between,
}

impl ContinuousCollisionType {
    /// Classify a time of impact in `[0, 1]`.
    pub fn from_time(t: f64) -> Self {
        if t <= 0.0 {
            ContinuousCollisionType::Time0
        } else if t >= 1.0 {
            ContinuousCollisionType::Time1
        } else {
            ContinuousCollisionType::Between
        }
    }
}

/// One contact between two collision objects.
///
/// Names are ordered so that `link_names[0] < link_names[1]`; `normal`
/// points from the first object towards the second.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactResult {
    /// The two objects, sorted.
    pub link_names: [String; 2],
    /// Signed separation; negative when penetrating.
    pub distance: f64,
    /// Contact normal in world frame.
    pub normal: Vector3<f64>,
    /// Nearest point on each object in world frame.
    pub nearest_points: [Point3<f64>; 2],
    /// Cast time of the contact per object; `-1` for objects that did not move.
    pub cc_time: [f64; 2],
    /// Cast classification per object.
    pub cc_type: [ContinuousCollisionType; 2],
}

impl ContactResult {
    /// Swap the object order, flipping the normal.
    pub(crate) fn swapped(self) -> Self {
        let [a, b] = self.link_names;
        let [pa, pb] = self.nearest_points;
        let [ta, tb] = self.cc_time;
        let [ka, kb] = self.cc_type;
        Self {
            link_names: [b, a],
            distance: self.distance,
            normal: -self.normal,
            nearest_points: [pb, pa],
            cc_time: [tb, ta],
            cc_type: [kb, ka],
        }
    }

    /// Reorder so the names are sorted.
    pub(crate) fn normalized(self) -> Self {
        if self.link_names[0] > self.link_names[1] {
            self.swapped()
        } else {
            self
        }
    }
}

/// Contacts keyed by sorted object-name pair.
pub type ContactResultMap = BTreeMap<(String, String), Vec<ContactResult>>;

/// Key for an unordered name pair.
pub fn pair_key(a: &str, b: &str) -> (String, String) {
    if a <= b {
        (a.to_string(), b.to_string())
    } else {
        (b.to_string(), a.to_string())
    }
}

/// Predicate deciding whether contact between two named objects is allowed.
///
/// Allowed pairs are never tested.
pub type IsContactAllowedFn = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Total number of contacts in a result map.
pub fn contact_count(results: &ContactResultMap) -> usize {
    results.values().map(Vec::len).sum()
}
