//! Contact manager backed by parry's swept (nonlinear) shape casts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kinesweep_kinematics::TransformMap;
use nalgebra::{Isometry3, Vector3};
use parry3d::bounding_volume::Aabb;
use tracing::{debug, trace};

use crate::broad::{parts_aabb, swept_aabb, within};
use crate::error::{CollisionError, Result};
use crate::manager::{ContactManager, ContinuousContactManager};
use crate::narrow::{self, LinkMotion, PairContact};
use crate::object::CollisionObject;
use crate::shapes::iso_to_f32;
use crate::types::{
    pair_key, ContactResult, ContactResultMap, ContactTestType, ContinuousCollisionType,
    IsContactAllowedFn,
};

#[derive(Debug, Clone)]
struct Entry {
    object: CollisionObject,
    pose: Isometry3<f32>,
    /// End pose of a pending cast starting at `pose`.
    cast_end: Option<Isometry3<f32>>,
}

impl Entry {
    fn motion(&self) -> LinkMotion {
        match &self.cast_end {
            Some(end) => LinkMotion::between(&self.pose, end),
            None => LinkMotion::stationary(&self.pose),
        }
    }

    fn bounds(&self) -> Option<Aabb> {
        match &self.cast_end {
            Some(end) => swept_aabb(self.object.parts(), &self.pose, end),
            None => parts_aabb(self.object.parts(), &self.pose),
        }
    }
}

/// Discrete and continuous contact manager.
///
/// Pairs are culled with swept bounding boxes and tested with
/// `parry3d::query::contact` when both sides are static, or with a
/// nonlinear shape cast over `[0, 1]` when either side moves.
#[derive(Clone, Default)]
pub struct SweptContactManager {
    entries: BTreeMap<String, Entry>,
    active: Option<BTreeSet<String>>,
    threshold: f64,
    allowed: Option<IsContactAllowedFn>,
}

impl fmt::Debug for SweptContactManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SweptContactManager")
            .field("objects", &self.entries.keys().collect::<Vec<_>>())
            .field("active", &self.active)
            .field("threshold", &self.threshold)
            .field("allowed_fn", &self.allowed.is_some())
            .finish()
    }
}

impl SweptContactManager {
    /// Empty manager with threshold 0 and no allowed pairs.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_mut(&mut self, name: &str) -> Result<&mut Entry> {
        self.entries
            .get_mut(name)
            .ok_or_else(|| CollisionError::UnknownObject(name.to_string()))
    }

    fn is_active(&self, name: &str) -> bool {
        self.active.as_ref().map_or(true, |set| set.contains(name))
    }

    fn is_allowed(&self, a: &str, b: &str) -> bool {
        self.allowed.as_ref().is_some_and(|allowed| allowed(a, b))
    }

    fn pair_contact(
        &self,
        a: (&str, &Entry),
        b: (&str, &Entry),
        margin: f32,
    ) -> Result<Option<ContactResult>> {
        let (name1, e1) = a;
        let (name2, e2) = b;
        let found = if e1.cast_end.is_none() && e2.cast_end.is_none() {
            narrow::contact(e1.object.parts(), &e1.pose, e2.object.parts(), &e2.pose, margin)
        } else {
            narrow::cast_with_margin(
                e1.object.parts(),
                &e1.motion(),
                e2.object.parts(),
                &e2.motion(),
                margin,
            )
        }
        .map_err(|_| CollisionError::Unsupported {
            a: name1.to_string(),
            b: name2.to_string(),
        })?;

        Ok(found.map(|c| {
            to_result(
                [name1, name2],
                [e1.cast_end.is_some(), e2.cast_end.is_some()],
                c,
            )
        }))
    }

    fn run_test(&self, results: &mut ContactResultMap, test_type: ContactTestType) -> Result<()> {
        let margin = self.threshold as f32;
        let candidates: Vec<(&str, &Entry, Aabb)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.object.is_enabled())
            .filter_map(|(name, e)| Some((name.as_str(), e, e.bounds()?)))
            .collect();

        let mut closest: Option<ContactResult> = None;
        let mut tested = 0usize;
        for (i, (name1, e1, box1)) in candidates.iter().enumerate() {
            for (name2, e2, box2) in &candidates[i + 1..] {
                if !self.is_active(name1) && !self.is_active(name2) {
                    continue;
                }
                if self.is_allowed(name1, name2) || !within(box1, box2, margin) {
                    continue;
                }
                tested += 1;

                let Some(contact) = self.pair_contact((*name1, *e1), (*name2, *e2), margin)? else {
                    continue;
                };
                match test_type {
                    ContactTestType::First => {
                        trace!(pairs = tested, "contact test stopped at first contact");
                        push(results, contact);
                        return Ok(());
                    }
                    ContactTestType::All => push(results, contact),
                    ContactTestType::Closest => {
                        if closest.as_ref().map_or(true, |c| contact.distance < c.distance) {
                            closest = Some(contact);
                        }
                    }
                }
            }
        }

        if let Some(contact) = closest {
            push(results, contact);
        }
        trace!(objects = candidates.len(), pairs = tested, "contact test done");
        Ok(())
    }
}

fn push(results: &mut ContactResultMap, contact: ContactResult) {
    let key = pair_key(&contact.link_names[0], &contact.link_names[1]);
    results.entry(key).or_default().push(contact);
}

fn to_result(names: [&str; 2], moving: [bool; 2], contact: PairContact) -> ContactResult {
    let time = f64::from(contact.time.unwrap_or(0.0));
    let cc_time = moving.map(|m| if m { time } else { -1.0 });
    let cc_type = moving.map(|m| {
        if m {
            ContinuousCollisionType::from_time(time)
        } else {
            ContinuousCollisionType::None
        }
    });
    let p = contact.points.map(|p| p.cast::<f64>());
    let n: Vector3<f64> = contact.normal.cast::<f64>();

    ContactResult {
        link_names: names.map(str::to_string),
        distance: f64::from(contact.distance),
        normal: n,
        nearest_points: p,
        cc_time,
        cc_type,
    }
    .normalized()
}

impl ContactManager for SweptContactManager {
    fn add_collision_object(&mut self, object: CollisionObject) -> Result<()> {
        if self.entries.contains_key(object.name()) {
            return Err(CollisionError::DuplicateObject(object.name().to_string()));
        }
        debug!(name = object.name(), parts = object.parts().len(), "collision object added");
        self.entries.insert(
            object.name().to_string(),
            Entry {
                object,
                pose: Isometry3::identity(),
                cast_end: None,
            },
        );
        Ok(())
    }

    fn remove_collision_object(&mut self, name: &str) -> Result<()> {
        self.entries
            .remove(name)
            .ok_or_else(|| CollisionError::UnknownObject(name.to_string()))?;
        debug!(name, "collision object removed");
        Ok(())
    }

    fn has_collision_object(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn enable_collision_object(&mut self, name: &str) -> Result<()> {
        self.entry_mut(name)?.object.set_enabled(true);
        Ok(())
    }

    fn disable_collision_object(&mut self, name: &str) -> Result<()> {
        self.entry_mut(name)?.object.set_enabled(false);
        Ok(())
    }

    fn set_active_collision_objects(&mut self, names: &[String]) {
        self.active = Some(names.iter().cloned().collect());
    }

    fn active_collision_objects(&self) -> Vec<String> {
        self.entries
            .keys()
            .filter(|name| self.is_active(name))
            .cloned()
            .collect()
    }

    fn collision_object_names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    fn set_contact_distance_threshold(&mut self, distance: f64) -> Result<()> {
        if !(distance.is_finite() && distance >= 0.0) {
            return Err(CollisionError::InvalidThreshold(distance));
        }
        self.threshold = distance;
        Ok(())
    }

    fn contact_distance_threshold(&self) -> f64 {
        self.threshold
    }

    fn set_is_contact_allowed_fn(&mut self, allowed: Option<IsContactAllowedFn>) {
        self.allowed = allowed;
    }

    fn is_contact_allowed_fn(&self) -> Option<IsContactAllowedFn> {
        self.allowed.clone()
    }

    fn set_collision_objects_transform(&mut self, name: &str, pose: &Isometry3<f64>) -> Result<()> {
        let entry = self.entry_mut(name)?;
        entry.pose = iso_to_f32(pose);
        entry.cast_end = None;
        Ok(())
    }

    fn set_collision_objects_transforms(&mut self, transforms: &TransformMap) {
        for (name, pose) in transforms {
            if let Some(entry) = self.entries.get_mut(name) {
                entry.pose = iso_to_f32(pose);
                entry.cast_end = None;
            }
        }
    }

    fn contact_test(
        &mut self,
        results: &mut ContactResultMap,
        test_type: ContactTestType,
    ) -> Result<()> {
        let outcome = self.run_test(results, test_type);
        for entry in self.entries.values_mut() {
            entry.cast_end = None;
        }
        outcome
    }

    fn clone_box(&self) -> Box<dyn ContactManager> {
        Box::new(self.clone())
    }
}

impl ContinuousContactManager for SweptContactManager {
    fn set_collision_objects_transform_cast(
        &mut self,
        name: &str,
        start: &Isometry3<f64>,
        end: &Isometry3<f64>,
    ) -> Result<()> {
        let entry = self.entry_mut(name)?;
        entry.pose = iso_to_f32(start);
        entry.cast_end = Some(iso_to_f32(end));
        Ok(())
    }

    fn set_collision_objects_transforms_cast(&mut self, start: &TransformMap, end: &TransformMap) {
        for (name, pose0) in start {
            let (Some(entry), Some(pose1)) = (self.entries.get_mut(name), end.get(name)) else {
                continue;
            };
            entry.pose = iso_to_f32(pose0);
            entry.cast_end = Some(iso_to_f32(pose1));
        }
    }

    fn clone_continuous(&self) -> Box<dyn ContinuousContactManager> {
        Box::new(self.clone())
    }
}
