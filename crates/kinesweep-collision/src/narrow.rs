//! Exact pair queries on top of parry.

use nalgebra::{Isometry3, Point3, Vector3};
use parry3d::query::{self, NonlinearRigidMotion, Unsupported};

use crate::broad::parts_reach;
use crate::shapes::ShapePart;

/// Prediction used to recover contact geometry at a cast's time of impact.
const IMPACT_PREDICTION: f32 = 1.0e-3;

/// Gap above the threshold at which advancement reports a pair as near.
const ADVANCE_TOLERANCE: f32 = 1.0e-4;

/// Advancement steps before a pair still hugging the threshold is reported.
const MAX_ADVANCE_STEPS: usize = 10_000;

/// Contact between two objects in world frame, before naming.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairContact {
    /// Signed separation.
    pub distance: f32,
    /// Normal pointing from the first object to the second.
    pub normal: Vector3<f32>,
    /// Nearest points on the first and second object.
    pub points: [Point3<f32>; 2],
    /// Cast time, `None` for a discrete contact.
    pub time: Option<f32>,
}

/// Straight-line translation of the link origin plus a constant-rate
/// rotation, taking `start` to `end` over `[0, 1]`.
#[derive(Debug, Clone, Copy)]
pub struct LinkMotion {
    start: Isometry3<f32>,
    linvel: Vector3<f32>,
    angvel: Vector3<f32>,
}

impl LinkMotion {
    /// Motion between two poses.
    pub fn between(start: &Isometry3<f32>, end: &Isometry3<f32>) -> Self {
        Self {
            start: *start,
            linvel: end.translation.vector - start.translation.vector,
            angvel: (end.rotation * start.rotation.inverse()).scaled_axis(),
        }
    }

    /// A motion that stays at `pose`.
    pub fn stationary(pose: &Isometry3<f32>) -> Self {
        Self {
            start: *pose,
            linvel: Vector3::zeros(),
            angvel: Vector3::zeros(),
        }
    }

    /// Motion of a part rigidly attached to the link.
    ///
    /// Rotation is about the link origin, so every part of a link follows
    /// the same rigid path.
    fn of_part(&self, part: &ShapePart) -> NonlinearRigidMotion {
        NonlinearRigidMotion::new(
            self.start * part.local,
            part.local.inverse() * Point3::origin(),
            self.linvel,
            self.angvel,
        )
    }

    /// Upper bound on the speed of any point of `parts` along the motion.
    fn max_point_speed(&self, parts: &[ShapePart]) -> f32 {
        self.linvel.norm() + self.angvel.norm() * parts_reach(parts)
    }

    /// Link pose at time `t`.
    pub fn pose_at(&self, t: f32) -> Isometry3<f32> {
        NonlinearRigidMotion::new(self.start, Point3::origin(), self.linvel, self.angvel)
            .position_at_time(t)
    }
}

/// Closest contact within `prediction` between two sets of parts at fixed
/// poses.
pub fn contact(
    parts1: &[ShapePart],
    pose1: &Isometry3<f32>,
    parts2: &[ShapePart],
    pose2: &Isometry3<f32>,
    prediction: f32,
) -> Result<Option<PairContact>, Unsupported> {
    let mut best: Option<PairContact> = None;
    for p1 in parts1 {
        let pos1 = pose1 * p1.local;
        for p2 in parts2 {
            let pos2 = pose2 * p2.local;
            let Some(c) = query::contact(&pos1, &*p1.shape, &pos2, &*p2.shape, prediction)? else {
                continue;
            };
            if best.map_or(true, |b| c.dist < b.distance) {
                best = Some(PairContact {
                    distance: c.dist,
                    normal: c.normal1.into_inner(),
                    points: [c.point1, c.point2],
                    time: None,
                });
            }
        }
    }
    Ok(best)
}

/// Earliest contact between two moving sets of parts over `[0, 1]`.
///
/// The interval is closed: a contact exactly at `t = 1` is reported.
pub fn cast(
    parts1: &[ShapePart],
    motion1: &LinkMotion,
    parts2: &[ShapePart],
    motion2: &LinkMotion,
) -> Result<Option<PairContact>, Unsupported> {
    let mut earliest: Option<PairContact> = None;
    for p1 in parts1 {
        let m1 = motion1.of_part(p1);
        for p2 in parts2 {
            let m2 = motion2.of_part(p2);
            let Some(hit) =
                query::cast_shapes_nonlinear(&m1, &*p1.shape, &m2, &*p2.shape, 0.0, 1.0, true)?
            else {
                continue;
            };
            let t = hit.time_of_impact.clamp(0.0, 1.0);
            if earliest.is_some_and(|e| e.time.is_some_and(|et| et <= t)) {
                continue;
            }

            let pos1 = m1.position_at_time(t);
            let pos2 = m2.position_at_time(t);
            let at_impact =
                query::contact(&pos1, &*p1.shape, &pos2, &*p2.shape, IMPACT_PREDICTION)?;
            let contact = match at_impact {
                Some(c) => PairContact {
                    distance: c.dist.min(0.0),
                    normal: c.normal1.into_inner(),
                    points: [c.point1, c.point2],
                    time: Some(t),
                },
                None => PairContact {
                    distance: 0.0,
                    normal: pos1 * hit.normal1.into_inner(),
                    points: [pos1 * hit.witness1, pos2 * hit.witness2],
                    time: Some(t),
                },
            };
            earliest = Some(contact);
        }
    }
    Ok(earliest)
}

/// Contact between two moving sets of parts within `prediction`.
///
/// A swept contact wins. Otherwise the pair is advanced conservatively along
/// the motion until the gap first drops to `prediction`; the reported gap
/// may exceed it by at most [`ADVANCE_TOLERANCE`].
pub fn cast_with_margin(
    parts1: &[ShapePart],
    motion1: &LinkMotion,
    parts2: &[ShapePart],
    motion2: &LinkMotion,
    prediction: f32,
) -> Result<Option<PairContact>, Unsupported> {
    if let Some(hit) = cast(parts1, motion1, parts2, motion2)? {
        return Ok(Some(hit));
    }
    if prediction <= 0.0 {
        return Ok(None);
    }

    let speed = motion1.max_point_speed(parts1) + motion2.max_point_speed(parts2);
    let mut t = 0.0;
    for _ in 0..MAX_ADVANCE_STEPS {
        let (pose1, pose2) = (motion1.pose_at(t), motion2.pose_at(t));
        let gap = separation(parts1, &pose1, parts2, &pose2)?;
        if gap <= prediction + ADVANCE_TOLERANCE {
            return near_contact(parts1, &pose1, parts2, &pose2, gap, t);
        }
        if t >= 1.0 || speed <= f32::EPSILON {
            return Ok(None);
        }
        // the gap cannot close faster than `speed`
        t = (t + (gap - prediction) / speed).min(1.0);
    }

    let (pose1, pose2) = (motion1.pose_at(t), motion2.pose_at(t));
    let gap = separation(parts1, &pose1, parts2, &pose2)?;
    near_contact(parts1, &pose1, parts2, &pose2, gap, t)
}

/// Smallest distance between two sets of parts.
fn separation(
    parts1: &[ShapePart],
    pose1: &Isometry3<f32>,
    parts2: &[ShapePart],
    pose2: &Isometry3<f32>,
) -> Result<f32, Unsupported> {
    let mut gap = f32::MAX;
    for p1 in parts1 {
        let pos1 = pose1 * p1.local;
        for p2 in parts2 {
            let pos2 = pose2 * p2.local;
            gap = gap.min(query::distance(&pos1, &*p1.shape, &pos2, &*p2.shape)?);
        }
    }
    Ok(gap)
}

fn near_contact(
    parts1: &[ShapePart],
    pose1: &Isometry3<f32>,
    parts2: &[ShapePart],
    pose2: &Isometry3<f32>,
    gap: f32,
    t: f32,
) -> Result<Option<PairContact>, Unsupported> {
    let found = contact(parts1, pose1, parts2, pose2, gap + IMPACT_PREDICTION)?;
    Ok(found.map(|c| PairContact { time: Some(t), ..c }))
}
