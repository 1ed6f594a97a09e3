//! End-to-end motion validity checks against a small environment.

use std::sync::Arc;

use approx::assert_relative_eq;
use kinesweep_environment::Environment;
use kinesweep_ir::{Command, Geometry, Joint, JointKind, JointLimits, Link, Pose, SceneGraph, Vec3};
use kinesweep_kinematics::StateSolverKind;
use kinesweep_planning::{
    ContinuousMotionValidator, MotionCheck, RealVectorStateSpace, StateSpace, ValidatorSettings,
};
use nalgebra::DVector;

/// Splits every edge into the same number of sub-segments.
struct FixedSegments(usize);

impl StateSpace for FixedSegments {
    fn dimension(&self) -> usize {
        1
    }

    fn valid_segment_count(&self, _a: &DVector<f64>, _b: &DVector<f64>) -> usize {
        self.0
    }

    fn interpolate(&self, a: &DVector<f64>, b: &DVector<f64>, t: f64) -> DVector<f64> {
        a + (b - a) * t
    }
}

/// A tool sphere (r = 0.05) sliding along x past a thin wall at x = 0.5.
fn slide_graph(with_wall: bool) -> SceneGraph {
    let mut graph = SceneGraph::new("slide");
    graph.insert_link(Link::new("world"));
    graph.insert_link(
        Link::new("tool").with_collision(Pose::default(), Geometry::Sphere { radius: 0.05 }),
    );
    graph.insert_joint(Joint::new(
        "x",
        "world",
        "tool",
        Pose::default(),
        JointKind::Prismatic {
            axis: Vec3::new(1.0, 0.0, 0.0),
            limits: Some(JointLimits { lower: 0.0, upper: 1.0 }),
        },
    ));
    if with_wall {
        graph.insert_link(Link::new("wall").with_collision(
            Pose::default(),
            Geometry::Box {
                size: Vec3::new(0.08, 0.5, 0.5),
            },
        ));
        let mount = Pose::from_xyz(0.5, 0.0, 0.0);
        graph.insert_joint(Joint::fixed("wall_mount", "world", "wall", mount));
    }
    graph
}

fn slide(with_wall: bool) -> Environment {
    Environment::new(slide_graph(with_wall), StateSolverKind::Tree).unwrap()
}

fn joints() -> Vec<String> {
    vec!["x".to_string()]
}

fn q(x: f64) -> DVector<f64> {
    DVector::from_vec(vec![x])
}

fn fixed(env: &Environment, segments: usize) -> ContinuousMotionValidator {
    let space = Arc::new(FixedSegments(segments));
    ContinuousMotionValidator::from_environment(env, space, &joints()).unwrap()
}

#[test]
fn test_no_obstacle_every_edge_valid() {
    let env = slide(false);
    let space = Arc::new(RealVectorStateSpace::from_environment(&env, &joints()).unwrap());
    let mut validator =
        ContinuousMotionValidator::from_environment(&env, space, &joints()).unwrap();

    for (a, b) in [(0.0, 1.0), (1.0, 0.0), (0.2, 0.2), (0.9, 0.1)] {
        assert!(validator.check_motion(&q(a), &q(b)), "{a} -> {b}");
    }
}

#[test]
fn test_obstacle_stops_at_first_colliding_segment() {
    let env = slide(true);
    let mut validator = fixed(&env, 10);

    let check = validator.check_motion_last_valid(&q(0.0), &q(1.0), true);
    assert!(!check.valid);
    // tool meets the wall at x = 0.41, inside sub-segment 5
    assert_relative_eq!(check.last_valid.fraction, 0.4);
    assert_relative_eq!(check.last_valid.state.unwrap()[0], 0.4);

    let back = validator.check_motion_last_valid(&q(1.0), &q(0.0), false);
    assert!(!back.valid);
    assert_relative_eq!(back.last_valid.fraction, 0.4);
    assert!(back.last_valid.state.is_none());
}

#[test]
fn test_single_segment_does_not_tunnel() {
    let env = slide(true);
    let mut validator = fixed(&env, 1);

    // both endpoints are clear of the wall
    let check = validator.check_motion_last_valid(&q(0.0), &q(1.0), false);
    assert!(!check.valid);
    assert_eq!(check.last_valid.fraction, 0.0);
}

#[test]
fn test_edge_stopping_short_is_valid() {
    let env = slide(true);
    let mut validator = fixed(&env, 4);

    assert!(validator.check_motion(&q(0.0), &q(0.35)));
    assert!(validator.check_motion(&q(0.65), &q(1.0)));
}

#[test]
fn test_allowed_pair_is_ignored() {
    let mut env = slide(true);
    env.apply_commands(&[Command::AddAllowedCollision {
        link1: "tool".to_string(),
        link2: "wall".to_string(),
        reason: "soft wall".to_string(),
    }])
    .unwrap();

    let mut validator = fixed(&env, 1);
    assert!(validator.check_motion(&q(0.0), &q(1.0)));
}

#[test]
fn test_contact_distance_rejects_near_approach() {
    let env = slide(true);
    let settings = ValidatorSettings::from_toml_str("contact_distance = 0.02").unwrap();
    let mut validator = ContinuousMotionValidator::from_environment_with_settings(
        &env,
        Arc::new(FixedSegments(1)),
        &joints(),
        &settings,
    )
    .unwrap();

    // gap to the wall at the end: 0.46 - 0.43 = 0.03
    assert!(validator.check_motion(&q(0.0), &q(0.38)));
    // gap 0.01
    assert!(!validator.check_motion(&q(0.0), &q(0.40)));
}

#[test]
fn test_validation_leaves_environment_untouched() {
    let env = slide(true);
    let before = env.current_state().unwrap().clone();
    let revision = env.revision();

    let mut validator = fixed(&env, 10);
    validator.check_motion(&q(0.0), &q(1.0));
    validator.check_motion(&q(0.7), &q(0.9));

    assert_eq!(env.current_state().unwrap(), &before);
    assert_eq!(env.revision(), revision);
}

#[test]
fn test_empty_edit_changes_nothing() {
    let mut env = slide(true);
    let revision = env.revision();
    env.apply_commands(&[]).unwrap();
    assert_eq!(env.revision(), revision);

    let mut validator = fixed(&env, 10);
    let check = validator.check_motion_last_valid(&q(0.0), &q(1.0), false);
    assert_relative_eq!(check.last_valid.fraction, 0.4);
}

#[test]
fn test_forks_agree_across_threads() {
    let env = slide(true);
    let validator = fixed(&env, 10);
    let edges = [(0.0, 1.0), (0.0, 0.3), (0.9, 0.6), (1.0, 0.2)];

    let expected: Vec<MotionCheck> = edges
        .iter()
        .map(|&(a, b)| validator.fork().check_motion_last_valid(&q(a), &q(b), true))
        .collect();

    let results: Vec<Vec<MotionCheck>> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let mut fork = validator.fork();
                scope.spawn(move || {
                    edges
                        .iter()
                        .map(|&(a, b)| fork.check_motion_last_valid(&q(a), &q(b), true))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    for result in results {
        assert_eq!(result, expected);
    }
}

#[test]
fn test_forks_with_different_edges_stay_independent() {
    let env = slide(true);
    let validator = fixed(&env, 1);
    let blocked = (q(0.0), q(1.0));
    let clear = (q(0.7), q(0.9));

    std::thread::scope(|scope| {
        for thread in 0..8 {
            let mut fork = validator.fork();
            let (blocked, clear) = (&blocked, &clear);
            scope.spawn(move || {
                for i in 0..200 {
                    let hits = (thread + i) % 2 == 0;
                    let (a, b) = if hits { blocked } else { clear };
                    assert_eq!(
                        fork.check_motion(a, b),
                        !hits,
                        "thread {thread} iteration {i}"
                    );
                }
            });
        }
    });
}

#[test]
fn test_parallel_batch_matches_serial() {
    let env = slide(true);
    let mut validator = fixed(&env, 10);
    let edges: Vec<(DVector<f64>, DVector<f64>)> = (0..32)
        .map(|i| {
            let a = (i % 8) as f64 / 8.0;
            let b = ((i * 3) % 8) as f64 / 8.0;
            (q(a), q(b))
        })
        .collect();

    let parallel = validator.check_motions(&edges);
    let serial: Vec<MotionCheck> = edges
        .iter()
        .map(|(a, b)| validator.check_motion_last_valid(a, b, false))
        .collect();

    assert_eq!(parallel, serial);
    assert!(parallel.iter().any(|c| c.valid));
    assert!(parallel.iter().any(|c| !c.valid));
}
