#![warn(missing_docs)]

//! Continuous motion validation for sampling-based planners.
//!
//! A planner hands the [`ContinuousMotionValidator`] pairs of joint-space
//! states. Each edge is split into sub-segments by its [`StateSpace`] and
//! every sub-segment is checked as a swept motion of the manipulator links,
//! so obstacles thinner than the sampling step are still found.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use kinesweep_environment::Environment;
//! use kinesweep_kinematics::StateSolverKind;
//! use kinesweep_planning::{ContinuousMotionValidator, RealVectorStateSpace};
//! use nalgebra::DVector;
//!
//! # fn run(graph: kinesweep_ir::SceneGraph) -> kinesweep_planning::Result<()> {
//! let env = Environment::new(graph, StateSolverKind::Tree)?;
//! let joints = env.joint_names()?.to_vec();
//! let space = Arc::new(RealVectorStateSpace::from_environment(&env, &joints)?);
//! let mut validator = ContinuousMotionValidator::from_environment(&env, space, &joints)?;
//!
//! let a = DVector::zeros(joints.len());
//! let b = DVector::from_element(joints.len(), 0.5);
//! let check = validator.check_motion_last_valid(&a, &b, true);
//! println!("valid: {}, free up to {}", check.valid, check.last_valid.fraction);
//! # Ok(())
//! # }
//! ```

mod error;
mod settings;
mod state_space;
mod validator;

pub use error::{PlanningError, Result};
pub use settings::ValidatorSettings;
pub use state_space::{Bounds, RealVectorStateSpace, StateSpace};
pub use validator::{ContinuousMotionValidator, LastValid, MotionCheck};
