//! Receding-horizon timing optimization along waypoint paths.
//!
//! An upstream planner supplies a sequence of waypoints. This crate decides
//! how long to spend on each segment and how fast to pass each waypoint,
//! then keeps that timing current while the path executes:
//!
//! - [`TimingMpc`] - The driver: solves the remaining horizon each control
//!   tick, consumes elapsed time, splices in revised waypoints and undoes
//!   advances on request
//! - [`TimingProgram`] - The nonlinear program over durations and waypoint
//!   velocities, minimizing `timeCost·Σ τ + ctrlCost·∫‖acc‖²`
//! - [`PhaseController`] - Phase bookkeeping and the [`BacktrackTable`]
//! - [`Tangent`] - Direction constraints at waypoints, manual or derived
//! - [`TimingConfig`] - Costs, bounds, warm starting and solver options
//!
//! The optimizer itself is pluggable through [`timing_nlp::Solver`]; the
//! built-in [`AugmentedLagrangian`] is used by default.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use timing_mpc::{TimingConfig, TimingMpc};
//!
//! let waypoints = vec![
//!     DVector::from_vec(vec![1.0, 0.0]),
//!     DVector::from_vec(vec![1.0, 1.0]),
//!     DVector::from_vec(vec![2.0, 1.0]),
//! ];
//! let mut mpc = TimingMpc::new(waypoints, TimingConfig::realtime())?;
//!
//! let mut position = DVector::zeros(2);
//! let mut velocity = DVector::zeros(2);
//! let dt = 0.1;
//!
//! for _ in 0..5 {
//!     mpc.solve(&position, &velocity, 0)?;
//!     let spline = mpc.cubic_spline(&position, &velocity)?;
//!     position = spline.position(dt);
//!     velocity = spline.velocity(dt);
//!     mpc.update_progress_time(dt)?;
//! }
//!
//! assert!(!mpc.done());
//! assert!(mpc.times()[0] > 0.0);
//! # Ok::<(), timing_mpc::TimingError>(())
//! ```
//!
//! # Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.
//! Warnings (infeasible solves, rejected plans) are always emitted; solve
//! summaries and solver traces depend on the `verbose` argument of
//! [`TimingMpc::solve`].

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::suboptimal_flops,
    clippy::cast_precision_loss,
    clippy::module_name_repetitions,
    clippy::needless_range_loop,
    clippy::nonminimal_bool,
    clippy::doc_markdown
)]

mod config;
mod error;
mod mpc;
mod phase;
mod program;
mod tangent;

pub use config::TimingConfig;
pub use error::TimingError;
pub use mpc::{PlanResult, TimingMpc};
pub use phase::{BacktrackEntry, BacktrackTable, PhaseController, PhaseState};
pub use program::TimingProgram;
pub use tangent::{Tangent, derive_next_waypoint_tangents, direction_between};

pub use timing_nlp::{AugmentedLagrangian, SolverOptions, SolverStatus};
pub use timing_spline::CubicSpline;

/// Result type for timing operations.
pub type Result<T> = std::result::Result<T, TimingError>;
