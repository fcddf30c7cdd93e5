//! Time-parameterized cubic splines for trajectory execution.
//!
//! This crate reconstructs a continuous motion from a timed waypoint plan:
//!
//! - [`HermiteSegment`] - One cubic segment matching position and velocity at
//!   both ends over a fixed duration
//! - [`CubicSpline`] - A C1-continuous chain of Hermite segments, one per
//!   waypoint, starting from a measured state
//!
//! Splines are parameterized by **time**, not by a normalized `t ∈ [0, 1]`.
//! Derivatives are physical velocity and acceleration.
//!
//! # Example
//!
//! ```
//! use nalgebra::DVector;
//! use timing_spline::CubicSpline;
//!
//! let waypoints = vec![
//!     DVector::from_vec(vec![1.0, 0.0]),
//!     DVector::from_vec(vec![2.0, 1.0]),
//! ];
//! let velocities = vec![
//!     DVector::from_vec(vec![1.0, 0.5]),
//!     DVector::zeros(2),
//! ];
//!
//! let spline = CubicSpline::build(
//!     &waypoints,
//!     &[],
//!     &[1.0, 2.0],
//!     &velocities,
//!     &DVector::zeros(2),
//!     &DVector::zeros(2),
//! )?;
//!
//! let mid = spline.sample(1.5);
//! assert_eq!(mid.position.len(), 2);
//! # Ok::<(), timing_spline::SplineError>(())
//! ```
//!
//! # Layer 0 Crate
//!
//! Pure math, no I/O and no logging. Construction is the only fallible
//! operation; evaluation clamps out-of-range times.

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
    clippy::doc_markdown
)]

mod error;
mod segment;
mod spline;

pub use error::SplineError;
pub use segment::HermiteSegment;
pub use spline::{CubicSpline, SplineSample};

/// Result type for spline construction.
pub type Result<T> = std::result::Result<T, SplineError>;
