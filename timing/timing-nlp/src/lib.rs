//! Nonlinear program capability for trajectory timing.
//!
//! This crate defines the seam between optimization formulations and the
//! engines that solve them:
//!
//! - [`Program`] - Features `φ(x)` with [`FeatureType`]s, box bounds and
//!   dense Jacobians at any trial point
//! - [`Solver`] - Anything that turns a program (plus an optional
//!   [`WarmStart`]) into a [`SolverReturn`]
//! - [`AugmentedLagrangian`] - A small dense reference solver
//! - [`check_jacobian`] - Finite-difference check for program authors
//!
//! Formulations depend only on [`Program`]; drivers depend only on
//! [`Solver`]. Any back-end satisfying the trait can be swapped in.
//!
//! # Example
//!
//! ```
//! use nalgebra::{DMatrix, DVector};
//! use timing_nlp::{AugmentedLagrangian, Evaluation, FeatureType, Program, Solver};
//!
//! /// minimize (x - 2)²
//! struct Shift;
//!
//! impl Program for Shift {
//!     fn dimension(&self) -> usize { 1 }
//!     fn feature_types(&self) -> Vec<FeatureType> { vec![FeatureType::SumOfSquares] }
//!     fn initial_point(&self) -> DVector<f64> { DVector::zeros(1) }
//!     fn evaluate(&self, x: &DVector<f64>) -> Evaluation {
//!         Evaluation {
//!             values: DVector::from_element(1, x[0] - 2.0),
//!             jacobian: DMatrix::from_element(1, 1, 1.0),
//!         }
//!     }
//! }
//!
//! let mut solver = AugmentedLagrangian::default();
//! let ret = solver.solve(&Shift, None)?;
//! assert!(ret.status.is_converged());
//! assert!((ret.x[0] - 2.0).abs() < 1e-5);
//! # Ok::<(), timing_nlp::NlpError>(())
//! ```

#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::many_single_char_names,
    clippy::similar_names,
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::suboptimal_flops,
    clippy::module_name_repetitions,
    clippy::needless_range_loop,
    clippy::nonminimal_bool,
    clippy::doc_markdown
)]

mod augmented_lagrangian;
mod check;
mod error;
mod program;
mod solver;

pub use augmented_lagrangian::{AugmentedLagrangian, SolverOptions};
pub use check::{JacobianCheck, check_jacobian};
pub use error::NlpError;
pub use program::{Evaluation, FeatureType, Program};
pub use solver::{Solver, SolverReturn, SolverStatus, WarmStart};

/// Result type for solver operations.
pub type Result<T> = std::result::Result<T, NlpError>;
