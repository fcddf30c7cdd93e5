//! Error types for program evaluation and solving.

use thiserror::Error;

/// Errors raised by the solver capability.
///
/// Solve outcomes such as non-convergence are not errors; they are reported
/// through [`SolverStatus`](crate::SolverStatus). These variants cover
/// programs and options that cannot be solved at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NlpError {
    /// A program reported arrays of inconsistent size.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which array is wrong.
        what: &'static str,
        /// Expected size.
        expected: usize,
        /// Actual size.
        actual: usize,
    },

    /// The program produced NaN or infinite values at the initial point.
    #[error("non-finite {what} at the initial point")]
    NonFiniteEvaluation {
        /// Which quantity was not finite.
        what: &'static str,
    },

    /// Solver options are out of range.
    #[error("invalid solver options: {0}")]
    InvalidOptions(&'static str),
}

impl NlpError {
    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Check if this is a dimension mismatch error.
    #[must_use]
    pub fn is_dimension_mismatch(&self) -> bool {
        matches!(self, Self::DimensionMismatch { .. })
    }
}
