//! Solver capability: the contract any optimization back-end fulfils.

use nalgebra::DVector;

use crate::{Program, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverStatus {
    /// Stationary point found with all constraints within tolerance.
    Converged,
    /// Iteration budget exhausted; the returned point is feasible but not
    /// known to be optimal.
    IterationLimit,
    /// The returned point violates constraints beyond tolerance.
    Infeasible,
}

impl SolverStatus {
    /// Returns `true` for [`SolverStatus::Converged`].
    #[must_use]
    pub const fn is_converged(self) -> bool {
        matches!(self, Self::Converged)
    }

    /// Returns `true` unless the result is infeasible.
    #[must_use]
    pub const fn is_feasible(self) -> bool {
        !matches!(self, Self::Infeasible)
    }
}

/// Solver-internal state carried from one solve to the next.
///
/// Only meaningful for a program with the same feature layout; solvers
/// ignore a warm start whose dual length does not match.
#[derive(Debug, Clone, PartialEq)]
pub struct WarmStart {
    /// Dual values, one per feature (zero for non-constraint features).
    pub dual: DVector<f64>,
    /// Penalty weight reached by the previous solve.
    pub penalty: f64,
}

/// Result of a solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverReturn {
    /// Outcome classification.
    pub status: SolverStatus,
    /// Solution point (best point found when not converged).
    pub x: DVector<f64>,
    /// Dual values, one per feature.
    pub dual: DVector<f64>,
    /// Penalty weight at termination.
    pub penalty: f64,
    /// Objective value at `x`.
    pub objective: f64,
    /// Largest inequality violation at `x`.
    pub inequality_violation: f64,
    /// Largest equality violation at `x`.
    pub equality_violation: f64,
    /// Inner iterations used.
    pub iterations: usize,
    /// Program evaluations used.
    pub evaluations: usize,
    /// Whether the supplied warm start was applied.
    pub used_warm_start: bool,
}

impl SolverReturn {
    /// State to pass to the next solve of a same-shaped program.
    #[must_use]
    pub fn warm_start(&self) -> WarmStart {
        WarmStart {
            dual: self.dual.clone(),
            penalty: self.penalty,
        }
    }
}

/// A nonlinear program solver.
///
/// Implementations must be deterministic for a given program, options and
/// warm start, and must not retain references to the program.
pub trait Solver {
    /// Solve `program`, optionally continuing from `warm_start`.
    ///
    /// # Errors
    ///
    /// Returns an error when the program is malformed (inconsistent sizes,
    /// non-finite values at the initial point). Non-convergence and
    /// infeasibility are reported through [`SolverReturn::status`].
    fn solve(
        &mut self,
        program: &dyn Program,
        warm_start: Option<&WarmStart>,
    ) -> Result<SolverReturn>;

    /// Set the logging detail for subsequent solves
    /// (0 = silent, 1 = summary, 2 or more = per-iteration traces).
    ///
    /// The default implementation ignores the request.
    fn set_verbose(&mut self, _verbose: u8) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_predicates() {
        assert!(SolverStatus::Converged.is_converged());
        assert!(SolverStatus::Converged.is_feasible());
        assert!(!SolverStatus::IterationLimit.is_converged());
        assert!(SolverStatus::IterationLimit.is_feasible());
        assert!(!SolverStatus::Infeasible.is_feasible());
    }

    #[test]
    fn test_warm_start_copies_duals() {
        let ret = SolverReturn {
            status: SolverStatus::Converged,
            x: DVector::zeros(1),
            dual: DVector::from_vec(vec![0.0, 1.5]),
            penalty: 100.0,
            objective: 0.0,
            inequality_violation: 0.0,
            equality_violation: 0.0,
            iterations: 3,
            evaluations: 5,
            used_warm_start: false,
        };
        let warm = ret.warm_start();
        assert_eq!(warm.dual, ret.dual);
        assert_eq!(warm.penalty, 100.0);
    }
}
