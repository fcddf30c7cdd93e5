//! Error types for the timing MPC.

use thiserror::Error;
use timing_nlp::NlpError;
use timing_spline::SplineError;

/// Errors returned by [`TimingMpc`](crate::TimingMpc) and its components.
///
/// Solver outcomes (non-convergence, infeasibility, rejected durations) are
/// not errors; they are reported through [`PlanResult`](crate::PlanResult).
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TimingError {
    /// A plan needs at least one waypoint.
    #[error("waypoint sequence is empty")]
    EmptyWaypoints,

    /// A vector does not match the configuration-space dimension.
    #[error("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which input is wrong.
        what: &'static str,
        /// Configuration-space dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// Parallel arrays disagree in length.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Which array is wrong.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// An input contains NaN or infinite values.
    #[error("non-finite value in {0}")]
    NonFinite(&'static str),

    /// A progress gap is negative or not finite.
    #[error("invalid time gap {0} (must be finite and non-negative)")]
    InvalidGap(f64),

    /// Backtracking was requested with no recorded phase advance.
    #[error("backtracking table is empty")]
    BacktrackUnderflow,

    /// A phase beyond the waypoint count was requested.
    #[error("phase {phase} is out of range for {len} waypoints")]
    PhaseOutOfRange {
        /// Requested phase.
        phase: usize,
        /// Waypoint count.
        len: usize,
    },

    /// All waypoints are consumed.
    #[error("plan is complete; no waypoints remain")]
    PlanComplete,

    /// A plan no longer matches the horizon it was computed for.
    #[error("stale plan: computed for phase {plan_phase} with {plan_len} waypoints, now at phase {phase} with {len}")]
    StalePlan {
        /// Phase the plan was computed at.
        plan_phase: usize,
        /// Waypoint count the plan was computed for.
        plan_len: usize,
        /// Current phase.
        phase: usize,
        /// Current waypoint count.
        len: usize,
    },

    /// A duration is zero, negative, or not finite.
    #[error("degenerate duration at segment {index}: {value}")]
    DegenerateDuration {
        /// Absolute segment index.
        index: usize,
        /// The offending duration.
        value: f64,
    },

    /// Configuration value out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    /// Spline construction failed.
    #[error("spline construction failed: {0}")]
    Spline(#[from] SplineError),

    /// The solver rejected the program.
    #[error("solver error: {0}")]
    Solver(#[from] NlpError),
}

impl TimingError {
    /// Create a dimension mismatch error.
    #[must_use]
    pub fn dimension_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::DimensionMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Check if this error reports inconsistent input shapes.
    #[must_use]
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::EmptyWaypoints
                | Self::DimensionMismatch { .. }
                | Self::LengthMismatch { .. }
                | Self::NonFinite(_)
        )
    }

    /// Check if this is a backtrack underflow.
    #[must_use]
    pub fn is_backtrack_underflow(&self) -> bool {
        matches!(self, Self::BacktrackUnderflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TimingError::PhaseOutOfRange { phase: 5, len: 3 };
        assert!(err.to_string().contains("phase 5"));
        assert!(err.to_string().contains("3 waypoints"));

        let err = TimingError::dimension_mismatch("start position", 2, 3);
        assert!(err.to_string().contains("start position"));
    }

    #[test]
    fn test_error_predicates() {
        assert!(TimingError::EmptyWaypoints.is_structural());
        assert!(TimingError::length_mismatch("tangents", 3, 2).is_structural());
        assert!(!TimingError::BacktrackUnderflow.is_structural());
        assert!(TimingError::BacktrackUnderflow.is_backtrack_underflow());
    }

    #[test]
    fn test_error_conversions() {
        let err: TimingError = SplineError::Empty.into();
        assert!(matches!(err, TimingError::Spline(SplineError::Empty)));

        let err: TimingError = NlpError::InvalidOptions("bad").into();
        assert!(matches!(err, TimingError::Solver(_)));
    }
}
