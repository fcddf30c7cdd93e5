//! Configuration for the timing MPC.
//!
//! # Example
//!
//! ```
//! use timing_mpc::TimingConfig;
//!
//! let config = TimingConfig::realtime()
//!     .with_costs(1.0, 0.5)
//!     .with_tau_min(0.02)
//!     .with_next_waypoint_tangent(false);
//!
//! assert!(config.validate().is_ok());
//! ```

use timing_nlp::SolverOptions;

use crate::{Result, TimingError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for [`TimingMpc`](crate::TimingMpc).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TimingConfig {
    /// Weight of the total duration in the objective.
    pub time_cost: f64,

    /// Weight of the integrated squared acceleration in the objective.
    pub ctrl_cost: f64,

    /// Lower bound on every segment duration (s). Must be positive.
    pub tau_min: f64,

    /// Duration assigned to each segment before the first solve (s).
    pub initial_tau: f64,

    /// Derive a tangent at each waypoint from the direction to its successor.
    pub use_next_waypoint_tangent: bool,

    /// Optimize waypoint velocities along with durations.
    /// When disabled the current velocities are held fixed.
    pub optimize_velocities: bool,

    /// Reuse solver duals from the previous solve when the horizon is unchanged.
    pub warm_starting: bool,

    /// Commit solutions that hit the iteration budget without converging.
    pub commit_unconverged: bool,

    /// Maximum number of phase advances that can be undone.
    /// `None` keeps every advance.
    pub max_backtrack_depth: Option<usize>,

    /// Options passed to the default solver.
    pub solver: SolverOptions,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            time_cost: 1.0,
            ctrl_cost: 1.0,
            tau_min: 0.05,
            initial_tau: 1.0,
            use_next_waypoint_tangent: true,
            optimize_velocities: true,
            warm_starting: true,
            commit_unconverged: false,
            max_backtrack_depth: Some(64),
            solver: SolverOptions::default(),
        }
    }
}

impl TimingConfig {
    /// Configuration for a control loop: bounded solver budget, and plans
    /// that ran out of iterations are still committed.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            commit_unconverged: true,
            solver: SolverOptions::realtime(),
            ..Self::default()
        }
    }

    /// Configuration for offline planning with tight tolerances.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            solver: SolverOptions::high_accuracy(),
            ..Self::default()
        }
    }

    /// Set the time and control cost weights.
    #[must_use]
    pub const fn with_costs(mut self, time_cost: f64, ctrl_cost: f64) -> Self {
        self.time_cost = time_cost;
        self.ctrl_cost = ctrl_cost;
        self
    }

    /// Set the minimum segment duration.
    #[must_use]
    pub const fn with_tau_min(mut self, tau_min: f64) -> Self {
        self.tau_min = tau_min;
        self
    }

    /// Set the initial segment duration.
    #[must_use]
    pub const fn with_initial_tau(mut self, initial_tau: f64) -> Self {
        self.initial_tau = initial_tau;
        self
    }

    /// Enable or disable automatic tangent derivation.
    #[must_use]
    pub const fn with_next_waypoint_tangent(mut self, enabled: bool) -> Self {
        self.use_next_waypoint_tangent = enabled;
        self
    }

    /// Enable or disable velocity optimization.
    #[must_use]
    pub const fn with_optimize_velocities(mut self, enabled: bool) -> Self {
        self.optimize_velocities = enabled;
        self
    }

    /// Enable or disable warm starting.
    #[must_use]
    pub const fn with_warm_starting(mut self, enabled: bool) -> Self {
        self.warm_starting = enabled;
        self
    }

    /// Set whether unconverged solutions are committed.
    #[must_use]
    pub const fn with_commit_unconverged(mut self, enabled: bool) -> Self {
        self.commit_unconverged = enabled;
        self
    }

    /// Set the maximum backtracking depth.
    #[must_use]
    pub const fn with_max_backtrack_depth(mut self, depth: usize) -> Self {
        self.max_backtrack_depth = Some(depth);
        self
    }

    /// Keep every phase advance in the backtracking table.
    #[must_use]
    pub const fn with_unbounded_backtracking(mut self) -> Self {
        self.max_backtrack_depth = None;
        self
    }

    /// Set the solver options.
    #[must_use]
    pub const fn with_solver(mut self, solver: SolverOptions) -> Self {
        self.solver = solver;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidConfig`] if a value is out of range, or
    /// [`TimingError::Solver`] if the solver options are invalid.
    pub fn validate(&self) -> Result<()> {
        if !(self.time_cost.is_finite() && self.time_cost >= 0.0) {
            return Err(TimingError::InvalidConfig(
                "time_cost must be finite and non-negative",
            ));
        }
        if !(self.ctrl_cost.is_finite() && self.ctrl_cost >= 0.0) {
            return Err(TimingError::InvalidConfig(
                "ctrl_cost must be finite and non-negative",
            ));
        }
        if !(self.tau_min.is_finite() && self.tau_min > 0.0) {
            return Err(TimingError::InvalidConfig(
                "tau_min must be finite and positive",
            ));
        }
        if !(self.initial_tau.is_finite() && self.initial_tau >= self.tau_min) {
            return Err(TimingError::InvalidConfig(
                "initial_tau must be finite and at least tau_min",
            ));
        }
        if self.max_backtrack_depth == Some(0) {
            return Err(TimingError::InvalidConfig(
                "max_backtrack_depth must be at least 1",
            ));
        }
        self.solver.validate()?;
        Ok(())
    }
}
