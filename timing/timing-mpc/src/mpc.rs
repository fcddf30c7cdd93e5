//! Receding-horizon driver.
//!
//! [`TimingMpc`] owns the waypoint plan, its timing and velocities, the
//! phase controller and the warm-start cache. Each control tick the caller
//! reports the measured state and elapsed time; the driver re-optimizes the
//! remaining horizon and exposes it for spline reconstruction.

use nalgebra::DVector;
use timing_nlp::{AugmentedLagrangian, Program, Solver, SolverStatus, WarmStart};
use timing_spline::CubicSpline;
use tracing::{debug, info, warn};

use crate::config::TimingConfig;
use crate::phase::{BacktrackTable, PhaseController, PhaseState};
use crate::program::{TimingProgram, check_vector};
use crate::tangent::{Tangent, derive_next_waypoint_tangents};
use crate::{Result, TimingError};

/// Start velocities at or below this norm count as rest.
const REST_VELOCITY: f64 = 1e-9;

/// Solver state together with the program shape it belongs to.
#[derive(Debug, Clone, PartialEq)]
struct WarmCache {
    /// `(variables, features)` of the program that produced `state`.
    shape: (usize, usize),
    state: WarmStart,
}

/// Outcome of [`TimingMpc::solve`].
///
/// Always carries the best durations and velocities found, whether or not
/// they were committed.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanResult {
    /// Solver outcome.
    pub status: SolverStatus,
    /// Whether the plan was written into the driver.
    pub committed: bool,
    /// Phase the plan was computed at.
    pub phase: usize,
    /// Waypoint count the plan was computed for.
    pub len: usize,
    /// Durations of the remaining segments.
    pub durations: Vec<f64>,
    /// Velocities at the remaining waypoints (the last one is zero).
    pub velocities: Vec<DVector<f64>>,
    /// Objective at the returned point.
    pub objective: f64,
    /// Objective at the solver's starting point.
    pub initial_objective: f64,
    /// Solver iterations.
    pub iterations: usize,
    /// Whether the solver reused the cached warm start.
    pub used_warm_start: bool,
    /// Absolute index of the first non-positive or non-finite duration.
    pub rejected_duration: Option<usize>,
    warm: Option<WarmCache>,
}

impl PlanResult {
    fn empty(status: SolverStatus, phase: usize, len: usize) -> Self {
        Self {
            status,
            committed: false,
            phase,
            len,
            durations: Vec::new(),
            velocities: Vec::new(),
            objective: 0.0,
            initial_objective: 0.0,
            iterations: 0,
            used_warm_start: false,
            rejected_duration: None,
            warm: None,
        }
    }

    /// Returns `true` if the plan was committed.
    #[must_use]
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Returns `true` if the solver converged.
    #[must_use]
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Total duration of the plan.
    #[must_use]
    pub fn total_time(&self) -> f64 {
        self.durations.iter().sum()
    }
}

/// Receding-horizon timing optimizer over a waypoint plan.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use timing_mpc::{TimingConfig, TimingMpc};
///
/// let waypoints = (1..=3).map(|i| DVector::from_vec(vec![f64::from(i), 0.0])).collect();
/// let mut mpc = TimingMpc::new(waypoints, TimingConfig::default())?;
/// assert_eq!(mpc.times(), vec![1.0, 2.0, 3.0]);
///
/// let plan = mpc.solve(&DVector::zeros(2), &DVector::zeros(2), 0)?;
/// assert!(plan.durations.iter().all(|&t| t > 0.0));
///
/// mpc.update_progress_time(0.5)?;
/// let spline = mpc.cubic_spline(&DVector::from_vec(vec![0.4, 0.0]), &DVector::zeros(2))?;
/// assert_eq!(spline.num_segments(), 3);
/// # Ok::<(), timing_mpc::TimingError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TimingMpc<S = AugmentedLagrangian> {
    config: TimingConfig,
    solver: S,
    dim: usize,
    waypoints: Vec<DVector<f64>>,
    tangents: Vec<Tangent>,
    vels: Vec<DVector<f64>>,
    tau: Vec<f64>,
    controller: PhaseController,
    warm: Option<WarmCache>,
}

impl TimingMpc<AugmentedLagrangian> {
    /// Create a driver using the built-in solver configured from
    /// [`TimingConfig::solver`].
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid configuration, an empty waypoint list,
    /// inconsistent dimensions or non-finite waypoints.
    pub fn new(waypoints: Vec<DVector<f64>>, config: TimingConfig) -> Result<Self> {
        Self::with_solver(waypoints, config, AugmentedLagrangian::new(config.solver))
    }
}

impl<S: Solver> TimingMpc<S> {
    /// Create a driver with a custom solver.
    ///
    /// # Errors
    ///
    /// Same as [`TimingMpc::new`].
    pub fn with_solver(
        waypoints: Vec<DVector<f64>>,
        config: TimingConfig,
        solver: S,
    ) -> Result<Self> {
        config.validate()?;
        let first = waypoints.first().ok_or(TimingError::EmptyWaypoints)?;
        let dim = first.len();
        if dim == 0 {
            return Err(TimingError::dimension_mismatch("waypoint", 1, 0));
        }
        check_waypoints(dim, &waypoints)?;

        let n = waypoints.len();
        let mut tangents = vec![Tangent::None; n];
        if config.use_next_waypoint_tangent {
            derive_next_waypoint_tangents(&waypoints, &mut tangents, 0);
        }

        info!(waypoints = n, dim, "timing MPC initialized");

        Ok(Self {
            controller: PhaseController::new(config.tau_min, config.max_backtrack_depth),
            tau: vec![config.initial_tau; n],
            vels: vec![DVector::zeros(dim); n],
            config,
            solver,
            dim,
            waypoints,
            tangents,
            warm: None,
        })
    }

    /// Re-optimize the remaining horizon from the measured state.
    ///
    /// `verbose` selects logging detail: 0 reports only warnings, 1 adds a
    /// per-solve summary, 2 and above add solver iteration traces.
    ///
    /// The solution is committed when it converged (or hit the iteration
    /// limit with [`TimingConfig::commit_unconverged`] set) and all
    /// durations are positive. Otherwise the driver state is unchanged and
    /// the plan can be committed later with [`TimingMpc::commit_plan`].
    ///
    /// # Errors
    ///
    /// Returns an error if the start state has the wrong dimension or is not
    /// finite, or if the solver rejects the program.
    pub fn solve(
        &mut self,
        start_position: &DVector<f64>,
        start_velocity: &DVector<f64>,
        verbose: u8,
    ) -> Result<PlanResult> {
        check_vector("start position", self.dim, start_position)?;
        check_vector("start velocity", self.dim, start_velocity)?;

        let phase = self.phase();
        let len = self.len();
        if self.done() {
            if start_velocity.norm() > REST_VELOCITY {
                warn!(
                    speed = start_velocity.norm(),
                    "plan complete but not at rest"
                );
                return Ok(PlanResult::empty(SolverStatus::Infeasible, phase, len));
            }
            return Ok(PlanResult::empty(SolverStatus::Converged, phase, len));
        }

        let program = self.program(start_position, start_velocity)?;
        let shape = (program.dimension(), program.feature_types().len());
        let warm_start = self
            .warm
            .as_ref()
            .filter(|w| self.config.warm_starting && w.shape == shape)
            .map(|w| &w.state);
        let initial_objective = program.objective(&program.initial_point());

        self.solver.set_verbose(verbose);
        let ret = self.solver.solve(&program, warm_start)?;

        let (durations, velocities) = program.unpack(&ret.x);
        let rejected_duration = durations
            .iter()
            .position(|t| !(t.is_finite() && *t > 0.0))
            .map(|i| phase + i);

        let mut plan = PlanResult {
            status: ret.status,
            committed: false,
            phase,
            len,
            durations,
            velocities,
            objective: ret.objective,
            initial_objective,
            iterations: ret.iterations,
            used_warm_start: ret.used_warm_start,
            rejected_duration,
            warm: Some(WarmCache {
                shape,
                state: ret.warm_start(),
            }),
        };

        let accept = match ret.status {
            SolverStatus::Converged => true,
            SolverStatus::IterationLimit => self.config.commit_unconverged,
            SolverStatus::Infeasible => false,
        };

        if let Some(index) = rejected_duration {
            warn!(index, "solution has a degenerate duration; not committed");
        } else if accept {
            self.write_plan(&plan);
            plan.committed = true;
        }

        if ret.status == SolverStatus::Infeasible {
            warn!(
                phase,
                inequality_violation = ret.inequality_violation,
                equality_violation = ret.equality_violation,
                "timing program infeasible"
            );
            self.warm = None;
        }

        if verbose >= 1 {
            info!(
                status = ?ret.status,
                committed = plan.committed,
                phase,
                segments = plan.durations.len(),
                total_time = plan.total_time(),
                objective = plan.objective,
                initial_objective,
                iterations = plan.iterations,
                warm = plan.used_warm_start,
                "timing solve"
            );
        }

        Ok(plan)
    }

    /// Commit a plan returned by [`TimingMpc::solve`] that was not committed
    /// automatically.
    ///
    /// # Errors
    ///
    /// - [`TimingError::StalePlan`] if the horizon changed since the plan was
    ///   computed
    /// - [`TimingError::DegenerateDuration`] if a duration is not positive
    /// - [`TimingError::LengthMismatch`] or [`TimingError::DimensionMismatch`]
    ///   if the plan was altered into an inconsistent shape
    pub fn commit_plan(&mut self, plan: &PlanResult) -> Result<()> {
        if plan.phase != self.phase() || plan.len != self.len() {
            return Err(TimingError::StalePlan {
                plan_phase: plan.phase,
                plan_len: plan.len,
                phase: self.phase(),
                len: self.len(),
            });
        }

        let remaining = self.remaining();
        if plan.durations.len() != remaining {
            return Err(TimingError::length_mismatch(
                "durations",
                remaining,
                plan.durations.len(),
            ));
        }
        if plan.velocities.len() != remaining {
            return Err(TimingError::length_mismatch(
                "velocities",
                remaining,
                plan.velocities.len(),
            ));
        }
        for v in &plan.velocities {
            check_vector("velocity", self.dim, v)?;
        }
        if let Some((i, &value)) = plan
            .durations
            .iter()
            .enumerate()
            .find(|(_, t)| !(t.is_finite() && **t > 0.0))
        {
            return Err(TimingError::DegenerateDuration {
                index: plan.phase + i,
                value,
            });
        }

        self.write_plan(plan);
        debug!(phase = plan.phase, status = ?plan.status, "plan committed");
        Ok(())
    }

    /// Returns `true` once every waypoint is consumed.
    #[must_use]
    pub fn done(&self) -> bool {
        self.phase() >= self.len()
    }

    /// Remaining waypoints.
    #[must_use]
    pub fn waypoints(&self) -> Vec<DVector<f64>> {
        self.waypoints[self.phase()..].to_vec()
    }

    /// Arrival time at each remaining waypoint, measured from now.
    #[must_use]
    pub fn times(&self) -> Vec<f64> {
        self.durations()
            .iter()
            .scan(0.0, |elapsed, t| {
                *elapsed += t;
                Some(*elapsed)
            })
            .collect()
    }

    /// Velocities at the remaining waypoints.
    #[must_use]
    pub fn vels(&self) -> Vec<DVector<f64>> {
        self.vels[self.phase()..].to_vec()
    }

    /// Durations of the remaining segments.
    #[must_use]
    pub fn durations(&self) -> &[f64] {
        &self.tau[self.phase()..]
    }

    /// Tangent directions at the remaining waypoints.
    #[must_use]
    pub fn tangents(&self) -> Vec<Option<DVector<f64>>> {
        self.tangents[self.phase()..]
            .iter()
            .map(|t| t.direction().cloned())
            .collect()
    }

    /// Tangent slots at the remaining waypoints, including their origin.
    #[must_use]
    pub fn tangent_slots(&self) -> &[Tangent] {
        &self.tangents[self.phase()..]
    }

    /// Reconstruct the remaining plan as a cubic spline starting from the
    /// given state.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::PlanComplete`] when done, or a spline error if
    /// the start state does not match the plan's dimension.
    pub fn cubic_spline(
        &self,
        start_position: &DVector<f64>,
        start_velocity: &DVector<f64>,
    ) -> Result<CubicSpline> {
        if self.done() {
            return Err(TimingError::PlanComplete);
        }
        let phase = self.phase();
        let spline = CubicSpline::build(
            &self.waypoints[phase..],
            &self.tangents(),
            &self.tau[phase..],
            &self.vels[phase..],
            start_position,
            start_velocity,
        )?;
        Ok(spline)
    }

    /// Advance the plan by `gap` seconds of elapsed time.
    ///
    /// Returns the number of waypoints consumed.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::InvalidGap`] for a negative or non-finite gap.
    pub fn update_progress_time(&mut self, gap: f64) -> Result<usize> {
        let consumed = self.controller.progress(&mut self.tau, gap)?;
        if consumed > 0 {
            self.invalidate();
        }
        Ok(consumed)
    }

    /// Undo the most recent waypoint advance.
    ///
    /// Returns the restored phase.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::BacktrackUnderflow`] if there is nothing to
    /// undo.
    pub fn update_backtrack(&mut self) -> Result<usize> {
        let entry = self.controller.backtrack(&mut self.tau)?;
        self.invalidate();
        Ok(entry.phase)
    }

    /// Jump to `phase_to`.
    ///
    /// # Errors
    ///
    /// Returns [`TimingError::PhaseOutOfRange`] if `phase_to` exceeds the
    /// waypoint count.
    pub fn update_set_phase(&mut self, phase_to: usize) -> Result<()> {
        self.controller.set_phase(phase_to, self.len())?;
        self.invalidate();
        debug!(phase = phase_to, "phase set");
        Ok(())
    }

    /// Replace the remaining waypoints.
    ///
    /// Durations of segments that still exist are kept as the initial
    /// guess; new segments start at [`TimingConfig::initial_tau`].
    /// Velocities of the new suffix are zeroed and its tangents cleared,
    /// then derived from the next waypoint when `set_next_tangent` is set.
    /// A later [`update_backtrack`](Self::update_backtrack) restores the
    /// consumed segment only; the new suffix keeps its durations.
    ///
    /// # Errors
    ///
    /// Returns an error for inconsistent dimensions or non-finite values;
    /// the plan is left unchanged.
    pub fn update_waypoints(
        &mut self,
        waypoints: Vec<DVector<f64>>,
        set_next_tangent: bool,
    ) -> Result<()> {
        check_waypoints(self.dim, &waypoints)?;

        let phase = self.phase();
        let n = phase + waypoints.len();

        self.waypoints.truncate(phase);
        self.waypoints.extend(waypoints);
        self.tau.resize(n, self.config.initial_tau);
        self.vels.truncate(phase);
        self.vels.resize(n, DVector::zeros(self.dim));
        self.tangents.truncate(phase);
        self.tangents.resize(n, Tangent::None);
        if set_next_tangent {
            derive_next_waypoint_tangents(&self.waypoints, &mut self.tangents, phase);
        }
        self.controller.detach_suffix();
        self.invalidate();

        info!(phase, waypoints = n, "waypoints updated");
        Ok(())
    }

    /// Set manual tangents for the remaining waypoints.
    ///
    /// `Some` entries override the slot (a zero vector clears it); `None`
    /// entries keep the current tangent.
    ///
    /// # Errors
    ///
    /// Returns an error if the length does not match the remaining waypoint
    /// count or a tangent is malformed.
    pub fn update_tangents(&mut self, tangents: &[Option<DVector<f64>>]) -> Result<()> {
        let remaining = self.remaining();
        if tangents.len() != remaining {
            return Err(TimingError::length_mismatch(
                "tangents",
                remaining,
                tangents.len(),
            ));
        }
        for t in tangents.iter().flatten() {
            check_vector("tangent", self.dim, t)?;
        }

        let phase = self.phase();
        for (slot, t) in self.tangents[phase..].iter_mut().zip(tangents) {
            if let Some(t) = t {
                *slot = Tangent::manual(t);
            }
        }
        self.invalidate();
        Ok(())
    }

    /// Current phase.
    #[must_use]
    pub fn phase(&self) -> usize {
        self.controller.phase()
    }

    /// Total number of waypoints, consumed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Returns `true` if the plan has no waypoints at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Number of unconsumed waypoints.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.len().saturating_sub(self.phase())
    }

    /// Configuration-space dimension.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    /// Execution state.
    #[must_use]
    pub fn phase_state(&self) -> PhaseState {
        self.controller.state(self.len())
    }

    /// Number of advances that can be undone.
    #[must_use]
    pub fn backtrack_depth(&self) -> usize {
        self.controller.table().len()
    }

    /// Undo records, oldest first.
    #[must_use]
    pub fn backtrack_table(&self) -> &BacktrackTable {
        self.controller.table()
    }

    /// Returns `true` if the next solve may reuse solver state.
    #[must_use]
    pub fn has_warm_start(&self) -> bool {
        self.warm.is_some()
    }

    /// Discard cached solver state.
    pub fn reset_warm_start(&mut self) {
        self.warm = None;
    }

    /// The solver.
    #[must_use]
    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Mutable access to the solver.
    pub fn solver_mut(&mut self) -> &mut S {
        &mut self.solver
    }

    fn program(
        &self,
        start_position: &DVector<f64>,
        start_velocity: &DVector<f64>,
    ) -> Result<TimingProgram> {
        let phase = self.phase();
        let program = TimingProgram::new(
            self.waypoints[phase..].to_vec(),
            start_position.clone(),
            start_velocity.clone(),
        )?
        .with_tangents(self.tangents())?
        .with_durations(self.tau[phase..].to_vec())?
        .with_velocities(self.vels[phase..].to_vec())?
        .with_costs(self.config.time_cost, self.config.ctrl_cost)
        .with_tau_min(self.config.tau_min)
        .with_optimize_velocities(self.config.optimize_velocities);
        Ok(program)
    }

    fn write_plan(&mut self, plan: &PlanResult) {
        let phase = plan.phase;
        for (dst, src) in self.tau[phase..].iter_mut().zip(&plan.durations) {
            *dst = *src;
        }
        for (dst, src) in self.vels[phase..].iter_mut().zip(&plan.velocities) {
            dst.copy_from(src);
        }
        if self.config.warm_starting {
            if let Some(warm) = &plan.warm {
                self.warm = Some(warm.clone());
            }
        }
    }

    /// Horizon changed: cached duals no longer apply.
    fn invalidate(&mut self) {
        self.warm = None;
    }
}

fn check_waypoints(dim: usize, waypoints: &[DVector<f64>]) -> Result<()> {
    waypoints
        .iter()
        .try_for_each(|w| check_vector("waypoint", dim, w))
}
