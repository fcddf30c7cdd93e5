//! Timing program: the nonlinear program over the remaining horizon.
//!
//! For `K` remaining waypoints in dimension `d`, the decision vector is
//!
//! ```text
//! x = [τ_0, …, τ_{K-1}, v_0, …, v_{K-2}]
//! ```
//!
//! where `τ_i` is the duration of the segment ending at waypoint `i` and
//! `v_j` the velocity at waypoint `j` (the last waypoint is reached at rest).
//! Segment `i` is the cubic Hermite curve from `(p_{i-1}, v_{i-1})` to
//! `(p_i, v_i)`, with `(p_{-1}, v_{-1})` the measured start state. Adjacent
//! segments share the velocity variable at their common waypoint, so the
//! curve is C1 by construction.
//!
//! Features, in order:
//!
//! | Rows | Type | Value |
//! |------|------|-------|
//! | `K` | objective | `timeCost·τ_i` |
//! | `2dK` | sum of squares | `√(12c)·τ^{-3/2}·(p1 − p0 − τ/2·(v0 + v1))`, `√c·τ^{-1/2}·(v1 − v0)` |
//! | `K` | inequality | `τ_min − τ_i` |
//! | `d` per tangent | equality | `(I − t tᵀ)·v_j` |
//!
//! The squared sum-of-squares rows of a segment equal `c·∫‖acc‖²` of its
//! Hermite cubic.

use nalgebra::{DMatrix, DVector};
use timing_nlp::{Evaluation, FeatureType, Program};

use crate::{Result, TimingError};

/// Nonlinear program over the durations and velocities of a horizon.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use timing_mpc::TimingProgram;
/// use timing_nlp::{AugmentedLagrangian, Program, Solver};
///
/// let waypoints = vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])];
/// let program = TimingProgram::new(waypoints, DVector::zeros(1), DVector::zeros(1))?
///     .with_costs(1.0, 1.0);
///
/// let ret = AugmentedLagrangian::default().solve(&program, None)?;
/// let (durations, velocities) = program.unpack(&ret.x);
/// assert_eq!(durations.len(), 2);
/// assert_eq!(velocities[1][0], 0.0);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug, Clone)]
pub struct TimingProgram {
    waypoints: Vec<DVector<f64>>,
    tangents: Vec<Option<DVector<f64>>>,
    durations: Vec<f64>,
    velocities: Vec<DVector<f64>>,
    start_position: DVector<f64>,
    start_velocity: DVector<f64>,
    time_cost: f64,
    ctrl_cost: f64,
    tau_min: f64,
    optimize_velocities: bool,
}

impl TimingProgram {
    /// Create a program through `waypoints` starting from the measured state.
    ///
    /// Durations default to `1.0`, velocities to zero, no tangents, unit
    /// costs and `tau_min = 0.05`.
    ///
    /// # Errors
    ///
    /// Returns an error for an empty waypoint list, inconsistent dimensions,
    /// or non-finite input.
    pub fn new(
        waypoints: Vec<DVector<f64>>,
        start_position: DVector<f64>,
        start_velocity: DVector<f64>,
    ) -> Result<Self> {
        if waypoints.is_empty() {
            return Err(TimingError::EmptyWaypoints);
        }
        let dim = start_position.len();
        check_vector("start position", dim, &start_position)?;
        check_vector("start velocity", dim, &start_velocity)?;
        for w in &waypoints {
            check_vector("waypoint", dim, w)?;
        }

        let k = waypoints.len();
        Ok(Self {
            tangents: vec![None; k],
            durations: vec![1.0; k],
            velocities: vec![DVector::zeros(dim); k],
            waypoints,
            start_position,
            start_velocity,
            time_cost: 1.0,
            ctrl_cost: 1.0,
            tau_min: 0.05,
            optimize_velocities: true,
        })
    }

    /// Set unit tangents, one slot per waypoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the length or a dimension does not match.
    pub fn with_tangents(mut self, tangents: Vec<Option<DVector<f64>>>) -> Result<Self> {
        if tangents.len() != self.waypoints.len() {
            return Err(TimingError::length_mismatch(
                "tangents",
                self.waypoints.len(),
                tangents.len(),
            ));
        }
        for t in tangents.iter().flatten() {
            check_vector("tangent", self.dim(), t)?;
        }
        self.tangents = tangents;
        Ok(self)
    }

    /// Set the initial guess for the durations.
    ///
    /// Durations below `tau_min` are raised to it when the starting point is
    /// formed.
    ///
    /// # Errors
    ///
    /// Returns an error if the length does not match or a value is not finite.
    pub fn with_durations(mut self, durations: Vec<f64>) -> Result<Self> {
        if durations.len() != self.waypoints.len() {
            return Err(TimingError::length_mismatch(
                "durations",
                self.waypoints.len(),
                durations.len(),
            ));
        }
        if durations.iter().any(|t| !t.is_finite()) {
            return Err(TimingError::NonFinite("durations"));
        }
        self.durations = durations;
        Ok(self)
    }

    /// Set the waypoint velocities: the initial guess when velocities are
    /// optimized, the fixed values otherwise. The last entry is ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the length or a dimension does not match.
    pub fn with_velocities(mut self, velocities: Vec<DVector<f64>>) -> Result<Self> {
        if velocities.len() != self.waypoints.len() {
            return Err(TimingError::length_mismatch(
                "velocities",
                self.waypoints.len(),
                velocities.len(),
            ));
        }
        for v in &velocities {
            check_vector("velocity", self.dim(), v)?;
        }
        self.velocities = velocities;
        Ok(self)
    }

    /// Set the objective weights.
    #[must_use]
    pub fn with_costs(mut self, time_cost: f64, ctrl_cost: f64) -> Self {
        self.time_cost = time_cost;
        self.ctrl_cost = ctrl_cost;
        self
    }

    /// Set the minimum segment duration.
    #[must_use]
    pub fn with_tau_min(mut self, tau_min: f64) -> Self {
        self.tau_min = tau_min;
        self
    }

    /// Choose whether velocities are decision variables.
    #[must_use]
    pub fn with_optimize_velocities(mut self, enabled: bool) -> Self {
        self.optimize_velocities = enabled;
        self
    }

    /// Number of segments (remaining waypoints).
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.waypoints.len()
    }

    /// Configuration-space dimension.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.start_position.len()
    }

    /// Split a decision vector into durations and per-waypoint velocities.
    ///
    /// The last velocity is always zero.
    #[must_use]
    pub fn unpack(&self, x: &DVector<f64>) -> (Vec<f64>, Vec<DVector<f64>>) {
        let k = self.num_segments();
        let durations = x.rows(0, k).iter().copied().collect();
        let velocities = (0..k).map(|j| self.velocity_at(x, j)).collect();
        (durations, velocities)
    }

    /// Objective value at `x`.
    #[must_use]
    pub fn objective(&self, x: &DVector<f64>) -> f64 {
        self.evaluate(x).objective(&self.feature_types())
    }

    /// Column of the first component of `v_j`, if it is a decision variable.
    fn velocity_column(&self, j: usize) -> Option<usize> {
        let k = self.num_segments();
        (self.optimize_velocities && j + 1 < k).then(|| k + j * self.dim())
    }

    fn velocity_at(&self, x: &DVector<f64>, j: usize) -> DVector<f64> {
        if j + 1 >= self.num_segments() {
            return DVector::zeros(self.dim());
        }
        match self.velocity_column(j) {
            Some(col) => x.rows(col, self.dim()).into_owned(),
            None => self.velocities[j].clone(),
        }
    }

    /// Interior waypoints carrying an alignment constraint.
    fn aligned_waypoints(&self) -> impl Iterator<Item = (usize, &DVector<f64>)> + '_ {
        self.tangents
            .iter()
            .enumerate()
            .filter(|(j, _)| self.velocity_column(*j).is_some())
            .filter_map(|(j, t)| t.as_ref().map(|t| (j, t)))
    }
}

impl Program for TimingProgram {
    fn dimension(&self) -> usize {
        let k = self.num_segments();
        if self.optimize_velocities {
            k + (k - 1) * self.dim()
        } else {
            k
        }
    }

    fn feature_types(&self) -> Vec<FeatureType> {
        let k = self.num_segments();
        let d = self.dim();
        let aligned = self.aligned_waypoints().count();

        let mut types = Vec::with_capacity(k * (2 + 2 * d) + aligned * d);
        types.extend(std::iter::repeat_n(FeatureType::Objective, k));
        types.extend(std::iter::repeat_n(FeatureType::SumOfSquares, 2 * d * k));
        types.extend(std::iter::repeat_n(FeatureType::Inequality, k));
        types.extend(std::iter::repeat_n(FeatureType::Equality, aligned * d));
        types
    }

    fn bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let n = self.dimension();
        let k = self.num_segments();
        let lo = DVector::from_fn(n, |i, _| if i < k { self.tau_min } else { f64::NEG_INFINITY });
        (lo, DVector::from_element(n, f64::INFINITY))
    }

    fn initial_point(&self) -> DVector<f64> {
        let k = self.num_segments();
        let d = self.dim();
        let mut x = DVector::zeros(self.dimension());

        for (i, t) in self.durations.iter().enumerate() {
            x[i] = t.max(self.tau_min);
        }
        for j in 0..k {
            let Some(col) = self.velocity_column(j) else {
                continue;
            };
            // Start on the tangent so the alignment constraints hold.
            let v = match &self.tangents[j] {
                Some(t) => t * t.dot(&self.velocities[j]),
                None => self.velocities[j].clone(),
            };
            x.rows_mut(col, d).copy_from(&v);
        }
        x
    }

    fn evaluate(&self, x: &DVector<f64>) -> Evaluation {
        let k = self.num_segments();
        let d = self.dim();
        let types = self.feature_types();
        let mut eval = Evaluation::zeros(types.len(), self.dimension());

        for i in 0..k {
            eval.values[i] = self.time_cost * x[i];
            eval.jacobian[(i, i)] = self.time_cost;
        }

        let ca = (12.0 * self.ctrl_cost).sqrt();
        let cb = self.ctrl_cost.sqrt();
        let mut row = k;

        for i in 0..k {
            let tau = x[i];
            let p0 = if i == 0 {
                &self.start_position
            } else {
                &self.waypoints[i - 1]
            };
            let p1 = &self.waypoints[i];
            let v0 = if i == 0 {
                self.start_velocity.clone()
            } else {
                self.velocity_at(x, i - 1)
            };
            let v1 = self.velocity_at(x, i);
            let col0 = i.checked_sub(1).and_then(|j| self.velocity_column(j));
            let col1 = self.velocity_column(i);

            let v_sum = &v0 + &v1;
            let offset = p1 - p0 - &v_sum * (0.5 * tau);
            let dv = &v1 - &v0;

            let tau_m12 = tau.powf(-0.5);
            let tau_m32 = tau.powf(-1.5);
            let tau_m52 = tau.powf(-2.5);

            // Position residual of the cubic relative to constant-velocity motion.
            for r in 0..d {
                eval.values[row + r] = ca * tau_m32 * offset[r];
                eval.jacobian[(row + r, i)] =
                    ca * (-1.5 * tau_m52 * offset[r] - 0.5 * tau_m32 * v_sum[r]);
                if let Some(c) = col0 {
                    eval.jacobian[(row + r, c + r)] = -0.5 * ca * tau_m12;
                }
                if let Some(c) = col1 {
                    eval.jacobian[(row + r, c + r)] = -0.5 * ca * tau_m12;
                }
            }
            row += d;

            // Velocity change over the segment.
            for r in 0..d {
                eval.values[row + r] = cb * tau_m12 * dv[r];
                eval.jacobian[(row + r, i)] = -0.5 * cb * tau_m32 * dv[r];
                if let Some(c) = col0 {
                    eval.jacobian[(row + r, c + r)] = -cb * tau_m12;
                }
                if let Some(c) = col1 {
                    eval.jacobian[(row + r, c + r)] = cb * tau_m12;
                }
            }
            row += d;
        }

        for i in 0..k {
            eval.values[row] = self.tau_min - x[i];
            eval.jacobian[(row, i)] = -1.0;
            row += 1;
        }

        for (j, t) in self.aligned_waypoints() {
            let Some(col) = self.velocity_column(j) else {
                continue;
            };
            let projector = DMatrix::identity(d, d) - t * t.transpose();
            let residual = &projector * self.velocity_at(x, j);
            eval.values.rows_mut(row, d).copy_from(&residual);
            eval.jacobian.view_mut((row, col), (d, d)).copy_from(&projector);
            row += d;
        }

        eval
    }
}

pub(crate) fn check_vector(what: &'static str, dim: usize, v: &DVector<f64>) -> Result<()> {
    if v.len() != dim {
        return Err(TimingError::dimension_mismatch(what, dim, v.len()));
    }
    if v.iter().any(|c| !c.is_finite()) {
        return Err(TimingError::NonFinite(what));
    }
    Ok(())
}
