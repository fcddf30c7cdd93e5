//! Dense augmented-Lagrangian solver.
//!
//! Reference implementation of [`Solver`] for small programs (tens of
//! variables). Each outer iteration minimizes the PHR augmented Lagrangian
//!
//! ```text
//! L(x) = f(x) + Σ_ineq ψ(g_i, λ_i, μ) + Σ_eq (κ_i h_i + μ h_i²)
//! ψ(g, λ, μ) = λg + μg²      if λ + 2μg > 0
//!            = −λ² / (4μ)    otherwise
//! ```
//!
//! with a projected, damped Gauss-Newton method and Armijo backtracking
//! (at most `max_inner_iterations` steps, fewer once the projected gradient
//! or the Newton step is negligible), then updates the multipliers (`λ ← max(0, λ + 2μg)`, `κ ← κ + 2μh`) and
//! grows the penalty `μ` when the constraint violation stops shrinking.
//!
//! The solver tracks the best feasible iterate, so the returned objective is
//! never worse than that of a feasible starting point.

use nalgebra::{DMatrix, DVector};
use tracing::{debug, info};

use crate::{
    Evaluation, FeatureType, NlpError, Program, Result, Solver, SolverReturn, SolverStatus,
    WarmStart,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest step fraction tried by the line search.
const MIN_STEP_FRACTION: f64 = 1e-8;

/// Damping beyond which the inner loop is considered stalled.
const MAX_DAMPING: f64 = 1e12;

/// Configuration for the augmented-Lagrangian solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverOptions {
    /// Budget of inner (Gauss-Newton) iterations across the whole solve.
    pub max_iterations: usize,

    /// Maximum number of multiplier updates.
    pub max_outer_iterations: usize,

    /// Inner iterations allowed between two multiplier updates.
    pub max_inner_iterations: usize,

    /// Inner loop stops once the Newton step is below this in every variable.
    pub step_tolerance: f64,

    /// Inner loop stops once the projected merit gradient is below this in
    /// every variable.
    pub gradient_tolerance: f64,

    /// Allowed constraint violation for a point to count as feasible.
    pub constraint_tolerance: f64,

    /// Penalty weight `μ` used on a cold start.
    pub initial_penalty: f64,

    /// Factor applied to `μ` when violation does not shrink enough.
    pub penalty_growth: f64,

    /// Upper limit for `μ`.
    pub max_penalty: f64,

    /// Initial Levenberg damping added to the Gauss-Newton matrix.
    pub damping: f64,

    /// Largest per-variable change in one step (infinity norm).
    pub max_step: f64,

    /// Sufficient-decrease constant of the Armijo condition.
    pub armijo: f64,

    /// Step shrink factor of the line search (0-1).
    pub backtrack_factor: f64,

    /// Logging detail: 0 = silent, 1 = summary, 2+ = every iteration.
    pub verbose: u8,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_outer_iterations: 20,
            max_inner_iterations: 25,
            step_tolerance: 1e-6,
            gradient_tolerance: 1e-6,
            constraint_tolerance: 1e-5,
            initial_penalty: 10.0,
            penalty_growth: 10.0,
            max_penalty: 1e8,
            damping: 1e-6,
            max_step: 1.0,
            armijo: 1e-4,
            backtrack_factor: 0.5,
            verbose: 0,
        }
    }
}

impl SolverOptions {
    /// Small iteration budget for control loops.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 40,
            max_outer_iterations: 8,
            max_inner_iterations: 6,
            step_tolerance: 1e-4,
            gradient_tolerance: 1e-4,
            constraint_tolerance: 1e-4,
            ..Self::default()
        }
    }

    /// Tight tolerances for offline planning.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 2000,
            max_outer_iterations: 50,
            max_inner_iterations: 40,
            step_tolerance: 1e-9,
            gradient_tolerance: 1e-8,
            constraint_tolerance: 1e-8,
            ..Self::default()
        }
    }

    /// Set the inner iteration budget.
    #[must_use]
    pub const fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Set the inner iteration budget per multiplier update.
    #[must_use]
    pub const fn with_max_inner_iterations(mut self, max_inner_iterations: usize) -> Self {
        self.max_inner_iterations = max_inner_iterations;
        self
    }

    /// Set the step tolerance.
    #[must_use]
    pub const fn with_step_tolerance(mut self, tolerance: f64) -> Self {
        self.step_tolerance = tolerance;
        self
    }

    /// Set the constraint tolerance.
    #[must_use]
    pub const fn with_constraint_tolerance(mut self, tolerance: f64) -> Self {
        self.constraint_tolerance = tolerance;
        self
    }

    /// Set the logging detail.
    #[must_use]
    pub const fn with_verbose(mut self, verbose: u8) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validate the options.
    ///
    /// # Errors
    ///
    /// Returns [`NlpError::InvalidOptions`] if any value is out of range.
    pub fn validate(&self) -> Result<()> {
        if self.max_outer_iterations == 0 || self.max_inner_iterations == 0 {
            return Err(NlpError::InvalidOptions(
                "max_outer_iterations and max_inner_iterations must be at least 1",
            ));
        }
        if !(self.step_tolerance > 0.0)
            || !(self.gradient_tolerance > 0.0)
            || !(self.constraint_tolerance > 0.0)
        {
            return Err(NlpError::InvalidOptions("tolerances must be positive"));
        }
        if !(self.initial_penalty > 0.0) || self.max_penalty < self.initial_penalty {
            return Err(NlpError::InvalidOptions(
                "penalty must be positive and below max_penalty",
            ));
        }
        if !(self.penalty_growth >= 1.0) {
            return Err(NlpError::InvalidOptions("penalty_growth must be >= 1"));
        }
        if !(self.damping > 0.0) || !(self.max_step > 0.0) {
            return Err(NlpError::InvalidOptions(
                "damping and max_step must be positive",
            ));
        }
        if !(self.armijo > 0.0 && self.armijo < 0.5) {
            return Err(NlpError::InvalidOptions("armijo must be in (0, 0.5)"));
        }
        if !(self.backtrack_factor > 0.0 && self.backtrack_factor < 1.0) {
            return Err(NlpError::InvalidOptions(
                "backtrack_factor must be in (0, 1)",
            ));
        }
        Ok(())
    }
}

/// Augmented-Lagrangian solver with a Gauss-Newton inner loop.
#[derive(Debug, Clone, Default)]
pub struct AugmentedLagrangian {
    options: SolverOptions,
}

impl AugmentedLagrangian {
    /// Create a solver with the given options.
    #[must_use]
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    /// Get the options.
    #[must_use]
    pub fn options(&self) -> &SolverOptions {
        &self.options
    }

    /// Get mutable options.
    pub fn options_mut(&mut self) -> &mut SolverOptions {
        &mut self.options
    }
}

/// Best feasible iterate seen so far.
struct Incumbent {
    x: DVector<f64>,
    eval: Evaluation,
    objective: f64,
}

impl Solver for AugmentedLagrangian {
    fn solve(
        &mut self,
        program: &dyn Program,
        warm_start: Option<&WarmStart>,
    ) -> Result<SolverReturn> {
        let opts = self.options;
        opts.validate()?;

        let n = program.dimension();
        let types = program.feature_types();
        let m = types.len();

        let (lo, hi) = program.bounds();
        if lo.len() != n {
            return Err(NlpError::dimension_mismatch("lower bounds", n, lo.len()));
        }
        if hi.len() != n {
            return Err(NlpError::dimension_mismatch("upper bounds", n, hi.len()));
        }

        let x0 = program.initial_point();
        if x0.len() != n {
            return Err(NlpError::dimension_mismatch("initial point", n, x0.len()));
        }
        if x0.iter().any(|v| !v.is_finite()) {
            return Err(NlpError::NonFiniteEvaluation {
                what: "initial point",
            });
        }

        let mut x = project(&x0, &lo, &hi);
        let mut eval = program.evaluate(&x);
        check_shape(&eval, m, n)?;
        if !eval.is_finite() {
            return Err(NlpError::NonFiniteEvaluation { what: "features" });
        }

        let warm = warm_start.filter(|w| {
            w.dual.len() == m && w.penalty.is_finite() && w.penalty > 0.0
        });
        let used_warm_start = warm.is_some();
        let mut dual = warm.map_or_else(
            || DVector::zeros(m),
            |w| sanitize_dual(&w.dual, &types),
        );
        let mut penalty = warm.map_or(opts.initial_penalty, |w| {
            w.penalty.clamp(opts.initial_penalty, opts.max_penalty)
        });

        let tol = opts.constraint_tolerance;
        let is_feasible = |e: &Evaluation| {
            e.inequality_violation(&types) <= tol && e.equality_violation(&types) <= tol
        };

        let mut best = is_feasible(&eval).then(|| Incumbent {
            x: x.clone(),
            eval: eval.clone(),
            objective: eval.objective(&types),
        });

        let mut iterations = 0;
        let mut evaluations = 1;
        let mut damping = opts.damping;
        let mut converged = false;
        let mut prev_violation = f64::INFINITY;

        'outer: for outer in 0..opts.max_outer_iterations {
            let mut stalled = false;

            for _ in 0..opts.max_inner_iterations {
                if iterations >= opts.max_iterations {
                    break 'outer;
                }

                let merit0 = merit(&types, &eval.values, &dual, penalty);
                let (grad, hess) = merit_derivatives(&types, &eval, &dual, penalty);
                if projected_gradient_norm(&grad, &x, &lo, &hi) < opts.gradient_tolerance {
                    stalled = true;
                    break;
                }
                iterations += 1;

                let mut step = projected_newton_step(&grad, &hess, &x, &lo, &hi, damping);
                let step_norm = step.amax();
                if step_norm > opts.max_step {
                    step *= opts.max_step / step_norm;
                }
                // Short steps are still applied before the inner loop ends.
                let short = step.amax() < opts.step_tolerance;

                let mut alpha = 1.0;
                let mut accepted = None;
                while alpha > MIN_STEP_FRACTION {
                    let trial = project(&(&x + &step * alpha), &lo, &hi);
                    let trial_eval = program.evaluate(&trial);
                    evaluations += 1;

                    if trial_eval.values.len() == m && trial_eval.is_finite() {
                        let merit1 = merit(&types, &trial_eval.values, &dual, penalty);
                        let decrease = grad.dot(&(&trial - &x));
                        if merit1 <= merit0 + opts.armijo * decrease {
                            accepted = Some((trial, trial_eval));
                            break;
                        }
                    }
                    alpha *= opts.backtrack_factor;
                }

                let Some((trial, trial_eval)) = accepted else {
                    damping *= 10.0;
                    if short || damping > MAX_DAMPING {
                        stalled = true;
                        break;
                    }
                    continue;
                };

                let moved = (&trial - &x).amax();
                x = trial;
                eval = trial_eval;
                damping = (damping * 0.1).max(opts.damping);

                if is_feasible(&eval) {
                    let objective = eval.objective(&types);
                    if best.as_ref().is_none_or(|b| objective < b.objective) {
                        best = Some(Incumbent {
                            x: x.clone(),
                            eval: eval.clone(),
                            objective,
                        });
                    }
                }

                if opts.verbose >= 2 {
                    debug!(
                        outer,
                        iteration = iterations,
                        merit = merit(&types, &eval.values, &dual, penalty),
                        alpha,
                        moved,
                        "augmented Lagrangian step"
                    );
                }

                if short {
                    stalled = true;
                    break;
                }
            }

            let violation = eval
                .inequality_violation(&types)
                .max(eval.equality_violation(&types));
            if stalled && violation <= tol {
                converged = true;
                break;
            }

            for (i, ty) in types.iter().enumerate() {
                let v = eval.values[i];
                match ty {
                    FeatureType::Inequality => dual[i] = (dual[i] + 2.0 * penalty * v).max(0.0),
                    FeatureType::Equality => dual[i] += 2.0 * penalty * v,
                    FeatureType::Objective | FeatureType::SumOfSquares => {}
                }
            }
            if violation > 0.25 * prev_violation {
                penalty = (penalty * opts.penalty_growth).min(opts.max_penalty);
            }
            prev_violation = violation;
        }

        let current_objective = eval.objective(&types);
        let current_feasible = is_feasible(&eval);
        let (x, eval, objective) = match best {
            Some(b) if !current_feasible || b.objective < current_objective => {
                (b.x, b.eval, b.objective)
            }
            _ => (x, eval, current_objective),
        };

        let inequality_violation = eval.inequality_violation(&types);
        let equality_violation = eval.equality_violation(&types);
        let feasible = inequality_violation <= tol && equality_violation <= tol;
        let status = if converged && feasible {
            SolverStatus::Converged
        } else if feasible {
            SolverStatus::IterationLimit
        } else {
            SolverStatus::Infeasible
        };

        if opts.verbose >= 1 {
            info!(
                ?status,
                iterations,
                evaluations,
                objective,
                inequality_violation,
                equality_violation,
                warm = used_warm_start,
                "augmented Lagrangian finished"
            );
        }

        Ok(SolverReturn {
            status,
            x,
            dual,
            penalty,
            objective,
            inequality_violation,
            equality_violation,
            iterations,
            evaluations,
            used_warm_start,
        })
    }

    fn set_verbose(&mut self, verbose: u8) {
        self.options.verbose = verbose;
    }
}

fn check_shape(eval: &Evaluation, m: usize, n: usize) -> Result<()> {
    if eval.values.len() != m {
        return Err(NlpError::dimension_mismatch(
            "feature values",
            m,
            eval.values.len(),
        ));
    }
    if eval.jacobian.nrows() != m {
        return Err(NlpError::dimension_mismatch(
            "jacobian rows",
            m,
            eval.jacobian.nrows(),
        ));
    }
    if eval.jacobian.ncols() != n {
        return Err(NlpError::dimension_mismatch(
            "jacobian columns",
            n,
            eval.jacobian.ncols(),
        ));
    }
    Ok(())
}

fn project(x: &DVector<f64>, lo: &DVector<f64>, hi: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        x.len(),
        x.iter()
            .zip(lo.iter().zip(hi.iter()))
            .map(|(&v, (&l, &h))| v.max(l).min(h)),
    )
}

/// Keep inequality duals non-negative and zero the non-constraint entries.
fn sanitize_dual(dual: &DVector<f64>, types: &[FeatureType]) -> DVector<f64> {
    DVector::from_iterator(
        dual.len(),
        dual.iter().zip(types).map(|(&d, ty)| match ty {
            FeatureType::Inequality if d.is_finite() => d.max(0.0),
            FeatureType::Equality if d.is_finite() => d,
            _ => 0.0,
        }),
    )
}

fn merit(types: &[FeatureType], values: &DVector<f64>, dual: &DVector<f64>, mu: f64) -> f64 {
    types
        .iter()
        .enumerate()
        .map(|(i, ty)| {
            let v = values[i];
            match ty {
                FeatureType::Objective => v,
                FeatureType::SumOfSquares => v * v,
                FeatureType::Inequality => {
                    if dual[i] + 2.0 * mu * v > 0.0 {
                        dual[i] * v + mu * v * v
                    } else {
                        -dual[i] * dual[i] / (4.0 * mu)
                    }
                }
                FeatureType::Equality => dual[i] * v + mu * v * v,
            }
        })
        .sum()
}

/// Gradient and Gauss-Newton Hessian of the merit function.
fn merit_derivatives(
    types: &[FeatureType],
    eval: &Evaluation,
    dual: &DVector<f64>,
    mu: f64,
) -> (DVector<f64>, DMatrix<f64>) {
    let m = types.len();
    let mut coeff = DVector::zeros(m);
    let mut weight = DVector::zeros(m);

    for (i, ty) in types.iter().enumerate() {
        let v = eval.values[i];
        match ty {
            FeatureType::Objective => coeff[i] = 1.0,
            FeatureType::SumOfSquares => {
                coeff[i] = 2.0 * v;
                weight[i] = 2.0;
            }
            FeatureType::Inequality => {
                let s = dual[i] + 2.0 * mu * v;
                if s > 0.0 {
                    coeff[i] = s;
                    weight[i] = 2.0 * mu;
                }
            }
            FeatureType::Equality => {
                coeff[i] = dual[i] + 2.0 * mu * v;
                weight[i] = 2.0 * mu;
            }
        }
    }

    let grad = eval.jacobian.tr_mul(&coeff);

    let mut scaled = eval.jacobian.clone();
    for (i, mut row) in scaled.row_iter_mut().enumerate() {
        row *= weight[i].sqrt();
    }
    let hess = scaled.tr_mul(&scaled);

    (grad, hess)
}

/// Largest gradient entry over the variables free to move downhill.
fn projected_gradient_norm(
    grad: &DVector<f64>,
    x: &DVector<f64>,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
) -> f64 {
    (0..x.len())
        .filter(|&i| !(x[i] <= lo[i] && grad[i] > 0.0) && !(x[i] >= hi[i] && grad[i] < 0.0))
        .map(|i| grad[i].abs())
        .fold(0.0, f64::max)
}

/// Damped Newton step restricted to variables not held at an active bound.
fn projected_newton_step(
    grad: &DVector<f64>,
    hess: &DMatrix<f64>,
    x: &DVector<f64>,
    lo: &DVector<f64>,
    hi: &DVector<f64>,
    damping: f64,
) -> DVector<f64> {
    let n = x.len();
    let free: Vec<usize> = (0..n)
        .filter(|&i| {
            let at_lower = x[i] <= lo[i] && grad[i] > 0.0;
            let at_upper = x[i] >= hi[i] && grad[i] < 0.0;
            !(at_lower || at_upper)
        })
        .collect();

    let mut step = DVector::zeros(n);
    if free.is_empty() {
        return step;
    }

    let k = free.len();
    let reduced_grad = DVector::from_iterator(k, free.iter().map(|&i| grad[i]));
    let reduced_hess = DMatrix::from_fn(k, k, |r, c| hess[(free[r], free[c])]);

    let mut lambda = damping;
    let mut reduced_step = None;
    for _ in 0..8 {
        let damped = &reduced_hess + DMatrix::identity(k, k) * lambda;
        if let Some(chol) = damped.cholesky() {
            reduced_step = Some(-chol.solve(&reduced_grad));
            break;
        }
        lambda *= 100.0;
    }
    // Steepest descent when the damped system stays indefinite.
    let reduced_step = reduced_step.unwrap_or_else(|| -&reduced_grad);

    for (r, &i) in free.iter().enumerate() {
        step[i] = reduced_step[r];
    }
    step
}
