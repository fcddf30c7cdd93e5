//! Finite-difference verification of program Jacobians.

use nalgebra::DVector;

use crate::Program;

/// Largest discrepancy between analytic and numeric Jacobian entries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JacobianCheck {
    /// Largest absolute difference.
    pub max_error: f64,
    /// Feature row of the largest difference.
    pub row: usize,
    /// Variable column of the largest difference.
    pub col: usize,
}

impl JacobianCheck {
    /// Returns `true` if the largest error is below `tolerance`.
    #[must_use]
    pub fn passes(&self, tolerance: f64) -> bool {
        self.max_error <= tolerance
    }
}

/// Compare the analytic Jacobian at `x` against central differences.
///
/// `epsilon` is the perturbation applied to each variable. Callers must keep
/// `x ± epsilon` inside the program's domain.
#[must_use]
pub fn check_jacobian(program: &dyn Program, x: &DVector<f64>, epsilon: f64) -> JacobianCheck {
    let analytic = program.evaluate(x).jacobian;
    let mut result = JacobianCheck {
        max_error: 0.0,
        row: 0,
        col: 0,
    };

    for col in 0..x.len() {
        let mut plus = x.clone();
        let mut minus = x.clone();
        plus[col] += epsilon;
        minus[col] -= epsilon;

        let numeric = (program.evaluate(&plus).values - program.evaluate(&minus).values)
            / (2.0 * epsilon);

        for row in 0..numeric.len() {
            let error = (numeric[row] - analytic[(row, col)]).abs();
            if error > result.max_error {
                result = JacobianCheck {
                    max_error: error,
                    row,
                    col,
                };
            }
        }
    }

    result
}
