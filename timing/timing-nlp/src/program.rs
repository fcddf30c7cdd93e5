//! Nonlinear program description.
//!
//! A program is a vector of *features* `φ(x)` with one [`FeatureType`] per
//! entry. The problem being solved is
//!
//! ```text
//! minimize    Σ_{Objective} φ_i(x) + Σ_{SumOfSquares} φ_i(x)²
//! subject to  φ_i(x) ≤ 0   for Inequality features
//!             φ_i(x) = 0   for Equality features
//!             lo ≤ x ≤ hi
//! ```
//!
//! Programs report features and their dense Jacobian at any trial point;
//! the solver decides where to evaluate.

use nalgebra::{DMatrix, DVector};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Role of a single feature in the program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FeatureType {
    /// Added to the objective as is.
    Objective,
    /// Squared and added to the objective.
    SumOfSquares,
    /// Constrained to be `≤ 0`.
    Inequality,
    /// Constrained to be `= 0`.
    Equality,
}

impl FeatureType {
    /// Returns `true` for constraint features.
    #[must_use]
    pub const fn is_constraint(self) -> bool {
        matches!(self, Self::Inequality | Self::Equality)
    }
}

/// Feature values and Jacobian at one point.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Feature values `φ(x)`, one per feature.
    pub values: DVector<f64>,
    /// Jacobian `∂φ/∂x`, one row per feature and one column per variable.
    pub jacobian: DMatrix<f64>,
}

impl Evaluation {
    /// Create a zeroed evaluation for `features` features over `dimension` variables.
    #[must_use]
    pub fn zeros(features: usize, dimension: usize) -> Self {
        Self {
            values: DVector::zeros(features),
            jacobian: DMatrix::zeros(features, dimension),
        }
    }

    /// Returns `true` if all values and Jacobian entries are finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite()) && self.jacobian.iter().all(|v| v.is_finite())
    }

    /// Objective value: objective features plus squared sum-of-squares features.
    #[must_use]
    pub fn objective(&self, types: &[FeatureType]) -> f64 {
        types
            .iter()
            .zip(self.values.iter())
            .map(|(ty, &v)| match ty {
                FeatureType::Objective => v,
                FeatureType::SumOfSquares => v * v,
                FeatureType::Inequality | FeatureType::Equality => 0.0,
            })
            .sum()
    }

    /// Largest positive inequality value (zero when all are satisfied).
    #[must_use]
    pub fn inequality_violation(&self, types: &[FeatureType]) -> f64 {
        types
            .iter()
            .zip(self.values.iter())
            .filter(|(ty, _)| **ty == FeatureType::Inequality)
            .fold(0.0, |acc, (_, &v)| acc.max(v))
    }

    /// Largest absolute equality value.
    #[must_use]
    pub fn equality_violation(&self, types: &[FeatureType]) -> f64 {
        types
            .iter()
            .zip(self.values.iter())
            .filter(|(ty, _)| **ty == FeatureType::Equality)
            .fold(0.0, |acc, (_, &v)| acc.max(v.abs()))
    }
}

/// A nonlinear program the solver can evaluate.
pub trait Program {
    /// Number of decision variables.
    fn dimension(&self) -> usize;

    /// Role of each feature; its length fixes the feature count.
    fn feature_types(&self) -> Vec<FeatureType>;

    /// Box bounds `(lo, hi)` on the decision variables.
    ///
    /// Defaults to unbounded.
    fn bounds(&self) -> (DVector<f64>, DVector<f64>) {
        let n = self.dimension();
        (
            DVector::from_element(n, f64::NEG_INFINITY),
            DVector::from_element(n, f64::INFINITY),
        )
    }

    /// Starting point for the solver.
    fn initial_point(&self) -> DVector<f64>;

    /// Evaluate features and their Jacobian at `x`.
    fn evaluate(&self, x: &DVector<f64>) -> Evaluation;
}
