//! Error types for spline construction.

use thiserror::Error;

/// Errors that can occur while building a spline.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SplineError {
    /// A segment duration is zero, negative, or not finite.
    #[error("invalid duration at segment {index}: {value} (must be positive and finite)")]
    NonPositiveDuration {
        /// Index of the offending segment.
        index: usize,
        /// The invalid duration.
        value: f64,
    },

    /// Two parallel input arrays disagree in length.
    #[error("length mismatch for {what}: expected {expected}, got {actual}")]
    LengthMismatch {
        /// Which array has the wrong length.
        what: &'static str,
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// A vector does not have the dimensionality of the start position.
    #[error("dimension mismatch for {what} {index}: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Which kind of vector is wrong.
        what: &'static str,
        /// Index of the vector within its array.
        index: usize,
        /// Expected dimension.
        expected: usize,
        /// Actual dimension.
        actual: usize,
    },

    /// No segments were given.
    #[error("spline needs at least one segment")]
    Empty,
}

impl SplineError {
    /// Create a length mismatch error.
    #[must_use]
    pub fn length_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::LengthMismatch {
            what,
            expected,
            actual,
        }
    }

    /// Check if this error was caused by a bad duration.
    #[must_use]
    pub fn is_duration(&self) -> bool {
        matches!(self, Self::NonPositiveDuration { .. })
    }

    /// Check if this error was caused by inconsistent input shapes.
    #[must_use]
    pub fn is_shape(&self) -> bool {
        matches!(
            self,
            Self::LengthMismatch { .. } | Self::DimensionMismatch { .. } | Self::Empty
        )
    }
}
