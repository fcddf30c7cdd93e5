//! Single cubic Hermite segment over a time interval.
//!
//! A segment is defined by its end positions, end velocities and a duration
//! `T`. With the normalized parameter `s = t / T` the position is
//!
//! ```text
//! p(t) = h00(s)·p0 + h10(s)·T·v0 + h01(s)·p1 + h11(s)·T·v1
//! ```
//!
//! where `h00, h10, h01, h11` are the cubic Hermite basis polynomials.

use nalgebra::DVector;

/// A cubic polynomial segment matching position and velocity at both ends.
#[derive(Debug, Clone, PartialEq)]
pub struct HermiteSegment {
    start_position: DVector<f64>,
    start_velocity: DVector<f64>,
    end_position: DVector<f64>,
    end_velocity: DVector<f64>,
    duration: f64,
}

impl HermiteSegment {
    /// Create a segment from its boundary conditions.
    ///
    /// The caller guarantees `duration > 0` and equal dimensions; use
    /// [`CubicSpline::build`](crate::CubicSpline::build) for validated input.
    #[must_use]
    pub fn new(
        start_position: DVector<f64>,
        start_velocity: DVector<f64>,
        end_position: DVector<f64>,
        end_velocity: DVector<f64>,
        duration: f64,
    ) -> Self {
        Self {
            start_position,
            start_velocity,
            end_position,
            end_velocity,
            duration,
        }
    }

    /// Segment duration.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.duration
    }

    /// Position at the start of the segment.
    #[must_use]
    pub fn start_position(&self) -> &DVector<f64> {
        &self.start_position
    }

    /// Velocity at the start of the segment.
    #[must_use]
    pub fn start_velocity(&self) -> &DVector<f64> {
        &self.start_velocity
    }

    /// Position at the end of the segment.
    #[must_use]
    pub fn end_position(&self) -> &DVector<f64> {
        &self.end_position
    }

    /// Velocity at the end of the segment.
    #[must_use]
    pub fn end_velocity(&self) -> &DVector<f64> {
        &self.end_velocity
    }

    /// Position at local time `t ∈ [0, T]` (clamped).
    #[must_use]
    pub fn position(&self, t: f64) -> DVector<f64> {
        let big_t = self.duration;
        let s = (t / big_t).clamp(0.0, 1.0);
        let s2 = s * s;
        let s3 = s2 * s;

        let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
        let h10 = s3 - 2.0 * s2 + s;
        let h01 = -2.0 * s3 + 3.0 * s2;
        let h11 = s3 - s2;

        &self.start_position * h00
            + &self.start_velocity * (h10 * big_t)
            + &self.end_position * h01
            + &self.end_velocity * (h11 * big_t)
    }

    /// Velocity at local time `t ∈ [0, T]` (clamped).
    #[must_use]
    pub fn velocity(&self, t: f64) -> DVector<f64> {
        let big_t = self.duration;
        let s = (t / big_t).clamp(0.0, 1.0);
        let s2 = s * s;

        let d00 = 6.0 * s2 - 6.0 * s;
        let d10 = 3.0 * s2 - 4.0 * s + 1.0;
        let d01 = -6.0 * s2 + 6.0 * s;
        let d11 = 3.0 * s2 - 2.0 * s;

        (&self.start_position * d00 + &self.end_position * d01) / big_t
            + &self.start_velocity * d10
            + &self.end_velocity * d11
    }

    /// Acceleration at local time `t ∈ [0, T]` (clamped).
    ///
    /// The acceleration of a cubic is linear in time.
    #[must_use]
    pub fn acceleration(&self, t: f64) -> DVector<f64> {
        let big_t = self.duration;
        let s = (t / big_t).clamp(0.0, 1.0);

        let a00 = 12.0 * s - 6.0;
        let a10 = 6.0 * s - 4.0;
        let a01 = -12.0 * s + 6.0;
        let a11 = 6.0 * s - 2.0;

        (&self.start_position * a00 + &self.end_position * a01) / (big_t * big_t)
            + (&self.start_velocity * a10 + &self.end_velocity * a11) / big_t
    }

    /// Exact integral of the squared acceleration over the segment.
    ///
    /// ```text
    /// ∫‖a‖² dt = 12/T³ · ‖p1 − p0 − T/2·(v0 + v1)‖² + 1/T · ‖v1 − v0‖²
    /// ```
    #[must_use]
    pub fn control_effort(&self) -> f64 {
        let big_t = self.duration;
        let offset = &self.end_position
            - &self.start_position
            - (&self.start_velocity + &self.end_velocity) * (0.5 * big_t);
        let dv = &self.end_velocity - &self.start_velocity;

        12.0 * offset.norm_squared() / big_t.powi(3) + dv.norm_squared() / big_t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn segment() -> HermiteSegment {
        HermiteSegment::new(
            DVector::from_vec(vec![0.0, 0.0]),
            DVector::from_vec(vec![1.0, 0.0]),
            DVector::from_vec(vec![2.0, 1.0]),
            DVector::from_vec(vec![0.0, 1.0]),
            2.0,
        )
    }

    #[test]
    fn test_endpoint_interpolation() {
        let seg = segment();
        assert_relative_eq!(seg.position(0.0), seg.start_position().clone(), epsilon = 1e-12);
        assert_relative_eq!(seg.position(2.0), seg.end_position().clone(), epsilon = 1e-12);
        assert_relative_eq!(seg.velocity(0.0), seg.start_velocity().clone(), epsilon = 1e-12);
        assert_relative_eq!(seg.velocity(2.0), seg.end_velocity().clone(), epsilon = 1e-12);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let seg = segment();
        let h = 1e-6;
        for &t in &[0.3, 1.0, 1.7] {
            let fd_vel = (seg.position(t + h) - seg.position(t - h)) / (2.0 * h);
            assert_relative_eq!(fd_vel, seg.velocity(t), epsilon = 1e-6);

            let fd_acc = (seg.velocity(t + h) - seg.velocity(t - h)) / (2.0 * h);
            assert_relative_eq!(fd_acc, seg.acceleration(t), epsilon = 1e-5);
        }
    }

    #[test]
    fn test_control_effort_matches_quadrature() {
        let seg = segment();
        // Simpson's rule is exact for the quadratic ‖a(t)‖²
        let t = seg.duration();
        let a0 = seg.acceleration(0.0).norm_squared();
        let am = seg.acceleration(0.5 * t).norm_squared();
        let a1 = seg.acceleration(t).norm_squared();
        let simpson = t / 6.0 * (a0 + 4.0 * am + a1);

        assert_relative_eq!(seg.control_effort(), simpson, epsilon = 1e-10);
    }

    #[test]
    fn test_straight_constant_velocity_has_no_effort() {
        let seg = HermiteSegment::new(
            DVector::from_vec(vec![0.0]),
            DVector::from_vec(vec![1.0]),
            DVector::from_vec(vec![3.0]),
            DVector::from_vec(vec![1.0]),
            3.0,
        );
        assert_relative_eq!(seg.control_effort(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(seg.acceleration(1.2)[0], 0.0, epsilon = 1e-12);
    }
}
