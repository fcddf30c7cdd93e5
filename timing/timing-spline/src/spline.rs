//! Piecewise cubic Hermite spline over time.

use nalgebra::DVector;

use crate::{HermiteSegment, Result, SplineError};

/// Position, velocity and acceleration of a spline at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct SplineSample {
    /// Time of the sample, measured from the spline start.
    pub time: f64,
    /// Position.
    pub position: DVector<f64>,
    /// First time derivative.
    pub velocity: DVector<f64>,
    /// Second time derivative.
    pub acceleration: DVector<f64>,
}

/// A time-parameterized, C1-continuous piecewise cubic curve.
///
/// Segment `i` covers `[knot_times[i], knot_times[i + 1]]`. Evaluation clamps
/// the query time to `[0, duration]`.
///
/// # Example
///
/// ```
/// use nalgebra::DVector;
/// use timing_spline::CubicSpline;
///
/// let waypoints = vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![2.0])];
/// let velocities = vec![DVector::from_vec(vec![1.0]), DVector::from_vec(vec![0.0])];
///
/// let spline = CubicSpline::build(
///     &waypoints,
///     &[],
///     &[1.0, 1.5],
///     &velocities,
///     &DVector::from_vec(vec![0.0]),
///     &DVector::from_vec(vec![0.0]),
/// )
/// .unwrap();
///
/// assert_eq!(spline.num_segments(), 2);
/// assert!((spline.duration() - 2.5).abs() < 1e-12);
/// assert!((spline.position(1.0)[0] - 1.0).abs() < 1e-12);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CubicSpline {
    segments: Vec<HermiteSegment>,
    knot_times: Vec<f64>,
}

impl CubicSpline {
    /// Build a spline through `waypoints` with per-segment durations `tau`.
    ///
    /// Segment `i` runs from waypoint `i - 1` (or from `start_position` for
    /// `i = 0`) to waypoint `i` and lasts `tau[i]`. The start of the first
    /// segment uses `(start_position, start_velocity)`, never a stored
    /// waypoint.
    ///
    /// `tangents` is either empty or parallel to `waypoints`. A present,
    /// non-degenerate tangent projects the velocity at its waypoint onto the
    /// tangent direction.
    ///
    /// # Errors
    ///
    /// - [`SplineError::Empty`] if there are no waypoints
    /// - [`SplineError::LengthMismatch`] if `tau`, `velocities` or `tangents`
    ///   do not match the waypoint count
    /// - [`SplineError::DimensionMismatch`] if any vector differs in
    ///   dimension from `start_position`
    /// - [`SplineError::NonPositiveDuration`] if any `tau[i] <= 0` or is not
    ///   finite
    pub fn build(
        waypoints: &[DVector<f64>],
        tangents: &[Option<DVector<f64>>],
        tau: &[f64],
        velocities: &[DVector<f64>],
        start_position: &DVector<f64>,
        start_velocity: &DVector<f64>,
    ) -> Result<Self> {
        let count = waypoints.len();
        if count == 0 {
            return Err(SplineError::Empty);
        }
        if tau.len() != count {
            return Err(SplineError::length_mismatch("tau", count, tau.len()));
        }
        if velocities.len() != count {
            return Err(SplineError::length_mismatch(
                "velocities",
                count,
                velocities.len(),
            ));
        }
        if !tangents.is_empty() && tangents.len() != count {
            return Err(SplineError::length_mismatch(
                "tangents",
                count,
                tangents.len(),
            ));
        }

        let dim = start_position.len();
        check_dimension("start velocity", 0, dim, start_velocity)?;
        for (i, w) in waypoints.iter().enumerate() {
            check_dimension("waypoint", i, dim, w)?;
        }
        for (i, v) in velocities.iter().enumerate() {
            check_dimension("velocity", i, dim, v)?;
        }
        for (i, t) in tangents.iter().enumerate() {
            if let Some(t) = t {
                check_dimension("tangent", i, dim, t)?;
            }
        }

        if let Some((index, &value)) = tau
            .iter()
            .enumerate()
            .find(|(_, t)| !(t.is_finite() && **t > 0.0))
        {
            return Err(SplineError::NonPositiveDuration { index, value });
        }

        let mut segments = Vec::with_capacity(count);
        let mut knot_times = Vec::with_capacity(count + 1);
        knot_times.push(0.0);

        let mut prev_position = start_position.clone();
        let mut prev_velocity = start_velocity.clone();
        let mut elapsed = 0.0;

        for i in 0..count {
            let tangent = tangents.get(i).and_then(Option::as_ref);
            let velocity = align_to_tangent(&velocities[i], tangent);

            segments.push(HermiteSegment::new(
                prev_position,
                prev_velocity,
                waypoints[i].clone(),
                velocity.clone(),
                tau[i],
            ));

            elapsed += tau[i];
            knot_times.push(elapsed);
            prev_position = waypoints[i].clone();
            prev_velocity = velocity;
        }

        Ok(Self {
            segments,
            knot_times,
        })
    }

    /// Number of cubic segments.
    #[must_use]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    /// All segments in time order.
    #[must_use]
    pub fn segments(&self) -> &[HermiteSegment] {
        &self.segments
    }

    /// Get a segment by index.
    #[must_use]
    pub fn segment(&self, index: usize) -> Option<&HermiteSegment> {
        self.segments.get(index)
    }

    /// Knot times, starting with `0.0` and ending with [`Self::duration`].
    #[must_use]
    pub fn knot_times(&self) -> &[f64] {
        &self.knot_times
    }

    /// Total duration of the spline.
    #[must_use]
    pub fn duration(&self) -> f64 {
        self.knot_times.last().copied().unwrap_or(0.0)
    }

    /// Dimension of the configuration space.
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.segments
            .first()
            .map_or(0, |s| s.start_position().len())
    }

    /// Position at time `t`.
    #[must_use]
    pub fn position(&self, t: f64) -> DVector<f64> {
        let (index, local) = self.locate(t);
        self.segments[index].position(local)
    }

    /// Velocity at time `t`.
    #[must_use]
    pub fn velocity(&self, t: f64) -> DVector<f64> {
        let (index, local) = self.locate(t);
        self.segments[index].velocity(local)
    }

    /// Acceleration at time `t`.
    #[must_use]
    pub fn acceleration(&self, t: f64) -> DVector<f64> {
        let (index, local) = self.locate(t);
        self.segments[index].acceleration(local)
    }

    /// Evaluate position, velocity and acceleration at time `t`.
    #[must_use]
    pub fn sample(&self, t: f64) -> SplineSample {
        let time = t.clamp(0.0, self.duration());
        let (index, local) = self.locate(time);
        let segment = &self.segments[index];
        SplineSample {
            time,
            position: segment.position(local),
            velocity: segment.velocity(local),
            acceleration: segment.acceleration(local),
        }
    }

    /// Sample `n` evenly spaced instants from start to end, inclusive.
    #[must_use]
    pub fn sample_uniform(&self, n: usize) -> Vec<SplineSample> {
        match n {
            0 => Vec::new(),
            1 => vec![self.sample(0.0)],
            _ => {
                let step = self.duration() / (n - 1) as f64;
                (0..n).map(|i| self.sample(i as f64 * step)).collect()
            }
        }
    }

    /// Exact `∫‖acceleration‖² dt` over the whole spline.
    #[must_use]
    pub fn control_effort(&self) -> f64 {
        self.segments.iter().map(HermiteSegment::control_effort).sum()
    }

    /// Map a global time to `(segment index, local time)`.
    fn locate(&self, t: f64) -> (usize, f64) {
        let t = t.clamp(0.0, self.duration());
        // First knot strictly after t, minus one; the end time maps to the last segment.
        let upper = self.knot_times.partition_point(|&k| k <= t);
        let index = upper.saturating_sub(1).min(self.segments.len() - 1);
        (index, t - self.knot_times[index])
    }
}

fn check_dimension(
    what: &'static str,
    index: usize,
    expected: usize,
    v: &DVector<f64>,
) -> Result<()> {
    if v.len() == expected {
        Ok(())
    } else {
        Err(SplineError::DimensionMismatch {
            what,
            index,
            expected,
            actual: v.len(),
        })
    }
}

fn align_to_tangent(velocity: &DVector<f64>, tangent: Option<&DVector<f64>>) -> DVector<f64> {
    match tangent {
        Some(t) if t.norm() > 1e-12 => {
            let unit = t.normalize();
            &unit * unit.dot(velocity)
        }
        _ => velocity.clone(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn v(values: &[f64]) -> DVector<f64> {
        DVector::from_row_slice(values)
    }

    fn three_point_spline() -> CubicSpline {
        let waypoints = vec![v(&[1.0, 0.0]), v(&[2.0, 0.0]), v(&[3.0, 0.0])];
        let velocities = vec![v(&[1.0, 0.0]), v(&[1.0, 0.0]), v(&[0.0, 0.0])];
        CubicSpline::build(
            &waypoints,
            &[],
            &[1.0, 1.0, 1.0],
            &velocities,
            &v(&[0.0, 0.0]),
            &v(&[0.0, 0.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_knots_and_duration() {
        let spline = three_point_spline();
        assert_eq!(spline.num_segments(), 3);
        assert_eq!(spline.knot_times(), &[0.0, 1.0, 2.0, 3.0]);
        assert_relative_eq!(spline.duration(), 3.0);
        assert_eq!(spline.dimension(), 2);
    }

    #[test]
    fn test_passes_through_waypoints() {
        let spline = three_point_spline();
        assert_relative_eq!(spline.position(0.0), v(&[0.0, 0.0]), epsilon = 1e-12);
        assert_relative_eq!(spline.position(1.0), v(&[1.0, 0.0]), epsilon = 1e-12);
        assert_relative_eq!(spline.position(2.0), v(&[2.0, 0.0]), epsilon = 1e-12);
        assert_relative_eq!(spline.position(3.0), v(&[3.0, 0.0]), epsilon = 1e-12);
    }

    #[test]
    fn test_velocity_continuous_at_knots() {
        let spline = three_point_spline();
        for &knot in &[1.0, 2.0] {
            let before = spline.velocity(knot - 1e-9);
            let after = spline.velocity(knot + 1e-9);
            assert_relative_eq!(before, after, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_evaluation_clamps() {
        let spline = three_point_spline();
        assert_relative_eq!(spline.position(-5.0), spline.position(0.0));
        assert_relative_eq!(spline.position(50.0), spline.position(3.0));
        assert_relative_eq!(spline.sample(50.0).time, 3.0);
    }

    #[test]
    fn test_sample_uniform() {
        let spline = three_point_spline();
        let samples = spline.sample_uniform(7);
        assert_eq!(samples.len(), 7);
        assert_relative_eq!(samples[0].time, 0.0);
        assert_relative_eq!(samples[6].time, 3.0);
        assert!(spline.sample_uniform(0).is_empty());
        assert_eq!(spline.sample_uniform(1).len(), 1);
    }

    #[test]
    fn test_control_effort_is_segment_sum() {
        let spline = three_point_spline();
        let sum: f64 = spline.segments().iter().map(|s| s.control_effort()).sum();
        assert_relative_eq!(spline.control_effort(), sum);
        assert!(spline.control_effort() > 0.0);
    }

    #[test]
    fn test_tangent_projects_velocity() {
        let waypoints = vec![v(&[1.0, 1.0]), v(&[2.0, 0.0])];
        let velocities = vec![v(&[1.0, 0.5]), v(&[0.0, 0.0])];
        let tangents = vec![Some(v(&[2.0, 0.0])), None];

        let spline = CubicSpline::build(
            &waypoints,
            &tangents,
            &[1.0, 1.0],
            &velocities,
            &v(&[0.0, 0.0]),
            &v(&[0.0, 0.0]),
        )
        .unwrap();

        assert_relative_eq!(spline.velocity(1.0), v(&[1.0, 0.0]), epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_non_positive_duration() {
        let waypoints = vec![v(&[1.0]), v(&[2.0])];
        let velocities = vec![v(&[0.0]), v(&[0.0])];
        let err = CubicSpline::build(
            &waypoints,
            &[],
            &[1.0, 0.0],
            &velocities,
            &v(&[0.0]),
            &v(&[0.0]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SplineError::NonPositiveDuration {
                index: 1,
                value: 0.0
            }
        );

        let err = CubicSpline::build(
            &waypoints,
            &[],
            &[f64::NAN, 1.0],
            &velocities,
            &v(&[0.0]),
            &v(&[0.0]),
        )
        .unwrap_err();
        assert!(err.is_duration());
    }

    #[test]
    fn test_rejects_inconsistent_shapes() {
        let waypoints = vec![v(&[1.0]), v(&[2.0])];
        let velocities = vec![v(&[0.0])];

        let err = CubicSpline::build(
            &waypoints,
            &[],
            &[1.0, 1.0],
            &velocities,
            &v(&[0.0]),
            &v(&[0.0]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SplineError::LengthMismatch {
                what: "velocities",
                ..
            }
        ));

        let err = CubicSpline::build(
            &waypoints,
            &[],
            &[1.0],
            &[v(&[0.0]), v(&[0.0])],
            &v(&[0.0]),
            &v(&[0.0]),
        )
        .unwrap_err();
        assert!(matches!(err, SplineError::LengthMismatch { what: "tau", .. }));

        let err = CubicSpline::build(
            &[v(&[1.0]), v(&[2.0, 0.0])],
            &[],
            &[1.0, 1.0],
            &[v(&[0.0]), v(&[0.0])],
            &v(&[0.0]),
            &v(&[0.0]),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            SplineError::DimensionMismatch {
                what: "waypoint",
                index: 1,
                ..
            }
        ));

        let err =
            CubicSpline::build(&[], &[], &[], &[], &v(&[0.0]), &v(&[0.0])).unwrap_err();
        assert_eq!(err, SplineError::Empty);
    }
}
