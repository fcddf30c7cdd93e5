//! Waypoint tangents and their precedence.
//!
//! Every waypoint has one [`Tangent`] slot. Precedence:
//!
//! 1. A [`Tangent::Manual`] tangent always wins.
//! 2. Automatic derivation only fills slots that are not manual.
//! 3. Replacing waypoints discards the tangents of the replaced suffix,
//!    manual ones included.
//!
//! The last waypoint of a plan never gets a derived tangent; the plan ends
//! at rest there.

use nalgebra::DVector;

/// Directions shorter than this produce no tangent.
const MIN_DIRECTION_NORM: f64 = 1e-9;

/// Tangent slot of one waypoint.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Tangent {
    /// No direction constraint.
    #[default]
    None,
    /// Unit direction derived from the next waypoint.
    Derived(DVector<f64>),
    /// Unit direction supplied by the caller.
    Manual(DVector<f64>),
}

impl Tangent {
    /// Create a manual tangent, normalizing `direction`.
    ///
    /// Returns [`Tangent::None`] for a degenerate direction.
    #[must_use]
    pub fn manual(direction: &DVector<f64>) -> Self {
        unit(direction).map_or(Self::None, Self::Manual)
    }

    /// Unit direction, if any.
    #[must_use]
    pub fn direction(&self) -> Option<&DVector<f64>> {
        match self {
            Self::None => None,
            Self::Derived(t) | Self::Manual(t) => Some(t),
        }
    }

    /// Returns `true` for a caller-supplied tangent.
    #[must_use]
    pub fn is_manual(&self) -> bool {
        matches!(self, Self::Manual(_))
    }
}

/// Unit direction from `from` toward `to`, or `None` if they coincide.
#[must_use]
pub fn direction_between(from: &DVector<f64>, to: &DVector<f64>) -> Option<DVector<f64>> {
    unit(&(to - from))
}

/// Fill the tangents of `waypoints[start..]` from the next-waypoint direction.
///
/// Manual tangents are left untouched. The last waypoint's slot is cleared
/// unless it is manual.
pub fn derive_next_waypoint_tangents(
    waypoints: &[DVector<f64>],
    tangents: &mut [Tangent],
    start: usize,
) {
    let count = waypoints.len().min(tangents.len());
    for i in start..count {
        if tangents[i].is_manual() {
            continue;
        }
        tangents[i] = waypoints
            .get(i + 1)
            .and_then(|next| direction_between(&waypoints[i], next))
            .map_or(Tangent::None, Tangent::Derived);
    }
}

fn unit(v: &DVector<f64>) -> Option<DVector<f64>> {
    let norm = v.norm();
    (norm.is_finite() && norm > MIN_DIRECTION_NORM).then(|| v / norm)
}
