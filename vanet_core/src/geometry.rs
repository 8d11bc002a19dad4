//! 2D position/velocity arithmetic for motion and trust prediction.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

/// A two-dimensional position or velocity vector with double precision.
///
/// Value type: derived operations return a new vector; only
/// [`advance`](PositionVector::advance) mutates, and it is the authoritative
/// motion step for the owning vehicle. NaN and infinities propagate per IEEE
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionVector(Vector2<f64>);

impl PositionVector {
    pub fn new(x: f64, y: f64) -> Self {
        Self(Vector2::new(x, y))
    }

    pub fn x(&self) -> f64 {
        self.0.x
    }

    pub fn y(&self) -> f64 {
        self.0.y
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Self) -> f64 {
        (self.0 - other.0).norm()
    }

    /// True iff `other` lies within `range` of this point (inclusive).
    pub fn in_range(&self, other: &Self, range: f64) -> bool {
        self.distance(other) <= range
    }

    /// Advances this position in place: `pos += velocity * dt_secs`.
    pub fn advance(&mut self, velocity: &Self, dt_secs: f64) {
        self.0 += velocity.0 * dt_secs;
    }

    /// Where this position ends up after `dt_secs` at `velocity`.
    ///
    /// Same formula as [`advance`](PositionVector::advance) but pure; used
    /// for trust prediction, never for actual motion.
    pub fn predicted_next(&self, velocity: &Self, dt_secs: f64) -> Self {
        Self(self.0 + velocity.0 * dt_secs)
    }
}

impl std::fmt::Display for PositionVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.1}, {:.1})", self.0.x, self.0.y)
    }
}
