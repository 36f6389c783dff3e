pub mod curve;
pub mod point;
pub mod vector;

pub use curve::{ArcShape, CircleShape, Polyline, Segment};
pub use point::{Point2, Point3};
pub use vector::{Vec2, Vec3};

use thiserror::Error;

/// Tolerance configuration for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance {
    /// Points closer than this are considered coincident.
    pub coincidence: f64,
    /// Display-scale comparisons (selection, hit testing).
    pub display: f64,
    /// Angles smaller than this (radians) are considered zero.
    pub angular: f64,
}

impl Default for Tolerance {
    fn default() -> Self {
        Self {
            coincidence: 1e-9,
            display: 1e-6,
            angular: 1e-10,
        }
    }
}

impl Tolerance {
    pub fn points_coincident(&self, a: &Point2, b: &Point2) -> bool {
        a.distance_to(b) < self.coincidence
    }

    pub fn is_zero_length(&self, length: f64) -> bool {
        length.abs() < self.coincidence
    }

    pub fn is_zero_angle(&self, angle: f64) -> bool {
        angle.abs() < self.angular
    }
}

/// Errors raised when constructing malformed primitives.
///
/// Construction fails instead of producing NaN-bearing values downstream.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("segment endpoints are coincident (length {length})")]
    DegenerateSegment { length: f64 },

    #[error("circle radius {radius} is not positive")]
    DegenerateCircle { radius: f64 },

    #[error("arc spans no angle or has zero radius")]
    DegenerateArc,
}
