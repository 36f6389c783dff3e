use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::point::Point2;
use crate::vector::Vec2;
use crate::{GeometryError, Tolerance};

/// A bounded line segment in the sketch plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start: Point2,
    pub end: Point2,
}

impl Segment {
    pub fn new(start: Point2, end: Point2, tol: &Tolerance) -> Result<Self, GeometryError> {
        let length = start.distance_to(&end);
        if tol.is_zero_length(length) {
            return Err(GeometryError::DegenerateSegment { length });
        }
        Ok(Self { start, end })
    }

    pub fn length(&self) -> f64 {
        self.start.distance_to(&self.end)
    }

    pub fn direction(&self) -> Vec2 {
        self.end - self.start
    }

    /// Evaluate at parameter t in [0, 1].
    pub fn evaluate(&self, t: f64) -> Point2 {
        self.start.lerp(&self.end, t)
    }

    pub fn midpoint(&self) -> Point2 {
        self.start.midpoint(&self.end)
    }

    /// Closest point on the segment and its clamped parameter.
    pub fn closest_point(&self, p: &Point2) -> (Point2, f64) {
        let d = self.direction();
        let len_sq = d.length_squared();
        let t = ((*p - self.start).dot(&d) / len_sq).clamp(0.0, 1.0);
        (self.evaluate(t), t)
    }

    pub fn distance_to_point(&self, p: &Point2) -> f64 {
        let (closest, _) = self.closest_point(p);
        p.distance_to(&closest)
    }

    /// Intersection with another segment, if the two cross within their bounds.
    pub fn intersect_segment(&self, other: &Segment, tol: &Tolerance) -> Option<Point2> {
        let d1 = self.direction();
        let d2 = other.direction();
        let denom = d1.cross(&d2);
        if tol.is_zero_length(denom) {
            return None;
        }
        let delta = other.start - self.start;
        let t = delta.cross(&d2) / denom;
        let u = delta.cross(&d1) / denom;
        if (0.0..=1.0).contains(&t) && (0.0..=1.0).contains(&u) {
            Some(self.evaluate(t))
        } else {
            None
        }
    }
}

/// A full circle in the sketch plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircleShape {
    pub center: Point2,
    pub radius: f64,
}

impl CircleShape {
    pub fn new(center: Point2, radius: f64, tol: &Tolerance) -> Result<Self, GeometryError> {
        if radius <= tol.coincidence {
            return Err(GeometryError::DegenerateCircle { radius });
        }
        Ok(Self { center, radius })
    }

    /// Evaluate at angle t (radians from +X).
    pub fn evaluate(&self, t: f64) -> Point2 {
        Point2::new(
            self.center.x + self.radius * t.cos(),
            self.center.y + self.radius * t.sin(),
        )
    }

    pub fn circumference(&self) -> f64 {
        TAU * self.radius
    }

    /// Unsigned distance from a point to the circle outline.
    pub fn distance_to_point(&self, p: &Point2) -> f64 {
        (self.center.distance_to(p) - self.radius).abs()
    }

    /// Whether an infinite line through the segment is tangent to the circle.
    pub fn is_tangent_to(&self, seg: &Segment, tol: &Tolerance) -> bool {
        let d = seg.direction();
        let len = d.length();
        if tol.is_zero_length(len) {
            return false;
        }
        let dist = ((self.center - seg.start).cross(&d)).abs() / len;
        (dist - self.radius).abs() < tol.display
    }

    /// Intersections between the circle and the infinite line through `seg`.
    pub fn intersect_line(&self, seg: &Segment, tol: &Tolerance) -> Vec<Point2> {
        let d = match seg.direction().normalized() {
            Some(d) => d,
            None => return Vec::new(),
        };
        let to_center = self.center - seg.start;
        let proj = to_center.dot(&d);
        let foot = seg.start + d * proj;
        let dist = self.center.distance_to(&foot);
        if dist > self.radius + tol.display {
            return Vec::new();
        }
        let half_chord_sq = self.radius * self.radius - dist * dist;
        if half_chord_sq <= tol.display * tol.display {
            return vec![foot];
        }
        let half = half_chord_sq.sqrt();
        vec![foot + d * half, foot + d * (-half)]
    }
}

/// A circular arc, counter-clockwise from `start_angle` to `end_angle`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcShape {
    pub center: Point2,
    pub radius: f64,
    pub start_angle: f64,
    pub end_angle: f64,
}

impl ArcShape {
    pub fn new(
        center: Point2,
        radius: f64,
        start_angle: f64,
        end_angle: f64,
        tol: &Tolerance,
    ) -> Result<Self, GeometryError> {
        if radius <= tol.coincidence {
            return Err(GeometryError::DegenerateArc);
        }
        // The sweep convention wraps equal angles to a full turn, so the
        // zero-span check has to look at the raw difference.
        if tol.is_zero_angle(end_angle - start_angle) {
            return Err(GeometryError::DegenerateArc);
        }
        Ok(Self {
            center,
            radius,
            start_angle,
            end_angle,
        })
    }

    /// Build an arc through two endpoints around a center. The endpoints are
    /// assumed equidistant from the center (the solver maintains this).
    pub fn from_points(
        center: Point2,
        start: Point2,
        end: Point2,
        tol: &Tolerance,
    ) -> Result<Self, GeometryError> {
        let radius = center.distance_to(&start);
        let start_angle = (start - center).angle();
        let end_angle = (end - center).angle();
        Self::new(center, radius, start_angle, end_angle, tol)
    }

    /// Swept angle in (0, 2*pi], always counter-clockwise.
    pub fn sweep(&self) -> f64 {
        let mut sweep = self.end_angle - self.start_angle;
        while sweep <= 0.0 {
            sweep += TAU;
        }
        while sweep > TAU {
            sweep -= TAU;
        }
        sweep
    }

    /// Evaluate at parameter t in [0, 1] along the sweep.
    pub fn evaluate(&self, t: f64) -> Point2 {
        let angle = self.start_angle + self.sweep() * t;
        Point2::new(
            self.center.x + self.radius * angle.cos(),
            self.center.y + self.radius * angle.sin(),
        )
    }

    pub fn length(&self) -> f64 {
        self.radius * self.sweep()
    }
}

/// An ordered vertex chain, the tessellated form of sketch curves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Polyline {
    pub points: Vec<Point2>,
}

impl Polyline {
    pub fn new(points: Vec<Point2>) -> Self {
        Self { points }
    }

    pub fn length(&self) -> f64 {
        self.points
            .windows(2)
            .map(|w| w[0].distance_to(&w[1]))
            .sum()
    }

    pub fn is_closed(&self, tol: &Tolerance) -> bool {
        match (self.points.first(), self.points.last()) {
            (Some(a), Some(b)) if self.points.len() > 2 => tol.points_coincident(a, b),
            _ => false,
        }
    }
}
