//! Chord-tolerance subdivision of exact curves.
//!
//! The sagitta of a chord spanning angle `t` on a circle of radius `r` is
//! `r * (1 - cos(t/2))`; capping the step angle at `2 * acos(1 - tol/r)`
//! bounds the deviation from the true curve by `tol`.

use std::f64::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use burin_geom::{ArcShape, CircleShape, Point2, Segment};

/// Shared cancellation flag, checked between subdivision steps. Cloning
/// shares the underlying flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Smallest chord count used for any full circle, regardless of tolerance.
const MIN_CIRCLE_SEGMENTS: usize = 8;

/// Chord count for a full circle of `radius` at chord-height `tolerance`.
pub fn circle_segment_count(radius: f64, tolerance: f64) -> usize {
    segment_count_for_sweep(radius, TAU, tolerance).max(MIN_CIRCLE_SEGMENTS)
}

/// Chord count for an arc spanning `sweep` radians.
pub fn arc_segment_count(radius: f64, sweep: f64, tolerance: f64) -> usize {
    segment_count_for_sweep(radius, sweep, tolerance).max(2)
}

fn segment_count_for_sweep(radius: f64, sweep: f64, tolerance: f64) -> usize {
    if tolerance >= radius {
        return 1;
    }
    let max_step = 2.0 * (1.0 - tolerance / radius).acos();
    (sweep / max_step).ceil() as usize
}

/// A lazy, finite vertex stream for one curve. Non-restartable: each vertex
/// is produced once and consuming the iterator advances it permanently.
pub struct CurvePoints {
    inner: Inner,
}

enum Inner {
    Segment {
        start: Point2,
        end: Point2,
        emitted: usize,
    },
    Circle {
        circle: CircleShape,
        count: usize,
        next: usize,
    },
    Arc {
        arc: ArcShape,
        count: usize,
        next: usize,
    },
}

impl CurvePoints {
    pub fn segment(seg: &Segment) -> Self {
        Self {
            inner: Inner::Segment {
                start: seg.start,
                end: seg.end,
                emitted: 0,
            },
        }
    }

    /// Full circle; the closing vertex repeats the first so the polyline
    /// reads as a loop.
    pub fn circle(circle: &CircleShape, tolerance: f64) -> Self {
        Self {
            inner: Inner::Circle {
                circle: *circle,
                count: circle_segment_count(circle.radius, tolerance),
                next: 0,
            },
        }
    }

    pub fn arc(arc: &ArcShape, tolerance: f64) -> Self {
        Self {
            inner: Inner::Arc {
                arc: *arc,
                count: arc_segment_count(arc.radius, arc.sweep(), tolerance),
                next: 0,
            },
        }
    }
}

impl Iterator for CurvePoints {
    type Item = Point2;

    fn next(&mut self) -> Option<Point2> {
        match &mut self.inner {
            Inner::Segment {
                start,
                end,
                emitted,
            } => {
                let p = match *emitted {
                    0 => *start,
                    1 => *end,
                    _ => return None,
                };
                *emitted += 1;
                Some(p)
            }
            Inner::Circle {
                circle,
                count,
                next,
            } => {
                if *next > *count {
                    return None;
                }
                let t = TAU * (*next as f64) / (*count as f64);
                *next += 1;
                Some(circle.evaluate(t))
            }
            Inner::Arc { arc, count, next } => {
                if *next > *count {
                    return None;
                }
                let t = (*next as f64) / (*count as f64);
                *next += 1;
                Some(arc.evaluate(t))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burin_geom::Tolerance;

    #[test]
    fn test_circle_count_monotone_in_tolerance() {
        let coarse = circle_segment_count(10.0, 0.1);
        let medium = circle_segment_count(10.0, 0.01);
        let fine = circle_segment_count(10.0, 0.001);
        assert!(coarse <= medium && medium <= fine);
        assert!(coarse >= MIN_CIRCLE_SEGMENTS);
    }

    #[test]
    fn test_chord_deviation_within_tolerance() {
        let tol = 0.01;
        let count = circle_segment_count(10.0, tol);
        let step = TAU / count as f64;
        let sagitta = 10.0 * (1.0 - (step / 2.0).cos());
        assert!(sagitta <= tol + 1e-12, "sagitta {sagitta} exceeds {tol}");
    }

    #[test]
    fn test_circle_points_close_the_loop() {
        let circle = CircleShape::new(Point2::ORIGIN, 5.0, &Tolerance::default()).unwrap();
        let pts: Vec<Point2> = CurvePoints::circle(&circle, 0.01).collect();
        let first = pts.first().unwrap();
        let last = pts.last().unwrap();
        assert!(first.distance_to(last) < 1e-9);
        // Every vertex sits on the exact circle.
        for p in &pts {
            assert!((p.distance_to(&Point2::ORIGIN) - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_segment_points() {
        let seg = Segment::new(Point2::ORIGIN, Point2::new(1.0, 0.0), &Tolerance::default())
            .unwrap();
        let pts: Vec<Point2> = CurvePoints::segment(&seg).collect();
        assert_eq!(pts.len(), 2);
    }

    #[test]
    fn test_iterator_is_not_restartable() {
        let seg = Segment::new(Point2::ORIGIN, Point2::new(1.0, 0.0), &Tolerance::default())
            .unwrap();
        let mut pts = CurvePoints::segment(&seg);
        assert!(pts.next().is_some());
        assert!(pts.next().is_some());
        assert!(pts.next().is_none());
        assert!(pts.next().is_none());
    }
}
