use serde::{Deserialize, Serialize};
use uuid::Uuid;

use burin_geom::{ArcShape, CircleShape, Point2, Segment, Vec2};
use burin_solver::SketchGraph;

pub type FeatureId = Uuid;

/// Cache-validity state of a feature relative to its own and upstream inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureState {
    Clean,
    Dirty,
    /// Transient while the recompute cascade is evaluating the feature.
    Solving,
    /// The feature's own computation failed; see the error detail.
    Error,
    /// An upstream feature is in error; this one was not recomputed.
    Blocked,
}

/// A node in the document's dependency DAG.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    pub operation: Operation,
    /// Upstream features this one consumes, in declaration order. Derived
    /// from the operation; always points at earlier features in build order.
    pub deps: Vec<FeatureId>,
    /// Suppressed features are skipped during recompute and expose no result.
    pub suppressed: bool,
    pub state: FeatureState,
    pub error: Option<String>,
}

/// A parametric modeling operation with its parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Operation {
    Sketch {
        graph: SketchGraph,
    },
    Extrude {
        sketch: FeatureId,
        height: f64,
    },
    Revolve {
        sketch: FeatureId,
        axis_origin: Point2,
        axis_dir: Vec2,
        angle: f64,
    },
}

impl Operation {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Operation::Sketch { .. } => "Sketch",
            Operation::Extrude { .. } => "Extrude",
            Operation::Revolve { .. } => "Revolve",
        }
    }

    /// Upstream feature ids implied by the operation's parameters.
    pub fn implied_deps(&self) -> Vec<FeatureId> {
        match self {
            Operation::Sketch { .. } => Vec::new(),
            Operation::Extrude { sketch, .. } | Operation::Revolve { sketch, .. } => {
                vec![*sketch]
            }
        }
    }
}

/// Committed result of a successfully computed feature.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FeatureResult {
    Profile(ProfileGeometry),
    Solid(SweptSolid),
}

/// Solved sketch geometry in exact form, ready for sweeping or tessellation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileGeometry {
    pub points: Vec<Point2>,
    pub segments: Vec<Segment>,
    pub circles: Vec<CircleShape>,
    pub arcs: Vec<ArcShape>,
}

impl ProfileGeometry {
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
            && self.segments.is_empty()
            && self.circles.is_empty()
            && self.arcs.is_empty()
    }
}

/// A solid described as a profile swept out of the sketch plane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweptSolid {
    pub profile: ProfileGeometry,
    pub sweep: Sweep,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Sweep {
    /// Linear sweep along the sketch-plane normal.
    Extrude { height: f64 },
    /// Rotation about an in-plane axis by `angle` radians.
    Revolve {
        axis_origin: Point2,
        axis_dir: Vec2,
        angle: f64,
    },
}
