pub mod cache;
pub mod mesh;
pub mod subdivide;

pub use cache::MeshCache;
pub use mesh::{Polyline3, RenderMesh, TriangleMesh};
pub use subdivide::{CancelFlag, CurvePoints, arc_segment_count, circle_segment_count};

use serde::{Deserialize, Serialize};

use burin_document::{FeatureResult, ProfileGeometry, Sweep, SweptSolid};
use burin_geom::{Point2, Point3, Vec2, Vec3};

/// Maximum allowed deviation between an exact curve and its polyline or
/// mesh approximation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChordTolerance {
    pub chord: f64,
}

impl Default for ChordTolerance {
    fn default() -> Self {
        Self { chord: 0.01 }
    }
}

/// Tessellate a committed feature result. Returns `None` only when the
/// cancellation flag fires mid-build.
pub fn tessellate_result(
    result: &FeatureResult,
    tolerance: ChordTolerance,
    cancel: &CancelFlag,
) -> Option<RenderMesh> {
    match result {
        FeatureResult::Profile(profile) => {
            tessellate_profile(profile, tolerance, cancel).map(RenderMesh::Wireframe)
        }
        FeatureResult::Solid(solid) => {
            tessellate_solid(solid, tolerance, cancel).map(RenderMesh::Surface)
        }
    }
}

/// Sketch curves to render polylines on the z=0 plane.
pub fn tessellate_profile(
    profile: &ProfileGeometry,
    tolerance: ChordTolerance,
    cancel: &CancelFlag,
) -> Option<Vec<Polyline3>> {
    let chains = profile_chains(profile, tolerance, cancel)?;
    let mut lines = Vec::with_capacity(chains.len());
    for chain in chains {
        let mut line = Polyline3::default();
        for p in chain {
            line.push(p.lift());
        }
        lines.push(line);
    }
    Some(lines)
}

/// Sweep a profile into a triangle mesh.
pub fn tessellate_solid(
    solid: &SweptSolid,
    tolerance: ChordTolerance,
    cancel: &CancelFlag,
) -> Option<TriangleMesh> {
    let chains = profile_chains(&solid.profile, tolerance, cancel)?;
    match solid.sweep {
        Sweep::Extrude { height } => extrude_walls(&chains, height, cancel),
        Sweep::Revolve {
            axis_origin,
            axis_dir,
            angle,
        } => revolve_walls(&chains, axis_origin, axis_dir, angle, tolerance, cancel),
    }
}

/// Subdivide every profile curve into a vertex chain.
fn profile_chains(
    profile: &ProfileGeometry,
    tolerance: ChordTolerance,
    cancel: &CancelFlag,
) -> Option<Vec<Vec<Point2>>> {
    let mut chains = Vec::new();
    for seg in &profile.segments {
        if cancel.is_cancelled() {
            return None;
        }
        chains.push(CurvePoints::segment(seg).collect());
    }
    for circle in &profile.circles {
        if cancel.is_cancelled() {
            return None;
        }
        chains.push(CurvePoints::circle(circle, tolerance.chord).collect());
    }
    for arc in &profile.arcs {
        if cancel.is_cancelled() {
            return None;
        }
        chains.push(CurvePoints::arc(arc, tolerance.chord).collect());
    }
    Some(chains)
}

fn extrude_walls(
    chains: &[Vec<Point2>],
    height: f64,
    cancel: &CancelFlag,
) -> Option<TriangleMesh> {
    let lift = Vec3::Z * height;
    let mut mesh = TriangleMesh::new();
    for chain in chains {
        if cancel.is_cancelled() {
            return None;
        }
        for w in chain.windows(2) {
            let (p, q) = (w[0], w[1]);
            let d = q - p;
            let normal = Vec3::new(d.y, -d.x, 0.0).normalized().unwrap_or(Vec3::Z);
            let p0 = p.lift();
            let q0 = q.lift();
            mesh.add_quad(p0, q0, q0 + lift, p0 + lift, normal);
        }
    }
    Some(mesh)
}

fn revolve_walls(
    chains: &[Vec<Point2>],
    axis_origin: Point2,
    axis_dir: Vec2,
    angle: f64,
    tolerance: ChordTolerance,
    cancel: &CancelFlag,
) -> Option<TriangleMesh> {
    let origin = axis_origin.lift();
    let axis = Vec3::new(axis_dir.x, axis_dir.y, 0.0);

    // Ring density follows the farthest point from the axis.
    let max_radius = chains
        .iter()
        .flatten()
        .map(|p| ((*p - axis_origin).cross(&axis_dir)).abs())
        .fold(0.0_f64, f64::max);
    let steps = arc_segment_count(max_radius, angle.abs(), tolerance.chord);

    let mut mesh = TriangleMesh::new();
    for chain in chains {
        let mut rings: Vec<Vec<Point3>> = Vec::with_capacity(steps + 1);
        for k in 0..=steps {
            if cancel.is_cancelled() {
                return None;
            }
            let ring_angle = angle * (k as f64) / (steps as f64);
            rings.push(
                chain
                    .iter()
                    .map(|p| {
                        let v = p.lift() - origin;
                        origin + v.rotated_around(&axis, ring_angle)
                    })
                    .collect(),
            );
        }
        for k in 0..steps {
            for j in 0..chain.len().saturating_sub(1) {
                let a = rings[k][j];
                let b = rings[k + 1][j];
                let c = rings[k + 1][j + 1];
                let d = rings[k][j + 1];
                // Quads collapsed onto the axis have no area; skip them.
                if let Some(normal) = ((b - a).cross(&(c - a))).normalized() {
                    mesh.add_quad(a, b, c, d, normal);
                }
            }
        }
    }
    Some(mesh)
}
