//! Parameter packing and equation evaluation for one sketch.
//!
//! The solver works on a flat parameter vector holding every non-fixed
//! entity parameter. `System` owns a snapshot of the sketch's entities and
//! constraints so residual evaluation never aliases the graph being solved.

use std::collections::HashMap;
use std::f64::consts::TAU;

use nalgebra::{DMatrix, DVector};

use crate::constraint::Constraint;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::graph::SketchGraph;

/// One free scalar in the solve vector.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Slot {
    pub entity: EntityId,
    /// 0 = x (or radius for circles), 1 = y.
    pub comp: u8,
}

pub(crate) struct System {
    entities: Vec<Entity>,
    constraints: Vec<Constraint>,
    slots: Vec<Slot>,
    initial: Vec<f64>,
    index: HashMap<(EntityId, u8), usize>,
    /// Total scalar equation count, implicit arc equations included.
    pub rows: usize,
}

impl System {
    pub fn build(graph: &SketchGraph) -> Self {
        let entities: Vec<Entity> = graph.entities().to_vec();
        let constraints: Vec<Constraint> = graph.constraints().to_vec();

        let mut slots = Vec::new();
        let mut initial = Vec::new();
        let mut index = HashMap::new();
        for e in &entities {
            if e.fixed {
                continue;
            }
            match e.kind {
                EntityKind::Point { x, y } => {
                    index.insert((e.id, 0), slots.len());
                    slots.push(Slot { entity: e.id, comp: 0 });
                    initial.push(x);
                    index.insert((e.id, 1), slots.len());
                    slots.push(Slot { entity: e.id, comp: 1 });
                    initial.push(y);
                }
                EntityKind::Circle { radius, .. } => {
                    index.insert((e.id, 0), slots.len());
                    slots.push(Slot { entity: e.id, comp: 0 });
                    initial.push(radius);
                }
                EntityKind::Line { .. } | EntityKind::Arc { .. } => {}
            }
        }

        let mut rows: usize = constraints.iter().map(|c| c.equation_count()).sum();
        for e in &entities {
            if let EntityKind::Arc { center, start, end } = e.kind {
                if arc_equation_active(&entities, center, start, end) {
                    rows += 1;
                }
            }
        }

        Self {
            entities,
            constraints,
            slots,
            initial,
            index,
            rows,
        }
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    pub fn initial_vector(&self) -> DVector<f64> {
        DVector::from_vec(self.initial.clone())
    }

    /// Write solved parameters back into the live graph.
    pub fn write_back(&self, graph: &mut SketchGraph, params: &DVector<f64>) {
        for (i, slot) in self.slots.iter().enumerate() {
            graph.write_param(slot.entity, slot.comp, params[i]);
        }
    }

    /// Fill `out` (length `self.rows`) with all residuals at `params`.
    pub fn residuals(&self, params: &DVector<f64>, out: &mut DVector<f64>) {
        let mut row = 0;
        for c in &self.constraints {
            row = self.constraint_residuals(c, params, out, row);
        }
        for e in &self.entities {
            if let EntityKind::Arc { center, start, end } = e.kind {
                if arc_equation_active(&self.entities, center, start, end) {
                    let (cx, cy) = self.point_xy(center, params);
                    let (sx, sy) = self.point_xy(start, params);
                    let (ex, ey) = self.point_xy(end, params);
                    let r_start = ((sx - cx).powi(2) + (sy - cy).powi(2)).sqrt();
                    let r_end = ((ex - cx).powi(2) + (ey - cy).powi(2)).sqrt();
                    out[row] = r_start - r_end;
                    row += 1;
                }
            }
        }
        debug_assert_eq!(row, self.rows);
    }

    fn constraint_residuals(
        &self,
        constraint: &Constraint,
        params: &DVector<f64>,
        out: &mut DVector<f64>,
        row: usize,
    ) -> usize {
        match constraint {
            Constraint::Coincident { a, b } => {
                let (ax, ay) = self.point_xy(*a, params);
                let (bx, by) = self.point_xy(*b, params);
                out[row] = ax - bx;
                out[row + 1] = ay - by;
                row + 2
            }
            Constraint::Distance { a, b, value } => {
                let (ax, ay) = self.point_xy(*a, params);
                let (bx, by) = self.point_xy(*b, params);
                let dist = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
                out[row] = dist - value;
                row + 1
            }
            Constraint::Angle { a, b, value } => {
                let (dax, day) = self.line_dir(*a, params);
                let (dbx, dby) = self.line_dir(*b, params);
                let cross = dax * dby - day * dbx;
                let dot = dax * dbx + day * dby;
                out[row] = wrap_angle(cross.atan2(dot) - value);
                row + 1
            }
            Constraint::Parallel { a, b } => {
                let (dax, day) = self.line_dir(*a, params);
                let (dbx, dby) = self.line_dir(*b, params);
                out[row] = dax * dby - day * dbx;
                row + 1
            }
            Constraint::Perpendicular { a, b } => {
                let (dax, day) = self.line_dir(*a, params);
                let (dbx, dby) = self.line_dir(*b, params);
                out[row] = dax * dbx + day * dby;
                row + 1
            }
            Constraint::Tangent { a, b } => {
                out[row] = self.tangent_residual(*a, *b, params);
                row + 1
            }
            Constraint::Horizontal { a, b } => {
                let (_, ay) = self.point_xy(*a, params);
                let (_, by) = self.point_xy(*b, params);
                out[row] = ay - by;
                row + 1
            }
            Constraint::Vertical { a, b } => {
                let (ax, _) = self.point_xy(*a, params);
                let (bx, _) = self.point_xy(*b, params);
                out[row] = ax - bx;
                row + 1
            }
            Constraint::Equal { a, b } => {
                out[row] = self.length_of(*a, params) - self.length_of(*b, params);
                row + 1
            }
            Constraint::Radius { entity, value } => {
                out[row] = self.radius_of(*entity, params) - value;
                row + 1
            }
        }
    }

    /// Tangency between a line and a curve (center-to-line distance equals
    /// radius) or two curves (center distance equals sum or absolute
    /// difference of radii, whichever branch the current configuration is
    /// nearer to).
    fn tangent_residual(&self, a: EntityId, b: EntityId, params: &DVector<f64>) -> f64 {
        let line = match (self.kind_of(a), self.kind_of(b)) {
            (Some(EntityKind::Line { .. }), _) => Some(a),
            (_, Some(EntityKind::Line { .. })) => Some(b),
            _ => None,
        };

        match line {
            Some(line_id) => {
                let curve_id = if line_id == a { b } else { a };
                let (dx, dy) = self.line_dir(line_id, params);
                let len = (dx * dx + dy * dy).sqrt();
                let r = self.radius_of(curve_id, params);
                if len < 1e-15 {
                    return r;
                }
                let (sx, sy) = self.line_anchor(line_id, params);
                let (cx, cy) = self.curve_center(curve_id, params);
                let dist = ((cx - sx) * dy - (cy - sy) * dx).abs() / len;
                dist - r
            }
            None => {
                let (ax, ay) = self.curve_center(a, params);
                let (bx, by) = self.curve_center(b, params);
                let ra = self.radius_of(a, params);
                let rb = self.radius_of(b, params);
                let dist = ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt();
                let external = dist - (ra + rb);
                let internal = dist - (ra - rb).abs();
                if external.abs() <= internal.abs() {
                    external
                } else {
                    internal
                }
            }
        }
    }

    // ── Entity evaluation ────────────────────────────────────────────────

    fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        self.entities.iter().find(|e| e.id == id).map(|e| e.kind)
    }

    fn param(&self, id: EntityId, comp: u8, params: &DVector<f64>, stored: f64) -> f64 {
        match self.index.get(&(id, comp)) {
            Some(&i) => params[i],
            None => stored,
        }
    }

    fn point_xy(&self, id: EntityId, params: &DVector<f64>) -> (f64, f64) {
        match self.kind_of(id) {
            Some(EntityKind::Point { x, y }) => {
                (self.param(id, 0, params, x), self.param(id, 1, params, y))
            }
            _ => (0.0, 0.0),
        }
    }

    fn line_dir(&self, id: EntityId, params: &DVector<f64>) -> (f64, f64) {
        match self.kind_of(id) {
            Some(EntityKind::Line { start, end }) => {
                let (sx, sy) = self.point_xy(start, params);
                let (ex, ey) = self.point_xy(end, params);
                (ex - sx, ey - sy)
            }
            _ => (1.0, 0.0),
        }
    }

    fn line_anchor(&self, id: EntityId, params: &DVector<f64>) -> (f64, f64) {
        match self.kind_of(id) {
            Some(EntityKind::Line { start, .. }) => self.point_xy(start, params),
            _ => (0.0, 0.0),
        }
    }

    fn curve_center(&self, id: EntityId, params: &DVector<f64>) -> (f64, f64) {
        match self.kind_of(id) {
            Some(EntityKind::Circle { center, .. }) | Some(EntityKind::Arc { center, .. }) => {
                self.point_xy(center, params)
            }
            _ => (0.0, 0.0),
        }
    }

    fn radius_of(&self, id: EntityId, params: &DVector<f64>) -> f64 {
        match self.kind_of(id) {
            Some(EntityKind::Circle { radius, .. }) => self.param(id, 0, params, radius),
            Some(EntityKind::Arc { center, start, .. }) => {
                let (cx, cy) = self.point_xy(center, params);
                let (sx, sy) = self.point_xy(start, params);
                ((sx - cx).powi(2) + (sy - cy).powi(2)).sqrt()
            }
            _ => 0.0,
        }
    }

    fn length_of(&self, id: EntityId, params: &DVector<f64>) -> f64 {
        match self.kind_of(id) {
            Some(EntityKind::Line { start, end }) => {
                let (sx, sy) = self.point_xy(start, params);
                let (ex, ey) = self.point_xy(end, params);
                ((ex - sx).powi(2) + (ey - sy).powi(2)).sqrt()
            }
            Some(EntityKind::Circle { .. }) | Some(EntityKind::Arc { .. }) => {
                self.radius_of(id, params)
            }
            _ => 0.0,
        }
    }
}

/// The arc radius-consistency equation is system-generated; suppress it when
/// every participating point is pinned so fully-fixed construction geometry
/// cannot trip the over-constraint pre-check.
fn arc_equation_active(
    entities: &[Entity],
    center: EntityId,
    start: EntityId,
    end: EntityId,
) -> bool {
    let fixed = |id: EntityId| {
        entities
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.fixed)
            .unwrap_or(true)
    };
    !(fixed(center) && fixed(start) && fixed(end))
}

/// Normalize an angle residual into (-pi, pi].
fn wrap_angle(r: f64) -> f64 {
    r - TAU * (r / TAU).round()
}

/// Central finite-difference Jacobian of the residual vector.
///
/// Most constraints touch at most four parameters, so the matrix is sparse
/// in structure; at sketch scale a dense representation factors faster than
/// anything cleverer.
pub(crate) fn jacobian(sys: &System, params: &DVector<f64>) -> DMatrix<f64> {
    let n = sys.slot_count();
    let m = sys.rows;
    let mut jac = DMatrix::zeros(m, n);
    let mut work = params.clone();
    let mut plus = DVector::zeros(m);
    let mut minus = DVector::zeros(m);

    for col in 0..n {
        let orig = work[col];
        let h = 1e-7 * (1.0 + orig.abs());
        work[col] = orig + h;
        sys.residuals(&work, &mut plus);
        work[col] = orig - h;
        sys.residuals(&work, &mut minus);
        work[col] = orig;
        for row in 0..m {
            jac[(row, col)] = (plus[row] - minus[row]) / (2.0 * h);
        }
    }
    jac
}

/// Numerical rank via SVD with the conventional `max_sv * max(m,n) * eps`
/// threshold.
pub(crate) fn jacobian_rank(jac: &DMatrix<f64>) -> usize {
    let (m, n) = jac.shape();
    let svd = jac.clone().svd(false, false);
    let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
    if max_sv == 0.0 {
        return 0;
    }
    let threshold = max_sv * (m.max(n) as f64) * f64::EPSILON;
    svd.singular_values.iter().filter(|&&s| s > threshold).count()
}

/// Rank-based degrees of freedom at the graph's current parameters.
pub(crate) fn rank_dof(graph: &SketchGraph) -> usize {
    let sys = System::build(graph);
    let n = sys.slot_count();
    if n == 0 {
        return 0;
    }
    if sys.rows == 0 {
        return n;
    }
    let params = sys.initial_vector();
    let jac = jacobian(&sys, &params);
    n.saturating_sub(jacobian_rank(&jac))
}
