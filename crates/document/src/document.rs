use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use burin_geom::{ArcShape, CircleShape, Point2, Segment, Tolerance, Vec2};
use burin_solver::{
    EntityId, EntityKind, GraphError, SketchGraph, SolveConfig, solve_sketch,
};

use crate::command::{Command, EntitySpec, Inverse};
use crate::feature::{
    Feature, FeatureId, FeatureResult, FeatureState, Operation, ProfileGeometry, Sweep, SweptSolid,
};
use crate::history::{History, HistoryEntry};

/// Structural errors from document edits. Solver and geometry failures
/// during recompute are not errors at this level: the command succeeds and
/// the affected feature carries an `Error` state instead.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DocumentError {
    #[error("feature not found: {id}")]
    FeatureNotFound { id: FeatureId },

    #[error("duplicate feature id: {id}")]
    DuplicateFeature { id: FeatureId },

    #[error("feature {id} is not a sketch")]
    NotASketch { id: FeatureId },

    #[error("dependency {dep} of feature {feature} would break the build order")]
    CyclicDependency { feature: FeatureId, dep: FeatureId },

    #[error("constraint graph error: {0}")]
    Graph(#[from] GraphError),

    #[error("nothing to undo")]
    NothingToUndo,

    #[error("nothing to redo")]
    NothingToRedo,
}

/// Notification that a feature changed state (or was recomputed) during the
/// last cascade. The front-end uses these to redraw only affected regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    pub feature_id: FeatureId,
    pub new_state: FeatureState,
}

/// Per-feature health report for inspector panels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub state: FeatureState,
    /// Remaining degrees of freedom; only sketches have one.
    pub dof: Option<usize>,
    pub error_detail: Option<String>,
}

/// Immutable view handed to the front-end after every command. Safe to move
/// across threads; nothing in it aliases the live document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    /// Features recomputed or re-stated by the cascade, in build order.
    pub changes: Vec<StateChange>,
    /// Set when the command created a feature.
    pub created_feature: Option<FeatureId>,
    /// Set when the command created a sketch entity.
    pub created_entity: Option<EntityId>,
    /// Every feature's state after the cascade, in build order.
    pub states: Vec<(FeatureId, FeatureState)>,
}

#[derive(Debug, Default, Clone, Copy)]
struct Created {
    feature: Option<FeatureId>,
    entity: Option<EntityId>,
}

/// The owning model: an ordered feature list (build order = dependency
/// order), committed results, and the undo history. All mutation goes
/// through [`Document::apply`], which leaves the document fully consistent
/// (or in a reported error state) before returning.
#[derive(Debug)]
pub struct Document {
    features: Vec<Feature>,
    results: HashMap<FeatureId, FeatureResult>,
    /// Monotone revision per feature, bumped when its committed result
    /// changes. Render caches key off this.
    revisions: HashMap<FeatureId, u64>,
    rev_counter: u64,
    history: History,
    pub solve_config: SolveConfig,
    pub tolerance: Tolerance,
}

impl Document {
    pub fn new() -> Self {
        Self {
            features: Vec::new(),
            results: HashMap::new(),
            revisions: HashMap::new(),
            rev_counter: 0,
            history: History::new(),
            solve_config: SolveConfig::default(),
            tolerance: Tolerance::default(),
        }
    }

    /// Rebuild a document from a deserialized feature list. Every feature
    /// starts dirty; run one recompute to restore solved geometry.
    pub fn from_features(features: Vec<Feature>) -> Result<Self, DocumentError> {
        let mut doc = Self::new();
        for mut feature in features {
            if doc.feature(feature.id).is_some() {
                return Err(DocumentError::DuplicateFeature { id: feature.id });
            }
            feature.deps = feature.operation.implied_deps();
            doc.validate_deps(&feature.deps, doc.features.len(), feature.id)?;
            feature.state = FeatureState::Dirty;
            feature.error = None;
            doc.features.push(feature);
        }
        Ok(doc)
    }

    // ── Command surface ──────────────────────────────────────────────────

    /// Apply one command: validate, mutate, record history, recompute.
    pub fn apply(&mut self, mut command: Command) -> Result<DocumentSnapshot, DocumentError> {
        let (inverse, created) = self.execute(&mut command)?;
        self.history.push(HistoryEntry { command, inverse });
        let changes = self.recompute();
        Ok(self.snapshot(changes, created))
    }

    pub fn undo(&mut self) -> Result<DocumentSnapshot, DocumentError> {
        let entry = self.history.pop_undo().ok_or(DocumentError::NothingToUndo)?;
        self.apply_inverse(entry.inverse.clone());
        self.history.push_redo(entry);
        let changes = self.recompute();
        Ok(self.snapshot(changes, Created::default()))
    }

    pub fn redo(&mut self) -> Result<DocumentSnapshot, DocumentError> {
        let HistoryEntry {
            command: mut replay,
            inverse: old_inverse,
        } = self.history.pop_redo().ok_or(DocumentError::NothingToRedo)?;
        let (inverse, created) = match self.execute(&mut replay) {
            Ok(v) => v,
            Err(e) => {
                self.history.push_redo(HistoryEntry {
                    command: replay,
                    inverse: old_inverse,
                });
                return Err(e);
            }
        };
        self.history.push_undo_only(HistoryEntry {
            command: replay,
            inverse,
        });
        let changes = self.recompute();
        Ok(self.snapshot(changes, created))
    }

    /// Run the recompute cascade outside any command, e.g. right after a
    /// document is loaded with every feature dirty.
    pub fn rebuild(&mut self) -> DocumentSnapshot {
        let changes = self.recompute();
        self.snapshot(changes, Created::default())
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn feature(&self, id: FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn result(&self, id: FeatureId) -> Option<&FeatureResult> {
        self.results.get(&id)
    }

    pub fn revision(&self, id: FeatureId) -> Option<u64> {
        self.revisions.get(&id).copied()
    }

    pub fn sketch_graph(&self, id: FeatureId) -> Result<&SketchGraph, DocumentError> {
        match self.feature(id) {
            Some(Feature {
                operation: Operation::Sketch { graph },
                ..
            }) => Ok(graph),
            Some(_) => Err(DocumentError::NotASketch { id }),
            None => Err(DocumentError::FeatureNotFound { id }),
        }
    }

    pub fn diagnostics(&self, id: FeatureId) -> Result<Diagnostics, DocumentError> {
        let f = self
            .feature(id)
            .ok_or(DocumentError::FeatureNotFound { id })?;
        let dof = match &f.operation {
            Operation::Sketch { graph } => Some(graph.degrees_of_freedom()),
            _ => None,
        };
        Ok(Diagnostics {
            state: f.state,
            dof,
            error_detail: f.error.clone(),
        })
    }

    // ── Command execution ────────────────────────────────────────────────

    fn execute(&mut self, command: &mut Command) -> Result<(Inverse, Created), DocumentError> {
        match command {
            Command::AddFeature {
                name,
                operation,
                id,
            } => {
                let feature_id = id.unwrap_or_else(Uuid::new_v4);
                if self.feature(feature_id).is_some() {
                    return Err(DocumentError::DuplicateFeature { id: feature_id });
                }
                let deps = operation.implied_deps();
                self.validate_deps(&deps, self.features.len(), feature_id)?;
                *id = Some(feature_id);
                self.features.push(Feature {
                    id: feature_id,
                    name: name.clone(),
                    operation: operation.clone(),
                    deps,
                    suppressed: false,
                    state: FeatureState::Dirty,
                    error: None,
                });
                Ok((
                    Inverse::RemoveFeature { id: feature_id },
                    Created {
                        feature: Some(feature_id),
                        entity: None,
                    },
                ))
            }

            Command::RemoveFeature { id } => {
                let index = self
                    .index_of(*id)
                    .ok_or(DocumentError::FeatureNotFound { id: *id })?;
                let feature = self.features.remove(index);
                let result = self.results.remove(id);
                self.revisions.remove(id);
                self.mark_dependents_dirty(*id);
                Ok((
                    Inverse::RestoreFeature {
                        index,
                        feature: Box::new(feature),
                        result,
                    },
                    Created::default(),
                ))
            }

            Command::EditOperation { id, operation } => {
                let index = self
                    .index_of(*id)
                    .ok_or(DocumentError::FeatureNotFound { id: *id })?;
                let deps = operation.implied_deps();
                self.validate_deps(&deps, index, *id)?;
                let result = self.results.get(id).cloned();
                let f = &mut self.features[index];
                let old_operation = std::mem::replace(&mut f.operation, operation.clone());
                let inverse = Inverse::RestoreOperation {
                    id: *id,
                    operation: Box::new(old_operation),
                    result,
                    state: f.state,
                    error: f.error.take(),
                };
                f.deps = deps;
                f.state = FeatureState::Dirty;
                Ok((inverse, Created::default()))
            }

            Command::SetSuppressed { id, suppressed } => {
                let f = self.feature_mut(*id)?;
                let old = f.suppressed;
                f.suppressed = *suppressed;
                f.state = FeatureState::Dirty;
                Ok((
                    Inverse::SetSuppressed {
                        id: *id,
                        suppressed: old,
                    },
                    Created::default(),
                ))
            }

            Command::AddEntity { sketch, entity } => {
                let inverse = self.capture_sketch(*sketch)?;
                let graph = self.sketch_graph_mut(*sketch)?;
                let created = match entity {
                    EntitySpec::Point { x, y } => graph.add_point(*x, *y),
                    EntitySpec::Line { start, end } => graph.add_line(*start, *end)?,
                    EntitySpec::Circle { center, radius } => graph.add_circle(*center, *radius)?,
                    EntitySpec::Arc { center, start, end } => {
                        graph.add_arc(*center, *start, *end)?
                    }
                };
                self.touch_sketch(*sketch);
                Ok((
                    inverse,
                    Created {
                        feature: None,
                        entity: Some(created),
                    },
                ))
            }

            Command::RemoveEntity { sketch, entity } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?.remove_entity(*entity)?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }

            Command::AddConstraint { sketch, constraint } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?
                    .add_constraint(constraint.clone())?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }

            Command::RemoveConstraint { sketch, index } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?.remove_constraint(*index)?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }

            Command::SetPoint {
                sketch,
                entity,
                x,
                y,
            } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?.set_point(*entity, *x, *y)?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }

            Command::SetRadius {
                sketch,
                entity,
                radius,
            } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?.set_radius(*entity, *radius)?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }

            Command::SetFixed {
                sketch,
                entity,
                fixed,
            } => {
                let inverse = self.capture_sketch(*sketch)?;
                self.sketch_graph_mut(*sketch)?.set_fixed(*entity, *fixed)?;
                self.touch_sketch(*sketch);
                Ok((inverse, Created::default()))
            }
        }
    }

    fn apply_inverse(&mut self, inverse: Inverse) {
        match inverse {
            Inverse::RemoveFeature { id } => {
                if let Some(i) = self.index_of(id) {
                    self.features.remove(i);
                }
                self.results.remove(&id);
                self.revisions.remove(&id);
                self.mark_dependents_dirty(id);
            }
            Inverse::RestoreFeature {
                index,
                feature,
                result,
            } => {
                let id = feature.id;
                let index = index.min(self.features.len());
                self.features.insert(index, *feature);
                self.set_result(id, result);
                self.mark_dependents_dirty(id);
            }
            Inverse::RestoreOperation {
                id,
                operation,
                result,
                state,
                error,
            } => {
                if let Some(f) = self.features.iter_mut().find(|f| f.id == id) {
                    f.operation = *operation;
                    let deps = f.operation.implied_deps();
                    f.deps = deps;
                    f.state = state;
                    f.error = error;
                }
                self.set_result(id, result);
                self.mark_dependents_dirty(id);
            }
            Inverse::SetSuppressed { id, suppressed } => {
                if let Some(f) = self.features.iter_mut().find(|f| f.id == id) {
                    f.suppressed = suppressed;
                    f.state = FeatureState::Dirty;
                }
                self.mark_dependents_dirty(id);
            }
            Inverse::RestoreSketch {
                sketch,
                graph,
                result,
                state,
                error,
            } => {
                if let Some(f) = self.features.iter_mut().find(|f| f.id == sketch) {
                    if let Operation::Sketch { graph: live } = &mut f.operation {
                        *live = *graph;
                    }
                    f.state = state;
                    f.error = error;
                }
                self.set_result(sketch, result);
                self.mark_dependents_dirty(sketch);
            }
        }
    }

    // ── Recompute cascade ────────────────────────────────────────────────

    /// Topological walk of the feature list. A feature is recomputed only if
    /// it is dirty or an upstream feature changed this pass; a failure marks
    /// downstream dependents `Blocked` instead of letting them consume stale
    /// data.
    #[instrument(skip_all, fields(features = self.features.len()))]
    fn recompute(&mut self) -> Vec<StateChange> {
        let mut changes = Vec::new();
        // Features whose committed result or state changed this pass.
        // Downstream dependents of a touched feature must re-evaluate, even
        // when the change was a failure.
        let mut touched: HashSet<FeatureId> = HashSet::new();
        let mut broken: HashSet<FeatureId> = HashSet::new();

        for i in 0..self.features.len() {
            let (id, suppressed, prior, deps) = {
                let f = &self.features[i];
                (f.id, f.suppressed, f.state, f.deps.clone())
            };

            if suppressed {
                if self.results.remove(&id).is_some() {
                    self.revisions.remove(&id);
                    touched.insert(id);
                }
                broken.insert(id);
                self.features[i].state = FeatureState::Dirty;
                if prior != FeatureState::Dirty {
                    touched.insert(id);
                    changes.push(StateChange {
                        feature_id: id,
                        new_state: FeatureState::Dirty,
                    });
                }
                continue;
            }

            let upstream_changed = deps.iter().any(|d| touched.contains(d));
            let upstream_broken = deps
                .iter()
                .any(|d| broken.contains(d) || !self.results.contains_key(d));

            if prior != FeatureState::Dirty && !upstream_changed {
                // Untouched this pass; an old failure still blocks downstream.
                if matches!(prior, FeatureState::Error | FeatureState::Blocked) {
                    broken.insert(id);
                }
                continue;
            }

            if upstream_broken {
                self.features[i].state = FeatureState::Blocked;
                self.features[i].error = None;
                broken.insert(id);
                if prior != FeatureState::Blocked {
                    touched.insert(id);
                    changes.push(StateChange {
                        feature_id: id,
                        new_state: FeatureState::Blocked,
                    });
                }
                continue;
            }

            self.features[i].state = FeatureState::Solving;
            let outcome = match &mut self.features[i].operation {
                Operation::Sketch { graph } => {
                    compute_sketch(graph, &self.solve_config, &self.tolerance)
                }
                Operation::Extrude { sketch, height } => {
                    compute_extrude(&self.results, *sketch, *height, &self.tolerance)
                }
                Operation::Revolve {
                    sketch,
                    axis_origin,
                    axis_dir,
                    angle,
                } => compute_revolve(
                    &self.results,
                    *sketch,
                    *axis_origin,
                    *axis_dir,
                    *angle,
                    &self.tolerance,
                ),
            };

            match outcome {
                Ok(result) => {
                    self.results.insert(id, result);
                    self.bump_revision(id);
                    self.features[i].state = FeatureState::Clean;
                    self.features[i].error = None;
                    touched.insert(id);
                    changes.push(StateChange {
                        feature_id: id,
                        new_state: FeatureState::Clean,
                    });
                }
                Err(detail) => {
                    debug!(feature = %id, %detail, "feature recompute failed");
                    self.features[i].state = FeatureState::Error;
                    self.features[i].error = Some(detail);
                    touched.insert(id);
                    broken.insert(id);
                    changes.push(StateChange {
                        feature_id: id,
                        new_state: FeatureState::Error,
                    });
                }
            }
        }

        info!(changed = changes.len(), "recompute cascade complete");
        changes
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn snapshot(&self, changes: Vec<StateChange>, created: Created) -> DocumentSnapshot {
        DocumentSnapshot {
            changes,
            created_feature: created.feature,
            created_entity: created.entity,
            states: self.features.iter().map(|f| (f.id, f.state)).collect(),
        }
    }

    fn index_of(&self, id: FeatureId) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    fn feature_mut(&mut self, id: FeatureId) -> Result<&mut Feature, DocumentError> {
        self.features
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or(DocumentError::FeatureNotFound { id })
    }

    fn sketch_graph_mut(&mut self, id: FeatureId) -> Result<&mut SketchGraph, DocumentError> {
        match self.features.iter_mut().find(|f| f.id == id) {
            Some(Feature {
                operation: Operation::Sketch { graph },
                ..
            }) => Ok(graph),
            Some(_) => Err(DocumentError::NotASketch { id }),
            None => Err(DocumentError::FeatureNotFound { id }),
        }
    }

    fn capture_sketch(&self, id: FeatureId) -> Result<Inverse, DocumentError> {
        let f = self
            .feature(id)
            .ok_or(DocumentError::FeatureNotFound { id })?;
        match &f.operation {
            Operation::Sketch { graph } => Ok(Inverse::RestoreSketch {
                sketch: id,
                graph: Box::new(graph.clone()),
                result: self.results.get(&id).cloned(),
                state: f.state,
                error: f.error.clone(),
            }),
            _ => Err(DocumentError::NotASketch { id }),
        }
    }

    fn touch_sketch(&mut self, id: FeatureId) {
        if let Some(f) = self.features.iter_mut().find(|f| f.id == id) {
            f.state = FeatureState::Dirty;
        }
    }

    fn mark_dependents_dirty(&mut self, id: FeatureId) {
        for f in &mut self.features {
            if f.deps.contains(&id) && !f.suppressed {
                f.state = FeatureState::Dirty;
            }
        }
    }

    fn set_result(&mut self, id: FeatureId, result: Option<FeatureResult>) {
        match result {
            Some(r) => {
                self.results.insert(id, r);
                self.bump_revision(id);
            }
            None => {
                self.results.remove(&id);
                self.revisions.remove(&id);
            }
        }
    }

    fn bump_revision(&mut self, id: FeatureId) {
        self.rev_counter += 1;
        self.revisions.insert(id, self.rev_counter);
    }

    fn validate_deps(
        &self,
        deps: &[FeatureId],
        limit: usize,
        feature: FeatureId,
    ) -> Result<(), DocumentError> {
        for dep in deps {
            let idx = self
                .index_of(*dep)
                .ok_or(DocumentError::FeatureNotFound { id: *dep })?;
            // Build order is the DAG's topological order: an edge to a
            // feature at or after `limit` would create a cycle in it.
            if idx >= limit {
                return Err(DocumentError::CyclicDependency {
                    feature,
                    dep: *dep,
                });
            }
            if !matches!(self.features[idx].operation, Operation::Sketch { .. }) {
                return Err(DocumentError::NotASketch { id: *dep });
            }
        }
        Ok(())
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

// ── Feature computation ──────────────────────────────────────────────────

fn compute_sketch(
    graph: &mut SketchGraph,
    config: &SolveConfig,
    tol: &Tolerance,
) -> Result<FeatureResult, String> {
    solve_sketch(graph, config).map_err(|e| e.to_string())?;
    let profile = profile_from_graph(graph, tol)?;
    graph.mark_clean();
    Ok(FeatureResult::Profile(profile))
}

/// Turn solved sketch entities into exact geometry. Degenerate results
/// (collapsed segments, zero radii) surface as feature errors.
fn profile_from_graph(graph: &SketchGraph, tol: &Tolerance) -> Result<ProfileGeometry, String> {
    let mut profile = ProfileGeometry::default();
    for e in graph.entities() {
        match e.kind {
            EntityKind::Point { x, y } => profile.points.push(Point2::new(x, y)),
            EntityKind::Line { start, end } => {
                let start = point_of(graph, start)?;
                let end = point_of(graph, end)?;
                let seg = Segment::new(start, end, tol).map_err(|e| e.to_string())?;
                profile.segments.push(seg);
            }
            EntityKind::Circle { center, radius } => {
                let center = point_of(graph, center)?;
                let circle = CircleShape::new(center, radius, tol).map_err(|e| e.to_string())?;
                profile.circles.push(circle);
            }
            EntityKind::Arc { center, start, end } => {
                let center = point_of(graph, center)?;
                let start = point_of(graph, start)?;
                let end = point_of(graph, end)?;
                let arc =
                    ArcShape::from_points(center, start, end, tol).map_err(|e| e.to_string())?;
                profile.arcs.push(arc);
            }
        }
    }
    Ok(profile)
}

fn point_of(graph: &SketchGraph, id: EntityId) -> Result<Point2, String> {
    let (x, y) = graph.point_position(id).map_err(|e| e.to_string())?;
    Ok(Point2::new(x, y))
}

fn compute_extrude(
    results: &HashMap<FeatureId, FeatureResult>,
    sketch: FeatureId,
    height: f64,
    tol: &Tolerance,
) -> Result<FeatureResult, String> {
    if height.abs() <= tol.coincidence {
        return Err(format!("degenerate extrude height {height}"));
    }
    let profile = profile_result(results, sketch)?;
    if profile.is_empty() {
        return Err("sketch profile is empty".to_string());
    }
    Ok(FeatureResult::Solid(SweptSolid {
        profile: profile.clone(),
        sweep: Sweep::Extrude { height },
    }))
}

fn compute_revolve(
    results: &HashMap<FeatureId, FeatureResult>,
    sketch: FeatureId,
    axis_origin: Point2,
    axis_dir: Vec2,
    angle: f64,
    tol: &Tolerance,
) -> Result<FeatureResult, String> {
    if tol.is_zero_angle(angle) {
        return Err(format!("degenerate revolve angle {angle}"));
    }
    let axis_dir = axis_dir
        .normalized()
        .ok_or_else(|| "degenerate revolve axis".to_string())?;
    let profile = profile_result(results, sketch)?;
    if profile.is_empty() {
        return Err("sketch profile is empty".to_string());
    }
    Ok(FeatureResult::Solid(SweptSolid {
        profile: profile.clone(),
        sweep: Sweep::Revolve {
            axis_origin,
            axis_dir,
            angle,
        },
    }))
}

fn profile_result(
    results: &HashMap<FeatureId, FeatureResult>,
    sketch: FeatureId,
) -> Result<&ProfileGeometry, String> {
    match results.get(&sketch) {
        Some(FeatureResult::Profile(p)) => Ok(p),
        Some(_) => Err("upstream feature is not a sketch profile".to_string()),
        None => Err("upstream sketch has no committed result".to_string()),
    }
}
