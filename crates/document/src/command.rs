use serde::{Deserialize, Serialize};

use burin_solver::{Constraint, EntityId, SketchGraph};

use crate::feature::{Feature, FeatureId, FeatureResult, FeatureState, Operation};

/// One reversible edit to a document.
///
/// Commands are the only mutation path; scripting and tutorial collaborators
/// use the same surface as the interactive front-end. Applying a command
/// captures the state needed to invert it, runs the recompute cascade, and
/// returns a consistent snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    AddFeature {
        name: String,
        operation: Operation,
        /// Assigned on first apply so a redo recreates the same feature id.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<FeatureId>,
    },
    RemoveFeature {
        id: FeatureId,
    },
    EditOperation {
        id: FeatureId,
        operation: Operation,
    },
    SetSuppressed {
        id: FeatureId,
        suppressed: bool,
    },
    AddEntity {
        sketch: FeatureId,
        entity: EntitySpec,
    },
    RemoveEntity {
        sketch: FeatureId,
        entity: EntityId,
    },
    AddConstraint {
        sketch: FeatureId,
        constraint: Constraint,
    },
    RemoveConstraint {
        sketch: FeatureId,
        index: usize,
    },
    SetPoint {
        sketch: FeatureId,
        entity: EntityId,
        x: f64,
        y: f64,
    },
    SetRadius {
        sketch: FeatureId,
        entity: EntityId,
        radius: f64,
    },
    SetFixed {
        sketch: FeatureId,
        entity: EntityId,
        fixed: bool,
    },
}

/// Entity creation payload; the sketch allocates the id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntitySpec {
    Point { x: f64, y: f64 },
    Line { start: EntityId, end: EntityId },
    Circle { center: EntityId, radius: f64 },
    Arc { center: EntityId, start: EntityId, end: EntityId },
}

/// Captured pre-command state, applied to roll a command back.
#[derive(Debug, Clone)]
pub(crate) enum Inverse {
    /// Inverts AddFeature.
    RemoveFeature { id: FeatureId },
    /// Inverts RemoveFeature: the feature exactly as it was, with its
    /// committed result so no re-solve is needed.
    RestoreFeature {
        index: usize,
        feature: Box<Feature>,
        result: Option<FeatureResult>,
    },
    /// Inverts EditOperation and SetSuppressed-style feature edits.
    RestoreOperation {
        id: FeatureId,
        operation: Box<Operation>,
        result: Option<FeatureResult>,
        state: FeatureState,
        error: Option<String>,
    },
    SetSuppressed {
        id: FeatureId,
        suppressed: bool,
    },
    /// Inverts any sketch-graph mutation: the whole graph as it was
    /// (parameters included), plus the committed result.
    RestoreSketch {
        sketch: FeatureId,
        graph: Box<SketchGraph>,
        result: Option<FeatureResult>,
        state: FeatureState,
        error: Option<String>,
    },
}
