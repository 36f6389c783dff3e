use serde::{Deserialize, Serialize};

/// Identifier of an entity within its sketch. Allocated by a monotone
/// counter; never reused, stable across undo/redo and serialization.
pub type EntityId = u32;

/// A geometric entity owned by a sketch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: EntityId,
    /// User-pinned. Fixed entities contribute no free parameters to a solve.
    pub fixed: bool,
    pub kind: EntityKind,
}

/// The closed set of entity kinds. The equation builder and the
/// tessellator match exhaustively on this, so a new kind is a
/// compiler-enforced update at every site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityKind {
    Point { x: f64, y: f64 },
    Line { start: EntityId, end: EntityId },
    Circle { center: EntityId, radius: f64 },
    Arc { center: EntityId, start: EntityId, end: EntityId },
}

impl EntityKind {
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Point { .. } => "Point",
            EntityKind::Line { .. } => "Line",
            EntityKind::Circle { .. } => "Circle",
            EntityKind::Arc { .. } => "Arc",
        }
    }

    /// Entity ids this kind refers to (line endpoints, circle center, ...).
    pub fn references(&self) -> Vec<EntityId> {
        match self {
            EntityKind::Point { .. } => Vec::new(),
            EntityKind::Line { start, end } => vec![*start, *end],
            EntityKind::Circle { center, .. } => vec![*center],
            EntityKind::Arc { center, start, end } => vec![*center, *start, *end],
        }
    }
}

impl Entity {
    /// Number of parameters this entity contributes to the solve vector.
    pub fn free_param_count(&self) -> usize {
        if self.fixed {
            return 0;
        }
        match self.kind {
            EntityKind::Point { .. } => 2,
            EntityKind::Circle { .. } => 1,
            EntityKind::Line { .. } | EntityKind::Arc { .. } => 0,
        }
    }
}
