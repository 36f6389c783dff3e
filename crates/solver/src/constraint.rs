use serde::{Deserialize, Serialize};

use crate::entity::EntityId;

/// A 2D geometric constraint over entities of one sketch.
///
/// Each kind lowers to one or more scalar equations; see
/// [`Constraint::equation_count`] for the row count per kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Constraint {
    /// Two points are at the same location. Two equations.
    Coincident { a: EntityId, b: EntityId },
    /// Fixed distance between two points.
    Distance { a: EntityId, b: EntityId, value: f64 },
    /// Fixed signed angle (radians) from line `a` to line `b`.
    Angle { a: EntityId, b: EntityId, value: f64 },
    /// Two lines are parallel.
    Parallel { a: EntityId, b: EntityId },
    /// Two lines are perpendicular.
    Perpendicular { a: EntityId, b: EntityId },
    /// A line is tangent to a circle/arc, or two circles are tangent.
    Tangent { a: EntityId, b: EntityId },
    /// Two points share a y coordinate.
    Horizontal { a: EntityId, b: EntityId },
    /// Two points share an x coordinate.
    Vertical { a: EntityId, b: EntityId },
    /// Two entities have equal length/radius.
    Equal { a: EntityId, b: EntityId },
    /// Fixed radius for a circle or arc.
    Radius { entity: EntityId, value: f64 },
}

impl Constraint {
    /// Entity ids referenced by this constraint, in declaration order.
    pub fn references(&self) -> Vec<EntityId> {
        match self {
            Constraint::Coincident { a, b }
            | Constraint::Distance { a, b, .. }
            | Constraint::Angle { a, b, .. }
            | Constraint::Parallel { a, b }
            | Constraint::Perpendicular { a, b }
            | Constraint::Tangent { a, b }
            | Constraint::Horizontal { a, b }
            | Constraint::Vertical { a, b }
            | Constraint::Equal { a, b } => vec![*a, *b],
            Constraint::Radius { entity, .. } => vec![*entity],
        }
    }

    /// Number of scalar equations this constraint contributes.
    pub fn equation_count(&self) -> usize {
        match self {
            Constraint::Coincident { .. } => 2,
            _ => 1,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Constraint::Coincident { .. } => "Coincident",
            Constraint::Distance { .. } => "Distance",
            Constraint::Angle { .. } => "Angle",
            Constraint::Parallel { .. } => "Parallel",
            Constraint::Perpendicular { .. } => "Perpendicular",
            Constraint::Tangent { .. } => "Tangent",
            Constraint::Horizontal { .. } => "Horizontal",
            Constraint::Vertical { .. } => "Vertical",
            Constraint::Equal { .. } => "Equal",
            Constraint::Radius { .. } => "Radius",
        }
    }
}
