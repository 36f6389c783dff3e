use serde::{Deserialize, Serialize};
use thiserror::Error;

use burin_geom::GeometryError;

use crate::constraint::Constraint;
use crate::entity::{Entity, EntityId, EntityKind};
use crate::system::System;

/// Structural errors from mutating a sketch's constraint graph.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("entity {id} does not exist in this sketch")]
    InvalidReference { id: EntityId },

    #[error("an identical constraint already exists")]
    DuplicateConstraint,

    #[error("entity {id} is a {found}, expected a {expected}")]
    KindMismatch {
        id: EntityId,
        expected: &'static str,
        found: &'static str,
    },

    #[error("entity {id} referenced more than once")]
    RepeatedReference { id: EntityId },

    #[error("constraint index {index} is out of range")]
    ConstraintOutOfRange { index: usize },

    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Entities and constraints removed by a cascading [`SketchGraph::remove_entity`],
/// with their original positions so an undo can restore them exactly.
#[derive(Debug, Clone)]
pub struct RemovedSubgraph {
    pub entities: Vec<(usize, Entity)>,
    pub constraints: Vec<(usize, Constraint)>,
}

/// The live entity/constraint set of one sketch.
///
/// Entity ids are allocated by a monotone counter and never reused, so they
/// stay valid across undo/redo and serialization. Every mutation marks the
/// graph dirty; the owning document clears the flag after a successful
/// recompute.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SketchGraph {
    entities: Vec<Entity>,
    constraints: Vec<Constraint>,
    next_id: EntityId,
    #[serde(skip)]
    dirty: bool,
}

impl SketchGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Entities ─────────────────────────────────────────────────────────

    pub fn add_point(&mut self, x: f64, y: f64) -> EntityId {
        let id = self.alloc_id();
        self.entities.push(Entity {
            id,
            fixed: false,
            kind: EntityKind::Point { x, y },
        });
        self.dirty = true;
        id
    }

    pub fn add_line(&mut self, start: EntityId, end: EntityId) -> Result<EntityId, GraphError> {
        self.require_point(start)?;
        self.require_point(end)?;
        if start == end {
            return Err(GraphError::RepeatedReference { id: start });
        }
        let id = self.alloc_id();
        self.entities.push(Entity {
            id,
            fixed: false,
            kind: EntityKind::Line { start, end },
        });
        self.dirty = true;
        Ok(id)
    }

    pub fn add_circle(&mut self, center: EntityId, radius: f64) -> Result<EntityId, GraphError> {
        self.require_point(center)?;
        if radius <= 0.0 {
            return Err(GeometryError::DegenerateCircle { radius }.into());
        }
        let id = self.alloc_id();
        self.entities.push(Entity {
            id,
            fixed: false,
            kind: EntityKind::Circle { center, radius },
        });
        self.dirty = true;
        Ok(id)
    }

    pub fn add_arc(
        &mut self,
        center: EntityId,
        start: EntityId,
        end: EntityId,
    ) -> Result<EntityId, GraphError> {
        self.require_point(center)?;
        self.require_point(start)?;
        self.require_point(end)?;
        for (a, b) in [(center, start), (center, end), (start, end)] {
            if a == b {
                return Err(GraphError::RepeatedReference { id: a });
            }
        }
        let id = self.alloc_id();
        self.entities.push(Entity {
            id,
            fixed: false,
            kind: EntityKind::Arc { center, start, end },
        });
        self.dirty = true;
        Ok(id)
    }

    /// Remove an entity, cascading to every entity and constraint that
    /// references it. Returns the removed pieces for exact restoration.
    pub fn remove_entity(&mut self, id: EntityId) -> Result<RemovedSubgraph, GraphError> {
        if self.entity(id).is_none() {
            return Err(GraphError::InvalidReference { id });
        }

        // Transitive closure of entities to drop: the target plus anything
        // whose references reach it.
        let mut doomed = vec![id];
        loop {
            let before = doomed.len();
            for e in &self.entities {
                if doomed.contains(&e.id) {
                    continue;
                }
                if e.kind.references().iter().any(|r| doomed.contains(r)) {
                    doomed.push(e.id);
                }
            }
            if doomed.len() == before {
                break;
            }
        }

        let mut removed = RemovedSubgraph {
            entities: Vec::new(),
            constraints: Vec::new(),
        };
        for (i, c) in self.constraints.iter().enumerate() {
            if c.references().iter().any(|r| doomed.contains(r)) {
                removed.constraints.push((i, c.clone()));
            }
        }
        for (i, e) in self.entities.iter().enumerate() {
            if doomed.contains(&e.id) {
                removed.entities.push((i, *e));
            }
        }
        // Remove from the back so stored indices stay valid for restore.
        for (i, _) in removed.constraints.iter().rev() {
            self.constraints.remove(*i);
        }
        for (i, _) in removed.entities.iter().rev() {
            self.entities.remove(*i);
        }
        self.dirty = true;
        Ok(removed)
    }

    /// Reinsert a subgraph previously returned by [`Self::remove_entity`].
    pub fn restore_removed(&mut self, removed: RemovedSubgraph) {
        for (i, e) in removed.entities {
            self.entities.insert(i.min(self.entities.len()), e);
        }
        for (i, c) in removed.constraints {
            self.constraints.insert(i.min(self.constraints.len()), c);
        }
        self.dirty = true;
    }

    // ── Constraints ──────────────────────────────────────────────────────

    /// Validate and append a constraint, returning its index.
    pub fn add_constraint(&mut self, constraint: Constraint) -> Result<usize, GraphError> {
        self.validate_constraint(&constraint)?;
        if self.constraints.contains(&constraint) {
            return Err(GraphError::DuplicateConstraint);
        }
        self.constraints.push(constraint);
        self.dirty = true;
        Ok(self.constraints.len() - 1)
    }

    pub fn remove_constraint(&mut self, index: usize) -> Result<Constraint, GraphError> {
        if index >= self.constraints.len() {
            return Err(GraphError::ConstraintOutOfRange { index });
        }
        self.dirty = true;
        Ok(self.constraints.remove(index))
    }

    /// Reinsert a constraint at a specific index (undo path).
    pub fn insert_constraint(
        &mut self,
        index: usize,
        constraint: Constraint,
    ) -> Result<(), GraphError> {
        if index > self.constraints.len() {
            return Err(GraphError::ConstraintOutOfRange { index });
        }
        self.validate_constraint(&constraint)?;
        self.constraints.insert(index, constraint);
        self.dirty = true;
        Ok(())
    }

    // ── Parameter edits ──────────────────────────────────────────────────

    /// Move a point, returning its previous position.
    pub fn set_point(&mut self, id: EntityId, x: f64, y: f64) -> Result<(f64, f64), GraphError> {
        let entity = self.entity_mut(id)?;
        match &mut entity.kind {
            EntityKind::Point { x: px, y: py } => {
                let old = (*px, *py);
                *px = x;
                *py = y;
                self.dirty = true;
                Ok(old)
            }
            other => Err(GraphError::KindMismatch {
                id,
                expected: "Point",
                found: other.name(),
            }),
        }
    }

    /// Change a circle radius, returning the previous value.
    pub fn set_radius(&mut self, id: EntityId, radius: f64) -> Result<f64, GraphError> {
        if radius <= 0.0 {
            return Err(GeometryError::DegenerateCircle { radius }.into());
        }
        let entity = self.entity_mut(id)?;
        match &mut entity.kind {
            EntityKind::Circle { radius: r, .. } => {
                let old = *r;
                *r = radius;
                self.dirty = true;
                Ok(old)
            }
            other => Err(GraphError::KindMismatch {
                id,
                expected: "Circle",
                found: other.name(),
            }),
        }
    }

    /// Pin or release an entity, returning the previous flag.
    pub fn set_fixed(&mut self, id: EntityId, fixed: bool) -> Result<bool, GraphError> {
        let entity = self.entity_mut(id)?;
        let old = entity.fixed;
        entity.fixed = fixed;
        self.dirty = true;
        Ok(old)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.iter().find(|e| e.id == id)
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn point_position(&self, id: EntityId) -> Result<(f64, f64), GraphError> {
        match self.entity(id) {
            Some(Entity {
                kind: EntityKind::Point { x, y },
                ..
            }) => Ok((*x, *y)),
            Some(e) => Err(GraphError::KindMismatch {
                id,
                expected: "Point",
                found: e.kind.name(),
            }),
            None => Err(GraphError::InvalidReference { id }),
        }
    }

    /// Total free parameters contributed by non-fixed entities.
    pub fn free_param_count(&self) -> usize {
        self.entities.iter().map(|e| e.free_param_count()).sum()
    }

    /// Number of scalar equations the current constraint set produces,
    /// including implicit arc-consistency equations.
    pub fn equation_count(&self) -> usize {
        System::build(self).rows
    }

    /// Degrees of freedom: free parameters minus the Jacobian rank at the
    /// current parameter values. Rank-based so redundant constraints do not
    /// double-count.
    pub fn degrees_of_freedom(&self) -> usize {
        crate::system::rank_dof(self)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // ── Internals ────────────────────────────────────────────────────────

    fn alloc_id(&mut self) -> EntityId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Parameter write-back from the solver. Not an edit: does not dirty.
    pub(crate) fn write_param(&mut self, id: EntityId, comp: u8, value: f64) {
        if let Some(entity) = self.entities.iter_mut().find(|e| e.id == id) {
            match (&mut entity.kind, comp) {
                (EntityKind::Point { x, .. }, 0) => *x = value,
                (EntityKind::Point { y, .. }, 1) => *y = value,
                (EntityKind::Circle { radius, .. }, 0) => *radius = value,
                _ => {}
            }
        }
    }

    fn entity_mut(&mut self, id: EntityId) -> Result<&mut Entity, GraphError> {
        self.entities
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(GraphError::InvalidReference { id })
    }

    fn require_point(&self, id: EntityId) -> Result<(), GraphError> {
        match self.entity(id) {
            Some(e) => match e.kind {
                EntityKind::Point { .. } => Ok(()),
                _ => Err(GraphError::KindMismatch {
                    id,
                    expected: "Point",
                    found: e.kind.name(),
                }),
            },
            None => Err(GraphError::InvalidReference { id }),
        }
    }

    fn require_line(&self, id: EntityId) -> Result<(), GraphError> {
        match self.entity(id) {
            Some(e) => match e.kind {
                EntityKind::Line { .. } => Ok(()),
                _ => Err(GraphError::KindMismatch {
                    id,
                    expected: "Line",
                    found: e.kind.name(),
                }),
            },
            None => Err(GraphError::InvalidReference { id }),
        }
    }

    fn require_curve(&self, id: EntityId) -> Result<(), GraphError> {
        match self.entity(id) {
            Some(e) => match e.kind {
                EntityKind::Circle { .. } | EntityKind::Arc { .. } => Ok(()),
                _ => Err(GraphError::KindMismatch {
                    id,
                    expected: "Circle or Arc",
                    found: e.kind.name(),
                }),
            },
            None => Err(GraphError::InvalidReference { id }),
        }
    }

    fn is_curve(&self, id: EntityId) -> bool {
        matches!(
            self.entity(id).map(|e| e.kind),
            Some(EntityKind::Circle { .. }) | Some(EntityKind::Arc { .. })
        )
    }

    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), GraphError> {
        match constraint {
            Constraint::Coincident { a, b }
            | Constraint::Distance { a, b, .. }
            | Constraint::Horizontal { a, b }
            | Constraint::Vertical { a, b } => {
                self.require_point(*a)?;
                self.require_point(*b)?;
                self.distinct(*a, *b)
            }
            Constraint::Angle { a, b, .. }
            | Constraint::Parallel { a, b }
            | Constraint::Perpendicular { a, b } => {
                self.require_line(*a)?;
                self.require_line(*b)?;
                self.distinct(*a, *b)
            }
            Constraint::Tangent { a, b } => {
                // One line + one curve, or two curves.
                if self.is_curve(*a) {
                    self.require_curve(*a)?;
                    if self.is_curve(*b) {
                        self.require_curve(*b)?;
                    } else {
                        self.require_line(*b)?;
                    }
                } else {
                    self.require_line(*a)?;
                    self.require_curve(*b)?;
                }
                self.distinct(*a, *b)
            }
            Constraint::Equal { a, b } => {
                if self.is_curve(*a) {
                    self.require_curve(*a)?;
                    self.require_curve(*b)?;
                } else {
                    self.require_line(*a)?;
                    self.require_line(*b)?;
                }
                self.distinct(*a, *b)
            }
            Constraint::Radius { entity, value } => {
                self.require_curve(*entity)?;
                if *value <= 0.0 {
                    return Err(GeometryError::DegenerateCircle { radius: *value }.into());
                }
                Ok(())
            }
        }
    }

    fn distinct(&self, a: EntityId, b: EntityId) -> Result<(), GraphError> {
        if a == b {
            Err(GraphError::RepeatedReference { id: a })
        } else {
            Ok(())
        }
    }
}
