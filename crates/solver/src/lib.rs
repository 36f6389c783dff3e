pub mod constraint;
pub mod entity;
pub mod graph;
pub mod newton;
mod system;

pub use constraint::Constraint;
pub use entity::{Entity, EntityId, EntityKind};
pub use graph::{GraphError, RemovedSubgraph, SketchGraph};
pub use newton::{SolveConfig, SolveError, SolveOutcome, solve_sketch};
