pub mod command;
pub mod document;
pub mod feature;
pub mod history;

pub use command::{Command, EntitySpec};
pub use document::{Diagnostics, Document, DocumentError, DocumentSnapshot, StateChange};
pub use feature::{
    Feature, FeatureId, FeatureResult, FeatureState, Operation, ProfileGeometry, Sweep, SweptSolid,
};
