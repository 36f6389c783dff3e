use serde::Serialize;

use burin_document::{Document, Feature};

use crate::metadata::ProjectMetadata;

/// Current file format version.
pub const FORMAT_VERSION: u32 = 1;

/// The top-level file structure.
#[derive(Debug, Clone, Serialize)]
pub struct BurinFile {
    /// Format identifier.
    pub format: String,
    /// Format version number.
    pub version: u32,
    /// Project metadata.
    pub project: ProjectMetadata,
    /// The ordered feature list (the parametric recipe, build order first).
    pub features: Vec<Feature>,
}

/// Serialize a document to a pretty-printed JSON string.
pub fn save_document(doc: &Document, metadata: &ProjectMetadata) -> String {
    let file = BurinFile {
        format: "burin".to_string(),
        version: FORMAT_VERSION,
        project: metadata.clone(),
        features: doc.features().to_vec(),
    };
    serde_json::to_string_pretty(&file).expect("feature list serialization should never fail")
}
