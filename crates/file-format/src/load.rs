use serde::Deserialize;

use burin_document::{Document, Feature};

use crate::errors::LoadError;
use crate::metadata::ProjectMetadata;
use crate::save::FORMAT_VERSION;

/// The top-level file structure for deserialization.
#[derive(Debug, Clone, Deserialize)]
pub struct BurinFileRaw {
    pub format: String,
    pub version: u32,
    pub project: ProjectMetadata,
    pub features: Vec<Feature>,
}

/// Deserialize a document from a JSON string.
///
/// Validates the format identifier and version, then rebuilds the document
/// with every feature dirty. Run [`Document::rebuild`] once afterwards to
/// restore solved geometry; the result is equivalent to the saved document
/// within solver tolerance.
pub fn load_document(json: &str) -> Result<(Document, ProjectMetadata), LoadError> {
    let raw: BurinFileRaw =
        serde_json::from_str(json).map_err(|e| LoadError::ParseError(e.to_string()))?;

    if raw.format != "burin" {
        return Err(LoadError::UnknownFormat(raw.format));
    }
    if raw.version > FORMAT_VERSION {
        return Err(LoadError::FutureVersion {
            file_version: raw.version,
            supported_version: FORMAT_VERSION,
        });
    }

    let features = if raw.version < FORMAT_VERSION {
        crate::migrate::migrate(raw.features, raw.version, FORMAT_VERSION)?
    } else {
        raw.features
    };

    let doc = Document::from_features(features)
        .map_err(|e| LoadError::InvalidDocument(e.to_string()))?;
    Ok((doc, raw.project))
}
