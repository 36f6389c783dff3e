use burin_document::Feature;

use crate::errors::LoadError;

/// Apply format migrations from `from_version` to `to_version`.
///
/// Migrations are applied sequentially: v1→v2, v2→v3, etc.
/// Currently version 1 is the only version, so no migrations exist yet.
pub fn migrate(
    features: Vec<Feature>,
    from_version: u32,
    to_version: u32,
) -> Result<Vec<Feature>, LoadError> {
    if from_version != to_version {
        return Err(LoadError::MigrationFailed {
            from: from_version,
            to: to_version,
            reason: format!("no migration path from v{from_version} to v{to_version}"),
        });
    }
    Ok(features)
}
