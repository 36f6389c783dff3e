use std::collections::HashMap;

use tracing::debug;

use burin_document::{Document, FeatureId, FeatureResult, FeatureState};

use crate::mesh::RenderMesh;
use crate::subdivide::CancelFlag;
use crate::{ChordTolerance, tessellate_result};

struct CacheEntry {
    revision: u64,
    chord: f64,
    mesh: RenderMesh,
}

/// Render meshes keyed by feature, refreshed from a document after each
/// recompute cascade.
///
/// Only Clean features are tessellated; a Dirty or Error feature keeps
/// serving its last-good mesh (none, if it never solved). A cancelled
/// refresh leaves every entry untouched.
#[derive(Default)]
pub struct MeshCache {
    entries: HashMap<FeatureId, CacheEntry>,
}

impl MeshCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The last-good mesh for a feature, if it ever tessellated.
    pub fn get(&self, id: FeatureId) -> Option<&RenderMesh> {
        self.entries.get(&id).map(|e| &e.mesh)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Re-tessellate every Clean feature whose result or tolerance changed.
    pub fn refresh(&mut self, doc: &Document, tolerance: ChordTolerance, cancel: &CancelFlag) {
        self.prune(doc);
        for (id, revision, result) in self.pending(doc, tolerance) {
            if cancel.is_cancelled() {
                return;
            }
            let Some(mesh) = tessellate_result(result, tolerance, cancel) else {
                return;
            };
            self.entries.insert(
                id,
                CacheEntry {
                    revision,
                    chord: tolerance.chord,
                    mesh,
                },
            );
        }
    }

    /// Like [`Self::refresh`], tessellating independent features on scoped
    /// worker threads. Safe because workers only read committed results of
    /// Clean features; the document is not mutated while they run.
    pub fn refresh_parallel(
        &mut self,
        doc: &Document,
        tolerance: ChordTolerance,
        cancel: &CancelFlag,
    ) {
        self.prune(doc);
        let work = self.pending(doc, tolerance);
        if work.is_empty() {
            return;
        }
        debug!(features = work.len(), "tessellating on worker threads");

        let meshes: Vec<(FeatureId, u64, Option<RenderMesh>)> = std::thread::scope(|scope| {
            let handles: Vec<_> = work
                .into_iter()
                .map(|(id, revision, result)| {
                    let worker_cancel = cancel.clone();
                    scope.spawn(move || {
                        (id, revision, tessellate_result(result, tolerance, &worker_cancel))
                    })
                })
                .collect();
            handles
                .into_iter()
                .filter_map(|h| h.join().ok())
                .collect()
        });

        for (id, revision, mesh) in meshes {
            if let Some(mesh) = mesh {
                self.entries.insert(
                    id,
                    CacheEntry {
                        revision,
                        chord: tolerance.chord,
                        mesh,
                    },
                );
            }
        }
    }

    /// Clean features whose cached mesh is missing or stale.
    fn pending<'d>(
        &self,
        doc: &'d Document,
        tolerance: ChordTolerance,
    ) -> Vec<(FeatureId, u64, &'d FeatureResult)> {
        doc.features()
            .iter()
            .filter(|f| f.state == FeatureState::Clean && !f.suppressed)
            .filter_map(|f| {
                let revision = doc.revision(f.id)?;
                let result = doc.result(f.id)?;
                match self.entries.get(&f.id) {
                    Some(e) if e.revision == revision && e.chord == tolerance.chord => None,
                    _ => Some((f.id, revision, result)),
                }
            })
            .collect()
    }

    /// Drop cached meshes for features no longer in the document.
    fn prune(&mut self, doc: &Document) {
        self.entries.retain(|id, _| doc.feature(*id).is_some());
    }
}
