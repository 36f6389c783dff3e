use burin_document::*;
use burin_solver::Constraint;
use burin_tessellation::{CancelFlag, ChordTolerance, MeshCache, RenderMesh};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn add_sketch(doc: &mut Document) -> FeatureId {
    doc.apply(Command::AddFeature {
        name: "Sketch 1".to_string(),
        operation: Operation::Sketch {
            graph: burin_solver::SketchGraph::new(),
        },
        id: None,
    })
    .unwrap()
    .created_feature
    .unwrap()
}

/// Sketch with a pinned origin, a dimensioned point, and a circle; plus an
/// extrude on top.
fn solid_document() -> (Document, FeatureId, FeatureId) {
    let mut doc = Document::new();
    let sketch = add_sketch(&mut doc);
    let a = doc
        .apply(Command::AddEntity {
            sketch,
            entity: EntitySpec::Point { x: 0.0, y: 0.0 },
        })
        .unwrap()
        .created_entity
        .unwrap();
    doc.apply(Command::SetFixed {
        sketch,
        entity: a,
        fixed: true,
    })
    .unwrap();
    let b = doc
        .apply(Command::AddEntity {
            sketch,
            entity: EntitySpec::Point { x: 1.0, y: 1.0 },
        })
        .unwrap()
        .created_entity
        .unwrap();
    doc.apply(Command::AddEntity {
        sketch,
        entity: EntitySpec::Line { start: a, end: b },
    })
    .unwrap();
    doc.apply(Command::AddEntity {
        sketch,
        entity: EntitySpec::Circle {
            center: a,
            radius: 10.0,
        },
    })
    .unwrap();
    doc.apply(Command::AddConstraint {
        sketch,
        constraint: Constraint::Distance { a, b, value: 5.0 },
    })
    .unwrap();
    let extrude = doc
        .apply(Command::AddFeature {
            name: "Extrude 1".to_string(),
            operation: Operation::Extrude {
                sketch,
                height: 3.0,
            },
            id: None,
        })
        .unwrap()
        .created_feature
        .unwrap();
    (doc, sketch, extrude)
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[test]
fn cache_serves_clean_features() {
    let (doc, sketch, extrude) = solid_document();
    let mut cache = MeshCache::new();
    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());

    assert!(matches!(cache.get(sketch), Some(RenderMesh::Wireframe(_))));
    assert!(matches!(cache.get(extrude), Some(RenderMesh::Surface(_))));
}

#[test]
fn error_and_blocked_features_keep_last_good_mesh() {
    let (mut doc, sketch, extrude) = solid_document();
    let mut cache = MeshCache::new();
    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    let sketch_mesh = cache.get(sketch).unwrap().clone();
    let extrude_mesh = cache.get(extrude).unwrap().clone();

    // Over-constrain the sketch: it errors, the extrude blocks.
    let graph = doc.sketch_graph(sketch).unwrap();
    let a = graph.entities()[0].id;
    let b = graph.entities()[1].id;
    doc.apply(Command::AddConstraint {
        sketch,
        constraint: Constraint::Coincident { a, b },
    })
    .unwrap();
    assert_eq!(doc.feature(sketch).unwrap().state, FeatureState::Error);

    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    assert_eq!(cache.get(sketch), Some(&sketch_mesh));
    assert_eq!(cache.get(extrude), Some(&extrude_mesh));
}

#[test]
fn never_solved_feature_exposes_no_mesh() {
    let (mut doc, sketch, _extrude) = solid_document();
    // Height zero never computes; the feature goes straight to Error.
    let bad = doc
        .apply(Command::AddFeature {
            name: "Extrude 2".to_string(),
            operation: Operation::Extrude {
                sketch,
                height: 0.0,
            },
            id: None,
        })
        .unwrap()
        .created_feature
        .unwrap();
    assert_eq!(doc.feature(bad).unwrap().state, FeatureState::Error);

    let mut cache = MeshCache::new();
    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    assert!(cache.get(bad).is_none());
}

#[test]
fn cancelled_refresh_leaves_cache_unchanged() {
    let (doc, _sketch, _extrude) = solid_document();
    let mut cache = MeshCache::new();
    let cancel = CancelFlag::new();
    cancel.cancel();
    cache.refresh(&doc, ChordTolerance::default(), &cancel);
    assert!(cache.is_empty());
}

#[test]
fn parallel_refresh_matches_sequential() {
    let (doc, sketch, extrude) = solid_document();
    let mut sequential = MeshCache::new();
    sequential.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    let mut parallel = MeshCache::new();
    parallel.refresh_parallel(&doc, ChordTolerance::default(), &CancelFlag::new());

    assert_eq!(sequential.get(sketch), parallel.get(sketch));
    assert_eq!(sequential.get(extrude), parallel.get(extrude));
}

#[test]
fn tolerance_change_retessellates() {
    let (doc, sketch, _extrude) = solid_document();
    let mut cache = MeshCache::new();
    cache.refresh(&doc, ChordTolerance { chord: 0.1 }, &CancelFlag::new());
    let coarse = match cache.get(sketch).unwrap() {
        RenderMesh::Wireframe(lines) => lines.iter().map(|l| l.points.len()).sum::<usize>(),
        _ => unreachable!(),
    };

    cache.refresh(&doc, ChordTolerance { chord: 0.001 }, &CancelFlag::new());
    let fine = match cache.get(sketch).unwrap() {
        RenderMesh::Wireframe(lines) => lines.iter().map(|l| l.points.len()).sum::<usize>(),
        _ => unreachable!(),
    };
    assert!(fine > coarse, "fine={fine} coarse={coarse}");
}

#[test]
fn removed_feature_is_pruned() {
    let (mut doc, _sketch, extrude) = solid_document();
    let mut cache = MeshCache::new();
    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    assert!(cache.get(extrude).is_some());

    doc.apply(Command::RemoveFeature { id: extrude }).unwrap();
    cache.refresh(&doc, ChordTolerance::default(), &CancelFlag::new());
    assert!(cache.get(extrude).is_none());
}
