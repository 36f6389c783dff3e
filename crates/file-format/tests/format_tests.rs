use burin_document::*;
use burin_format::{FORMAT_VERSION, LoadError, ProjectMetadata, load_document, save_document};
use burin_solver::{Constraint, SketchGraph};

// ── Helpers ─────────────────────────────────────────────────────────────────

/// Document with a dimensioned sketch and an extrude of height 3.
fn reference_document() -> (Document, FeatureId, FeatureId) {
    let mut doc = Document::new();
    let sketch = doc
        .apply(Command::AddFeature {
            name: "Sketch 1".to_string(),
            operation: Operation::Sketch {
                graph: SketchGraph::new(),
            },
            id: None,
        })
        .unwrap()
        .created_feature
        .unwrap();
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
    doc.apply(Command::AddConstraint {
        sketch,
        constraint: Constraint::Distance { a, b, value: 5.0 },
    })
    .unwrap();
    doc.apply(Command::AddConstraint {
        sketch,
        constraint: Constraint::Horizontal { a, b },
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

// ── Round trip ──────────────────────────────────────────────────────────────

#[test]
fn round_trip_reproduces_solved_geometry() {
    let (doc, sketch, extrude) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("bracket"));

    let (mut loaded, meta) = load_document(&json).unwrap();
    assert_eq!(meta.name, "bracket");

    // Same features, ids, and dependency order.
    assert_eq!(loaded.features().len(), 2);
    assert_eq!(loaded.features()[0].id, sketch);
    assert_eq!(loaded.features()[1].id, extrude);
    assert_eq!(loaded.features()[1].deps, vec![sketch]);

    // Everything is dirty until the first rebuild.
    assert_eq!(loaded.features()[0].state, FeatureState::Dirty);
    loaded.rebuild();
    assert_eq!(loaded.feature(sketch).unwrap().state, FeatureState::Clean);
    assert_eq!(loaded.feature(extrude).unwrap().state, FeatureState::Clean);

    // Solved parameters match the original within tolerance.
    let original = doc.sketch_graph(sketch).unwrap();
    let reloaded = loaded.sketch_graph(sketch).unwrap();
    for (orig, load) in original.entities().iter().zip(reloaded.entities()) {
        assert_eq!(orig.id, load.id);
        assert_eq!(orig.fixed, load.fixed);
    }
    let b = original.entities()[1].id;
    let (ox, oy) = original.point_position(b).unwrap();
    let (lx, ly) = reloaded.point_position(b).unwrap();
    assert!((ox - lx).abs() < 1e-9 && (oy - ly).abs() < 1e-9);

    // The swept solid is reproduced within tolerance.
    match (doc.result(extrude), loaded.result(extrude)) {
        (Some(FeatureResult::Solid(a)), Some(FeatureResult::Solid(b))) => {
            assert_eq!(a.profile.segments.len(), b.profile.segments.len());
            assert!((a.profile.segments[0].length() - b.profile.segments[0].length()).abs() < 1e-9);
            match (&a.sweep, &b.sweep) {
                (Sweep::Extrude { height: ha }, Sweep::Extrude { height: hb }) => {
                    assert!((ha - hb).abs() < 1e-12)
                }
                other => panic!("sweep mismatch: {other:?}"),
            }
        }
        other => panic!("expected solids on both sides, got {other:?}"),
    }
}

#[test]
fn round_trip_preserves_constraints() {
    let (doc, sketch, _) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("constraints"));
    let (loaded, _) = load_document(&json).unwrap();

    let original = doc.sketch_graph(sketch).unwrap();
    let reloaded = loaded.sketch_graph(sketch).unwrap();
    assert_eq!(original.constraints(), reloaded.constraints());
    assert_eq!(original.equation_count(), reloaded.equation_count());
}

// ── Validation ──────────────────────────────────────────────────────────────

#[test]
fn unknown_format_rejected() {
    let (doc, _, _) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("x"));
    let tampered = json.replace("\"burin\"", "\"not-a-cad-file\"");
    assert!(matches!(
        load_document(&tampered).unwrap_err(),
        LoadError::UnknownFormat(_)
    ));
}

#[test]
fn future_version_rejected() {
    let (doc, _, _) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("x"));
    let tampered = json.replace(
        &format!("\"version\": {FORMAT_VERSION}"),
        &format!("\"version\": {}", FORMAT_VERSION + 1),
    );
    match load_document(&tampered).unwrap_err() {
        LoadError::FutureVersion {
            file_version,
            supported_version,
        } => {
            assert_eq!(file_version, FORMAT_VERSION + 1);
            assert_eq!(supported_version, FORMAT_VERSION);
        }
        other => panic!("expected FutureVersion, got {other:?}"),
    }
}

#[test]
fn unmigratable_version_rejected() {
    let (doc, _, _) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("x"));
    let tampered = json.replace(
        &format!("\"version\": {FORMAT_VERSION}"),
        "\"version\": 0",
    );
    assert!(matches!(
        load_document(&tampered).unwrap_err(),
        LoadError::MigrationFailed { from: 0, .. }
    ));
}

#[test]
fn garbage_input_is_a_parse_error() {
    assert!(matches!(
        load_document("{ not json").unwrap_err(),
        LoadError::ParseError(_)
    ));
}

#[test]
fn duplicated_feature_ids_rejected() {
    let (doc, _, _) = reference_document();
    let json = save_document(&doc, &ProjectMetadata::new("x"));
    let mut value: serde_json::Value = serde_json::from_str(&json).unwrap();
    let features = value["features"].as_array().unwrap().clone();
    let doubled: Vec<_> = features.iter().chain(features.iter()).cloned().collect();
    value["features"] = serde_json::Value::Array(doubled);

    assert!(matches!(
        load_document(&serde_json::to_string(&value).unwrap()).unwrap_err(),
        LoadError::InvalidDocument(_)
    ));
}
