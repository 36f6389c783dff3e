use approx::assert_relative_eq;
use burin_solver::*;

// ── Helpers ─────────────────────────────────────────────────────────────────

fn assert_point_near(graph: &SketchGraph, id: EntityId, expected: (f64, f64), tol: f64) {
    let (x, y) = graph.point_position(id).unwrap();
    assert!(
        (x - expected.0).abs() < tol && (y - expected.1).abs() < tol,
        "point {id} = ({x:.6}, {y:.6}), expected ({:.6}, {:.6}), tol={tol}",
        expected.0,
        expected.1,
    );
}

/// Pinned origin, free point, distance 5 + horizontal: the canonical
/// dimensioned-line scenario.
fn pinned_distance_sketch(initial_b: (f64, f64)) -> (SketchGraph, EntityId, EntityId) {
    let mut g = SketchGraph::new();
    let a = g.add_point(0.0, 0.0);
    let b = g.add_point(initial_b.0, initial_b.1);
    g.set_fixed(a, true).unwrap();
    g.add_constraint(Constraint::Distance { a, b, value: 5.0 })
        .unwrap();
    g.add_constraint(Constraint::Horizontal { a, b }).unwrap();
    (g, a, b)
}

// ── Scenario: Distance + Horizontal ─────────────────────────────────────────

#[test]
fn distance_horizontal_places_point_on_positive_axis() {
    let (mut g, a, b) = pinned_distance_sketch((1.0, 1.0));
    let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    assert!(outcome.residual < 1e-10);
    assert_eq!(outcome.dof, 0);
    assert_point_near(&g, b, (5.0, 0.0), 1e-8);

    let (ax, ay) = g.point_position(a).unwrap();
    let (bx, by) = g.point_position(b).unwrap();
    assert_relative_eq!(((bx - ax).powi(2) + (by - ay).powi(2)).sqrt(), 5.0, epsilon = 1e-8);
}

#[test]
fn distance_horizontal_sign_follows_initial_guess() {
    // The solver is a local method: a free point starting in -x stays in -x.
    let (mut g, _a, b) = pinned_distance_sketch((-1.0, 0.5));
    solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    assert_point_near(&g, b, (-5.0, 0.0), 1e-8);
}

// ── Stability ───────────────────────────────────────────────────────────────

#[test]
fn solving_twice_is_stable() {
    let (mut g, _a, b) = pinned_distance_sketch((1.0, 2.0));
    solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    let first = g.point_position(b).unwrap();

    let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    assert_eq!(outcome.iterations, 0, "second solve should start converged");
    let second = g.point_position(b).unwrap();
    assert!((first.0 - second.0).abs() < 1e-10);
    assert!((first.1 - second.1).abs() < 1e-10);
}

// ── Constraint add/remove bookkeeping ───────────────────────────────────────

#[test]
fn add_then_remove_constraint_restores_counts() {
    let (mut g, a, b) = pinned_distance_sketch((1.0, 1.0));
    solve_sketch(&mut g, &SolveConfig::default()).unwrap();

    let eq_before = g.equation_count();
    let dof_before = g.degrees_of_freedom();

    let idx = g.add_constraint(Constraint::Vertical { a, b }).unwrap();
    assert_eq!(g.equation_count(), eq_before + 1);
    g.remove_constraint(idx).unwrap();

    assert_eq!(g.equation_count(), eq_before);
    assert_eq!(g.degrees_of_freedom(), dof_before);
}

// ── Over-constraint ─────────────────────────────────────────────────────────

#[test]
fn over_constrained_sketch_is_refused() {
    let mut g = SketchGraph::new();
    let a = g.add_point(0.0, 0.0);
    let b = g.add_point(0.0, 0.0);
    g.set_fixed(a, true).unwrap();
    g.add_constraint(Constraint::Coincident { a, b }).unwrap();
    g.add_constraint(Constraint::Distance { a, b, value: 0.0 })
        .unwrap();
    g.add_constraint(Constraint::Distance { a, b, value: 5.0 })
        .unwrap();

    let err = solve_sketch(&mut g, &SolveConfig::default()).unwrap_err();
    assert!(matches!(err, SolveError::OverConstrained { .. }));
    assert_point_near(&g, b, (0.0, 0.0), 1e-15);
}

// ── Under-constrained reporting ─────────────────────────────────────────────

#[test]
fn under_constrained_reports_remaining_dof() {
    let mut g = SketchGraph::new();
    let a = g.add_point(0.0, 0.0);
    let b = g.add_point(2.0, 1.0);
    g.add_constraint(Constraint::Horizontal { a, b }).unwrap();

    let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    // 4 free parameters, 1 independent equation.
    assert_eq!(outcome.dof, 3);
}

// ── Composite sketch ────────────────────────────────────────────────────────

#[test]
fn rectangle_with_dimensions_solves() {
    let mut g = SketchGraph::new();
    let p1 = g.add_point(0.0, 0.0);
    let p2 = g.add_point(9.0, 0.5);
    let p3 = g.add_point(10.0, 4.5);
    let p4 = g.add_point(-0.5, 5.5);
    let bottom = g.add_line(p1, p2).unwrap();
    let right = g.add_line(p2, p3).unwrap();
    let top = g.add_line(p3, p4).unwrap();
    let left = g.add_line(p4, p1).unwrap();

    g.set_fixed(p1, true).unwrap();
    g.add_constraint(Constraint::Horizontal { a: p1, b: p2 }).unwrap();
    g.add_constraint(Constraint::Distance { a: p1, b: p2, value: 10.0 })
        .unwrap();
    g.add_constraint(Constraint::Perpendicular { a: bottom, b: right }).unwrap();
    g.add_constraint(Constraint::Distance { a: p2, b: p3, value: 5.0 })
        .unwrap();
    g.add_constraint(Constraint::Parallel { a: right, b: left }).unwrap();
    g.add_constraint(Constraint::Parallel { a: bottom, b: top }).unwrap();

    let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    assert!(outcome.residual < 1e-10);
    assert_eq!(outcome.dof, 0);
    assert_point_near(&g, p2, (10.0, 0.0), 1e-6);
    assert_point_near(&g, p3, (10.0, 5.0), 1e-6);
    assert_point_near(&g, p4, (0.0, 5.0), 1e-6);
}

#[test]
fn equal_length_matches_a_reference_line() {
    let mut g = SketchGraph::new();
    let r1 = g.add_point(0.0, 10.0);
    let r2 = g.add_point(5.0, 10.0);
    let reference = g.add_line(r1, r2).unwrap();
    let a = g.add_point(0.0, 0.0);
    let b = g.add_point(2.0, 1.0);
    let line = g.add_line(a, b).unwrap();

    for id in [r1, r2, a] {
        g.set_fixed(id, true).unwrap();
    }
    g.add_constraint(Constraint::Horizontal { a, b }).unwrap();
    g.add_constraint(Constraint::Equal { a: line, b: reference })
        .unwrap();

    solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    let (bx, by) = g.point_position(b).unwrap();
    assert!(by.abs() < 1e-8);
    assert!((bx - 5.0).abs() < 1e-6, "bx = {bx}");
}

#[test]
fn tangent_line_circle_solves() {
    let mut g = SketchGraph::new();
    let a = g.add_point(-5.0, 0.0);
    let b = g.add_point(5.0, 0.0);
    let line = g.add_line(a, b).unwrap();
    let center = g.add_point(0.0, 1.0);
    let circle = g.add_circle(center, 2.0).unwrap();

    g.set_fixed(a, true).unwrap();
    g.set_fixed(b, true).unwrap();
    g.set_fixed(center, true).unwrap();
    g.add_constraint(Constraint::Tangent { a: line, b: circle })
        .unwrap();

    solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    match g.entity(circle).unwrap().kind {
        EntityKind::Circle { radius, .. } => {
            // Tangency to the x axis from center (0, 1) means radius 1.
            assert!((radius - 1.0).abs() < 1e-8, "radius = {radius}");
        }
        _ => unreachable!(),
    }
}

#[test]
fn angle_constraint_at_right_angle_target() {
    use std::f64::consts::FRAC_PI_2;

    let mut g = SketchGraph::new();
    let origin = g.add_point(0.0, 0.0);
    let x_end = g.add_point(4.0, 0.0);
    let free_end = g.add_point(3.0, 2.0);
    let base = g.add_line(origin, x_end).unwrap();
    let swing = g.add_line(origin, free_end).unwrap();

    g.set_fixed(origin, true).unwrap();
    g.set_fixed(x_end, true).unwrap();
    g.add_constraint(Constraint::Angle {
        a: base,
        b: swing,
        value: FRAC_PI_2,
    })
    .unwrap();

    solve_sketch(&mut g, &SolveConfig::default()).unwrap();
    let (fx, fy) = g.point_position(free_end).unwrap();
    // The swing line must end up along +y; only its direction is pinned.
    assert!(fx.abs() < 1e-6, "x = {fx}");
    assert!(fy > 0.0);
}
