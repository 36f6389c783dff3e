//! Property-based tests for solver invariants using the `proptest` crate.

use proptest::prelude::*;

use burin_solver::*;

/// Arbitrary initial position away from the pinned origin, so the distance
/// gradient is well-defined.
fn arb_offset() -> impl Strategy<Value = (f64, f64)> {
    (0.5f64..100.0, -100.0f64..100.0)
}

fn arb_distance() -> impl Strategy<Value = f64> {
    0.1f64..50.0
}

proptest! {
    // A single distance constraint from a pinned origin always converges,
    // and the solved point sits on the requested circle.
    #[test]
    fn distance_constraint_converges((bx, by) in arb_offset(), d in arb_distance()) {
        let mut g = SketchGraph::new();
        let a = g.add_point(0.0, 0.0);
        let b = g.add_point(bx, by);
        g.set_fixed(a, true).unwrap();
        g.add_constraint(Constraint::Distance { a, b, value: d }).unwrap();

        let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
        prop_assert!(outcome.residual < 1e-10);

        let (x, y) = g.point_position(b).unwrap();
        prop_assert!(((x * x + y * y).sqrt() - d).abs() < 1e-8);
    }
}

proptest! {
    // Solving an already-solved sketch must not move anything (stability).
    #[test]
    fn resolve_is_stable((bx, by) in arb_offset(), d in arb_distance()) {
        let mut g = SketchGraph::new();
        let a = g.add_point(0.0, 0.0);
        let b = g.add_point(bx, by);
        g.set_fixed(a, true).unwrap();
        g.add_constraint(Constraint::Distance { a, b, value: d }).unwrap();
        g.add_constraint(Constraint::Horizontal { a, b }).unwrap();

        if solve_sketch(&mut g, &SolveConfig::default()).is_ok() {
            let first = g.point_position(b).unwrap();
            let outcome = solve_sketch(&mut g, &SolveConfig::default()).unwrap();
            prop_assert_eq!(outcome.iterations, 0);
            let second = g.point_position(b).unwrap();
            prop_assert!((first.0 - second.0).abs() < 1e-10);
            prop_assert!((first.1 - second.1).abs() < 1e-10);
        }
    }
}

proptest! {
    // Equation count and DOF return to their prior values after an
    // add/remove round trip, for any constraint placement.
    #[test]
    fn constraint_add_remove_restores_dof((bx, by) in arb_offset()) {
        let mut g = SketchGraph::new();
        let a = g.add_point(0.0, 0.0);
        let b = g.add_point(bx, by);

        let eq_before = g.equation_count();
        let dof_before = g.degrees_of_freedom();

        let idx = g.add_constraint(Constraint::Horizontal { a, b }).unwrap();
        g.remove_constraint(idx).unwrap();

        prop_assert_eq!(g.equation_count(), eq_before);
        prop_assert_eq!(g.degrees_of_freedom(), dof_before);
    }
}
