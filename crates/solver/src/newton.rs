use nalgebra::DVector;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::graph::SketchGraph;
use crate::system::{self, System};

/// Configuration for the damped Newton-Raphson solver.
#[derive(Debug, Clone)]
pub struct SolveConfig {
    pub max_iterations: usize,
    /// Convergence threshold on the residual norm.
    pub tolerance: f64,
    /// Damping halvings allowed per iteration before the step is rejected.
    pub max_backtracks: u32,
}

impl Default for SolveConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-10,
            max_backtracks: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SolveError {
    #[error("over-constrained: {equations} equations over {free_params} free parameters")]
    OverConstrained { equations: usize, free_params: usize },

    #[error("did not converge after {iterations} iterations (residual norm {residual})")]
    NotConverged { iterations: usize, residual: f64 },

    #[error("singular constraint system: no usable Newton step")]
    Singular,
}

/// Result of a converged solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveOutcome {
    pub iterations: usize,
    pub residual: f64,
    /// Remaining degrees of freedom at the solution (rank-based).
    pub dof: usize,
}

/// Solve one sketch's constraint system in place.
///
/// Newton-Raphson over the stacked residual vector: each iteration factors
/// the Jacobian by SVD and takes the minimum-norm step (pseudo-inverse
/// semantics), so redundant-but-consistent constraint sets converge to a
/// deterministic solution. The step is damped starting at 1.0, halving on
/// residual increase.
///
/// On failure the graph keeps its pre-solve parameter values; solved values
/// are written back only after convergence.
#[instrument(skip_all, fields(
    entities = graph.entities().len(),
    constraints = graph.constraints().len(),
))]
pub fn solve_sketch(
    graph: &mut SketchGraph,
    config: &SolveConfig,
) -> Result<SolveOutcome, SolveError> {
    let sys = System::build(graph);
    let n = sys.slot_count();
    let m = sys.rows;

    // Raw-count refusal: more equations than free parameters cannot be
    // solved, only diagnosed. Rank-based DOF reporting stays separate.
    if m > n {
        debug!(equations = m, free_params = n, "refusing over-constrained system");
        return Err(SolveError::OverConstrained {
            equations: m,
            free_params: n,
        });
    }
    if m == 0 {
        return Ok(SolveOutcome {
            iterations: 0,
            residual: 0.0,
            dof: n,
        });
    }

    let mut params = sys.initial_vector();
    let mut residual = DVector::zeros(m);
    let mut trial_residual = DVector::zeros(m);
    sys.residuals(&params, &mut residual);
    let mut norm = residual.norm();

    for iteration in 0..config.max_iterations {
        if norm < config.tolerance {
            return Ok(finish(graph, &sys, &params, iteration, norm));
        }

        let jac = system::jacobian(&sys, &params);
        let svd = jac.svd(true, true);
        let max_sv = svd.singular_values.iter().cloned().fold(0.0_f64, f64::max);
        if max_sv < 1e-14 {
            return Err(SolveError::Singular);
        }
        let eps = max_sv * (m.max(n) as f64) * f64::EPSILON;
        let step = svd.solve(&residual, eps).map_err(|_| SolveError::Singular)?;

        let mut damping = 1.0;
        let mut improved = false;
        for _ in 0..=config.max_backtracks {
            let trial = &params - &step * damping;
            sys.residuals(&trial, &mut trial_residual);
            let trial_norm = trial_residual.norm();
            if trial_norm < norm {
                params = trial;
                std::mem::swap(&mut residual, &mut trial_residual);
                norm = trial_norm;
                improved = true;
                break;
            }
            damping *= 0.5;
        }
        debug!(iteration, residual = norm, damping, "newton iteration");

        if !improved {
            // A fully damped step cannot reduce the residual; further
            // iterations would repeat the same rejection.
            return Err(SolveError::NotConverged {
                iterations: iteration + 1,
                residual: norm,
            });
        }
    }

    if norm < config.tolerance {
        return Ok(finish(graph, &sys, &params, config.max_iterations, norm));
    }
    Err(SolveError::NotConverged {
        iterations: config.max_iterations,
        residual: norm,
    })
}

fn finish(
    graph: &mut SketchGraph,
    sys: &System,
    params: &DVector<f64>,
    iterations: usize,
    residual: f64,
) -> SolveOutcome {
    sys.write_back(graph, params);
    let jac = system::jacobian(sys, params);
    let rank = system::jacobian_rank(&jac);
    let dof = sys.slot_count().saturating_sub(rank);
    debug!(iterations, residual, dof, "solve converged");
    SolveOutcome {
        iterations,
        residual,
        dof,
    }
}
