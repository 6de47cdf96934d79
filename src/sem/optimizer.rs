use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use log::{debug, warn};

use super::error::{Result, SemError};
use super::model::FitOptions;

/// Cost reported outside the feasible region. Kept finite so the line
/// search interpolates back toward the last feasible step.
pub const INFEASIBLE: f64 = 1e12;
/// Correction pairs kept by L-BFGS.
const HISTORY: usize = 7;
/// Gradient norm accepted when the solver stops without declaring convergence.
const STALL_GRADIENT: f64 = 1e-5;

/// Where the minimizer stopped.
#[derive(Debug, Clone)]
pub struct Minimum {
    pub x: Vec<f64>,
    pub value: f64,
    pub iterations: usize,
    pub cost_evals: u64,
    pub gradient_evals: u64,
}

/// Minimize `problem` from `x0` with L-BFGS and a Moré–Thuente line search.
///
/// `problem` reports [`INFEASIBLE`] for points where it is undefined; a
/// start point there is rejected before iterating.
pub fn minimize<P>(problem: P, x0: Vec<f64>, options: &FitOptions) -> Result<Minimum>
where
    P: CostFunction<Param = Vec<f64>, Output = f64>
        + Gradient<Param = Vec<f64>, Gradient = Vec<f64>>,
{
    if problem.cost(&x0).map_err(solver_error)? >= INFEASIBLE {
        return Err(SemError::NotPositiveDefinite("starting implied"));
    }

    let solver = LBFGS::new(MoreThuenteLineSearch::new(), HISTORY)
        .with_tolerance_grad(options.gradient_tolerance)
        .map_err(solver_error)?
        .with_tolerance_cost(options.function_tolerance)
        .map_err(solver_error)?;

    let result = Executor::new(problem, solver)
        .configure(|state| state.param(x0).max_iters(options.max_iterations as u64))
        .run()
        .map_err(solver_error)?;

    let state = result.state();
    let x = state
        .get_best_param()
        .cloned()
        .ok_or_else(|| SemError::Optimizer("solver returned no parameters".to_string()))?;
    let value = state.get_best_cost();
    let iterations = state.get_iter() as usize;
    let gradient = state
        .get_gradient()
        .map(|g| g.iter().fold(0.0f64, |m, v| m.max(v.abs())))
        .unwrap_or(f64::NAN);
    let counts = state.get_func_counts();
    let count = |key: &str| counts.get(key).copied().unwrap_or(0);

    let reason = state.get_termination_reason();
    debug!(
        "L-BFGS stopped after {iterations} iterations ({:?}): f = {value:.10}, |g| = {gradient:.3e}, {} cost / {} gradient evaluations",
        reason,
        count("cost_count"),
        count("gradient_count"),
    );

    let converged = matches!(reason, Some(TerminationReason::SolverConverged));
    if !converged {
        if gradient.is_nan() || gradient >= STALL_GRADIENT {
            return Err(SemError::NotConverged {
                iterations,
                objective: value,
                gradient,
            });
        }
        warn!("solver stopped early ({reason:?}) but the gradient is small; accepting");
    }

    Ok(Minimum {
        x,
        value,
        iterations,
        cost_evals: count("cost_count"),
        gradient_evals: count("gradient_count"),
    })
}

fn solver_error(err: argmin::core::Error) -> SemError {
    SemError::Optimizer(format!("{err:#}"))
}
