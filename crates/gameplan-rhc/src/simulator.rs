//! Receding-horizon simulation with measured planner latency.
//!
//! A facsimile of a real-time, online receding-horizon deployment: between
//! consecutive solves the plant keeps moving under the previously spliced
//! solution for exactly as long as the solver took, plus a small fixed
//! slack. The solver's wall time must stay within the planner budget; a
//! violation is fatal at this level.

use std::time::{Duration, Instant};

use nalgebra::DVector;
use tracing::info;

use gameplan_core::error::SolverError;
use gameplan_core::traits::Dynamics;
use gameplan_solver::log::SolverLog;
use gameplan_solver::problem::Problem;

use crate::splicer::SolutionSplicer;

/// Run `problem` under a receding horizon until `final_time`, solving each
/// stage with wall-clock budget `planner_runtime` seconds.
///
/// Returns one log per solver invocation. Fails with
/// [`SolverError::BudgetExceeded`] if any warm-started solve overruns its
/// budget (the initial full solve is unbudgeted), and propagates solver
/// failures.
pub fn receding_horizon_simulator<D: Dynamics>(
    final_time: f64,
    planner_runtime: f64,
    problem: &mut Problem<D>,
) -> Result<Vec<SolverLog>, SolverError> {
    let mut logs = Vec::new();

    // Initial full-horizon solve; its duration is not constrained, but it is
    // measured so the first stage accounts for it like any other.
    let solve_start = Instant::now();
    logs.push(problem.solve(None)?);
    let mut solve_wall = solve_start.elapsed().as_secs_f64();
    info!(solve_wall, "solved initial problem");

    let mut splicer = SolutionSplicer::new(&logs[0]);

    let replanning_slack = problem.params().replanning_slack;
    let budget = Duration::from_secs_f64(planner_runtime);

    let mut x: DVector<f64> = problem.x0().clone();
    let mut t = splicer.current_operating_point().t0;

    while t < final_time {
        // Re-anchor the problem at the current plant state and solve the
        // remaining horizon under budget.
        problem.set_up_next_receding_horizon(&x, t, planner_runtime);

        let solve_start = Instant::now();
        logs.push(problem.solve(Some(budget))?);
        solve_wall = solve_start.elapsed().as_secs_f64();
        info!(solve_wall, t, "solved warm-started problem");

        if solve_wall > planner_runtime {
            return Err(SolverError::BudgetExceeded {
                elapsed: solve_wall,
                budget: planner_runtime,
            });
        }

        // The plant kept moving under the old spliced solution while the
        // planner was thinking.
        x = problem.dynamics().integrate(
            t,
            t + solve_wall,
            &x,
            splicer.current_operating_point(),
            splicer.current_strategies(),
        );
        t += solve_wall;

        // Fold the new solution in and hand it back as the warm start.
        splicer.splice(logs.last().expect("at least the initial log"), t);
        problem.overwrite_solution(
            splicer.current_operating_point().clone(),
            splicer.current_strategies().to_vec(),
        );

        // A little extra motion keeps consecutive stages from re-solving an
        // identical instant.
        x = problem.dynamics().integrate(
            t,
            t + replanning_slack,
            &x,
            splicer.current_operating_point(),
            splicer.current_strategies(),
        );
        t += replanning_slack;
    }

    Ok(logs)
}
