//! Iterative LQ outer loop.
//!
//! Repeats, around the current operating point: linearize the dynamics,
//! quadraticize every player's cost, solve the resulting LQ game in closed
//! form, and line-search the new strategies' feedforward scale until the
//! rollout is acceptable. The accepted rollout becomes the next operating
//! point; the loop stops on convergence, budget exhaustion, repeated lack of
//! progress, or the iteration cap.
//!
//! The four stages form a strict dependency chain per iteration; only the
//! per-step linearization and quadraticization are independent across the
//! time index. The backward sweep is sequential in `k` by construction.

use std::time::{Duration, Instant};

use nalgebra::DVector;
use tracing::{debug, info, warn};

use gameplan_core::approximation::{LinearDynamicsApproximation, QuadraticCostApproximation};
use gameplan_core::error::SolverError;
use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::params::SolverParams;
use gameplan_core::strategy::Strategy;
use gameplan_core::traits::{Dynamics, PlayerCost};
use gameplan_core::types::GameDims;

use crate::log::{SolverIterate, SolverLog, TerminationReason};
use crate::lq_solver::LqFeedbackSolver;
use crate::rollout::{rollout, total_player_costs};

/// Outer-loop solver with persistent approximation buffers.
///
/// Owns the LQ workspace and the per-step linearization/quadraticization
/// slices, so repeated solves on the same problem geometry do not allocate.
pub struct IlqSolver {
    lq: LqFeedbackSolver,
    linearization: Vec<LinearDynamicsApproximation>,
    quadraticization: Vec<Vec<QuadraticCostApproximation>>,
}

impl IlqSolver {
    /// Create a solver for the given game dimensions.
    #[must_use]
    pub fn new(dims: GameDims, params: &SolverParams) -> Self {
        Self {
            lq: LqFeedbackSolver::new(dims, params.singularity_tolerance),
            linearization: Vec::new(),
            quadraticization: Vec::new(),
        }
    }

    /// Run the iterative solve from a warm start.
    ///
    /// The warm start is first re-anchored at `x0` by rolling its strategies
    /// out from there; that rollout is recorded as iterate 0. Returns the
    /// full log; the final iterate is the best solution found. Errors only
    /// if even the initial rollout cannot be computed.
    #[allow(clippy::too_many_lines)]
    pub fn solve<D: Dynamics + ?Sized>(
        &mut self,
        dynamics: &D,
        costs: &[Box<dyn PlayerCost>],
        x0: &DVector<f64>,
        warm_start_op: &OperatingPoint,
        warm_start_strategies: &[Strategy],
        params: &SolverParams,
        budget: Option<Duration>,
    ) -> Result<SolverLog, SolverError> {
        let start = Instant::now();
        let dt = dynamics.time_step();
        let num_time_steps = warm_start_op.len();
        let num_players = dynamics.num_players();

        // Iterate 0: re-anchor the warm start at the current initial state.
        let mut op = rollout(dynamics, warm_start_op, warm_start_strategies, x0, 1.0)?;
        let mut strategies = warm_start_strategies.to_vec();
        let mut current_costs = total_player_costs(costs, &op, dt);

        let mut log = SolverLog::new(dt);
        log.push(SolverIterate {
            operating_point: op.clone(),
            strategies: strategies.clone(),
            player_costs: current_costs.clone(),
            step_size: 1.0,
            cumulative_runtime: 0.0,
        });

        self.linearization.resize_with(num_time_steps, || {
            LinearDynamicsApproximation::identity(dynamics.x_dim(), &dynamics.u_dims())
        });
        self.quadraticization.resize_with(num_time_steps, || {
            (0..num_players)
                .map(|_| QuadraticCostApproximation::zeros(dynamics.x_dim()))
                .collect()
        });

        let use_trust_region = !params.trust_region_dimensions.is_empty();
        let mut no_progress_count = 0_usize;
        let mut small_improvement_count = 0_usize;
        let mut last_iteration = Duration::ZERO;
        let mut termination = TerminationReason::MaxIterations;

        for iteration in 1..=params.max_iterations {
            // Budget is advisory here: stop before an iteration that would
            // overrun, judged by the previous iteration's duration.
            if let Some(budget) = budget {
                if start.elapsed() + last_iteration > budget {
                    termination = TerminationReason::BudgetElapsed;
                    break;
                }
            }
            let iteration_start = Instant::now();

            // 1. Linearize the dynamics along the operating point.
            for k in 0..num_time_steps {
                let t = op.time_of(k, dt);
                self.linearization[k] = dynamics.linearize(t, &op.xs[k], &op.us[k]);
            }

            // 2. Quadraticize every player's cost. Slot k refers to the next
            // state (there is no state cost on x_0); the last slot expands
            // about the final state and acts as terminal cost.
            for k in 0..num_time_steps {
                let next = (k + 1).min(num_time_steps - 1);
                let t_next = op.time_of(next, dt);
                for (i, cost) in costs.iter().enumerate() {
                    self.quadraticization[k][i] =
                        cost.quadraticize(t_next, &op.xs[next], &op.us[k]);
                }
            }

            // 3. Solve the LQ subproblem.
            let mut candidate = match self.lq.solve(&self.linearization, &self.quadraticization)
            {
                Ok(candidate) => candidate,
                Err(err @ SolverError::SingularCoupling { .. }) => {
                    warn!(iteration, %err, "LQ subproblem failed, skipping iteration");
                    no_progress_count += 1;
                    if no_progress_count >= params.max_no_progress_iterations {
                        termination = TerminationReason::NoProgress;
                        break;
                    }
                    last_iteration = iteration_start.elapsed();
                    continue;
                }
                Err(other) => return Err(other),
            };

            // 4./5. Line search on the feedforward scale: halve until the
            // rollout stays finite and is acceptable.
            let current_total: f64 = current_costs.iter().sum();
            let mut step_size = 1.0;
            let mut accepted = None;
            while step_size >= params.min_step_size {
                match rollout(dynamics, &op, &candidate, x0, step_size) {
                    Ok(new_op) => {
                        let acceptable = if use_trust_region {
                            within_trust_region(&op, &new_op, params)
                        } else {
                            let new_total: f64 =
                                total_player_costs(costs, &new_op, dt).iter().sum();
                            new_total < current_total
                        };
                        if acceptable {
                            accepted = Some(new_op);
                            break;
                        }
                    }
                    Err(SolverError::RolloutDiverged { step }) => {
                        debug!(iteration, step_size, step, "rollout diverged");
                    }
                    Err(other) => return Err(other),
                }
                step_size *= 0.5;
            }

            let Some(new_op) = accepted else {
                debug!(iteration, "line search exhausted without progress");
                no_progress_count += 1;
                if no_progress_count >= params.max_no_progress_iterations {
                    termination = TerminationReason::NoProgress;
                    break;
                }
                last_iteration = iteration_start.elapsed();
                continue;
            };
            no_progress_count = 0;

            // 6. Merge: the accepted strategies carry the scaled feedforward,
            // so replaying them at scale 1 reproduces the new operating point.
            for strategy in &mut candidate {
                strategy.scale_alphas(step_size);
            }

            let max_control_change = max_control_change(&op, &new_op);
            let previous_max_cost = max_cost(&current_costs);

            op = new_op;
            strategies = candidate;
            current_costs = total_player_costs(costs, &op, dt);

            log.push(SolverIterate {
                operating_point: op.clone(),
                strategies: strategies.clone(),
                player_costs: current_costs.clone(),
                step_size,
                cumulative_runtime: start.elapsed().as_secs_f64(),
            });

            // 7. Convergence tests.
            if max_control_change < params.convergence_tolerance {
                termination = TerminationReason::Converged;
                break;
            }
            if previous_max_cost - max_cost(&current_costs) < params.cost_tolerance {
                small_improvement_count += 1;
                if small_improvement_count >= 2 {
                    termination = TerminationReason::Converged;
                    break;
                }
            } else {
                small_improvement_count = 0;
            }

            last_iteration = iteration_start.elapsed();
        }

        log.set_termination(termination);
        info!(
            iterates = log.num_iterates(),
            ?termination,
            runtime_s = start.elapsed().as_secs_f64(),
            "solve finished"
        );
        Ok(log)
    }
}

/// Max absolute deviation on the trust-region dimensions stays within the
/// radius.
fn within_trust_region(
    old: &OperatingPoint,
    new: &OperatingPoint,
    params: &SolverParams,
) -> bool {
    params.trust_region_dimensions.iter().all(|&dim| {
        old.xs
            .iter()
            .zip(&new.xs)
            .all(|(old_x, new_x)| (new_x[dim] - old_x[dim]).abs() <= params.trust_region_radius)
    })
}

/// Max per-step, per-player change in nominal controls between two operating
/// points.
fn max_control_change(old: &OperatingPoint, new: &OperatingPoint) -> f64 {
    old.us
        .iter()
        .zip(&new.us)
        .flat_map(|(old_us, new_us)| {
            old_us
                .iter()
                .zip(new_us)
                .map(|(old_u, new_u)| (new_u - old_u).amax())
        })
        .fold(0.0, f64::max)
}

fn max_cost(costs: &[f64]) -> f64 {
    costs.iter().copied().fold(f64::NEG_INFINITY, f64::max)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
