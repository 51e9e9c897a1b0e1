//! Problem façade: owns the dynamics, the per-player costs, the initial
//! state, and the current best solution; exposes `solve`.
//!
//! The receding-horizon driver manipulates a problem through
//! [`set_up_next_receding_horizon`](Problem::set_up_next_receding_horizon)
//! and [`overwrite_solution`](Problem::overwrite_solution); everything else
//! borrows the owned pieces read-only for the duration of a solve.

use std::time::Duration;

use nalgebra::DVector;
use tracing::debug;

use gameplan_core::error::{GameError, SolverError};
use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::params::SolverParams;
use gameplan_core::strategy::Strategy;
use gameplan_core::traits::{Dynamics, PlayerCost};

use crate::ilq_solver::IlqSolver;
use crate::log::SolverLog;
use crate::rollout::rollout;

/// A complete game: dynamics, one cost per player, parameters, and the
/// current warm start.
pub struct Problem<D: Dynamics> {
    dynamics: D,
    costs: Vec<Box<dyn PlayerCost>>,
    params: SolverParams,
    x0: DVector<f64>,
    operating_point: OperatingPoint,
    strategies: Vec<Strategy>,
    solver: IlqSolver,
}

impl<D: Dynamics> Problem<D> {
    /// Build a problem starting at `(t0, x0)` with zero initial strategies
    /// and a dynamically consistent initial operating point.
    ///
    /// Validates parameters and capability shapes up front so the hot loops
    /// can assume them.
    pub fn new(
        dynamics: D,
        costs: Vec<Box<dyn PlayerCost>>,
        params: SolverParams,
        x0: DVector<f64>,
        t0: f64,
    ) -> Result<Self, GameError> {
        params.validate()?;

        if x0.len() != dynamics.x_dim() {
            return Err(SolverError::ShapeMismatch {
                context: "initial state",
                expected: dynamics.x_dim(),
                got: x0.len(),
            }
            .into());
        }
        if costs.len() != dynamics.num_players() {
            return Err(SolverError::ShapeMismatch {
                context: "player costs",
                expected: dynamics.num_players(),
                got: costs.len(),
            }
            .into());
        }
        for (i, cost) in costs.iter().enumerate() {
            if cost.player() != i {
                return Err(SolverError::ShapeMismatch {
                    context: "cost player index",
                    expected: i,
                    got: cost.player(),
                }
                .into());
            }
        }

        let num_time_steps = params.num_time_steps();
        let u_dims = dynamics.u_dims();
        let strategies: Vec<Strategy> = u_dims
            .iter()
            .map(|&u_dim| Strategy::zeros(num_time_steps, dynamics.x_dim(), u_dim))
            .collect();

        let zero_op = OperatingPoint::zeros(num_time_steps, dynamics.x_dim(), &u_dims, t0);
        let operating_point = rollout(&dynamics, &zero_op, &strategies, &x0, 1.0)
            .map_err(GameError::Solver)?;

        let solver = IlqSolver::new(dynamics.dims(), &params);

        Ok(Self {
            dynamics,
            costs,
            params,
            x0,
            operating_point,
            strategies,
            solver,
        })
    }

    /// Run the iterative solver from the current warm start, optionally under
    /// a runtime budget, and adopt the final iterate as the new warm start.
    pub fn solve(&mut self, budget: Option<Duration>) -> Result<SolverLog, SolverError> {
        let log = self.solver.solve(
            &self.dynamics,
            &self.costs,
            &self.x0,
            &self.operating_point,
            &self.strategies,
            &self.params,
            budget,
        )?;
        self.operating_point = log.final_operating_point().clone();
        self.strategies = log.final_strategies().to_vec();
        Ok(log)
    }

    /// Re-anchor the problem at plant state `x` and time `t` for the next
    /// receding-horizon stage: drop the executed prefix of the warm start and
    /// advance `t0`. The remaining horizon shrinks accordingly (never below
    /// two steps).
    pub fn set_up_next_receding_horizon(
        &mut self,
        x: &DVector<f64>,
        t: f64,
        planner_runtime: f64,
    ) {
        let dt = self.params.time_step;
        let len = self.operating_point.len();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let shift = ((((t - self.operating_point.t0) / dt).round()).max(0.0) as usize)
            .min(len.saturating_sub(2));
        debug!(t, planner_runtime, shift, "advancing receding horizon");

        self.operating_point.xs.drain(..shift);
        self.operating_point.us.drain(..shift);
        self.operating_point.t0 = t;
        for strategy in &mut self.strategies {
            strategy.ps.drain(..shift);
            strategy.alphas.drain(..shift);
        }
        self.x0 = x.clone();
    }

    /// Install a spliced solution as the warm start. The horizon follows the
    /// given operating point.
    pub fn overwrite_solution(
        &mut self,
        operating_point: OperatingPoint,
        strategies: Vec<Strategy>,
    ) {
        assert_eq!(
            operating_point.len(),
            strategies.first().map_or(0, Strategy::len),
            "Operating point and strategy horizons must agree"
        );
        self.operating_point = operating_point;
        self.strategies = strategies;
    }

    /// Current initial state.
    #[must_use]
    pub fn x0(&self) -> &DVector<f64> {
        &self.x0
    }

    /// Solver parameters.
    #[must_use]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// The dynamics capability.
    #[must_use]
    pub fn dynamics(&self) -> &D {
        &self.dynamics
    }

    /// Per-player costs.
    #[must_use]
    pub fn costs(&self) -> &[Box<dyn PlayerCost>] {
        &self.costs
    }

    /// Current warm-start operating point.
    #[must_use]
    pub fn operating_point(&self) -> &OperatingPoint {
        &self.operating_point
    }

    /// Current warm-start strategies.
    #[must_use]
    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
