//! End-to-end checks of the iterative LQ loop: the single-player degenerate
//! game collapses to a plain finite-horizon LQR, and the line search must
//! rescue steps produced by a miscalibrated cost expansion.

use approx::assert_relative_eq;
use nalgebra::{DMatrix, DVector};

use gameplan_core::approximation::{LinearDynamicsApproximation, QuadraticCostApproximation};
use gameplan_core::params::SolverParams;
use gameplan_core::traits::{Dynamics, PlayerCost};
use gameplan_core::types::{GameDims, PlayerIndex};
use gameplan_scenarios::costs::{CompositeCost, CostTerm};
use gameplan_solver::log::TerminationReason;
use gameplan_solver::lq_solver::LqFeedbackSolver;
use gameplan_solver::problem::Problem;

const TIME_STEP: f64 = 0.1;

/// Single-player 1-D point mass: state [position, velocity], scalar thrust.
struct SinglePlayerPointMass;

impl Dynamics for SinglePlayerPointMass {
    fn x_dim(&self) -> usize {
        2
    }
    fn u_dim(&self, _player: PlayerIndex) -> usize {
        1
    }
    fn num_players(&self) -> usize {
        1
    }
    fn time_step(&self) -> f64 {
        TIME_STEP
    }
    fn evaluate(&self, _t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> DVector<f64> {
        DVector::from_vec(vec![x[1], us[0][0]])
    }
    fn linearize(
        &self,
        _t: f64,
        _x: &DVector<f64>,
        _us: &[DVector<f64>],
    ) -> LinearDynamicsApproximation {
        let mut lin = LinearDynamicsApproximation::identity(2, &[1]);
        lin.a[(0, 1)] += TIME_STEP;
        lin.bs[0] = DMatrix::from_column_slice(2, 1, &[0.0, TIME_STEP]);
        lin
    }
}

fn regulator_cost() -> CompositeCost {
    CompositeCost::new(
        0,
        1,
        vec![
            CostTerm::StateDeviation {
                dimension: 0,
                nominal: 0.0,
                weight: 1.0,
            },
            CostTerm::StateDeviation {
                dimension: 1,
                nominal: 0.0,
                weight: 1.0,
            },
            CostTerm::ControlEffort {
                player: 0,
                weight: 1.0,
            },
        ],
    )
}

/// Independent finite-horizon discrete Riccati backward pass.
fn riccati_gains(
    a: &DMatrix<f64>,
    b: &DMatrix<f64>,
    q: &DMatrix<f64>,
    r: &DMatrix<f64>,
    num_steps: usize,
) -> Vec<DMatrix<f64>> {
    let mut gains = vec![DMatrix::zeros(1, 2); num_steps];
    let mut z = q.clone();
    for k in (0..num_steps.saturating_sub(1)).rev() {
        let gain = (r + b.transpose() * &z * b)
            .qr()
            .solve(&(b.transpose() * &z * a))
            .expect("regulator coupling is positive definite");
        let closed_loop = a - b * &gain;
        z = closed_loop.transpose() * &z * &closed_loop
            + gain.transpose() * r * &gain
            + q;
        gains[k] = gain;
    }
    gains
}

#[test]
fn single_player_game_matches_riccati_recursion() {
    const NUM_STEPS: usize = 50;

    let dynamics = SinglePlayerPointMass;
    let cost = regulator_cost();
    let x = DVector::zeros(2);
    let us = vec![DVector::zeros(1)];
    let lin = dynamics.linearize(0.0, &x, &us);
    let quad: Vec<QuadraticCostApproximation> = vec![cost.quadraticize(0.0, &x, &us)];

    let mut solver = LqFeedbackSolver::new(GameDims::new(2, vec![1]), 1e-9);
    let strategies = solver
        .solve(&vec![lin.clone(); NUM_STEPS], &vec![quad; NUM_STEPS])
        .unwrap();

    let q = DMatrix::identity(2, 2);
    let r = DMatrix::from_element(1, 1, 1.0);
    let gains = riccati_gains(&lin.a, &lin.bs[0], &q, &r, NUM_STEPS);

    for k in 0..NUM_STEPS {
        assert_relative_eq!(
            (&strategies[0].ps[k] - &gains[k]).amax(),
            0.0,
            epsilon = 1e-6
        );
    }
}

#[test]
fn ilq_on_linear_quadratic_problem_converges_to_lqr() {
    let params = SolverParams {
        time_step: TIME_STEP,
        horizon: 5.0,
        convergence_tolerance: 1e-6,
        ..SolverParams::default()
    };
    let num_steps = params.num_time_steps();

    let mut problem = Problem::new(
        SinglePlayerPointMass,
        vec![Box::new(regulator_cost())],
        params,
        DVector::from_vec(vec![5.0, 0.0]),
        0.0,
    )
    .unwrap();

    let log = problem.solve(None).unwrap();
    // The loop either meets a convergence criterion or stalls at its fixed
    // point; both leave the best iterate last.
    assert!(matches!(
        log.termination(),
        Some(TerminationReason::Converged | TerminationReason::NoProgress)
    ));
    assert!(
        log.final_iterate().player_costs[0] < log.first_iterate().player_costs[0],
        "regulation must beat the passive warm start"
    );

    // The converged feedback matches the Riccati gains.
    let lin = SinglePlayerPointMass.linearize(
        0.0,
        &DVector::zeros(2),
        &[DVector::zeros(1)],
    );
    let gains = riccati_gains(
        &lin.a,
        &lin.bs[0],
        &DMatrix::identity(2, 2),
        &DMatrix::from_element(1, 1, 1.0),
        num_steps,
    );
    let final_strategy = &log.final_strategies()[0];
    for k in 0..num_steps {
        assert_relative_eq!(
            (&final_strategy.ps[k] - &gains[k]).amax(),
            0.0,
            epsilon = 1e-6
        );
    }
}

/// Wraps a cost but reports an exaggerated state gradient, so the full LQ
/// step overshoots the true optimum.
struct OverstatedGradientCost {
    inner: CompositeCost,
    factor: f64,
}

impl PlayerCost for OverstatedGradientCost {
    fn player(&self) -> PlayerIndex {
        self.inner.player()
    }
    fn evaluate(&self, t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> f64 {
        self.inner.evaluate(t, x, us)
    }
    fn quadraticize(
        &self,
        t: f64,
        x: &DVector<f64>,
        us: &[DVector<f64>],
    ) -> QuadraticCostApproximation {
        let mut quad = self.inner.quadraticize(t, x, us);
        quad.state_grad *= self.factor;
        quad
    }
}

#[test]
fn line_search_rescues_overshooting_steps() {
    let params = SolverParams {
        time_step: TIME_STEP,
        horizon: 5.0,
        ..SolverParams::default()
    };

    let cost = OverstatedGradientCost {
        inner: regulator_cost(),
        factor: 3.0,
    };
    let mut problem = Problem::new(
        SinglePlayerPointMass,
        vec![Box::new(cost)],
        params,
        DVector::from_vec(vec![5.0, 0.0]),
        0.0,
    )
    .unwrap();

    let log = problem.solve(None).unwrap();

    // The first accepted step cannot be the full step: scaled three times
    // too far, it increases the true cost and gets halved.
    let first_accepted = &log.iterates()[1];
    assert!(
        first_accepted.step_size <= 0.5,
        "full step should have been rejected, accepted {}",
        first_accepted.step_size
    );
    assert!(
        log.final_iterate().player_costs[0] < log.first_iterate().player_costs[0],
        "cost must still decrease despite the miscalibrated expansion"
    );
}

#[test]
fn single_step_horizon_problem_is_solvable() {
    let params = SolverParams {
        time_step: TIME_STEP,
        horizon: TIME_STEP,
        ..SolverParams::default()
    };
    let mut problem = Problem::new(
        SinglePlayerPointMass,
        vec![Box::new(regulator_cost())],
        params,
        DVector::from_vec(vec![1.0, 0.0]),
        0.0,
    )
    .unwrap();

    let log = problem.solve(None).unwrap();
    assert!(log.num_iterates() >= 1);
    assert_eq!(log.final_strategies()[0].len(), 1);
    assert_eq!(log.final_operating_point().len(), 1);
}
