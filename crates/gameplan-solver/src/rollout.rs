//! Closed-loop forward pass and trajectory cost evaluation.

use nalgebra::DVector;

use gameplan_core::error::SolverError;
use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::strategy::Strategy;
use gameplan_core::traits::{Dynamics, PlayerCost};

/// Roll the given strategies forward from `x0`, producing a new operating
/// point on the same time grid.
///
/// At each step the control is the feedback law around the old operating
/// point with the feedforward term scaled by `feedforward_scale`; the state
/// is then advanced by one Runge-Kutta step with controls held constant.
/// With `feedforward_scale = 0` and `x0` equal to the old initial state, the
/// result reproduces a dynamically consistent operating point exactly.
///
/// Any non-finite state or control aborts with
/// [`SolverError::RolloutDiverged`].
pub fn rollout<D: Dynamics + ?Sized>(
    dynamics: &D,
    operating_point: &OperatingPoint,
    strategies: &[Strategy],
    x0: &DVector<f64>,
    feedforward_scale: f64,
) -> Result<OperatingPoint, SolverError> {
    let num_time_steps = operating_point.len();
    let dt = dynamics.time_step();

    let mut next = OperatingPoint::zeros(
        num_time_steps,
        dynamics.x_dim(),
        &dynamics.u_dims(),
        operating_point.t0,
    );

    let mut x = x0.clone();
    for k in 0..num_time_steps {
        if !is_finite(&x) {
            return Err(SolverError::RolloutDiverged { step: k });
        }
        next.xs[k] = x;

        for (i, strategy) in strategies.iter().enumerate() {
            let u = strategy.control(
                k,
                &next.xs[k],
                &operating_point.xs[k],
                &operating_point.us[k][i],
                feedforward_scale,
            );
            if !is_finite(&u) {
                return Err(SolverError::RolloutDiverged { step: k });
            }
            next.us[k][i] = u;
        }

        let t = operating_point.time_of(k, dt);
        x = dynamics.integrate_step(t, dt, &next.xs[k], &next.us[k]);
    }

    Ok(next)
}

/// Per-player total costs along an operating point.
#[must_use]
pub fn total_player_costs(
    costs: &[Box<dyn PlayerCost>],
    operating_point: &OperatingPoint,
    time_step: f64,
) -> Vec<f64> {
    costs
        .iter()
        .map(|cost| {
            (0..operating_point.len())
                .map(|k| {
                    cost.evaluate(
                        operating_point.time_of(k, time_step),
                        &operating_point.xs[k],
                        &operating_point.us[k],
                    )
                })
                .sum()
        })
        .collect()
}

fn is_finite(v: &DVector<f64>) -> bool {
    v.iter().all(|value| value.is_finite())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use gameplan_core::approximation::LinearDynamicsApproximation;
    use gameplan_core::types::PlayerIndex;
    use nalgebra::DMatrix;

    /// Two-player double integrator in one spatial dimension.
    struct PointMass {
        dt: f64,
    }

    impl Dynamics for PointMass {
        fn x_dim(&self) -> usize {
            2
        }
        fn u_dim(&self, _player: PlayerIndex) -> usize {
            1
        }
        fn num_players(&self) -> usize {
            2
        }
        fn time_step(&self) -> f64 {
            self.dt
        }
        fn evaluate(&self, _t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> DVector<f64> {
            DVector::from_vec(vec![x[1], us[0][0] + us[1][0]])
        }
        fn linearize(
            &self,
            _t: f64,
            _x: &DVector<f64>,
            _us: &[DVector<f64>],
        ) -> LinearDynamicsApproximation {
            let mut lin = LinearDynamicsApproximation::identity(2, &[1, 1]);
            lin.a[(0, 1)] += self.dt;
            lin.bs[0] = DMatrix::from_column_slice(2, 1, &[0.0, self.dt]);
            lin.bs[1] = DMatrix::from_column_slice(2, 1, &[0.0, self.dt]);
            lin
        }
    }

    fn consistent_operating_point(dynamics: &PointMass, num_steps: usize) -> OperatingPoint {
        // Roll zero strategies from a nonzero initial state so the result is
        // dynamically consistent by construction.
        let zero_op = OperatingPoint::zeros(num_steps, 2, &[1, 1], 0.0);
        let strategies = vec![Strategy::zeros(num_steps, 2, 1); 2];
        let x0 = DVector::from_vec(vec![1.0, -0.5]);
        rollout(dynamics, &zero_op, &strategies, &x0, 1.0).unwrap()
    }

    #[test]
    fn rollout_shapes() {
        let dynamics = PointMass { dt: 0.1 };
        let op = consistent_operating_point(&dynamics, 10);
        assert_eq!(op.len(), 10);
        assert_eq!(op.num_players(), 2);
        assert_eq!(op.xs[0], DVector::from_vec(vec![1.0, -0.5]));
    }

    #[test]
    fn zero_feedforward_reproduces_operating_point_exactly() {
        let dynamics = PointMass { dt: 0.1 };
        let op = consistent_operating_point(&dynamics, 25);

        // Strategies with nonzero gains and offsets: at scale 0 with matching
        // initial state the feedback error is identically zero, so the pass
        // must reproduce the trajectory bit for bit.
        let mut strategies = vec![Strategy::zeros(25, 2, 1); 2];
        for strategy in &mut strategies {
            for k in 0..25 {
                strategy.ps[k] = DMatrix::from_row_slice(1, 2, &[0.3, -0.7]);
                strategy.alphas[k] = DVector::from_vec(vec![42.0]);
            }
        }

        let x0 = op.xs[0].clone();
        let replayed = rollout(&dynamics, &op, &strategies, &x0, 0.0).unwrap();
        assert_eq!(replayed, op);
    }

    #[test]
    fn diverged_rollout_reports_step() {
        let dynamics = PointMass { dt: 0.1 };
        let op = consistent_operating_point(&dynamics, 5);
        let strategies = vec![Strategy::zeros(5, 2, 1); 2];

        let x0 = DVector::from_vec(vec![f64::NAN, 0.0]);
        let err = rollout(&dynamics, &op, &strategies, &x0, 1.0).unwrap_err();
        assert_eq!(err, SolverError::RolloutDiverged { step: 0 });
    }

    #[test]
    fn total_costs_sum_over_steps() {
        struct UnitCost {
            player: PlayerIndex,
        }
        impl PlayerCost for UnitCost {
            fn player(&self) -> PlayerIndex {
                self.player
            }
            fn evaluate(&self, _t: f64, x: &DVector<f64>, _us: &[DVector<f64>]) -> f64 {
                x[0]
            }
            fn quadraticize(
                &self,
                _t: f64,
                x: &DVector<f64>,
                _us: &[DVector<f64>],
            ) -> gameplan_core::approximation::QuadraticCostApproximation {
                gameplan_core::approximation::QuadraticCostApproximation::zeros(x.len())
            }
        }

        let mut op = OperatingPoint::zeros(3, 1, &[1], 0.0);
        op.xs[0][0] = 1.0;
        op.xs[1][0] = 2.0;
        op.xs[2][0] = 4.0;

        let costs: Vec<Box<dyn PlayerCost>> = vec![Box::new(UnitCost { player: 0 })];
        let totals = total_player_costs(&costs, &op, 0.1);
        assert!((totals[0] - 7.0).abs() < 1e-12);
    }
}
