//! Two-player 1-D point mass with linear time-invariant dynamics.
//!
//! The classic coupled-control benchmark: both players push the same mass,
//!
//! ```text
//! x' = [ position' ]   [ 0 1 ] x + B_1 u_1 + B_2 u_2
//!      [ velocity' ] = [ 0 0 ]
//! ```
//!
//! Because the dynamics are exactly linear, a single LQ solve is already the
//! equilibrium, which makes this the reference scenario for ground-truth
//! comparisons.

use nalgebra::{DMatrix, DVector};

use gameplan_core::approximation::LinearDynamicsApproximation;
use gameplan_core::traits::Dynamics;
use gameplan_core::types::PlayerIndex;

/// Two players exerting scalar controls on one 1-D point mass.
pub struct TwoPlayerPointMass1D {
    time_step: f64,
    a: DMatrix<f64>,
    b1: DVector<f64>,
    b2: DVector<f64>,
}

impl TwoPlayerPointMass1D {
    /// Create the system with its canonical control-effectiveness vectors.
    #[must_use]
    pub fn new(time_step: f64) -> Self {
        let mut a = DMatrix::zeros(2, 2);
        a[(0, 1)] = 1.0;
        Self {
            time_step,
            a,
            b1: DVector::from_vec(vec![0.05, 1.0]),
            b2: DVector::from_vec(vec![0.032, 0.11]),
        }
    }
}

impl Dynamics for TwoPlayerPointMass1D {
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
        self.time_step
    }

    fn evaluate(&self, _t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> DVector<f64> {
        &self.a * x + &self.b1 * us[0][0] + &self.b2 * us[1][0]
    }

    fn linearize(
        &self,
        _t: f64,
        _x: &DVector<f64>,
        _us: &[DVector<f64>],
    ) -> LinearDynamicsApproximation {
        let mut lin = LinearDynamicsApproximation::identity(2, &[1, 1]);
        lin.a += &self.a * self.time_step;
        lin.bs[0] = DMatrix::from_column_slice(2, 1, self.b1.as_slice()) * self.time_step;
        lin.bs[1] = DMatrix::from_column_slice(2, 1, self.b2.as_slice()) * self.time_step;
        lin
    }
}
