//! N-player fleet of planar unicycles on a concatenated state.
//!
//! Each player owns a 4-state block `[px, py, theta, v]` and a 2-control
//! vector `[omega, a]` (yaw rate, longitudinal acceleration):
//!
//! ```text
//! px' = v cos(theta)
//! py' = v sin(theta)
//! theta' = omega
//! v' = a
//! ```
//!
//! Players are dynamically decoupled; all coupling enters through the costs.

use nalgebra::DVector;

use gameplan_core::approximation::LinearDynamicsApproximation;
use gameplan_core::traits::Dynamics;
use gameplan_core::types::PlayerIndex;

/// States per unicycle.
pub const UNICYCLE_X_DIM: usize = 4;
/// Controls per unicycle.
pub const UNICYCLE_U_DIM: usize = 2;

/// `num_players` independent unicycles stacked into one state vector.
pub struct UnicycleFleet {
    num_players: usize,
    time_step: f64,
}

impl UnicycleFleet {
    /// Create a fleet of `num_players` unicycles.
    #[must_use]
    pub fn new(num_players: usize, time_step: f64) -> Self {
        Self {
            num_players,
            time_step,
        }
    }

    /// Offset of player `i`'s state block.
    #[must_use]
    pub fn x_offset(player: PlayerIndex) -> usize {
        player * UNICYCLE_X_DIM
    }
}

impl Dynamics for UnicycleFleet {
    fn x_dim(&self) -> usize {
        self.num_players * UNICYCLE_X_DIM
    }

    fn u_dim(&self, _player: PlayerIndex) -> usize {
        UNICYCLE_U_DIM
    }

    fn num_players(&self) -> usize {
        self.num_players
    }

    fn time_step(&self) -> f64 {
        self.time_step
    }

    fn evaluate(&self, _t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> DVector<f64> {
        let mut dx = DVector::zeros(self.x_dim());
        for (i, u) in us.iter().enumerate() {
            let o = Self::x_offset(i);
            let theta = x[o + 2];
            let v = x[o + 3];
            dx[o] = v * theta.cos();
            dx[o + 1] = v * theta.sin();
            dx[o + 2] = u[0];
            dx[o + 3] = u[1];
        }
        dx
    }

    fn linearize(
        &self,
        _t: f64,
        x: &DVector<f64>,
        _us: &[DVector<f64>],
    ) -> LinearDynamicsApproximation {
        let dt = self.time_step;
        let mut lin =
            LinearDynamicsApproximation::identity(self.x_dim(), &vec![UNICYCLE_U_DIM; self.num_players]);

        for i in 0..self.num_players {
            let o = Self::x_offset(i);
            let theta = x[o + 2];
            let v = x[o + 3];

            lin.a[(o, o + 2)] = -v * theta.sin() * dt;
            lin.a[(o, o + 3)] = theta.cos() * dt;
            lin.a[(o + 1, o + 2)] = v * theta.cos() * dt;
            lin.a[(o + 1, o + 3)] = theta.sin() * dt;

            let b = &mut lin.bs[i];
            b[(o + 2, 0)] = dt;
            b[(o + 3, 1)] = dt;
        }
        lin
    }
}
