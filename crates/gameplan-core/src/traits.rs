use nalgebra::DVector;

use crate::approximation::{LinearDynamicsApproximation, QuadraticCostApproximation};
use crate::operating_point::OperatingPoint;
use crate::strategy::Strategy;
use crate::types::{GameDims, PlayerIndex};

// ---------------------------------------------------------------------------
// Dynamics
// ---------------------------------------------------------------------------

/// Joint dynamics of an N-player system with continuous state and control.
///
/// Implementors supply the continuous-time derivative and a discrete-time
/// Jacobian linearization; forward integration is provided on top of
/// [`evaluate`](Dynamics::evaluate) with a fixed-step Runge-Kutta 4 scheme.
pub trait Dynamics: Send + Sync {
    /// Concatenated state dimension `n`.
    fn x_dim(&self) -> usize;

    /// Control dimension of one player.
    fn u_dim(&self, player: PlayerIndex) -> usize;

    /// Number of players.
    fn num_players(&self) -> usize;

    /// Discretization step used by [`linearize`](Dynamics::linearize) and
    /// the provided integrators.
    fn time_step(&self) -> f64;

    /// Continuous-time state derivative at `(t, x, us)`.
    fn evaluate(&self, t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> DVector<f64>;

    /// Discrete-time linearization at `(t, x, us)`, already scaled by
    /// [`time_step`](Dynamics::time_step): `A = I + A_c dt`, `B_i = B_c_i dt`
    /// for an explicit Euler discretization, or better if the implementor
    /// has one.
    fn linearize(
        &self,
        t: f64,
        x: &DVector<f64>,
        us: &[DVector<f64>],
    ) -> LinearDynamicsApproximation;

    /// Per-player control dimensions.
    fn u_dims(&self) -> Vec<usize> {
        (0..self.num_players()).map(|i| self.u_dim(i)).collect()
    }

    /// Dimension bundle for this system.
    fn dims(&self) -> GameDims {
        GameDims::new(self.x_dim(), self.u_dims())
    }

    /// Sum of all control dimensions.
    fn total_u_dim(&self) -> usize {
        (0..self.num_players()).map(|i| self.u_dim(i)).sum()
    }

    /// One Runge-Kutta 4 step of length `dt` with controls held constant.
    fn integrate_step(
        &self,
        t: f64,
        dt: f64,
        x: &DVector<f64>,
        us: &[DVector<f64>],
    ) -> DVector<f64> {
        let k1 = self.evaluate(t, x, us);
        let k2 = self.evaluate(t + 0.5 * dt, &(x + 0.5 * dt * &k1), us);
        let k3 = self.evaluate(t + 0.5 * dt, &(x + 0.5 * dt * &k2), us);
        let k4 = self.evaluate(t + dt, &(x + dt * &k3), us);
        x + (dt / 6.0) * (k1 + 2.0 * k2 + 2.0 * k3 + k4)
    }

    /// Integrate from `t0` to `t1` under the closed-loop feedback law derived
    /// from `(operating_point, strategies)`.
    ///
    /// Marches in substeps of at most [`time_step`](Dynamics::time_step),
    /// re-evaluating the feedback law at the start of each substep and
    /// holding controls constant across it.
    fn integrate(
        &self,
        t0: f64,
        t1: f64,
        x0: &DVector<f64>,
        operating_point: &OperatingPoint,
        strategies: &[Strategy],
    ) -> DVector<f64> {
        let dt = self.time_step();
        let mut t = t0;
        let mut x = x0.clone();
        while t < t1 - 1e-12 {
            let step = (t1 - t).min(dt);
            let k = operating_point.index_at_or_before(t, dt);
            let us: Vec<DVector<f64>> = strategies
                .iter()
                .enumerate()
                .map(|(i, strategy)| {
                    strategy.control(
                        k.min(strategy.len() - 1),
                        &x,
                        &operating_point.xs[k],
                        &operating_point.us[k][i],
                        1.0,
                    )
                })
                .collect();
            x = self.integrate_step(t, step, &x, &us);
            t += step;
        }
        x
    }
}

// ---------------------------------------------------------------------------
// PlayerCost
// ---------------------------------------------------------------------------

/// Running cost of a single player over the joint state and all controls.
pub trait PlayerCost: Send + Sync {
    /// Index of the player this cost belongs to.
    fn player(&self) -> PlayerIndex;

    /// Scalar cost at `(t, x, us)`.
    fn evaluate(&self, t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> f64;

    /// Quadratic expansion at `(t, x, us)`.
    ///
    /// The returned control map must contain the player's own block
    /// `(R_ii, r_ii)`; cross blocks are optional and default to zero.
    fn quadraticize(
        &self,
        t: f64,
        x: &DVector<f64>,
        us: &[DVector<f64>],
    ) -> QuadraticCostApproximation;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
