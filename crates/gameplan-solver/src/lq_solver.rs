//! Closed-form solver for a time-varying, finite-horizon LQ game.
//!
//! One backward sweep of the dynamic program from Basar and Olsder,
//! Corollary 6.1 (pp. 279). Given per-step linearizations
//!
//! ```text
//! dx_{k+1} = A_k dx_k + sum_i B_{i,k} du_k^i
//! ```
//!
//! and per-step, per-player quadratic cost expansions, it returns the
//! feedback Nash strategies `(P_{i,k}, alpha_{i,k})` for every player.
//!
//! Index convention: entries at step `k` correspond to the current time
//! except the state blocks `(Q, l)`, which refer to the next state
//! `x_{k+1}`; the final entry acts purely as a terminal cost, so the sweep
//! starts at `K - 2` and the strategy entry at `K - 1` stays zero.

use nalgebra::{DMatrix, DVector};

use gameplan_core::approximation::{
    LinearDynamicsApproximation, QuadraticCostApproximation, ValueFunction,
};
use gameplan_core::error::SolverError;
use gameplan_core::strategy::Strategy;
use gameplan_core::types::GameDims;

/// Backward-sweep LQ game solver with persistent workspace buffers.
///
/// All buffers are sized at construction from the game dimensions and reused
/// across invocations; per-step value functions are recorded and readable
/// after a solve.
pub struct LqFeedbackSolver {
    dims: GameDims,
    singularity_tolerance: f64,

    // Workspace: coupling system S X = Y with U = sum_i u_i rows.
    s: DMatrix<f64>,
    y: DMatrix<f64>,

    // Per-player value-to-go, updated in place during the sweep.
    zs: Vec<DMatrix<f64>>,
    zetas: Vec<DVector<f64>>,

    // Closed-loop transition scratch.
    f: DMatrix<f64>,
    beta: DVector<f64>,

    // Recorded value functions, `values[k][player]`.
    values: Vec<Vec<ValueFunction>>,
}

impl LqFeedbackSolver {
    /// Create a solver for the given game dimensions.
    #[must_use]
    pub fn new(dims: GameDims, singularity_tolerance: f64) -> Self {
        let n = dims.x_dim;
        let total_u = dims.total_u_dim();
        let zs = dims.u_dims.iter().map(|_| DMatrix::zeros(n, n)).collect();
        let zetas = dims.u_dims.iter().map(|_| DVector::zeros(n)).collect();
        Self {
            dims,
            singularity_tolerance,
            s: DMatrix::zeros(total_u, total_u),
            y: DMatrix::zeros(total_u, n + 1),
            zs,
            zetas,
            f: DMatrix::zeros(n, n),
            beta: DVector::zeros(n),
            values: Vec::new(),
        }
    }

    /// Game dimensions this solver was built for.
    #[must_use]
    pub fn dims(&self) -> &GameDims {
        &self.dims
    }

    /// Value functions recorded during the last solve, `[step][player]`.
    #[must_use]
    pub fn values(&self) -> &[Vec<ValueFunction>] {
        &self.values
    }

    /// Solve the LQ game and return one strategy per player, each of length
    /// `linearization.len()`.
    ///
    /// Fails with [`SolverError::SingularCoupling`] if the control coupling
    /// matrix loses rank at any step.
    pub fn solve(
        &mut self,
        linearization: &[LinearDynamicsApproximation],
        quadraticization: &[Vec<QuadraticCostApproximation>],
    ) -> Result<Vec<Strategy>, SolverError> {
        let num_time_steps = linearization.len();
        let num_players = self.dims.num_players();
        let n = self.dims.x_dim;
        let total_u = self.dims.total_u_dim();

        assert_eq!(
            quadraticization.len(),
            num_time_steps,
            "Linearization/quadraticization length mismatch"
        );
        assert!(num_time_steps > 0, "Horizon must have at least one step");

        let mut strategies: Vec<Strategy> = (0..num_players)
            .map(|i| Strategy::zeros(num_time_steps, n, self.dims.u_dim(i)))
            .collect();

        // Reuse the value buffer across solves; only a horizon change
        // reallocates.
        self.values.resize_with(num_time_steps, || {
            (0..num_players).map(|_| ValueFunction::zeros(n)).collect()
        });

        // Terminal condition: the last quadraticization is the terminal cost.
        let terminal = &quadraticization[num_time_steps - 1];
        for i in 0..num_players {
            self.zs[i].copy_from(&terminal[i].state_hess);
            self.zetas[i].copy_from(&terminal[i].state_grad);
            self.values[num_time_steps - 1][i] = ValueFunction {
                hess: self.zs[i].clone(),
                grad: self.zetas[i].clone(),
            };
        }

        // Backward sweep from the second-to-last step.
        for kk in (0..num_time_steps.saturating_sub(1)).rev() {
            let lin = &linearization[kk];
            let quad = &quadraticization[kk];

            // Populate the coupling matrix S and right-hand side Y.
            // S is generally dense and asymmetric; it is symmetric only when
            // all players share the same Z.
            for i in 0..num_players {
                let row = self.dims.u_offset(i);
                let u_i = self.dims.u_dim(i);

                let bizi = lin.bs[i].transpose() * &self.zs[i];

                for j in 0..num_players {
                    let col = self.dims.u_offset(j);
                    let u_j = self.dims.u_dim(j);

                    let block = if i == j {
                        let own = quad[i]
                            .control
                            .get(&i)
                            .expect("player cost must provide its own control block");
                        &bizi * &lin.bs[i] + &own.hess
                    } else {
                        &bizi * &lin.bs[j]
                    };
                    self.s.view_mut((row, col), (u_i, u_j)).copy_from(&block);
                }

                let state_rows = &bizi * &lin.a;
                self.y.view_mut((row, 0), (u_i, n)).copy_from(&state_rows);

                let own = &quad[i].control[&i];
                let offset_rows = lin.bs[i].transpose() * &self.zetas[i] + &own.grad;
                self.y.view_mut((row, n), (u_i, 1)).copy_from(&offset_rows);
            }

            // Solve S X = Y by rank-revealing Householder QR.
            let qr = self.s.clone().col_piv_qr();
            let r = qr.r();
            let min_pivot = (0..total_u)
                .map(|d| r[(d, d)].abs())
                .fold(f64::INFINITY, f64::min);
            if min_pivot < self.singularity_tolerance {
                return Err(SolverError::SingularCoupling {
                    step: kk,
                    min_pivot,
                });
            }
            let x = qr.solve(&self.y).ok_or(SolverError::SingularCoupling {
                step: kk,
                min_pivot,
            })?;

            // Split X row-wise by player into (P, alpha), then record.
            for (i, strategy) in strategies.iter_mut().enumerate() {
                let row = self.dims.u_offset(i);
                let u_i = self.dims.u_dim(i);
                strategy.ps[kk].copy_from(&x.view((row, 0), (u_i, n)));
                strategy.alphas[kk].copy_from(&x.view((row, n), (u_i, 1)));
            }

            // Closed-loop transition F = A - sum_i B_i P_i and offset
            // beta = -sum_i B_i alpha_i.
            self.f.copy_from(&lin.a);
            self.beta.fill(0.0);
            for (i, strategy) in strategies.iter().enumerate() {
                self.f -= &lin.bs[i] * &strategy.ps[kk];
                self.beta -= &lin.bs[i] * &strategy.alphas[kk];
            }

            // Propagate each player's value function backward.
            for i in 0..num_players {
                let zeta = self.f.transpose() * (&self.zetas[i] + &self.zs[i] * &self.beta)
                    + &quad[i].state_grad;
                self.zetas[i] = zeta;
                let z = self.f.transpose() * &self.zs[i] * &self.f + &quad[i].state_hess;
                self.zs[i] = z;

                // Cross-control terms for every R_ij the player carries;
                // absent entries contribute nothing.
                for (&j, block) in &quad[i].control {
                    let p_j = &strategies[j].ps[kk];
                    let alpha_j = &strategies[j].alphas[kk];
                    self.zetas[i] += p_j.transpose() * (&block.hess * alpha_j - &block.grad);
                    self.zs[i] += p_j.transpose() * &block.hess * p_j;
                }

                self.values[kk][i] = ValueFunction {
                    hess: self.zs[i].clone(),
                    grad: self.zetas[i].clone(),
                };
            }
        }

        Ok(strategies)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
