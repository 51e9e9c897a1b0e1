//! Local approximations exchanged between the outer loop and the LQ solver.
//!
//! At each step the dynamics contribute a discrete-time linearization
//!
//! ```text
//! dx_{k+1} = A dx_k + sum_i B_i du_k^i
//! ```
//!
//! and each player's cost contributes a quadratic expansion with a state
//! block `(Q, l)` and a sparse per-player family of control blocks
//! `(R_ij, r_ij)`.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::types::PlayerIndex;

// ---------------------------------------------------------------------------
// LinearDynamicsApproximation
// ---------------------------------------------------------------------------

/// Discrete-time linearization of the joint dynamics at one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearDynamicsApproximation {
    /// State transition Jacobian, `n x n`.
    pub a: DMatrix<f64>,
    /// Per-player control Jacobians, `n x u_i`.
    pub bs: Vec<DMatrix<f64>>,
}

impl LinearDynamicsApproximation {
    /// Identity transition with zero control Jacobians, the natural seed for
    /// `A = I + A_c * dt`, `B_i = B_c_i * dt` discretizations.
    #[must_use]
    pub fn identity(x_dim: usize, u_dims: &[usize]) -> Self {
        Self {
            a: DMatrix::identity(x_dim, x_dim),
            bs: u_dims
                .iter()
                .map(|&u_dim| DMatrix::zeros(x_dim, u_dim))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// QuadraticCostApproximation
// ---------------------------------------------------------------------------

/// Quadratic block `(hess, grad)` of a cost with respect to one player's
/// control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCostBlock {
    /// `R_ij`, `u_j x u_j`.
    pub hess: DMatrix<f64>,
    /// `r_ij`, `u_j`.
    pub grad: DVector<f64>,
}

impl ControlCostBlock {
    /// A zero block for a `u_dim`-dimensional control.
    #[must_use]
    pub fn zeros(u_dim: usize) -> Self {
        Self {
            hess: DMatrix::zeros(u_dim, u_dim),
            grad: DVector::zeros(u_dim),
        }
    }
}

/// Quadratic expansion of one player's cost at one step.
///
/// The control map must contain at least the player's own entry; missing
/// cross entries are treated as zero by consumers. A `BTreeMap` keeps player
/// iteration order deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuadraticCostApproximation {
    /// State Hessian `Q`, symmetric but not necessarily positive definite.
    pub state_hess: DMatrix<f64>,
    /// State gradient `l`.
    pub state_grad: DVector<f64>,
    /// Control blocks keyed by player index.
    pub control: BTreeMap<PlayerIndex, ControlCostBlock>,
}

impl QuadraticCostApproximation {
    /// A zero expansion with an empty control map.
    #[must_use]
    pub fn zeros(x_dim: usize) -> Self {
        Self {
            state_hess: DMatrix::zeros(x_dim, x_dim),
            state_grad: DVector::zeros(x_dim),
            control: BTreeMap::new(),
        }
    }

    /// Control block for `player`, inserting a zero block of dimension
    /// `u_dim` if absent.
    pub fn control_block_mut(
        &mut self,
        player: PlayerIndex,
        u_dim: usize,
    ) -> &mut ControlCostBlock {
        self.control
            .entry(player)
            .or_insert_with(|| ControlCostBlock::zeros(u_dim))
    }
}

// ---------------------------------------------------------------------------
// ValueFunction
// ---------------------------------------------------------------------------

/// Quadratic value-to-go `0.5 dx' Z dx + zeta' dx` for one player at one
/// step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueFunction {
    /// `Z`, `n x n`.
    pub hess: DMatrix<f64>,
    /// `zeta`, `n`.
    pub grad: DVector<f64>,
}

impl ValueFunction {
    /// A zero value function.
    #[must_use]
    pub fn zeros(x_dim: usize) -> Self {
        Self {
            hess: DMatrix::zeros(x_dim, x_dim),
            grad: DVector::zeros(x_dim),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linearization_identity_shapes() {
        let lin = LinearDynamicsApproximation::identity(3, &[2, 1]);
        assert_eq!(lin.a, DMatrix::identity(3, 3));
        assert_eq!(lin.bs.len(), 2);
        assert_eq!(lin.bs[0].shape(), (3, 2));
        assert_eq!(lin.bs[1].shape(), (3, 1));
    }

    #[test]
    fn quadraticization_control_block_mut_inserts_zero() {
        let mut quad = QuadraticCostApproximation::zeros(2);
        assert!(quad.control.is_empty());
        let block = quad.control_block_mut(1, 3);
        assert_eq!(block.hess.shape(), (3, 3));
        assert_eq!(quad.control.len(), 1);
        // Second call returns the same entry.
        quad.control_block_mut(1, 3).hess[(0, 0)] = 5.0;
        assert!((quad.control[&1].hess[(0, 0)] - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn control_map_iterates_in_player_order() {
        let mut quad = QuadraticCostApproximation::zeros(1);
        quad.control_block_mut(2, 1);
        quad.control_block_mut(0, 1);
        quad.control_block_mut(1, 1);
        let keys: Vec<_> = quad.control.keys().copied().collect();
        assert_eq!(keys, vec![0, 1, 2]);
    }

    #[test]
    fn value_function_zeros() {
        let v = ValueFunction::zeros(4);
        assert_eq!(v.hess.shape(), (4, 4));
        assert_eq!(v.grad.len(), 4);
    }
}
