//! Composable running-cost terms and the per-player composite they form.
//!
//! Cost kinds are a closed enum so the quadraticization loop dispatches
//! without virtual calls; a [`CompositeCost`] sums any number of terms and
//! implements the [`PlayerCost`] capability.

use nalgebra::DVector;

use gameplan_core::approximation::QuadraticCostApproximation;
use gameplan_core::traits::PlayerCost;
use gameplan_core::types::PlayerIndex;

// ---------------------------------------------------------------------------
// CostTerm
// ---------------------------------------------------------------------------

/// One additive term of a player's running cost.
#[derive(Debug, Clone)]
pub enum CostTerm {
    /// `w/2 (x[dim] - nominal)^2`; use on a velocity dimension for a
    /// nominal-speed cost or on a position dimension for lane keeping.
    StateDeviation {
        dimension: usize,
        nominal: f64,
        weight: f64,
    },

    /// `w/2 ||u_j||^2` on player `j`'s control vector; `j` is usually the
    /// owning player, but cross terms charge another player's effort to this
    /// cost.
    ControlEffort { player: PlayerIndex, weight: f64 },

    /// Hinge penalty `w/2 (threshold - d)^2` when the planar distance `d`
    /// between two position pairs drops below `threshold`; zero outside.
    Proximity {
        /// Indices `(px, py)` of the first position.
        first: (usize, usize),
        /// Indices `(px, py)` of the second position.
        second: (usize, usize),
        threshold: f64,
        weight: f64,
    },
}

impl CostTerm {
    fn evaluate(&self, x: &DVector<f64>, us: &[DVector<f64>]) -> f64 {
        match *self {
            Self::StateDeviation {
                dimension,
                nominal,
                weight,
            } => {
                let err = x[dimension] - nominal;
                0.5 * weight * err * err
            }
            Self::ControlEffort {
                player: target,
                weight,
            } => 0.5 * weight * us[target].norm_squared(),
            Self::Proximity {
                first,
                second,
                threshold,
                weight,
            } => {
                let dx = x[first.0] - x[second.0];
                let dy = x[first.1] - x[second.1];
                let dist = dx.hypot(dy);
                if dist >= threshold {
                    0.0
                } else {
                    let gap = threshold - dist;
                    0.5 * weight * gap * gap
                }
            }
        }
    }

    fn quadraticize_into(
        &self,
        x: &DVector<f64>,
        us: &[DVector<f64>],
        quad: &mut QuadraticCostApproximation,
    ) {
        match *self {
            Self::StateDeviation {
                dimension,
                nominal,
                weight,
            } => {
                quad.state_hess[(dimension, dimension)] += weight;
                quad.state_grad[dimension] += weight * (x[dimension] - nominal);
            }
            Self::ControlEffort {
                player: target,
                weight,
            } => {
                let u = &us[target];
                let block = quad.control_block_mut(target, u.len());
                for d in 0..u.len() {
                    block.hess[(d, d)] += weight;
                    block.grad[d] += weight * u[d];
                }
            }
            Self::Proximity {
                first,
                second,
                threshold,
                weight,
            } => {
                let dx = x[first.0] - x[second.0];
                let dy = x[first.1] - x[second.1];
                let dist = dx.hypot(dy);
                if dist >= threshold || dist < 1e-9 {
                    // Outside the hinge, or too close to the singular origin
                    // for a meaningful expansion.
                    return;
                }
                let gap = threshold - dist;

                // Unit vector e from second toward first; distance gradient
                // is [e; -e] over (first, second).
                let ex = dx / dist;
                let ey = dy / dist;
                let dims = [first.0, first.1, second.0, second.1];
                let grad_d = [ex, ey, -ex, -ey];

                for (a, &dim_a) in dims.iter().enumerate() {
                    quad.state_grad[dim_a] += -weight * gap * grad_d[a];
                }

                // Hessian of d: block structure [M -M; -M M] with
                // M = (I - e e^T) / d.
                let m = [
                    [(1.0 - ex * ex) / dist, -ex * ey / dist],
                    [-ex * ey / dist, (1.0 - ey * ey) / dist],
                ];
                for a in 0..4 {
                    for b in 0..4 {
                        let sign = if (a < 2) == (b < 2) { 1.0 } else { -1.0 };
                        let hess_d = sign * m[a % 2][b % 2];
                        let value = weight * grad_d[a] * grad_d[b] - weight * gap * hess_d;
                        quad.state_hess[(dims[a], dims[b])] += value;
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// CompositeCost
// ---------------------------------------------------------------------------

/// Sum of cost terms owned by one player.
pub struct CompositeCost {
    player: PlayerIndex,
    u_dim: usize,
    terms: Vec<CostTerm>,
}

impl CompositeCost {
    /// A cost for `player` with control dimension `u_dim` and the given
    /// terms.
    #[must_use]
    pub fn new(player: PlayerIndex, u_dim: usize, terms: Vec<CostTerm>) -> Self {
        Self {
            player,
            u_dim,
            terms,
        }
    }
}

impl PlayerCost for CompositeCost {
    fn player(&self) -> PlayerIndex {
        self.player
    }

    fn evaluate(&self, _t: f64, x: &DVector<f64>, us: &[DVector<f64>]) -> f64 {
        self.terms
            .iter()
            .map(|term| term.evaluate(x, us))
            .sum()
    }

    fn quadraticize(
        &self,
        _t: f64,
        x: &DVector<f64>,
        us: &[DVector<f64>],
    ) -> QuadraticCostApproximation {
        let mut quad = QuadraticCostApproximation::zeros(x.len());
        // The own control block is mandatory even when no term touches it.
        quad.control_block_mut(self.player, self.u_dim);
        for term in &self.terms {
            term.quadraticize_into(x, us, &mut quad);
        }
        quad
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
