//! Randomized spot check for local feedback Nash equilibria.
//!
//! A converged solution claims that no single player can improve their total
//! cost by deviating unilaterally while the others keep playing their
//! feedback strategies. This module probes that claim with seeded random
//! control perturbations; it can refute the claim but never prove it.

use nalgebra::DVector;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use gameplan_core::error::SolverError;
use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::strategy::Strategy;
use gameplan_core::traits::{Dynamics, PlayerCost};
use gameplan_core::types::PlayerIndex;

use crate::rollout::{rollout, total_player_costs};

/// Check the Nash property by random unilateral perturbation.
///
/// For each player, repeatedly injects a uniform perturbation of magnitude at
/// most `max_perturbation` into that player's control at one random step,
/// rolls the closed loop out from `x0`, and compares the player's total cost
/// against the unperturbed baseline. Returns `false` if any perturbation
/// undercuts the baseline by more than `tolerance`.
///
/// Perturbed rollouts that diverge are skipped; an infinite cost cannot
/// witness an improvement.
#[allow(clippy::too_many_arguments)]
#[must_use]
pub fn random_check_local_nash<D: Dynamics + ?Sized>(
    dynamics: &D,
    costs: &[Box<dyn PlayerCost>],
    operating_point: &OperatingPoint,
    strategies: &[Strategy],
    x0: &DVector<f64>,
    max_perturbation: f64,
    perturbations_per_player: usize,
    tolerance: f64,
    seed: u64,
) -> bool {
    let dt = dynamics.time_step();
    let num_time_steps = operating_point.len();

    let Ok(baseline) = rollout(dynamics, operating_point, strategies, x0, 1.0) else {
        return false;
    };
    let baseline_costs = total_player_costs(costs, &baseline, dt);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    for player in 0..dynamics.num_players() {
        let u_dim = dynamics.u_dim(player);
        for _ in 0..perturbations_per_player {
            let step = rng.gen_range(0..num_time_steps);
            let du = DVector::from_fn(u_dim, |_, _| {
                rng.gen_range(-max_perturbation..max_perturbation)
            });

            let Ok(perturbed) = perturbed_rollout(
                dynamics,
                operating_point,
                strategies,
                x0,
                player,
                step,
                &du,
            ) else {
                continue;
            };
            let perturbed_cost = total_player_costs(costs, &perturbed, dt)[player];

            if perturbed_cost < baseline_costs[player] - tolerance {
                debug!(
                    player,
                    step,
                    baseline = baseline_costs[player],
                    perturbed = perturbed_cost,
                    "unilateral deviation improved a player's cost"
                );
                return false;
            }
        }
    }
    true
}

/// Closed-loop rollout with one player's control offset by `du` at one step;
/// every other control still follows its feedback law.
fn perturbed_rollout<D: Dynamics + ?Sized>(
    dynamics: &D,
    operating_point: &OperatingPoint,
    strategies: &[Strategy],
    x0: &DVector<f64>,
    player: PlayerIndex,
    step: usize,
    du: &DVector<f64>,
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
        if x.iter().any(|v| !v.is_finite()) {
            return Err(SolverError::RolloutDiverged { step: k });
        }
        next.xs[k] = x;

        for (i, strategy) in strategies.iter().enumerate() {
            let mut u = strategy.control(
                k,
                &next.xs[k],
                &operating_point.xs[k],
                &operating_point.us[k][i],
                1.0,
            );
            if i == player && k == step {
                u += du;
            }
            if u.iter().any(|v| !v.is_finite()) {
                return Err(SolverError::RolloutDiverged { step: k });
            }
            next.us[k][i] = u;
        }

        let t = operating_point.time_of(k, dt);
        x = dynamics.integrate_step(t, dt, &next.xs[k], &next.us[k]);
    }

    Ok(next)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
