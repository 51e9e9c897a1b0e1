//! Record of every accepted iterate of a solve.
//!
//! Each iterate stores the operating point, the strategies that produced it,
//! per-player totals, the accepted line-search step, and a cumulative
//! wall-clock stamp. The log is serializable; numerical fields round-trip
//! exactly through JSON.

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use gameplan_core::operating_point::OperatingPoint;
use gameplan_core::strategy::Strategy;
use gameplan_core::types::PlayerIndex;

// ---------------------------------------------------------------------------
// TerminationReason
// ---------------------------------------------------------------------------

/// Why a solve stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Convergence criteria were met.
    Converged,
    /// Line search was exhausted without improvement for too many
    /// consecutive iterations; the log holds the best iterate found.
    NoProgress,
    /// The runtime budget would have been overrun by another iteration.
    BudgetElapsed,
    /// The iteration cap was reached.
    MaxIterations,
}

// ---------------------------------------------------------------------------
// SolverIterate
// ---------------------------------------------------------------------------

/// One accepted iterate of the outer loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverIterate {
    /// Operating point after this iterate's accepted rollout.
    pub operating_point: OperatingPoint,
    /// Strategies that produced the operating point (feedforward already
    /// scaled by the accepted step size).
    pub strategies: Vec<Strategy>,
    /// Per-player total costs along the operating point.
    pub player_costs: Vec<f64>,
    /// Accepted line-search step size (1.0 for the initial iterate).
    pub step_size: f64,
    /// Seconds since the start of the solve.
    pub cumulative_runtime: f64,
}

// ---------------------------------------------------------------------------
// SolverLog
// ---------------------------------------------------------------------------

/// Ordered record of iterates for one solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverLog {
    time_step: f64,
    iterates: Vec<SolverIterate>,
    termination: Option<TerminationReason>,
}

impl SolverLog {
    /// An empty log on the given time grid.
    #[must_use]
    pub fn new(time_step: f64) -> Self {
        Self {
            time_step,
            iterates: Vec::new(),
            termination: None,
        }
    }

    /// Discretization step of the logged trajectories.
    #[must_use]
    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Append an accepted iterate.
    pub fn push(&mut self, iterate: SolverIterate) {
        self.iterates.push(iterate);
    }

    /// Number of recorded iterates.
    #[must_use]
    pub fn num_iterates(&self) -> usize {
        self.iterates.len()
    }

    /// True if nothing has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.iterates.is_empty()
    }

    /// All recorded iterates in acceptance order.
    #[must_use]
    pub fn iterates(&self) -> &[SolverIterate] {
        &self.iterates
    }

    /// Why the solve stopped, once recorded.
    #[must_use]
    pub fn termination(&self) -> Option<TerminationReason> {
        self.termination
    }

    /// Record the termination reason.
    pub fn set_termination(&mut self, reason: TerminationReason) {
        self.termination = Some(reason);
    }

    /// Start time of the logged horizon.
    ///
    /// # Panics
    /// Panics on an empty log; a successful solve records at least one
    /// iterate.
    #[must_use]
    pub fn initial_time(&self) -> f64 {
        self.first_iterate().operating_point.t0
    }

    /// Time of the last step of the logged horizon.
    #[must_use]
    pub fn final_time(&self) -> f64 {
        let op = &self.final_iterate().operating_point;
        op.time_of(op.len().saturating_sub(1), self.time_step)
    }

    /// First recorded iterate.
    #[must_use]
    pub fn first_iterate(&self) -> &SolverIterate {
        self.iterates.first().expect("log has at least one iterate")
    }

    /// Last (best) recorded iterate.
    #[must_use]
    pub fn final_iterate(&self) -> &SolverIterate {
        self.iterates.last().expect("log has at least one iterate")
    }

    /// Operating point of the final iterate.
    #[must_use]
    pub fn final_operating_point(&self) -> &OperatingPoint {
        &self.final_iterate().operating_point
    }

    /// Strategies of the final iterate.
    #[must_use]
    pub fn final_strategies(&self) -> &[Strategy] {
        &self.final_iterate().strategies
    }

    /// State of the final iterate at time `t`: exact on grid points, linear
    /// interpolation between them, clamped beyond the horizon.
    #[must_use]
    pub fn interpolate_state(&self, t: f64) -> DVector<f64> {
        let op = self.final_operating_point();
        interpolate(&op.xs, op.t0, self.time_step, t)
    }

    /// Player `i`'s control of the final iterate at time `t`, with the same
    /// grid semantics as [`interpolate_state`](Self::interpolate_state).
    #[must_use]
    pub fn interpolate_controls(&self, t: f64, player: PlayerIndex) -> DVector<f64> {
        let op = self.final_operating_point();
        let series: Vec<DVector<f64>> = op.us.iter().map(|us| us[player].clone()).collect();
        interpolate(&series, op.t0, self.time_step, t)
    }
}

/// Interpolate a uniformly sampled series at time `t`.
///
/// Values on grid points are returned exactly (no arithmetic applied).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn interpolate(series: &[DVector<f64>], t0: f64, time_step: f64, t: f64) -> DVector<f64> {
    assert!(!series.is_empty(), "cannot interpolate an empty series");
    let s = (t - t0) / time_step;

    let rounded = s.round();
    if (s - rounded).abs() < 1e-9 {
        let k = (rounded.max(0.0) as usize).min(series.len() - 1);
        return series[k].clone();
    }

    if s <= 0.0 {
        return series[0].clone();
    }
    let k = (s.floor() as usize).min(series.len() - 1);
    if k + 1 >= series.len() {
        return series[series.len() - 1].clone();
    }
    let frac = s - k as f64;
    (1.0 - frac) * &series[k] + frac * &series[k + 1]
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
