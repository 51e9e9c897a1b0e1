use nalgebra::DVector;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// OperatingPoint
// ---------------------------------------------------------------------------

/// Nominal state/control trajectory around which dynamics are linearized and
/// costs are quadraticized.
///
/// Stores `K` states and `K` per-player control tuples on a uniform grid
/// starting at `t0`. A dynamically consistent operating point satisfies
/// `xs[k + 1] = integrate(t_k, t_k + dt, xs[k], us[k])`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// Nominal states, `xs[k]`.
    pub xs: Vec<DVector<f64>>,
    /// Nominal controls, `us[k][player]`.
    pub us: Vec<Vec<DVector<f64>>>,
    /// Time of the first step.
    pub t0: f64,
}

impl OperatingPoint {
    /// A zero operating point of the given shape.
    #[must_use]
    pub fn zeros(num_time_steps: usize, x_dim: usize, u_dims: &[usize], t0: f64) -> Self {
        let controls: Vec<DVector<f64>> =
            u_dims.iter().map(|&u_dim| DVector::zeros(u_dim)).collect();
        Self {
            xs: vec![DVector::zeros(x_dim); num_time_steps],
            us: vec![controls; num_time_steps],
            t0,
        }
    }

    /// Number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.xs.len()
    }

    /// True if the trajectory has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.xs.is_empty()
    }

    /// Number of players.
    #[must_use]
    pub fn num_players(&self) -> usize {
        self.us.first().map_or(0, Vec::len)
    }

    /// Time of step `k` on a grid with step `time_step`.
    #[must_use]
    pub fn time_of(&self, k: usize, time_step: f64) -> f64 {
        #[allow(clippy::cast_precision_loss)]
        {
            self.t0 + k as f64 * time_step
        }
    }

    /// Largest index `k` with `time_of(k) <= t`, clamped to the grid.
    ///
    /// Times within 1e-9 steps of a grid point count as on it, so querying
    /// `t0 + k * dt` lands on `k` despite rounding in the division.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn index_at_or_before(&self, t: f64, time_step: f64) -> usize {
        if self.is_empty() || t <= self.t0 {
            return 0;
        }
        let s = (t - self.t0) / time_step;
        let rounded = s.round();
        let k = if (s - rounded).abs() < 1e-9 {
            rounded as usize
        } else {
            s.floor() as usize
        };
        k.min(self.len() - 1)
    }
}
