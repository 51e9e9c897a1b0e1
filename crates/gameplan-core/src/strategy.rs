use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Strategy
// ---------------------------------------------------------------------------

/// Time-indexed affine state-error-feedback law for one player.
///
/// At step `k` the control is
///
/// ```text
/// u_k = u_ref_k - P_k (x_k - x_ref_k) - alpha_k
/// ```
///
/// where `(x_ref, u_ref)` is the operating point around which the game was
/// linearized. All `P_k` are `u_dim x x_dim`, all `alpha_k` are `u_dim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Feedback gains, one per step.
    pub ps: Vec<DMatrix<f64>>,
    /// Feedforward offsets, one per step.
    pub alphas: Vec<DVector<f64>>,
}

impl Strategy {
    /// A zero strategy (no feedback, no feedforward) of the given shape.
    #[must_use]
    pub fn zeros(num_time_steps: usize, x_dim: usize, u_dim: usize) -> Self {
        Self {
            ps: vec![DMatrix::zeros(u_dim, x_dim); num_time_steps],
            alphas: vec![DVector::zeros(u_dim); num_time_steps],
        }
    }

    /// Number of time steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ps.len()
    }

    /// True if the strategy has no steps.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ps.is_empty()
    }

    /// Control dimension of this strategy.
    #[must_use]
    pub fn u_dim(&self) -> usize {
        self.ps.first().map_or(0, |p| p.nrows())
    }

    /// State dimension this strategy feeds back on.
    #[must_use]
    pub fn x_dim(&self) -> usize {
        self.ps.first().map_or(0, |p| p.ncols())
    }

    /// Apply the feedback law at step `k` with a scaled feedforward term:
    /// `u = u_ref - P_k (x - x_ref) - feedforward_scale * alpha_k`.
    #[must_use]
    pub fn control(
        &self,
        k: usize,
        x: &DVector<f64>,
        x_ref: &DVector<f64>,
        u_ref: &DVector<f64>,
        feedforward_scale: f64,
    ) -> DVector<f64> {
        u_ref - &self.ps[k] * (x - x_ref) - feedforward_scale * &self.alphas[k]
    }

    /// Scale every feedforward term in place.
    pub fn scale_alphas(&mut self, scale: f64) {
        for alpha in &mut self.alphas {
            *alpha *= scale;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn zeros_shape() {
        let s = Strategy::zeros(10, 4, 2);
        assert_eq!(s.len(), 10);
        assert!(!s.is_empty());
        assert_eq!(s.x_dim(), 4);
        assert_eq!(s.u_dim(), 2);
    }

    #[test]
    fn control_at_reference_is_reference() {
        let s = Strategy::zeros(3, 2, 1);
        let x = DVector::from_vec(vec![1.0, -2.0]);
        let u_ref = DVector::from_vec(vec![0.5]);
        let u = s.control(0, &x, &x, &u_ref, 1.0);
        assert_relative_eq!(u[0], 0.5, epsilon = 1e-15);
    }

    #[test]
    fn control_applies_feedback_and_feedforward() {
        let mut s = Strategy::zeros(1, 2, 1);
        s.ps[0] = DMatrix::from_row_slice(1, 2, &[1.0, 2.0]);
        s.alphas[0] = DVector::from_vec(vec![0.25]);

        let x = DVector::from_vec(vec![1.0, 1.0]);
        let x_ref = DVector::from_vec(vec![0.0, 0.0]);
        let u_ref = DVector::from_vec(vec![0.0]);

        // u = 0 - [1 2][1 1]' - 0.5 * 0.25 = -3 - 0.125
        let u = s.control(0, &x, &x_ref, &u_ref, 0.5);
        assert_relative_eq!(u[0], -3.125, epsilon = 1e-15);
    }

    #[test]
    fn zero_feedforward_scale_drops_alpha() {
        let mut s = Strategy::zeros(1, 2, 1);
        s.alphas[0] = DVector::from_vec(vec![123.0]);
        let x = DVector::zeros(2);
        let u_ref = DVector::zeros(1);
        let u = s.control(0, &x, &x, &u_ref, 0.0);
        assert_relative_eq!(u[0], 0.0, epsilon = 1e-15);
    }

    #[test]
    fn scale_alphas_in_place() {
        let mut s = Strategy::zeros(2, 2, 1);
        s.alphas[0] = DVector::from_vec(vec![2.0]);
        s.alphas[1] = DVector::from_vec(vec![-4.0]);
        s.scale_alphas(0.5);
        assert_relative_eq!(s.alphas[0][0], 1.0, epsilon = 1e-15);
        assert_relative_eq!(s.alphas[1][0], -2.0, epsilon = 1e-15);
    }
}
