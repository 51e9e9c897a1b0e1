use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// Serde default functions
// ---------------------------------------------------------------------------

const fn default_time_step() -> f64 {
    0.1
}
const fn default_horizon() -> f64 {
    10.0
}
const fn default_max_iterations() -> usize {
    100
}
const fn default_convergence_tolerance() -> f64 {
    1e-2
}
const fn default_cost_tolerance() -> f64 {
    1e-3
}
const fn default_min_step_size() -> f64 {
    1e-4
}
const fn default_trust_region_radius() -> f64 {
    1.0
}
const fn default_max_no_progress_iterations() -> usize {
    5
}
const fn default_singularity_tolerance() -> f64 {
    1e-9
}
const fn default_replanning_slack() -> f64 {
    0.1
}

// ---------------------------------------------------------------------------
// SolverParams
// ---------------------------------------------------------------------------

/// All numerical knobs for a solve, threaded into every call.
///
/// There is deliberately no process-wide state: two problems with different
/// parameter sets can run side by side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverParams {
    /// Discretization step in seconds (default: 0.1).
    #[serde(default = "default_time_step")]
    pub time_step: f64,

    /// Planning horizon in seconds (default: 10.0). Must be >= `time_step`.
    #[serde(default = "default_horizon")]
    pub horizon: f64,

    /// Maximum outer-loop iterations per solve (default: 100).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Convergence threshold on the max per-step change in nominal controls
    /// (default: 1e-2).
    #[serde(default = "default_convergence_tolerance")]
    pub convergence_tolerance: f64,

    /// Convergence threshold on the improvement of the max per-player total
    /// cost, applied over two consecutive iterations (default: 1e-3).
    #[serde(default = "default_cost_tolerance")]
    pub cost_tolerance: f64,

    /// Smallest admissible line-search step size before an iteration is
    /// declared unproductive (default: 1e-4).
    #[serde(default = "default_min_step_size")]
    pub min_step_size: f64,

    /// State dimensions constrained by the trust region. Empty disables the
    /// trust region and acceptance falls back to cost decrease.
    #[serde(default)]
    pub trust_region_dimensions: Vec<usize>,

    /// Trust-region radius on the selected state dimensions (default: 1.0).
    #[serde(default = "default_trust_region_radius")]
    pub trust_region_radius: f64,

    /// Consecutive unproductive iterations tolerated before returning the
    /// best iterate so far (default: 5).
    #[serde(default = "default_max_no_progress_iterations")]
    pub max_no_progress_iterations: usize,

    /// Smallest acceptable QR pivot magnitude when inverting the control
    /// coupling matrix (default: 1e-9).
    #[serde(default = "default_singularity_tolerance")]
    pub singularity_tolerance: f64,

    /// Extra plant-integration time appended after each receding-horizon
    /// splice, in seconds (default: 0.1).
    #[serde(default = "default_replanning_slack")]
    pub replanning_slack: f64,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            time_step: default_time_step(),
            horizon: default_horizon(),
            max_iterations: default_max_iterations(),
            convergence_tolerance: default_convergence_tolerance(),
            cost_tolerance: default_cost_tolerance(),
            min_step_size: default_min_step_size(),
            trust_region_dimensions: Vec::new(),
            trust_region_radius: default_trust_region_radius(),
            max_no_progress_iterations: default_max_no_progress_iterations(),
            singularity_tolerance: default_singularity_tolerance(),
            replanning_slack: default_replanning_slack(),
        }
    }
}

impl SolverParams {
    /// Validate parameter values. Returns Err on invalid combinations.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.time_step <= 0.0 {
            return Err(ConfigError::InvalidTimeStep(self.time_step));
        }
        if self.horizon < self.time_step {
            return Err(ConfigError::HorizonShorterThanStep {
                horizon: self.horizon,
                time_step: self.time_step,
            });
        }
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_iterations",
                message: "must be > 0",
            });
        }
        if self.convergence_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "convergence_tolerance",
                message: "must be > 0",
            });
        }
        if self.cost_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "cost_tolerance",
                message: "must be > 0",
            });
        }
        if self.min_step_size <= 0.0 || self.min_step_size > 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "min_step_size",
                message: "must be in (0, 1]",
            });
        }
        if self.trust_region_radius <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "trust_region_radius",
                message: "must be > 0",
            });
        }
        if self.max_no_progress_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_no_progress_iterations",
                message: "must be > 0",
            });
        }
        if self.singularity_tolerance <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "singularity_tolerance",
                message: "must be > 0",
            });
        }
        if self.replanning_slack < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "replanning_slack",
                message: "must be >= 0",
            });
        }
        Ok(())
    }

    /// Number of discrete steps in the horizon: `floor(horizon / time_step)`.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn num_time_steps(&self) -> usize {
        (self.horizon / self.time_step).floor() as usize
    }

    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let params: Self = toml::from_str(&content)?;
        params.validate()?;
        Ok(params)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
