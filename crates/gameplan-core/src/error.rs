use thiserror::Error;

/// Top-level error type for the gameplan workspace.
#[derive(Debug, Error)]
pub enum GameError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Solver error: {0}")]
    Solver(#[from] SolverError),
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid time_step: {0} (must be > 0)")]
    InvalidTimeStep(f64),

    #[error("horizon must be >= time_step: horizon={horizon}, time_step={time_step}")]
    HorizonShorterThanStep { horizon: f64, time_step: f64 },

    #[error("Invalid value for {field}: {message}")]
    InvalidValue {
        field: &'static str,
        message: &'static str,
    },
}

/// Numerical solver errors.
///
/// Copy + static contexts for cheap propagation in hot paths.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SolverError {
    #[error("Coupling matrix singular at step {step}: smallest QR pivot magnitude {min_pivot:e}")]
    SingularCoupling { step: usize, min_pivot: f64 },

    #[error("Rollout diverged: non-finite value at step {step}")]
    RolloutDiverged { step: usize },

    #[error("Planner budget exceeded: solve took {elapsed:.4}s, budget {budget:.4}s")]
    BudgetExceeded { elapsed: f64, budget: f64 },

    #[error("Shape mismatch in {context}: expected {expected}, got {got}")]
    ShapeMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_error_from_config_error() {
        let err = ConfigError::InvalidTimeStep(-0.1);
        let game_err: GameError = err.into();
        assert!(matches!(game_err, GameError::Config(_)));
        assert!(game_err.to_string().contains("-0.1"));
    }

    #[test]
    fn game_error_from_solver_error() {
        let err = SolverError::RolloutDiverged { step: 7 };
        let game_err: GameError = err.into();
        assert!(matches!(game_err, GameError::Solver(_)));
        assert!(game_err.to_string().contains('7'));
    }

    #[test]
    fn config_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let config_err: ConfigError = io_err.into();
        assert!(matches!(config_err, ConfigError::Io(_)));
    }

    #[test]
    fn solver_error_is_copy() {
        let err = SolverError::SingularCoupling {
            step: 3,
            min_pivot: 1e-12,
        };
        let err2 = err; // Copy
        assert_eq!(err, err2);
    }

    #[test]
    fn solver_error_display_messages() {
        assert_eq!(
            SolverError::RolloutDiverged { step: 12 }.to_string(),
            "Rollout diverged: non-finite value at step 12"
        );
        assert_eq!(
            SolverError::ShapeMismatch {
                context: "initial state",
                expected: 4,
                got: 3
            }
            .to_string(),
            "Shape mismatch in initial state: expected 4, got 3"
        );
        let msg = SolverError::BudgetExceeded {
            elapsed: 0.0123,
            budget: 0.001,
        }
        .to_string();
        assert!(msg.contains("0.0123"));
        assert!(msg.contains("0.0010"));
    }

    #[test]
    fn config_error_display_messages() {
        assert_eq!(
            ConfigError::InvalidTimeStep(0.0).to_string(),
            "Invalid time_step: 0 (must be > 0)"
        );
        assert_eq!(
            ConfigError::HorizonShorterThanStep {
                horizon: 0.05,
                time_step: 0.1
            }
            .to_string(),
            "horizon must be >= time_step: horizon=0.05, time_step=0.1"
        );
        assert_eq!(
            ConfigError::InvalidValue {
                field: "max_iterations",
                message: "must be > 0"
            }
            .to_string(),
            "Invalid value for max_iterations: must be > 0"
        );
    }
}
