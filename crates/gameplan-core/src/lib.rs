// gameplan-core: Types, capability traits, parameters, and errors for the
// gameplan dynamic-game solver.

pub mod approximation;
pub mod error;
pub mod operating_point;
pub mod params;
pub mod strategy;
pub mod traits;
pub mod types;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        // Approximations
        approximation::{
            ControlCostBlock, LinearDynamicsApproximation, QuadraticCostApproximation,
            ValueFunction,
        },
        // Errors
        error::{ConfigError, GameError, SolverError},
        // Trajectories
        operating_point::OperatingPoint,
        // Config
        params::SolverParams,
        strategy::Strategy,
        // Capabilities
        traits::{Dynamics, PlayerCost},
        // Dimensions
        types::{GameDims, PlayerIndex},
    };
}
