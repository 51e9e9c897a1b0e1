// gameplan-scenarios: Concrete dynamics and cost catalog for tests and
// demos.

pub mod costs;
pub mod oncoming;
pub mod point_mass;
pub mod unicycle;

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

pub mod prelude {
    pub use crate::{
        costs::{CompositeCost, CostTerm},
        oncoming::OncomingScenario,
        point_mass::TwoPlayerPointMass1D,
        unicycle::{UnicycleFleet, UNICYCLE_U_DIM, UNICYCLE_X_DIM},
    };
}
