//! Two cars passing each other in opposite directions on adjacent lanes.
//!
//! Each car tracks a nominal speed and its own lane center while a shared
//! proximity term keeps the encounter apart. The active cost set is speed,
//! lane keeping, control effort, and proximity.

use nalgebra::DVector;

use gameplan_core::traits::PlayerCost;

use crate::costs::{CompositeCost, CostTerm};
use crate::unicycle::{UnicycleFleet, UNICYCLE_U_DIM};

/// Geometry and weights of the oncoming encounter.
#[derive(Debug, Clone)]
pub struct OncomingScenario {
    /// Lateral offset between the two lane centers (m).
    pub lane_offset: f64,
    /// Initial longitudinal gap between the cars (m).
    pub initial_gap: f64,
    /// Nominal speed both cars try to hold (m/s).
    pub nominal_speed: f64,
    /// Proximity hinge threshold (m).
    pub proximity_threshold: f64,
    /// Proximity weight.
    pub proximity_weight: f64,
}

impl Default for OncomingScenario {
    fn default() -> Self {
        Self {
            lane_offset: 1.5,
            initial_gap: 15.0,
            nominal_speed: 1.5,
            proximity_threshold: 2.0,
            proximity_weight: 20.0,
        }
    }
}

impl OncomingScenario {
    /// The joint dynamics: two unicycles.
    #[must_use]
    pub fn dynamics(&self, time_step: f64) -> UnicycleFleet {
        UnicycleFleet::new(2, time_step)
    }

    /// Initial joint state: car 0 at the origin heading east, car 1 ahead on
    /// the neighboring lane heading west.
    #[must_use]
    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_vec(vec![
            0.0,
            0.0,
            0.0,
            self.nominal_speed,
            self.initial_gap,
            self.lane_offset,
            std::f64::consts::PI,
            self.nominal_speed,
        ])
    }

    /// Per-player composite costs.
    #[must_use]
    pub fn costs(&self) -> Vec<Box<dyn PlayerCost>> {
        let proximity = CostTerm::Proximity {
            first: (0, 1),
            second: (4, 5),
            threshold: self.proximity_threshold,
            weight: self.proximity_weight,
        };

        let car0 = CompositeCost::new(
            0,
            UNICYCLE_U_DIM,
            vec![
                CostTerm::StateDeviation {
                    dimension: 3,
                    nominal: self.nominal_speed,
                    weight: 1.0,
                },
                CostTerm::StateDeviation {
                    dimension: 1,
                    nominal: 0.0,
                    weight: 0.5,
                },
                CostTerm::ControlEffort {
                    player: 0,
                    weight: 1.0,
                },
                proximity.clone(),
            ],
        );
        let car1 = CompositeCost::new(
            1,
            UNICYCLE_U_DIM,
            vec![
                CostTerm::StateDeviation {
                    dimension: 7,
                    nominal: self.nominal_speed,
                    weight: 1.0,
                },
                CostTerm::StateDeviation {
                    dimension: 5,
                    nominal: self.lane_offset,
                    weight: 0.5,
                },
                CostTerm::ControlEffort {
                    player: 1,
                    weight: 1.0,
                },
                proximity,
            ],
        );
        vec![Box::new(car0), Box::new(car1)]
    }

    /// Planar distance between the cars in a joint state.
    #[must_use]
    pub fn inter_car_distance(x: &DVector<f64>) -> f64 {
        (x[0] - x[4]).hypot(x[1] - x[5])
    }
}
