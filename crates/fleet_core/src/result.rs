use serde::{Deserialize, Serialize};

use crate::fleet::FleetState;
use crate::plan::Plan;

pub use crate::fleet::INFEASIBLE_COST;

/// Outcome of one run, emitted once at termination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Routes actually driven, in commit order.
    pub plan: Plan,
    /// Total travel cost, or [`INFEASIBLE_COST`] if some request was never served.
    pub cost: f64,
    pub instance: String,
}

impl SimulationResult {
    pub fn from_fleet(fleet: &FleetState, instance: impl Into<String>) -> Self {
        Self {
            plan: fleet.finalize_plan(),
            cost: fleet.final_cost(),
            instance: instance.into(),
        }
    }

    pub fn is_feasible(&self) -> bool {
        self.cost >= 0.0
    }
}
