//! Scenario setup: turn a problem instance into a ready-to-run world.
//!
//! The world holds the fleet state, the arrival schedule, the dispatcher
//! channel and one vehicle entity per fleet vehicle. Nothing is scheduled yet;
//! [`crate::runner::initialize_simulation`] does that.

mod build;
mod params;

pub use build::{build_world, InstanceName, VehicleTiming};
pub use params::SimulationParams;
