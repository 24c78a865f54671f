use bevy_ecs::prelude::{Resource, World};

use crate::clock::{SimulationClock, ONE_SEC_MS};
use crate::dispatch::{DispatchQueue, ProblemOutbox};
use crate::ecs::{Assignments, Vehicle, VehicleRoster};
use crate::fleet::FleetState;
use crate::instance::{InstanceResult, ProblemInstance};
use crate::pacing::TimeCoordinator;
use crate::scenario::params::SimulationParams;
use crate::telemetry::SimTelemetry;

/// Travel and service durations of every vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Resource)]
pub struct VehicleTiming {
    pub service_time_ms: u64,
    /// Seconds per distance unit.
    pub speed: f64,
}

impl VehicleTiming {
    pub fn new(service_time_secs: f64, speed: f64) -> Self {
        Self {
            service_time_ms: secs_to_ms(service_time_secs),
            speed: speed.max(0.0),
        }
    }

    /// Simulated ms needed to cover `cost` distance units.
    pub fn travel_time_ms(&self, cost: f64) -> u64 {
        secs_to_ms(cost * self.speed)
    }
}

fn secs_to_ms(secs: f64) -> u64 {
    if secs.is_finite() && secs > 0.0 {
        (secs * ONE_SEC_MS as f64).round() as u64
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Resource)]
pub struct InstanceName(pub String);

/// Populate `world` for one run of `instance`.
pub fn build_world(
    world: &mut World,
    instance: &ProblemInstance,
    params: &SimulationParams,
) -> InstanceResult<()> {
    instance.validate()?;
    let (initial, schedule) = instance.split_requests();
    let fleet = FleetState::new(instance.depot(), initial, instance.capacities())?;

    let roster: Vec<_> = (0..fleet.vehicle_count())
        .map(|index| {
            world
                .spawn((Vehicle::at_depot(index), Assignments::default()))
                .id()
        })
        .collect();

    world.insert_resource(SimulationClock::default());
    world.insert_resource(fleet);
    world.insert_resource(schedule);
    world.insert_resource(VehicleRoster(roster));
    world.insert_resource(DispatchQueue::default());
    world.insert_resource(ProblemOutbox::default());
    world.insert_resource(TimeCoordinator::new(params.allow_fast_simulation));
    world.insert_resource(SimTelemetry::default());
    world.insert_resource(VehicleTiming::new(
        params.service_time_secs.unwrap_or(instance.service_time),
        params.speed.unwrap_or(instance.speed),
    ));
    world.insert_resource(InstanceName(instance.name.clone()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::scenario_instance;

    #[test]
    fn travel_time_scales_with_speed() {
        let timing = VehicleTiming::new(10.0, 0.5);
        assert_eq!(timing.service_time_ms, 10_000);
        assert_eq!(timing.travel_time_ms(5.0), 2_500);
        assert_eq!(VehicleTiming::new(-1.0, 1.0).service_time_ms, 0);
    }

    #[test]
    fn build_world_spawns_one_vehicle_per_capacity() {
        let mut world = World::new();
        let params = SimulationParams::default().with_service_time_secs(2.0);
        build_world(&mut world, &scenario_instance(), &params).expect("build");

        assert_eq!(world.resource::<VehicleRoster>().len(), 2);
        assert_eq!(world.resource::<FleetState>().pending_count(), 3);
        assert_eq!(world.resource::<VehicleTiming>().service_time_ms, 2_000);
        assert!(world.resource::<SimulationClock>().is_empty());
        assert_eq!(world.resource::<InstanceName>().0, "scenario");
    }
}
