//! Test helpers for common test setup and utilities.
//!
//! This module provides shared fixtures so unit tests, integration tests and
//! benches build worlds the same way.

use bevy_ecs::prelude::World;

use crate::fleet::FleetState;
use crate::instance::ProblemInstance;
use crate::request::Request;
use crate::runner::initialize_simulation;
use crate::scenario::{build_world, SimulationParams};

/// Two vehicles of capacity 10, depot at the origin and three requests known
/// at start: 1 at (3, 4) demand 6, 2 at (-6, 8) demand 6, 3 at (3, 0) demand 3.
///
/// The plan `[[1, 3], [2]]` is the cheapest feasible plan and costs exactly 32.
pub fn scenario_instance() -> ProblemInstance {
    ProblemInstance {
        vehicle_type_capacity: vec![10],
        vehicle_type_count: vec![2],
        x_locations: vec![0, 3, -6, 3],
        y_locations: vec![0, 4, 8, 0],
        demands: vec![6, 6, 3],
        available: vec![0, 0, 0],
        service_time: 10.0,
        speed: 1.0,
        name: "scenario".into(),
    }
}

/// [`scenario_instance`] with request 3 arriving after `arrival_secs` instead of at start.
pub fn dynamic_scenario_instance(arrival_secs: i64) -> ProblemInstance {
    let mut instance = scenario_instance();
    instance.available[2] = arrival_secs;
    instance.name = "scenario-dynamic".into();
    instance
}

/// A grid instance with `requests` unit-demand requests known at start.
pub fn grid_instance(requests: usize, vehicles: usize, capacity: u32) -> ProblemInstance {
    let side = (requests as f64).sqrt().ceil().max(1.0) as i32;
    let mut x_locations = vec![0];
    let mut y_locations = vec![0];
    for i in 0..requests as i32 {
        x_locations.push(i % side + 1);
        y_locations.push(i / side + 1);
    }
    ProblemInstance {
        vehicle_type_capacity: vec![capacity],
        vehicle_type_count: vec![vehicles],
        x_locations,
        y_locations,
        demands: vec![1; requests],
        available: vec![0; requests],
        service_time: 1.0,
        speed: 0.1,
        name: format!("grid-{requests}"),
    }
}

/// Fleet state of [`scenario_instance`].
///
/// # Panics
///
/// Panics if the fixture is invalid (should never happen).
pub fn scenario_fleet() -> FleetState {
    FleetState::new(
        Request::depot(0, 0),
        vec![
            Request::new(1, 3, 4, 6),
            Request::new(2, -6, 8, 6),
            Request::new(3, 3, 0, 3),
        ],
        vec![10, 10],
    )
    .expect("scenario fleet should be valid")
}

/// A built world with `SimulationStarted` scheduled, using default parameters.
///
/// # Panics
///
/// Panics if the instance is invalid.
pub fn scenario_world(instance: &ProblemInstance) -> World {
    world_with_params(instance, &SimulationParams::default())
}

/// A built world with `SimulationStarted` scheduled.
///
/// # Panics
///
/// Panics if the instance is invalid.
pub fn world_with_params(instance: &ProblemInstance, params: &SimulationParams) -> World {
    let mut world = World::new();
    build_world(&mut world, instance, params).expect("test instance should be valid");
    initialize_simulation(&mut world);
    world
}
