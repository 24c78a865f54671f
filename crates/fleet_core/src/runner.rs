//! Simulation runner: advances the clock and routes events into the ECS.
//!
//! Clock progression and event routing happen here, outside systems. Each step
//! pops the next event from [SimulationClock], inserts it as [CurrentEvent],
//! then runs the schedule. Systems are gated on the event kind so only the
//! handler for that event does any work.

use bevy_ecs::prelude::{Res, Schedule, World};
use bevy_ecs::schedule::IntoSystemConfigs;

use crate::clock::{CurrentEvent, Event, EventKind, SimulationClock};
use crate::systems::{
    dispatcher::dispatcher_system,
    request_arrival::request_arrival_system,
    simulation_started::simulation_started_system,
    vehicle::{
        assignment_delivered_system, service_completed_system, vehicle_arrived_system,
        vehicle_request_work_system,
    },
};

fn is_event(event: &Option<Res<CurrentEvent>>, kind: EventKind) -> bool {
    event.as_ref().map(|e| e.0.kind == kind).unwrap_or(false)
}

fn is_simulation_started(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::SimulationStarted)
}

fn is_request_arrival(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::RequestArrival)
}

fn is_dispatch(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::Dispatch)
}

fn is_vehicle_request_work(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::VehicleRequestWork)
}

fn is_assignment_delivered(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::AssignmentDelivered)
}

fn is_vehicle_arrived(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::VehicleArrived)
}

fn is_service_completed(event: Option<Res<CurrentEvent>>) -> bool {
    is_event(&event, EventKind::ServiceCompleted)
}

/// Runs one simulation step: pops the next event, inserts it as [CurrentEvent], then runs the schedule.
/// Returns the processed event, or `None` if the clock was empty.
pub fn run_next_event(world: &mut World, schedule: &mut Schedule) -> Option<Event> {
    let event = world.resource_mut::<SimulationClock>().pop_next()?;
    world.insert_resource(CurrentEvent(event));
    schedule.run(world);
    Some(event)
}

/// Runs simulation steps until the event queue is empty or `max_steps` is reached.
/// Returns the number of steps executed.
pub fn run_until_empty(world: &mut World, schedule: &mut Schedule, max_steps: usize) -> usize {
    let mut steps = 0;
    while steps < max_steps && run_next_event(world, schedule).is_some() {
        steps += 1;
    }
    steps
}

/// The next event without processing it.
pub fn peek_next_event(world: &World) -> Option<Event> {
    world
        .get_resource::<SimulationClock>()
        .and_then(|clock| clock.peek().copied())
}

/// Builds the simulation schedule: one handler per event kind.
pub fn simulation_schedule() -> Schedule {
    let mut schedule = Schedule::default();
    schedule.add_systems((
        simulation_started_system.run_if(is_simulation_started),
        request_arrival_system.run_if(is_request_arrival),
        dispatcher_system.run_if(is_dispatch),
        vehicle_request_work_system.run_if(is_vehicle_request_work),
        assignment_delivered_system.run_if(is_assignment_delivered),
        vehicle_arrived_system.run_if(is_vehicle_arrived),
        service_completed_system.run_if(is_service_completed),
    ));
    schedule
}

/// Initializes the simulation by scheduling the SimulationStarted event at time 0.
/// Call this after building the world and before running events.
pub fn initialize_simulation(world: &mut World) {
    let mut clock = world.resource_mut::<SimulationClock>();
    clock.schedule_at(0, EventKind::SimulationStarted, None);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::FleetState;
    use crate::plan::Plan;
    use crate::test_helpers::{scenario_instance, scenario_world};

    #[test]
    fn without_a_plan_the_run_stalls_at_dispatch() {
        let mut world = scenario_world(&scenario_instance());
        let mut schedule = simulation_schedule();

        // Start, two work requests; the dispatcher then finds no queued work.
        let steps = run_until_empty(&mut world, &mut schedule, 100);
        assert_eq!(steps, 4);
        let fleet = world.resource::<FleetState>();
        assert_eq!(fleet.committed_count(), 0);
        assert_eq!(fleet.pending_count(), 3);
    }

    #[test]
    fn accepted_plan_drives_run_to_completion() {
        let mut world = scenario_world(&scenario_instance());
        let mut schedule = simulation_schedule();
        // Process the start event so the initial problem goes out.
        run_next_event(&mut world, &mut schedule).expect("start");

        let accepted = world
            .resource_mut::<FleetState>()
            .try_set_new_plan(Plan::new(vec![vec![1, 3], vec![2]]));
        assert!(accepted.is_accepted());

        run_until_empty(&mut world, &mut schedule, 1_000);
        let fleet = world.resource::<FleetState>();
        assert!(!fleet.has_pending());
        assert_eq!(fleet.finalize_plan(), Plan::new(vec![vec![1, 3], vec![2]]));
        assert!((fleet.final_cost() - 32.0).abs() < 1e-9);
        assert!(peek_next_event(&world).is_none());
    }
}
