//! Dispatcher: hands out the next stop of the accepted plan to idle vehicles.
//!
//! A vehicle counts as idle when it is requesting work and its mailbox is
//! empty. Signals are handled strictly in arrival order; a vehicle signal only
//! ever affects that vehicle, and a plan signal sweeps idle vehicles by index.

use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::debug;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatch::{DispatchQueue, DispatchSignal, ProblemOutbox};
use crate::ecs::{Assignments, Vehicle, VehicleRoster, VehicleState};
use crate::fleet::FleetState;
use crate::pacing::TimeCoordinator;
use crate::telemetry::{CommitRecord, SimTelemetry};

#[allow(clippy::too_many_arguments)]
pub fn dispatcher_system(
    mut clock: ResMut<SimulationClock>,
    mut queue: ResMut<DispatchQueue>,
    mut fleet: ResMut<FleetState>,
    mut outbox: ResMut<ProblemOutbox>,
    mut coordinator: ResMut<TimeCoordinator>,
    mut telemetry: ResMut<SimTelemetry>,
    roster: Res<VehicleRoster>,
    mut vehicles: Query<(&Vehicle, &mut Assignments)>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::Dispatch {
        return;
    }

    let mut ctx = DispatchContext {
        clock: &mut *clock,
        fleet: &mut *fleet,
        outbox: &mut *outbox,
        coordinator: &mut *coordinator,
        telemetry: &mut *telemetry,
        roster: &*roster,
    };

    for signal in queue.drain() {
        match signal {
            DispatchSignal::VehicleIdle(index) => ctx.assign_next(index, &mut vehicles),
            DispatchSignal::PlanAccepted => {
                for index in 0..ctx.roster.len() {
                    ctx.assign_next(index, &mut vehicles);
                }
            }
        }
    }
}

struct DispatchContext<'a> {
    clock: &'a mut SimulationClock,
    fleet: &'a mut FleetState,
    outbox: &'a mut ProblemOutbox,
    coordinator: &'a mut TimeCoordinator,
    telemetry: &'a mut SimTelemetry,
    roster: &'a VehicleRoster,
}

impl DispatchContext<'_> {
    fn assign_next(&mut self, index: usize, vehicles: &mut Query<(&Vehicle, &mut Assignments)>) {
        let Some(entity) = self.roster.entity(index) else {
            return;
        };
        let Ok((vehicle, mut mailbox)) = vehicles.get_mut(entity) else {
            return;
        };
        if vehicle.state != VehicleState::RequestingWork || !mailbox.is_empty() {
            return;
        }

        let Some(id) = self.fleet.try_commit_next_request(index) else {
            return;
        };
        let now = self.clock.now();
        debug!(vehicle = index, request = id, sim_ms = now, "dispatching");
        mailbox.push(id);
        self.telemetry.commits.push(CommitRecord {
            vehicle: index,
            request: id,
            committed_at: now,
        });
        self.clock.schedule_at(
            now,
            EventKind::AssignmentDelivered,
            Some(EventSubject::Vehicle(entity)),
        );

        if self.fleet.has_pending() {
            self.outbox.broadcast(self.fleet, self.coordinator);
        }
    }
}

#[cfg(test)]
mod tests {
    use bevy_ecs::prelude::{Mut, Schedule, World};

    use super::*;
    use crate::plan::Plan;
    use crate::test_helpers::{scenario_instance, scenario_world};

    fn run_dispatch(world: &mut World, signals: &[DispatchSignal]) {
        world.resource_scope(|world, mut queue: Mut<DispatchQueue>| {
            let mut clock = world.resource_mut::<SimulationClock>();
            for signal in signals {
                queue.signal(*signal, &mut clock);
            }
        });
        let event = world
            .resource_mut::<SimulationClock>()
            .pop_next()
            .expect("dispatch event");
        assert_eq!(event.kind, EventKind::Dispatch);
        world.insert_resource(CurrentEvent(event));

        let mut schedule = Schedule::default();
        schedule.add_systems(dispatcher_system);
        schedule.run(world);
    }

    fn mailbox(world: &World, index: usize) -> Vec<u32> {
        let entity = world.resource::<VehicleRoster>().0[index];
        world
            .get::<Assignments>(entity)
            .expect("mailbox")
            .0
            .iter()
            .copied()
            .collect()
    }

    fn dispatch_world() -> World {
        let mut world = scenario_world(&scenario_instance());
        world.insert_resource(SimulationClock::default());
        let decision = world
            .resource_mut::<FleetState>()
            .try_set_new_plan(Plan::new(vec![vec![1, 3], vec![2]]));
        assert!(decision.is_accepted());
        world
    }

    #[test]
    fn vehicle_signal_only_assigns_that_vehicle() {
        let mut world = dispatch_world();
        run_dispatch(&mut world, &[DispatchSignal::VehicleIdle(1)]);

        assert_eq!(mailbox(&world, 0), Vec::<u32>::new());
        assert_eq!(mailbox(&world, 1), vec![2]);
        assert!(world.resource::<FleetState>().is_committed(2));
        // Requests 1 and 3 are still pending, so the new state was broadcast.
        assert_eq!(world.resource::<ProblemOutbox>().published(), 1);
    }

    #[test]
    fn plan_signal_sweeps_idle_vehicles_in_index_order() {
        let mut world = dispatch_world();
        run_dispatch(&mut world, &[DispatchSignal::PlanAccepted]);

        assert_eq!(mailbox(&world, 0), vec![1]);
        assert_eq!(mailbox(&world, 1), vec![2]);
        let commits: Vec<_> = world
            .resource::<SimTelemetry>()
            .commits
            .iter()
            .map(|c| (c.vehicle, c.request))
            .collect();
        assert_eq!(commits, vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn busy_vehicle_is_never_double_assigned() {
        let mut world = dispatch_world();
        run_dispatch(
            &mut world,
            &[
                DispatchSignal::VehicleIdle(0),
                DispatchSignal::VehicleIdle(0),
                DispatchSignal::PlanAccepted,
            ],
        );
        assert_eq!(mailbox(&world, 0), vec![1]);
        assert!(world.resource::<FleetState>().is_pending(3));
    }

    #[test]
    fn no_broadcast_once_nothing_is_pending() {
        let mut world = dispatch_world();
        {
            let mut fleet = world.resource_mut::<FleetState>();
            fleet.try_commit_next_request(0);
            fleet.try_commit_next_request(0);
        }
        run_dispatch(&mut world, &[DispatchSignal::VehicleIdle(1)]);
        assert_eq!(mailbox(&world, 1), vec![2]);
        assert!(!world.resource::<FleetState>().has_pending());
        assert_eq!(world.resource::<ProblemOutbox>().published(), 0);
    }

    #[test]
    fn idle_vehicle_without_queue_gets_nothing() {
        let mut world = scenario_world(&scenario_instance());
        world.insert_resource(SimulationClock::default());
        run_dispatch(&mut world, &[DispatchSignal::VehicleIdle(0)]);
        assert!(mailbox(&world, 0).is_empty());
        assert_eq!(world.resource::<FleetState>().committed_count(), 0);
    }
}
