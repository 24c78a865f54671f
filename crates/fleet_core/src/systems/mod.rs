pub mod simulation_started;
pub mod request_arrival;
pub mod dispatcher;
pub mod vehicle;

#[cfg(test)]
mod end_to_end_tests {
    use bevy_ecs::prelude::{Mut, World};

    use crate::clock::{SimulationClock, ONE_SEC_MS};
    use crate::dispatch::{DispatchQueue, DispatchSignal};
    use crate::ecs::{Vehicle, VehicleRoster, VehicleState};
    use crate::fleet::FleetState;
    use crate::plan::Plan;
    use crate::runner::{run_next_event, run_until_empty, simulation_schedule};
    use crate::telemetry::SimTelemetry;
    use crate::test_helpers::{dynamic_scenario_instance, scenario_instance, scenario_world};

    fn signal_plan_accepted(world: &mut World) {
        world.resource_scope(|world, mut queue: Mut<DispatchQueue>| {
            let mut clock = world.resource_mut::<SimulationClock>();
            queue.signal(DispatchSignal::PlanAccepted, &mut clock);
        });
    }

    fn all_requesting_work(world: &mut World) -> bool {
        world
            .query::<&Vehicle>()
            .iter(world)
            .all(|vehicle| vehicle.state == VehicleState::RequestingWork)
    }

    #[test]
    fn serves_static_scenario_end_to_end() {
        let mut world = scenario_world(&scenario_instance());
        let mut schedule = simulation_schedule();
        run_next_event(&mut world, &mut schedule).expect("start");

        let decision = world
            .resource_mut::<FleetState>()
            .try_set_new_plan(Plan::new(vec![vec![1, 3], vec![2]]));
        assert!(decision.is_accepted());
        signal_plan_accepted(&mut world);

        let steps = run_until_empty(&mut world, &mut schedule, 1_000);
        assert!(steps < 1_000, "runner did not converge");
        assert!(all_requesting_work(&mut world));

        let telemetry = world.resource::<SimTelemetry>();
        assert_eq!(telemetry.commits.len(), 3);
        assert_eq!(telemetry.services.len(), 3);
        for record in &telemetry.services {
            assert!(record.departed_at <= record.arrived_at);
            assert_eq!(record.service_time(), 10 * ONE_SEC_MS);
        }
        // 0 -> 1 is 5 units at 1 s per unit.
        let first = telemetry
            .services
            .iter()
            .find(|record| record.request == 1)
            .expect("request 1 served");
        assert_eq!(first.vehicle, 0);
        assert_eq!(first.travel_time(), 5 * ONE_SEC_MS);
        // Vehicle 0: 5 s to 1, 10 s service, 4 s to 3, 10 s service.
        assert_eq!(telemetry.makespan(), Some(29 * ONE_SEC_MS));

        let fleet = world.resource::<FleetState>();
        assert_eq!(fleet.finalize_plan(), Plan::new(vec![vec![1, 3], vec![2]]));
        assert!((fleet.final_cost() - 32.0).abs() < 1e-9);
    }

    #[test]
    fn late_request_waits_for_a_plan_that_covers_it() {
        let mut world = scenario_world(&dynamic_scenario_instance(5));
        let mut schedule = simulation_schedule();
        run_next_event(&mut world, &mut schedule).expect("start");

        let decision = world
            .resource_mut::<FleetState>()
            .try_set_new_plan(Plan::new(vec![vec![1], vec![2]]));
        assert!(decision.is_accepted());
        signal_plan_accepted(&mut world);

        run_until_empty(&mut world, &mut schedule, 1_000);
        {
            let fleet = world.resource::<FleetState>();
            assert_eq!(fleet.pending_ids(), vec![3]);
            assert_eq!(fleet.committed_count(), 2);
            let arrivals = &world.resource::<SimTelemetry>().arrivals;
            assert_eq!(arrivals.len(), 1);
            assert_eq!(arrivals[0].arrived_at, 5 * ONE_SEC_MS);
        }

        // The old plan no longer covers every pending request, so any
        // feasible plan replaces it.
        let decision = world
            .resource_mut::<FleetState>()
            .try_set_new_plan(Plan::new(vec![vec![3], vec![]]));
        assert!(decision.is_accepted());
        signal_plan_accepted(&mut world);
        run_until_empty(&mut world, &mut schedule, 1_000);

        let fleet = world.resource::<FleetState>();
        assert!(!fleet.has_pending());
        assert_eq!(fleet.finalize_plan(), Plan::new(vec![vec![1, 3], vec![2]]));
        assert!((fleet.final_cost() - 32.0).abs() < 1e-9);
        assert_eq!(world.resource::<VehicleRoster>().len(), 2);
    }
}
