//! Run start: first problem, first arrival, and every vehicle asking for work.

use bevy_ecs::prelude::{Res, ResMut};
use tracing::info;

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatch::ProblemOutbox;
use crate::ecs::VehicleRoster;
use crate::fleet::FleetState;
use crate::instance::ArrivalSchedule;
use crate::pacing::TimeCoordinator;

pub fn simulation_started_system(
    mut clock: ResMut<SimulationClock>,
    mut outbox: ResMut<ProblemOutbox>,
    mut coordinator: ResMut<TimeCoordinator>,
    fleet: Res<FleetState>,
    schedule: Res<ArrivalSchedule>,
    roster: Res<VehicleRoster>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::SimulationStarted {
        return;
    }

    info!(
        vehicles = fleet.vehicle_count(),
        initial = fleet.pending_count(),
        dynamic = schedule.remaining(),
        "simulation started"
    );

    // The optimizer needs something to solve from t=0, even if it is empty.
    outbox.broadcast(&fleet, &mut coordinator);

    if let Some(at) = schedule.next_time() {
        clock.schedule_at(at, EventKind::RequestArrival, None);
    }

    let now = clock.now();
    for &entity in &roster.0 {
        clock.schedule_at(
            now,
            EventKind::VehicleRequestWork,
            Some(EventSubject::Vehicle(entity)),
        );
    }
}
