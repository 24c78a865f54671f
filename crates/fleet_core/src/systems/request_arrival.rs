//! Dynamic request arrivals.

use bevy_ecs::prelude::{Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventKind, SimulationClock};
use crate::dispatch::ProblemOutbox;
use crate::fleet::FleetState;
use crate::instance::ArrivalSchedule;
use crate::pacing::TimeCoordinator;
use crate::telemetry::{ArrivalRecord, SimTelemetry};

/// Reveal the group of requests due now, broadcast once, and schedule the next group.
pub fn request_arrival_system(
    mut clock: ResMut<SimulationClock>,
    mut schedule: ResMut<ArrivalSchedule>,
    mut fleet: ResMut<FleetState>,
    mut outbox: ResMut<ProblemOutbox>,
    mut coordinator: ResMut<TimeCoordinator>,
    mut telemetry: ResMut<SimTelemetry>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::RequestArrival {
        return;
    }

    let now = clock.now();
    let Some(group) = schedule.pop_due(now) else {
        return;
    };

    for request in group {
        let id = request.id;
        match fleet.add_request(request) {
            Ok(()) => {
                debug!(request = id, sim_ms = now, "request arrived");
                telemetry.arrivals.push(ArrivalRecord {
                    request: id,
                    arrived_at: now,
                });
            }
            Err(err) => warn!(request = id, %err, "dropping arrival"),
        }
    }
    outbox.broadcast(&fleet, &mut coordinator);

    if let Some(at) = schedule.next_time() {
        clock.schedule_at(at, EventKind::RequestArrival, None);
    }
}
