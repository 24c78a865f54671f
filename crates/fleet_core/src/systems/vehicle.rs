//! Vehicle actor: `RequestingWork -> Traveling -> Servicing -> RequestingWork`.
//!
//! Every transition is a clock event addressed to one vehicle entity. A
//! vehicle never picks its own work; it announces itself to the dispatcher
//! and waits for its mailbox to be filled.

use bevy_ecs::prelude::{Query, Res, ResMut};
use tracing::{debug, warn};

use crate::clock::{CurrentEvent, EventKind, EventSubject, SimulationClock};
use crate::dispatch::{DispatchQueue, DispatchSignal};
use crate::ecs::{Assignments, Vehicle, VehicleState};
use crate::fleet::FleetState;
use crate::request::DEPOT_ID;
use crate::scenario::VehicleTiming;
use crate::telemetry::{ServiceRecord, SimTelemetry};

pub fn vehicle_request_work_system(
    mut clock: ResMut<SimulationClock>,
    mut queue: ResMut<DispatchQueue>,
    mut vehicles: Query<&mut Vehicle>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::VehicleRequestWork {
        return;
    }
    let Some(entity) = event.0.vehicle() else {
        return;
    };
    let Ok(mut vehicle) = vehicles.get_mut(entity) else {
        return;
    };

    vehicle.state = VehicleState::RequestingWork;
    vehicle.target = None;
    queue.signal(DispatchSignal::VehicleIdle(vehicle.index), &mut clock);
}

pub fn assignment_delivered_system(
    mut clock: ResMut<SimulationClock>,
    fleet: Res<FleetState>,
    timing: Res<VehicleTiming>,
    mut vehicles: Query<(&mut Vehicle, &mut Assignments)>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::AssignmentDelivered {
        return;
    }
    let Some(entity) = event.0.vehicle() else {
        return;
    };
    let Ok((mut vehicle, mut mailbox)) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::RequestingWork {
        return;
    }
    let Some(target) = mailbox.pop() else {
        return;
    };

    let now = clock.now();
    let subject = Some(EventSubject::Vehicle(entity));
    if target == vehicle.position {
        debug!(vehicle = vehicle.index, request = target, "already at assigned stop");
        clock.schedule_at(now, EventKind::VehicleRequestWork, subject);
        return;
    }

    let Some(cost) = fleet.try_cost(vehicle.position, target) else {
        warn!(
            vehicle = vehicle.index,
            from = vehicle.position,
            to = target,
            "no travel cost for assignment"
        );
        clock.schedule_at(now, EventKind::VehicleRequestWork, subject);
        return;
    };

    vehicle.state = VehicleState::Traveling;
    vehicle.target = Some(target);
    vehicle.departed_at = now;
    clock.schedule_in(
        timing.travel_time_ms(cost),
        EventKind::VehicleArrived,
        subject,
    );
}

pub fn vehicle_arrived_system(
    mut clock: ResMut<SimulationClock>,
    timing: Res<VehicleTiming>,
    mut vehicles: Query<&mut Vehicle>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::VehicleArrived {
        return;
    }
    let Some(entity) = event.0.vehicle() else {
        return;
    };
    let Ok(mut vehicle) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::Traveling {
        return;
    }

    vehicle.state = VehicleState::Servicing;
    vehicle.arrived_at = clock.now();
    // The depot is a waypoint, not a customer.
    let service_ms = if vehicle.target == Some(DEPOT_ID) {
        0
    } else {
        timing.service_time_ms
    };
    clock.schedule_in(
        service_ms,
        EventKind::ServiceCompleted,
        Some(EventSubject::Vehicle(entity)),
    );
}

pub fn service_completed_system(
    mut clock: ResMut<SimulationClock>,
    mut telemetry: ResMut<SimTelemetry>,
    mut vehicles: Query<&mut Vehicle>,
    event: Res<CurrentEvent>,
) {
    if event.0.kind != EventKind::ServiceCompleted {
        return;
    }
    let Some(entity) = event.0.vehicle() else {
        return;
    };
    let Ok(mut vehicle) = vehicles.get_mut(entity) else {
        return;
    };
    if vehicle.state != VehicleState::Servicing {
        return;
    }
    let Some(target) = vehicle.target.take() else {
        return;
    };

    let now = clock.now();
    vehicle.position = target;
    if target != DEPOT_ID {
        telemetry.services.push(ServiceRecord {
            vehicle: vehicle.index,
            request: target,
            departed_at: vehicle.departed_at,
            arrived_at: vehicle.arrived_at,
            completed_at: now,
        });
    }
    debug!(vehicle = vehicle.index, request = target, sim_ms = now, "service completed");
    clock.schedule_at(
        now,
        EventKind::VehicleRequestWork,
        Some(EventSubject::Vehicle(entity)),
    );
}
