//! Dispatcher channel and problem outbox.
//!
//! Vehicles and the run driver never hand out work themselves. They push a
//! [`DispatchSignal`] onto the shared [`DispatchQueue`]; the first push at an
//! instant schedules a single `Dispatch` event, and the dispatcher system
//! drains every queued signal in arrival order when that event fires.

use std::collections::VecDeque;

use bevy_ecs::prelude::Resource;

use crate::clock::{EventKind, SimulationClock};
use crate::fleet::FleetState;
use crate::pacing::TimeCoordinator;
use crate::problem::Problem;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchSignal {
    /// The vehicle with this index is idle and wants work.
    VehicleIdle(usize),
    /// A new plan was accepted; every idle vehicle should be re-examined.
    PlanAccepted,
}

#[derive(Debug, Default, Resource)]
pub struct DispatchQueue {
    signals: VecDeque<DispatchSignal>,
    wake_scheduled: bool,
}

impl DispatchQueue {
    /// Queue a signal, waking the dispatcher at the current instant if it is not already due.
    pub fn signal(&mut self, signal: DispatchSignal, clock: &mut SimulationClock) {
        self.signals.push_back(signal);
        if !self.wake_scheduled {
            clock.schedule_at(clock.now(), EventKind::Dispatch, None);
            self.wake_scheduled = true;
        }
    }

    /// Take every queued signal, oldest first.
    pub fn drain(&mut self) -> Vec<DispatchSignal> {
        self.wake_scheduled = false;
        self.signals.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Problems waiting to be published to the optimizer.
#[derive(Debug, Default, Resource)]
pub struct ProblemOutbox {
    problems: Vec<Problem>,
    published: usize,
}

impl ProblemOutbox {
    /// Project the fleet and queue it for publishing. Every broadcast owes a decision.
    pub fn broadcast(&mut self, fleet: &FleetState, coordinator: &mut TimeCoordinator) {
        self.problems.push(fleet.to_problem());
        self.published += 1;
        coordinator.on_problem_broadcast();
    }

    pub fn take(&mut self) -> Vec<Problem> {
        std::mem::take(&mut self.problems)
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }

    /// Broadcasts over the whole run.
    pub fn published(&self) -> usize {
        self.published
    }
}
