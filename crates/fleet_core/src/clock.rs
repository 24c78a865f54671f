//! Discrete-event clock.
//!
//! Time is simulation milliseconds since run start. Events at the same
//! instant are popped in the order they were scheduled.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use bevy_ecs::prelude::{Entity, Resource};

pub const ONE_SEC_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SimulationStarted,
    /// Next group of the arrival schedule is due.
    RequestArrival,
    /// Dispatcher wakes up to drain its signal queue.
    Dispatch,
    VehicleRequestWork,
    AssignmentDelivered,
    VehicleArrived,
    ServiceCompleted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventSubject {
    Vehicle(Entity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
    pub timestamp: u64,
    pub seq: u64,
    pub kind: EventKind,
    pub subject: Option<EventSubject>,
}

impl Event {
    pub fn vehicle(&self) -> Option<Entity> {
        match self.subject {
            Some(EventSubject::Vehicle(entity)) => Some(entity),
            None => None,
        }
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering to make BinaryHeap a min-heap by (timestamp, seq).
        other
            .timestamp
            .cmp(&self.timestamp)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event being processed by the current schedule run.
#[derive(Debug, Clone, Copy, Resource)]
pub struct CurrentEvent(pub Event);

#[derive(Debug, Default, Resource)]
pub struct SimulationClock {
    now: u64,
    next_seq: u64,
    events: BinaryHeap<Event>,
}

impl SimulationClock {
    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule_at(&mut self, timestamp: u64, kind: EventKind, subject: Option<EventSubject>) {
        debug_assert!(
            timestamp >= self.now,
            "event timestamp must be >= current time"
        );
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(Event {
            timestamp: timestamp.max(self.now),
            seq,
            kind,
            subject,
        });
    }

    pub fn schedule_in(&mut self, delay_ms: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(self.now.saturating_add(delay_ms), kind, subject);
    }

    pub fn schedule_at_secs(&mut self, secs: u64, kind: EventKind, subject: Option<EventSubject>) {
        self.schedule_at(secs.saturating_mul(ONE_SEC_MS), kind, subject);
    }

    pub fn pop_next(&mut self) -> Option<Event> {
        let event = self.events.pop()?;
        self.now = event.timestamp;
        Some(event)
    }

    pub fn peek(&self) -> Option<&Event> {
        self.events.peek()
    }

    pub fn next_event_time(&self) -> Option<u64> {
        self.events.peek().map(|event| event.timestamp)
    }

    /// Move `now` forward without processing anything. Never moves backwards
    /// and never passes the next scheduled event.
    pub fn advance_to(&mut self, timestamp: u64) {
        let limit = self.next_event_time().unwrap_or(u64::MAX);
        self.now = self.now.max(timestamp.min(limit));
    }

    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pops_events_in_time_order() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(10, EventKind::RequestArrival, None);
        clock.schedule_at(5, EventKind::RequestArrival, None);
        clock.schedule_at(20, EventKind::RequestArrival, None);

        let first = clock.pop_next().expect("first event");
        assert_eq!(first.timestamp, 5);
        assert_eq!(clock.now(), 5);

        let second = clock.pop_next().expect("second event");
        assert_eq!(second.timestamp, 10);
        assert_eq!(clock.now(), 10);

        let third = clock.pop_next().expect("third event");
        assert_eq!(third.timestamp, 20);
        assert_eq!(clock.now(), 20);

        assert!(clock.pop_next().is_none());
        assert!(clock.is_empty());
    }

    #[test]
    fn same_instant_events_are_fifo() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(7, EventKind::Dispatch, None);
        clock.schedule_at(7, EventKind::VehicleRequestWork, None);
        clock.schedule_at(7, EventKind::RequestArrival, None);

        let kinds: Vec<_> = std::iter::from_fn(|| clock.pop_next())
            .map(|event| event.kind)
            .collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::Dispatch,
                EventKind::VehicleRequestWork,
                EventKind::RequestArrival
            ]
        );
    }

    #[test]
    fn schedule_helpers_are_relative_to_now() {
        let mut clock = SimulationClock::default();
        clock.schedule_at_secs(2, EventKind::RequestArrival, None);
        assert_eq!(clock.next_event_time(), Some(2 * ONE_SEC_MS));
        clock.pop_next();
        clock.schedule_in(500, EventKind::Dispatch, None);
        assert_eq!(clock.next_event_time(), Some(2_500));
    }

    #[test]
    fn advance_to_stops_at_next_event() {
        let mut clock = SimulationClock::default();
        clock.schedule_at(100, EventKind::Dispatch, None);
        clock.advance_to(40);
        assert_eq!(clock.now(), 40);
        clock.advance_to(400);
        assert_eq!(clock.now(), 100);
        clock.advance_to(10);
        assert_eq!(clock.now(), 100);
    }
}
