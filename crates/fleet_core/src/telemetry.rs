//! Telemetry: what happened during a run, in simulation milliseconds.

use bevy_ecs::prelude::Resource;

use crate::request::RequestId;

/// One request handed to a vehicle by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitRecord {
    pub vehicle: usize,
    pub request: RequestId,
    pub committed_at: u64,
}

/// One completed visit: travel then service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceRecord {
    pub vehicle: usize,
    pub request: RequestId,
    pub departed_at: u64,
    pub arrived_at: u64,
    pub completed_at: u64,
}

impl ServiceRecord {
    pub fn travel_time(&self) -> u64 {
        self.arrived_at.saturating_sub(self.departed_at)
    }

    pub fn service_time(&self) -> u64 {
        self.completed_at.saturating_sub(self.arrived_at)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlanDecisionRecord {
    pub decided_at: u64,
    pub accepted: bool,
    /// Cost of the offered plan; `None` when infeasible.
    pub cost: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrivalRecord {
    pub request: RequestId,
    pub arrived_at: u64,
}

#[derive(Debug, Default, Resource)]
pub struct SimTelemetry {
    pub commits: Vec<CommitRecord>,
    pub services: Vec<ServiceRecord>,
    pub plan_decisions: Vec<PlanDecisionRecord>,
    pub arrivals: Vec<ArrivalRecord>,
}

impl SimTelemetry {
    pub fn accepted_plans(&self) -> usize {
        self.plan_decisions.iter().filter(|d| d.accepted).count()
    }

    pub fn rejected_plans(&self) -> usize {
        self.plan_decisions.len() - self.accepted_plans()
    }

    /// Simulated time of the last completed service, if any.
    pub fn makespan(&self) -> Option<u64> {
        self.services.iter().map(|s| s.completed_at).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_plan_outcomes() {
        let mut telemetry = SimTelemetry::default();
        for (accepted, cost) in [(true, Some(10.0)), (false, None), (false, Some(12.0))] {
            telemetry.plan_decisions.push(PlanDecisionRecord {
                decided_at: 0,
                accepted,
                cost,
            });
        }
        assert_eq!(telemetry.accepted_plans(), 1);
        assert_eq!(telemetry.rejected_plans(), 2);
    }

    #[test]
    fn service_durations_split_travel_and_service() {
        let record = ServiceRecord {
            vehicle: 0,
            request: 3,
            departed_at: 1_000,
            arrived_at: 4_000,
            completed_at: 14_000,
        };
        assert_eq!(record.travel_time(), 3_000);
        assert_eq!(record.service_time(), 10_000);
    }
}
