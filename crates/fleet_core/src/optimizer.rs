//! Optimizer seam and the reference construction heuristic.
//!
//! Optimizers only propose. Whatever they return is validated by
//! [`crate::fleet::FleetState::try_set_new_plan`], so a construction is free
//! to return an infeasible plan when it cannot do better.

use std::sync::mpsc::{self, Receiver, Sender};

use tracing::debug;

use crate::plan::Plan;
use crate::problem::Problem;
use crate::result::SimulationResult;
use crate::session::{PlanFeed, ProblemSink, RunResult};

pub trait Optimizer {
    /// Propose a plan in request-id space for `problem`.
    fn solve(&mut self, problem: &Problem) -> Plan;
}

impl<F> Optimizer for F
where
    F: FnMut(&Problem) -> Plan,
{
    fn solve(&mut self, problem: &Problem) -> Plan {
        self(problem)
    }
}

/// Fills vehicles one after another in index order, moving on when the next
/// request does not fit. Requests left over when vehicles run out are put on
/// the last vehicle, which makes the plan infeasible.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreedyConstruction;

impl Optimizer for GreedyConstruction {
    fn solve(&mut self, problem: &Problem) -> Plan {
        let mut plan = Plan::empty(problem.vehicle_count);
        if problem.vehicle_count == 0 {
            return plan;
        }

        let last = problem.vehicle_count - 1;
        let free = |vehicle: usize| problem.vehicle_capacity.get(vehicle).copied().unwrap_or(0);
        let mut vehicle = 0;
        let mut remaining = free(vehicle);
        for request in &problem.requests {
            while request.demand > remaining && vehicle < last {
                vehicle += 1;
                remaining = free(vehicle);
            }
            remaining = remaining.saturating_sub(request.demand);
            plan.routes[vehicle].push(request.id);
        }
        plan
    }
}

/// Answers every published problem synchronously with an in-process optimizer.
#[derive(Debug)]
pub struct LoopbackSink<O> {
    optimizer: O,
    plans: Sender<PlanFeed>,
    problems_seen: usize,
    results: Vec<SimulationResult>,
}

/// A loopback sink and the plan inbox it feeds.
pub fn loopback<O: Optimizer>(optimizer: O) -> (LoopbackSink<O>, Receiver<PlanFeed>) {
    let (plans, inbox) = mpsc::channel();
    (
        LoopbackSink {
            optimizer,
            plans,
            problems_seen: 0,
            results: Vec::new(),
        },
        inbox,
    )
}

impl<O> LoopbackSink<O> {
    pub fn problems_seen(&self) -> usize {
        self.problems_seen
    }

    pub fn results(&self) -> &[SimulationResult] {
        &self.results
    }
}

impl<O: Optimizer> ProblemSink for LoopbackSink<O> {
    fn publish_problem(&mut self, problem: &Problem) -> RunResult<()> {
        self.problems_seen += 1;
        let plan = self.optimizer.solve(problem);
        // The run may already be finishing; a dropped inbox is not an error here.
        if self.plans.send(Ok(plan)).is_err() {
            debug!("plan inbox closed, dropping loopback plan");
        }
        Ok(())
    }

    fn publish_result(&mut self, result: &SimulationResult) -> RunResult<()> {
        self.results.push(result.clone());
        Ok(())
    }
}
