//! Run driver: one simulation run bridged to an optimizer.
//!
//! The ECS world is stepped one event at a time on the calling thread. Between
//! steps the driver publishes queued problems, evaluates returned plans and,
//! in real time, holds each event back until its wall-clock instant. Plans
//! that arrive during such a wait are applied at the simulated instant they
//! arrived.
//!
//! Every run publishes exactly one result. A run that aborts still publishes
//! an infeasible one before returning its error.

use std::sync::mpsc::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};

use bevy_ecs::prelude::{Schedule, World};
use bevy_ecs::world::Mut;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::bus::BusError;
use crate::clock::{Event, EventKind, SimulationClock};
use crate::dispatch::{DispatchQueue, DispatchSignal, ProblemOutbox};
use crate::fleet::{FleetState, PlanDecision};
use crate::instance::{InstanceError, ProblemInstance};
use crate::pacing::{TimeCoordinator, TimeMode, WallClockPacer};
use crate::plan::Plan;
use crate::problem::Problem;
use crate::result::{SimulationResult, INFEASIBLE_COST};
use crate::runner::{initialize_simulation, peek_next_event, run_next_event, simulation_schedule};
use crate::scenario::{build_world, InstanceName, SimulationParams};
use crate::telemetry::{PlanDecisionRecord, SimTelemetry};
use crate::wire::ProtocolError;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Instance(#[from] InstanceError),

    #[error("optimizer disconnected before a plan was accepted")]
    OptimizerGone,

    #[error("no plan accepted within {0:?}")]
    NoInitialPlan(Duration),

    #[error("every returned plan was rejected before the first dispatch")]
    NoFeasiblePlan,

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

pub type RunResult<T> = Result<T, RunError>;

/// One item of a run's inbox: a plan, or the fault that cut the feed off.
pub type PlanFeed = Result<Plan, ProtocolError>;

/// Where a run sends its problems and its final result.
pub trait ProblemSink {
    fn publish_problem(&mut self, problem: &Problem) -> RunResult<()>;
    fn publish_result(&mut self, result: &SimulationResult) -> RunResult<()>;
}

impl<T: ProblemSink + ?Sized> ProblemSink for &mut T {
    fn publish_problem(&mut self, problem: &Problem) -> RunResult<()> {
        (**self).publish_problem(problem)
    }

    fn publish_result(&mut self, result: &SimulationResult) -> RunResult<()> {
        (**self).publish_result(result)
    }
}

pub struct SimulationRun<S> {
    world: World,
    schedule: Schedule,
    sink: S,
    plans: Receiver<PlanFeed>,
    params: SimulationParams,
    pacer: WallClockPacer,
    last_mode: TimeMode,
    steps: usize,
    inbox_closed: bool,
    fault: Option<ProtocolError>,
}

impl<S: ProblemSink> SimulationRun<S> {
    pub fn new(
        instance: &ProblemInstance,
        params: SimulationParams,
        sink: S,
        plans: Receiver<PlanFeed>,
    ) -> RunResult<Self> {
        let mut world = World::new();
        build_world(&mut world, instance, &params)?;
        initialize_simulation(&mut world);
        let pacer = WallClockPacer::new(0, params.real_time_scale);

        Ok(Self {
            world,
            schedule: simulation_schedule(),
            sink,
            plans,
            params,
            pacer,
            last_mode: TimeMode::Real,
            steps: 0,
            inbox_closed: false,
            fault: None,
        })
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn fleet(&self) -> &FleetState {
        self.world.resource::<FleetState>()
    }

    pub fn telemetry(&self) -> &SimTelemetry {
        self.world.resource::<SimTelemetry>()
    }

    pub fn now(&self) -> u64 {
        self.world.resource::<SimulationClock>().now()
    }

    pub fn mode(&self) -> TimeMode {
        self.world.resource::<TimeCoordinator>().mode()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    /// Run to termination and publish the result.
    ///
    /// On error an infeasible result is published first, then the error is
    /// returned.
    pub fn run(mut self) -> RunResult<SimulationResult> {
        info!(
            instance = %self.world.resource::<InstanceName>().0,
            fast = self.params.allow_fast_simulation,
            "run started"
        );
        self.pacer.reanchor(self.now());

        match self.drive() {
            Ok(()) => self.finish(),
            Err(err) => self.abort(err),
        }
    }

    fn drive(&mut self) -> RunResult<()> {
        loop {
            self.flush_problems()?;
            self.drain_inbox();
            self.check_fault()?;
            self.track_mode();

            let Some(next) = peek_next_event(&self.world) else {
                if self.await_outstanding_decision() {
                    continue;
                }
                break;
            };

            if next.kind == EventKind::Dispatch && !self.fleet().has_accepted_plan() {
                self.await_first_plan()?;
                continue;
            }

            if self.mode() == TimeMode::Real && self.pace_until(next.timestamp) {
                continue;
            }
            self.check_fault()?;

            if self.steps >= self.params.max_steps {
                warn!(steps = self.steps, "step limit reached, ending run");
                break;
            }
            self.step();
        }
        self.check_fault()
    }

    /// Process exactly one event, ignoring pacing and the plan inbox.
    pub fn step(&mut self) -> Option<Event> {
        let event = run_next_event(&mut self.world, &mut self.schedule)?;
        self.steps += 1;
        Some(event)
    }

    /// Publish every problem queued since the last flush.
    pub fn flush_problems(&mut self) -> RunResult<()> {
        let problems = self.world.resource_mut::<ProblemOutbox>().take();
        for problem in &problems {
            debug!(
                pending = problem.requests.len(),
                sim_ms = self.now(),
                "publishing problem"
            );
            self.sink.publish_problem(problem)?;
        }
        Ok(())
    }

    /// Evaluate one returned plan and settle the decision it owed.
    pub fn handle_plan(&mut self, plan: Plan) -> PlanDecision {
        let decision = self.world.resource_mut::<FleetState>().try_set_new_plan(plan);
        self.world
            .resource_mut::<TimeCoordinator>()
            .on_plan_evaluated();

        let now = self.now();
        self.world
            .resource_mut::<SimTelemetry>()
            .plan_decisions
            .push(PlanDecisionRecord {
                decided_at: now,
                accepted: decision.is_accepted(),
                cost: decision.candidate_cost(),
            });

        if decision.is_accepted() {
            self.world
                .resource_scope(|world, mut queue: Mut<DispatchQueue>| {
                    let mut clock = world.resource_mut::<SimulationClock>();
                    queue.signal(DispatchSignal::PlanAccepted, &mut clock);
                });
        }
        decision
    }

    fn drain_inbox(&mut self) {
        while !self.inbox_closed {
            match self.plans.try_recv() {
                Ok(Ok(plan)) => {
                    self.handle_plan(plan);
                }
                Ok(Err(fault)) => self.record_fault(fault),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.inbox_closed = true;
                    break;
                }
            }
        }
    }

    /// The feed is dead after a fault; nothing more is read from it.
    fn record_fault(&mut self, fault: ProtocolError) {
        error!(%fault, sim_ms = self.now(), "plan feed failed");
        self.inbox_closed = true;
        if self.fault.is_none() {
            self.fault = Some(fault);
        }
    }

    fn check_fault(&mut self) -> RunResult<()> {
        match self.fault.take() {
            Some(fault) => Err(RunError::Protocol(fault)),
            None => Ok(()),
        }
    }

    fn track_mode(&mut self) {
        let mode = self.mode();
        if mode != self.last_mode {
            debug!(?mode, sim_ms = self.now(), "time mode changed");
            self.pacer.reanchor(self.now());
            self.last_mode = mode;
        }
    }

    /// Wait until the wall-clock instant of `sim_ms`. Returns `true` if a plan
    /// arrived first; simulated time is then advanced to its arrival instant.
    fn pace_until(&mut self, sim_ms: u64) -> bool {
        let deadline = self.pacer.wall_deadline(sim_ms);
        loop {
            let now = Instant::now();
            if now >= deadline || self.inbox_closed {
                return false;
            }
            match self.plans.recv_timeout(deadline - now) {
                Ok(Ok(plan)) => {
                    let arrived = self.pacer.sim_at(Instant::now());
                    self.world
                        .resource_mut::<SimulationClock>()
                        .advance_to(arrived);
                    self.handle_plan(plan);
                    return true;
                }
                Ok(Err(fault)) => self.record_fault(fault),
                Err(RecvTimeoutError::Timeout) => return false,
                Err(RecvTimeoutError::Disconnected) => self.inbox_closed = true,
            }
        }
    }

    /// Block until the first plan is accepted, polling the inbox.
    fn await_first_plan(&mut self) -> RunResult<()> {
        let timeout = self.params.decision_timeout();
        let started = Instant::now();
        while !self.fleet().has_accepted_plan() {
            self.flush_problems()?;
            if self.world.resource::<TimeCoordinator>().outstanding() == 0 {
                // Every decision came back rejected; nothing else will arrive.
                return Err(RunError::NoFeasiblePlan);
            }
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                return Err(RunError::NoInitialPlan(timeout));
            }
            let slice = self.params.plan_poll_interval().min(timeout - elapsed);
            match self.plans.recv_timeout(slice) {
                Ok(Ok(plan)) => {
                    self.handle_plan(plan);
                }
                Ok(Err(fault)) => return Err(RunError::Protocol(fault)),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    self.inbox_closed = true;
                    return Err(RunError::OptimizerGone);
                }
            }
        }
        Ok(())
    }

    /// With nothing scheduled, wait for an outstanding decision that could
    /// still unblock pending requests. Returns `true` if a plan arrived.
    fn await_outstanding_decision(&mut self) -> bool {
        let outstanding = self.world.resource::<TimeCoordinator>().outstanding();
        if outstanding == 0 || !self.fleet().has_pending() || self.inbox_closed {
            return false;
        }

        debug!(outstanding, "event queue empty, waiting for optimizer");
        match self.plans.recv_timeout(self.params.decision_timeout()) {
            Ok(Ok(plan)) => {
                if self.mode() == TimeMode::Real {
                    let arrived = self.pacer.sim_at(Instant::now());
                    self.world
                        .resource_mut::<SimulationClock>()
                        .advance_to(arrived);
                }
                self.handle_plan(plan);
                true
            }
            Ok(Err(fault)) => {
                self.record_fault(fault);
                false
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(outstanding, "optimizer did not answer in time, ending run");
                false
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.inbox_closed = true;
                false
            }
        }
    }

    fn finish(mut self) -> RunResult<SimulationResult> {
        let result = SimulationResult::from_fleet(
            self.world.resource::<FleetState>(),
            self.world.resource::<InstanceName>().0.clone(),
        );
        let telemetry = self.world.resource::<SimTelemetry>();
        info!(
            instance = %result.instance,
            cost = result.cost,
            sim_ms = self.now(),
            steps = self.steps,
            accepted = telemetry.accepted_plans(),
            rejected = telemetry.rejected_plans(),
            "run finished"
        );
        self.sink.publish_result(&result)?;
        Ok(result)
    }

    /// Publish an infeasible result carrying the routes driven so far.
    fn abort(mut self, err: RunError) -> RunResult<SimulationResult> {
        let result = SimulationResult {
            plan: self.fleet().finalize_plan(),
            cost: INFEASIBLE_COST,
            instance: self.world.resource::<InstanceName>().0.clone(),
        };
        warn!(
            instance = %result.instance,
            sim_ms = self.now(),
            steps = self.steps,
            error = %err,
            "run aborted"
        );
        if let Err(publish_err) = self.sink.publish_result(&result) {
            error!(error = %publish_err, "could not publish the aborted run's result");
        }
        Err(err)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;
    use crate::optimizer::{loopback, GreedyConstruction};
    use crate::test_helpers::scenario_instance;

    #[derive(Default)]
    struct RecordingSink {
        problems: Vec<Problem>,
        results: Vec<SimulationResult>,
    }

    impl ProblemSink for RecordingSink {
        fn publish_problem(&mut self, problem: &Problem) -> RunResult<()> {
            self.problems.push(problem.clone());
            Ok(())
        }

        fn publish_result(&mut self, result: &SimulationResult) -> RunResult<()> {
            self.results.push(result.clone());
            Ok(())
        }
    }

    fn fast_params() -> SimulationParams {
        SimulationParams::default()
            .with_allow_fast_simulation(true)
            .with_plan_poll_interval_ms(5)
            .with_decision_timeout_ms(500)
    }

    #[test]
    fn loopback_run_serves_every_request() {
        let (mut sink, inbox) = loopback(GreedyConstruction);
        let run = SimulationRun::new(&scenario_instance(), fast_params(), &mut sink, inbox)
            .expect("run");
        let result = run.run().expect("result");

        assert!(result.is_feasible());
        assert_eq!(result.instance, "scenario");
        assert_eq!(result.plan.stop_count(), 3);
        assert_eq!(sink.results().len(), 1);
        assert_eq!(sink.results()[0], result);
    }

    #[test]
    fn plan_handling_settles_decisions_and_signals_dispatch() {
        let (_plans, inbox) = mpsc::channel();
        let mut run = SimulationRun::new(
            &scenario_instance(),
            fast_params(),
            RecordingSink::default(),
            inbox,
        )
        .expect("run");
        run.step().expect("start event");
        run.flush_problems().expect("flush");
        assert_eq!(run.sink.problems.len(), 1);
        assert_eq!(run.world.resource::<TimeCoordinator>().outstanding(), 1);

        let rejected = run.handle_plan(Plan::new(vec![vec![1, 2], vec![3]]));
        assert!(!rejected.is_accepted());
        assert_eq!(run.mode(), TimeMode::Virtual);

        let accepted = run.handle_plan(Plan::new(vec![vec![1, 3], vec![2]]));
        assert!(accepted.is_accepted());
        assert_eq!(run.world.resource::<DispatchQueue>().len(), 1);
        assert_eq!(run.telemetry().plan_decisions.len(), 2);
    }

    #[test]
    fn disconnected_optimizer_aborts_before_first_plan() {
        let (plans, inbox) = mpsc::channel::<PlanFeed>();
        drop(plans);
        let mut sink = RecordingSink::default();
        let run = SimulationRun::new(&scenario_instance(), fast_params(), &mut sink, inbox)
            .expect("run");
        assert!(matches!(run.run(), Err(RunError::OptimizerGone)));

        assert_eq!(sink.results.len(), 1);
        assert_eq!(sink.results[0].cost, INFEASIBLE_COST);
        assert_eq!(sink.results[0].plan, Plan::empty(2));
        assert_eq!(sink.results[0].instance, "scenario");
    }

    #[test]
    fn silent_optimizer_times_out() {
        let (_plans, inbox) = mpsc::channel::<PlanFeed>();
        let params = fast_params().with_decision_timeout_ms(30);
        let mut sink = RecordingSink::default();
        let run = SimulationRun::new(&scenario_instance(), params, &mut sink, inbox)
            .expect("run");
        let outcome = run.run();
        assert!(
            matches!(outcome, Err(RunError::NoInitialPlan(waited)) if waited == Duration::from_millis(30)),
            "{outcome:?}"
        );
        assert_eq!(sink.results.len(), 1);
        assert!(!sink.results[0].is_feasible());
    }

    #[test]
    fn rejected_plans_end_the_run_without_waiting() {
        let (mut sink, inbox) = loopback(|problem: &Problem| Plan::empty(problem.vehicle_count));
        let params = fast_params().with_decision_timeout_ms(60_000);
        let started = Instant::now();
        let outcome = SimulationRun::new(&scenario_instance(), params, &mut sink, inbox)
            .expect("run")
            .run();

        assert!(matches!(outcome, Err(RunError::NoFeasiblePlan)), "{outcome:?}");
        assert!(started.elapsed() < Duration::from_secs(30));
        assert_eq!(sink.results().len(), 1);
        assert_eq!(sink.results()[0].cost, INFEASIBLE_COST);
    }

    #[test]
    fn feed_fault_after_first_plan_aborts_the_run() {
        let (plans, inbox) = mpsc::channel::<PlanFeed>();
        let mut sink = RecordingSink::default();
        let mut run = SimulationRun::new(&scenario_instance(), fast_params(), &mut sink, inbox)
            .expect("run");
        run.step().expect("start event");
        run.flush_problems().expect("flush");
        assert!(run.handle_plan(Plan::new(vec![vec![1, 3], vec![2]])).is_accepted());
        for _ in 0..3 {
            run.step();
        }
        let driven = run.fleet().finalize_plan();

        plans
            .send(Err(ProtocolError::UnknownTopic("bogus".into())))
            .expect("inbox open");
        plans
            .send(Ok(Plan::new(vec![vec![3, 1], vec![2]])))
            .expect("inbox open");
        let outcome = run.run();

        assert!(
            matches!(outcome, Err(RunError::Protocol(ProtocolError::UnknownTopic(_)))),
            "{outcome:?}"
        );
        assert_eq!(sink.results.len(), 1);
        assert_eq!(sink.results[0].cost, INFEASIBLE_COST);
        assert_eq!(sink.results[0].plan, driven);
    }
}
