//! Long-lived simulation service on the bus.
//!
//! Waits for `start` messages and runs one simulation per message, strictly
//! one after another. Each run gets its own plan inbox so plans meant for a
//! finished run never leak into the next one.

use std::sync::mpsc::{self, Receiver};
use std::thread::JoinHandle;

use tracing::{error, info};

use crate::bus::{spawn_simulation_listener, Bus, BusConfig, BusProblemSink, PlanRouter};
use crate::result::SimulationResult;
use crate::scenario::SimulationParams;
use crate::session::{RunError, RunResult, SimulationRun};
use crate::wire::{ProtocolError, StartSimulation, Topic};

pub struct SimulationService {
    params: SimulationParams,
    sink: BusProblemSink,
    router: PlanRouter,
    starts: Receiver<StartSimulation>,
    listener: Option<JoinHandle<Result<(), ProtocolError>>>,
    completed: usize,
}

impl SimulationService {
    /// Subscribe to the bus and start listening for start requests.
    ///
    /// `params` is the template for every run; each start message overrides
    /// `allow_fast_simulation`.
    pub fn start(bus: &Bus, params: SimulationParams, config: BusConfig) -> Self {
        let subscriber = bus
            .to_simulation
            .subscribe(&[Topic::Solution, Topic::Start]);
        let publisher = bus.to_optimizer.publisher(config.settle_delay());
        let router = PlanRouter::default();
        let (start_tx, starts) = mpsc::channel();
        let listener = spawn_simulation_listener(subscriber, router.clone(), start_tx);

        Self {
            params,
            sink: BusProblemSink::new(publisher),
            router,
            starts,
            listener: Some(listener),
            completed: 0,
        }
    }

    pub fn completed_runs(&self) -> usize {
        self.completed
    }

    /// Wait for the next start request and run it. `Ok(None)` once the bus is closed.
    pub fn run_next(&mut self) -> RunResult<Option<SimulationResult>> {
        let Ok(start) = self.starts.recv() else {
            return Ok(None);
        };
        self.run(start).map(Some)
    }

    /// Run start requests until the bus closes. A failed run is logged and
    /// does not stop the service; a protocol fault does.
    pub fn serve(mut self) -> RunResult<usize> {
        loop {
            match self.run_next() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(err) => error!(%err, "simulation run failed"),
            }
        }
        let completed = self.completed;
        self.shutdown()?;
        Ok(completed)
    }

    /// Wait for the listener thread and surface the fault that stopped it, if any.
    /// Blocks until the optimizer side of the bus is dropped.
    pub fn shutdown(mut self) -> RunResult<()> {
        let Some(listener) = self.listener.take() else {
            return Ok(());
        };
        drop(self.starts);
        match listener.join() {
            Ok(outcome) => outcome.map_err(RunError::from),
            Err(_) => {
                error!("simulation listener panicked");
                Ok(())
            }
        }
    }

    fn run(&mut self, start: StartSimulation) -> RunResult<SimulationResult> {
        let params = self
            .params
            .clone()
            .with_allow_fast_simulation(start.allow_fast_simulation);
        info!(
            instance = %start.instance.name,
            requests = start.instance.request_count(),
            fast = params.allow_fast_simulation,
            "start request received"
        );

        let inbox = self.router.subscribe();
        let outcome = SimulationRun::new(&start.instance, params, &mut self.sink, inbox)
            .and_then(SimulationRun::run);
        self.router.unsubscribe();

        if outcome.is_ok() {
            self.completed += 1;
        }
        outcome
    }
}
