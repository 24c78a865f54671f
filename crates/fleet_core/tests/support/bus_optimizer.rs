#![allow(dead_code)]

use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fleet_core::bus::{Bus, BusError};
use fleet_core::optimizer::{GreedyConstruction, Optimizer};
use fleet_core::result::SimulationResult;
use fleet_core::wire::{Message, Topic};

/// Upper bound on how long a test optimizer waits for the next message.
const IDLE_LIMIT: Duration = Duration::from_secs(10);

/// An optimizer living on the far side of the bus.
pub struct BusOptimizer {
    pub handle: JoinHandle<usize>,
    /// Every `simresult` the optimizer received, in order.
    pub results: Receiver<SimulationResult>,
}

/// Spawn a greedy optimizer that answers every problem on the bus and stops
/// after it has seen `runs` results. The thread returns the number of
/// problems it answered.
pub fn spawn_bus_optimizer(bus: &Bus, runs: usize) -> BusOptimizer {
    let subscriber = bus
        .to_optimizer
        .subscribe(&[Topic::Problem, Topic::SimResult]);
    let mut publisher = bus.to_simulation.publisher(Duration::ZERO);
    let (result_tx, results) = mpsc::channel();

    let handle = thread::spawn(move || {
        let mut optimizer = GreedyConstruction;
        let mut answered = 0;
        let mut seen = 0;
        while seen < runs {
            match subscriber.recv_timeout(IDLE_LIMIT) {
                Ok(Message::Problem(problem)) => {
                    let plan = optimizer.solve(&problem);
                    if publisher.publish(&Message::Solution(plan)).is_err() {
                        break;
                    }
                    answered += 1;
                }
                Ok(Message::SimResult(result)) => {
                    seen += 1;
                    let _ = result_tx.send(result);
                }
                Ok(_) => {}
                Err(BusError::Timeout | BusError::Closed | BusError::Protocol(_)) => break,
            }
        }
        answered
    });

    BusOptimizer { handle, results }
}
