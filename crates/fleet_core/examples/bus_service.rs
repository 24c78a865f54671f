//! Serve start requests over the in-process bus with a greedy optimizer thread.
//!
//! Run with: cargo run -p fleet_core --example bus_service

use std::thread;
use std::time::Duration;

use fleet_core::bus::{Bus, BusConfig, BusError};
use fleet_core::optimizer::{GreedyConstruction, Optimizer};
use fleet_core::scenario::SimulationParams;
use fleet_core::service::SimulationService;
use fleet_core::test_helpers::{dynamic_scenario_instance, scenario_instance};
use fleet_core::wire::{Message, StartSimulation, Topic};

fn main() {
    let bus = Bus::new();
    let params = SimulationParams::default()
        .with_real_time_scale(100.0)
        .with_plan_poll_interval_ms(10);
    let mut service = SimulationService::start(&bus, params, BusConfig::default().with_settle_delay_ms(50));

    let requests = bus.to_optimizer.subscribe(&[Topic::Problem, Topic::SimResult]);
    let mut answers = bus.to_simulation.publisher(Duration::ZERO);
    let optimizer = thread::spawn(move || {
        let mut greedy = GreedyConstruction;
        let mut results = Vec::new();
        loop {
            match requests.recv_timeout(Duration::from_secs(5)) {
                Ok(Message::Problem(problem)) => {
                    if answers.publish(&Message::Solution(greedy.solve(&problem))).is_err() {
                        break;
                    }
                }
                Ok(Message::SimResult(result)) => {
                    results.push(result);
                    if results.len() == 2 {
                        break;
                    }
                }
                Ok(_) => {}
                Err(BusError::Timeout | BusError::Closed | BusError::Protocol(_)) => break,
            }
        }
        results
    });

    let mut control = bus.to_simulation.publisher(Duration::ZERO);
    for instance in [scenario_instance(), dynamic_scenario_instance(5)] {
        control
            .publish(&Message::Start(StartSimulation {
                allow_fast_simulation: true,
                instance,
            }))
            .expect("service is subscribed");
        match service.run_next() {
            Ok(Some(result)) => println!("{}: cost {:.1}\n{}", result.instance, result.cost, result.plan),
            Ok(None) => break,
            Err(err) => println!("run failed: {err}"),
        }
        // Let the optimizer catch up before the next start request.
        thread::sleep(Duration::from_millis(100));
    }

    let seen = optimizer.join().expect("optimizer thread");
    println!("optimizer saw {} results", seen.len());
    drop(control);
    drop(bus);
    if let Err(err) = service.shutdown() {
        println!("shutdown: {err}");
    }
}
