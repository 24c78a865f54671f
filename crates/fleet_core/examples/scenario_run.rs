//! Run a grid instance and its dynamism variants against the greedy optimizer.
//!
//! Run with: cargo run -p fleet_core --example scenario_run --release

use std::time::Instant;

use fleet_core::clock::ONE_SEC_MS;
use fleet_core::optimizer::{loopback, GreedyConstruction};
use fleet_core::scenario::SimulationParams;
use fleet_core::session::SimulationRun;
use fleet_core::test_helpers::grid_instance;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn main() {
    const NUM_REQUESTS: usize = 100;
    const NUM_VEHICLES: usize = 8;
    const CAPACITY: u32 = 20;

    let base = grid_instance(NUM_REQUESTS, NUM_VEHICLES, CAPACITY);
    let mut rng = StdRng::seed_from_u64(123);
    let mut instances = vec![base.clone()];
    instances.extend(base.dynamism_variants(&mut rng).expect("grid variants are valid"));

    let params = SimulationParams::default()
        .with_allow_fast_simulation(true)
        .with_plan_poll_interval_ms(5);

    println!(
        "--- Scenario run ({} requests, {} vehicles of capacity {}, seed 123) ---",
        NUM_REQUESTS, NUM_VEHICLES, CAPACITY
    );
    for instance in &instances {
        let (mut sink, inbox) = loopback(GreedyConstruction);
        let run = SimulationRun::new(instance, params.clone(), &mut sink, inbox)
            .expect("instance should build");

        let started = Instant::now();
        match run.run() {
            Ok(result) => println!(
                "{:<24} cost {:>9.1}  stops {:>4}  problems {:>4}  wall {:>6.1} ms",
                instance.name,
                result.cost,
                result.plan.stop_count(),
                sink.problems_seen(),
                started.elapsed().as_secs_f64() * 1000.0,
            ),
            Err(err) => println!("{:<24} aborted: {err}", instance.name),
        }
    }

    let dynamic = instances.last().expect("at least the base instance");
    let latest = dynamic.available.iter().max().copied().unwrap_or(0);
    println!(
        "\nLatest arrival in {}: {} s ({} ms simulated)",
        dynamic.name,
        latest,
        latest.max(0) as u64 * ONE_SEC_MS
    );
}
