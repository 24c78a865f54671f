//! Parallel simulation execution using rayon.
//!
//! Every run owns its world, its optimizer and its plan inbox, so runs share
//! nothing and can be spread over a worker pool.

use std::time::Instant;

use fleet_core::optimizer::{loopback, GreedyConstruction};
use fleet_core::plan::Plan;
use fleet_core::result::{SimulationResult, INFEASIBLE_COST};
use fleet_core::session::SimulationRun;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

use crate::experiment::ExperimentRun;
use crate::ExperimentResult;

/// Outcome of one experiment run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: usize,
    pub repetition: usize,
    pub result: SimulationResult,
    /// Problems broadcast to the optimizer during the run.
    pub problems: usize,
    pub wall_ms: u64,
    /// Set when the run aborted before producing a result.
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn instance(&self) -> &str {
        &self.result.instance
    }
}

/// Run one experiment to completion against the in-process greedy optimizer.
///
/// A run that aborts is reported as an infeasible outcome carrying the error.
pub fn run_single(run: &ExperimentRun) -> RunOutcome {
    let started = Instant::now();
    let (mut sink, inbox) = loopback(GreedyConstruction);
    let outcome = SimulationRun::new(&run.instance, run.params.clone(), &mut sink, inbox)
        .and_then(SimulationRun::run);
    let wall_ms = started.elapsed().as_millis() as u64;

    let (result, error) = match outcome {
        Ok(result) => (result, None),
        Err(err) => {
            warn!(run_id = run.run_id, instance = %run.instance.name, error = %err, "run aborted");
            // Runs that never started publish nothing.
            let result = sink
                .results()
                .last()
                .cloned()
                .unwrap_or_else(|| SimulationResult {
                    plan: Plan::empty(run.instance.capacities().len()),
                    cost: INFEASIBLE_COST,
                    instance: run.instance.name.clone(),
                });
            (result, Some(err.to_string()))
        }
    };
    debug!(run_id = run.run_id, cost = result.cost, wall_ms, "run finished");

    RunOutcome {
        run_id: run.run_id,
        repetition: run.repetition,
        result,
        problems: sink.problems_seen(),
        wall_ms,
        error,
    }
}

/// Run experiments in parallel with a progress bar.
///
/// Outcomes are returned in the order of `runs`.
pub fn run_parallel_experiments(
    runs: Vec<ExperimentRun>,
    num_threads: Option<usize>,
) -> ExperimentResult<Vec<RunOutcome>> {
    run_parallel_experiments_with_progress(runs, num_threads, true)
}

/// Run experiments in parallel with an optional progress bar.
///
/// `num_threads` of `None` uses rayon's default pool size.
pub fn run_parallel_experiments_with_progress(
    runs: Vec<ExperimentRun>,
    num_threads: Option<usize>,
    show_progress: bool,
) -> ExperimentResult<Vec<RunOutcome>> {
    let total = runs.len();
    let pb = if show_progress && total > 0 {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        {
            bar.set_style(style.progress_chars("#>-"));
        }
        Some(bar)
    } else {
        None
    };

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(threads) = num_threads {
        builder = builder.num_threads(threads);
    }
    let pool = builder.build()?;

    let pb_clone = pb.clone();
    let outcomes = pool.install(|| {
        runs.par_iter()
            .map(|run| {
                let outcome = run_single(run);
                if let Some(ref progress_bar) = pb_clone {
                    progress_bar.inc(1);
                }
                outcome
            })
            .collect()
    });

    if let Some(ref progress_bar) = pb {
        progress_bar.finish_with_message("Completed");
    }

    Ok(outcomes)
}
