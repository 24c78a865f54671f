//! Batch experimentation for the dynamic fleet simulation.
//!
//! This crate runs problem instances (and generated dynamism variants of them)
//! many times in parallel against the in-process greedy optimizer, aggregates
//! the outcomes into per-instance reports and exports them to JSON or CSV.
//!
//! # Quick Start
//!
//! ```no_run
//! use fleet_core::instance::ProblemInstance;
//! use fleet_experiments::{build_reports, run_parallel_experiments, ExperimentSpec};
//!
//! let instance = ProblemInstance::load("instances/c101.json").unwrap();
//! let runs = ExperimentSpec::new(vec![instance]).with_repetitions(5).runs();
//!
//! let outcomes = run_parallel_experiments(runs, None).unwrap();
//! for report in build_reports(&outcomes) {
//!     println!("{}: best {:.1}", report.instance, report.best);
//! }
//! ```
//!
//! # Architecture
//!
//! - [`experiment`]: expansion of instances and repetitions into individual runs
//! - [`runner`]: parallel run execution using rayon
//! - [`report`]: best/worst/average aggregation per instance
//! - [`export`]: result export to JSON/CSV

use std::path::PathBuf;

use thiserror::Error;

pub mod experiment;
pub mod export;
pub mod report;
pub mod runner;

pub use experiment::{ExperimentRun, ExperimentSpec};
pub use export::{export_outcomes_to_csv, export_reports_to_csv, export_to_json};
pub use report::{build_reports, Report};
pub use runner::{run_parallel_experiments, run_single, RunOutcome};

#[derive(Debug, Error)]
pub enum ExperimentError {
    #[error("no results to export")]
    Empty,

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Instance(#[from] fleet_core::instance::InstanceError),

    #[error("failed to build the worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type ExperimentResult<T> = Result<T, ExperimentError>;
