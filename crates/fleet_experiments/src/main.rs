use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use fleet_core::instance::ProblemInstance;
use fleet_core::scenario::SimulationParams;
use fleet_experiments::runner::run_parallel_experiments_with_progress;
use fleet_experiments::{
    build_reports, export_outcomes_to_csv, export_reports_to_csv, export_to_json, ExperimentSpec,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{info, warn};

mod file_utils;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate instances against the greedy optimizer and report costs
    Run {
        /// Instance files or folders of instance files
        #[arg(required = true)]
        instances: Vec<PathBuf>,

        /// Runs per instance
        #[arg(short, long, default_value_t = 1)]
        repetitions: usize,

        /// Also run the six dynamism variants of every instance
        #[arg(long)]
        variants: bool,

        /// Seed for variant generation
        #[arg(long, default_value_t = 0)]
        seed: u64,

        /// Worker threads (default: one per core)
        #[arg(short, long, env = "FLEET_SIM_THREADS")]
        threads: Option<usize>,

        /// JSON file with simulation parameters
        #[arg(long)]
        params: Option<PathBuf>,

        /// Pace every run by the wall clock instead of skipping idle time
        #[arg(long)]
        real_time: bool,

        /// Write every run outcome as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Write every run outcome as CSV
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Write the per-instance reports as CSV
        #[arg(long)]
        report_csv: Option<PathBuf>,

        #[arg(long)]
        no_progress: bool,
    },
    /// Write the dynamism variants of an instance
    #[command(visible_alias = "v")]
    Variants {
        instance: PathBuf,

        /// Output folder for the variant files
        #[arg(long, short = 'o')]
        out: PathBuf,

        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.debug {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    match cli.command {
        Some(Commands::Run {
            instances,
            repetitions,
            variants,
            seed,
            threads,
            params,
            real_time,
            json,
            csv,
            report_csv,
            no_progress,
        }) => {
            let mut loaded = Vec::new();
            for path in &instances {
                for file in file_utils::collect_instance_files(path)
                    .with_context(|| format!("reading {}", path.display()))?
                {
                    loaded.push(ProblemInstance::load(&file)?);
                }
            }
            if loaded.is_empty() {
                warn!("no instance files found");
                return Ok(());
            }

            let mut spec = ExperimentSpec::new(loaded).with_repetitions(repetitions);
            if let Some(path) = params {
                let text = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let params: SimulationParams = serde_json::from_str(&text)?;
                spec = spec.with_params(params);
            }
            if real_time {
                spec.params.allow_fast_simulation = false;
            }
            if variants {
                spec = spec.with_dynamism_variants(&mut StdRng::seed_from_u64(seed))?;
            }

            let runs = spec.runs();
            info!(runs = runs.len(), instances = spec.instances.len(), "starting experiment");
            let outcomes = run_parallel_experiments_with_progress(runs, threads, !no_progress)?;
            let reports = build_reports(&outcomes);
            for report in &reports {
                info!(
                    instance = %report.instance,
                    best = report.best,
                    worst = report.worst,
                    average = report.average,
                    invalid = report.invalid,
                    iterations = report.iterations,
                    "report"
                );
            }

            if let Some(path) = json {
                export_to_json(&outcomes, &path)?;
                info!(path = %path.display(), "wrote outcomes");
            }
            if let Some(path) = csv {
                export_outcomes_to_csv(&outcomes, &path)?;
                info!(path = %path.display(), "wrote outcomes");
            }
            if let Some(path) = report_csv {
                export_reports_to_csv(&reports, &path)?;
                info!(path = %path.display(), "wrote reports");
            }
        }
        Some(Commands::Variants { instance, out, seed }) => {
            let base = ProblemInstance::load(&instance)?;
            let variants = base.dynamism_variants(&mut StdRng::seed_from_u64(seed))?;
            std::fs::create_dir_all(&out)?;
            for variant in &variants {
                let path = out.join(format!("{}.json", variant.name));
                variant.save(&path)?;
                info!(path = %path.display(), "wrote variant");
            }
        }
        None => {}
    }

    Ok(())
}
