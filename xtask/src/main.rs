use std::process::{exit, Command, ExitStatus};

use clap::{Parser, Subcommand, ValueEnum};

// ── CLI definition ─────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "xtask",
    about = "Task runner for the fleet simulation workspace",
    long_about = "A unified CLI for running demo scenarios, experiments, benchmarks,\n\
                  and CI checks in the fleet simulation workspace."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the grid scenario and its dynamism variants
    Run,
    /// Serve two start requests over the in-process bus
    Serve,
    /// Run an experiment through the fleet-sim CLI
    Experiment {
        /// Arguments passed to `fleet-sim run`
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
    /// Run Criterion benchmarks
    Bench,
    /// Run CI checks (fmt, clippy, tests, examples, benchmarks)
    Ci {
        /// Job to run
        #[arg(value_enum, default_value_t = CiJob::Check)]
        job: CiJob,
    },
    /// Run load tests (ignored tests in fleet_core)
    LoadTest,
}

#[derive(Clone, ValueEnum)]
enum CiJob {
    /// Formatting, clippy, and tests
    Check,
    /// Build and run example scenarios
    Examples,
    /// Run benchmarks
    Bench,
    /// Run check + examples + bench
    All,
}

// ── helpers ────────────────────────────────────────────────────────

fn step(label: &str) {
    eprintln!("\n=== {label} ===");
}

fn cargo(args: &[&str]) -> ExitStatus {
    eprintln!("+ cargo {}", args.join(" "));
    match Command::new("cargo").args(args).status() {
        Ok(status) => status,
        Err(error) => {
            eprintln!("failed to execute cargo: {error}");
            exit(1);
        }
    }
}

fn run_cargo(args: &[&str]) {
    let status = cargo(args);
    if !status.success() {
        exit(status.code().unwrap_or(1));
    }
}

fn run_example(name: &str) {
    run_cargo(&["run", "-p", "fleet_core", "--example", name, "--release"]);
}

// ── CI jobs ────────────────────────────────────────────────────────

fn ci_check() {
    step("Check formatting");
    run_cargo(&["fmt", "--all", "--", "--check"]);

    step("Clippy");
    run_cargo(&[
        "clippy",
        "--all-targets",
        "--all-features",
        "--",
        "-D",
        "warnings",
    ]);

    step("Test fleet_core");
    run_cargo(&["test", "-p", "fleet_core"]);

    step("Test fleet_experiments");
    run_cargo(&["test", "-p", "fleet_experiments"]);
}

fn ci_examples() {
    step("Run scenario_run (grid instance and dynamism variants)");
    run_example("scenario_run");

    step("Run bus_service (two runs over the in-process bus)");
    run_example("bus_service");
}

fn ci_bench() {
    step("Run benchmarks");
    run_cargo(&["bench", "--package", "fleet_core", "--bench", "performance"]);
}

// ── main ───────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => run_example("scenario_run"),
        Commands::Serve => run_example("bus_service"),
        Commands::Experiment { args } => {
            let mut cargo_args = vec![
                "run",
                "-p",
                "fleet_experiments",
                "--bin",
                "fleet-sim",
                "--release",
                "--",
                "run",
            ];
            cargo_args.extend(args.iter().map(String::as_str));
            run_cargo(&cargo_args);
        }
        Commands::Bench => {
            run_cargo(&["bench", "--package", "fleet_core", "--bench", "performance"]);
        }
        Commands::Ci { job } => {
            match job {
                CiJob::Check => ci_check(),
                CiJob::Examples => ci_examples(),
                CiJob::Bench => ci_bench(),
                CiJob::All => {
                    ci_check();
                    ci_examples();
                    ci_bench();
                }
            }
            eprintln!("\nCI job passed.");
        }
        Commands::LoadTest => {
            run_cargo(&[
                "test",
                "-p",
                "fleet_core",
                "--test",
                "load_tests",
                "--",
                "--ignored",
            ]);
        }
    }
}
