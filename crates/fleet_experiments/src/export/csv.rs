use fleet_core::plan::Plan;

use crate::report::Report;
use crate::runner::RunOutcome;
use crate::ExperimentResult;

/// Routes separated by `|`, stops by spaces.
fn format_plan(plan: &Plan) -> String {
    plan.routes
        .iter()
        .map(|route| {
            route
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect::<Vec<_>>()
        .join("|")
}

pub(crate) fn export_outcomes_impl(
    outcomes: &[RunOutcome],
    file: std::fs::File,
) -> ExperimentResult<()> {
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record([
        "run_id",
        "repetition",
        "instance",
        "cost",
        "feasible",
        "problems",
        "wall_ms",
        "plan",
        "error",
    ])?;

    for outcome in outcomes {
        wtr.write_record([
            outcome.run_id.to_string(),
            outcome.repetition.to_string(),
            outcome.instance().to_string(),
            outcome.result.cost.to_string(),
            outcome.result.is_feasible().to_string(),
            outcome.problems.to_string(),
            outcome.wall_ms.to_string(),
            format_plan(&outcome.result.plan),
            outcome.error.clone().unwrap_or_default(),
        ])?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub(crate) fn export_reports_impl(reports: &[Report], file: std::fs::File) -> ExperimentResult<()> {
    let mut wtr = csv::Writer::from_writer(file);

    wtr.write_record(["instance", "best", "worst", "average", "invalid", "iterations"])?;

    for report in reports {
        wtr.write_record([
            report.instance.clone(),
            report.best.to_string(),
            report.worst.to_string(),
            report.average.to_string(),
            report.invalid.to_string(),
            report.iterations.to_string(),
        ])?;
    }

    wtr.flush().map_err(csv::Error::from)?;
    Ok(())
}
