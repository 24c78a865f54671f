//! Result export utilities.
//!
//! Outcomes and reports can be written as pretty JSON; CSV output flattens
//! each outcome to one row and each report to one row.

use std::path::Path;

use serde::Serialize;

use crate::report::Report;
use crate::runner::RunOutcome;
use crate::ExperimentResult;

#[path = "export/csv.rs"]
mod csv;
#[path = "export/json.rs"]
mod json;
#[path = "export/writer_utils.rs"]
mod writer_utils;

/// Export any serializable slice (outcomes or reports) to a JSON array.
///
/// # Errors
///
/// Returns an error if file creation or JSON serialization fails.
pub fn export_to_json<T: Serialize>(items: &[T], path: impl AsRef<Path>) -> ExperimentResult<()> {
    let file = writer_utils::create_output_file(path)?;
    json::export_to_json_impl(items, file)
}

/// Export run outcomes to CSV, one row per run.
///
/// # Errors
///
/// Returns an error if `outcomes` is empty or file creation or CSV writing fails.
pub fn export_outcomes_to_csv(
    outcomes: &[RunOutcome],
    path: impl AsRef<Path>,
) -> ExperimentResult<()> {
    writer_utils::ensure_not_empty(outcomes)?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_outcomes_impl(outcomes, file)
}

/// Export per-instance reports to CSV, one row per instance.
///
/// # Errors
///
/// Returns an error if `reports` is empty or file creation or CSV writing fails.
pub fn export_reports_to_csv(reports: &[Report], path: impl AsRef<Path>) -> ExperimentResult<()> {
    writer_utils::ensure_not_empty(reports)?;
    let file = writer_utils::create_output_file(path)?;
    csv::export_reports_impl(reports, file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::build_reports;
    use crate::ExperimentError;
    use fleet_core::plan::Plan;
    use fleet_core::result::SimulationResult;
    use tempfile::{tempdir, NamedTempFile};

    fn outcomes() -> Vec<RunOutcome> {
        vec![
            RunOutcome {
                run_id: 0,
                repetition: 0,
                result: SimulationResult {
                    plan: Plan::new(vec![vec![1, 3], vec![2]]),
                    cost: 32.0,
                    instance: "scenario".into(),
                },
                problems: 3,
                wall_ms: 4,
                error: None,
            },
            RunOutcome {
                run_id: 1,
                repetition: 1,
                result: SimulationResult {
                    plan: Plan::empty(2),
                    cost: -1.0,
                    instance: "scenario".into(),
                },
                problems: 1,
                wall_ms: 2,
                error: Some("no plan accepted".into()),
            },
        ]
    }

    #[test]
    fn test_export_outcomes_to_json() {
        let file = NamedTempFile::new().unwrap();
        export_to_json(&outcomes(), file.path()).unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        let rows = value.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["result"]["cost"], 32.0);
        assert_eq!(rows[1]["error"], "no plan accepted");
    }

    #[test]
    fn test_export_outcomes_to_csv() {
        let file = NamedTempFile::new().unwrap();
        export_outcomes_to_csv(&outcomes(), file.path()).unwrap();

        let mut reader = ::csv::Reader::from_path(file.path()).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "run_id");
        let rows: Vec<_> = reader.records().map(|row| row.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][2], "scenario");
        assert_eq!(&rows[0][7], "1 3|2");
        assert_eq!(&rows[1][8], "no plan accepted");
    }

    #[test]
    fn test_export_reports_to_csv() {
        let reports = build_reports(&outcomes());
        let dir = tempdir().unwrap();
        let path = dir.path().join("reports.csv");
        export_reports_to_csv(&reports, &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next(),
            Some("instance,best,worst,average,invalid,iterations")
        );
        assert_eq!(lines.next(), Some("scenario,32,32,32,1,2"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_empty_csv_export_is_rejected() {
        let dir = tempdir().unwrap();
        let outcome = export_reports_to_csv(&[], dir.path().join("reports.csv"));
        assert!(matches!(outcome, Err(ExperimentError::Empty)));
    }
}
