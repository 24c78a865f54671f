//! Per-instance aggregation of run outcomes.

use std::collections::HashMap;

use fleet_core::result::INFEASIBLE_COST;
use serde::Serialize;

use crate::runner::RunOutcome;

/// Best, worst and average cost over the runs of one instance.
///
/// Runs with a negative cost are counted as invalid and left out of the
/// cost statistics. Costs stay at [`INFEASIBLE_COST`] while no run is valid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub instance: String,
    pub best: f64,
    pub worst: f64,
    pub average: f64,
    pub invalid: usize,
    pub iterations: usize,
}

impl Report {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            best: INFEASIBLE_COST,
            worst: INFEASIBLE_COST,
            average: INFEASIBLE_COST,
            invalid: 0,
            iterations: 0,
        }
    }

    pub fn from_costs(instance: impl Into<String>, costs: impl IntoIterator<Item = f64>) -> Self {
        let mut report = Self::new(instance);
        let mut sum = 0.0;
        for cost in costs {
            report.iterations += 1;
            if cost < 0.0 {
                report.invalid += 1;
                continue;
            }
            sum += cost;
            if report.best < 0.0 || cost < report.best {
                report.best = cost;
            }
            if cost > report.worst {
                report.worst = cost;
            }
        }
        let valid = report.valid();
        if valid > 0 {
            report.average = sum / valid as f64;
        }
        report
    }

    pub fn valid(&self) -> usize {
        self.iterations - self.invalid
    }
}

/// One report per instance name, in order of first appearance.
pub fn build_reports(outcomes: &[RunOutcome]) -> Vec<Report> {
    let mut order: Vec<&str> = Vec::new();
    let mut costs: HashMap<&str, Vec<f64>> = HashMap::new();
    for outcome in outcomes {
        let name = outcome.instance();
        costs
            .entry(name)
            .or_insert_with(|| {
                order.push(name);
                Vec::new()
            })
            .push(outcome.result.cost);
    }

    order
        .into_iter()
        .map(|name| Report::from_costs(name, costs.remove(name).unwrap_or_default()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::plan::Plan;
    use fleet_core::result::SimulationResult;

    fn outcome(run_id: usize, instance: &str, cost: f64) -> RunOutcome {
        RunOutcome {
            run_id,
            repetition: 0,
            result: SimulationResult {
                plan: Plan::empty(1),
                cost,
                instance: instance.into(),
            },
            problems: 1,
            wall_ms: 0,
            error: None,
        }
    }

    #[test]
    fn invalid_costs_are_counted_but_not_averaged() {
        let report = Report::from_costs("c101", [40.0, -1.0, 20.0, 30.0]);
        assert_eq!(report.iterations, 4);
        assert_eq!(report.invalid, 1);
        assert_eq!(report.valid(), 3);
        assert_eq!(report.best, 20.0);
        assert_eq!(report.worst, 40.0);
        assert!((report.average - 30.0).abs() < 1e-9);
    }

    #[test]
    fn all_invalid_keeps_infeasible_statistics() {
        let report = Report::from_costs("c101", [-1.0, -1.0]);
        assert_eq!(report.iterations, 2);
        assert_eq!(report.invalid, 2);
        assert_eq!(report.best, INFEASIBLE_COST);
        assert_eq!(report.worst, INFEASIBLE_COST);
        assert_eq!(report.average, INFEASIBLE_COST);
    }

    #[test]
    fn zero_cost_runs_are_valid() {
        let report = Report::from_costs("empty", [0.0]);
        assert_eq!(report.invalid, 0);
        assert_eq!(report.best, 0.0);
        assert_eq!(report.average, 0.0);
    }

    #[test]
    fn reports_group_by_instance_in_first_seen_order() {
        let outcomes = vec![
            outcome(0, "b", 10.0),
            outcome(1, "a", 5.0),
            outcome(2, "b", 14.0),
            outcome(3, "a", -1.0),
        ];
        let reports = build_reports(&outcomes);

        assert_eq!(reports.len(), 2);
        assert_eq!(reports[0].instance, "b");
        assert_eq!(reports[0].iterations, 2);
        assert!((reports[0].average - 12.0).abs() < 1e-9);
        assert_eq!(reports[1].instance, "a");
        assert_eq!(reports[1].invalid, 1);
        assert_eq!(reports[1].best, 5.0);
    }
}
