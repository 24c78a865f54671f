//! Expansion of an experiment into individual runs.

use fleet_core::instance::ProblemInstance;
use fleet_core::scenario::SimulationParams;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::ExperimentResult;

/// Instances to simulate, how often, and with which parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub instances: Vec<ProblemInstance>,
    pub repetitions: usize,
    pub params: SimulationParams,
}

impl ExperimentSpec {
    /// One repetition per instance, fast simulation enabled.
    pub fn new(instances: Vec<ProblemInstance>) -> Self {
        Self {
            instances,
            repetitions: 1,
            params: SimulationParams::default().with_allow_fast_simulation(true),
        }
    }

    pub fn with_repetitions(mut self, repetitions: usize) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_params(mut self, params: SimulationParams) -> Self {
        self.params = params;
        self
    }

    /// Follows every instance with its six standard dynamism variants.
    pub fn with_dynamism_variants<R: Rng + ?Sized>(mut self, rng: &mut R) -> ExperimentResult<Self> {
        let mut expanded = Vec::with_capacity(self.instances.len() * 7);
        for instance in self.instances {
            let variants = instance.dynamism_variants(rng)?;
            expanded.push(instance);
            expanded.extend(variants);
        }
        self.instances = expanded;
        Ok(self)
    }

    /// Individual runs, instance-major, with sequential run ids.
    pub fn runs(&self) -> Vec<ExperimentRun> {
        self.instances
            .iter()
            .flat_map(|instance| (0..self.repetitions).map(move |repetition| (instance, repetition)))
            .enumerate()
            .map(|(run_id, (instance, repetition))| ExperimentRun {
                run_id,
                repetition,
                instance: instance.clone(),
                params: self.params.clone(),
            })
            .collect()
    }
}

/// A single simulation run of an experiment.
#[derive(Debug, Clone)]
pub struct ExperimentRun {
    pub run_id: usize,
    pub repetition: usize,
    pub instance: ProblemInstance,
    pub params: SimulationParams,
}

#[cfg(test)]
mod tests {
    use super::*;
    use fleet_core::test_helpers::{grid_instance, scenario_instance};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn runs_are_instance_major_with_sequential_ids() {
        let spec = ExperimentSpec::new(vec![scenario_instance(), grid_instance(6, 2, 5)])
            .with_repetitions(3);
        let runs = spec.runs();

        assert_eq!(runs.len(), 6);
        assert_eq!(
            runs.iter().map(|run| run.run_id).collect::<Vec<_>>(),
            vec![0, 1, 2, 3, 4, 5]
        );
        assert_eq!(runs[2].instance.name, "scenario");
        assert_eq!(runs[2].repetition, 2);
        assert_eq!(runs[3].instance.name, grid_instance(6, 2, 5).name);
        assert_eq!(runs[3].repetition, 0);
        assert!(runs.iter().all(|run| run.params.allow_fast_simulation));
    }

    #[test]
    fn zero_repetitions_yield_no_runs() {
        let spec = ExperimentSpec::new(vec![scenario_instance()]).with_repetitions(0);
        assert!(spec.runs().is_empty());
    }

    #[test]
    fn variants_follow_their_base_instance() {
        let mut rng = StdRng::seed_from_u64(7);
        let spec = ExperimentSpec::new(vec![grid_instance(20, 2, 50)])
            .with_dynamism_variants(&mut rng)
            .expect("variants");

        assert_eq!(spec.instances.len(), 7);
        let base = &spec.instances[0].name;
        for variant in &spec.instances[1..] {
            assert!(variant.name.starts_with(base.as_str()));
            assert_ne!(&variant.name, base);
        }
    }
}
