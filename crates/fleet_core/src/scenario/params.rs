use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default wait between checks while no plan has been accepted yet.
const DEFAULT_PLAN_POLL_INTERVAL_MS: u64 = 100;

/// Default time to wait for an outstanding optimizer decision before giving up.
const DEFAULT_DECISION_TIMEOUT_MS: u64 = 30_000;

const DEFAULT_MAX_STEPS: usize = 1_000_000;

/// Per-run simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationParams {
    /// Drop to virtual time whenever no decision is outstanding.
    pub allow_fast_simulation: bool,
    /// Overrides the instance's service time (seconds).
    pub service_time_secs: Option<f64>,
    /// Overrides the instance's speed (seconds per distance unit).
    pub speed: Option<f64>,
    /// Simulated ms per wall-clock ms while in real time.
    pub real_time_scale: f64,
    pub plan_poll_interval_ms: u64,
    pub decision_timeout_ms: u64,
    /// Upper bound on processed events; guards against runaway runs.
    pub max_steps: usize,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            allow_fast_simulation: false,
            service_time_secs: None,
            speed: None,
            real_time_scale: 1.0,
            plan_poll_interval_ms: DEFAULT_PLAN_POLL_INTERVAL_MS,
            decision_timeout_ms: DEFAULT_DECISION_TIMEOUT_MS,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

impl SimulationParams {
    pub fn with_allow_fast_simulation(mut self, allow: bool) -> Self {
        self.allow_fast_simulation = allow;
        self
    }

    pub fn with_service_time_secs(mut self, secs: f64) -> Self {
        self.service_time_secs = Some(secs);
        self
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_real_time_scale(mut self, scale: f64) -> Self {
        self.real_time_scale = scale;
        self
    }

    pub fn with_plan_poll_interval_ms(mut self, ms: u64) -> Self {
        self.plan_poll_interval_ms = ms;
        self
    }

    pub fn with_decision_timeout_ms(mut self, ms: u64) -> Self {
        self.decision_timeout_ms = ms;
        self
    }

    pub fn with_max_steps(mut self, steps: usize) -> Self {
        self.max_steps = steps;
        self
    }

    pub fn plan_poll_interval(&self) -> Duration {
        Duration::from_millis(self.plan_poll_interval_ms.max(1))
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}
