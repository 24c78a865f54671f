//! Real/virtual time coordination.
//!
//! While a problem broadcast is unanswered the simulation runs in real time:
//! events are released no faster than the wall clock allows, so the
//! optimizer's thinking time is charged to simulated time. Once every
//! broadcast has been answered and fast simulation is allowed, the run drops
//! to virtual time and events are processed back to back.

use std::time::{Duration, Instant};

use bevy_ecs::prelude::Resource;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeMode {
    #[default]
    Real,
    Virtual,
}

#[derive(Debug, Clone, Resource)]
pub struct TimeCoordinator {
    outstanding: u32,
    allow_fast: bool,
    mode: TimeMode,
}

impl TimeCoordinator {
    pub fn new(allow_fast: bool) -> Self {
        Self {
            outstanding: 0,
            allow_fast,
            mode: TimeMode::Real,
        }
    }

    pub fn mode(&self) -> TimeMode {
        self.mode
    }

    pub fn outstanding(&self) -> u32 {
        self.outstanding
    }

    pub fn allows_fast_simulation(&self) -> bool {
        self.allow_fast
    }

    /// A problem went out: one more decision is owed, and time is real until it arrives.
    pub fn on_problem_broadcast(&mut self) {
        self.outstanding += 1;
        if self.mode != TimeMode::Real {
            debug!(outstanding = self.outstanding, "switching to real time");
        }
        self.mode = TimeMode::Real;
    }

    /// A returned plan was evaluated, accepted or not.
    pub fn on_plan_evaluated(&mut self) -> TimeMode {
        self.outstanding = self.outstanding.saturating_sub(1);
        if self.outstanding == 0 && self.allow_fast && self.mode != TimeMode::Virtual {
            debug!("no decisions outstanding, switching to virtual time");
            self.mode = TimeMode::Virtual;
        }
        self.mode
    }
}

impl Default for TimeCoordinator {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Maps simulated milliseconds onto wall-clock instants.
///
/// `scale` is simulated ms per wall ms; `1.0` is true real time.
#[derive(Debug, Clone)]
pub struct WallClockPacer {
    anchor_wall: Instant,
    anchor_sim: u64,
    scale: f64,
}

impl WallClockPacer {
    pub fn new(sim_now: u64, scale: f64) -> Self {
        Self {
            anchor_wall: Instant::now(),
            anchor_sim: sim_now,
            scale: if scale > 0.0 { scale } else { 1.0 },
        }
    }

    /// Pin `sim_now` to the current wall instant.
    pub fn reanchor(&mut self, sim_now: u64) {
        self.anchor_wall = Instant::now();
        self.anchor_sim = sim_now;
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Wall instant at which simulated time `sim_ms` is reached.
    pub fn wall_deadline(&self, sim_ms: u64) -> Instant {
        let sim_delta = sim_ms.saturating_sub(self.anchor_sim) as f64;
        self.anchor_wall + Duration::from_secs_f64(sim_delta / self.scale / 1000.0)
    }

    /// Simulated time corresponding to a wall instant.
    pub fn sim_at(&self, wall: Instant) -> u64 {
        let elapsed_ms = wall.saturating_duration_since(self.anchor_wall).as_secs_f64() * 1000.0;
        self.anchor_sim + (elapsed_ms * self.scale) as u64
    }
}
