pub mod spatial;
pub mod request;
pub mod plan;
pub mod problem;
pub mod fleet;
pub mod clock;
pub mod pacing;
pub mod ecs;
pub mod dispatch;
pub mod telemetry;
pub mod instance;
pub mod scenario;
pub mod systems;
pub mod runner;
pub mod result;
pub mod wire;
pub mod bus;
pub mod session;
pub mod service;
pub mod optimizer;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;
