pub mod bus_optimizer;
pub mod schedule;
