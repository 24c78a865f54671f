//! Routing plans: one ordered list of request ids per vehicle.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::request::RequestId;

/// A complete per-vehicle assignment of request ids.
///
/// A plan carries no cost of its own; it is only meaningful once evaluated
/// against a [`crate::fleet::FleetState`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Plan {
    pub routes: Vec<Vec<RequestId>>,
}

impl Plan {
    pub fn new(routes: Vec<Vec<RequestId>>) -> Self {
        Self { routes }
    }

    /// A plan with an empty route for each vehicle.
    pub fn empty(vehicle_count: usize) -> Self {
        Self {
            routes: vec![Vec::new(); vehicle_count],
        }
    }

    pub fn vehicle_count(&self) -> usize {
        self.routes.len()
    }

    /// Route of one vehicle; vehicles beyond the plan's length have an empty route.
    pub fn route(&self, vehicle: usize) -> &[RequestId] {
        self.routes.get(vehicle).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn set_route(&mut self, vehicle: usize, route: Vec<RequestId>) {
        if self.routes.len() <= vehicle {
            self.routes.resize(vehicle + 1, Vec::new());
        }
        self.routes[vehicle] = route;
    }

    /// Total number of stops across all vehicles.
    pub fn stop_count(&self) -> usize {
        self.routes.iter().map(Vec::len).sum()
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (vehicle, route) in self.routes.iter().enumerate() {
            let stops: Vec<String> = route.iter().map(ToString::to_string).collect();
            writeln!(f, "[vehicle {vehicle}] {}", stops.join("-"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_routes_read_as_empty() {
        let plan = Plan::new(vec![vec![1, 2]]);
        assert_eq!(plan.route(0), &[1, 2]);
        assert!(plan.route(3).is_empty());
    }

    #[test]
    fn set_route_grows_plan() {
        let mut plan = Plan::empty(1);
        plan.set_route(2, vec![5]);
        assert_eq!(plan.vehicle_count(), 3);
        assert_eq!(plan.stop_count(), 1);
    }

    #[test]
    fn display_lists_each_vehicle() {
        let plan = Plan::new(vec![vec![1, 3], vec![], vec![2]]);
        assert_eq!(
            plan.to_string(),
            "[vehicle 0] 1-3\n[vehicle 1] \n[vehicle 2] 2\n"
        );
    }
}
