use serde::{Deserialize, Serialize};

use crate::spatial::Point;

/// Request identity. Issued in arrival order; `0` is reserved for the depot.
pub type RequestId = u32;

/// Id of the depot, the start and end point of every vehicle.
pub const DEPOT_ID: RequestId = 0;

/// A delivery request (or the depot, with id 0 and zero demand).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub id: RequestId,
    pub x: i32,
    pub y: i32,
    pub demand: u32,
    /// Serving vehicle; set once the request is committed.
    pub vehicle: Option<usize>,
}

impl Request {
    pub fn new(id: RequestId, x: i32, y: i32, demand: u32) -> Self {
        Self {
            id,
            x,
            y,
            demand,
            vehicle: None,
        }
    }

    pub fn depot(x: i32, y: i32) -> Self {
        Self::new(DEPOT_ID, x, y, 0)
    }

    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn is_depot(&self) -> bool {
        self.id == DEPOT_ID
    }
}

/// Fleet descriptor: `count` vehicles sharing one capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleType {
    pub capacity: u32,
    pub count: usize,
}

impl VehicleType {
    pub fn new(capacity: u32, count: usize) -> Self {
        Self { capacity, count }
    }
}

/// One capacity per vehicle index, vehicle types expanded in order.
pub fn expand_capacities(types: &[VehicleType]) -> Vec<u32> {
    types
        .iter()
        .flat_map(|vehicle_type| std::iter::repeat(vehicle_type.capacity).take(vehicle_type.count))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_types_expand_in_order() {
        let capacities = expand_capacities(&[VehicleType::new(10, 2), VehicleType::new(4, 1)]);
        assert_eq!(capacities, vec![10, 10, 4]);
    }

    #[test]
    fn empty_types_yield_no_vehicles() {
        assert!(expand_capacities(&[VehicleType::new(10, 0)]).is_empty());
    }

    #[test]
    fn depot_has_reserved_id_and_no_demand() {
        let depot = Request::depot(5, 5);
        assert!(depot.is_depot());
        assert_eq!(depot.demand, 0);
        assert_eq!(depot.point(), Point::new(5, 5));
    }
}
