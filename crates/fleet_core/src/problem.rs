//! Problem projection: the reduced, index-mapped view of the fleet handed to an optimizer.
//!
//! Matrix indices are *not* request ids. `mapping[index]` gives the request id
//! for a matrix index; `mapping[0]` is always the depot. Optimizers working in
//! index space translate their routes back with [`Problem::to_id_plan`].

use serde::{Deserialize, Serialize};

use crate::plan::Plan;
use crate::request::{Request, RequestId};

/// Square matrix flattened row-major with an explicit dimension.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlatMatrix {
    pub data: Vec<f64>,
    pub dimension: usize,
}

impl FlatMatrix {
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.dimension || col >= self.dimension {
            return None;
        }
        self.data.get(row * self.dimension + col).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Problem {
    /// Pending (uncommitted) requests, ascending by id.
    pub requests: Vec<Request>,
    pub vehicle_count: usize,
    /// Free capacity of each vehicle.
    pub vehicle_capacity: Vec<u32>,
    /// Matrix index of each vehicle's current position.
    pub start: Vec<usize>,
    pub cost_matrix: FlatMatrix,
    /// Matrix index to request id.
    pub mapping: Vec<RequestId>,
}

impl Problem {
    /// Matrix index of a request id.
    pub fn index_of(&self, id: RequestId) -> Option<usize> {
        self.mapping.iter().position(|candidate| *candidate == id)
    }

    /// Cost between two matrix indices.
    pub fn cost(&self, from: usize, to: usize) -> Option<f64> {
        self.cost_matrix.get(from, to)
    }

    /// Cost between two request ids.
    pub fn cost_between(&self, from: RequestId, to: RequestId) -> Option<f64> {
        self.cost(self.index_of(from)?, self.index_of(to)?)
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Translate index-space routes into an id-space plan.
    ///
    /// Returns `None` if any index is outside the mapping.
    pub fn to_id_plan(&self, index_routes: &[Vec<usize>]) -> Option<Plan> {
        let routes = index_routes
            .iter()
            .map(|route| {
                route
                    .iter()
                    .map(|index| self.mapping.get(*index).copied())
                    .collect::<Option<Vec<_>>>()
            })
            .collect::<Option<Vec<_>>>()?;
        Some(Plan::new(routes))
    }
}
