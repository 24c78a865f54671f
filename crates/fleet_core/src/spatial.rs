//! Spatial operations: planar points, Euclidean distance and the id-keyed cost matrix.
//!
//! This module provides:
//!
//! - **Point**: integer plane coordinates as found in instance files
//! - **Distance**: Euclidean distance between two points
//! - **CostMatrix**: square matrix over a set of request ids, row-major
//!
//! The matrix is keyed by request id rather than position, so ids do not need
//! to be contiguous. The distance from a node to itself is always `0.0`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::request::RequestId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Euclidean distance between two points.
pub fn distance(a: Point, b: Point) -> f64 {
    let dx = f64::from(a.x) - f64::from(b.x);
    let dy = f64::from(a.y) - f64::from(b.y);
    (dx * dx + dy * dy).sqrt()
}

/// Square travel-cost matrix over a fixed set of request ids.
#[derive(Debug, Clone, Default)]
pub struct CostMatrix {
    ids: Vec<RequestId>,
    index: HashMap<RequestId, usize>,
    data: Vec<f64>,
}

impl CostMatrix {
    /// Build the matrix for the given nodes. Duplicate ids keep their first position.
    pub fn build(nodes: &[(RequestId, Point)]) -> Self {
        let mut ids = Vec::with_capacity(nodes.len());
        let mut points = Vec::with_capacity(nodes.len());
        let mut index = HashMap::with_capacity(nodes.len());
        for &(id, point) in nodes {
            if index.contains_key(&id) {
                continue;
            }
            index.insert(id, ids.len());
            ids.push(id);
            points.push(point);
        }

        let dimension = ids.len();
        let mut data = vec![0.0; dimension * dimension];
        for (row, from) in points.iter().enumerate() {
            for (col, to) in points.iter().enumerate() {
                if row != col {
                    data[row * dimension + col] = distance(*from, *to);
                }
            }
        }

        Self { ids, index, data }
    }

    pub fn dimension(&self) -> usize {
        self.ids.len()
    }

    /// Ids covered by the matrix, in row order.
    pub fn ids(&self) -> &[RequestId] {
        &self.ids
    }

    pub fn contains(&self, id: RequestId) -> bool {
        self.index.contains_key(&id)
    }

    /// Travel cost between two ids, or `None` if either id is not covered.
    pub fn get(&self, from: RequestId, to: RequestId) -> Option<f64> {
        let row = *self.index.get(&from)?;
        let col = *self.index.get(&to)?;
        Some(self.data[row * self.dimension() + col])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(distance(Point::new(0, 0), Point::new(3, 4)), 5.0);
        assert_eq!(distance(Point::new(-1, -1), Point::new(-1, -1)), 0.0);
    }

    #[test]
    fn matrix_is_symmetric_with_zero_diagonal() {
        let matrix = CostMatrix::build(&[
            (0, Point::new(0, 0)),
            (7, Point::new(3, 4)),
            (2, Point::new(6, 8)),
        ]);

        assert_eq!(matrix.dimension(), 3);
        assert_eq!(matrix.ids(), &[0, 7, 2]);
        for &id in matrix.ids() {
            assert_eq!(matrix.get(id, id), Some(0.0));
        }
        assert_eq!(matrix.get(0, 7), Some(5.0));
        assert_eq!(matrix.get(7, 0), Some(5.0));
        assert_eq!(matrix.get(0, 2), Some(10.0));
        assert_eq!(matrix.get(0, 3), None);
    }

    #[test]
    fn coincident_points_still_cost_zero() {
        let matrix = CostMatrix::build(&[(0, Point::new(1, 1)), (1, Point::new(1, 1))]);
        assert_eq!(matrix.get(0, 1), Some(0.0));
    }
}
