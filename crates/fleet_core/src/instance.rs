//! Problem instances and their arrival schedule.
//!
//! Instance files are JSON with PascalCase keys. Location arrays include the
//! depot at index 0; demand and availability arrays cover requests only, so
//! request `i` sits at location `i + 1`.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use bevy_ecs::prelude::Resource;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clock::ONE_SEC_MS;
use crate::fleet::FleetError;
use crate::request::{expand_capacities, Request, RequestId, VehicleType, DEPOT_ID};

#[derive(Debug, Error)]
pub enum InstanceError {
    #[error("failed to read or write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid instance JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid instance: {0}")]
    Invalid(String),

    #[error(transparent)]
    Fleet(#[from] FleetError),
}

pub type InstanceResult<T> = Result<T, InstanceError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProblemInstance {
    pub vehicle_type_capacity: Vec<u32>,
    pub vehicle_type_count: Vec<usize>,
    pub x_locations: Vec<i32>,
    pub y_locations: Vec<i32>,
    pub demands: Vec<u32>,
    /// Seconds after start at which each request appears; below 1 means known at start.
    pub available: Vec<i64>,
    /// Seconds spent at each stop.
    pub service_time: f64,
    /// Seconds per distance unit.
    pub speed: f64,
    pub name: String,
}

impl ProblemInstance {
    pub fn load(path: impl AsRef<Path>) -> InstanceResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let instance: Self = serde_json::from_str(&text)?;
        instance.validate()?;
        Ok(instance)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> InstanceResult<()> {
        let path = path.as_ref();
        let text = serde_json::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| InstanceError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> InstanceResult<()> {
        if self.vehicle_type_capacity.len() != self.vehicle_type_count.len() {
            return Err(InstanceError::Invalid(format!(
                "{} vehicle capacities but {} vehicle counts",
                self.vehicle_type_capacity.len(),
                self.vehicle_type_count.len()
            )));
        }
        if self.vehicle_type_count.iter().sum::<usize>() == 0 {
            return Err(InstanceError::Invalid("instance has no vehicles".into()));
        }
        if self.x_locations.is_empty() || self.x_locations.len() != self.y_locations.len() {
            return Err(InstanceError::Invalid(format!(
                "location arrays must be non-empty and equal in length ({} x, {} y)",
                self.x_locations.len(),
                self.y_locations.len()
            )));
        }
        let requests = self.request_count();
        if self.demands.len() != requests || self.available.len() != requests {
            return Err(InstanceError::Invalid(format!(
                "{requests} request locations but {} demands and {} availabilities",
                self.demands.len(),
                self.available.len()
            )));
        }
        if RequestId::try_from(requests).is_err() {
            return Err(InstanceError::Invalid(format!("too many requests: {requests}")));
        }
        if !(self.service_time >= 0.0 && self.speed >= 0.0) {
            return Err(InstanceError::Invalid(
                "service time and speed must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Number of requests, excluding the depot.
    pub fn request_count(&self) -> usize {
        self.x_locations.len().saturating_sub(1)
    }

    pub fn vehicle_types(&self) -> Vec<VehicleType> {
        self.vehicle_type_capacity
            .iter()
            .zip(&self.vehicle_type_count)
            .map(|(&capacity, &count)| VehicleType::new(capacity, count))
            .collect()
    }

    pub fn capacities(&self) -> Vec<u32> {
        expand_capacities(&self.vehicle_types())
    }

    pub fn depot(&self) -> Request {
        Request::depot(
            self.x_locations.first().copied().unwrap_or_default(),
            self.y_locations.first().copied().unwrap_or_default(),
        )
    }

    /// Split requests into those known at start and the arrival schedule.
    ///
    /// Ids follow release order: initial requests in file order from 1, then
    /// dynamic ones by ascending availability, file order breaking ties.
    pub fn split_requests(&self) -> (Vec<Request>, ArrivalSchedule) {
        let mut initial = Vec::new();
        let mut dynamic = Vec::new();
        for i in 0..self.request_count() {
            let (x, y) = (self.x_locations[i + 1], self.y_locations[i + 1]);
            let demand = self.demands[i];
            if self.available[i] < 1 {
                initial.push(Request::new(DEPOT_ID, x, y, demand));
            } else {
                dynamic.push((self.available[i] as u64, Request::new(DEPOT_ID, x, y, demand)));
            }
        }

        let mut next_id: RequestId = 1;
        for request in &mut initial {
            request.id = next_id;
            next_id += 1;
        }
        dynamic.sort_by_key(|(at_secs, _)| *at_secs);
        for (_, request) in &mut dynamic {
            request.id = next_id;
            next_id += 1;
        }

        let schedule = ArrivalSchedule::from_secs(dynamic);
        (initial, schedule)
    }

    /// Copy of this instance where `ceil(n * degree)` requests appear
    /// dynamically at a uniform time in `[from_secs, to_secs)`.
    pub fn with_dynamism<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        degree: f64,
        from_secs: i64,
        to_secs: i64,
        name: impl Into<String>,
    ) -> InstanceResult<Self> {
        if !(0.0..=1.0).contains(&degree) {
            return Err(InstanceError::Invalid(format!(
                "degree of dynamism {degree} outside [0, 1]"
            )));
        }
        if from_secs < 1 || to_secs <= from_secs {
            return Err(InstanceError::Invalid(format!(
                "arrival window [{from_secs}, {to_secs}) must be non-empty and start after 0"
            )));
        }

        let mut clone = self.clone();
        clone.name = name.into();

        let n = clone.available.len();
        let mut remaining = (n as f64 * degree).ceil() as usize;
        // Selection sampling: each request is picked with probability remaining / unseen.
        for i in 0..n {
            if remaining == 0 {
                break;
            }
            let p = remaining as f64 / (n - i) as f64;
            if rng.gen::<f64>() < p {
                clone.available[i] = rng.gen_range(from_secs..to_secs);
                remaining -= 1;
            }
        }
        Ok(clone)
    }

    /// The six standard dynamism variants of this instance.
    pub fn dynamism_variants<R: Rng + ?Sized>(&self, rng: &mut R) -> InstanceResult<Vec<Self>> {
        DYNAMISM_VARIANTS
            .iter()
            .map(|variant| {
                self.with_dynamism(
                    rng,
                    variant.degree,
                    variant.from_secs,
                    variant.to_secs,
                    format!("{}-{}", self.name, variant.suffix),
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DynamismVariant {
    pub suffix: &'static str,
    pub degree: f64,
    pub from_secs: i64,
    pub to_secs: i64,
}

pub const DYNAMISM_VARIANTS: [DynamismVariant; 6] = [
    DynamismVariant {
        suffix: "low-balanced",
        degree: 0.2,
        from_secs: 1,
        to_secs: 360,
    },
    DynamismVariant {
        suffix: "medium-balanced",
        degree: 0.5,
        from_secs: 1,
        to_secs: 360,
    },
    DynamismVariant {
        suffix: "high-balanced",
        degree: 0.9,
        from_secs: 1,
        to_secs: 360,
    },
    DynamismVariant {
        suffix: "medium-clustered-soon",
        degree: 0.5,
        from_secs: 1,
        to_secs: 21,
    },
    DynamismVariant {
        suffix: "medium-clustered-medium",
        degree: 0.5,
        from_secs: 170,
        to_secs: 190,
    },
    DynamismVariant {
        suffix: "medium-clustered-late",
        degree: 0.5,
        from_secs: 340,
        to_secs: 360,
    },
];

/// Time-ordered groups of requests still to arrive (simulation ms).
#[derive(Debug, Clone, Default, PartialEq, Resource)]
pub struct ArrivalSchedule {
    groups: VecDeque<(u64, Vec<Request>)>,
}

impl ArrivalSchedule {
    /// Build from `(arrival_ms, request)` pairs in any order; requests sharing
    /// an arrival time form one group, kept in the given order.
    pub fn new(mut arrivals: Vec<(u64, Request)>) -> Self {
        arrivals.sort_by_key(|(at, _)| *at);
        let mut groups: VecDeque<(u64, Vec<Request>)> = VecDeque::new();
        for (at, request) in arrivals {
            match groups.back_mut() {
                Some((last, group)) if *last == at => group.push(request),
                _ => groups.push_back((at, vec![request])),
            }
        }
        Self { groups }
    }

    pub fn from_secs(arrivals: Vec<(u64, Request)>) -> Self {
        Self::new(
            arrivals
                .into_iter()
                .map(|(secs, request)| (secs.saturating_mul(ONE_SEC_MS), request))
                .collect(),
        )
    }

    pub fn next_time(&self) -> Option<u64> {
        self.groups.front().map(|(at, _)| *at)
    }

    /// Pop the next group if it is due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<Vec<Request>> {
        match self.groups.front() {
            Some((at, _)) if *at <= now => self.groups.pop_front().map(|(_, group)| group),
            _ => None,
        }
    }

    /// Requests still to arrive.
    pub fn remaining(&self) -> usize {
        self.groups.iter().map(|(_, group)| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
