//! Fleet state: the mutable world model of requests, vehicles and the accepted plan.
//!
//! Requests move one way only: *pending* (`known_requests`) to *committed*
//! (`history`). A committed request is bound to the vehicle that serves it and
//! charged against that vehicle's free capacity.
//!
//! Plans from an optimizer are never trusted. [`FleetState::evaluate_solution`]
//! walks every vehicle's committed history followed by the candidate's queued
//! stops and rejects the plan the moment a capacity is exceeded, a stop is no
//! longer pending, or a pending request is left out. Only plans that survive
//! evaluation reach the per-vehicle queues the dispatcher pops from.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use bevy_ecs::prelude::Resource;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::plan::Plan;
use crate::problem::{FlatMatrix, Problem};
use crate::request::{Request, RequestId, DEPOT_ID};
use crate::spatial::CostMatrix;

/// Cost reported for runs whose committed routes do not serve every request.
pub const INFEASIBLE_COST: f64 = -1.0;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FleetError {
    #[error("request {0} is already known")]
    DuplicateRequest(RequestId),

    #[error("fleet has no vehicles")]
    NoVehicles,
}

/// Why a plan failed evaluation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Infeasible {
    #[error("plan has {routes} routes but the fleet has {vehicles} vehicles")]
    UnknownVehicle { routes: usize, vehicles: usize },

    #[error("vehicle {vehicle} would carry {load} with capacity {capacity}")]
    CapacityExceeded {
        vehicle: usize,
        load: u32,
        capacity: u32,
    },

    #[error("vehicle {vehicle} visits request {request} which is not pending")]
    StaleRequest { vehicle: usize, request: RequestId },

    #[error("pending request {request} is not visited")]
    Unvisited { request: RequestId },
}

/// Outcome of offering a plan to the fleet.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanDecision {
    Accepted {
        cost: f64,
        /// Cost of the replaced plan, if it was still feasible.
        previous: Option<f64>,
    },
    Rejected(RejectReason),
}

impl PlanDecision {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PlanDecision::Accepted { .. })
    }

    /// Cost of the offered plan, if it was feasible.
    pub fn candidate_cost(&self) -> Option<f64> {
        match self {
            PlanDecision::Accepted { cost, .. } => Some(*cost),
            PlanDecision::Rejected(RejectReason::NotImproving { candidate, .. }) => Some(*candidate),
            PlanDecision::Rejected(RejectReason::Infeasible(_)) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    Infeasible(Infeasible),
    NotImproving { candidate: f64, current: f64 },
}

/// Accepted-plan slot shared with threads outside the simulation.
#[derive(Debug, Clone, Default)]
pub struct SharedPlan(Arc<RwLock<Option<Plan>>>);

impl SharedPlan {
    pub fn snapshot(&self) -> Option<Plan> {
        self.0.read().clone()
    }

    pub fn is_set(&self) -> bool {
        self.0.read().is_some()
    }

    fn replace(&self, plan: Plan) {
        *self.0.write() = Some(plan);
    }
}

#[derive(Debug, Resource)]
pub struct FleetState {
    depot: Request,
    known_requests: HashMap<RequestId, Request>,
    history: HashMap<RequestId, Request>,
    /// Stops driven per vehicle in commit order, depot stops included.
    served: Vec<Vec<RequestId>>,
    current_position: Vec<RequestId>,
    capacity: Vec<u32>,
    free_capacity: Vec<u32>,
    cost_matrix: CostMatrix,
    /// Not-yet-committed tail of the accepted plan, per vehicle.
    queued: Vec<VecDeque<RequestId>>,
    accepted: SharedPlan,
}

impl FleetState {
    /// Build the fleet with every vehicle parked at the depot.
    ///
    /// The depot is always stored with id [`DEPOT_ID`] and zero demand.
    pub fn new(
        depot: Request,
        initial_requests: Vec<Request>,
        capacities: Vec<u32>,
    ) -> Result<Self, FleetError> {
        if capacities.is_empty() {
            return Err(FleetError::NoVehicles);
        }

        let vehicles = capacities.len();
        let mut fleet = Self {
            depot: Request {
                id: DEPOT_ID,
                demand: 0,
                vehicle: None,
                ..depot
            },
            known_requests: HashMap::with_capacity(initial_requests.len()),
            history: HashMap::new(),
            served: vec![Vec::new(); vehicles],
            current_position: vec![DEPOT_ID; vehicles],
            free_capacity: capacities.clone(),
            capacity: capacities,
            cost_matrix: CostMatrix::default(),
            queued: vec![VecDeque::new(); vehicles],
            accepted: SharedPlan::default(),
        };

        for request in initial_requests {
            fleet.insert_pending(request)?;
        }
        fleet.rebuild_cost_matrix();
        Ok(fleet)
    }

    /// Reveal a new pending request.
    pub fn add_request(&mut self, request: Request) -> Result<(), FleetError> {
        self.insert_pending(request)?;
        self.rebuild_cost_matrix();
        Ok(())
    }

    fn insert_pending(&mut self, mut request: Request) -> Result<(), FleetError> {
        let id = request.id;
        if id == DEPOT_ID || self.known_requests.contains_key(&id) || self.history.contains_key(&id)
        {
            return Err(FleetError::DuplicateRequest(id));
        }
        request.vehicle = None;
        self.known_requests.insert(id, request);
        Ok(())
    }

    fn rebuild_cost_matrix(&mut self) {
        let mut ids: Vec<RequestId> = self
            .known_requests
            .keys()
            .chain(self.history.keys())
            .copied()
            .collect();
        ids.sort_unstable();

        let mut nodes = Vec::with_capacity(ids.len() + 1);
        nodes.push((DEPOT_ID, self.depot.point()));
        for id in ids {
            if let Some(request) = self.request(id) {
                nodes.push((id, request.point()));
            }
        }
        self.cost_matrix = CostMatrix::build(&nodes);
    }

    /// Project the pending part of the fleet into the optimizer's problem format.
    pub fn to_problem(&self) -> Problem {
        let mut requests: Vec<Request> = self.known_requests.values().cloned().collect();
        requests.sort_by_key(|request| request.id);

        let mut mapping = Vec::with_capacity(requests.len() + self.vehicle_count() + 1);
        mapping.push(DEPOT_ID);
        mapping.extend(requests.iter().map(|request| request.id));
        for &position in &self.current_position {
            if !mapping.contains(&position) {
                mapping.push(position);
            }
        }

        let index: HashMap<RequestId, usize> = mapping
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();
        let start = self
            .current_position
            .iter()
            .map(|position| index[position])
            .collect();

        let dimension = mapping.len();
        let mut data = Vec::with_capacity(dimension * dimension);
        for &from in &mapping {
            for &to in &mapping {
                data.push(self.cost(from, to));
            }
        }

        Problem {
            requests,
            vehicle_count: self.vehicle_count(),
            vehicle_capacity: self.free_capacity.clone(),
            start,
            cost_matrix: FlatMatrix { data, dimension },
            mapping,
        }
    }

    /// Commit the head of a vehicle's queue, if it can be served.
    ///
    /// A depot stop moves the vehicle home and is recorded as driven, without
    /// touching requests or capacity. A stale or oversized head is left in
    /// place and nothing changes.
    pub fn try_commit_next_request(&mut self, vehicle: usize) -> Option<RequestId> {
        let head = *self.queued.get(vehicle)?.front()?;

        if head == DEPOT_ID {
            self.queued[vehicle].pop_front();
            self.current_position[vehicle] = DEPOT_ID;
            self.served[vehicle].push(DEPOT_ID);
            return Some(DEPOT_ID);
        }

        let Some(demand) = self.known_requests.get(&head).map(|request| request.demand) else {
            warn!(vehicle, request = head, "queued request is no longer pending");
            return None;
        };
        if demand > self.free_capacity[vehicle] {
            warn!(
                vehicle,
                request = head,
                demand,
                free = self.free_capacity[vehicle],
                "queued request exceeds free capacity"
            );
            return None;
        }

        self.queued[vehicle].pop_front();
        let mut request = self.known_requests.remove(&head)?;
        request.vehicle = Some(vehicle);
        self.free_capacity[vehicle] -= demand;
        self.current_position[vehicle] = head;
        self.served[vehicle].push(head);
        self.history.insert(head, request);
        debug!(vehicle, request = head, "committed request");
        Some(head)
    }

    /// Total travel cost of `plan` given the committed history, or why it is infeasible.
    ///
    /// Each vehicle is walked from the depot through its driven stops, then
    /// through the plan's stops, then back to the depot.
    pub fn evaluate_solution(&self, plan: &Plan) -> Result<f64, Infeasible> {
        if plan.vehicle_count() > self.vehicle_count() {
            return Err(Infeasible::UnknownVehicle {
                routes: plan.vehicle_count(),
                vehicles: self.vehicle_count(),
            });
        }

        let mut visited = HashSet::with_capacity(self.known_requests.len());
        let mut total = 0.0;

        for vehicle in 0..self.vehicle_count() {
            let capacity = self.capacity[vehicle];
            let mut load = self.committed_demand(vehicle);
            let mut at = DEPOT_ID;

            for &id in &self.served[vehicle] {
                total += self.cost(at, id);
                at = id;
            }

            for &id in plan.route(vehicle) {
                if id == DEPOT_ID {
                    total += self.cost(at, DEPOT_ID);
                    at = DEPOT_ID;
                    continue;
                }
                let request = match self.known_requests.get(&id) {
                    Some(request) if visited.insert(id) => request,
                    _ => return Err(Infeasible::StaleRequest { vehicle, request: id }),
                };
                load = load.saturating_add(request.demand);
                if load > capacity {
                    return Err(Infeasible::CapacityExceeded {
                        vehicle,
                        load,
                        capacity,
                    });
                }
                total += self.cost(at, id);
                at = id;
            }

            total += self.cost(at, DEPOT_ID);
        }

        if visited.len() < self.known_requests.len() {
            let request = self
                .known_requests
                .keys()
                .filter(|id| !visited.contains(*id))
                .min()
                .copied()
                .unwrap_or(DEPOT_ID);
            return Err(Infeasible::Unvisited { request });
        }

        Ok(total)
    }

    /// Offer a plan. Accepts the first feasible plan, a feasible plan when the
    /// current one went infeasible, or a strictly cheaper one.
    pub fn try_set_new_plan(&mut self, plan: Plan) -> PlanDecision {
        let candidate = match self.evaluate_solution(&plan) {
            Ok(cost) => cost,
            Err(reason) => {
                debug!(%reason, "rejected infeasible plan");
                return PlanDecision::Rejected(RejectReason::Infeasible(reason));
            }
        };

        if !self.has_accepted_plan() {
            self.install(plan);
            debug!(cost = candidate, "accepted first plan");
            return PlanDecision::Accepted {
                cost: candidate,
                previous: None,
            };
        }

        let previous = self.evaluate_solution(&self.queued_plan()).ok();
        match previous {
            Some(current) if candidate >= current => {
                debug!(candidate, current, "rejected plan that does not improve");
                PlanDecision::Rejected(RejectReason::NotImproving { candidate, current })
            }
            _ => {
                self.install(plan);
                debug!(cost = candidate, ?previous, "accepted plan");
                PlanDecision::Accepted {
                    cost: candidate,
                    previous,
                }
            }
        }
    }

    fn install(&mut self, plan: Plan) {
        for (vehicle, queue) in self.queued.iter_mut().enumerate() {
            *queue = plan.route(vehicle).iter().copied().collect();
        }
        self.accepted.replace(plan);
    }

    /// The not-yet-committed part of the accepted plan.
    pub fn queued_plan(&self) -> Plan {
        Plan::new(
            self.queued
                .iter()
                .map(|queue| queue.iter().copied().collect())
                .collect(),
        )
    }

    /// Routes actually driven in commit order, depot stops included.
    pub fn finalize_plan(&self) -> Plan {
        Plan::new(self.served.clone())
    }

    /// Cost of the driven routes, each closed by a return to the depot.
    pub fn history_cost(&self) -> f64 {
        self.served
            .iter()
            .map(|route| {
                let mut at = DEPOT_ID;
                let mut cost = 0.0;
                for &id in route {
                    cost += self.cost(at, id);
                    at = id;
                }
                cost + self.cost(at, DEPOT_ID)
            })
            .sum()
    }

    /// [`Self::history_cost`] if every request was served, otherwise [`INFEASIBLE_COST`].
    pub fn final_cost(&self) -> f64 {
        if self.has_pending() {
            INFEASIBLE_COST
        } else {
            self.history_cost()
        }
    }

    /// Travel cost between two known ids.
    ///
    /// # Panics
    ///
    /// Panics if either id is neither the depot, pending nor committed; the
    /// matrix is rebuilt on every arrival so it always covers those ids.
    pub fn cost(&self, from: RequestId, to: RequestId) -> f64 {
        self.cost_matrix
            .get(from, to)
            .expect("cost matrix covers depot, pending and committed ids")
    }

    pub fn try_cost(&self, from: RequestId, to: RequestId) -> Option<f64> {
        self.cost_matrix.get(from, to)
    }

    pub fn cost_matrix(&self) -> &CostMatrix {
        &self.cost_matrix
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        if id == DEPOT_ID {
            return Some(&self.depot);
        }
        self.known_requests
            .get(&id)
            .or_else(|| self.history.get(&id))
    }

    pub fn depot(&self) -> &Request {
        &self.depot
    }

    pub fn vehicle_count(&self) -> usize {
        self.capacity.len()
    }

    pub fn capacity(&self, vehicle: usize) -> u32 {
        self.capacity[vehicle]
    }

    pub fn free_capacity(&self, vehicle: usize) -> u32 {
        self.free_capacity[vehicle]
    }

    pub fn current_position(&self, vehicle: usize) -> RequestId {
        self.current_position[vehicle]
    }

    /// Demand already committed to a vehicle.
    pub fn committed_demand(&self, vehicle: usize) -> u32 {
        self.capacity[vehicle] - self.free_capacity[vehicle]
    }

    /// Demand of the requests still queued for a vehicle.
    pub fn queued_demand(&self, vehicle: usize) -> u32 {
        self.queued[vehicle]
            .iter()
            .filter_map(|id| self.known_requests.get(id))
            .map(|request| request.demand)
            .sum()
    }

    pub fn queued(&self, vehicle: usize) -> impl Iterator<Item = RequestId> + '_ {
        self.queued[vehicle].iter().copied()
    }

    pub fn served(&self, vehicle: usize) -> &[RequestId] {
        &self.served[vehicle]
    }

    pub fn pending_ids(&self) -> Vec<RequestId> {
        let mut ids: Vec<RequestId> = self.known_requests.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn pending_count(&self) -> usize {
        self.known_requests.len()
    }

    pub fn committed_count(&self) -> usize {
        self.history.len()
    }

    pub fn has_pending(&self) -> bool {
        !self.known_requests.is_empty()
    }

    pub fn is_pending(&self, id: RequestId) -> bool {
        self.known_requests.contains_key(&id)
    }

    pub fn is_committed(&self, id: RequestId) -> bool {
        self.history.contains_key(&id)
    }

    pub fn has_accepted_plan(&self) -> bool {
        self.accepted.is_set()
    }

    /// Handle to the accepted-plan slot, readable from other threads.
    pub fn shared_plan(&self) -> SharedPlan {
        self.accepted.clone()
    }
}
