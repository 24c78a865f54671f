use std::collections::VecDeque;

use bevy_ecs::prelude::{Component, Entity, Resource};

use crate::request::{RequestId, DEPOT_ID};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleState {
    RequestingWork,
    Traveling,
    Servicing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Component)]
pub struct Vehicle {
    pub index: usize,
    pub state: VehicleState,
    /// Request (or depot) the vehicle currently occupies.
    pub position: RequestId,
    /// Stop being traveled to or serviced.
    pub target: Option<RequestId>,
    pub departed_at: u64,
    pub arrived_at: u64,
}

impl Vehicle {
    /// A vehicle at the depot, about to ask for work.
    pub fn at_depot(index: usize) -> Self {
        Self {
            index,
            state: VehicleState::RequestingWork,
            position: DEPOT_ID,
            target: None,
            departed_at: 0,
            arrived_at: 0,
        }
    }
}

/// Private assignment channel of one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Component)]
pub struct Assignments(pub VecDeque<RequestId>);

impl Assignments {
    pub fn push(&mut self, id: RequestId) {
        self.0.push_back(id);
    }

    pub fn pop(&mut self) -> Option<RequestId> {
        self.0.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Vehicle entities by vehicle index.
#[derive(Debug, Clone, Default, Resource)]
pub struct VehicleRoster(pub Vec<Entity>);

impl VehicleRoster {
    pub fn entity(&self, index: usize) -> Option<Entity> {
        self.0.get(index).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
