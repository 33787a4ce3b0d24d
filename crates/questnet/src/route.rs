use glam::UVec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::codec::{Record, ToRecord};
use crate::packet::EntityId;

/// A map cell, in tiles.
pub type Cell = UVec2;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("route for entity {0} has an empty path")]
    EmptyPath(EntityId),
}

/// Facing at the end of a walk, as the client numbers them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Orientation {
    Up = 1,
    Down = 2,
    Left = 3,
    Right = 4,
}

impl Orientation {
    /// Facing implied by the last step of a path.
    pub fn of_step(from: Cell, to: Cell) -> Option<Self> {
        if to.x > from.x {
            Some(Orientation::Right)
        } else if to.x < from.x {
            Some(Orientation::Left)
        } else if to.y > from.y {
            Some(Orientation::Down)
        } else if to.y < from.y {
            Some(Orientation::Up)
        } else {
            None
        }
    }
}

/// Which trimmed form a route takes on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Player,
    Monster,
}

/// A timed path for one mobile entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    owner: EntityId,
    path: Vec<Cell>,
    departure_ms: u64,
    delta: u16,
    action: u8,
    orientation: Option<Orientation>,
}

impl Route {
    /// `latency_ms` is the owner's estimated one-way latency; it is carried
    /// as the route's delta so observers can compensate for it.
    pub fn new(
        owner: EntityId,
        path: Vec<Cell>,
        departure_ms: u64,
        latency_ms: u32,
        action: u8,
        orientation: Option<Orientation>,
    ) -> Result<Self, RouteError> {
        if path.is_empty() {
            return Err(RouteError::EmptyPath(owner));
        }
        Ok(Self {
            owner,
            path,
            departure_ms,
            delta: latency_ms.min(u32::from(u16::MAX)) as u16,
            action,
            orientation,
        })
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn path(&self) -> &[Cell] {
        &self.path
    }

    pub fn departure_ms(&self) -> u64 {
        self.departure_ms
    }

    pub fn delta(&self) -> u16 {
        self.delta
    }

    pub fn action(&self) -> u8 {
        self.action
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    pub fn end(&self) -> Cell {
        self.path[self.path.len() - 1]
    }

    pub fn trim(&self, role: Role) -> TrimmedRoute {
        match role {
            Role::Player => TrimmedRoute::Player {
                orientation: self.orientation,
                end: self.end(),
                delta: self.delta,
            },
            Role::Monster => TrimmedRoute::Monster {
                path: self.path.clone(),
                delta: self.delta,
            },
        }
    }

    /// Cell reached at `now_ms`, walking one cell every `ms_per_cell`.
    pub fn position_at(&self, now_ms: u64, ms_per_cell: u64) -> Cell {
        self.path[self.steps_at(now_ms, ms_per_cell)]
    }

    pub fn is_complete(&self, now_ms: u64, ms_per_cell: u64) -> bool {
        self.steps_at(now_ms, ms_per_cell) == self.path.len() - 1
    }

    fn steps_at(&self, now_ms: u64, ms_per_cell: u64) -> usize {
        let elapsed = now_ms.saturating_sub(self.departure_ms);
        let steps = elapsed.checked_div(ms_per_cell).unwrap_or(u64::MAX);
        steps.min((self.path.len() - 1) as u64) as usize
    }
}

/// The part of a route observers need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrimmedRoute {
    Player {
        orientation: Option<Orientation>,
        end: Cell,
        delta: u16,
    },
    Monster {
        path: Vec<Cell>,
        delta: u16,
    },
}

pub(crate) fn cell_record(cell: Cell) -> Record {
    Record::new().with("x", cell.x).with("y", cell.y)
}

impl ToRecord for TrimmedRoute {
    fn to_record(&self) -> Record {
        match self {
            TrimmedRoute::Player {
                orientation,
                end,
                delta,
            } => Record::new()
                .with_opt("orientation", orientation.map(|o| o as u8))
                .with("delta", *delta)
                .with("end", cell_record(*end)),
            TrimmedRoute::Monster { path, delta } => Record::new()
                .with("delta", *delta)
                .with("path", path.iter().copied().map(cell_record).collect::<Vec<_>>()),
        }
    }
}
