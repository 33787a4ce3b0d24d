use glam::UVec2;

use crate::packet::{EntityKey, UpdatePacket};
use crate::route::Cell;

use super::AoiId;

/// One rectangular area: who is in it, and what changed in it since the
/// last flush.
#[derive(Debug, Clone)]
pub struct Aoi {
    id: AoiId,
    origin: Cell,
    size: UVec2,
    entities: Vec<EntityKey>,
    update_packet: UpdatePacket,
}

impl Aoi {
    pub fn new(id: AoiId, origin: Cell, size: UVec2) -> Self {
        Self {
            id,
            origin,
            size,
            entities: Vec::new(),
            update_packet: UpdatePacket::new(),
        }
    }

    pub fn id(&self) -> AoiId {
        self.id
    }

    pub fn origin(&self) -> Cell {
        self.origin
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.cmpge(self.origin).all() && cell.cmplt(self.origin + self.size).all()
    }

    pub fn entities(&self) -> &[EntityKey] {
        &self.entities
    }

    pub fn update_packet(&self) -> &UpdatePacket {
        &self.update_packet
    }

    pub fn update_packet_mut(&mut self) -> &mut UpdatePacket {
        &mut self.update_packet
    }

    pub(super) fn insert(&mut self, key: EntityKey) -> bool {
        if self.entities.contains(&key) {
            return false;
        }
        self.entities.push(key);
        true
    }

    pub(super) fn remove(&mut self, key: EntityKey) -> bool {
        let Some(index) = self.entities.iter().position(|k| *k == key) else {
            return false;
        };
        self.entities.swap_remove(index);
        true
    }

    /// Hands out the pending packet and starts a fresh one.
    pub fn clear(&mut self) -> UpdatePacket {
        std::mem::take(&mut self.update_packet)
    }
}
