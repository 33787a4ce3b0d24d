use crate::codec::{Record, ToRecord};
use crate::route::Cell;

use super::EntityId;

/// One hit point change the player caused or suffered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HpEvent {
    /// True when the player was the one hit.
    pub target: bool,
    pub hp: u16,
    pub from: Option<EntityId>,
}

impl ToRecord for HpEvent {
    fn to_record(&self) -> Record {
        Record::new()
            .with("hp", self.hp)
            .with_opt("from", self.from)
            .with("target", self.target)
    }
}

/// Information only the owning player receives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonalUpdatePacket {
    position: Option<Cell>,
    life: Option<u16>,
    no_pick: bool,
    hp: Vec<HpEvent>,
    killed: Vec<u16>,
    used: Vec<u16>,
}

impl PersonalUpdatePacket {
    pub fn new() -> Self {
        Self::default()
    }

    /// Server-side correction of the player's own position.
    pub fn update_position(&mut self, cell: Cell) {
        self.position = Some(cell);
    }

    pub fn update_life(&mut self, life: u16) {
        self.life = Some(life);
    }

    pub fn add_hp(&mut self, target: bool, hp: u16, from: Option<EntityId>) {
        self.hp.push(HpEvent { target, hp, from });
    }

    /// Records the kind of a monster the player killed.
    pub fn add_killed(&mut self, monster_kind: u16) {
        self.killed.push(monster_kind);
    }

    pub fn add_used(&mut self, item_id: u16) {
        self.used.push(item_id);
    }

    /// The player tried to pick up an item it has no room for.
    pub fn add_no_pick(&mut self) {
        self.no_pick = true;
    }

    pub fn position(&self) -> Option<Cell> {
        self.position
    }

    pub fn life(&self) -> Option<u16> {
        self.life
    }

    pub fn hp(&self) -> &[HpEvent] {
        &self.hp
    }

    pub fn killed(&self) -> &[u16] {
        &self.killed
    }

    pub fn used(&self) -> &[u16] {
        &self.used
    }

    pub fn no_pick(&self) -> bool {
        self.no_pick
    }

    pub fn is_empty(&self) -> bool {
        self.position.is_none()
            && self.life.is_none()
            && !self.no_pick
            && self.hp.is_empty()
            && self.killed.is_empty()
            && self.used.is_empty()
    }
}

fn ints(values: &[u16]) -> Option<Vec<u64>> {
    (!values.is_empty()).then(|| values.iter().map(|&v| u64::from(v)).collect())
}

impl ToRecord for PersonalUpdatePacket {
    fn to_record(&self) -> Record {
        let hp: Vec<Record> = self.hp.iter().map(ToRecord::to_record).collect();
        Record::new()
            .with_opt("x", self.position.map(|c| c.x))
            .with_opt("y", self.position.map(|c| c.y))
            .with_opt("life", self.life)
            .with_opt("hp", (!hp.is_empty()).then_some(hp))
            .with_opt("killed", ints(&self.killed))
            .with_opt("used", ints(&self.used))
            .with_opt("noPick", self.no_pick.then_some(true))
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;

    #[test]
    fn fresh_packet_is_empty() {
        let packet = PersonalUpdatePacket::new();
        assert!(packet.is_empty());
        assert!(packet.to_record().is_empty());
    }

    #[test]
    fn accumulates_events() {
        let mut packet = PersonalUpdatePacket::new();
        packet.update_position(UVec2::new(4, 9));
        packet.add_hp(true, 12, Some(3));
        packet.add_hp(false, 5, None);
        packet.add_killed(2);
        packet.add_no_pick();

        let record = packet.to_record();
        assert_eq!(record.uint("x"), Some(4));
        assert_eq!(record.uint("y"), Some(9));
        assert_eq!(record.list("hp").map(<[_]>::len), Some(2));
        assert_eq!(record.ints("killed"), Some(&[2u64][..]));
        assert_eq!(record.boolean("noPick"), Some(true));
        assert!(!record.contains("used"));
    }

    #[test]
    fn hp_event_without_source() {
        let record = HpEvent {
            target: false,
            hp: 7,
            from: None,
        }
        .to_record();

        assert!(!record.contains("from"));
        assert_eq!(record.boolean("target"), Some(false));
    }
}
