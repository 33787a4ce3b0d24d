use serde::{Deserialize, Serialize};

use crate::codec::{Record, ToRecord};
use crate::interest::AoiId;
use crate::route::{Cell, TrimmedRoute};

pub type EntityId = u32;

/// Id sent for "no target".
pub const NO_ENTITY: EntityId = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Category {
    Player = 0,
    Item = 1,
    Monster = 2,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Player => "player",
            Category::Item => "item",
            Category::Monster => "monster",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityKey {
    pub category: Category,
    pub id: EntityId,
}

impl EntityKey {
    pub fn player(id: EntityId) -> Self {
        Self {
            category: Category::Player,
            id,
        }
    }

    pub fn item(id: EntityId) -> Self {
        Self {
            category: Category::Item,
            id,
        }
    }

    pub fn monster(id: EntityId) -> Self {
        Self {
            category: Category::Monster,
            id,
        }
    }
}

/// Anything that can be announced to clients as a full snapshot.
pub trait Trim {
    fn key(&self) -> EntityKey;
    fn trim(&self) -> Snapshot;
}

impl<T: Trim + ?Sized> Trim for &T {
    fn key(&self) -> EntityKey {
        (**self).key()
    }

    fn trim(&self) -> Snapshot {
        (**self).trim()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerSnapshot {
    pub id: EntityId,
    pub cell: Cell,
    pub name: String,
    pub aoi: AoiId,
    pub alive: bool,
    pub in_fight: bool,
    pub weapon: u16,
    pub armor: u16,
    pub target: Option<EntityId>,
    pub route: Option<TrimmedRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonsterSnapshot {
    pub id: EntityId,
    pub cell: Cell,
    pub kind: u16,
    pub alive: bool,
    pub in_fight: bool,
    pub target: Option<EntityId>,
    pub route: Option<TrimmedRoute>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSnapshot {
    pub id: EntityId,
    pub cell: Cell,
    pub item_id: u16,
    pub visible: bool,
    pub respawn: bool,
    pub chest: bool,
    pub in_chest: bool,
    pub loot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Snapshot {
    Player(PlayerSnapshot),
    Item(ItemSnapshot),
    Monster(MonsterSnapshot),
}

impl Snapshot {
    pub fn id(&self) -> EntityId {
        match self {
            Snapshot::Player(s) => s.id,
            Snapshot::Item(s) => s.id,
            Snapshot::Monster(s) => s.id,
        }
    }

    pub fn category(&self) -> Category {
        match self {
            Snapshot::Player(_) => Category::Player,
            Snapshot::Item(_) => Category::Item,
            Snapshot::Monster(_) => Category::Monster,
        }
    }
}

impl ToRecord for PlayerSnapshot {
    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("x", self.cell.x)
            .with("y", self.cell.y)
            .with("aoi", self.aoi)
            .with("weapon", self.weapon)
            .with("armor", self.armor)
            .with("targetID", self.target.unwrap_or(NO_ENTITY))
            .with("name", self.name.as_str())
            .with_opt("route", self.route.as_ref().map(ToRecord::to_record))
            .with("alive", self.alive)
            .with("inFight", self.in_fight)
    }
}

impl ToRecord for MonsterSnapshot {
    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("x", self.cell.x)
            .with("y", self.cell.y)
            .with("monster", self.kind)
            .with("targetID", self.target.unwrap_or(NO_ENTITY))
            .with_opt("route", self.route.as_ref().map(ToRecord::to_record))
            .with("alive", self.alive)
            .with("inFight", self.in_fight)
    }
}

impl ToRecord for ItemSnapshot {
    fn to_record(&self) -> Record {
        Record::new()
            .with("id", self.id)
            .with("x", self.cell.x)
            .with("y", self.cell.y)
            .with("itemID", self.item_id)
            .with("visible", self.visible)
            .with("respawn", self.respawn)
            .with("chest", self.chest)
            .with("inChest", self.in_chest)
            .with("loot", self.loot)
    }
}

impl ToRecord for Snapshot {
    fn to_record(&self) -> Record {
        match self {
            Snapshot::Player(s) => s.to_record(),
            Snapshot::Item(s) => s.to_record(),
            Snapshot::Monster(s) => s.to_record(),
        }
    }
}
