use crate::codec::{Record, ToRecord};
use crate::interest::AoiId;
use crate::route::{Cell, TrimmedRoute};

use super::{Category, EntityId, NO_ENTITY};

/// A single broadcastable property change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Property {
    Position(Cell),
    Aoi(AoiId),
    Alive(bool),
    InFight(bool),
    Target(Option<EntityId>),
    LastHitter(EntityId),
    Weapon(u16),
    Armor(u16),
    Visible(bool),
    InChest(bool),
    ItemId(u16),
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Position(_) => "position",
            Property::Aoi(_) => "aoi",
            Property::Alive(_) => "alive",
            Property::InFight(_) => "inFight",
            Property::Target(_) => "targetID",
            Property::LastHitter(_) => "lastHitter",
            Property::Weapon(_) => "weapon",
            Property::Armor(_) => "armor",
            Property::Visible(_) => "visible",
            Property::InChest(_) => "inChest",
            Property::ItemId(_) => "itemID",
        }
    }

    /// Whether clients track this property for the given category.
    pub fn applies_to(&self, category: Category) -> bool {
        match self {
            Property::Position(_) => true,
            Property::Alive(_)
            | Property::InFight(_)
            | Property::Target(_)
            | Property::LastHitter(_) => category != Category::Item,
            Property::Aoi(_) | Property::Weapon(_) | Property::Armor(_) => {
                category == Category::Player
            }
            Property::Visible(_) | Property::InChest(_) | Property::ItemId(_) => {
                category == Category::Item
            }
        }
    }
}

/// Accumulated changes for one entity within a tick. Later writes win.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Delta {
    pub x: Option<u32>,
    pub y: Option<u32>,
    pub aoi: Option<AoiId>,
    pub alive: Option<bool>,
    pub in_fight: Option<bool>,
    pub target: Option<EntityId>,
    pub last_hitter: Option<EntityId>,
    pub weapon: Option<u16>,
    pub armor: Option<u16>,
    pub visible: Option<bool>,
    pub in_chest: Option<bool>,
    pub item_id: Option<u16>,
    pub route: Option<TrimmedRoute>,
}

impl Delta {
    pub fn apply(&mut self, property: Property) {
        match property {
            Property::Position(cell) => {
                self.x = Some(cell.x);
                self.y = Some(cell.y);
            }
            Property::Aoi(aoi) => self.aoi = Some(aoi),
            Property::Alive(v) => self.alive = Some(v),
            Property::InFight(v) => self.in_fight = Some(v),
            Property::Target(target) => self.target = Some(target.unwrap_or(NO_ENTITY)),
            Property::LastHitter(id) => self.last_hitter = Some(id),
            Property::Weapon(v) => self.weapon = Some(v),
            Property::Armor(v) => self.armor = Some(v),
            Property::Visible(v) => self.visible = Some(v),
            Property::InChest(v) => self.in_chest = Some(v),
            Property::ItemId(v) => self.item_id = Some(v),
        }
    }

    /// Overlays every field set in `newer`.
    pub fn merge(&mut self, newer: &Delta) {
        fn take<T: Clone>(slot: &mut Option<T>, newer: &Option<T>) {
            if newer.is_some() {
                slot.clone_from(newer);
            }
        }
        take(&mut self.x, &newer.x);
        take(&mut self.y, &newer.y);
        take(&mut self.aoi, &newer.aoi);
        take(&mut self.alive, &newer.alive);
        take(&mut self.in_fight, &newer.in_fight);
        take(&mut self.target, &newer.target);
        take(&mut self.last_hitter, &newer.last_hitter);
        take(&mut self.weapon, &newer.weapon);
        take(&mut self.armor, &newer.armor);
        take(&mut self.visible, &newer.visible);
        take(&mut self.in_chest, &newer.in_chest);
        take(&mut self.item_id, &newer.item_id);
        take(&mut self.route, &newer.route);
    }

    pub fn is_empty(&self) -> bool {
        *self == Delta::default()
    }
}

impl ToRecord for Delta {
    fn to_record(&self) -> Record {
        Record::new()
            .with_opt("x", self.x)
            .with_opt("y", self.y)
            .with_opt("aoi", self.aoi)
            .with_opt("weapon", self.weapon)
            .with_opt("armor", self.armor)
            .with_opt("targetID", self.target)
            .with_opt("lastHitter", self.last_hitter)
            .with_opt("itemID", self.item_id)
            .with_opt("route", self.route.as_ref().map(ToRecord::to_record))
            .with_opt("alive", self.alive)
            .with_opt("inFight", self.in_fight)
            .with_opt("visible", self.visible)
            .with_opt("inChest", self.in_chest)
    }
}
