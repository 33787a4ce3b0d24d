use serde::{Deserialize, Serialize};

use crate::interest::AoiId;
use crate::packet::{
    Category, EntityId, EntityKey, ItemSnapshot, MonsterSnapshot, PlayerSnapshot, Property,
    Snapshot, Trim,
};
use crate::route::{Cell, Role, Route};

pub const DEFAULT_PLAYER_LIFE: u16 = 100;

/// Static description of a monster kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonsterInfo {
    pub kind: u16,
    pub name: String,
    pub life: u16,
}

/// Static description of an item placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub item_id: u16,
    pub respawn: bool,
    pub chest: bool,
    pub loot: bool,
}

#[derive(Debug, Clone)]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    pub cell: Cell,
    pub aoi: AoiId,
    pub alive: bool,
    pub in_fight: bool,
    pub weapon: u16,
    pub armor: u16,
    pub target: Option<EntityId>,
    pub last_hitter: Option<EntityId>,
    pub life: u16,
    pub max_life: u16,
    pub route: Option<Route>,
}

impl Player {
    pub fn new(id: EntityId, name: impl Into<String>, cell: Cell, aoi: AoiId) -> Self {
        Self {
            id,
            name: name.into(),
            cell,
            aoi,
            alive: true,
            in_fight: false,
            weapon: 0,
            armor: 0,
            target: None,
            last_hitter: None,
            life: DEFAULT_PLAYER_LIFE,
            max_life: DEFAULT_PLAYER_LIFE,
            route: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Monster {
    pub id: EntityId,
    pub kind: u16,
    pub cell: Cell,
    pub aoi: AoiId,
    pub alive: bool,
    pub in_fight: bool,
    pub target: Option<EntityId>,
    pub last_hitter: Option<EntityId>,
    pub life: u16,
    pub route: Option<Route>,
}

impl Monster {
    pub fn new(id: EntityId, info: &MonsterInfo, cell: Cell, aoi: AoiId) -> Self {
        Self {
            id,
            kind: info.kind,
            cell,
            aoi,
            alive: true,
            in_fight: false,
            target: None,
            last_hitter: None,
            life: info.life,
            route: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Item {
    pub id: EntityId,
    pub item_id: u16,
    pub cell: Cell,
    pub aoi: AoiId,
    pub visible: bool,
    pub respawn: bool,
    pub chest: bool,
    pub in_chest: bool,
    pub loot: bool,
}

impl Item {
    pub fn new(id: EntityId, info: ItemInfo, cell: Cell, aoi: AoiId) -> Self {
        Self {
            id,
            item_id: info.item_id,
            cell,
            aoi,
            visible: true,
            respawn: info.respawn,
            chest: info.chest,
            in_chest: info.chest,
            loot: info.loot,
        }
    }
}

/// Mutates the entity's state for `property`. Returns false when the
/// property does not exist on this kind of entity.
pub trait Apply {
    fn apply(&mut self, property: Property) -> bool;
}

impl Apply for Player {
    fn apply(&mut self, property: Property) -> bool {
        match property {
            Property::Position(cell) => self.cell = cell,
            Property::Alive(v) => self.alive = v,
            Property::InFight(v) => self.in_fight = v,
            Property::Target(t) => self.target = t,
            Property::LastHitter(id) => self.last_hitter = Some(id),
            Property::Weapon(v) => self.weapon = v,
            Property::Armor(v) => self.armor = v,
            // Area membership only changes through relocation.
            Property::Aoi(_) => return false,
            Property::Visible(_) | Property::InChest(_) | Property::ItemId(_) => return false,
        }
        true
    }
}

impl Apply for Monster {
    fn apply(&mut self, property: Property) -> bool {
        match property {
            Property::Position(cell) => self.cell = cell,
            Property::Alive(v) => self.alive = v,
            Property::InFight(v) => self.in_fight = v,
            Property::Target(t) => self.target = t,
            Property::LastHitter(id) => self.last_hitter = Some(id),
            _ => return false,
        }
        true
    }
}

impl Apply for Item {
    fn apply(&mut self, property: Property) -> bool {
        match property {
            Property::Position(cell) => self.cell = cell,
            Property::Visible(v) => self.visible = v,
            Property::InChest(v) => self.in_chest = v,
            Property::ItemId(v) => self.item_id = v,
            _ => return false,
        }
        true
    }
}

impl Trim for Player {
    fn key(&self) -> EntityKey {
        EntityKey::player(self.id)
    }

    fn trim(&self) -> Snapshot {
        Snapshot::Player(PlayerSnapshot {
            id: self.id,
            cell: self.cell,
            name: self.name.clone(),
            aoi: self.aoi,
            alive: self.alive,
            in_fight: self.in_fight,
            weapon: self.weapon,
            armor: self.armor,
            target: self.target,
            route: self.route.as_ref().map(|r| r.trim(Role::Player)),
        })
    }
}

impl Trim for Monster {
    fn key(&self) -> EntityKey {
        EntityKey::monster(self.id)
    }

    fn trim(&self) -> Snapshot {
        Snapshot::Monster(MonsterSnapshot {
            id: self.id,
            cell: self.cell,
            kind: self.kind,
            alive: self.alive,
            in_fight: self.in_fight,
            target: self.target,
            route: self.route.as_ref().map(|r| r.trim(Role::Monster)),
        })
    }
}

impl Trim for Item {
    fn key(&self) -> EntityKey {
        EntityKey::item(self.id)
    }

    fn trim(&self) -> Snapshot {
        Snapshot::Item(ItemSnapshot {
            id: self.id,
            cell: self.cell,
            item_id: self.item_id,
            visible: self.visible,
            respawn: self.respawn,
            chest: self.chest,
            in_chest: self.in_chest,
            loot: self.loot,
        })
    }
}

/// Borrowed view of any entity in the world.
#[derive(Debug, Clone, Copy)]
pub enum EntityRef<'a> {
    Player(&'a Player),
    Monster(&'a Monster),
    Item(&'a Item),
}

impl EntityRef<'_> {
    pub fn category(&self) -> Category {
        match self {
            EntityRef::Player(_) => Category::Player,
            EntityRef::Monster(_) => Category::Monster,
            EntityRef::Item(_) => Category::Item,
        }
    }

    pub fn cell(&self) -> Cell {
        match self {
            EntityRef::Player(p) => p.cell,
            EntityRef::Monster(m) => m.cell,
            EntityRef::Item(i) => i.cell,
        }
    }

    pub fn aoi(&self) -> AoiId {
        match self {
            EntityRef::Player(p) => p.aoi,
            EntityRef::Monster(m) => m.aoi,
            EntityRef::Item(i) => i.aoi,
        }
    }
}

impl Trim for EntityRef<'_> {
    fn key(&self) -> EntityKey {
        match self {
            EntityRef::Player(p) => p.key(),
            EntityRef::Monster(m) => m.key(),
            EntityRef::Item(i) => i.key(),
        }
    }

    fn trim(&self) -> Snapshot {
        match self {
            EntityRef::Player(p) => p.trim(),
            EntityRef::Monster(m) => m.trim(),
            EntityRef::Item(i) => i.trim(),
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;

    fn rat() -> MonsterInfo {
        MonsterInfo {
            kind: 3,
            name: "rat".into(),
            life: 20,
        }
    }

    #[test]
    fn monster_takes_static_data() {
        let monster = Monster::new(5, &rat(), UVec2::new(2, 3), 0);
        assert_eq!(monster.kind, 3);
        assert_eq!(monster.life, 20);

        let Snapshot::Monster(snapshot) = monster.trim() else {
            panic!("expected monster snapshot");
        };
        assert_eq!(snapshot.kind, 3);
        assert_eq!(snapshot.route, None);
    }

    #[test]
    fn apply_rejects_foreign_properties() {
        let mut item = Item::new(
            1,
            ItemInfo {
                item_id: 9,
                respawn: true,
                chest: true,
                loot: false,
            },
            UVec2::ZERO,
            0,
        );
        assert!(item.in_chest);
        assert!(!item.apply(Property::Weapon(2)));
        assert!(item.apply(Property::InChest(false)));
        assert!(!item.in_chest);
    }

    #[test]
    fn player_snapshot_trims_route_to_end() {
        let mut player = Player::new(1, "ann", UVec2::new(1, 1), 0);
        player.route = Some(
            Route::new(1, vec![UVec2::new(1, 1), UVec2::new(1, 2)], 0, 30, 0, None).unwrap(),
        );

        let Snapshot::Player(snapshot) = player.trim() else {
            panic!("expected player snapshot");
        };
        assert_eq!(
            snapshot.route,
            Some(crate::route::TrimmedRoute::Player {
                orientation: None,
                end: UVec2::new(1, 2),
                delta: 30
            })
        );
    }
}
