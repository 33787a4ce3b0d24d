//! Authoritative game state and the producer side of update propagation.
//!
//! Lock order is entities, then area cells, then subscribers. Cell locks are
//! never held across another acquisition.

mod entity;

pub use entity::{
    Apply, DEFAULT_PLAYER_LIFE, EntityRef, Item, ItemInfo, Monster, MonsterInfo, Player,
};

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::interest::{AoiGrid, AoiId, GridLayout, Transition, TransitionObserver};
use crate::latency::LatencyEstimator;
use crate::packet::{
    Category, EntityId, EntityKey, InitFrame, PersonalUpdatePacket, Property, Snapshot, Trim,
    UpdatePacket,
};
use crate::route::{Cell, Orientation, Role, Route, RouteError};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorldError {
    #[error("cell ({}, {}) is outside the map", .0.x, .0.y)]
    OffMap(Cell),
    #[error("{} {} is dead", .0.category.as_str(), .0.id)]
    Dead(EntityKey),
    #[error("entity ids exhausted")]
    IdsExhausted,
    #[error("no {} with id {}", .0.category.as_str(), .0.id)]
    Unknown(EntityKey),
    #[error("{property} does not apply to a {category}")]
    NotApplicable {
        property: &'static str,
        category: &'static str,
    },
    #[error(transparent)]
    Route(#[from] RouteError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldConfig {
    /// Walking pace used to advance routes.
    pub ms_per_cell: u64,
    /// Highest id the wire can carry.
    pub max_id: EntityId,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            ms_per_cell: 120,
            max_id: EntityId::from(u16::MAX),
        }
    }
}

#[derive(Debug, Default)]
struct EntityTable {
    players: HashMap<EntityId, Player>,
    monsters: HashMap<EntityId, Monster>,
    items: HashMap<EntityId, Item>,
}

impl EntityTable {
    fn get(&self, key: EntityKey) -> Option<EntityRef<'_>> {
        match key.category {
            Category::Player => self.players.get(&key.id).map(EntityRef::Player),
            Category::Monster => self.monsters.get(&key.id).map(EntityRef::Monster),
            Category::Item => self.items.get(&key.id).map(EntityRef::Item),
        }
    }

    fn entity_mut(&mut self, key: EntityKey) -> Option<&mut dyn Apply> {
        match key.category {
            Category::Player => self.players.get_mut(&key.id).map(|e| e as &mut dyn Apply),
            Category::Monster => self.monsters.get_mut(&key.id).map(|e| e as &mut dyn Apply),
            Category::Item => self.items.get_mut(&key.id).map(|e| e as &mut dyn Apply),
        }
    }
}

#[derive(Debug, Default)]
struct Subscriber {
    personal: PersonalUpdatePacket,
    catch_up: BTreeSet<EntityKey>,
    new_aois: Vec<AoiId>,
    latency: LatencyEstimator,
}

/// What one player is owed at flush time, besides the areas around it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelivery {
    pub player: EntityId,
    pub aoi: AoiId,
    pub personal: PersonalUpdatePacket,
    /// Entities that came into view and need a full snapshot.
    pub catch_up: Vec<EntityKey>,
    /// Areas the player just came into range of.
    pub new_aois: Vec<AoiId>,
    pub latency: u32,
}

#[derive(Debug)]
pub struct World {
    grid: AoiGrid,
    config: WorldConfig,
    entities: RwLock<EntityTable>,
    subscribers: Mutex<HashMap<EntityId, Subscriber>>,
    next_id: AtomicU32,
}

/// Tells observers about an entity that came into their view, and tells a
/// moving player which areas it must catch up on.
struct Announcer<'a> {
    world: &'a World,
}

impl TransitionObserver for Announcer<'_> {
    fn on_transition(&mut self, transition: Transition) {
        let revealed = transition.revealed(self.world.grid.layout());
        let observers: Vec<EntityId> = revealed
            .iter()
            .flat_map(|&aoi| self.world.grid.entities(aoi))
            .filter(|key| key.category == Category::Player && *key != transition.key)
            .map(|key| key.id)
            .collect();

        let mut subscribers = self.world.subscribers.lock();
        for id in observers {
            if let Some(subscriber) = subscribers.get_mut(&id) {
                subscriber.catch_up.insert(transition.key);
            }
        }
        if transition.key.category == Category::Player {
            if let Some(subscriber) = subscribers.get_mut(&transition.key.id) {
                for aoi in revealed {
                    if !subscriber.new_aois.contains(&aoi) {
                        subscriber.new_aois.push(aoi);
                    }
                }
            }
        }
    }
}

impl World {
    pub fn new(layout: GridLayout, config: WorldConfig) -> Self {
        Self {
            grid: AoiGrid::new(layout),
            config,
            entities: RwLock::new(EntityTable::default()),
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
        }
    }

    pub fn grid(&self) -> &AoiGrid {
        &self.grid
    }

    pub fn layout(&self) -> &GridLayout {
        self.grid.layout()
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    fn allocate_id(&self) -> Result<EntityId, WorldError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if id > self.config.max_id {
            return Err(WorldError::IdsExhausted);
        }
        Ok(id)
    }

    fn aoi_for(&self, cell: Cell) -> Result<AoiId, WorldError> {
        self.layout().aoi_at(cell).ok_or(WorldError::OffMap(cell))
    }

    fn announcer(&self) -> Announcer<'_> {
        Announcer { world: self }
    }

    /// Adds a connected player at `cell` and returns its id.
    pub fn join(&self, name: &str, cell: Cell) -> Result<EntityId, WorldError> {
        let aoi = self.aoi_for(cell)?;
        let id = self.allocate_id()?;

        let mut table = self.entities.write();
        table.players.insert(id, Player::new(id, name, cell, aoi));
        self.subscribers.lock().insert(id, Subscriber::default());
        self.grid
            .add_entity(EntityKey::player(id), aoi, None, &mut self.announcer());
        drop(table);

        log::info!("player {id} ({name}) joined in area {aoi}");
        Ok(id)
    }

    /// Removes a player and announces the departure to its area.
    pub fn leave(&self, id: EntityId) -> Result<(), WorldError> {
        let key = EntityKey::player(id);
        let mut table = self.entities.write();
        let player = table.players.remove(&id).ok_or(WorldError::Unknown(key))?;
        self.grid.delete_entity(key, player.aoi);
        self.grid.record(player.aoi, |packet| packet.add_disconnect(id));
        self.subscribers.lock().remove(&id);
        drop(table);

        log::info!("player {id} ({}) left", player.name);
        Ok(())
    }

    pub fn spawn_monster(&self, info: &MonsterInfo, cell: Cell) -> Result<EntityId, WorldError> {
        let aoi = self.aoi_for(cell)?;
        let id = self.allocate_id()?;

        let mut table = self.entities.write();
        table.monsters.insert(id, Monster::new(id, info, cell, aoi));
        self.grid
            .add_entity(EntityKey::monster(id), aoi, None, &mut self.announcer());
        drop(table);

        log::debug!("spawned {} {id} in area {aoi}", info.name);
        Ok(id)
    }

    pub fn spawn_item(&self, info: ItemInfo, cell: Cell) -> Result<EntityId, WorldError> {
        let aoi = self.aoi_for(cell)?;
        let id = self.allocate_id()?;

        let mut table = self.entities.write();
        table.items.insert(id, Item::new(id, info, cell, aoi));
        self.grid
            .add_entity(EntityKey::item(id), aoi, None, &mut self.announcer());
        drop(table);

        log::debug!("spawned item {} as {id} in area {aoi}", info.item_id);
        Ok(id)
    }

    /// Changes a broadcastable property and records it in the entity's area.
    /// A position change that crosses an area boundary moves the entity.
    /// The area itself is derived from the position and cannot be set.
    pub fn set_property(&self, key: EntityKey, property: Property) -> Result<(), WorldError> {
        if matches!(property, Property::Aoi(_)) || !property.applies_to(key.category) {
            return Err(WorldError::NotApplicable {
                property: property.name(),
                category: key.category.as_str(),
            });
        }
        if let Property::Position(cell) = property {
            self.aoi_for(cell)?;
        }

        let mut table = self.entities.write();
        let aoi = table.get(key).ok_or(WorldError::Unknown(key))?.aoi();
        if let Some(entity) = table.entity_mut(key) {
            entity.apply(property);
        }
        self.grid.record(aoi, |packet| {
            packet.update_property(key, property);
        });
        if let Property::Position(cell) = property {
            self.relocate(&mut table, key, cell)?;
        }
        Ok(())
    }

    fn relocate(
        &self,
        table: &mut EntityTable,
        key: EntityKey,
        cell: Cell,
    ) -> Result<(), WorldError> {
        let current = self.aoi_for(cell)?;
        let slot = match key.category {
            Category::Player => table.players.get_mut(&key.id).map(|p| &mut p.aoi),
            Category::Monster => table.monsters.get_mut(&key.id).map(|m| &mut m.aoi),
            Category::Item => table.items.get_mut(&key.id).map(|i| &mut i.aoi),
        };
        let previous = std::mem::replace(slot.ok_or(WorldError::Unknown(key))?, current);
        if previous == current {
            return Ok(());
        }

        self.grid
            .add_entity(key, current, Some(previous), &mut self.announcer());
        if key.category == Category::Player {
            for aoi in [previous, current] {
                self.grid.record(aoi, |packet| {
                    packet.update_property(key, Property::Aoi(current));
                });
            }
        }
        log::trace!(
            "{} {} moved from area {previous} to {current}",
            key.category.as_str(),
            key.id
        );
        Ok(())
    }

    /// Starts a player walking along `path`, which begins at its current
    /// cell. The route carries the player's latency estimate.
    pub fn handle_path(
        &self,
        player: EntityId,
        path: Vec<Cell>,
        action: u8,
        orientation: Option<Orientation>,
        now_ms: u64,
    ) -> Result<(), WorldError> {
        if let Some(&cell) = path.iter().find(|c| self.layout().aoi_at(**c).is_none()) {
            return Err(WorldError::OffMap(cell));
        }
        let orientation = orientation.or_else(|| match path.as_slice() {
            [.., from, to] => Orientation::of_step(*from, *to),
            _ => None,
        });
        let latency = self
            .subscribers
            .lock()
            .get(&player)
            .map(|s| s.latency.median())
            .unwrap_or_default();
        let route = Route::new(player, path, now_ms, latency, action, orientation)?;

        let mut table = self.entities.write();
        let entity = table
            .players
            .get_mut(&player)
            .ok_or(WorldError::Unknown(EntityKey::player(player)))?;
        let trimmed = route.trim(Role::Player);
        entity.route = Some(route);
        let aoi = entity.aoi;
        self.grid
            .record(aoi, |packet| packet.update_route(player, trimmed));
        Ok(())
    }

    pub fn move_monster(
        &self,
        monster: EntityId,
        path: Vec<Cell>,
        now_ms: u64,
    ) -> Result<(), WorldError> {
        if let Some(&cell) = path.iter().find(|c| self.layout().aoi_at(**c).is_none()) {
            return Err(WorldError::OffMap(cell));
        }
        let route = Route::new(monster, path, now_ms, 0, 0, None)?;

        let mut table = self.entities.write();
        let entity = table
            .monsters
            .get_mut(&monster)
            .ok_or(WorldError::Unknown(EntityKey::monster(monster)))?;
        let trimmed = route.trim(Role::Monster);
        entity.route = Some(route);
        let aoi = entity.aoi;
        self.grid
            .record(aoi, |packet| packet.update_route(monster, trimmed));
        Ok(())
    }

    /// Moves walking entities along their routes. Clients interpolate the
    /// walk themselves, so only area changes are announced. Returns how many
    /// routes finished.
    pub fn advance(&self, now_ms: u64) -> usize {
        let ms_per_cell = self.config.ms_per_cell;
        let mut table = self.entities.write();
        let mut moved = Vec::new();
        let mut finished = 0;

        let walkers = &mut *table;
        let players = walkers
            .players
            .values_mut()
            .map(|p| (EntityKey::player(p.id), &mut p.cell, &mut p.route));
        let monsters = walkers
            .monsters
            .values_mut()
            .map(|m| (EntityKey::monster(m.id), &mut m.cell, &mut m.route));
        for (key, cell, slot) in players.chain(monsters) {
            let Some(route) = slot.as_ref() else {
                continue;
            };
            let position = route.position_at(now_ms, ms_per_cell);
            if route.is_complete(now_ms, ms_per_cell) {
                *slot = None;
                finished += 1;
            }
            if position != *cell {
                *cell = position;
                moved.push((key, position));
            }
        }

        for (key, cell) in moved {
            if let Err(err) = self.relocate(&mut table, key, cell) {
                log::warn!("failed to relocate {} {}: {err}", key.category.as_str(), key.id);
            }
        }
        finished
    }

    /// Applies a hit and reports whether it was fatal.
    pub fn hit(
        &self,
        attacker: EntityKey,
        target: EntityKey,
        amount: u16,
    ) -> Result<bool, WorldError> {
        let mut table = self.entities.write();
        let (life, aoi, kind) = match target.category {
            Category::Player => {
                let p = table
                    .players
                    .get_mut(&target.id)
                    .ok_or(WorldError::Unknown(target))?;
                if !p.alive {
                    return Err(WorldError::Dead(target));
                }
                p.life = p.life.saturating_sub(amount);
                p.last_hitter = Some(attacker.id);
                (p.life, p.aoi, None)
            }
            Category::Monster => {
                let m = table
                    .monsters
                    .get_mut(&target.id)
                    .ok_or(WorldError::Unknown(target))?;
                if !m.alive {
                    return Err(WorldError::Dead(target));
                }
                m.life = m.life.saturating_sub(amount);
                m.last_hitter = Some(attacker.id);
                (m.life, m.aoi, Some(m.kind))
            }
            Category::Item => {
                return Err(WorldError::NotApplicable {
                    property: "hit",
                    category: target.category.as_str(),
                });
            }
        };
        let killed = life == 0;
        if killed {
            if let Some(entity) = table.entity_mut(target) {
                entity.apply(Property::Alive(false));
                entity.apply(Property::InFight(false));
            }
        }
        self.grid.record(aoi, |packet| {
            packet.update_property(target, Property::LastHitter(attacker.id));
            if killed {
                packet.update_property(target, Property::Alive(false));
                packet.update_property(target, Property::InFight(false));
            }
        });

        let mut subscribers = self.subscribers.lock();
        if target.category == Category::Player {
            if let Some(subscriber) = subscribers.get_mut(&target.id) {
                subscriber.personal.update_life(life);
                subscriber.personal.add_hp(true, amount, Some(attacker.id));
            }
        }
        if attacker.category == Category::Player {
            if let Some(subscriber) = subscribers.get_mut(&attacker.id) {
                subscriber.personal.add_hp(false, amount, Some(target.id));
                if let (true, Some(kind)) = (killed, kind) {
                    subscriber.personal.add_killed(kind);
                }
            }
        }
        Ok(killed)
    }

    pub fn record_latency(&self, player: EntityId, sample_ms: u32) -> bool {
        match self.subscribers.lock().get_mut(&player) {
            Some(subscriber) => {
                subscriber.latency.push(sample_ms);
                true
            }
            None => false,
        }
    }

    pub fn latency(&self, player: EntityId) -> Option<u32> {
        self.subscribers
            .lock()
            .get(&player)
            .map(|s| s.latency.median())
    }

    /// Gives access to the player's personal packet for this tick.
    pub fn personal<R>(
        &self,
        player: EntityId,
        f: impl FnOnce(&mut PersonalUpdatePacket) -> R,
    ) -> Option<R> {
        self.subscribers
            .lock()
            .get_mut(&player)
            .map(|s| f(&mut s.personal))
    }

    pub fn player_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.subscribers.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn nb_connected(&self) -> usize {
        self.subscribers.lock().len()
    }

    pub fn snapshot(&self, key: EntityKey) -> Option<Snapshot> {
        self.entities.read().get(key).map(|e| e.trim())
    }

    pub fn position(&self, key: EntityKey) -> Option<Cell> {
        self.entities.read().get(key).map(|e| e.cell())
    }

    pub fn aoi_of(&self, key: EntityKey) -> Option<AoiId> {
        self.entities.read().get(key).map(|e| e.aoi())
    }

    /// Adds full snapshots of everything currently in `aoi`.
    pub fn synchronize(&self, packet: &mut UpdatePacket, aoi: AoiId) {
        let table = self.entities.read();
        let keys = self.grid.entities(aoi);
        packet.synchronize(keys.into_iter().filter_map(|key| table.get(key)));
    }

    /// Adds full snapshots of the given entities, skipping any that left.
    pub fn snapshot_into(&self, packet: &mut UpdatePacket, keys: &[EntityKey]) {
        let table = self.entities.read();
        packet.synchronize(keys.iter().filter_map(|&key| table.get(key)));
    }

    /// Takes what `player` accumulated since the last flush.
    pub fn take_delivery(&self, player: EntityId) -> Option<PendingDelivery> {
        let table = self.entities.read();
        let aoi = table.players.get(&player)?.aoi;
        let mut subscribers = self.subscribers.lock();
        let subscriber = subscribers.get_mut(&player)?;
        Some(PendingDelivery {
            player,
            aoi,
            personal: std::mem::take(&mut subscriber.personal),
            catch_up: std::mem::take(&mut subscriber.catch_up).into_iter().collect(),
            new_aois: std::mem::take(&mut subscriber.new_aois),
            latency: subscriber.latency.median(),
        })
    }

    pub fn init_frame(&self, player: EntityId, stamp: u32) -> Option<InitFrame> {
        let snapshot = match self.snapshot(EntityKey::player(player))? {
            Snapshot::Player(snapshot) => snapshot,
            _ => return None,
        };
        Some(InitFrame {
            stamp,
            nb_connected: self.nb_connected().min(usize::from(u16::MAX)) as u16,
            nb_aoi_horizontal: self.layout().nb_aoi_horizontal(),
            last_aoi_id: self.layout().last_aoi_id(),
            player: snapshot,
        })
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;

    fn world() -> World {
        World::new(GridLayout::new(30, 30, 10, 10).unwrap(), WorldConfig::default())
    }

    fn rat() -> MonsterInfo {
        MonsterInfo {
            kind: 2,
            name: "rat".into(),
            life: 10,
        }
    }

    #[test]
    fn join_queues_own_neighbourhood() {
        let world = world();
        let id = world.join("ann", UVec2::new(15, 15)).unwrap();
        let delivery = world.take_delivery(id).unwrap();

        assert_eq!(delivery.aoi, 4);
        assert_eq!(delivery.new_aois.len(), 9);
        assert!(delivery.catch_up.is_empty());
        assert!(world.take_delivery(id).unwrap().new_aois.is_empty());
    }

    #[test]
    fn observers_learn_about_newcomers() {
        let world = world();
        let ann = world.join("ann", UVec2::new(1, 1)).unwrap();
        world.take_delivery(ann);
        let bob = world.join("bob", UVec2::new(12, 1)).unwrap();
        let far = world.join("far", UVec2::new(29, 29)).unwrap();

        let delivery = world.take_delivery(ann).unwrap();
        assert_eq!(delivery.catch_up, [EntityKey::player(bob)]);
        assert!(world.take_delivery(far).unwrap().catch_up.is_empty());
    }

    #[test]
    fn off_map_join_rejected() {
        assert_eq!(
            world().join("ann", UVec2::new(30, 0)),
            Err(WorldError::OffMap(UVec2::new(30, 0)))
        );
    }

    #[test]
    fn ids_bounded_by_wire() {
        let world = World::new(
            GridLayout::new(10, 10, 10, 10).unwrap(),
            WorldConfig {
                max_id: 2,
                ..Default::default()
            },
        );
        assert!(world.spawn_monster(&rat(), UVec2::ZERO).is_ok());
        assert!(world.spawn_monster(&rat(), UVec2::ZERO).is_ok());
        assert_eq!(
            world.spawn_monster(&rat(), UVec2::ZERO),
            Err(WorldError::IdsExhausted)
        );
    }

    #[test]
    fn property_lands_in_own_area() {
        let world = world();
        let id = world.spawn_monster(&rat(), UVec2::new(25, 5)).unwrap();
        world
            .set_property(EntityKey::monster(id), Property::InFight(true))
            .unwrap();

        let packets = world.grid().flush();
        let delta = packets[2].delta(EntityKey::monster(id)).unwrap();
        assert_eq!(delta.in_fight, Some(true));
        assert!(packets[1].is_empty());
    }

    #[test]
    fn foreign_property_rejected() {
        let world = world();
        let id = world.spawn_monster(&rat(), UVec2::ZERO).unwrap();
        assert!(matches!(
            world.set_property(EntityKey::monster(id), Property::Weapon(1)),
            Err(WorldError::NotApplicable { .. })
        ));
    }

    #[test]
    fn crossing_an_edge_moves_between_areas() {
        let world = world();
        let id = world.join("ann", UVec2::new(9, 5)).unwrap();
        world.take_delivery(id);

        world
            .set_property(EntityKey::player(id), Property::Position(UVec2::new(10, 5)))
            .unwrap();

        assert_eq!(world.aoi_of(EntityKey::player(id)), Some(1));
        assert_eq!(world.grid().entities(1), [EntityKey::player(id)]);
        let mut revealed = world.take_delivery(id).unwrap().new_aois;
        revealed.sort_unstable();
        assert_eq!(revealed, [2, 5]);
    }

    #[test]
    fn path_carries_latency_and_walks() {
        let world = world();
        let id = world.join("ann", UVec2::new(8, 0)).unwrap();
        world.record_latency(id, 35);
        let path = vec![UVec2::new(8, 0), UVec2::new(9, 0), UVec2::new(10, 0)];
        world.handle_path(id, path, 0, None, 1_000).unwrap();

        let packets = world.grid().flush();
        let route = packets[0]
            .delta(EntityKey::player(id))
            .and_then(|d| d.route.clone())
            .unwrap();
        assert_eq!(
            route,
            crate::route::TrimmedRoute::Player {
                orientation: Some(Orientation::Right),
                end: UVec2::new(10, 0),
                delta: 35
            }
        );

        assert_eq!(world.advance(1_000 + 2 * world.config().ms_per_cell), 1);
        assert_eq!(world.position(EntityKey::player(id)), Some(UVec2::new(10, 0)));
        assert_eq!(world.aoi_of(EntityKey::player(id)), Some(1));
    }

    #[test]
    fn fatal_hit_credits_killer() {
        let world = world();
        let ann = world.join("ann", UVec2::new(1, 1)).unwrap();
        let rat = world.spawn_monster(&rat(), UVec2::new(2, 1)).unwrap();

        assert!(!world.hit(EntityKey::player(ann), EntityKey::monster(rat), 4).unwrap());
        assert!(world.hit(EntityKey::player(ann), EntityKey::monster(rat), 6).unwrap());

        let personal = world.take_delivery(ann).unwrap().personal;
        assert_eq!(personal.hp().len(), 2);
        assert_eq!(personal.killed(), [2]);
        let Some(Snapshot::Monster(snapshot)) = world.snapshot(EntityKey::monster(rat)) else {
            panic!("rat should still exist");
        };
        assert!(!snapshot.alive);
        assert_eq!(
            world.hit(EntityKey::player(ann), EntityKey::monster(rat), 1),
            Err(WorldError::Dead(EntityKey::monster(rat)))
        );
    }

    #[test]
    fn leave_announces_disconnect() {
        let world = world();
        let id = world.join("ann", UVec2::new(1, 1)).unwrap();
        world.leave(id).unwrap();

        assert!(world.take_delivery(id).is_none());
        assert_eq!(world.grid().flush()[0].disconnected(), [id]);
        assert_eq!(world.leave(id), Err(WorldError::Unknown(EntityKey::player(id))));
    }
}
