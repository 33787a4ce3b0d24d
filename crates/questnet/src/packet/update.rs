use std::collections::BTreeMap;

use crate::codec::{Record, ToRecord};
use crate::route::TrimmedRoute;

use super::{
    Category, Delta, EntityId, EntityKey, ItemSnapshot, MonsterSnapshot, PlayerSnapshot, Property,
    Snapshot, Trim,
};

/// Everything observers of one area need to learn since the last flush:
/// full snapshots of newcomers, departures, and per-entity deltas.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePacket {
    new_players: Vec<PlayerSnapshot>,
    new_items: Vec<ItemSnapshot>,
    new_monsters: Vec<MonsterSnapshot>,
    disconnected: Vec<EntityId>,
    players: BTreeMap<EntityId, Delta>,
    items: BTreeMap<EntityId, Delta>,
    monsters: BTreeMap<EntityId, Delta>,
}

impl UpdatePacket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_players(&self) -> &[PlayerSnapshot] {
        &self.new_players
    }

    pub fn new_items(&self) -> &[ItemSnapshot] {
        &self.new_items
    }

    pub fn new_monsters(&self) -> &[MonsterSnapshot] {
        &self.new_monsters
    }

    pub fn disconnected(&self) -> &[EntityId] {
        &self.disconnected
    }

    pub fn deltas(&self, category: Category) -> &BTreeMap<EntityId, Delta> {
        match category {
            Category::Player => &self.players,
            Category::Item => &self.items,
            Category::Monster => &self.monsters,
        }
    }

    fn deltas_mut(&mut self, category: Category) -> &mut BTreeMap<EntityId, Delta> {
        match category {
            Category::Player => &mut self.players,
            Category::Item => &mut self.items,
            Category::Monster => &mut self.monsters,
        }
    }

    pub fn delta(&self, key: EntityKey) -> Option<&Delta> {
        self.deltas(key.category).get(&key.id)
    }

    /// Whether a full snapshot of `key` is already queued.
    pub fn has_snapshot(&self, key: EntityKey) -> bool {
        match key.category {
            Category::Player => self.new_players.iter().any(|s| s.id == key.id),
            Category::Item => self.new_items.iter().any(|s| s.id == key.id),
            Category::Monster => self.new_monsters.iter().any(|s| s.id == key.id),
        }
    }

    /// Queues a full snapshot of `entity` unless one is already present.
    pub fn add_object(&mut self, entity: impl Trim) -> bool {
        if self.has_snapshot(entity.key()) {
            return false;
        }
        self.push_snapshot(entity.trim());
        true
    }

    pub fn add_snapshot(&mut self, snapshot: Snapshot) -> bool {
        let key = EntityKey {
            category: snapshot.category(),
            id: snapshot.id(),
        };
        if self.has_snapshot(key) {
            return false;
        }
        self.push_snapshot(snapshot);
        true
    }

    fn push_snapshot(&mut self, snapshot: Snapshot) {
        match snapshot {
            Snapshot::Player(s) => self.new_players.push(s),
            Snapshot::Item(s) => self.new_items.push(s),
            Snapshot::Monster(s) => self.new_monsters.push(s),
        }
    }

    /// Records a property change. Properties clients do not track for the
    /// entity's category are dropped.
    pub fn update_property(&mut self, key: EntityKey, property: Property) -> bool {
        if !property.applies_to(key.category) {
            log::debug!(
                "ignoring {} for {} {}",
                property.name(),
                key.category.as_str(),
                key.id
            );
            return false;
        }
        self.deltas_mut(key.category)
            .entry(key.id)
            .or_default()
            .apply(property);
        true
    }

    /// Stores the trimmed route of a player or monster, replacing any
    /// previous one in this packet.
    pub fn update_route(&mut self, id: EntityId, route: TrimmedRoute) {
        let category = match route {
            TrimmedRoute::Player { .. } => Category::Player,
            TrimmedRoute::Monster { .. } => Category::Monster,
        };
        self.deltas_mut(category).entry(id).or_default().route = Some(route);
    }

    pub fn add_disconnect(&mut self, id: EntityId) {
        if !self.disconnected.contains(&id) {
            self.disconnected.push(id);
        }
    }

    /// Strips what the recipient already knows: its own route, its own
    /// arrival, and partial updates superseded by a full snapshot.
    pub fn remove_echo(&mut self, recipient: EntityId) {
        if let Some(delta) = self.players.get_mut(&recipient) {
            delta.route = None;
            if delta.is_empty() {
                self.players.remove(&recipient);
            }
        }
        self.new_players.retain(|s| s.id != recipient);

        for snapshot in &self.new_players {
            self.players.remove(&snapshot.id);
        }
        for snapshot in &self.new_items {
            self.items.remove(&snapshot.id);
        }
        for snapshot in &self.new_monsters {
            self.monsters.remove(&snapshot.id);
        }
    }

    /// Adds a full snapshot of every given entity not already queued.
    pub fn synchronize<T: Trim>(&mut self, entities: impl IntoIterator<Item = T>) {
        for entity in entities {
            self.add_object(entity);
        }
    }

    /// Folds `other` into this packet. Snapshots are deduplicated by id and
    /// deltas for the same entity are combined, `other` winning.
    pub fn merge(&mut self, other: &UpdatePacket) {
        for s in &other.new_players {
            if !self.new_players.iter().any(|own| own.id == s.id) {
                self.new_players.push(s.clone());
            }
        }
        for s in &other.new_items {
            if !self.new_items.iter().any(|own| own.id == s.id) {
                self.new_items.push(s.clone());
            }
        }
        for s in &other.new_monsters {
            if !self.new_monsters.iter().any(|own| own.id == s.id) {
                self.new_monsters.push(s.clone());
            }
        }
        for &id in &other.disconnected {
            self.add_disconnect(id);
        }
        for (own, theirs) in [
            (&mut self.players, &other.players),
            (&mut self.items, &other.items),
            (&mut self.monsters, &other.monsters),
        ] {
            for (id, delta) in theirs {
                own.entry(*id).or_default().merge(delta);
            }
        }
    }

    /// Drops delta entries that carry nothing.
    pub fn clean(&mut self) {
        self.players.retain(|_, d| !d.is_empty());
        self.items.retain(|_, d| !d.is_empty());
        self.monsters.retain(|_, d| !d.is_empty());
    }

    pub fn is_empty(&self) -> bool {
        self.new_players.is_empty()
            && self.new_items.is_empty()
            && self.new_monsters.is_empty()
            && self.disconnected.is_empty()
            && self.players.values().all(Delta::is_empty)
            && self.items.values().all(Delta::is_empty)
            && self.monsters.values().all(Delta::is_empty)
    }
}

fn snapshot_list<T: ToRecord>(snapshots: &[T]) -> Option<Vec<Record>> {
    (!snapshots.is_empty()).then(|| snapshots.iter().map(ToRecord::to_record).collect())
}

fn delta_map(deltas: &BTreeMap<EntityId, Delta>) -> Option<BTreeMap<u64, Record>> {
    let map: BTreeMap<u64, Record> = deltas
        .iter()
        .filter(|(_, delta)| !delta.is_empty())
        .map(|(&id, delta)| (u64::from(id), delta.to_record()))
        .collect();
    (!map.is_empty()).then_some(map)
}

impl ToRecord for UpdatePacket {
    fn to_record(&self) -> Record {
        let disconnected: Vec<u64> = self.disconnected.iter().map(|&id| u64::from(id)).collect();
        Record::new()
            .with_opt("newplayers", snapshot_list(&self.new_players))
            .with_opt("newitems", snapshot_list(&self.new_items))
            .with_opt("newmonsters", snapshot_list(&self.new_monsters))
            .with_opt("disconnected", (!disconnected.is_empty()).then_some(disconnected))
            .with_opt("players", delta_map(&self.players))
            .with_opt("items", delta_map(&self.items))
            .with_opt("monsters", delta_map(&self.monsters))
    }
}

#[cfg(test)]
mod tests {
    use glam::UVec2;

    use super::*;
    use crate::route::Orientation;

    fn player(id: EntityId) -> Snapshot {
        Snapshot::Player(PlayerSnapshot {
            id,
            cell: UVec2::new(1, 1),
            name: format!("p{id}"),
            aoi: 0,
            alive: true,
            in_fight: false,
            weapon: 1,
            armor: 2,
            target: None,
            route: None,
        })
    }

    fn walk() -> TrimmedRoute {
        TrimmedRoute::Player {
            orientation: Some(Orientation::Down),
            end: UVec2::new(5, 5),
            delta: 20,
        }
    }

    #[test]
    fn snapshots_are_deduplicated() {
        let mut packet = UpdatePacket::new();
        assert!(packet.add_snapshot(player(4)));
        assert!(!packet.add_snapshot(player(4)));
        assert_eq!(packet.new_players().len(), 1);
    }

    #[test]
    fn routes_land_in_their_category() {
        let mut packet = UpdatePacket::new();
        packet.update_route(3, walk());
        packet.update_route(
            3,
            TrimmedRoute::Monster {
                path: vec![UVec2::ZERO],
                delta: 0,
            },
        );

        assert!(packet.delta(EntityKey::player(3)).is_some());
        assert!(packet.delta(EntityKey::monster(3)).is_some());
    }

    #[test]
    fn echo_removal_drops_own_route_and_entry() {
        let mut packet = UpdatePacket::new();
        packet.update_route(9, walk());
        packet.add_snapshot(player(9));
        packet.remove_echo(9);

        assert!(packet.is_empty());
    }

    #[test]
    fn echo_removal_keeps_other_own_properties() {
        let mut packet = UpdatePacket::new();
        packet.update_route(9, walk());
        packet.update_property(EntityKey::player(9), Property::Alive(false));
        packet.remove_echo(9);

        let delta = packet.delta(EntityKey::player(9)).unwrap();
        assert_eq!(delta.route, None);
        assert_eq!(delta.alive, Some(false));
    }

    #[test]
    fn snapshot_supersedes_partial() {
        let mut packet = UpdatePacket::new();
        packet.update_property(EntityKey::player(2), Property::Weapon(4));
        packet.add_snapshot(player(2));
        packet.remove_echo(9);

        assert!(packet.delta(EntityKey::player(2)).is_none());
        assert_eq!(packet.new_players().len(), 1);
    }

    #[test]
    fn merge_combines_deltas_and_lists() {
        let mut a = UpdatePacket::new();
        a.update_property(EntityKey::monster(1), Property::Alive(true));
        a.add_disconnect(5);
        let mut b = UpdatePacket::new();
        b.update_property(EntityKey::monster(1), Property::InFight(true));
        b.add_disconnect(5);
        b.add_disconnect(6);
        a.merge(&b);

        let delta = a.delta(EntityKey::monster(1)).unwrap();
        assert_eq!(delta.alive, Some(true));
        assert_eq!(delta.in_fight, Some(true));
        assert_eq!(a.disconnected(), [5, 6]);
    }

    #[test]
    fn irrelevant_property_is_ignored() {
        let mut packet = UpdatePacket::new();
        assert!(!packet.update_property(EntityKey::item(1), Property::Weapon(3)));
        assert!(packet.is_empty());
    }

    #[test]
    fn record_omits_empty_sections() {
        let mut packet = UpdatePacket::new();
        packet.add_disconnect(8);
        let record = packet.to_record();

        assert_eq!(record.len(), 1);
        assert_eq!(record.ints("disconnected"), Some(&[8u64][..]));
    }
}
