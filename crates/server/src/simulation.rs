use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::UVec2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use questnet::{
    Cell, Codec, EntityId, EntityKey, GridLayout, PacketKind, Property, Record, SchemaRegistry,
    World,
};

/// An encoded frame on its way to one connection.
#[derive(Debug)]
pub struct Outbound {
    pub kind: PacketKind,
    pub payload: Vec<u8>,
}

/// Stand-in for the pathfinder: walks along x, then along y.
pub fn straight_path(from: Cell, to: Cell) -> Vec<Cell> {
    let mut path = vec![from];
    let mut at = from;
    while at.x != to.x {
        at.x = if to.x > at.x { at.x + 1 } else { at.x - 1 };
        path.push(at);
    }
    while at.y != to.y {
        at.y = if to.y > at.y { at.y + 1 } else { at.y - 1 };
        path.push(at);
    }
    path
}

pub fn random_cell(rng: &mut impl Rng, layout: &GridLayout) -> Cell {
    let size = layout.map_size();
    UVec2::new(rng.random_range(0..size.x), rng.random_range(0..size.y))
}

/// A cell at most `radius` tiles away on each axis, clamped to the map.
pub fn nearby_cell(rng: &mut impl Rng, layout: &GridLayout, from: Cell, radius: u32) -> Cell {
    let last = layout.map_size() - UVec2::ONE;
    let min = from.saturating_sub(UVec2::splat(radius)).min(last);
    let max = (from + UVec2::splat(radius)).min(last);
    UVec2::new(
        rng.random_range(min.x..=max.x),
        rng.random_range(min.y..=max.y),
    )
}

pub fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub latency_ms: (u32, u32),
    pub act_every: Duration,
    pub wander_radius: u32,
    pub hit_damage: u16,
}

/// A simulated client: decodes what it receives, reports latency samples,
/// wanders, and picks fights with monsters it has been told about.
pub struct Bot {
    pub player: EntityId,
    pub world: Arc<World>,
    pub codec: Codec,
    pub schemas: Arc<SchemaRegistry>,
    pub inbox: mpsc::UnboundedReceiver<Outbound>,
    pub config: BotConfig,
    pub start: Instant,
    pub seed: u64,
}

impl Bot {
    pub async fn run(mut self) {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut act = tokio::time::interval(self.config.act_every);
        let mut known_monsters = BTreeSet::new();
        let mut received = 0usize;

        loop {
            tokio::select! {
                frame = self.inbox.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    received += 1;
                    self.observe(&frame, &mut known_monsters);
                    let (low, high) = self.config.latency_ms;
                    self.world.record_latency(self.player, rng.random_range(low..=high));
                }
                _ = act.tick() => {
                    if !self.act(&mut rng, &mut known_monsters) {
                        break;
                    }
                }
            }
        }

        log::debug!("bot {} stopped after {received} frames", self.player);
    }

    fn observe(&self, frame: &Outbound, known_monsters: &mut BTreeSet<EntityId>) {
        let schema = self.schemas.frame(frame.kind);
        let record = match self.codec.decode(&frame.payload, 0, schema) {
            Ok((record, _)) => record,
            Err(err) => {
                log::warn!(
                    "bot {} could not decode {} frame: {err}",
                    self.player,
                    frame.kind.as_str()
                );
                return;
            }
        };

        let Some(global) = record.object("global") else {
            return;
        };
        for monster in global.list("newmonsters").unwrap_or_default() {
            if let Some(id) = monster_id(monster) {
                known_monsters.insert(id);
            }
        }
        if let Some(deltas) = global.map("monsters") {
            for (&id, delta) in deltas {
                if delta.boolean("alive") == Some(false) {
                    known_monsters.remove(&(id as EntityId));
                }
            }
        }
    }

    /// Returns false once the bot's player no longer exists.
    fn act(&self, rng: &mut StdRng, known_monsters: &mut BTreeSet<EntityId>) -> bool {
        let me = EntityKey::player(self.player);
        let Some(from) = self.world.position(me) else {
            return false;
        };

        let target = (rng.random_bool(0.3) && !known_monsters.is_empty())
            .then(|| {
                let index = rng.random_range(0..known_monsters.len());
                known_monsters.iter().nth(index).copied()
            })
            .flatten();

        if let Some(monster) = target {
            let key = EntityKey::monster(monster);
            if let Err(err) = self.world.set_property(me, Property::Target(Some(monster))) {
                log::debug!("bot {} cannot target {monster}: {err}", self.player);
            }
            match self.world.hit(me, key, self.config.hit_damage) {
                Ok(true) => {
                    known_monsters.remove(&monster);
                    log::info!("bot {} killed monster {monster}", self.player);
                }
                Ok(false) => {}
                Err(err) => {
                    known_monsters.remove(&monster);
                    log::debug!("bot {} missed {monster}: {err}", self.player);
                }
            }
            return true;
        }

        let to = nearby_cell(rng, self.world.layout(), from, self.config.wander_radius);
        if to != from {
            let path = straight_path(from, to);
            if let Err(err) = self
                .world
                .handle_path(self.player, path, 0, None, elapsed_ms(self.start))
            {
                log::debug!("bot {} path rejected: {err}", self.player);
            }
        }
        true
    }
}

fn monster_id(record: &Record) -> Option<EntityId> {
    record.uint("id").map(|id| id as EntityId)
}
