use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;

use questnet::{
    Codec, Dispatcher, EntityId, EntityKey, GridLayout, ItemInfo, MonsterInfo, PacketKind,
    PacketSink, SchemaRegistry, SinkError, World, short_stamp,
};

use crate::config::ServerConfig;
use crate::events::{DisconnectReason, ServerEvent};
use crate::simulation::{Bot, BotConfig, Outbound, elapsed_ms, nearby_cell, random_cell, straight_path};

/// Hands frames to per-connection channels.
#[derive(Default)]
pub struct ChannelSink {
    outboxes: Mutex<HashMap<EntityId, mpsc::UnboundedSender<Outbound>>>,
    closed: Mutex<Vec<EntityId>>,
}

impl ChannelSink {
    pub fn register(&self, player: EntityId) -> mpsc::UnboundedReceiver<Outbound> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.outboxes.lock().insert(player, tx);
        rx
    }

    pub fn unregister(&self, player: EntityId) {
        self.outboxes.lock().remove(&player);
    }

    pub fn drain_closed(&self) -> Vec<EntityId> {
        std::mem::take(&mut *self.closed.lock())
    }
}

impl PacketSink for ChannelSink {
    fn send(&self, player: EntityId, kind: PacketKind, payload: Vec<u8>) -> Result<(), SinkError> {
        let mut outboxes = self.outboxes.lock();
        let delivered = outboxes
            .get(&player)
            .is_some_and(|tx| tx.send(Outbound { kind, payload }).is_ok());
        if !delivered {
            outboxes.remove(&player);
            drop(outboxes);
            self.closed.lock().push(player);
            return Err(SinkError::Closed(player));
        }
        Ok(())
    }
}

fn monster_table() -> Vec<MonsterInfo> {
    [("rat", 1, 12), ("bat", 2, 8), ("skeleton", 3, 30)]
        .into_iter()
        .map(|(name, kind, life)| MonsterInfo {
            kind,
            name: name.to_owned(),
            life,
        })
        .collect()
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

pub struct GameServer {
    world: Arc<World>,
    dispatcher: Dispatcher,
    sink: Arc<ChannelSink>,
    schemas: Arc<SchemaRegistry>,
    config: ServerConfig,
    rng: StdRng,
    monsters: Vec<EntityId>,
    tick: u64,
    start: Instant,
    running: Arc<AtomicBool>,
    pending_events: VecDeque<ServerEvent>,
}

impl GameServer {
    pub fn new(config: ServerConfig, seed: u64) -> Result<Self> {
        let (map_width, map_height) = config.map_size;
        let (aoi_width, aoi_height) = config.aoi_size;
        let layout = GridLayout::new(map_width, map_height, aoi_width, aoi_height)
            .context("invalid map layout")?;
        let schemas = Arc::new(SchemaRegistry::new().context("invalid packet schemas")?);

        let mut server = Self {
            world: Arc::new(World::new(layout, config.world)),
            dispatcher: Dispatcher::new(Codec::new(config.wire), Arc::clone(&schemas)),
            sink: Arc::new(ChannelSink::default()),
            schemas,
            rng: StdRng::seed_from_u64(seed),
            monsters: Vec::new(),
            tick: 0,
            start: Instant::now(),
            running: Arc::new(AtomicBool::new(true)),
            pending_events: VecDeque::new(),
            config,
        };
        server.populate()?;
        Ok(server)
    }

    fn populate(&mut self) -> Result<()> {
        let table = monster_table();
        for _ in 0..self.config.monsters {
            let info = &table[self.rng.random_range(0..table.len())];
            let cell = random_cell(&mut self.rng, self.world.layout());
            self.monsters.push(self.world.spawn_monster(info, cell)?);
        }
        for _ in 0..self.config.items {
            let chest = self.rng.random_bool(0.2);
            let info = ItemInfo {
                item_id: self.rng.random_range(1..40),
                respawn: !chest,
                chest,
                loot: false,
            };
            let cell = random_cell(&mut self.rng, self.world.layout());
            self.world.spawn_item(info, cell)?;
        }
        log::info!(
            "world ready: {} areas, {} monsters, {} items",
            self.world.grid().len(),
            self.config.monsters,
            self.config.items
        );
        Ok(())
    }

    pub fn world(&self) -> Arc<World> {
        Arc::clone(&self.world)
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    /// Joins a player at a random cell and sends it the init frame.
    pub fn connect(&mut self, name: &str) -> Result<(EntityId, mpsc::UnboundedReceiver<Outbound>)> {
        let cell = random_cell(&mut self.rng, self.world.layout());
        let player = self.world.join(name, cell)?;
        let inbox = self.sink.register(player);
        self.dispatcher
            .send_init(&self.world, player, short_stamp(wall_clock_ms()), &*self.sink)
            .with_context(|| format!("failed to initialize player {player}"))?;

        self.pending_events.push_back(ServerEvent::PlayerJoined {
            player,
            name: name.to_owned(),
        });
        Ok((player, inbox))
    }

    pub fn disconnect(&mut self, player: EntityId) {
        self.sink.unregister(player);
        match self.world.leave(player) {
            Ok(()) => self.pending_events.push_back(ServerEvent::PlayerLeft {
                player,
                reason: DisconnectReason::Graceful,
            }),
            Err(err) => self.pending_events.push_back(ServerEvent::Error {
                message: format!("disconnect of player {player}: {err}"),
            }),
        }
    }

    pub fn spawn_bots(&mut self) -> Result<()> {
        let bot_config = BotConfig {
            latency_ms: self.config.bot_latency_ms,
            act_every: self.config.update_rate * 5,
            wander_radius: 12,
            hit_damage: 4,
        };
        for index in 0..self.config.bots {
            let (player, inbox) = self.connect(&format!("bot{index}"))?;
            let bot = Bot {
                player,
                world: self.world(),
                codec: *self.dispatcher.codec(),
                schemas: Arc::clone(&self.schemas),
                inbox,
                config: bot_config.clone(),
                start: self.start,
                seed: self.rng.random(),
            };
            tokio::spawn(bot.run());
        }
        Ok(())
    }

    pub fn shutdown(&mut self) {
        for player in self.world.player_ids() {
            self.disconnect(player);
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Advances routes, moves some monsters, and dispatches one update.
    pub fn tick_once(&mut self) {
        let now = elapsed_ms(self.start);
        let finished = self.world.advance(now);
        if finished > 0 {
            log::trace!("{finished} routes finished");
        }

        if self.config.monster_wander_ticks > 0 && self.tick % self.config.monster_wander_ticks == 0 {
            self.wander_monsters(now);
        }

        let report = self
            .dispatcher
            .tick(&self.world, short_stamp(wall_clock_ms()), &*self.sink);
        for player in self.sink.drain_closed() {
            self.pending_events.push_back(ServerEvent::PlayerLeft {
                player,
                reason: DisconnectReason::ConnectionClosed,
            });
        }
        self.pending_events.push_back(ServerEvent::Dispatched {
            tick: self.tick,
            report,
        });
        self.tick += 1;
    }

    fn wander_monsters(&mut self, now: u64) {
        for &monster in &self.monsters {
            if !self.rng.random_bool(0.25) {
                continue;
            }
            let Some(from) = self.world.position(EntityKey::monster(monster)) else {
                continue;
            };
            let to = nearby_cell(&mut self.rng, self.world.layout(), from, 4);
            if to == from {
                continue;
            }
            if let Err(err) = self.world.move_monster(monster, straight_path(from, to), now) {
                self.pending_events.push_back(ServerEvent::Error {
                    message: format!("monster {monster} cannot move: {err}"),
                });
            }
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
