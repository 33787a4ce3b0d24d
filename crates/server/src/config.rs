use std::time::Duration;

use questnet::{WireConfig, WorldConfig};

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub update_rate: Duration,
    /// Map size in tiles.
    pub map_size: (u32, u32),
    pub aoi_size: (u32, u32),
    pub wire: WireConfig,
    pub world: WorldConfig,
    pub bots: usize,
    pub monsters: usize,
    pub items: usize,
    /// How often, in ticks, monsters pick a new destination.
    pub monster_wander_ticks: u64,
    pub bot_latency_ms: (u32, u32),
    pub run_for: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            update_rate: Duration::from_millis(questnet::DEFAULT_UPDATE_RATE_MS),
            map_size: (120, 120),
            aoi_size: (30, 20),
            wire: WireConfig::default(),
            world: WorldConfig::default(),
            bots: 8,
            monsters: 20,
            items: 10,
            monster_wander_ticks: 5,
            bot_latency_ms: (20, 80),
            run_for: None,
        }
    }
}
