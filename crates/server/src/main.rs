mod config;
mod events;
mod server;
mod simulation;

use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;

use config::ServerConfig;
use events::ServerEvent;
use questnet::WorldConfig;
use server::GameServer;

#[derive(Parser)]
#[command(name = "questnet-server")]
#[command(about = "Area-of-interest update server with simulated clients")]
struct Args {
    #[arg(short, long, default_value_t = questnet::DEFAULT_UPDATE_RATE_MS, help = "Update rate in ms")]
    update_rate: u64,

    #[arg(long, default_value_t = 120)]
    map_width: u32,

    #[arg(long, default_value_t = 120)]
    map_height: u32,

    #[arg(long, default_value_t = 30, help = "Area width in tiles")]
    aoi_width: u32,

    #[arg(long, default_value_t = 20, help = "Area height in tiles")]
    aoi_height: u32,

    #[arg(short, long, default_value_t = 8)]
    bots: usize,

    #[arg(long, default_value_t = 20)]
    monsters: usize,

    #[arg(long, default_value_t = 10)]
    items: usize,

    #[arg(long, default_value_t = 120, help = "Walking speed in ms per cell")]
    ms_per_cell: u64,

    #[arg(short, long, help = "Stop after this many seconds")]
    duration: Option<u64>,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let defaults = ServerConfig::default();
    let config = ServerConfig {
        update_rate: Duration::from_millis(args.update_rate.max(1)),
        map_size: (args.map_width, args.map_height),
        aoi_size: (args.aoi_width, args.aoi_height),
        world: WorldConfig {
            ms_per_cell: args.ms_per_cell,
            ..defaults.world
        },
        bots: args.bots,
        monsters: args.monsters,
        items: args.items,
        run_for: args.duration.map(Duration::from_secs),
        ..defaults
    };

    let mut server = GameServer::new(config.clone(), args.seed)?;
    server.spawn_bots()?;
    log::info!(
        "Server started: {}x{} map, updates every {:?}",
        args.map_width,
        args.map_height,
        config.update_rate
    );

    let running = server.running();
    let mut interval = tokio::time::interval(config.update_rate);
    let deadline = async {
        match config.run_for {
            Some(limit) => tokio::time::sleep(limit).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    while running.load(Ordering::SeqCst) {
        tokio::select! {
            _ = interval.tick() => {
                server.tick_once();
                log_events(&mut server);
            }
            _ = tokio::signal::ctrl_c() => {
                log::info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                log::info!("Run time elapsed after {} ticks", server.tick_count());
                break;
            }
        }
    }

    log::info!("Server shutting down after {:?}", server.elapsed());
    server.shutdown();
    log_events(&mut server);
    Ok(())
}

fn log_events(server: &mut GameServer) {
    for event in server.drain_events() {
        match event {
            ServerEvent::PlayerJoined { player, name } => {
                log::info!("Player {} ({}) joined", player, name);
            }
            ServerEvent::PlayerLeft { player, reason } => {
                log::info!("Player {} {}", player, reason.as_str());
            }
            ServerEvent::Dispatched { tick, report } => {
                if report.lost > 0 {
                    log::warn!("Tick {}: {} updates lost", tick, report.lost);
                }
                log::debug!(
                    "Tick {}: {} frames, {} bytes, {} idle",
                    tick,
                    report.sent,
                    report.bytes,
                    report.skipped
                );
            }
            ServerEvent::Error { message } => {
                log::error!("{}", message);
            }
        }
    }
}
