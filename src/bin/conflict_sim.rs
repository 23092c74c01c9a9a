//! Conflict simulation demo
//! Two bordering nations go to war; runs either a fixed number of simulated
//! ticks or the live scheduler for a while.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use conflict_engine::core::types::{now_millis, Timestamp, MINUTE_MS};
use conflict_engine::events::{ChannelSink, EventSink, TracingSink};
use conflict_engine::random;
use conflict_engine::sandbox::SandboxWorld;
use conflict_engine::warfare::{DeclareWar, UnitCounts, UnitType, WarType};
use conflict_engine::{ConflictConfig, ConflictEngine, ConflictScheduler, EngineStores, Result};

/// Conflict Sim - Drive a war between two sandbox nations
#[derive(Parser, Debug)]
#[command(name = "conflict_sim")]
#[command(about = "Run a war, siege and hostilities simulation between sandbox nations")]
struct Args {
    /// Random seed for reproducible runs (entropy when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Simulated war ticks to run offline; 0 runs the live scheduler instead
    #[arg(long, default_value_t = 200)]
    ticks: u32,

    /// How long the live scheduler runs
    #[arg(long, default_value_t = 30)]
    seconds: u64,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Persist records as JSON under this directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// One-second cadences and no battle cooldown in live mode
    #[arg(long, default_value_t = false)]
    fast: bool,
}

struct Scenario {
    world: Arc<SandboxWorld>,
    attacker: conflict_engine::core::NationId,
    defender: conflict_engine::core::NationId,
}

fn build_world() -> Scenario {
    let world = SandboxWorld::new();
    let attacker = world.add_nation("northmark", 250_000.0);
    let defender = world.add_nation("southvale", 180_000.0);
    world.add_nation("eastreach", 60_000.0);

    world.claim_area(&attacker, "overworld", (0, 9), (0, 9));
    world.claim_area(&defender, "overworld", (10, 19), (0, 9));

    let mut north = UnitCounts::new();
    north.insert(UnitType::Infantry, 400);
    north.insert(UnitType::Cavalry, 120);
    north.insert(UnitType::Artillery, 40);
    world.set_units(&attacker, north);

    let mut south = UnitCounts::new();
    south.insert(UnitType::Infantry, 350);
    south.insert(UnitType::Artillery, 60);
    world.set_units(&defender, south);

    world.add_settlement("southvale-keep", &defender);
    Scenario {
        world,
        attacker,
        defender,
    }
}

fn load_config(args: &Args) -> Result<ConflictConfig> {
    let mut config = match &args.config {
        Some(path) => ConflictConfig::load(path)?,
        None => ConflictConfig::default(),
    };
    if args.fast {
        config.battle_cooldown_ms = 0;
        config.war_tick_secs = 1;
        config.front_decay_secs = 1;
        config.siege_tick_secs = 1;
        config.trade_war_tick_secs = 1;
        config.terror_tick_secs = 1;
    }
    Ok(config)
}

/// Open every kind of hostility; records restored from a data dir may already exist
fn open_hostilities(engine: &ConflictEngine, scenario: &Scenario, now: Timestamp) {
    let request = DeclareWar::new(
        scenario.attacker.as_str(),
        scenario.defender.as_str(),
        WarType::Territorial,
    )
    .with_goals(["Annex the southern marches"]);
    match engine.declare_war(request, now) {
        Ok(war_id) => println!("War declared: {}", war_id),
        Err(e) => tracing::warn!("war not declared: {}", e),
    }

    if let Err(e) = engine.start_siege(
        &"southvale-keep".into(),
        &scenario.attacker,
        &scenario.defender,
        now,
    ) {
        tracing::warn!("siege not started: {}", e);
    }
    if let Err(e) = engine
        .trade_wars()
        .start_trade_war(&scenario.defender, &scenario.attacker, 15.0, now)
    {
        tracing::warn!("trade war not started: {}", e);
    }
    if let Err(e) = engine
        .terror()
        .create_cell(&scenario.attacker, &"eastreach".into(), 20_000.0, now)
    {
        tracing::warn!("terror cell not created: {}", e);
    }
}

fn run_offline(engine: &ConflictEngine, ticks: u32, start: Timestamp) {
    let step = engine.config().war_tick_secs * 1000;
    let mut now = start;
    for tick in 1..=ticks {
        now += step;
        let ended = engine.run_war_tick(now);
        if tick % 3 == 0 {
            engine.run_front_decay(now);
            engine.run_siege_tick();
        }
        if tick % 5 == 0 {
            engine.run_trade_war_tick();
        }
        if tick % 15 == 0 {
            engine.run_terror_tick(now);
        }
        if !ended.is_empty() {
            println!("Tick {}: {} war(s) ended", tick, ended.len());
            break;
        }
    }
    println!("Simulated {:.1} hours", (now - start) as f64 / (60.0 * MINUTE_MS as f64));
}

fn print_summary(engine: &ConflictEngine, scenario: &Scenario) {
    let world = &scenario.world;
    println!();
    println!("--- Summary ---");
    for nation in [&scenario.attacker, &scenario.defender] {
        println!(
            "{}: treasury {:.0}, territory {}, stability {:.0}",
            nation,
            world.treasury(nation),
            world.territory(nation).len(),
            world.stability(nation)
        );
    }
    for war in engine.wars().active_wars() {
        println!(
            "War {} [{:?}]: {} battles ({}-{}), {} units occupied",
            war.id,
            war.status,
            war.battles_fought,
            war.attacker_wins,
            war.defender_wins,
            war.occupied_units.len()
        );
    }
    let global = engine.wars().global_statistics();
    println!("Active wars: {}, fronts: {}", global.total_active_wars, global.total_fronts);
    println!("Active sieges: {}", engine.sieges().len());
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("conflict_engine=info")
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    config.validate().map_err(conflict_engine::ConflictError::Config)?;

    let stores = match &args.data_dir {
        Some(dir) => EngineStores::json_dir(dir)?,
        None => EngineStores::in_memory(),
    };
    let rng = match args.seed {
        Some(seed) => random::seeded(seed),
        None => random::entropy(),
    };

    let scenario = build_world();
    let live = args.ticks == 0;

    let mut receiver = None;
    let events: Arc<dyn EventSink> = if live {
        let (sink, rx) = ChannelSink::new(config.event_channel_capacity);
        receiver = Some(rx);
        Arc::new(sink)
    } else {
        Arc::new(TracingSink)
    };

    let engine = Arc::new(ConflictEngine::load(
        config,
        scenario.world.collaborators(),
        stores,
        events,
        Box::new(rng),
    ));

    let start = now_millis();
    open_hostilities(&engine, &scenario, start);

    if live {
        let printer = receiver.map(|mut rx| {
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    if let Ok(json) = serde_json::to_string(&event) {
                        println!("{}", json);
                    }
                }
            })
        });

        let handle = ConflictScheduler::new(Arc::clone(&engine)).start();
        tokio::time::sleep(Duration::from_secs(args.seconds)).await;
        handle.shutdown().await;
        if let Some(printer) = printer {
            printer.abort();
        }
    } else {
        run_offline(&engine, args.ticks, start);
    }

    print_summary(&engine, &scenario);
    Ok(())
}
