//! Periodic drivers for the engine's passes
//!
//! Each cadence gets its own tokio task. Passes are synchronous and run on
//! the blocking pool; shutdown waits for any pass already in flight.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::types::now_millis;
use crate::engine::ConflictEngine;

/// A periodic pass over one kind of record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Pass {
    WarTick,
    FrontDecay,
    Siege,
    TradeWar,
    Terror,
}

impl Pass {
    pub const ALL: [Pass; 5] = [
        Pass::WarTick,
        Pass::FrontDecay,
        Pass::Siege,
        Pass::TradeWar,
        Pass::Terror,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Pass::WarTick => "war",
            Pass::FrontDecay => "front-decay",
            Pass::Siege => "siege",
            Pass::TradeWar => "trade-war",
            Pass::Terror => "terror",
        }
    }

    fn configured_period(&self, engine: &ConflictEngine) -> Duration {
        let config = engine.config();
        let secs = match self {
            Pass::WarTick => config.war_tick_secs,
            Pass::FrontDecay => config.front_decay_secs,
            Pass::Siege => config.siege_tick_secs,
            Pass::TradeWar => config.trade_war_tick_secs,
            Pass::Terror => config.terror_tick_secs,
        };
        Duration::from_secs(secs)
    }

    /// Run the pass once against the wall clock
    pub fn run(&self, engine: &ConflictEngine) {
        let now = now_millis();
        match self {
            Pass::WarTick => {
                let ended = engine.run_war_tick(now);
                tracing::debug!(ended = ended.len(), "war pass");
            }
            Pass::FrontDecay => {
                engine.run_front_decay(now);
            }
            Pass::Siege => {
                let captured = engine.run_siege_tick();
                tracing::debug!(captured = captured.len(), "siege pass");
            }
            Pass::TradeWar => {
                engine.run_trade_war_tick();
            }
            Pass::Terror => {
                engine.run_terror_tick(now);
            }
        }
    }
}

pub struct ConflictScheduler {
    engine: Arc<ConflictEngine>,
    overrides: BTreeMap<Pass, Duration>,
}

impl ConflictScheduler {
    pub fn new(engine: Arc<ConflictEngine>) -> Self {
        Self {
            engine,
            overrides: BTreeMap::new(),
        }
    }

    /// Replace the configured period of one pass
    pub fn with_period(mut self, pass: Pass, period: Duration) -> Self {
        self.overrides.insert(pass, period);
        self
    }

    pub fn period(&self, pass: Pass) -> Duration {
        self.overrides
            .get(&pass)
            .copied()
            .unwrap_or_else(|| pass.configured_period(&self.engine))
    }

    /// Spawn one driver per pass on the current runtime
    pub fn start(self) -> SchedulerHandle {
        let (shutdown, watcher) = watch::channel(false);
        let tasks = Pass::ALL
            .into_iter()
            .map(|pass| {
                let period = self.period(pass);
                tokio::spawn(drive(Arc::clone(&self.engine), pass, period, watcher.clone()))
            })
            .collect();
        tracing::info!("conflict scheduler started");
        SchedulerHandle { shutdown, tasks }
    }
}

async fn drive(
    engine: Arc<ConflictEngine>,
    pass: Pass,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; passes start one period in
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let engine = Arc::clone(&engine);
                if let Err(e) = tokio::task::spawn_blocking(move || pass.run(&engine)).await {
                    tracing::error!(pass = pass.name(), "pass panicked: {}", e);
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::debug!(pass = pass.name(), "driver stopped");
}

/// Running scheduler; dropping it also stops the drivers, without waiting
pub struct SchedulerHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// Stop every driver, waiting for passes already in flight
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::error!("scheduler task failed: {}", e);
            }
        }
        tracing::info!("conflict scheduler stopped");
    }
}
