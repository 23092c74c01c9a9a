//! The conflict engine facade
//!
//! Owns every conflict service and applies the cross-service rules: a war
//! that ends for any reason lifts the sieges between its belligerents.

use std::path::Path;
use std::sync::Arc;

use crate::core::config::ConflictConfig;
use crate::core::error::Result;
use crate::core::types::{NationId, SettlementId, Timestamp, WarId};
use crate::events::EventSink;
use crate::external::Collaborators;
use crate::hostility::{TerrorCell, TerrorService, TradeWar, TradeWarService};
use crate::persistence::{JsonDirStore, MemoryStore, RecordStore};
use crate::random::RandomSource;
use crate::siege::{Siege, SiegeService};
use crate::warfare::{DeclareWar, EndedWar, War, WarService};

/// One store per record kind
#[derive(Clone)]
pub struct EngineStores {
    pub wars: Arc<dyn RecordStore<War>>,
    pub sieges: Arc<dyn RecordStore<Siege>>,
    pub trade_wars: Arc<dyn RecordStore<TradeWar>>,
    pub terror_cells: Arc<dyn RecordStore<TerrorCell>>,
}

impl EngineStores {
    pub fn in_memory() -> Self {
        Self {
            wars: Arc::new(MemoryStore::<War>::new()),
            sieges: Arc::new(MemoryStore::<Siege>::new()),
            trade_wars: Arc::new(MemoryStore::<TradeWar>::new()),
            terror_cells: Arc::new(MemoryStore::<TerrorCell>::new()),
        }
    }

    /// JSON stores in `wars/`, `sieges/`, `tradewars/` and `terrorism/` under `root`
    pub fn json_dir(root: &Path) -> Result<Self> {
        Ok(Self {
            wars: Arc::new(JsonDirStore::<War>::open(root.join("wars"))?),
            sieges: Arc::new(JsonDirStore::<Siege>::open(root.join("sieges"))?),
            trade_wars: Arc::new(JsonDirStore::<TradeWar>::open(root.join("tradewars"))?),
            terror_cells: Arc::new(JsonDirStore::<TerrorCell>::open(root.join("terrorism"))?),
        })
    }
}

pub struct ConflictEngine {
    config: Arc<ConflictConfig>,
    wars: WarService,
    sieges: SiegeService,
    trade_wars: TradeWarService,
    terror: TerrorService,
}

impl ConflictEngine {
    /// Restore every service from its store
    pub fn load(
        config: ConflictConfig,
        collab: Collaborators,
        stores: EngineStores,
        events: Arc<dyn EventSink>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let config = Arc::new(config);
        let wars = WarService::load(
            Arc::clone(&config),
            collab.clone(),
            stores.wars,
            Arc::clone(&events),
            rng,
        );
        let sieges = SiegeService::load(
            Arc::clone(&config),
            collab.clone(),
            stores.sieges,
            Arc::clone(&events),
        );
        let trade_wars = TradeWarService::load(
            Arc::clone(&config),
            collab.clone(),
            stores.trade_wars,
            Arc::clone(&events),
        );
        let terror = TerrorService::load(Arc::clone(&config), collab, stores.terror_cells, events);

        Self {
            config,
            wars,
            sieges,
            trade_wars,
            terror,
        }
    }

    pub fn config(&self) -> &ConflictConfig {
        &self.config
    }

    pub fn wars(&self) -> &WarService {
        &self.wars
    }

    pub fn sieges(&self) -> &SiegeService {
        &self.sieges
    }

    pub fn trade_wars(&self) -> &TradeWarService {
        &self.trade_wars
    }

    pub fn terror(&self) -> &TerrorService {
        &self.terror
    }

    // === COMMANDS ===

    pub fn declare_war(&self, request: DeclareWar, now: Timestamp) -> Result<WarId> {
        self.wars.declare_war(request, now)
    }

    pub fn sue_for_peace(&self, id: &WarId, now: Timestamp) -> Result<EndedWar> {
        let ended = self.wars.sue_for_peace(id, now)?;
        self.after_war_ended(&ended);
        Ok(ended)
    }

    pub fn start_siege(
        &self,
        settlement: &SettlementId,
        attacker: &NationId,
        defender: &NationId,
        now: Timestamp,
    ) -> Result<()> {
        self.sieges.start_siege(settlement, attacker, defender, now)
    }

    // === SCHEDULED PASSES ===

    pub fn run_war_tick(&self, now: Timestamp) -> Vec<EndedWar> {
        let ended = self.wars.run_tick(now);
        for war in &ended {
            self.after_war_ended(war);
        }
        ended
    }

    pub fn run_front_decay(&self, now: Timestamp) -> usize {
        self.wars.run_front_decay(now)
    }

    pub fn run_siege_tick(&self) -> Vec<SettlementId> {
        self.sieges.run_tick()
    }

    pub fn run_trade_war_tick(&self) -> usize {
        self.trade_wars.run_tick()
    }

    pub fn run_terror_tick(&self, now: Timestamp) -> usize {
        self.terror.run_tick(now)
    }

    fn after_war_ended(&self, ended: &EndedWar) {
        let lifted = self.sieges.lift_between(&ended.attacker, &ended.defender);
        if !lifted.is_empty() {
            tracing::info!(war = %ended.war_id, sieges = lifted.len(), "sieges lifted with the war");
        }
    }
}
