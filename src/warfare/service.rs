//! War commands and the per-tick war pass

use std::sync::{Arc, Mutex};

use rayon::prelude::*;

use crate::core::config::ConflictConfig;
use crate::core::error::{ConflictError, Result};
use crate::core::sync::lock;
use crate::core::types::{NationId, TerritoryUnit, Timestamp, WarId};
use crate::events::{ConflictEvent, EventSink};
use crate::external::Collaborators;
use crate::persistence::{self, PendingWrites, RecordStore};
use crate::random::RandomSource;
use crate::warfare::battle::{self, BattleOutcome};
use crate::warfare::front;
use crate::warfare::registry::{SharedWar, WarRegistry};
use crate::warfare::stats::{self, GlobalWarStats, NationWarStats};
use crate::warfare::strength;
use crate::warfare::war::{check_victory, Belligerent, War, WarType};

const RECORD_KIND: &str = "war";

/// Reputation shifts applied when a war ends by outright victory
const ATTACKER_WIN_REPUTATION: (f64, f64) = (-20.0, -30.0);
const DEFENDER_WIN_REPUTATION: (f64, f64) = (10.0, -20.0);

/// A declaration request
#[derive(Debug, Clone, PartialEq)]
pub struct DeclareWar {
    pub attacker: NationId,
    pub defender: NationId,
    pub war_type: WarType,
    pub goals: Vec<String>,
}

impl DeclareWar {
    pub fn new(attacker: impl Into<String>, defender: impl Into<String>, war_type: WarType) -> Self {
        Self {
            attacker: NationId::new(attacker),
            defender: NationId::new(defender),
            war_type,
            goals: Vec::new(),
        }
    }

    pub fn with_goals<I, S>(mut self, goals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.goals = goals.into_iter().map(Into::into).collect();
        self
    }
}

/// A war that has just left the active set
#[derive(Debug, Clone, PartialEq)]
pub struct EndedWar {
    pub war_id: WarId,
    pub attacker: NationId,
    pub defender: NationId,
    /// `None` when the war ended by negotiated peace
    pub victor: Option<Belligerent>,
}

pub struct WarService {
    config: Arc<ConflictConfig>,
    collab: Collaborators,
    registry: WarRegistry,
    store: Arc<dyn RecordStore<War>>,
    pending: PendingWrites,
    events: Arc<dyn EventSink>,
    rng: Mutex<Box<dyn RandomSource>>,
}

impl WarService {
    /// Build the service and restore every persisted active war
    pub fn load(
        config: Arc<ConflictConfig>,
        collab: Collaborators,
        store: Arc<dyn RecordStore<War>>,
        events: Arc<dyn EventSink>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        let service = Self {
            config,
            collab,
            registry: WarRegistry::new(),
            store,
            pending: PendingWrites::new(),
            events,
            rng: Mutex::new(rng),
        };

        let mut restored = 0;
        for war in persistence::load_or_empty(service.store.as_ref(), RECORD_KIND) {
            if !war.is_active() {
                service
                    .pending
                    .delete(service.store.as_ref(), &war.id.0, RECORD_KIND);
                continue;
            }
            let id = war.id.clone();
            match service.registry.insert(war) {
                Ok(_) => restored += 1,
                Err(e) => tracing::warn!(war = %id, "skipping persisted war: {}", e),
            }
        }
        tracing::info!("restored {} active wars", restored);
        service
    }

    pub fn config(&self) -> &ConflictConfig {
        &self.config
    }

    /// One-off cost of declaring `war_type` on `defender`
    pub fn declaration_cost(&self, attacker: &NationId, defender: &NationId, war_type: WarType) -> f64 {
        let attacker_strength = strength::military_strength(&self.collab, attacker).max(1.0);
        let defender_strength = strength::military_strength(&self.collab, defender);
        self.config.base_declaration_cost
            * war_type.declaration_multiplier()
            * (1.0 + 0.5 * defender_strength / attacker_strength)
    }

    pub fn declare_war(&self, request: DeclareWar, now: Timestamp) -> Result<WarId> {
        let DeclareWar {
            attacker,
            defender,
            war_type,
            goals,
        } = request;

        if attacker == defender {
            return Err(ConflictError::Validation(
                "a nation cannot declare war on itself".into(),
            ));
        }
        let balance = self.collab.require_nation(&attacker)?;
        self.collab.require_nation(&defender)?;
        if self.collab.diplomacy.is_at_war(&attacker, &defender)
            || self.registry.between(&attacker, &defender).is_some()
        {
            return Err(ConflictError::Validation(format!(
                "{} and {} are already at war",
                attacker, defender
            )));
        }

        let cost = self.declaration_cost(&attacker, &defender, war_type);
        if balance < cost {
            return Err(ConflictError::InsufficientFunds {
                required: cost,
                available: balance,
            });
        }
        self.collab.nations.debit(&attacker, cost)?;

        let attacker_land = self
            .collab
            .nations
            .claimed_territory(&attacker)
            .unwrap_or_default();
        let defender_land = self
            .collab
            .nations
            .claimed_territory(&defender)
            .unwrap_or_default();
        let fronts = front::build_fronts(
            &attacker_land,
            &defender_land,
            now,
            self.config.initial_front_defense,
        );

        let payer = attacker.clone();
        let war = War::declare(attacker, defender, war_type, goals, fronts, cost, now);
        let shared = match self.registry.insert(war) {
            Ok(shared) => shared,
            Err(e) => {
                // Lost a race with a concurrent declaration on the same pair
                if let Err(refund) = self.collab.nations.credit(&payer, cost) {
                    tracing::warn!(nation = %payer, "declaration refund failed: {}", refund);
                }
                return Err(e);
            }
        };

        let war = lock(&shared);
        self.collab
            .diplomacy
            .register_war_declared(&war.attacker, &war.defender);
        self.pending.save(self.store.as_ref(), &*war, RECORD_KIND);

        tracing::info!(
            war = %war.id,
            attacker = %war.attacker,
            defender = %war.defender,
            war_type = %war.war_type,
            cost,
            fronts = war.fronts.len(),
            "war declared"
        );
        self.events.publish(ConflictEvent::WarDeclared {
            war_id: war.id.clone(),
            attacker: war.attacker.clone(),
            defender: war.defender.clone(),
            war_type: war.war_type,
            cost,
        });
        Ok(war.id.clone())
    }

    /// End a war immediately on negotiated terms, without reparations
    pub fn sue_for_peace(&self, id: &WarId, now: Timestamp) -> Result<EndedWar> {
        let shared = self
            .registry
            .get(id)
            .ok_or_else(|| ConflictError::NotFound(format!("war '{}'", id)))?;

        let mut war = lock(&shared);
        if !war.is_active() {
            return Err(ConflictError::NotFound(format!("war '{}'", id)));
        }
        war.end(None, now);
        Ok(self.finish(&war))
    }

    /// Advance every active war by one tick; returns the wars that ended
    ///
    /// Store deletes that failed on an earlier pass are retried first.
    pub fn run_tick(&self, now: Timestamp) -> Vec<EndedWar> {
        let retried = self.pending.retry_deletes(self.store.as_ref(), RECORD_KIND);
        if retried > 0 {
            tracing::info!(wars = retried, "removed ended wars from the store");
        }
        let wars = self.registry.all();
        let ended: Vec<EndedWar> = if wars.len() >= self.config.parallel_threshold {
            wars.par_iter()
                .filter_map(|shared| self.tick_war(shared, now))
                .collect()
        } else {
            wars.iter()
                .filter_map(|shared| self.tick_war(shared, now))
                .collect()
        };
        tracing::debug!(wars = wars.len(), ended = ended.len(), "war tick complete");
        ended
    }

    /// Drift quiet fronts toward the defender; returns how many fronts moved
    pub fn run_front_decay(&self, now: Timestamp) -> usize {
        let mut decayed = 0;
        for shared in self.registry.all() {
            let mut war = lock(&shared);
            if !war.is_active() {
                continue;
            }
            let mut changed = 0;
            for front in war.fronts.values_mut() {
                if front.decay(now, self.config.front_decay_window_ms, self.config.front_decay_step) {
                    changed += 1;
                }
            }
            if changed > 0 {
                self.pending.save(self.store.as_ref(), &*war, RECORD_KIND);
                decayed += changed;
            }
        }
        if decayed > 0 {
            tracing::debug!(fronts = decayed, "front decay applied");
        }
        decayed
    }

    fn tick_war(&self, shared: &SharedWar, now: Timestamp) -> Option<EndedWar> {
        let mut war = lock(shared);
        if !war.is_active() {
            return None;
        }
        let before = war.clone();

        war.reevaluate();
        let defender_territory = self
            .collab
            .nations
            .claimed_territory(&war.defender)
            .map(|units| units.len());
        if let Some(victor) = check_victory(&war.victory_inputs(defender_territory), &self.config) {
            self.apply_victory_terms(&war, victor);
            war.end(Some(victor), now);
            return Some(self.finish(&war));
        }

        self.fight_battles(&mut war, now);
        self.charge_upkeep(&mut war);
        war.refresh_goal_progress();
        war.reevaluate();

        if *war != before || self.pending.is_unsaved(&war.id.0) {
            self.pending.save(self.store.as_ref(), &*war, RECORD_KIND);
        }
        None
    }

    fn fight_battles(&self, war: &mut War, now: Timestamp) {
        let names: Vec<String> = war.fronts.keys().cloned().collect();
        for name in names {
            let Some(front) = war.fronts.get(&name) else {
                continue;
            };
            // The generator is never held across collaborator calls
            let roll = {
                let mut rng = lock(&self.rng);
                if !battle::battle_occurs(front, now, &self.config, &mut **rng) {
                    continue;
                }
                rng.roll()
            };

            let attacker = strength::assess(&self.collab, &war.attacker);
            let defender = strength::assess(&self.collab, &war.defender);
            let defender_territory = self
                .collab
                .nations
                .claimed_territory(&war.defender)
                .map(|units| units.len())
                .unwrap_or(0);
            let outcome = battle::resolve_battle(
                front,
                &attacker,
                &defender,
                defender_territory,
                &self.config,
                roll,
            );

            war.apply_battle(&outcome, now, &self.config);
            let captured = if outcome.territory_gained > 0 {
                self.capture_territory(war, outcome.territory_gained)
            } else {
                Vec::new()
            };

            self.charge_casualties(war, &outcome);
            self.events.publish(ConflictEvent::BattleResolved {
                war_id: war.id.clone(),
                front: outcome.front.clone(),
                attacker_victory: outcome.attacker_victory,
                attacker_casualties: outcome.attacker_casualties,
                defender_casualties: outcome.defender_casualties,
                territories_captured: captured.len() as u32,
            });
        }
    }

    /// Move up to `count` randomly chosen defender units to the attacker
    fn capture_territory(&self, war: &mut War, count: u32) -> Vec<TerritoryUnit> {
        let Some(defender_land) = self.collab.nations.claimed_territory(&war.defender) else {
            tracing::warn!(war = %war.id, defender = %war.defender, "defender territory unavailable");
            return Vec::new();
        };

        let mut candidates: Vec<TerritoryUnit> = defender_land.into_iter().collect();
        let mut captured = Vec::new();
        while captured.len() < count as usize && !candidates.is_empty() {
            let wanted = (count as usize - captured.len()).min(candidates.len());
            let mut picks = Vec::with_capacity(wanted);
            {
                let mut rng = lock(&self.rng);
                for _ in 0..wanted {
                    let index = rng.pick(candidates.len());
                    picks.push(candidates.swap_remove(index));
                }
            }

            for unit in picks {
                match self
                    .collab
                    .nations
                    .transfer_territory(&war.defender, &war.attacker, &unit)
                {
                    Ok(()) => captured.push(unit),
                    Err(e) => tracing::warn!(war = %war.id, %unit, "territory transfer failed: {}", e),
                }
            }
        }

        war.record_capture(&captured);
        captured
    }

    fn charge_casualties(&self, war: &War, outcome: &BattleOutcome) {
        let unit_cost = self.config.casualty_unit_cost;
        self.collab
            .drain(&war.attacker, outcome.attacker_casualties as f64 * unit_cost);
        self.collab
            .drain(&war.defender, outcome.defender_casualties as f64 * unit_cost);
    }

    fn charge_upkeep(&self, war: &mut War) {
        let upkeep = self.config.base_upkeep * war.war_type.upkeep_multiplier();
        if self.collab.charge_if_affordable(&war.attacker, upkeep) {
            war.attacker_cost += upkeep;
        } else {
            tracing::debug!(war = %war.id, nation = %war.attacker, "upkeep skipped");
        }
        if self.collab.charge_if_affordable(&war.defender, upkeep) {
            war.defender_cost += upkeep;
        } else {
            tracing::debug!(war = %war.id, nation = %war.defender, "upkeep skipped");
        }
    }

    /// Reparations flow to the winner; the loser is drained, floored at zero
    fn apply_victory_terms(&self, war: &War, victor: Belligerent) {
        let (winner, loser, reparations, (winner_view, loser_view)) = match victor {
            Belligerent::Attacker => (
                &war.attacker,
                &war.defender,
                war.defender_cost * self.config.attacker_reparation_rate,
                ATTACKER_WIN_REPUTATION,
            ),
            Belligerent::Defender => (
                &war.defender,
                &war.attacker,
                war.attacker_cost * self.config.defender_reparation_rate,
                DEFENDER_WIN_REPUTATION,
            ),
        };

        if reparations > 0.0 {
            if let Err(e) = self.collab.nations.credit(winner, reparations) {
                tracing::warn!(war = %war.id, nation = %winner, "reparations not credited: {}", e);
            }
            self.collab.drain(loser, reparations);
        }
        self.collab.diplomacy.adjust_reputation(winner, loser, winner_view);
        self.collab.diplomacy.adjust_reputation(loser, winner, loser_view);

        tracing::info!(war = %war.id, winner = %winner, reparations, "war won outright");
    }

    /// Retire an ended war: registry, store, diplomacy and notification
    fn finish(&self, war: &War) -> EndedWar {
        self.registry.remove(&war.id, &war.attacker, &war.defender);
        self.pending.delete(self.store.as_ref(), &war.id.0, RECORD_KIND);
        self.collab.diplomacy.register_peace(&war.attacker, &war.defender);

        tracing::info!(
            war = %war.id,
            attacker = %war.attacker,
            defender = %war.defender,
            victor = ?war.victor,
            battles = war.battles_fought,
            "war ended"
        );
        self.events.publish(ConflictEvent::WarEnded {
            war_id: war.id.clone(),
            attacker: war.attacker.clone(),
            defender: war.defender.clone(),
            victor: war.victor,
        });

        EndedWar {
            war_id: war.id.clone(),
            attacker: war.attacker.clone(),
            defender: war.defender.clone(),
            victor: war.victor,
        }
    }

    // === QUERIES ===

    pub fn war(&self, id: &WarId) -> Option<War> {
        self.registry.get(id).map(|shared| lock(&shared).clone())
    }

    pub fn active_war_between(&self, a: &NationId, b: &NationId) -> Option<War> {
        self.registry.between(a, b).map(|shared| lock(&shared).clone())
    }

    pub fn is_at_war(&self, a: &NationId, b: &NationId) -> bool {
        self.registry.between(a, b).is_some()
    }

    pub fn wars_of(&self, nation: &NationId) -> Vec<War> {
        snapshot(self.registry.of_nation(nation))
    }

    pub fn active_wars(&self) -> Vec<War> {
        snapshot(self.registry.all())
    }

    pub fn active_war_count(&self) -> usize {
        self.registry.len()
    }

    pub fn nation_statistics(&self, nation: &NationId) -> NationWarStats {
        stats::nation_stats(nation, &self.wars_of(nation))
    }

    pub fn global_statistics(&self) -> GlobalWarStats {
        stats::global_stats(&self.active_wars())
    }
}

fn snapshot(wars: Vec<SharedWar>) -> Vec<War> {
    let mut wars: Vec<War> = wars.iter().map(|shared| lock(shared).clone()).collect();
    wars.sort_by(|a, b| a.started_at.cmp(&b.started_at).then_with(|| a.id.cmp(&b.id)));
    wars
}
