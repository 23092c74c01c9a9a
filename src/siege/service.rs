//! Siege commands and the per-tick siege pass

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use crate::core::config::ConflictConfig;
use crate::core::error::{ConflictError, Result};
use crate::core::sync::{lock, read, write};
use crate::core::types::{NationId, SettlementId, Timestamp};
use crate::events::{ConflictEvent, EventSink};
use crate::external::Collaborators;
use crate::persistence::{self, PendingWrites, RecordStore};
use crate::siege::record::Siege;
use crate::siege::stats::{self, GlobalSiegeStats, NationSiegeStats, SiegePace};

const RECORD_KIND: &str = "siege";

pub type SharedSiege = Arc<Mutex<Siege>>;

/// Registry entry; the pair is duplicated here so lookups never lock a record
struct SiegeEntry {
    attacker: NationId,
    defender: NationId,
    record: SharedSiege,
}

pub struct SiegeService {
    config: Arc<ConflictConfig>,
    collab: Collaborators,
    sieges: RwLock<BTreeMap<SettlementId, SiegeEntry>>,
    store: Arc<dyn RecordStore<Siege>>,
    pending: PendingWrites,
    events: Arc<dyn EventSink>,
}

impl SiegeService {
    pub fn load(
        config: Arc<ConflictConfig>,
        collab: Collaborators,
        store: Arc<dyn RecordStore<Siege>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let mut sieges = BTreeMap::new();
        for siege in persistence::load_or_empty(store.as_ref(), RECORD_KIND) {
            let entry = SiegeEntry {
                attacker: siege.attacker.clone(),
                defender: siege.defender.clone(),
                record: Arc::new(Mutex::new(siege.clone())),
            };
            if sieges.insert(siege.settlement.clone(), entry).is_some() {
                tracing::warn!(settlement = %siege.settlement, "duplicate persisted siege");
            }
        }
        tracing::info!("restored {} active sieges", sieges.len());

        Self {
            config,
            collab,
            sieges: RwLock::new(sieges),
            store,
            pending: PendingWrites::new(),
            events,
        }
    }

    pub fn start_siege(
        &self,
        settlement: &SettlementId,
        attacker: &NationId,
        defender: &NationId,
        now: Timestamp,
    ) -> Result<()> {
        if settlement.as_str().trim().is_empty()
            || attacker.as_str().trim().is_empty()
            || defender.as_str().trim().is_empty()
        {
            return Err(ConflictError::Validation("missing siege parameters".into()));
        }
        if attacker == defender {
            return Err(ConflictError::Validation(
                "a nation cannot besiege itself".into(),
            ));
        }
        let owner = self.collab.settlements.owner(settlement).ok_or_else(|| {
            ConflictError::Validation(format!("unknown settlement '{}'", settlement))
        })?;
        if &owner != defender {
            return Err(ConflictError::Validation(format!(
                "settlement '{}' belongs to {}, not {}",
                settlement, owner, defender
            )));
        }
        if !self.collab.diplomacy.is_at_war(attacker, defender) {
            return Err(ConflictError::PreconditionFailed(format!(
                "{} is not at war with {}",
                attacker, defender
            )));
        }

        let siege = Siege::new(settlement.clone(), attacker.clone(), defender.clone(), now);
        {
            // Saved under the map lock so a delete for the same settlement
            // can never land after it
            let mut sieges = write(&self.sieges);
            if sieges.contains_key(settlement) {
                return Err(ConflictError::PreconditionFailed(format!(
                    "settlement '{}' is already under siege",
                    settlement
                )));
            }
            self.pending.save(self.store.as_ref(), &siege, RECORD_KIND);
            sieges.insert(
                settlement.clone(),
                SiegeEntry {
                    attacker: attacker.clone(),
                    defender: defender.clone(),
                    record: Arc::new(Mutex::new(siege)),
                },
            );
        }

        tracing::info!(%settlement, %attacker, %defender, "siege started");
        self.events.publish(ConflictEvent::SiegeStarted {
            settlement: settlement.clone(),
            attacker: attacker.clone(),
            defender: defender.clone(),
        });
        Ok(())
    }

    /// Advance every siege; returns the settlements captured this tick
    ///
    /// Every open siege is saved each tick, so a failed save is retried on
    /// the next one.
    pub fn run_tick(&self) -> Vec<SettlementId> {
        let handles: Vec<SharedSiege> = {
            let sieges = write(&self.sieges);
            self.pending.retry_deletes(self.store.as_ref(), RECORD_KIND);
            sieges
                .values()
                .map(|entry| Arc::clone(&entry.record))
                .collect()
        };

        let mut captured = Vec::new();
        for shared in handles {
            let mut siege = lock(&shared);
            if siege.closed || !self.is_current(&shared, &siege.settlement) {
                continue;
            }
            if !siege.advance(self.config.siege_progress_per_tick) {
                self.pending.save(self.store.as_ref(), &*siege, RECORD_KIND);
                continue;
            }

            match self
                .collab
                .settlements
                .transfer_ownership(&siege.settlement, &siege.attacker)
            {
                Ok(()) => {
                    siege.closed = true;
                    self.retire(&shared, &siege.settlement);
                    tracing::info!(
                        settlement = %siege.settlement,
                        attacker = %siege.attacker,
                        defender = %siege.defender,
                        "settlement captured"
                    );
                    self.events.publish(ConflictEvent::SettlementCaptured {
                        settlement: siege.settlement.clone(),
                        attacker: siege.attacker.clone(),
                        defender: siege.defender.clone(),
                    });
                    captured.push(siege.settlement.clone());
                }
                Err(e) => {
                    // Stays at 100 and retries next tick
                    tracing::warn!(settlement = %siege.settlement, "ownership transfer failed: {}", e);
                    self.pending.save(self.store.as_ref(), &*siege, RECORD_KIND);
                }
            }
        }
        captured
    }

    /// Remove every siege between the pair, in either direction
    ///
    /// A siege is closed under its own lock before its entry leaves the map,
    /// so a capture already in flight wins and is not reported as lifted.
    pub fn lift_between(&self, a: &NationId, b: &NationId) -> Vec<SettlementId> {
        let matching: Vec<(SettlementId, NationId, NationId, SharedSiege)> = read(&self.sieges)
            .iter()
            .filter(|(_, e)| {
                (&e.attacker == a && &e.defender == b) || (&e.attacker == b && &e.defender == a)
            })
            .map(|(k, e)| (k.clone(), e.attacker.clone(), e.defender.clone(), Arc::clone(&e.record)))
            .collect();

        let mut settlements = Vec::with_capacity(matching.len());
        for (settlement, attacker, defender, shared) in matching {
            let mut siege = lock(&shared);
            if siege.closed {
                continue;
            }
            siege.closed = true;
            self.retire(&shared, &settlement);
            drop(siege);

            tracing::info!(%settlement, %attacker, "siege lifted");
            self.events.publish(ConflictEvent::SiegeLifted {
                settlement: settlement.clone(),
                attacker,
                defender,
            });
            settlements.push(settlement);
        }
        settlements
    }

    /// Whether `shared` is still the registered siege of `settlement`
    fn is_current(&self, shared: &SharedSiege, settlement: &SettlementId) -> bool {
        read(&self.sieges)
            .get(settlement)
            .map_or(false, |entry| Arc::ptr_eq(&entry.record, shared))
    }

    /// Drop a closed siege from the map and the store
    ///
    /// Callers hold the record lock. Only this record's entry is removed; a
    /// newer siege of the same settlement is left alone.
    fn retire(&self, shared: &SharedSiege, settlement: &SettlementId) {
        let mut sieges = write(&self.sieges);
        let registered = sieges
            .get(settlement)
            .map_or(false, |entry| Arc::ptr_eq(&entry.record, shared));
        if registered {
            sieges.remove(settlement);
            self.pending.delete(self.store.as_ref(), settlement.as_str(), RECORD_KIND);
        }
    }

    // === QUERIES ===

    pub fn siege(&self, settlement: &SettlementId) -> Option<Siege> {
        let shared = read(&self.sieges)
            .get(settlement)
            .map(|entry| Arc::clone(&entry.record))?;
        let siege = lock(&shared).clone();
        Some(siege)
    }

    pub fn is_under_siege(&self, settlement: &SettlementId) -> bool {
        read(&self.sieges).contains_key(settlement)
    }

    pub fn active_sieges(&self) -> Vec<Siege> {
        let handles: Vec<SharedSiege> = read(&self.sieges)
            .values()
            .map(|entry| Arc::clone(&entry.record))
            .collect();
        handles
            .iter()
            .map(|shared| lock(shared).clone())
            .filter(|siege| !siege.closed)
            .collect()
    }

    pub fn sieges_of(&self, nation: &NationId) -> Vec<Siege> {
        self.active_sieges()
            .into_iter()
            .filter(|s| &s.attacker == nation || &s.defender == nation)
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.sieges).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn nation_statistics(&self, nation: &NationId, now: Timestamp) -> NationSiegeStats {
        let pace = SiegePace {
            increment: self.config.siege_progress_per_tick,
            tick_secs: self.config.siege_tick_secs,
        };
        stats::nation_stats(nation, &self.sieges_of(nation), pace, now)
    }

    pub fn global_statistics(&self) -> GlobalSiegeStats {
        stats::global_stats(&self.active_sieges())
    }
}
