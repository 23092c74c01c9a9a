//! Tariff wars between nation pairs

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};

use crate::core::config::ConflictConfig;
use crate::core::error::{ConflictError, Result};
use crate::core::sync::{lock, read, write};
use crate::core::types::{NationId, Timestamp, HOUR_MS};
use crate::events::{ConflictEvent, EventSink};
use crate::external::Collaborators;
use crate::persistence::{self, PendingWrites, Record, RecordStore};

const RECORD_KIND: &str = "trade war";
pub const MAX_TARIFF: f64 = 100.0;

/// Order-independent key of a nation pair
pub fn pair_key(a: &NationId, b: &NationId) -> String {
    if a <= b {
        format!("{}_{}", a, b)
    } else {
        format!("{}_{}", b, a)
    }
}

fn clamp_tariff(tariff: f64) -> f64 {
    tariff.clamp(0.0, MAX_TARIFF)
}

fn check_tariff(tariff: f64) -> Result<()> {
    if !tariff.is_finite() || tariff < 0.0 {
        return Err(ConflictError::Validation(format!("invalid tariff {}", tariff)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeWar {
    pub nation_a: NationId,
    pub nation_b: NationId,
    /// Tariff imposed by A on B, 0-100
    pub tariff_a: f64,
    /// Tariff imposed by B on A, 0-100
    pub tariff_b: f64,
    pub started_at: Timestamp,
}

impl TradeWar {
    pub fn key(&self) -> String {
        pair_key(&self.nation_a, &self.nation_b)
    }

    pub fn involves(&self, nation: &NationId) -> bool {
        &self.nation_a == nation || &self.nation_b == nation
    }

    /// (own tariff, opponent tariff, opponent) from `nation`'s side
    pub fn seen_from(&self, nation: &NationId) -> Option<(f64, f64, &NationId)> {
        if &self.nation_a == nation {
            Some((self.tariff_a, self.tariff_b, &self.nation_b))
        } else if &self.nation_b == nation {
            Some((self.tariff_b, self.tariff_a, &self.nation_a))
        } else {
            None
        }
    }
}

impl Record for TradeWar {
    fn record_id(&self) -> String {
        self.key()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeWarRating {
    None,
    Active,
    Multiple,
    Massive,
}

impl TradeWarRating {
    pub fn classify(active: usize) -> Self {
        match active {
            5.. => TradeWarRating::Massive,
            3.. => TradeWarRating::Multiple,
            1.. => TradeWarRating::Active,
            _ => TradeWarRating::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeWarView {
    pub opponent: NationId,
    pub our_tariff: f64,
    pub opponent_tariff: f64,
    pub started_at: Timestamp,
    pub duration_hours: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeWarStats {
    pub active_trade_wars: usize,
    /// Per-tick loss from opponents' tariffs
    pub total_tariff_cost: f64,
    pub total_tariff_revenue: f64,
    pub net_impact: f64,
    pub wars: Vec<TradeWarView>,
    pub rating: TradeWarRating,
}

type SharedTradeWar = Arc<Mutex<TradeWar>>;

/// Store writes for a pair key happen under the map lock, since keys are
/// reused when the same pair starts a new trade war.
pub struct TradeWarService {
    config: Arc<ConflictConfig>,
    collab: Collaborators,
    wars: RwLock<BTreeMap<String, SharedTradeWar>>,
    store: Arc<dyn RecordStore<TradeWar>>,
    pending: PendingWrites,
    events: Arc<dyn EventSink>,
}

impl TradeWarService {
    pub fn load(
        config: Arc<ConflictConfig>,
        collab: Collaborators,
        store: Arc<dyn RecordStore<TradeWar>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let wars: BTreeMap<String, Arc<Mutex<TradeWar>>> =
            persistence::load_or_empty(store.as_ref(), RECORD_KIND)
                .into_iter()
                .map(|war| (war.key(), Arc::new(Mutex::new(war))))
                .collect();
        tracing::info!("restored {} trade wars", wars.len());
        Self {
            config,
            collab,
            wars: RwLock::new(wars),
            store,
            pending: PendingWrites::new(),
            events,
        }
    }

    /// Open a trade war; `tariff` is what `a` imposes on `b`
    pub fn start_trade_war(&self, a: &NationId, b: &NationId, tariff: f64, now: Timestamp) -> Result<()> {
        if a.as_str().trim().is_empty() || b.as_str().trim().is_empty() {
            return Err(ConflictError::Validation("missing trade war parameters".into()));
        }
        if a == b {
            return Err(ConflictError::Validation(
                "a nation cannot start a trade war with itself".into(),
            ));
        }
        check_tariff(tariff)?;
        self.collab.require_nation(a)?;
        self.collab.require_nation(b)?;

        let war = TradeWar {
            nation_a: a.clone(),
            nation_b: b.clone(),
            tariff_a: clamp_tariff(tariff),
            tariff_b: 0.0,
            started_at: now,
        };
        {
            let mut wars = write(&self.wars);
            let key = war.key();
            if wars.contains_key(&key) {
                return Err(ConflictError::PreconditionFailed(format!(
                    "trade war between {} and {} already running",
                    a, b
                )));
            }
            self.pending.save(self.store.as_ref(), &war, RECORD_KIND);
            wars.insert(key, Arc::new(Mutex::new(war.clone())));
        }

        tracing::info!(nation_a = %a, nation_b = %b, tariff = war.tariff_a, "trade war started");
        self.events.publish(ConflictEvent::TradeWarStarted {
            nation_a: a.clone(),
            nation_b: b.clone(),
            tariff: war.tariff_a,
        });
        Ok(())
    }

    /// Set `nation`'s own tariff in its trade war with `target`; returns the applied tariff
    pub fn retaliate(&self, nation: &NationId, target: &NationId, tariff: f64) -> Result<f64> {
        check_tariff(tariff)?;
        let shared = self.get(nation, target)?;
        let mut war = lock(&shared);
        let wars = read(&self.wars);
        if !is_registered(&wars, &war.key(), &shared) {
            return Err(ConflictError::NotFound(format!(
                "trade war between {} and {}",
                nation, target
            )));
        }

        let applied = clamp_tariff(tariff);
        if &war.nation_a == nation {
            war.tariff_a = applied;
        } else if &war.nation_b == nation {
            war.tariff_b = applied;
        } else {
            return Err(ConflictError::Validation(format!(
                "{} is not part of this trade war",
                nation
            )));
        }
        self.pending.save(self.store.as_ref(), &*war, RECORD_KIND);
        drop(wars);
        tracing::debug!(%nation, %target, tariff = applied, "retaliatory tariff set");
        Ok(applied)
    }

    pub fn end_trade_war(&self, a: &NationId, b: &NationId) -> Result<()> {
        let key = pair_key(a, b);
        let removed = {
            let mut wars = write(&self.wars);
            let removed = wars.remove(&key).ok_or_else(|| {
                ConflictError::NotFound(format!("trade war between {} and {}", a, b))
            })?;
            self.pending.delete(self.store.as_ref(), &key, RECORD_KIND);
            removed
        };
        let war = lock(&removed).clone();

        tracing::info!(nation_a = %war.nation_a, nation_b = %war.nation_b, "trade war ended");
        self.events.publish(ConflictEvent::TradeWarEnded {
            nation_a: war.nation_a,
            nation_b: war.nation_b,
        });
        Ok(())
    }

    /// Each side loses its opponent's tariff times the per-point loss
    ///
    /// Store writes that failed earlier are retried on the way.
    pub fn run_tick(&self) -> usize {
        let handles: Vec<SharedTradeWar> = {
            let wars = write(&self.wars);
            self.pending.retry_deletes(self.store.as_ref(), RECORD_KIND);
            wars.values().cloned().collect()
        };
        let per_point = self.config.trade_war_loss_per_tariff_point;

        let mut processed = 0;
        for shared in handles {
            let war = lock(&shared);
            {
                let wars = read(&self.wars);
                if !is_registered(&wars, &war.key(), &shared) {
                    continue;
                }
                if self.pending.is_unsaved(&war.key()) {
                    self.pending.save(self.store.as_ref(), &*war, RECORD_KIND);
                }
            }
            let known = self.collab.nations.balance(&war.nation_a).is_some()
                && self.collab.nations.balance(&war.nation_b).is_some();
            if !known {
                tracing::warn!(trade_war = %war.key(), "skipping trade war with unknown nation");
                continue;
            }
            self.collab.drain(&war.nation_a, war.tariff_b * per_point);
            self.collab.drain(&war.nation_b, war.tariff_a * per_point);
            processed += 1;
        }
        processed
    }

    fn get(&self, a: &NationId, b: &NationId) -> Result<SharedTradeWar> {
        read(&self.wars)
            .get(&pair_key(a, b))
            .cloned()
            .ok_or_else(|| ConflictError::NotFound(format!("trade war between {} and {}", a, b)))
    }

    pub fn trade_war(&self, a: &NationId, b: &NationId) -> Option<TradeWar> {
        self.get(a, b).ok().map(|shared| lock(&shared).clone())
    }

    pub fn trade_wars_of(&self, nation: &NationId) -> Vec<TradeWar> {
        let handles: Vec<SharedTradeWar> = read(&self.wars).values().cloned().collect();
        handles
            .iter()
            .map(|shared| lock(shared).clone())
            .filter(|war| war.involves(nation))
            .collect()
    }

    pub fn len(&self) -> usize {
        read(&self.wars).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics(&self, nation: &NationId, now: Timestamp) -> TradeWarStats {
        let per_point = self.config.trade_war_loss_per_tariff_point;
        let mut cost = 0.0;
        let mut revenue = 0.0;
        let mut views = Vec::new();

        for war in self.trade_wars_of(nation) {
            let Some((ours, theirs, opponent)) = war.seen_from(nation) else {
                continue;
            };
            cost += theirs * per_point;
            revenue += ours * per_point;
            views.push(TradeWarView {
                opponent: opponent.clone(),
                our_tariff: ours,
                opponent_tariff: theirs,
                started_at: war.started_at,
                duration_hours: now.saturating_sub(war.started_at) / HOUR_MS,
            });
        }

        TradeWarStats {
            active_trade_wars: views.len(),
            total_tariff_cost: cost,
            total_tariff_revenue: revenue,
            net_impact: revenue - cost,
            rating: TradeWarRating::classify(views.len()),
            wars: views,
        }
    }
}

fn is_registered(wars: &BTreeMap<String, SharedTradeWar>, key: &str, shared: &SharedTradeWar) -> bool {
    wars.get(key).map_or(false, |current| Arc::ptr_eq(current, shared))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_key_ignores_order() {
        let (a, b) = (NationId::new("rome"), NationId::new("carthage"));
        assert_eq!(pair_key(&a, &b), "carthage_rome");
        assert_eq!(pair_key(&b, &a), "carthage_rome");
    }

    #[test]
    fn test_tariff_validation_and_clamp() {
        assert!(check_tariff(-1.0).is_err());
        assert!(check_tariff(f64::NAN).is_err());
        assert!(check_tariff(250.0).is_ok());
        assert_eq!(clamp_tariff(250.0), 100.0);
    }

    #[test]
    fn test_seen_from_each_side() {
        let war = TradeWar {
            nation_a: "a".into(),
            nation_b: "b".into(),
            tariff_a: 20.0,
            tariff_b: 5.0,
            started_at: 0,
        };
        let (ours, theirs, opponent) = war.seen_from(&"b".into()).unwrap();
        assert_eq!((ours, theirs), (5.0, 20.0));
        assert_eq!(opponent, &NationId::new("a"));
        assert!(war.seen_from(&"c".into()).is_none());
    }

    #[test]
    fn test_rating_tiers() {
        assert_eq!(TradeWarRating::classify(0), TradeWarRating::None);
        assert_eq!(TradeWarRating::classify(2), TradeWarRating::Active);
        assert_eq!(TradeWarRating::classify(4), TradeWarRating::Multiple);
        assert_eq!(TradeWarRating::classify(7), TradeWarRating::Massive);
    }
}
