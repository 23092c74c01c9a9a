//! Sponsored terrorist cells operating inside a target nation

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::config::ConflictConfig;
use crate::core::error::{ConflictError, Result};
use crate::core::sync::{lock, read, write};
use crate::core::types::{NationId, Timestamp, MINUTE_MS};
use crate::events::{ConflictEvent, EventSink};
use crate::external::Collaborators;
use crate::persistence::{self, PendingWrites, Record, RecordStore};

const RECORD_KIND: &str = "terror cell";

pub const MAX_ACTIVITY: u32 = 100;
pub const INITIAL_ACTIVITY: u32 = 10;
/// Funding needed for one point of activity
pub const FUNDING_PER_ACTIVITY: f64 = 1000.0;

fn check_amount(amount: f64, what: &str) -> Result<()> {
    if !amount.is_finite() || amount < 0.0 {
        return Err(ConflictError::Validation(format!("invalid {} {}", what, amount)));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrorCell {
    pub id: String,
    /// Nation the cell operates in
    pub target: NationId,
    pub sponsor: NationId,
    /// 0-100
    pub activity: u32,
    pub next_attack: Timestamp,
}

impl TerrorCell {
    /// Raise activity from `amount` of funding, capped at the maximum
    pub fn fund(&mut self, amount: f64) -> u32 {
        let gained = (amount / FUNDING_PER_ACTIVITY).floor().max(0.0) as u32;
        self.activity = self.activity.saturating_add(gained).min(MAX_ACTIVITY);
        self.activity
    }

    pub fn attack_due(&self, now: Timestamp, threshold: u32) -> bool {
        self.next_attack <= now && self.activity >= threshold
    }
}

impl Record for TerrorCell {
    fn record_id(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatRating {
    None,
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatRating {
    pub fn classify(threat: f64) -> Self {
        if threat >= 80.0 {
            ThreatRating::Critical
        } else if threat >= 60.0 {
            ThreatRating::High
        } else if threat >= 40.0 {
            ThreatRating::Medium
        } else if threat >= 20.0 {
            ThreatRating::Low
        } else if threat > 0.0 {
            ThreatRating::Minimal
        } else {
            ThreatRating::None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TerrorStats {
    pub operating: Vec<TerrorCell>,
    pub sponsored: Vec<TerrorCell>,
    /// Sum of operating cell activity, capped at 100
    pub threat_level: f64,
    pub rating: ThreatRating,
    /// Minutes until the soonest scheduled attack
    pub next_attack_minutes: Option<u64>,
}

pub struct TerrorService {
    config: Arc<ConflictConfig>,
    collab: Collaborators,
    cells: RwLock<BTreeMap<String, Arc<Mutex<TerrorCell>>>>,
    store: Arc<dyn RecordStore<TerrorCell>>,
    pending: PendingWrites,
    events: Arc<dyn EventSink>,
}

impl TerrorService {
    pub fn load(
        config: Arc<ConflictConfig>,
        collab: Collaborators,
        store: Arc<dyn RecordStore<TerrorCell>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        let cells: BTreeMap<String, Arc<Mutex<TerrorCell>>> =
            persistence::load_or_empty(store.as_ref(), RECORD_KIND)
                .into_iter()
                .filter(|cell| !cell.id.trim().is_empty())
                .map(|cell| (cell.id.clone(), Arc::new(Mutex::new(cell))))
                .collect();
        tracing::info!("restored {} terror cells", cells.len());
        Self {
            config,
            collab,
            cells: RwLock::new(cells),
            store,
            pending: PendingWrites::new(),
            events,
        }
    }

    /// Found a cell in `target`, paid for by `sponsor`; returns the cell id
    pub fn create_cell(
        &self,
        target: &NationId,
        sponsor: &NationId,
        funding: f64,
        now: Timestamp,
    ) -> Result<String> {
        check_amount(funding, "funding")?;
        let available = self.collab.require_nation(sponsor)?;
        self.collab.require_nation(target)?;
        if available < funding {
            return Err(ConflictError::InsufficientFunds {
                required: funding,
                available,
            });
        }
        self.collab.nations.debit(sponsor, funding)?;

        let mut id = Uuid::new_v4().simple().to_string();
        id.truncate(8);
        let cell = TerrorCell {
            id: id.clone(),
            target: target.clone(),
            sponsor: sponsor.clone(),
            activity: INITIAL_ACTIVITY,
            next_attack: now + self.config.terror_attack_cooldown_ms,
        };
        write(&self.cells).insert(id.clone(), Arc::new(Mutex::new(cell.clone())));
        self.pending.save(self.store.as_ref(), &cell, RECORD_KIND);

        tracing::info!(cell = %id, %target, %sponsor, funding, "terror cell created");
        Ok(id)
    }

    /// Sponsor tops up a cell; returns the new activity
    pub fn fund_cell(&self, sponsor: &NationId, cell_id: &str, amount: f64) -> Result<u32> {
        check_amount(amount, "amount")?;
        if amount == 0.0 {
            return Err(ConflictError::Validation("funding must be positive".into()));
        }
        let shared = self.get(cell_id)?;
        let mut cell = lock(&shared);
        self.ensure_registered(cell_id)?;
        if &cell.sponsor != sponsor {
            return Err(ConflictError::Validation(format!(
                "{} does not sponsor cell {}",
                sponsor, cell_id
            )));
        }
        let available = self.collab.require_nation(sponsor)?;
        if available < amount {
            return Err(ConflictError::InsufficientFunds {
                required: amount,
                available,
            });
        }
        self.collab.nations.debit(sponsor, amount)?;

        let activity = cell.fund(amount);
        self.pending.save(self.store.as_ref(), &*cell, RECORD_KIND);
        tracing::debug!(cell = %cell_id, %sponsor, activity, "terror cell funded");
        Ok(activity)
    }

    /// Counter-terrorism: only the nation the cell operates in may remove it
    ///
    /// The cell survives unless the cost was actually paid.
    pub fn eliminate_cell(&self, nation: &NationId, cell_id: &str, cost: f64) -> Result<()> {
        check_amount(cost, "cost")?;
        let shared = self.get(cell_id)?;
        let cell = lock(&shared);
        self.ensure_registered(cell_id)?;
        if &cell.target != nation {
            return Err(ConflictError::Validation(format!(
                "{} has no authority over cell {}",
                nation, cell_id
            )));
        }
        let available = self.collab.require_nation(nation)?;
        if available < cost {
            return Err(ConflictError::InsufficientFunds {
                required: cost,
                available,
            });
        }
        self.collab.nations.debit(nation, cost)?;
        write(&self.cells).remove(cell_id);
        self.pending.delete(self.store.as_ref(), cell_id, RECORD_KIND);
        drop(cell);

        tracing::info!(cell = %cell_id, %nation, cost, "terror cell eliminated");
        Ok(())
    }

    /// Let due cells strike; returns the number of attacks
    ///
    /// Store writes that failed earlier are retried on the way.
    pub fn run_tick(&self, now: Timestamp) -> usize {
        self.pending.retry_deletes(self.store.as_ref(), RECORD_KIND);
        let Some(stability) = self.collab.stability.clone() else {
            tracing::debug!("no stability registry, terror pass skipped");
            return 0;
        };
        let handles: Vec<(String, Arc<Mutex<TerrorCell>>)> = read(&self.cells)
            .iter()
            .map(|(id, cell)| (id.clone(), Arc::clone(cell)))
            .collect();

        let mut attacks = 0;
        for (id, shared) in handles {
            let mut cell = lock(&shared);
            if !read(&self.cells).contains_key(&id) {
                continue;
            }
            if !cell.attack_due(now, self.config.terror_attack_threshold) {
                if self.pending.is_unsaved(&id) {
                    self.pending.save(self.store.as_ref(), &*cell, RECORD_KIND);
                }
                continue;
            }
            if let Err(e) = stability.adjust_stability(&cell.target, -self.config.terror_stability_hit) {
                tracing::warn!(cell = %id, target = %cell.target, "terror attack failed: {}", e);
                continue;
            }
            cell.activity = cell.activity.saturating_sub(self.config.terror_activity_spent);
            cell.next_attack = now + self.config.terror_attack_cooldown_ms;
            self.pending.save(self.store.as_ref(), &*cell, RECORD_KIND);

            tracing::info!(cell = %id, target = %cell.target, "terror attack");
            self.events.publish(ConflictEvent::TerrorAttack {
                cell_id: id,
                target: cell.target.clone(),
            });
            attacks += 1;
        }
        attacks
    }

    /// Cells leave the map only under their own lock, so this holds for as
    /// long as the caller keeps the cell locked
    fn ensure_registered(&self, cell_id: &str) -> Result<()> {
        if read(&self.cells).contains_key(cell_id) {
            Ok(())
        } else {
            Err(ConflictError::NotFound(format!("terror cell '{}'", cell_id)))
        }
    }

    fn get(&self, cell_id: &str) -> Result<Arc<Mutex<TerrorCell>>> {
        read(&self.cells)
            .get(cell_id)
            .cloned()
            .ok_or_else(|| ConflictError::NotFound(format!("terror cell '{}'", cell_id)))
    }

    pub fn cell(&self, cell_id: &str) -> Option<TerrorCell> {
        self.get(cell_id).ok().map(|shared| lock(&shared).clone())
    }

    pub fn cells(&self) -> Vec<TerrorCell> {
        let handles: Vec<Arc<Mutex<TerrorCell>>> = read(&self.cells).values().cloned().collect();
        handles.iter().map(|shared| lock(shared).clone()).collect()
    }

    pub fn cells_in(&self, nation: &NationId) -> Vec<TerrorCell> {
        self.cells()
            .into_iter()
            .filter(|cell| &cell.target == nation)
            .collect()
    }

    pub fn statistics(&self, nation: &NationId, now: Timestamp) -> TerrorStats {
        let all = self.cells();
        let operating: Vec<TerrorCell> = all.iter().filter(|c| &c.target == nation).cloned().collect();
        let sponsored: Vec<TerrorCell> = all.iter().filter(|c| &c.sponsor == nation).cloned().collect();

        let total: u32 = operating.iter().map(|c| c.activity).sum();
        let threat_level = f64::from(total.min(MAX_ACTIVITY));
        let next_attack_minutes = operating
            .iter()
            .filter(|c| c.next_attack > now)
            .map(|c| c.next_attack)
            .min()
            .map(|at| (at - now) / MINUTE_MS);

        TerrorStats {
            operating,
            sponsored,
            threat_level,
            rating: ThreatRating::classify(threat_level),
            next_attack_minutes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    use crate::core::types::TerritoryUnit;
    use crate::events::NullSink;
    use crate::external::NationRegistry;
    use crate::persistence::MemoryStore;
    use crate::sandbox::SandboxWorld;

    /// Sandbox treasury that refuses every debit
    struct FrozenTreasury(Arc<SandboxWorld>);

    impl NationRegistry for FrozenTreasury {
        fn balance(&self, nation: &NationId) -> Option<f64> {
            self.0.balance(nation)
        }

        fn debit(&self, nation: &NationId, _amount: f64) -> Result<()> {
            Err(ConflictError::PreconditionFailed(format!("{} treasury frozen", nation)))
        }

        fn credit(&self, nation: &NationId, amount: f64) -> Result<()> {
            self.0.credit(nation, amount)
        }

        fn claimed_territory(&self, nation: &NationId) -> Option<BTreeSet<TerritoryUnit>> {
            self.0.claimed_territory(nation)
        }

        fn transfer_territory(
            &self,
            from: &NationId,
            to: &NationId,
            unit: &TerritoryUnit,
        ) -> Result<()> {
            self.0.transfer_territory(from, to, unit)
        }
    }

    fn cell(activity: u32, next_attack: Timestamp) -> TerrorCell {
        TerrorCell {
            id: "c1".into(),
            target: "t".into(),
            sponsor: "s".into(),
            activity,
            next_attack,
        }
    }

    #[test]
    fn test_funding_buys_activity_in_whole_points() {
        let mut c = cell(10, 0);
        assert_eq!(c.fund(2_500.0), 12);
        assert_eq!(c.fund(999.0), 12);
        assert_eq!(c.fund(1_000_000.0), MAX_ACTIVITY);
    }

    #[test]
    fn test_attack_needs_threshold_and_schedule() {
        assert!(cell(50, 100).attack_due(100, 50));
        assert!(!cell(49, 100).attack_due(100, 50));
        assert!(!cell(80, 101).attack_due(100, 50));
    }

    #[test]
    fn test_threat_rating_bands() {
        assert_eq!(ThreatRating::classify(0.0), ThreatRating::None);
        assert_eq!(ThreatRating::classify(5.0), ThreatRating::Minimal);
        assert_eq!(ThreatRating::classify(20.0), ThreatRating::Low);
        assert_eq!(ThreatRating::classify(45.0), ThreatRating::Medium);
        assert_eq!(ThreatRating::classify(60.0), ThreatRating::High);
        assert_eq!(ThreatRating::classify(100.0), ThreatRating::Critical);
    }

    #[test]
    fn test_cell_survives_an_unpaid_elimination() {
        let world = SandboxWorld::new();
        let target = world.add_nation("t", 10_000.0);
        world.add_nation("s", 10_000.0);
        let collab = Collaborators::new(
            Arc::new(FrozenTreasury(world.clone())),
            world.clone(),
            world.clone(),
        );
        let store = Arc::new(MemoryStore::with_records(vec![cell(10, 0)]));
        let service = TerrorService::load(
            Arc::new(ConflictConfig::default()),
            collab,
            store.clone(),
            Arc::new(NullSink),
        );

        let result = service.eliminate_cell(&target, "c1", 500.0);

        assert!(matches!(result, Err(ConflictError::PreconditionFailed(_))));
        assert!(service.cell("c1").is_some());
        assert!(store.get("c1").is_some());
        assert_eq!(world.treasury(&target), 10_000.0);
    }

    #[test]
    fn test_failed_save_is_retried_by_the_next_pass() {
        let world = SandboxWorld::new();
        let target = world.add_nation("t", 10_000.0);
        let sponsor = world.add_nation("s", 10_000.0);
        let store = Arc::new(MemoryStore::<TerrorCell>::new());
        let service = TerrorService::load(
            Arc::new(ConflictConfig::default()),
            world.collaborators(),
            store.clone(),
            Arc::new(NullSink),
        );
        let id = service.create_cell(&target, &sponsor, 1_000.0, 0).unwrap();

        store.set_failing(true);
        assert_eq!(service.fund_cell(&sponsor, &id, 5_000.0).unwrap(), 15);
        assert_eq!(store.get(&id).unwrap().activity, 10);

        store.set_failing(false);
        assert_eq!(service.run_tick(1), 0);
        assert_eq!(store.get(&id).unwrap().activity, 15);
    }
}
