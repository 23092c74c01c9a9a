//! In-memory collaborators for tests, demos and tooling
//!
//! `SandboxWorld` plays every external registry at once: nations with
//! treasuries and territory, diplomacy, armies, bonuses, settlements and
//! stability.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use crate::core::error::{ConflictError, Result};
use crate::core::sync::lock;
use crate::core::types::{NationId, SettlementId, TerritoryUnit};
use crate::external::{
    BonusKind, BonusProvider, Collaborators, DiplomacyRegistry, MilitaryRegistry, NationRegistry,
    SettlementRegistry, StabilityRegistry,
};
use crate::warfare::strength::UnitCounts;

/// Stability a nation starts with
pub const BASE_STABILITY: f64 = 100.0;

#[derive(Debug, Clone, Default)]
struct NationState {
    treasury: f64,
    territory: BTreeSet<TerritoryUnit>,
    units: Option<UnitCounts>,
    stability: f64,
}

fn ordered(a: &NationId, b: &NationId) -> (NationId, NationId) {
    if a <= b {
        (a.clone(), b.clone())
    } else {
        (b.clone(), a.clone())
    }
}

#[derive(Default)]
struct WorldState {
    nations: BTreeMap<NationId, NationState>,
    wars: BTreeSet<(NationId, NationId)>,
    peace_treaties: u32,
    reputation: BTreeMap<(NationId, NationId), f64>,
    bonuses: BTreeMap<(NationId, BonusKind), f64>,
    settlements: BTreeMap<SettlementId, NationId>,
    failing_settlements: BTreeSet<SettlementId>,
}

#[derive(Default)]
pub struct SandboxWorld {
    state: Mutex<WorldState>,
}

impl SandboxWorld {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Wire this world in as every collaborator
    pub fn collaborators(self: &Arc<Self>) -> Collaborators {
        Collaborators::new(self.clone(), self.clone(), self.clone())
            .with_military(self.clone())
            .with_bonuses(self.clone())
            .with_stability(self.clone())
    }

    pub fn add_nation(&self, nation: impl Into<String>, treasury: f64) -> NationId {
        let id = NationId::new(nation);
        lock(&self.state).nations.insert(
            id.clone(),
            NationState {
                treasury,
                stability: BASE_STABILITY,
                ..Default::default()
            },
        );
        id
    }

    /// Claim a rectangle of units, `x` and `z` ranges inclusive
    pub fn claim_area(&self, nation: &NationId, world: &str, xs: (i32, i32), zs: (i32, i32)) {
        let mut state = lock(&self.state);
        if let Some(n) = state.nations.get_mut(nation) {
            for x in xs.0..=xs.1 {
                for z in zs.0..=zs.1 {
                    n.territory.insert(TerritoryUnit::new(world, x, z));
                }
            }
        }
    }

    pub fn set_units(&self, nation: &NationId, units: UnitCounts) {
        if let Some(n) = lock(&self.state).nations.get_mut(nation) {
            n.units = Some(units);
        }
    }

    pub fn set_bonus(&self, nation: &NationId, kind: BonusKind, multiplier: f64) {
        lock(&self.state).bonuses.insert((nation.clone(), kind), multiplier);
    }

    pub fn set_treasury(&self, nation: &NationId, treasury: f64) {
        if let Some(n) = lock(&self.state).nations.get_mut(nation) {
            n.treasury = treasury;
        }
    }

    pub fn add_settlement(&self, settlement: impl Into<String>, owner: &NationId) -> SettlementId {
        let id = SettlementId::new(settlement);
        lock(&self.state).settlements.insert(id.clone(), owner.clone());
        id
    }

    /// Make ownership transfers of `settlement` fail
    pub fn block_transfers(&self, settlement: &SettlementId, blocked: bool) {
        let mut state = lock(&self.state);
        if blocked {
            state.failing_settlements.insert(settlement.clone());
        } else {
            state.failing_settlements.remove(settlement);
        }
    }

    pub fn treasury(&self, nation: &NationId) -> f64 {
        lock(&self.state)
            .nations
            .get(nation)
            .map(|n| n.treasury)
            .unwrap_or(0.0)
    }

    pub fn territory(&self, nation: &NationId) -> BTreeSet<TerritoryUnit> {
        lock(&self.state)
            .nations
            .get(nation)
            .map(|n| n.territory.clone())
            .unwrap_or_default()
    }

    pub fn stability(&self, nation: &NationId) -> f64 {
        lock(&self.state)
            .nations
            .get(nation)
            .map(|n| n.stability)
            .unwrap_or(0.0)
    }

    /// How `from` regards `to`
    pub fn reputation(&self, from: &NationId, to: &NationId) -> f64 {
        lock(&self.state)
            .reputation
            .get(&(from.clone(), to.clone()))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn peace_treaties(&self) -> u32 {
        lock(&self.state).peace_treaties
    }
}

impl NationRegistry for SandboxWorld {
    fn balance(&self, nation: &NationId) -> Option<f64> {
        lock(&self.state).nations.get(nation).map(|n| n.treasury)
    }

    fn debit(&self, nation: &NationId, amount: f64) -> Result<()> {
        let mut state = lock(&self.state);
        let n = state
            .nations
            .get_mut(nation)
            .ok_or_else(|| ConflictError::Validation(format!("unknown nation '{}'", nation)))?;
        if n.treasury < amount {
            return Err(ConflictError::InsufficientFunds {
                required: amount,
                available: n.treasury,
            });
        }
        n.treasury -= amount;
        Ok(())
    }

    fn credit(&self, nation: &NationId, amount: f64) -> Result<()> {
        let mut state = lock(&self.state);
        let n = state
            .nations
            .get_mut(nation)
            .ok_or_else(|| ConflictError::Validation(format!("unknown nation '{}'", nation)))?;
        n.treasury += amount;
        Ok(())
    }

    fn claimed_territory(&self, nation: &NationId) -> Option<BTreeSet<TerritoryUnit>> {
        lock(&self.state).nations.get(nation).map(|n| n.territory.clone())
    }

    fn transfer_territory(&self, from: &NationId, to: &NationId, unit: &TerritoryUnit) -> Result<()> {
        let mut state = lock(&self.state);
        if !state.nations.contains_key(to) {
            return Err(ConflictError::Validation(format!("unknown nation '{}'", to)));
        }
        let removed = state
            .nations
            .get_mut(from)
            .map(|n| n.territory.remove(unit))
            .unwrap_or(false);
        if !removed {
            return Err(ConflictError::PreconditionFailed(format!(
                "{} does not hold {}",
                from, unit
            )));
        }
        if let Some(n) = state.nations.get_mut(to) {
            n.territory.insert(unit.clone());
        }
        Ok(())
    }
}

impl DiplomacyRegistry for SandboxWorld {
    fn is_at_war(&self, a: &NationId, b: &NationId) -> bool {
        lock(&self.state).wars.contains(&ordered(a, b))
    }

    fn register_war_declared(&self, a: &NationId, b: &NationId) {
        lock(&self.state).wars.insert(ordered(a, b));
    }

    fn register_peace(&self, a: &NationId, b: &NationId) {
        let mut state = lock(&self.state);
        state.wars.remove(&ordered(a, b));
        state.peace_treaties += 1;
    }

    fn adjust_reputation(&self, from: &NationId, to: &NationId, delta: f64) {
        *lock(&self.state)
            .reputation
            .entry((from.clone(), to.clone()))
            .or_default() += delta;
    }
}

impl MilitaryRegistry for SandboxWorld {
    fn unit_counts(&self, nation: &NationId) -> Option<UnitCounts> {
        lock(&self.state).nations.get(nation).and_then(|n| n.units.clone())
    }
}

impl BonusProvider for SandboxWorld {
    fn bonus(&self, nation: &NationId, kind: BonusKind) -> Option<f64> {
        lock(&self.state).bonuses.get(&(nation.clone(), kind)).copied()
    }
}

impl SettlementRegistry for SandboxWorld {
    fn owner(&self, settlement: &SettlementId) -> Option<NationId> {
        lock(&self.state).settlements.get(settlement).cloned()
    }

    fn transfer_ownership(&self, settlement: &SettlementId, new_owner: &NationId) -> Result<()> {
        let mut state = lock(&self.state);
        if state.failing_settlements.contains(settlement) {
            return Err(ConflictError::PreconditionFailed(format!(
                "settlement '{}' cannot change hands",
                settlement
            )));
        }
        let owner = state
            .settlements
            .get_mut(settlement)
            .ok_or_else(|| ConflictError::NotFound(format!("settlement '{}'", settlement)))?;
        *owner = new_owner.clone();
        Ok(())
    }
}

impl StabilityRegistry for SandboxWorld {
    fn adjust_stability(&self, nation: &NationId, delta: f64) -> Result<()> {
        let mut state = lock(&self.state);
        let n = state
            .nations
            .get_mut(nation)
            .ok_or_else(|| ConflictError::Validation(format!("unknown nation '{}'", nation)))?;
        n.stability = (n.stability + delta).max(0.0);
        Ok(())
    }
}
