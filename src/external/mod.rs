//! Collaborator contracts consumed by the conflict engine
//!
//! Nations, diplomacy, armies, bonuses and settlements are owned elsewhere.
//! The engine reaches them only through these traits and treats a missing
//! entry as a degraded read rather than a failure.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::core::error::{ConflictError, Result};
use crate::core::types::{NationId, SettlementId, TerritoryUnit};
use crate::warfare::strength::UnitCounts;

/// Treasury and territory bookkeeping for nations
pub trait NationRegistry: Send + Sync {
    /// Current treasury balance, `None` for an unknown nation
    fn balance(&self, nation: &NationId) -> Option<f64>;

    /// Remove funds; fails with `InsufficientFunds` without changing the balance
    fn debit(&self, nation: &NationId, amount: f64) -> Result<()>;

    fn credit(&self, nation: &NationId, amount: f64) -> Result<()>;

    /// Territory units currently claimed, `None` for an unknown nation
    fn claimed_territory(&self, nation: &NationId) -> Option<BTreeSet<TerritoryUnit>>;

    fn transfer_territory(&self, from: &NationId, to: &NationId, unit: &TerritoryUnit)
        -> Result<()>;
}

/// Bilateral relationship bookkeeping
pub trait DiplomacyRegistry: Send + Sync {
    fn is_at_war(&self, a: &NationId, b: &NationId) -> bool;
    fn register_war_declared(&self, a: &NationId, b: &NationId);
    fn register_peace(&self, a: &NationId, b: &NationId);
    /// Directional: how `from` regards `to` changes by `delta`
    fn adjust_reputation(&self, from: &NationId, to: &NationId, delta: f64);
}

/// Unit counts owned by each nation
pub trait MilitaryRegistry: Send + Sync {
    fn unit_counts(&self, nation: &NationId) -> Option<UnitCounts>;
}

/// Kinds of external strength multipliers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BonusKind {
    /// Installed warfare, industrial and logistics modifiers
    Modifiers,
    /// Researched "warStrength" technology
    WarStrength,
}

/// Technology and modifier multipliers
pub trait BonusProvider: Send + Sync {
    fn bonus(&self, nation: &NationId, kind: BonusKind) -> Option<f64>;
}

/// Registry of settlements and their owners
pub trait SettlementRegistry: Send + Sync {
    fn owner(&self, settlement: &SettlementId) -> Option<NationId>;

    fn exists(&self, settlement: &SettlementId) -> bool {
        self.owner(settlement).is_some()
    }

    fn transfer_ownership(&self, settlement: &SettlementId, new_owner: &NationId) -> Result<()>;
}

/// Domestic stability, hit by terror attacks
pub trait StabilityRegistry: Send + Sync {
    fn adjust_stability(&self, nation: &NationId, delta: f64) -> Result<()>;
}

/// Bundle of collaborator handles shared by every engine service
///
/// Military, bonus and stability providers are optional; without them the
/// engine falls back to neutral values.
#[derive(Clone)]
pub struct Collaborators {
    pub nations: Arc<dyn NationRegistry>,
    pub diplomacy: Arc<dyn DiplomacyRegistry>,
    pub settlements: Arc<dyn SettlementRegistry>,
    pub military: Option<Arc<dyn MilitaryRegistry>>,
    pub bonuses: Option<Arc<dyn BonusProvider>>,
    pub stability: Option<Arc<dyn StabilityRegistry>>,
}

impl Collaborators {
    pub fn new(
        nations: Arc<dyn NationRegistry>,
        diplomacy: Arc<dyn DiplomacyRegistry>,
        settlements: Arc<dyn SettlementRegistry>,
    ) -> Self {
        Self {
            nations,
            diplomacy,
            settlements,
            military: None,
            bonuses: None,
            stability: None,
        }
    }

    pub fn with_military(mut self, military: Arc<dyn MilitaryRegistry>) -> Self {
        self.military = Some(military);
        self
    }

    pub fn with_bonuses(mut self, bonuses: Arc<dyn BonusProvider>) -> Self {
        self.bonuses = Some(bonuses);
        self
    }

    pub fn with_stability(mut self, stability: Arc<dyn StabilityRegistry>) -> Self {
        self.stability = Some(stability);
        self
    }

    /// Debit as much of `amount` as the nation holds, flooring its balance at zero
    ///
    /// Returns the amount actually removed.
    pub fn drain(&self, nation: &NationId, amount: f64) -> f64 {
        if amount <= 0.0 {
            return 0.0;
        }
        let Some(balance) = self.nations.balance(nation) else {
            tracing::warn!(%nation, "cannot drain treasury of unknown nation");
            return 0.0;
        };
        let taken = amount.min(balance.max(0.0));
        if taken <= 0.0 {
            return 0.0;
        }
        match self.nations.debit(nation, taken) {
            Ok(()) => taken,
            Err(e) => {
                tracing::warn!(%nation, error = %e, "treasury drain failed");
                0.0
            }
        }
    }

    /// Debit only when the full amount is affordable
    pub fn charge_if_affordable(&self, nation: &NationId, amount: f64) -> bool {
        match self.nations.balance(nation) {
            Some(balance) if balance >= amount => self.nations.debit(nation, amount).is_ok(),
            _ => false,
        }
    }

    /// Require a known nation, reporting it as a validation failure otherwise
    pub fn require_nation(&self, nation: &NationId) -> Result<f64> {
        self.nations
            .balance(nation)
            .ok_or_else(|| ConflictError::Validation(format!("unknown nation '{}'", nation)))
    }
}
