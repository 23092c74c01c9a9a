//! Combat strength calculation
//!
//! Re-evaluated for every battle: unit counts and bonuses change between
//! ticks, so nothing here is cached.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::core::types::NationId;
use crate::external::{BonusKind, Collaborators};

/// Category of military unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitType {
    Infantry,
    Cavalry,
    Artillery,
    Navy,
    Air,
}

impl UnitType {
    pub const ALL: [UnitType; 5] = [
        UnitType::Infantry,
        UnitType::Cavalry,
        UnitType::Artillery,
        UnitType::Navy,
        UnitType::Air,
    ];

    /// Contribution of one unit to base strength
    pub fn weight(&self) -> f64 {
        match self {
            UnitType::Infantry => 1.0,
            UnitType::Cavalry => 1.5,
            UnitType::Artillery => 2.0,
            UnitType::Navy => 2.5,
            UnitType::Air => 3.0,
        }
    }
}

pub type UnitCounts = AHashMap<UnitType, u64>;

/// Strength assumed when no military registry is wired in
pub const FALLBACK_STRENGTH: f64 = 1.0;

/// Weighted sum of unit counts
pub fn base_unit_strength(counts: &UnitCounts) -> f64 {
    counts
        .iter()
        .map(|(unit, &count)| unit.weight() * count as f64)
        .sum()
}

/// The factors that make up a nation's effective strength
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrengthReport {
    pub base: f64,
    pub modifiers: f64,
    pub technology: f64,
}

impl StrengthReport {
    pub fn new(base: f64, modifiers: f64, technology: f64) -> Self {
        Self {
            base,
            modifiers,
            technology,
        }
    }

    /// Strength of a nation with neutral bonuses
    pub fn flat(base: f64) -> Self {
        Self::new(base, 1.0, 1.0)
    }

    pub fn effective(&self) -> f64 {
        self.base * self.modifiers * self.technology
    }
}

/// Base military strength, before any bonus
pub fn military_strength(collab: &Collaborators, nation: &NationId) -> f64 {
    let Some(military) = &collab.military else {
        return FALLBACK_STRENGTH;
    };
    match military.unit_counts(nation) {
        Some(counts) => base_unit_strength(&counts),
        None => {
            tracing::warn!(%nation, "no unit counts, using fallback strength");
            FALLBACK_STRENGTH
        }
    }
}

fn bonus(collab: &Collaborators, nation: &NationId, kind: BonusKind) -> f64 {
    collab
        .bonuses
        .as_ref()
        .and_then(|b| b.bonus(nation, kind))
        .filter(|m| m.is_finite() && *m >= 0.0)
        .unwrap_or(1.0)
}

/// Full strength assessment for one nation
pub fn assess(collab: &Collaborators, nation: &NationId) -> StrengthReport {
    StrengthReport::new(
        military_strength(collab, nation),
        bonus(collab, nation, BonusKind::Modifiers),
        bonus(collab, nation, BonusKind::WarStrength),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_strength_uses_unit_weights() {
        let mut counts = UnitCounts::new();
        counts.insert(UnitType::Infantry, 10);
        counts.insert(UnitType::Cavalry, 4);
        counts.insert(UnitType::Artillery, 2);
        counts.insert(UnitType::Navy, 2);
        counts.insert(UnitType::Air, 1);
        // 10 + 6 + 4 + 5 + 3
        assert_eq!(base_unit_strength(&counts), 28.0);
    }

    #[test]
    fn test_empty_army_has_no_strength() {
        assert_eq!(base_unit_strength(&UnitCounts::new()), 0.0);
    }

    #[test]
    fn test_effective_strength_multiplies_bonuses() {
        let report = StrengthReport::new(100.0, 1.1, 1.5);
        assert!((report.effective() - 165.0).abs() < 1e-9);
        assert_eq!(StrengthReport::flat(40.0).effective(), 40.0);
    }
}
