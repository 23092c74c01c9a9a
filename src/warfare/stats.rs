//! War statistics computed from record snapshots

use ahash::AHashMap;
use serde::Serialize;

use crate::core::types::NationId;
use crate::warfare::war::{War, WarStatus, WarType};

/// How many nations the global ranking lists
const TOP_NATIONS: usize = 10;
const TOP_TYPES: usize = 5;

/// One nation's standing across its active wars
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NationWarStats {
    pub total_wars: usize,
    /// Wars whose display state currently favours this nation
    pub victories: usize,
    pub defeats: usize,
    pub total_battles: u64,
    pub total_casualties: u64,
    pub total_cost: f64,
}

pub fn nation_stats<'a>(nation: &NationId, wars: impl IntoIterator<Item = &'a War>) -> NationWarStats {
    let mut stats = NationWarStats::default();
    for war in wars.into_iter().filter(|w| w.involves(nation)) {
        let is_attacker = &war.attacker == nation;
        stats.total_wars += 1;
        stats.total_battles += u64::from(war.battles_fought);
        if is_attacker {
            stats.total_casualties += war.attacker_casualties;
            stats.total_cost += war.attacker_cost;
        } else {
            stats.total_casualties += war.defender_casualties;
            stats.total_cost += war.defender_cost;
        }

        match (war.status, is_attacker) {
            (WarStatus::AttackerWinning, true) | (WarStatus::DefenderWinning, false) => {
                stats.victories += 1
            }
            (WarStatus::AttackerWinning, false) | (WarStatus::DefenderWinning, true) => {
                stats.defeats += 1
            }
            _ => {}
        }
    }
    stats
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalWarStats {
    pub total_active_wars: usize,
    pub wars_by_type: AHashMap<WarType, usize>,
    pub wars_by_status: AHashMap<WarStatus, usize>,
    pub total_battles: u64,
    pub total_casualties: u64,
    pub total_war_cost: f64,
    pub average_battles_per_war: f64,
    pub average_casualties_per_war: f64,
    pub nations_at_war: usize,
    /// Nations with the most concurrent wars, busiest first
    pub top_by_wars: Vec<(NationId, usize)>,
    pub most_common_types: Vec<(WarType, usize)>,
    pub total_fronts: usize,
    pub average_fronts_per_war: f64,
    pub total_occupied_territories: usize,
}

pub fn global_stats<'a>(wars: impl IntoIterator<Item = &'a War>) -> GlobalWarStats {
    let mut stats = GlobalWarStats::default();
    let mut wars_by_nation: AHashMap<NationId, usize> = AHashMap::new();

    for war in wars {
        stats.total_active_wars += 1;
        *stats.wars_by_type.entry(war.war_type).or_default() += 1;
        *stats.wars_by_status.entry(war.status).or_default() += 1;
        stats.total_battles += u64::from(war.battles_fought);
        stats.total_casualties += war.attacker_casualties + war.defender_casualties;
        stats.total_war_cost += war.attacker_cost + war.defender_cost;
        stats.total_fronts += war.fronts.len();
        stats.total_occupied_territories += war.occupied_units.len();
        *wars_by_nation.entry(war.attacker.clone()).or_default() += 1;
        *wars_by_nation.entry(war.defender.clone()).or_default() += 1;
    }

    if stats.total_active_wars > 0 {
        let count = stats.total_active_wars as f64;
        stats.average_battles_per_war = stats.total_battles as f64 / count;
        stats.average_casualties_per_war = stats.total_casualties as f64 / count;
        stats.average_fronts_per_war = stats.total_fronts as f64 / count;
    }
    stats.nations_at_war = wars_by_nation.len();

    let mut by_nation: Vec<(NationId, usize)> = wars_by_nation.into_iter().collect();
    by_nation.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    by_nation.truncate(TOP_NATIONS);
    stats.top_by_wars = by_nation;

    let mut by_type: Vec<(WarType, usize)> =
        stats.wars_by_type.iter().map(|(t, n)| (*t, *n)).collect();
    by_type.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.as_str().cmp(b.0.as_str())));
    by_type.truncate(TOP_TYPES);
    stats.most_common_types = by_type;

    stats
}
