//! Siege statistics

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::types::{NationId, SettlementId, Timestamp};
use crate::siege::record::Siege;

const TOP_NATIONS: usize = 10;

/// Coarse classification of a nation's siege activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SiegeRating {
    NoSieges,
    Initial,
    Active,
    Besieger,
    Besieged,
}

impl SiegeRating {
    pub fn classify(attacking: usize, defending: usize) -> Self {
        match (attacking, defending) {
            (5.., _) => SiegeRating::Besieger,
            (3.., _) => SiegeRating::Active,
            (1.., _) => SiegeRating::Initial,
            (0, 3..) => SiegeRating::Besieged,
            _ => SiegeRating::NoSieges,
        }
    }
}

/// A siege seen from one participant
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiegeView {
    pub settlement: SettlementId,
    pub opponent: NationId,
    pub progress: f64,
    pub started_at: Timestamp,
    pub duration_hours: u64,
    pub minutes_remaining: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NationSiegeStats {
    pub attacking: Vec<SiegeView>,
    pub defending: Vec<SiegeView>,
    pub rating: SiegeRating,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GlobalSiegeStats {
    pub active_sieges: usize,
    pub by_attacker: BTreeMap<NationId, usize>,
    pub by_defender: BTreeMap<NationId, usize>,
    pub average_progress: f64,
    pub top_attackers: Vec<(NationId, usize)>,
    pub most_besieged: Vec<(NationId, usize)>,
}

/// Estimation parameters for time remaining
#[derive(Debug, Clone, Copy)]
pub struct SiegePace {
    pub increment: f64,
    pub tick_secs: u64,
}

pub fn nation_stats(nation: &NationId, sieges: &[Siege], pace: SiegePace, now: Timestamp) -> NationSiegeStats {
    let view = |siege: &Siege, opponent: &NationId| SiegeView {
        settlement: siege.settlement.clone(),
        opponent: opponent.clone(),
        progress: siege.progress,
        started_at: siege.started_at,
        duration_hours: siege.duration_hours(now),
        minutes_remaining: siege.minutes_remaining(pace.increment, pace.tick_secs),
    };

    let attacking: Vec<SiegeView> = sieges
        .iter()
        .filter(|s| &s.attacker == nation)
        .map(|s| view(s, &s.defender))
        .collect();
    let defending: Vec<SiegeView> = sieges
        .iter()
        .filter(|s| &s.defender == nation)
        .map(|s| view(s, &s.attacker))
        .collect();
    let rating = SiegeRating::classify(attacking.len(), defending.len());

    NationSiegeStats {
        attacking,
        defending,
        rating,
    }
}

pub fn global_stats(sieges: &[Siege]) -> GlobalSiegeStats {
    let mut stats = GlobalSiegeStats {
        active_sieges: sieges.len(),
        ..Default::default()
    };
    let mut progress = 0.0;
    for siege in sieges {
        *stats.by_attacker.entry(siege.attacker.clone()).or_default() += 1;
        *stats.by_defender.entry(siege.defender.clone()).or_default() += 1;
        progress += siege.progress;
    }
    if !sieges.is_empty() {
        stats.average_progress = progress / sieges.len() as f64;
    }
    stats.top_attackers = ranked(&stats.by_attacker);
    stats.most_besieged = ranked(&stats.by_defender);
    stats
}

fn ranked(counts: &BTreeMap<NationId, usize>) -> Vec<(NationId, usize)> {
    let mut ranked: Vec<(NationId, usize)> = counts.iter().map(|(n, c)| (n.clone(), *c)).collect();
    // Stable sort keeps nation order among ties
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_NATIONS);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn siege(city: &str, attacker: &str, defender: &str, progress: f64) -> Siege {
        let mut siege = Siege::new(city.into(), attacker.into(), defender.into(), 0);
        siege.progress = progress;
        siege
    }

    #[test]
    fn test_rating_tiers() {
        assert_eq!(SiegeRating::classify(0, 0), SiegeRating::NoSieges);
        assert_eq!(SiegeRating::classify(1, 9), SiegeRating::Initial);
        assert_eq!(SiegeRating::classify(3, 0), SiegeRating::Active);
        assert_eq!(SiegeRating::classify(5, 0), SiegeRating::Besieger);
        assert_eq!(SiegeRating::classify(0, 3), SiegeRating::Besieged);
        assert_eq!(SiegeRating::classify(0, 2), SiegeRating::NoSieges);
    }

    #[test]
    fn test_nation_views_name_the_opponent() {
        let sieges = vec![
            siege("x", "a", "b", 10.0),
            siege("y", "c", "a", 50.0),
        ];
        let pace = SiegePace {
            increment: 2.0,
            tick_secs: 300,
        };
        let stats = nation_stats(&NationId::new("a"), &sieges, pace, 2 * crate::core::types::HOUR_MS);
        assert_eq!(stats.attacking.len(), 1);
        assert_eq!(stats.attacking[0].opponent, NationId::new("b"));
        assert_eq!(stats.attacking[0].duration_hours, 2);
        assert_eq!(stats.defending[0].opponent, NationId::new("c"));
        assert_eq!(stats.defending[0].minutes_remaining, 125.0);
        assert_eq!(stats.rating, SiegeRating::Initial);
    }

    #[test]
    fn test_global_average_and_rankings() {
        let sieges = vec![
            siege("x", "a", "b", 10.0),
            siege("y", "a", "c", 30.0),
            siege("z", "d", "b", 50.0),
        ];
        let stats = global_stats(&sieges);
        assert_eq!(stats.active_sieges, 3);
        assert_eq!(stats.average_progress, 30.0);
        assert_eq!(stats.top_attackers[0], (NationId::new("a"), 2));
        assert_eq!(stats.most_besieged[0], (NationId::new("b"), 2));
    }
}
