//! Front lines: construction from shared borders, battle shifts and decay

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::core::types::{TerritoryUnit, Timestamp};

/// Name of the catch-all front opened when the belligerents share no border
pub const DEFAULT_FRONT_NAME: &str = "Main Front";
pub const DEFAULT_FRONT_REGION: &str = "all";

/// A contested front line within one war
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Front {
    pub name: String,
    pub region: String,
    /// Attacker advancement, 0-100
    pub attacker_progress: f64,
    /// Defender resistance, 0-100; moves independently of progress
    pub defender_defense: f64,
    pub contested_units: BTreeSet<TerritoryUnit>,
    pub last_battle: Timestamp,
    pub battles: u32,
}

fn clamp_percent(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

impl Front {
    pub fn new(
        name: impl Into<String>,
        region: impl Into<String>,
        contested_units: BTreeSet<TerritoryUnit>,
        opened_at: Timestamp,
        initial_defense: f64,
    ) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            attacker_progress: 0.0,
            defender_defense: clamp_percent(initial_defense),
            contested_units,
            last_battle: opened_at,
            battles: 0,
        }
    }

    /// Shift progress and defense after a battle, clamping both
    pub fn shift(&mut self, progress_delta: f64, defense_delta: f64) {
        self.attacker_progress = clamp_percent(self.attacker_progress + progress_delta);
        self.defender_defense = clamp_percent(self.defender_defense + defense_delta);
    }

    pub fn record_battle(&mut self, at: Timestamp) {
        self.last_battle = at;
        self.battles += 1;
    }

    pub fn since_last_battle(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.last_battle)
    }

    /// A front can fight again once strictly more than `cooldown_ms` has passed
    pub fn battle_ready(&self, now: Timestamp, cooldown_ms: u64) -> bool {
        self.since_last_battle(now) > cooldown_ms
    }

    /// Drift a quiet front toward the defender; returns whether it changed
    pub fn decay(&mut self, now: Timestamp, window_ms: u64, step: f64) -> bool {
        if self.since_last_battle(now) <= window_ms {
            return false;
        }
        let before = (self.attacker_progress, self.defender_defense);
        self.shift(-step, step);
        before != (self.attacker_progress, self.defender_defense)
    }

    /// Neither side has a decisive hold on this front
    pub fn is_stalemated(&self) -> bool {
        (40.0..=60.0).contains(&self.attacker_progress)
            && (40.0..=60.0).contains(&self.defender_defense)
    }
}

/// Attacker-side border units adjacent to the defender, grouped by world
pub fn shared_borders(
    attacker: &BTreeSet<TerritoryUnit>,
    defender: &BTreeSet<TerritoryUnit>,
) -> BTreeMap<String, BTreeSet<TerritoryUnit>> {
    let mut borders: BTreeMap<String, BTreeSet<TerritoryUnit>> = BTreeMap::new();
    if attacker.is_empty() || defender.is_empty() {
        return borders;
    }

    for unit in attacker {
        if unit.neighbors().any(|n| defender.contains(&n)) {
            borders
                .entry(unit.world.clone())
                .or_default()
                .insert(unit.clone());
        }
    }

    borders
}

/// Open one front per bordering world, or a single catch-all front
pub fn build_fronts(
    attacker: &BTreeSet<TerritoryUnit>,
    defender: &BTreeSet<TerritoryUnit>,
    opened_at: Timestamp,
    initial_defense: f64,
) -> BTreeMap<String, Front> {
    let mut fronts = BTreeMap::new();

    for (number, (world, units)) in shared_borders(attacker, defender).into_iter().enumerate() {
        let name = format!("Front {} ({})", number + 1, world);
        let front = Front::new(name.clone(), world, units, opened_at, initial_defense);
        fronts.insert(name, front);
    }

    if fronts.is_empty() {
        let front = Front::new(
            DEFAULT_FRONT_NAME,
            DEFAULT_FRONT_REGION,
            BTreeSet::new(),
            opened_at,
            initial_defense,
        );
        fronts.insert(DEFAULT_FRONT_NAME.to_string(), front);
    }

    fronts
}

/// Mean attacker progress across fronts, 0 when there are none
pub fn mean_progress<'a>(fronts: impl IntoIterator<Item = &'a Front>) -> f64 {
    mean(fronts.into_iter().map(|f| f.attacker_progress))
}

/// Mean defender defense across fronts, 0 when there are none
pub fn mean_defense<'a>(fronts: impl IntoIterator<Item = &'a Front>) -> f64 {
    mean(fronts.into_iter().map(|f| f.defender_defense))
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(world: &str, coords: &[(i32, i32)]) -> BTreeSet<TerritoryUnit> {
        coords
            .iter()
            .map(|&(x, z)| TerritoryUnit::new(world, x, z))
            .collect()
    }

    #[test]
    fn test_shift_clamps_both_metrics() {
        let mut front = Front::new("f", "w", BTreeSet::new(), 0, 50.0);
        front.shift(150.0, -80.0);
        assert_eq!(front.attacker_progress, 100.0);
        assert_eq!(front.defender_defense, 0.0);
        front.shift(-300.0, 300.0);
        assert_eq!(front.attacker_progress, 0.0);
        assert_eq!(front.defender_defense, 100.0);
    }

    #[test]
    fn test_battle_cooldown_is_strict() {
        let front = Front::new("f", "w", BTreeSet::new(), 1_000, 50.0);
        assert!(!front.battle_ready(1_500, 500));
        assert!(front.battle_ready(1_501, 500));
    }

    #[test]
    fn test_decay_only_after_window() {
        let mut front = Front::new("f", "w", BTreeSet::new(), 0, 50.0);
        front.attacker_progress = 20.0;
        assert!(!front.decay(100, 100, 1.0));
        assert!(front.decay(101, 100, 1.0));
        assert_eq!(front.attacker_progress, 19.0);
        assert_eq!(front.defender_defense, 51.0);
    }

    #[test]
    fn test_decay_at_bounds_reports_no_change() {
        let mut front = Front::new("f", "w", BTreeSet::new(), 0, 100.0);
        assert!(!front.decay(1_000, 10, 1.0));
    }

    #[test]
    fn test_shared_borders_group_by_world() {
        let attacker = {
            let mut a = units("overworld", &[(0, 0), (5, 5)]);
            a.extend(units("nether", &[(10, 10)]));
            a
        };
        let defender = {
            let mut d = units("overworld", &[(1, 1)]);
            d.extend(units("nether", &[(11, 10)]));
            d
        };

        let borders = shared_borders(&attacker, &defender);
        assert_eq!(borders.len(), 2);
        assert_eq!(borders["overworld"], units("overworld", &[(0, 0)]));
        assert_eq!(borders["nether"], units("nether", &[(10, 10)]));
    }

    #[test]
    fn test_no_border_opens_catch_all_front() {
        let attacker = units("overworld", &[(0, 0)]);
        let defender = units("overworld", &[(50, 50)]);
        let fronts = build_fronts(&attacker, &defender, 42, 50.0);

        assert_eq!(fronts.len(), 1);
        let front = &fronts[DEFAULT_FRONT_NAME];
        assert_eq!(front.region, DEFAULT_FRONT_REGION);
        assert_eq!(front.attacker_progress, 0.0);
        assert_eq!(front.defender_defense, 50.0);
        assert_eq!(front.last_battle, 42);
        assert!(front.contested_units.is_empty());
    }

    #[test]
    fn test_bordering_worlds_get_numbered_fronts() {
        let attacker = units("overworld", &[(0, 0)]);
        let defender = units("overworld", &[(0, 1)]);
        let fronts = build_fronts(&attacker, &defender, 0, 50.0);
        assert!(fronts.contains_key("Front 1 (overworld)"));
    }

    #[test]
    fn test_means_of_empty_set_are_zero() {
        let fronts: Vec<Front> = Vec::new();
        assert_eq!(mean_progress(&fronts), 0.0);
        assert_eq!(mean_defense(&fronts), 0.0);
    }
}
