//! The war record and its state machine

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::config::ConflictConfig;
use crate::core::types::{NationId, TerritoryUnit, Timestamp, WarId};
use crate::persistence::Record;
use crate::warfare::battle::BattleOutcome;
use crate::warfare::front::{self, Front};

/// Default goals of a defending nation
pub const DEFENDER_GOALS: [&str; 2] = ["Defend territory", "Repel the attack"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarType {
    Territorial,
    Economic,
    Total,
    Colonial,
    Civil,
    Religious,
    Proxy,
    Defensive,
}

impl WarType {
    pub const ALL: [WarType; 8] = [
        WarType::Territorial,
        WarType::Economic,
        WarType::Total,
        WarType::Colonial,
        WarType::Civil,
        WarType::Religious,
        WarType::Proxy,
        WarType::Defensive,
    ];

    /// Scaling of the one-off declaration cost
    pub fn declaration_multiplier(&self) -> f64 {
        match self {
            WarType::Total => 3.0,
            WarType::Economic => 2.0,
            WarType::Colonial => 1.5,
            WarType::Religious => 1.2,
            _ => 1.0,
        }
    }

    /// Scaling of the recurring per-tick upkeep
    pub fn upkeep_multiplier(&self) -> f64 {
        match self {
            WarType::Total => 3.0,
            WarType::Economic => 2.5,
            WarType::Colonial => 1.5,
            _ => 1.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WarType::Territorial => "territorial",
            WarType::Economic => "economic",
            WarType::Total => "total",
            WarType::Colonial => "colonial",
            WarType::Civil => "civil",
            WarType::Religious => "religious",
            WarType::Proxy => "proxy",
            WarType::Defensive => "defensive",
        }
    }
}

impl fmt::Display for WarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        WarType::ALL
            .into_iter()
            .find(|t| t.as_str() == wanted)
            .ok_or_else(|| format!("unknown war type '{}'", s))
    }
}

/// Lifecycle state of a war
///
/// `Ended` is terminal. The other states are recomputed every tick from the
/// battle record and front positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarStatus {
    Declared,
    Active,
    Stalemate,
    AttackerWinning,
    DefenderWinning,
    Ended,
}

impl WarStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, WarStatus::Ended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Belligerent {
    Attacker,
    Defender,
}

/// Statistics the state transition is computed from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSummary {
    pub battles_fought: u32,
    pub attacker_wins: u32,
    pub mean_front_progress: f64,
}

/// Pure display-state transition, evaluated once per tick
pub fn next_status(current: WarStatus, summary: &TickSummary) -> WarStatus {
    if current.is_terminal() {
        return current;
    }
    if summary.battles_fought == 0 {
        return WarStatus::Declared;
    }

    let win_ratio = summary.attacker_wins as f64 / summary.battles_fought as f64;
    let progress = summary.mean_front_progress;

    if win_ratio >= 0.7 && progress >= 70.0 {
        WarStatus::AttackerWinning
    } else if win_ratio <= 0.3 && progress <= 30.0 {
        WarStatus::DefenderWinning
    } else if (0.4..=0.6).contains(&win_ratio) && (40.0..=60.0).contains(&progress) {
        WarStatus::Stalemate
    } else {
        WarStatus::Active
    }
}

/// Inputs to outright victory detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VictoryInputs {
    pub mean_front_progress: f64,
    pub territories_captured: u32,
    /// Defender's current territory count; `None` skips the territory rule
    pub defender_territory: Option<usize>,
    pub attacker_wins: u32,
    pub defender_wins: u32,
}

/// Outright victory, independent of the display state
pub fn check_victory(inputs: &VictoryInputs, config: &ConflictConfig) -> Option<Belligerent> {
    let territory_victory = inputs.defender_territory.is_some_and(|current| {
        let original = current as f64 + inputs.territories_captured as f64;
        original > 0.0
            && inputs.territories_captured as f64 >= config.territory_victory_share * original
    });

    if inputs.mean_front_progress >= config.attacker_victory_progress || territory_victory {
        Some(Belligerent::Attacker)
    } else if inputs.mean_front_progress <= config.defender_victory_progress
        && inputs.defender_wins > inputs.attacker_wins * 2
    {
        Some(Belligerent::Defender)
    } else {
        None
    }
}

/// A belligerent relationship between two nations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct War {
    pub id: WarId,
    pub attacker: NationId,
    pub defender: NationId,
    pub war_type: WarType,
    pub status: WarStatus,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    /// Set only when the war ended by outright victory
    #[serde(default)]
    pub victor: Option<Belligerent>,

    // Battle statistics
    pub battles_fought: u32,
    pub attacker_wins: u32,
    pub defender_wins: u32,

    // Territory
    pub territories_captured: u32,
    pub territories_lost: u32,
    pub occupied_units: BTreeSet<TerritoryUnit>,

    // Economy
    pub attacker_cost: f64,
    pub defender_cost: f64,
    pub infrastructure_damage: f64,

    // Losses
    pub attacker_casualties: u64,
    pub defender_casualties: u64,

    pub fronts: BTreeMap<String, Front>,
    pub attacker_goals: Vec<String>,
    pub defender_goals: Vec<String>,
    pub goal_progress: BTreeMap<String, u32>,
}

impl War {
    pub fn declare(
        attacker: NationId,
        defender: NationId,
        war_type: WarType,
        goals: Vec<String>,
        fronts: BTreeMap<String, Front>,
        declaration_cost: f64,
        now: Timestamp,
    ) -> Self {
        let defender_goals: Vec<String> = DEFENDER_GOALS.iter().map(|g| g.to_string()).collect();
        let goal_progress = goals
            .iter()
            .chain(defender_goals.iter())
            .map(|g| (g.clone(), 0))
            .collect();

        Self {
            id: WarId::generate(),
            attacker,
            defender,
            war_type,
            status: WarStatus::Declared,
            started_at: now,
            ended_at: None,
            victor: None,
            battles_fought: 0,
            attacker_wins: 0,
            defender_wins: 0,
            territories_captured: 0,
            territories_lost: 0,
            occupied_units: BTreeSet::new(),
            attacker_cost: declaration_cost,
            defender_cost: 0.0,
            infrastructure_damage: 0.0,
            attacker_casualties: 0,
            defender_casualties: 0,
            fronts,
            attacker_goals: goals,
            defender_goals,
            goal_progress,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn involves(&self, nation: &NationId) -> bool {
        &self.attacker == nation || &self.defender == nation
    }

    pub fn is_between(&self, a: &NationId, b: &NationId) -> bool {
        (&self.attacker == a && &self.defender == b) || (&self.attacker == b && &self.defender == a)
    }

    pub fn mean_front_progress(&self) -> f64 {
        front::mean_progress(self.fronts.values())
    }

    pub fn summary(&self) -> TickSummary {
        TickSummary {
            battles_fought: self.battles_fought,
            attacker_wins: self.attacker_wins,
            mean_front_progress: self.mean_front_progress(),
        }
    }

    pub fn victory_inputs(&self, defender_territory: Option<usize>) -> VictoryInputs {
        VictoryInputs {
            mean_front_progress: self.mean_front_progress(),
            territories_captured: self.territories_captured,
            defender_territory,
            attacker_wins: self.attacker_wins,
            defender_wins: self.defender_wins,
        }
    }

    /// Recompute the display state from the current record
    pub fn reevaluate(&mut self) {
        self.status = next_status(self.status, &self.summary());
    }

    /// Fold a resolved battle into counters and the front it was fought on
    pub fn apply_battle(&mut self, outcome: &BattleOutcome, at: Timestamp, config: &ConflictConfig) {
        self.battles_fought += 1;
        if outcome.attacker_victory {
            self.attacker_wins += 1;
        } else {
            self.defender_wins += 1;
        }
        self.attacker_casualties += outcome.attacker_casualties;
        self.defender_casualties += outcome.defender_casualties;
        self.infrastructure_damage += outcome.infrastructure_damage;

        if let Some(front) = self.fronts.get_mut(&outcome.front) {
            if outcome.attacker_victory {
                front.shift(config.win_progress_shift, -config.win_progress_shift);
            } else {
                front.shift(-config.loss_progress_shift, config.loss_progress_shift);
            }
            front.record_battle(at);
        }
    }

    /// Record territory actually transferred to the attacker
    pub fn record_capture(&mut self, units: &[TerritoryUnit]) {
        let count = units.len() as u32;
        self.occupied_units.extend(units.iter().cloned());
        self.territories_captured += count;
        self.territories_lost += count;
    }

    /// Attacker goals track front progress, defender goals track front defense
    pub fn refresh_goal_progress(&mut self) {
        let offense = front::mean_progress(self.fronts.values()).round() as u32;
        let defense = front::mean_defense(self.fronts.values()).round() as u32;
        for goal in &self.attacker_goals {
            self.goal_progress.insert(goal.clone(), offense.min(100));
        }
        for goal in &self.defender_goals {
            self.goal_progress.insert(goal.clone(), defense.min(100));
        }
    }

    pub fn end(&mut self, victor: Option<Belligerent>, now: Timestamp) {
        self.status = WarStatus::Ended;
        self.ended_at = Some(now);
        self.victor = victor;
    }

    /// Battle counters reconcile with the win tallies
    pub fn counters_consistent(&self) -> bool {
        self.battles_fought == self.attacker_wins + self.defender_wins
    }
}

impl Record for War {
    fn record_id(&self) -> String {
        self.id.0.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(fought: u32, wins: u32, progress: f64) -> TickSummary {
        TickSummary {
            battles_fought: fought,
            attacker_wins: wins,
            mean_front_progress: progress,
        }
    }

    fn sample_war() -> War {
        let fronts = front::build_fronts(&BTreeSet::new(), &BTreeSet::new(), 0, 50.0);
        War::declare(
            NationId::new("a"),
            NationId::new("b"),
            WarType::Territorial,
            vec!["expand".into()],
            fronts,
            5000.0,
            0,
        )
    }

    #[test]
    fn test_no_battles_is_declared() {
        assert_eq!(next_status(WarStatus::Active, &summary(0, 0, 80.0)), WarStatus::Declared);
    }

    #[test]
    fn test_transition_table() {
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 7, 70.0)), WarStatus::AttackerWinning);
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 3, 30.0)), WarStatus::DefenderWinning);
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 5, 50.0)), WarStatus::Stalemate);
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 4, 60.0)), WarStatus::Stalemate);
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 8, 50.0)), WarStatus::Active);
        assert_eq!(next_status(WarStatus::Declared, &summary(10, 5, 65.0)), WarStatus::Active);
    }

    #[test]
    fn test_ended_is_terminal() {
        assert_eq!(next_status(WarStatus::Ended, &summary(10, 10, 100.0)), WarStatus::Ended);
    }

    #[test]
    fn test_attacker_wins_on_front_progress() {
        let config = ConflictConfig::default();
        let inputs = VictoryInputs {
            mean_front_progress: 95.0,
            territories_captured: 0,
            defender_territory: Some(100),
            attacker_wins: 8,
            defender_wins: 2,
        };
        assert_eq!(check_victory(&inputs, &config), Some(Belligerent::Attacker));
    }

    #[test]
    fn test_attacker_wins_on_half_of_prewar_territory() {
        let config = ConflictConfig::default();
        let mut inputs = VictoryInputs {
            mean_front_progress: 20.0,
            territories_captured: 5,
            defender_territory: Some(5),
            attacker_wins: 5,
            defender_wins: 5,
        };
        assert_eq!(check_victory(&inputs, &config), Some(Belligerent::Attacker));

        inputs.defender_territory = Some(6);
        assert_eq!(check_victory(&inputs, &config), None);

        inputs.defender_territory = None;
        assert_eq!(check_victory(&inputs, &config), None);
    }

    #[test]
    fn test_defender_needs_low_progress_and_double_wins() {
        let config = ConflictConfig::default();
        let mut inputs = VictoryInputs {
            mean_front_progress: 5.0,
            territories_captured: 0,
            defender_territory: Some(50),
            attacker_wins: 2,
            defender_wins: 5,
        };
        assert_eq!(check_victory(&inputs, &config), Some(Belligerent::Defender));

        inputs.defender_wins = 4;
        assert_eq!(check_victory(&inputs, &config), None);
    }

    #[test]
    fn test_declare_seeds_goals() {
        let war = sample_war();
        assert_eq!(war.status, WarStatus::Declared);
        assert_eq!(war.attacker_cost, 5000.0);
        assert_eq!(war.defender_goals, vec!["Defend territory", "Repel the attack"]);
        assert_eq!(war.goal_progress.get("expand"), Some(&0));
    }

    #[test]
    fn test_apply_battle_keeps_counters_consistent() {
        let config = ConflictConfig::default();
        let mut war = sample_war();
        let front_name = war.fronts.keys().next().unwrap().clone();
        for attacker_victory in [true, false, true] {
            let outcome = BattleOutcome {
                front: front_name.clone(),
                attacker_victory,
                attacker_casualties: 3,
                defender_casualties: 9,
                infrastructure_damage: 1.5,
                territory_gained: u32::from(attacker_victory),
                attacker_strength: 10.0,
                defender_strength: 10.0,
            };
            war.apply_battle(&outcome, 100, &config);
        }
        assert!(war.counters_consistent());
        assert_eq!(war.battles_fought, 3);
        assert_eq!(war.attacker_wins, 2);
        let front = &war.fronts[&front_name];
        // +5, -3, +5 from zero
        assert_eq!(front.attacker_progress, 7.0);
        assert_eq!(front.defender_defense, 50.0 - 5.0 + 3.0 - 5.0);
        assert_eq!(front.battles, 3);
        assert_eq!(front.last_battle, 100);
        assert_eq!(war.attacker_casualties, 9);
    }

    #[test]
    fn test_goal_progress_tracks_fronts() {
        let mut war = sample_war();
        for front in war.fronts.values_mut() {
            front.attacker_progress = 42.4;
            front.defender_defense = 61.6;
        }
        war.refresh_goal_progress();
        assert_eq!(war.goal_progress["expand"], 42);
        assert_eq!(war.goal_progress["Defend territory"], 62);
    }

    #[test]
    fn test_war_type_parsing() {
        assert_eq!("Total".parse::<WarType>().unwrap(), WarType::Total);
        assert!("skirmish".parse::<WarType>().is_err());
        assert_eq!(WarType::Economic.declaration_multiplier(), 2.0);
        assert_eq!(WarType::Economic.upkeep_multiplier(), 2.5);
    }
}
