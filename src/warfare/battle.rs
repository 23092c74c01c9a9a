//! Battle resolution
//!
//! One probability model: the attacker wins with probability proportional to
//! its share of the combined effective strength. There are no draws.

use crate::core::config::ConflictConfig;
use crate::core::types::Timestamp;
use crate::random::RandomSource;
use crate::warfare::front::Front;
use crate::warfare::strength::StrengthReport;

/// Result of one battle, before it is applied to the war
#[derive(Debug, Clone, PartialEq)]
pub struct BattleOutcome {
    pub front: String,
    pub attacker_victory: bool,
    pub attacker_casualties: u64,
    pub defender_casualties: u64,
    pub infrastructure_damage: f64,
    /// Territory units the attacker is entitled to take
    pub territory_gained: u32,
    pub attacker_strength: f64,
    pub defender_strength: f64,
}

/// Bonus for the side doing well on a front, from its 0-100 metric
pub fn front_bonus(metric: f64, factor: f64) -> f64 {
    1.0 + metric / 100.0 * factor
}

pub fn attacker_win_probability(attacker: f64, defender: f64) -> f64 {
    let total = attacker + defender;
    if total <= 0.0 || !total.is_finite() {
        return 0.5;
    }
    (attacker / total).clamp(0.0, 1.0)
}

/// Whether a front fights this tick
///
/// The roll is only drawn once the cooldown has elapsed.
pub fn battle_occurs(
    front: &Front,
    now: Timestamp,
    config: &ConflictConfig,
    rng: &mut dyn RandomSource,
) -> bool {
    front.battle_ready(now, config.battle_cooldown_ms) && rng.roll() < config.battle_chance
}

/// Resolve a single battle on `front`
///
/// `defender_territory` is the defender's current claimed unit count and only
/// sizes the territory award. `roll` is a uniform draw in `[0, 1)`; the
/// attacker wins when it falls below its win chance.
pub fn resolve_battle(
    front: &Front,
    attacker: &StrengthReport,
    defender: &StrengthReport,
    defender_territory: usize,
    config: &ConflictConfig,
    roll: f64,
) -> BattleOutcome {
    let attacker_strength =
        attacker.effective() * front_bonus(front.attacker_progress, config.front_bonus_factor);
    let defender_strength =
        defender.effective() * front_bonus(front.defender_defense, config.front_bonus_factor);

    let win_chance = attacker_win_probability(attacker_strength, defender_strength);
    let attacker_victory = roll < win_chance;

    let (attacker_casualties, defender_casualties, infrastructure_damage, territory_gained) =
        if attacker_victory {
            let territory = ((defender_territory as f64 * config.territory_gain_rate).floor()
                as u32)
                .max(1);
            (
                casualties(defender_strength, config.victor_casualty_rate),
                casualties(defender_strength, config.loser_casualty_rate),
                defender_strength * config.attacker_win_damage_rate,
                territory,
            )
        } else {
            (
                casualties(attacker_strength, config.loser_casualty_rate),
                casualties(attacker_strength, config.victor_casualty_rate),
                attacker_strength * config.defender_win_damage_rate,
                0,
            )
        };

    tracing::debug!(
        front = %front.name,
        attacker_strength,
        defender_strength,
        win_chance,
        attacker_victory,
        "battle resolved"
    );

    BattleOutcome {
        front: front.name.clone(),
        attacker_victory,
        attacker_casualties,
        defender_casualties,
        infrastructure_damage,
        territory_gained,
        attacker_strength,
        defender_strength,
    }
}

fn casualties(strength: f64, rate: f64) -> u64 {
    (strength * rate).max(0.0).floor() as u64
}
