//! Engine configuration with documented constants
//!
//! Every tunable of the conflict simulation lives here. Values can be
//! overridden from a TOML file; keys that are absent keep their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{ConflictError, Result};
use crate::core::types::{HOUR_MS, MINUTE_MS};

/// Configuration for the conflict engine and its scheduler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictConfig {
    // === SCHEDULER ===
    /// Seconds between war tick passes (battles, upkeep, state evaluation)
    pub war_tick_secs: u64,

    /// Seconds between front decay passes
    ///
    /// Decay runs on a slower cadence than battles so that quiet fronts
    /// drift back toward the defender gradually.
    pub front_decay_secs: u64,

    /// Seconds between siege advancement passes
    pub siege_tick_secs: u64,

    /// Seconds between trade war passes
    pub trade_war_tick_secs: u64,

    /// Seconds between terror cell passes
    pub terror_tick_secs: u64,

    /// Capacity of the bounded notification channel
    ///
    /// Events beyond this are dropped rather than blocking a tick.
    pub event_channel_capacity: usize,

    /// Minimum active war count before a tick pass fans out across threads
    pub parallel_threshold: usize,

    // === BATTLES ===
    /// Chance that an eligible front fights a battle on a given tick
    pub battle_chance: f64,

    /// Minimum time since a front's last battle before it can fight again
    pub battle_cooldown_ms: u64,

    /// Strength bonus per 100 points of front progress or defense
    ///
    /// At 0.1, a side holding a front at 100% fights 10% harder there.
    pub front_bonus_factor: f64,

    /// Front progress gained by the attacker on a victory (defense lost equally)
    pub win_progress_shift: f64,

    /// Front progress lost by the attacker on a defeat (defense gained equally)
    pub loss_progress_shift: f64,

    /// Casualties suffered by the victor, as a fraction of the loser's strength
    pub victor_casualty_rate: f64,

    /// Casualties suffered by the loser, as a fraction of the loser's strength
    pub loser_casualty_rate: f64,

    /// Infrastructure damage on an attacker victory, fraction of defender strength
    pub attacker_win_damage_rate: f64,

    /// Infrastructure damage on a defender victory, fraction of attacker strength
    pub defender_win_damage_rate: f64,

    /// Share of the defender's territory taken per attacker victory (minimum one unit)
    pub territory_gain_rate: f64,

    /// Treasury cost per casualty
    pub casualty_unit_cost: f64,

    // === FRONTS ===
    /// Time without battle after which a front starts decaying
    pub front_decay_window_ms: u64,

    /// Progress removed from the attacker (and added to the defender) per decay pass
    pub front_decay_step: f64,

    /// Defender defense on a freshly opened front
    pub initial_front_defense: f64,

    // === ECONOMY ===
    /// Base cost of a war declaration before type and strength scaling
    pub base_declaration_cost: f64,

    /// Base per-tick upkeep paid by each belligerent before type scaling
    pub base_upkeep: f64,

    /// Share of the defender's war cost paid to a victorious attacker
    pub attacker_reparation_rate: f64,

    /// Share of the attacker's war cost paid to a victorious defender
    pub defender_reparation_rate: f64,

    // === VICTORY ===
    /// Mean front progress at or above which the attacker wins outright
    pub attacker_victory_progress: f64,

    /// Mean front progress at or below which the defender can win outright
    pub defender_victory_progress: f64,

    /// Share of the defender's pre-war territory the attacker must hold to win
    pub territory_victory_share: f64,

    // === SIEGES ===
    /// Siege progress added per siege pass (percentage points)
    ///
    /// At 2.0 per five-minute pass, an unrelieved siege completes in ~4 hours.
    pub siege_progress_per_tick: f64,

    // === TRADE WARS AND TERROR CELLS ===
    /// Treasury loss per tariff point imposed by the opponent, per pass
    pub trade_war_loss_per_tariff_point: f64,

    /// Delay between attacks by the same terror cell
    pub terror_attack_cooldown_ms: u64,

    /// Minimum cell activity required for an attack
    pub terror_attack_threshold: u32,

    /// Activity spent by a cell when it attacks
    pub terror_activity_spent: u32,

    /// Stability removed from the target nation per attack
    pub terror_stability_hit: f64,
}

impl Default for ConflictConfig {
    fn default() -> Self {
        Self {
            // Scheduler
            war_tick_secs: 120,
            front_decay_secs: 300,
            siege_tick_secs: 300,
            trade_war_tick_secs: 600,
            terror_tick_secs: 1800,
            event_channel_capacity: 256,
            parallel_threshold: 64,

            // Battles
            battle_chance: 0.3,
            battle_cooldown_ms: 10 * MINUTE_MS,
            front_bonus_factor: 0.1,
            win_progress_shift: 5.0,
            loss_progress_shift: 3.0,
            victor_casualty_rate: 0.05,
            loser_casualty_rate: 0.15,
            attacker_win_damage_rate: 0.02,
            defender_win_damage_rate: 0.01,
            territory_gain_rate: 0.01,
            casualty_unit_cost: 100.0,

            // Fronts
            front_decay_window_ms: 30 * MINUTE_MS,
            front_decay_step: 1.0,
            initial_front_defense: 50.0,

            // Economy
            base_declaration_cost: 5000.0,
            base_upkeep: 100.0,
            attacker_reparation_rate: 0.3,
            defender_reparation_rate: 0.2,

            // Victory
            attacker_victory_progress: 90.0,
            defender_victory_progress: 10.0,
            territory_victory_share: 0.5,

            // Sieges
            siege_progress_per_tick: 2.0,

            // Satellites
            trade_war_loss_per_tariff_point: 100.0,
            terror_attack_cooldown_ms: 24 * HOUR_MS,
            terror_attack_threshold: 50,
            terror_activity_spent: 30,
            terror_stability_hit: 10.0,
        }
    }
}

impl ConflictConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document, filling absent keys with defaults
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConflictError::Config(e.to_string()))?;
        config.validate().map_err(ConflictError::Config)?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> std::result::Result<(), String> {
        let intervals = [
            ("war_tick_secs", self.war_tick_secs),
            ("front_decay_secs", self.front_decay_secs),
            ("siege_tick_secs", self.siege_tick_secs),
            ("trade_war_tick_secs", self.trade_war_tick_secs),
            ("terror_tick_secs", self.terror_tick_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                return Err(format!("{} must be positive", name));
            }
        }

        let fractions = [
            ("battle_chance", self.battle_chance),
            ("victor_casualty_rate", self.victor_casualty_rate),
            ("loser_casualty_rate", self.loser_casualty_rate),
            ("territory_gain_rate", self.territory_gain_rate),
            ("attacker_reparation_rate", self.attacker_reparation_rate),
            ("defender_reparation_rate", self.defender_reparation_rate),
            ("territory_victory_share", self.territory_victory_share),
        ];
        for (name, value) in fractions {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{} ({}) must be within [0, 1]", name, value));
            }
        }

        if self.defender_victory_progress >= self.attacker_victory_progress {
            return Err(format!(
                "defender_victory_progress ({}) should be < attacker_victory_progress ({})",
                self.defender_victory_progress, self.attacker_victory_progress
            ));
        }

        if !(0.0..=100.0).contains(&self.initial_front_defense) {
            return Err("initial_front_defense must be within [0, 100]".into());
        }

        if self.siege_progress_per_tick <= 0.0 {
            return Err("siege_progress_per_tick must be positive".into());
        }

        if self.event_channel_capacity == 0 {
            return Err("event_channel_capacity must be positive".into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ConflictConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ConflictConfig::from_toml_str("battle_chance = 1.0\nwar_tick_secs = 5\n").unwrap();
        assert_eq!(config.battle_chance, 1.0);
        assert_eq!(config.war_tick_secs, 5);
        assert_eq!(config.base_declaration_cost, 5000.0);
        assert_eq!(config.battle_cooldown_ms, 10 * MINUTE_MS);
    }

    #[test]
    fn test_rejects_out_of_range_probability() {
        let err = ConflictConfig::from_toml_str("battle_chance = 1.5").unwrap_err();
        assert!(matches!(err, ConflictError::Config(_)));
    }

    #[test]
    fn test_rejects_inverted_victory_thresholds() {
        let config = ConflictConfig {
            attacker_victory_progress: 10.0,
            defender_victory_progress: 90.0,
            ..ConflictConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_malformed_toml() {
        assert!(ConflictConfig::from_toml_str("battle_chance = \"often\"").is_err());
    }
}
