//! Injectable randomness for battle outcomes
//!
//! Production wiring seeds a ChaCha generator from entropy; tests seed it
//! explicitly or replay a fixed script of rolls.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Source of uniform rolls in `[0, 1)`
pub trait RandomSource: Send {
    fn roll(&mut self) -> f64;

    /// Uniform index into a collection of `len` items (`len` must be non-zero)
    fn pick(&mut self, len: usize) -> usize {
        let index = (self.roll() * len as f64) as usize;
        index.min(len.saturating_sub(1))
    }
}

impl RandomSource for ChaCha8Rng {
    fn roll(&mut self) -> f64 {
        self.gen::<f64>()
    }
}

/// Generator seeded from OS entropy
pub fn entropy() -> ChaCha8Rng {
    ChaCha8Rng::from_entropy()
}

/// Deterministic generator for reproducible runs
pub fn seeded(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Replays a fixed sequence of rolls, cycling when exhausted
#[derive(Debug, Clone)]
pub struct ScriptedRolls {
    rolls: Vec<f64>,
    cursor: usize,
}

impl ScriptedRolls {
    pub fn new(rolls: Vec<f64>) -> Self {
        Self { rolls, cursor: 0 }
    }

    /// Every roll returns the same value
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl RandomSource for ScriptedRolls {
    fn roll(&mut self) -> f64 {
        if self.rolls.is_empty() {
            return 0.0;
        }
        let value = self.rolls[self.cursor % self.rolls.len()];
        self.cursor += 1;
        value.clamp(0.0, 1.0 - f64::EPSILON)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_sources_repeat() {
        let mut a = seeded(7);
        let mut b = seeded(7);
        for _ in 0..16 {
            assert_eq!(a.roll(), b.roll());
        }
    }

    #[test]
    fn test_rolls_stay_in_unit_interval() {
        let mut rng = seeded(99);
        for _ in 0..1000 {
            let r = rng.roll();
            assert!((0.0..1.0).contains(&r));
        }
    }

    #[test]
    fn test_scripted_rolls_cycle() {
        let mut script = ScriptedRolls::new(vec![0.1, 0.9]);
        assert_eq!(script.roll(), 0.1);
        assert_eq!(script.roll(), 0.9);
        assert_eq!(script.roll(), 0.1);
    }

    #[test]
    fn test_pick_stays_in_bounds() {
        let mut script = ScriptedRolls::constant(1.0);
        assert_eq!(script.pick(5), 4);
        let mut script = ScriptedRolls::constant(0.0);
        assert_eq!(script.pick(5), 0);
    }
}
