//! The siege record

use serde::{Deserialize, Serialize};

use crate::core::types::{NationId, SettlementId, Timestamp};
use crate::persistence::Record;

pub const SIEGE_COMPLETE: f64 = 100.0;

/// An ongoing siege of one settlement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Siege {
    pub settlement: SettlementId,
    pub attacker: NationId,
    pub defender: NationId,
    /// 0-100, never decreases
    pub progress: f64,
    pub started_at: Timestamp,
    /// Set once the siege has been captured or lifted; a closed siege is inert
    #[serde(skip)]
    pub(crate) closed: bool,
}

impl Siege {
    pub fn new(settlement: SettlementId, attacker: NationId, defender: NationId, now: Timestamp) -> Self {
        Self {
            settlement,
            attacker,
            defender,
            progress: 0.0,
            started_at: now,
            closed: false,
        }
    }

    /// Advance by `increment`, capped at completion; returns whether complete
    pub fn advance(&mut self, increment: f64) -> bool {
        self.progress = (self.progress + increment.max(0.0)).min(SIEGE_COMPLETE);
        self.is_complete()
    }

    pub fn is_complete(&self) -> bool {
        self.progress >= SIEGE_COMPLETE
    }

    pub fn is_between(&self, a: &NationId, b: &NationId) -> bool {
        (&self.attacker == a && &self.defender == b) || (&self.attacker == b && &self.defender == a)
    }

    /// Minutes until completion at `increment` per tick of `tick_secs`
    pub fn minutes_remaining(&self, increment: f64, tick_secs: u64) -> f64 {
        if increment <= 0.0 {
            return f64::INFINITY;
        }
        let ticks = ((SIEGE_COMPLETE - self.progress) / increment).max(0.0);
        ticks * tick_secs as f64 / 60.0
    }

    pub fn duration_hours(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.started_at) / crate::core::types::HOUR_MS
    }
}

impl Record for Siege {
    fn record_id(&self) -> String {
        self.settlement.0.clone()
    }
}
