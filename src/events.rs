//! Conflict notifications
//!
//! Events are fire-and-forget: a slow or absent sink never holds up a tick.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::core::sync::lock;
use crate::core::types::{NationId, SettlementId, WarId};
use crate::warfare::war::{Belligerent, WarType};

/// Something observable happened in the simulation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConflictEvent {
    WarDeclared {
        war_id: WarId,
        attacker: NationId,
        defender: NationId,
        war_type: WarType,
        cost: f64,
    },
    BattleResolved {
        war_id: WarId,
        front: String,
        attacker_victory: bool,
        attacker_casualties: u64,
        defender_casualties: u64,
        territories_captured: u32,
    },
    /// `victor` is `None` for a negotiated peace
    WarEnded {
        war_id: WarId,
        attacker: NationId,
        defender: NationId,
        victor: Option<Belligerent>,
    },
    SiegeStarted {
        settlement: SettlementId,
        attacker: NationId,
        defender: NationId,
    },
    SiegeLifted {
        settlement: SettlementId,
        attacker: NationId,
        defender: NationId,
    },
    SettlementCaptured {
        settlement: SettlementId,
        attacker: NationId,
        defender: NationId,
    },
    TradeWarStarted {
        nation_a: NationId,
        nation_b: NationId,
        tariff: f64,
    },
    TradeWarEnded {
        nation_a: NationId,
        nation_b: NationId,
    },
    TerrorAttack {
        cell_id: String,
        target: NationId,
    },
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: ConflictEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: ConflictEvent) {}
}

/// Writes each event as a structured log line
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn publish(&self, event: ConflictEvent) {
        match serde_json::to_string(&event) {
            Ok(json) => tracing::info!(target: "conflict_engine::events", event = %json),
            Err(e) => tracing::warn!("unserializable conflict event: {}", e),
        }
    }
}

/// Forwards events into a bounded channel, dropping them when it is full
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<ConflictEvent>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ConflictEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelSink {
    fn publish(&self, event: ConflictEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                tracing::debug!(?event, "event channel full, dropping event");
            }
            Err(TrySendError::Closed(_)) => {}
        }
    }
}

/// Keeps every event in memory, for inspection in tests and tools
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ConflictEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ConflictEvent> {
        lock(&self.events).clone()
    }

    pub fn count(&self, matches: impl Fn(&ConflictEvent) -> bool) -> usize {
        lock(&self.events).iter().filter(|e| matches(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: ConflictEvent) {
        lock(&self.events).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConflictEvent {
        ConflictEvent::SiegeStarted {
            settlement: SettlementId::new("city-1"),
            attacker: NationId::new("a"),
            defender: NationId::new("b"),
        }
    }

    #[test]
    fn test_channel_sink_delivers() {
        let (sink, mut rx) = ChannelSink::new(4);
        sink.publish(sample());
        assert_eq!(rx.try_recv().unwrap(), sample());
    }

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, mut rx) = ChannelSink::new(1);
        sink.publish(sample());
        sink.publish(sample());
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, rx) = ChannelSink::new(1);
        drop(rx);
        sink.publish(sample());
    }

    #[test]
    fn test_event_tagging() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"type\":\"siege_started\""));
    }
}
