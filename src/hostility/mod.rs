//! Hostilities short of open war: tariff battles and sponsored terror
//!
//! Both follow the war record pattern (registry of locked records, a store,
//! their own scheduler cadence) but move treasury and stability rather than
//! territory.

pub mod terror_cell;
pub mod trade_war;

pub use terror_cell::{TerrorCell, TerrorService, TerrorStats, ThreatRating};
pub use trade_war::{TradeWar, TradeWarRating, TradeWarService, TradeWarStats};
