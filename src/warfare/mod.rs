//! Wars between nations: fronts, battles and the war state machine

pub mod battle;
pub mod front;
pub mod registry;
pub mod service;
pub mod stats;
pub mod strength;
pub mod war;

pub use battle::BattleOutcome;
pub use front::Front;
pub use registry::{SharedWar, WarRegistry};
pub use service::{DeclareWar, EndedWar, WarService};
pub use stats::{GlobalWarStats, NationWarStats};
pub use strength::{StrengthReport, UnitCounts, UnitType};
pub use war::{Belligerent, War, WarStatus, WarType};
