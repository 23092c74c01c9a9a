pub mod config;
pub mod error;
pub mod sync;
pub mod types;

pub use config::ConflictConfig;
pub use error::{ConflictError, Result};
pub use types::{NationId, SettlementId, TerritoryUnit, Timestamp, WarId};
