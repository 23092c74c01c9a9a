//! Sieges of individual settlements
//!
//! A siege needs an active war between besieger and owner, advances linearly
//! every tick and hands the settlement over when it completes.

pub mod record;
pub mod service;
pub mod stats;

pub use record::Siege;
pub use service::SiegeService;
pub use stats::{GlobalSiegeStats, NationSiegeStats, SiegeRating};
