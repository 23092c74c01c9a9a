//! Conflict Engine - tick-driven wars, fronts, battles and sieges

pub mod core;
pub mod engine;
pub mod events;
pub mod external;
pub mod hostility;
pub mod persistence;
pub mod random;
pub mod sandbox;
pub mod scheduler;
pub mod siege;
pub mod warfare;

pub use crate::core::{ConflictConfig, ConflictError, Result};
pub use engine::{ConflictEngine, EngineStores};
pub use scheduler::{ConflictScheduler, Pass, SchedulerHandle};
