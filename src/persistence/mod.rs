//! Record persistence
//!
//! The engine only needs bulk load at startup plus save/delete of single
//! records. File layout belongs to the store implementation.

pub mod json;
pub mod memory;

use std::collections::BTreeSet;
use std::sync::Mutex;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::error::Result;
use crate::core::sync::lock;

pub use json::JsonDirStore;
pub use memory::MemoryStore;

/// A persistable record with a stable identity
pub trait Record: Serialize + DeserializeOwned + Send + Sync {
    fn record_id(&self) -> String;
}

pub trait RecordStore<R: Record>: Send + Sync {
    fn load_all(&self) -> Result<Vec<R>>;
    fn save(&self, record: &R) -> Result<()>;
    /// Deleting an absent record is not an error
    fn delete(&self, id: &str) -> Result<()>;
}

/// Load every record, degrading to an empty set when the store is unreadable
pub fn load_or_empty<R: Record>(store: &dyn RecordStore<R>, kind: &str) -> Vec<R> {
    match store.load_all() {
        Ok(records) => records,
        Err(e) => {
            tracing::error!("failed to load {} records, starting empty: {}", kind, e);
            Vec::new()
        }
    }
}

#[derive(Debug, Default)]
struct Outstanding {
    saves: BTreeSet<String>,
    deletes: BTreeSet<String>,
}

/// Store writes that failed and are owed on the next pass
///
/// In-memory state stays authoritative. A failed save marks the record
/// unsaved until a later save succeeds; a failed delete is retried by
/// `retry_deletes`. A successful save of an id cancels its pending delete.
#[derive(Debug, Default)]
pub struct PendingWrites {
    outstanding: Mutex<Outstanding>,
}

impl PendingWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save `record`; returns whether the store accepted it
    pub fn save<R: Record>(&self, store: &dyn RecordStore<R>, record: &R, kind: &str) -> bool {
        let id = record.record_id();
        let result = store.save(record);
        let mut outstanding = lock(&self.outstanding);
        outstanding.deletes.remove(&id);
        match result {
            Ok(()) => {
                outstanding.saves.remove(&id);
                true
            }
            Err(e) => {
                tracing::warn!("failed to persist {} {}: {}", kind, id, e);
                outstanding.saves.insert(id);
                false
            }
        }
    }

    /// Delete `id`; returns whether the store accepted it
    pub fn delete<R: Record>(&self, store: &dyn RecordStore<R>, id: &str, kind: &str) -> bool {
        let result = store.delete(id);
        let mut outstanding = lock(&self.outstanding);
        outstanding.saves.remove(id);
        match result {
            Ok(()) => {
                outstanding.deletes.remove(id);
                true
            }
            Err(e) => {
                tracing::warn!("failed to delete {} {}: {}", kind, id, e);
                outstanding.deletes.insert(id.to_string());
                false
            }
        }
    }

    /// Whether the last save of `id` failed
    pub fn is_unsaved(&self, id: &str) -> bool {
        lock(&self.outstanding).saves.contains(id)
    }

    /// Retry every failed delete; returns how many went through
    pub fn retry_deletes<R: Record>(&self, store: &dyn RecordStore<R>, kind: &str) -> usize {
        let ids: Vec<String> = lock(&self.outstanding).deletes.iter().cloned().collect();
        ids.iter()
            .filter(|id| self.delete(store, id, kind))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        let outstanding = lock(&self.outstanding);
        outstanding.saves.is_empty() && outstanding.deletes.is_empty()
    }
}
