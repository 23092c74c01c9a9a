//! In-process record store

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::core::error::Result;
use crate::core::sync::lock;
use crate::persistence::{Record, RecordStore};

pub struct MemoryStore<R> {
    records: Mutex<BTreeMap<String, R>>,
    failing: AtomicBool,
}

impl<R: Record + Clone> MemoryStore<R> {
    pub fn new() -> Self {
        Self::with_records(Vec::new())
    }

    pub fn with_records(records: Vec<R>) -> Self {
        let records = records
            .into_iter()
            .map(|r| (r.record_id(), r))
            .collect();
        Self {
            records: Mutex::new(records),
            failing: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail with an IO error
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn get(&self, id: &str) -> Option<R> {
        lock(&self.records).get(id).cloned()
    }

    pub fn len(&self) -> usize {
        lock(&self.records).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "store unavailable").into());
        }
        Ok(())
    }
}

impl<R: Record + Clone> Default for MemoryStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record + Clone> RecordStore<R> for MemoryStore<R> {
    fn load_all(&self) -> Result<Vec<R>> {
        self.check()?;
        Ok(lock(&self.records).values().cloned().collect())
    }

    fn save(&self, record: &R) -> Result<()> {
        self.check()?;
        lock(&self.records).insert(record.record_id(), record.clone());
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.check()?;
        lock(&self.records).remove(id);
        Ok(())
    }
}
