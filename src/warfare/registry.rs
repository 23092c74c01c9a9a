//! Active war registry
//!
//! The id map and the per-nation index live behind one lock and change
//! together. Records themselves sit behind their own mutex; the registry
//! never locks a record, so holding a record lock while calling in here
//! cannot deadlock.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, RwLock};

use crate::core::error::{ConflictError, Result};
use crate::core::sync::{read, write};
use crate::core::types::{NationId, WarId};
use crate::warfare::war::War;

pub type SharedWar = Arc<Mutex<War>>;

#[derive(Default)]
struct WarIndex {
    wars: BTreeMap<WarId, SharedWar>,
    by_nation: BTreeMap<NationId, BTreeSet<WarId>>,
}

impl WarIndex {
    fn between(&self, a: &NationId, b: &NationId) -> Option<WarId> {
        let (Some(left), Some(right)) = (self.by_nation.get(a), self.by_nation.get(b)) else {
            return None;
        };
        left.intersection(right).next().cloned()
    }

    fn unlink(&mut self, nation: &NationId, id: &WarId) {
        if let Some(ids) = self.by_nation.get_mut(nation) {
            ids.remove(id);
            if ids.is_empty() {
                self.by_nation.remove(nation);
            }
        }
    }
}

#[derive(Default)]
pub struct WarRegistry {
    index: RwLock<WarIndex>,
}

impl WarRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an active war, rejecting a second war between the same pair
    pub fn insert(&self, war: War) -> Result<SharedWar> {
        let mut index = write(&self.index);
        if let Some(existing) = index.between(&war.attacker, &war.defender) {
            return Err(ConflictError::Validation(format!(
                "{} and {} are already at war ({})",
                war.attacker, war.defender, existing
            )));
        }

        let id = war.id.clone();
        let attacker = war.attacker.clone();
        let defender = war.defender.clone();
        let shared = Arc::new(Mutex::new(war));

        index.wars.insert(id.clone(), Arc::clone(&shared));
        index.by_nation.entry(attacker).or_default().insert(id.clone());
        index.by_nation.entry(defender).or_default().insert(id);
        Ok(shared)
    }

    /// Drop a war from both maps
    pub fn remove(&self, id: &WarId, attacker: &NationId, defender: &NationId) -> Option<SharedWar> {
        let mut index = write(&self.index);
        let removed = index.wars.remove(id)?;
        index.unlink(attacker, id);
        index.unlink(defender, id);
        Some(removed)
    }

    pub fn get(&self, id: &WarId) -> Option<SharedWar> {
        read(&self.index).wars.get(id).cloned()
    }

    pub fn between(&self, a: &NationId, b: &NationId) -> Option<SharedWar> {
        let index = read(&self.index);
        let id = index.between(a, b)?;
        index.wars.get(&id).cloned()
    }

    pub fn ids_of(&self, nation: &NationId) -> Vec<WarId> {
        read(&self.index)
            .by_nation
            .get(nation)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn of_nation(&self, nation: &NationId) -> Vec<SharedWar> {
        let index = read(&self.index);
        index
            .by_nation
            .get(nation)
            .into_iter()
            .flatten()
            .filter_map(|id| index.wars.get(id).cloned())
            .collect()
    }

    /// Snapshot of every registered war handle
    pub fn all(&self) -> Vec<SharedWar> {
        read(&self.index).wars.values().cloned().collect()
    }

    pub fn nations_at_war(&self) -> usize {
        read(&self.index).by_nation.len()
    }

    pub fn len(&self) -> usize {
        read(&self.index).wars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
