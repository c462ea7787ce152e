//! In-memory observation collection
//!
//! Readers load the current `Arc<Vec<Observation>>` without locking. Writers
//! serialize on a mutex, build the next vector and publish it with a single
//! atomic store, so a reader sees either the old collection or the new one.

use arc_swap::ArcSwap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use super::{Filter, ObservationStore, Page, StoreError};
use crate::types::Observation;

pub struct InMemoryCollection {
    docs: ArcSwap<Vec<Observation>>,
    write_lock: Mutex<()>,
}

impl Default for InMemoryCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self {
            docs: ArcSwap::from_pointee(Vec::new()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn len(&self) -> usize {
        self.docs.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply `f` to a copy of the current collection and publish the result.
    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Observation>) -> R) -> Result<R, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut next = Vec::clone(&self.docs.load());
        let out = f(&mut next);
        self.docs.store(Arc::new(next));
        Ok(out)
    }
}

impl ObservationStore for InMemoryCollection {
    fn insert_many(&self, rows: Vec<Observation>) -> Result<usize, StoreError> {
        let n = rows.len();
        self.mutate(|docs| docs.extend(rows))?;
        debug!(inserted = n, total = self.len(), "insert_many");
        Ok(n)
    }

    fn find(&self, filter: &Filter, page: Option<Page>) -> Result<Vec<Observation>, StoreError> {
        let docs = self.docs.load();
        let matching = docs.iter().filter(|o| filter.matches(o));
        let rows = match page {
            Some(p) => matching.skip(p.skip).take(p.limit).cloned().collect(),
            None => matching.cloned().collect(),
        };
        Ok(rows)
    }

    fn count_documents(&self, filter: &Filter) -> Result<usize, StoreError> {
        let docs = self.docs.load();
        if filter.is_unconstrained() {
            return Ok(docs.len());
        }
        Ok(docs.iter().filter(|o| filter.matches(o)).count())
    }

    fn delete_many(&self, filter: &Filter) -> Result<usize, StoreError> {
        let removed = self.mutate(|docs| {
            let before = docs.len();
            docs.retain(|o| !filter.matches(o));
            before - docs.len()
        })?;
        debug!(removed, "delete_many");
        Ok(removed)
    }

    fn snapshot(&self) -> Result<Arc<Vec<Observation>>, StoreError> {
        Ok(self.docs.load_full())
    }

    fn replace_all(&self, rows: Vec<Observation>) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().map_err(|_| StoreError::Poisoned)?;
        let n = rows.len();
        self.docs.store(Arc::new(rows));
        debug!(total = n, "replace_all");
        Ok(n)
    }
}
