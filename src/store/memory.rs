//! In-process galaxy store with skip-locked claim semantics.
//!
//! Rows claimed by an outstanding [`ClaimedBatch`] are invisible to other
//! claimers until the batch is reconciled, released or dropped. Useful for
//! running the coordinator without a database.

use super::{ClaimedBatch, GalaxyStore};
use crate::error::DatabaseError;
use crate::types::{Galaxy, GalaxyId, GalaxyStatus, ProcessingResult};
use crate::{Error, Result};
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Table {
    rows: BTreeMap<GalaxyId, Row>,
    locked: HashSet<GalaxyId>,
}

#[derive(Debug, Clone)]
struct Row {
    galaxy: Galaxy,
    eligible: bool,
}

/// Galaxy store kept in memory
#[derive(Clone, Debug, Default)]
pub struct MemoryGalaxyStore {
    table: Arc<Mutex<Table>>,
    claims: Arc<AtomicU64>,
    fail_claims: Arc<AtomicBool>,
}

impl MemoryGalaxyStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding eligible galaxies
    pub fn with_galaxies(galaxies: impl IntoIterator<Item = Galaxy>) -> Self {
        let store = Self::new();
        for galaxy in galaxies {
            store.insert(galaxy, true);
        }
        store
    }

    /// Insert or replace a galaxy; `eligible` stands in for the catalog predicate
    pub fn insert(&self, galaxy: Galaxy, eligible: bool) {
        if let Ok(mut table) = self.lock() {
            table.rows.insert(galaxy.id, Row { galaxy, eligible });
        }
    }

    /// Current state of one galaxy
    pub fn get(&self, id: GalaxyId) -> Option<Galaxy> {
        self.lock()
            .ok()
            .and_then(|table| table.rows.get(&id).map(|row| row.galaxy.clone()))
    }

    /// Current state of every galaxy, ordered by id
    pub fn galaxies(&self) -> Vec<Galaxy> {
        self.lock()
            .map(|table| table.rows.values().map(|row| row.galaxy.clone()).collect())
            .unwrap_or_default()
    }

    /// Number of claims served so far, including empty ones
    pub fn claim_count(&self) -> u64 {
        self.claims.load(Ordering::SeqCst)
    }

    /// Number of rows currently held by outstanding batches
    pub fn locked_count(&self) -> usize {
        self.lock().map(|table| table.locked.len()).unwrap_or_default()
    }

    /// Make subsequent claims fail with a database error
    pub fn fail_claims(&self, fail: bool) {
        self.fail_claims.store(fail, Ordering::SeqCst);
    }

    fn lock(&self) -> Result<MutexGuard<'_, Table>> {
        self.table
            .lock()
            .map_err(|_| Error::Other("galaxy table mutex poisoned".to_string()))
    }
}

#[async_trait::async_trait]
impl GalaxyStore for MemoryGalaxyStore {
    async fn claim(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>> {
        self.claims.fetch_add(1, Ordering::SeqCst);
        if self.fail_claims.load(Ordering::SeqCst) {
            return Err(Error::Database(DatabaseError::QueryFailed(
                "claim rejected".to_string(),
            )));
        }

        let mut table = self.lock()?;
        let Table { rows, locked } = &mut *table;

        let galaxies: Vec<Galaxy> = rows
            .values()
            .filter(|row| {
                row.eligible
                    && row.galaxy.status == GalaxyStatus::Pending
                    && !locked.contains(&row.galaxy.id)
            })
            .take(limit as usize)
            .map(|row| row.galaxy.clone())
            .collect();

        locked.extend(galaxies.iter().map(|g| g.id));

        Ok(Box::new(MemoryClaimedBatch {
            table: Arc::clone(&self.table),
            galaxies,
        }))
    }
}

struct MemoryClaimedBatch {
    table: Arc<Mutex<Table>>,
    galaxies: Vec<Galaxy>,
}

impl MemoryClaimedBatch {
    fn unlock(&self, table: &mut Table) {
        for galaxy in &self.galaxies {
            table.locked.remove(&galaxy.id);
        }
    }
}

#[async_trait::async_trait]
impl ClaimedBatch for MemoryClaimedBatch {
    fn galaxies(&self) -> &[Galaxy] {
        &self.galaxies
    }

    async fn reconcile(self: Box<Self>, results: &[ProcessingResult]) -> Result<()> {
        let mut table = self
            .table
            .lock()
            .map_err(|_| Error::Other("galaxy table mutex poisoned".to_string()))?;

        for result in results {
            if let Some(row) = table.rows.get_mut(&result.id) {
                row.galaxy.status = result.status;
                row.galaxy.failed_attempts = result.failed_attempts;
            }
        }
        // Drop unlocks the rows
        Ok(())
    }

    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

impl Drop for MemoryClaimedBatch {
    fn drop(&mut self) {
        if let Ok(mut table) = self.table.lock() {
            self.unlock(&mut table);
        }
    }
}
