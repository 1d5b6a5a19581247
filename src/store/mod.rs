//! Galaxy store: claiming batches under row locks and writing results back
//!
//! ## Implementations
//!
//! - [`postgres`]: PostgreSQL, `FOR UPDATE SKIP LOCKED` inside a transaction
//! - [`memory`]: in-process table with the same skip-locked semantics
//!
//! A claim returns a [`ClaimedBatch`] that owns the locks (the open
//! transaction for PostgreSQL). Reconciling writes every result in one
//! statement and commits; releasing or dropping the batch rolls back.

use crate::Result;
use crate::types::{Galaxy, ProcessingResult};

pub mod memory;
pub mod postgres;

pub use memory::MemoryGalaxyStore;
pub use postgres::PgGalaxyStore;

/// Source of claimable galaxies
#[async_trait::async_trait]
pub trait GalaxyStore: Send + Sync {
    /// Lock and return up to `limit` pending, eligible galaxies ordered by id
    ///
    /// Rows locked by another claimer are skipped, never waited on.
    async fn claim(&self, limit: u32) -> Result<Box<dyn ClaimedBatch>>;
}

/// Galaxies held under lock for one claim-to-reconcile cycle
#[async_trait::async_trait]
pub trait ClaimedBatch: Send {
    /// Claimed galaxies, ordered by id
    fn galaxies(&self) -> &[Galaxy];

    /// Write every result in a single update and release the locks
    async fn reconcile(self: Box<Self>, results: &[ProcessingResult]) -> Result<()>;

    /// Release the locks without writing anything
    async fn release(self: Box<Self>) -> Result<()>;
}
