//! Core types for galaxy-fetch

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

/// Primary key of a row in the `galaxies` table
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GalaxyId(pub i64);

impl GalaxyId {
    /// Get the inner i64 value
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl From<i64> for GalaxyId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl From<GalaxyId> for i64 {
    fn from(id: GalaxyId) -> Self {
        id.0
    }
}

impl std::fmt::Display for GalaxyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement sqlx Type, Encode, and Decode for database operations
impl sqlx::Type<sqlx::Postgres> for GalaxyId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <i64 as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <i64 as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for GalaxyId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        sqlx::Encode::<sqlx::Postgres>::encode_by_ref(&self.0, buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for GalaxyId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let id = <i64 as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(id))
    }
}

/// Fetch status of a galaxy, stored as text in the `status` column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GalaxyStatus {
    /// Not fetched yet, or failed with retries remaining
    Pending,
    /// FITS cutout saved to disk
    Fetched,
    /// Retry budget exhausted
    Failed,
}

impl GalaxyStatus {
    /// Column value for this status
    pub fn as_str(&self) -> &'static str {
        match self {
            GalaxyStatus::Pending => "Pending",
            GalaxyStatus::Fetched => "Fetched",
            GalaxyStatus::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for GalaxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown value in the `status` column
#[derive(Debug, Error)]
#[error("unknown galaxy status: {0:?}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for GalaxyStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(GalaxyStatus::Pending),
            "Fetched" => Ok(GalaxyStatus::Fetched),
            "Failed" => Ok(GalaxyStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

impl sqlx::Type<sqlx::Postgres> for GalaxyStatus {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <str as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <str as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Postgres> for GalaxyStatus {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Postgres> for GalaxyStatus {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let raw = <&str as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(raw.parse()?)
    }
}

/// One catalog entry's fetch state, decoded from the `galaxies` table
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Galaxy {
    /// Unique database ID
    pub id: GalaxyId,
    /// External catalog identifier, names the FITS artifact
    pub source_id: String,
    /// Right ascension in degrees
    pub ra: f64,
    /// Declination in degrees
    pub dec: f64,
    /// Bin used to partition artifacts on disk
    pub bin_id: i64,
    /// Current fetch status
    pub status: GalaxyStatus,
    /// Number of failed fetch attempts so far
    pub failed_attempts: i32,
}

/// Outcome of processing one galaxy, applied to the store during reconciliation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingResult {
    /// Galaxy the result belongs to
    pub id: GalaxyId,
    /// Status to write back
    pub status: GalaxyStatus,
    /// Failed-attempt counter to write back
    pub failed_attempts: i32,
}

impl ProcessingResult {
    /// Whether the fetch succeeded
    pub fn is_success(&self) -> bool {
        self.status == GalaxyStatus::Fetched
    }
}

/// Body of the per-iteration status notification sent to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationReport {
    /// Iteration number (0-based)
    pub iteration: u64,
    /// Every galaxy processed in this iteration
    pub galaxies: Vec<GalaxyId>,
    /// Galaxies that were fetched
    pub successes: Vec<GalaxyId>,
    /// Galaxies that failed terminally or are pending retry
    pub fails: Vec<GalaxyId>,
}

impl IterationReport {
    /// Split processing results into the success and failure lists
    pub fn from_results(iteration: u64, results: &[ProcessingResult]) -> Self {
        let mut report = IterationReport {
            iteration,
            galaxies: Vec::with_capacity(results.len()),
            successes: Vec::new(),
            fails: Vec::new(),
        };

        for result in results {
            report.galaxies.push(result.id);
            if result.is_success() {
                report.successes.push(result.id);
            } else {
                report.fails.push(result.id);
            }
        }

        report
    }

    /// Whether every galaxy in a non-empty iteration failed
    pub fn is_total_failure(&self) -> bool {
        !self.galaxies.is_empty() && self.fails.len() == self.galaxies.len()
    }
}

/// Why the coordinator stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The claim returned no eligible galaxies
    Exhausted,
    /// Every galaxy of the last iteration failed
    AllFailed,
    /// The stop token was cancelled
    Stopped,
}

/// Phase of the coordinator state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    /// Between iterations
    Idle = 0,
    /// Selecting and locking a batch
    Claiming = 1,
    /// Fetching the batch through the worker pool
    Dispatching = 2,
    /// Writing results back and committing
    Reconciling = 3,
    /// Notifying the orchestrator
    Reporting = 4,
    /// Choosing whether to continue
    Deciding = 5,
    /// Loop finished
    Terminated = 6,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Phase::Claiming,
            2 => Phase::Dispatching,
            3 => Phase::Reconciling,
            4 => Phase::Reporting,
            5 => Phase::Deciding,
            6 => Phase::Terminated,
            _ => Phase::Idle,
        }
    }
}

/// Live progress of a running coordinator, shared with the control API
#[derive(Debug, Default)]
pub struct PipelineStatus {
    iteration: AtomicU64,
    iteration_progress: AtomicUsize,
    iteration_max_progress: AtomicUsize,
    phase: AtomicU8,
}

impl PipelineStatus {
    /// Create a status starting at iteration 0 with the given per-iteration maximum
    pub fn new(iteration_max_progress: usize) -> Self {
        Self {
            iteration_max_progress: AtomicUsize::new(iteration_max_progress),
            ..Self::default()
        }
    }

    pub(crate) fn set_phase(&self, phase: Phase) {
        self.phase.store(phase as u8, Ordering::SeqCst);
    }

    pub(crate) fn begin_iteration(&self, iteration: u64) {
        self.iteration.store(iteration, Ordering::SeqCst);
        self.iteration_progress.store(0, Ordering::SeqCst);
    }

    pub(crate) fn record_progress(&self, completed: usize) {
        self.iteration_progress.store(completed, Ordering::SeqCst);
    }

    /// Current phase
    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.phase.load(Ordering::SeqCst))
    }

    /// Point-in-time copy of all counters
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            iteration: self.iteration.load(Ordering::SeqCst),
            iteration_progress: self.iteration_progress.load(Ordering::SeqCst),
            iteration_max_progress: self.iteration_max_progress.load(Ordering::SeqCst),
            phase: self.phase(),
        }
    }
}

/// Serializable view of [`PipelineStatus`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Current iteration number
    pub iteration: u64,
    /// Galaxies completed in the current iteration
    pub iteration_progress: usize,
    /// Maximum galaxies per iteration (the batch size)
    pub iteration_max_progress: usize,
    /// Current state machine phase
    pub phase: Phase,
}

/// Totals for a finished [`run`](crate::BatchCoordinator::run)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Number of iterations that processed a batch
    pub iterations: u64,
    /// Galaxies fetched
    pub fetched: usize,
    /// Galaxies marked `Failed`
    pub failed: usize,
    /// Galaxies that failed but stay `Pending` for a later run
    pub retrying: usize,
    /// Why the loop ended
    pub reason: TerminationReason,
}

/// Events broadcast by the coordinator
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A batch was claimed and is about to be dispatched
    IterationStarted {
        /// Iteration number
        iteration: u64,
        /// Galaxies in the batch
        claimed: usize,
    },

    /// One galaxy finished processing
    GalaxyProcessed {
        /// Iteration number
        iteration: u64,
        /// Processing outcome
        result: ProcessingResult,
        /// Galaxies completed so far in this iteration
        completed: usize,
        /// Galaxies in the batch
        total: usize,
    },

    /// Results were committed
    IterationComplete {
        /// Iteration number
        iteration: u64,
        /// Galaxies fetched
        successes: usize,
        /// Galaxies failed or pending retry
        fails: usize,
    },

    /// The orchestrator notification could not be delivered
    ReportFailed {
        /// Iteration number
        iteration: u64,
        /// Error description
        error: String,
    },

    /// The coordinator stopped
    Terminated {
        /// Why it stopped
        reason: TerminationReason,
    },
}
