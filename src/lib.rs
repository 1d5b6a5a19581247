//! # galaxy-fetch
//!
//! Horizontally scalable fetch pipeline for galaxy FITS cutouts.
//!
//! Any number of pipeline processes can run against the same `galaxies`
//! table. Each one repeatedly claims a batch of pending rows under
//! `FOR UPDATE SKIP LOCKED`, downloads a cutout per galaxy through a small
//! paced worker pool, writes every outcome back in one statement, and tells
//! the orchestrator which galaxies succeeded.
//!
//! ## Quick Start
//!
//! ```no_run
//! use galaxy_fetch::{
//!     BatchCoordinator, Config, HttpImageFetcher, HttpStatusReporter, PgGalaxyStore,
//! };
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!
//!     let store = PgGalaxyStore::connect(&config.database_url).await?;
//!     let fetcher = HttpImageFetcher::new(config.pacing.request_timeout)?;
//!     let reporter =
//!         HttpStatusReporter::new(config.status_report_url(), config.pacing.report_timeout);
//!
//!     let coordinator = BatchCoordinator::new(
//!         config,
//!         Arc::new(store),
//!         Arc::new(fetcher),
//!         Arc::new(reporter),
//!     )?;
//!
//!     let summary = coordinator.run(CancellationToken::new()).await?;
//!     println!("stopped: {:?}", summary.reason);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Control API module
pub mod api;
/// Configuration types
pub mod config;
/// Batch coordinator state machine
pub mod coordinator;
/// Error types
pub mod error;
/// Bounded parallel executor
pub mod executor;
/// Cutout retrieval
pub mod fetch;
/// Per-galaxy processing
pub mod processing;
/// Orchestrator notifications
pub mod reporter;
/// Galaxy store backends
pub mod store;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::{Config, CutoutConfig, PacingConfig};
pub use coordinator::BatchCoordinator;
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use executor::{ExecutorOptions, ProgressObserver};
pub use fetch::{HttpImageFetcher, ImageFetcher};
pub use reporter::{HttpStatusReporter, StatusReporter};
pub use store::{ClaimedBatch, GalaxyStore, MemoryGalaxyStore, PgGalaxyStore};
pub use types::{
    Event, Galaxy, GalaxyId, GalaxyStatus, IterationReport, Phase, PipelineStatus,
    ProcessingResult, RunSummary, StatusSnapshot, TerminationReason,
};

use tokio_util::sync::CancellationToken;

/// Cancel `stop` when the process receives a termination signal
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// The returned task also finishes, without cancelling, once `stop` is
/// cancelled some other way.
pub fn cancel_on_signal(stop: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = wait_for_signal() => {
                tracing::info!("finishing current iteration before stopping");
                stop.cancel();
            }
            _ = stop.cancelled() => {}
        }
    })
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
