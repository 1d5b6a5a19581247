//! Batch coordinator: the claim, dispatch, reconcile, report, decide loop.
//!
//! - [`reporting`] - Fire-and-forget orchestrator notifications
//!
//! One coordinator drives one iteration at a time. Cross-process safety
//! comes from the store's skip-locked claim; within a process the claimed
//! batch is owned by the loop until it is reconciled.

mod reporting;


use crate::config::Config;
use crate::error::Result;
use crate::executor::{self, ExecutorOptions, ProgressObserver};
use crate::fetch::{CutoutRequest, ImageFetcher};
use crate::processing::{ItemContext, process_galaxy};
use crate::reporter::StatusReporter;
use crate::store::GalaxyStore;
use crate::types::{
    Event, Galaxy, GalaxyStatus, IterationReport, Phase, PipelineStatus, ProcessingResult,
    RunSummary, TerminationReason,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Drives the fetch pipeline against a galaxy store
#[derive(Clone)]
pub struct BatchCoordinator {
    /// Pipeline configuration
    config: Arc<Config>,
    /// Claim and reconcile backend
    store: Arc<dyn GalaxyStore>,
    /// Orchestrator notifications
    reporter: Arc<dyn StatusReporter>,
    /// Shared per-item processing context
    item_ctx: ItemContext,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    /// Live progress shared with the control API
    status: Arc<PipelineStatus>,
}

/// Counters accumulated over a run
#[derive(Debug, Default)]
struct Totals {
    iterations: u64,
    fetched: usize,
    failed: usize,
    retrying: usize,
}

impl Totals {
    fn record(&mut self, results: &[ProcessingResult]) {
        self.iterations += 1;
        for result in results {
            match result.status {
                GalaxyStatus::Fetched => self.fetched += 1,
                GalaxyStatus::Failed => self.failed += 1,
                GalaxyStatus::Pending => self.retrying += 1,
            }
        }
    }

    fn finish(self, reason: TerminationReason) -> RunSummary {
        RunSummary {
            iterations: self.iterations,
            fetched: self.fetched,
            failed: self.failed,
            retrying: self.retrying,
            reason,
        }
    }
}

/// Forwards executor progress to the status snapshot and event channel
struct IterationObserver {
    iteration: u64,
    status: Arc<PipelineStatus>,
    event_tx: broadcast::Sender<Event>,
}

impl ProgressObserver for IterationObserver {
    fn on_item_complete(&self, result: &ProcessingResult, completed: usize, total: usize) {
        self.status.record_progress(completed);
        self.event_tx
            .send(Event::GalaxyProcessed {
                iteration: self.iteration,
                result: *result,
                completed,
                total,
            })
            .ok();
    }
}

impl BatchCoordinator {
    /// Create a coordinator
    ///
    /// Fails only if the cutout base URL in `config` cannot be parsed.
    pub fn new(
        config: Config,
        store: Arc<dyn GalaxyStore>,
        fetcher: Arc<dyn ImageFetcher>,
        reporter: Arc<dyn StatusReporter>,
    ) -> Result<Self> {
        let item_ctx = ItemContext {
            fetcher,
            cutout: CutoutRequest::from_config(&config.cutout)?,
            data_path: config.data_path.clone(),
            max_fails: config.max_fails,
        };

        // Create broadcast channel with buffer size of 1000 events
        let (event_tx, _rx) = broadcast::channel(1000);
        let status = Arc::new(PipelineStatus::new(config.sql_batch_size as usize));

        Ok(Self {
            config: Arc::new(config),
            store,
            reporter,
            item_ctx,
            event_tx,
            status,
        })
    }

    /// Subscribe to coordinator events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Live progress, shared with the control API
    pub fn status(&self) -> Arc<PipelineStatus> {
        Arc::clone(&self.status)
    }

    /// Get the current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run iterations until the store is exhausted, an iteration fails
    /// completely, or `stop` is cancelled
    ///
    /// Cancellation is observed before each claim and during the pause
    /// between iterations; a batch that has been claimed always runs to
    /// reconciliation. A store error ends the run with `Err` after the
    /// claim has been rolled back. Outstanding status reports are awaited
    /// before returning.
    pub async fn run(&self, stop: CancellationToken) -> Result<RunSummary> {
        let mut reports = JoinSet::new();
        let mut totals = Totals::default();

        let outcome = self.run_iterations(&stop, &mut reports, &mut totals).await;

        self.status.set_phase(Phase::Terminated);
        reporting::drain(&mut reports).await;

        let reason = outcome.inspect_err(|e| {
            tracing::error!(error = %e, "galaxy fetch run aborted");
        })?;

        self.event_tx.send(Event::Terminated { reason }).ok();
        let summary = totals.finish(reason);
        tracing::info!(
            reason = ?summary.reason,
            iterations = summary.iterations,
            fetched = summary.fetched,
            failed = summary.failed,
            retrying = summary.retrying,
            "galaxy fetch run finished"
        );

        Ok(summary)
    }

    async fn run_iterations(
        &self,
        stop: &CancellationToken,
        reports: &mut JoinSet<()>,
        totals: &mut Totals,
    ) -> Result<TerminationReason> {
        let mut iteration: u64 = 0;

        loop {
            if stop.is_cancelled() {
                tracing::info!(iteration, "stop requested, not claiming another batch");
                return Ok(TerminationReason::Stopped);
            }

            self.status.set_phase(Phase::Claiming);
            let batch = self.store.claim(self.config.sql_batch_size).await?;
            let galaxies = batch.galaxies().to_vec();

            if galaxies.is_empty() {
                batch.release().await?;
                tracing::info!(iteration, "no pending galaxies left");
                return Ok(TerminationReason::Exhausted);
            }

            self.status.begin_iteration(iteration);
            tracing::info!(iteration, claimed = galaxies.len(), "claimed galaxy batch");
            self.event_tx
                .send(Event::IterationStarted {
                    iteration,
                    claimed: galaxies.len(),
                })
                .ok();

            self.status.set_phase(Phase::Dispatching);
            let results = self.dispatch(iteration, galaxies).await;

            self.status.set_phase(Phase::Reconciling);
            batch.reconcile(&results).await?;

            let report = IterationReport::from_results(iteration, &results);
            totals.record(&results);
            tracing::info!(
                iteration,
                successes = report.successes.len(),
                fails = report.fails.len(),
                "iteration committed"
            );
            self.event_tx
                .send(Event::IterationComplete {
                    iteration,
                    successes: report.successes.len(),
                    fails: report.fails.len(),
                })
                .ok();

            self.status.set_phase(Phase::Reporting);
            let total_failure = report.is_total_failure();
            reporting::spawn_report(
                reports,
                Arc::clone(&self.reporter),
                report,
                self.config.pacing.report_timeout,
                self.event_tx.clone(),
            );

            self.status.set_phase(Phase::Deciding);
            if total_failure {
                tracing::warn!(iteration, "every galaxy in the batch failed, stopping");
                return Ok(TerminationReason::AllFailed);
            }
            iteration += 1;

            self.status.set_phase(Phase::Idle);
            tokio::select! {
                _ = stop.cancelled() => {
                    tracing::info!(iteration, "stop requested during pause");
                    return Ok(TerminationReason::Stopped);
                }
                _ = tokio::time::sleep(self.config.pacing.iteration_pause) => {}
            }
        }
    }

    async fn dispatch(&self, iteration: u64, galaxies: Vec<Galaxy>) -> Vec<ProcessingResult> {
        let options = ExecutorOptions {
            worker_count: self.config.pacing.worker_count,
            pacing_delay: self.config.pacing.pacing_delay,
        };
        let observer: Arc<dyn ProgressObserver> = Arc::new(IterationObserver {
            iteration,
            status: Arc::clone(&self.status),
            event_tx: self.event_tx.clone(),
        });

        let ctx = &self.item_ctx;
        executor::run_batch(
            galaxies,
            options,
            move |galaxy: Galaxy| async move { process_galaxy(ctx, &galaxy).await },
            Some(observer),
        )
        .await
    }
}
