//! Fire-and-forget orchestrator notifications.

use crate::reporter::StatusReporter;
use crate::types::{Event, IterationReport};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinSet;

/// Send `report` in the background; failures are logged and broadcast, never retried
pub(super) fn spawn_report(
    reports: &mut JoinSet<()>,
    reporter: Arc<dyn StatusReporter>,
    report: IterationReport,
    timeout: Duration,
    event_tx: broadcast::Sender<Event>,
) {
    // Reap notifications that already finished
    while reports.try_join_next().is_some() {}

    reports.spawn(async move {
        let iteration = report.iteration;
        let error_msg = match tokio::time::timeout(timeout, reporter.report(&report)).await {
            Ok(Ok(())) => {
                tracing::debug!(iteration, "status report delivered");
                return;
            }
            Ok(Err(e)) => format!("Failed to send status report: {}", e),
            Err(_) => format!("Status report timed out after {:?}", timeout),
        };

        tracing::warn!(iteration, error = %error_msg, "status report failed");
        event_tx
            .send(Event::ReportFailed {
                iteration,
                error: error_msg,
            })
            .ok();
    });
}

/// Wait for every outstanding notification
pub(super) async fn drain(reports: &mut JoinSet<()>) {
    while let Some(result) = reports.join_next().await {
        if let Err(e) = result {
            tracing::error!(error = %e, "status report task panicked");
        }
    }
}
