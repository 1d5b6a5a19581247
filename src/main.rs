use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use galaxy_fetch::api::{AppState, start_control_server};
use galaxy_fetch::{
    BatchCoordinator, Config, HttpImageFetcher, HttpStatusReporter, PgGalaxyStore, StatusReporter,
    cancel_on_signal,
};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;
    info!(
        container_id = %config.container_id,
        data_path = %config.data_path.display(),
        batch_size = config.sql_batch_size,
        max_fails = config.max_fails,
        workers = config.pacing.worker_count,
        "Configuration loaded"
    );

    let store = PgGalaxyStore::connect(&config.database_url)
        .await
        .context("Failed to connect to the galaxy database")?;
    store
        .ensure_schema()
        .await
        .context("Failed to prepare the galaxies table")?;

    let fetcher =
        HttpImageFetcher::new(config.pacing.request_timeout).context("Failed to build HTTP client")?;
    let reporter = Arc::new(HttpStatusReporter::new(
        config.status_report_url(),
        config.pacing.report_timeout,
    ));
    let bind_address = config.control_bind_address();
    info!(report_url = %reporter.url(), control = %bind_address, "Pipeline endpoints");

    let coordinator = BatchCoordinator::new(
        config,
        Arc::new(store.clone()),
        Arc::new(fetcher),
        reporter.clone(),
    )
    .context("Failed to build coordinator")?;

    // Control API: stop requests and progress polling
    let stop = CancellationToken::new();
    let server_shutdown = CancellationToken::new();
    let server_handle = tokio::spawn(start_control_server(
        AppState::new(coordinator.status(), stop.clone()),
        bind_address,
        server_shutdown.clone(),
    ));
    let signal_handle = cancel_on_signal(stop.clone());

    let outcome = coordinator.run(stop.clone()).await;

    if let Err(e) = reporter.pipeline_finished().await {
        warn!(error = %e, "Failed to notify orchestrator that the pipeline finished");
    }

    stop.cancel();
    server_shutdown.cancel();
    signal_handle.await.ok();
    match server_handle.await {
        Ok(Err(e)) => warn!(error = %e, "Control API server failed"),
        Err(e) => warn!(error = %e, "Control API server task panicked"),
        Ok(Ok(())) => {}
    }
    store.close().await;

    let summary = outcome.context("Galaxy fetch run failed")?;
    info!(
        reason = ?summary.reason,
        iterations = summary.iterations,
        fetched = summary.fetched,
        failed = summary.failed,
        "Pipeline finished"
    );
    Ok(())
}
