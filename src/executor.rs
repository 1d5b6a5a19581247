//! Bounded parallel executor for one batch of galaxies.
//!
//! Items are processed through a buffered stream with a fixed number of
//! in-flight futures. Every worker waits the pacing delay before each item,
//! so a batch of `N` items takes at least `ceil(N / workers)` pacing delays.
//! Completed results are forwarded over a channel to an optional
//! [`ProgressObserver`]; the observer task is joined before returning.

use crate::types::ProcessingResult;
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Receives one notification per completed item
pub trait ProgressObserver: Send + Sync {
    /// Called after each item finishes, in completion order
    ///
    /// `completed` counts finished items including this one.
    fn on_item_complete(&self, result: &ProcessingResult, completed: usize, total: usize);
}

/// Pool size and pacing for [`run_batch`]
#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    /// Maximum number of items processed concurrently
    pub worker_count: usize,
    /// Delay applied by a worker before each item
    pub pacing_delay: Duration,
}

/// Apply `process` to every item with at most `worker_count` in flight
///
/// Returns one result per item in completion order.
pub async fn run_batch<T, F, Fut>(
    items: Vec<T>,
    options: ExecutorOptions,
    process: F,
    observer: Option<Arc<dyn ProgressObserver>>,
) -> Vec<ProcessingResult>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = ProcessingResult>,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let (progress_tx, observer_task) = match observer {
        Some(observer) => {
            let (tx, rx) = mpsc::channel(total);
            (Some(tx), Some(spawn_observer(observer, rx, total)))
        }
        None => (None, None),
    };

    let process = &process;
    let pacing_delay = options.pacing_delay;
    let results: Vec<ProcessingResult> = stream::iter(items)
        .map(|item| {
            let progress_tx = progress_tx.clone();
            async move {
                tokio::time::sleep(pacing_delay).await;
                let result = process(item).await;
                if let Some(tx) = progress_tx {
                    // Observer may have panicked; results are still collected
                    tx.send(result).await.ok();
                }
                result
            }
        })
        .buffer_unordered(options.worker_count.max(1))
        .collect()
        .await;

    drop(progress_tx);
    if let Some(task) = observer_task
        && let Err(e) = task.await
    {
        tracing::error!(error = %e, "progress observer task panicked");
    }

    results
}

fn spawn_observer(
    observer: Arc<dyn ProgressObserver>,
    mut rx: mpsc::Receiver<ProcessingResult>,
    total: usize,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut completed = 0;
        while let Some(result) = rx.recv().await {
            completed += 1;
            observer.on_item_complete(&result, completed, total);
        }
    })
}
