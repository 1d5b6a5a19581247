//! Application state for the control API

use crate::types::PipelineStatus;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// Live progress of the coordinator
    pub status: Arc<PipelineStatus>,

    /// Stop token passed to [`BatchCoordinator::run`](crate::BatchCoordinator::run)
    pub stop: CancellationToken,
}

impl AppState {
    /// Create a new AppState
    pub fn new(status: Arc<PipelineStatus>, stop: CancellationToken) -> Self {
        Self { status, stop }
    }
}
