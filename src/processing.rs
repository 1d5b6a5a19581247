//! Per-galaxy processing: fetch one cutout and compute the new row state.

use crate::fetch::{CutoutRequest, ImageFetcher, artifact_path};
use crate::types::{Galaxy, GalaxyStatus, ProcessingResult};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a worker needs to process one galaxy
#[derive(Clone)]
pub struct ItemContext {
    /// Cutout retrieval client
    pub fetcher: Arc<dyn ImageFetcher>,
    /// URL builder for the cutout API
    pub cutout: CutoutRequest,
    /// Root directory for FITS artifacts
    pub data_path: PathBuf,
    /// Failed attempts after which a galaxy is marked `Failed`
    pub max_fails: u32,
}

/// Fetch one galaxy's cutout and derive its processing result
pub async fn process_galaxy(ctx: &ItemContext, galaxy: &Galaxy) -> ProcessingResult {
    let url = ctx.cutout.url(galaxy.ra, galaxy.dec);
    let output = artifact_path(&ctx.data_path, galaxy.bin_id, &galaxy.source_id);

    let success = ctx.fetcher.fetch(&url, &output).await;
    let result = next_result(galaxy, success, ctx.max_fails);

    if success {
        tracing::debug!(galaxy_id = %galaxy.id, source_id = %galaxy.source_id, "galaxy fetched");
    } else {
        tracing::info!(
            galaxy_id = %galaxy.id,
            source_id = %galaxy.source_id,
            failed_attempts = result.failed_attempts,
            status = %result.status,
            "galaxy fetch failed"
        );
    }

    result
}

/// Apply one attempt's outcome to a galaxy's status and failure counter
///
/// Success keeps the counter as it was. A failure increments it and marks
/// the galaxy `Failed` once the counter reaches `max_fails`.
pub fn next_result(galaxy: &Galaxy, success: bool, max_fails: u32) -> ProcessingResult {
    if success {
        return ProcessingResult {
            id: galaxy.id,
            status: GalaxyStatus::Fetched,
            failed_attempts: galaxy.failed_attempts,
        };
    }

    let failed_attempts = galaxy.failed_attempts.saturating_add(1);
    let status = if i64::from(failed_attempts) >= i64::from(max_fails) {
        GalaxyStatus::Failed
    } else {
        GalaxyStatus::Pending
    };

    ProcessingResult {
        id: galaxy.id,
        status,
        failed_attempts,
    }
}
