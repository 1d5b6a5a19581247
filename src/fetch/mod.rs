//! FITS cutout retrieval
//!
//! - [`cutout`] builds retrieval URLs and artifact paths
//! - [`http`] performs the request and persists the payload
//!
//! Fetching is abstracted behind [`ImageFetcher`] so the coordinator can be
//! driven without network access in tests.

use std::path::Path;

pub mod cutout;
pub mod http;

pub use cutout::{CutoutRequest, artifact_path};
pub use http::HttpImageFetcher;

/// Retrieves one cutout and stores it at `output`
///
/// Implementations report failure as `false`; they never retry internally
/// and never leave a partial file behind.
#[async_trait::async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch `url` and write the payload to `output`
    async fn fetch(&self, url: &str, output: &Path) -> bool;
}
