//! HTTP cutout fetcher backed by reqwest.

use super::ImageFetcher;
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetches cutouts with a single bounded GET per galaxy
#[derive(Clone)]
pub struct HttpImageFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpImageFetcher {
    /// Create a fetcher whose requests (including the body) time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("galaxy-fetch/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, timeout })
    }

    async fn download(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let request = async {
            let response = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|e| format!("request failed: {e}"))?;

            let status = response.status();
            if status != reqwest::StatusCode::OK {
                return Err(format!("request failed with status code {}", status.as_u16()));
            }

            response
                .bytes()
                .await
                .map(|body| body.to_vec())
                .map_err(|e| format!("failed to read body: {e}"))
        };

        match tokio::time::timeout(self.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(format!("request timed out after {:?}", self.timeout)),
        }
    }
}

#[async_trait::async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str, output: &Path) -> bool {
        let body = match self.download(url).await {
            Ok(body) => body,
            Err(error) => {
                tracing::warn!(path = %output.display(), error = %error, "cutout fetch failed");
                return false;
            }
        };

        match write_atomically(output, &body).await {
            Ok(()) => {
                tracing::debug!(path = %output.display(), bytes = body.len(), "cutout saved");
                true
            }
            Err(e) => {
                tracing::warn!(path = %output.display(), error = %e, "failed to save cutout");
                false
            }
        }
    }
}

/// Write `body` to a sibling `.part` file and rename it into place
async fn write_atomically(output: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let partial = partial_path(output);
    if let Err(e) = tokio::fs::write(&partial, body).await {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e);
    }
    if let Err(e) = tokio::fs::rename(&partial, output).await {
        tokio::fs::remove_file(&partial).await.ok();
        return Err(e);
    }
    Ok(())
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const FITS_BYTES: &[u8] = b"SIMPLE  =                    T / fake FITS header";

    #[tokio::test]
    async fn success_writes_body_and_creates_parent_directories() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/fits-cutout"))
            .and(query_param("layer", "ls-dr10"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(FITS_BYTES))
            .expect(1)
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("b3").join("1234.fits");
        let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).unwrap();

        let url = format!("{}/fits-cutout?ra=1&dec=2&layer=ls-dr10", mock_server.uri());
        assert!(fetcher.fetch(&url, &output).await);

        assert_eq!(std::fs::read(&output).unwrap(), FITS_BYTES);
        assert!(!partial_path(&output).exists());
    }

    #[tokio::test]
    async fn non_200_status_is_a_failure_without_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_bytes(b"busy".to_vec()))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("b1").join("42.fits");
        let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).unwrap();

        assert!(!fetcher.fetch(&mock_server.uri(), &output).await);
        assert!(!output.exists());
        assert!(!output.parent().unwrap().exists());
    }

    #[tokio::test]
    async fn other_success_codes_are_failures() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("7.fits");
        let fetcher = HttpImageFetcher::new(Duration::from_secs(5)).unwrap();

        assert!(!fetcher.fetch(&mock_server.uri(), &output).await);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn timeout_is_a_failure_without_file() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(FITS_BYTES)
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let output = dir.path().join("b0").join("slow.fits");
        let fetcher = HttpImageFetcher::new(Duration::from_millis(50)).unwrap();

        assert!(!fetcher.fetch(&mock_server.uri(), &output).await);
        assert!(!output.exists());
    }

    #[tokio::test]
    async fn unreachable_host_is_a_failure() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("x.fits");
        let fetcher = HttpImageFetcher::new(Duration::from_secs(2)).unwrap();

        // Port 9 (discard) on localhost is not expected to serve HTTP
        assert!(!fetcher.fetch("http://127.0.0.1:9/cutout", &output).await);
        assert!(!output.exists());
    }

    #[test]
    fn partial_path_appends_suffix() {
        assert_eq!(
            partial_path(Path::new("/data/b1/9.fits")),
            PathBuf::from("/data/b1/9.fits.part")
        );
    }
}
