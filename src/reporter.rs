//! Orchestrator status notifications.

use crate::types::IterationReport;
use crate::{Error, Result};
use std::time::Duration;

/// Destination for per-iteration status reports
#[async_trait::async_trait]
pub trait StatusReporter: Send + Sync {
    /// Deliver one iteration's success and failure lists
    async fn report(&self, report: &IterationReport) -> Result<()>;

    /// Tell the orchestrator this pipeline has finished
    async fn pipeline_finished(&self) -> Result<()>;
}

/// Reports to `{orchestrator_url}/pipelines/status/{container_id}` over HTTP
#[derive(Clone, Debug)]
pub struct HttpStatusReporter {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpStatusReporter {
    /// Create a reporter posting to `url`, each request bounded by `timeout`
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout,
        }
    }

    /// Target URL
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<()> {
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| {
                Error::Other(format!(
                    "Status report timed out after {:?}",
                    self.timeout
                ))
            })??;

        if !response.status().is_success() {
            return Err(Error::Other(format!(
                "Status report returned status {}: {}",
                response.status(),
                response.text().await.unwrap_or_default()
            )));
        }

        Ok(())
    }
}

#[async_trait::async_trait]
impl StatusReporter for HttpStatusReporter {
    async fn report(&self, report: &IterationReport) -> Result<()> {
        let request = self
            .client
            .post(&self.url)
            .json(report)
            .timeout(self.timeout);
        self.send(request).await?;

        tracing::debug!(url = %self.url, iteration = report.iteration, "status report sent");
        Ok(())
    }

    async fn pipeline_finished(&self) -> Result<()> {
        let request = self.client.delete(&self.url).timeout(self.timeout);
        self.send(request).await?;

        tracing::debug!(url = %self.url, "pipeline finished notification sent");
        Ok(())
    }
}
