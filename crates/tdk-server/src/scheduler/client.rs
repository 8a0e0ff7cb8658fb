//! HTTP client for the stage services

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{PipelineError, PipelineResult};

/// Timeout for a single health probe
pub const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Reply of a stage trigger call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerResponse {
    pub http_status: u16,
    /// `status` field of the body, if any
    pub status: Option<String>,
    pub message: String,
}

impl TriggerResponse {
    /// Only an HTTP 200 lets the pipeline move on to the next stage
    pub fn accepted(&self) -> bool {
        self.http_status == StatusCode::OK.as_u16()
    }
}

#[derive(Debug, Deserialize)]
struct StageReply {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: String,
}

/// Health URL for a trigger URL: the last path segment becomes `health`
///
/// `http://data-ingestion:5001/ingest` -> `http://data-ingestion:5001/health`
pub fn health_url(trigger_url: &str) -> PipelineResult<String> {
    Url::parse(trigger_url)
        .and_then(|url| url.join("health"))
        .map(String::from)
        .map_err(|e| PipelineError::Transport(format!("invalid URL {}: {}", trigger_url, e)))
}

/// Calls the ingestion and export services
#[derive(Debug, Clone)]
pub struct StageClient {
    client: Client,
    trigger_timeout: Duration,
}

impl StageClient {
    pub fn new(trigger_timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder().build().map_err(PipelineError::transport)?;

        Ok(Self {
            client,
            trigger_timeout,
        })
    }

    /// POST to a stage trigger and read its outcome document
    ///
    /// Any HTTP status is returned as a response; connection failures,
    /// timeouts and bodies that are not a JSON object are transport errors.
    pub async fn trigger(&self, url: &str) -> PipelineResult<TriggerResponse> {
        let response = self
            .client
            .post(url)
            .timeout(self.trigger_timeout)
            .send()
            .await
            .map_err(|e| PipelineError::Transport(format!("request to {} failed: {}", url, e)))?;

        let http_status = response.status().as_u16();
        let reply: StageReply = response.json().await.map_err(|e| {
            PipelineError::Transport(format!("invalid response from {} (HTTP {}): {}", url, http_status, e))
        })?;

        debug!(url, http_status, "Stage replied");

        Ok(TriggerResponse {
            http_status,
            status: reply.status,
            message: reply.message,
        })
    }

    /// Whether `url` answers a GET with HTTP 200 within [`HEALTH_TIMEOUT`]
    pub async fn is_healthy(&self, url: &str) -> bool {
        match self.client.get(url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(response) => response.status() == StatusCode::OK,
            Err(e) => {
                debug!(url, error = %e, "Health probe failed");
                false
            },
        }
    }
}
