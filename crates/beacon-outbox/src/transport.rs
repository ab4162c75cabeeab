//! Batch delivery to the ingestion endpoint.

use crate::{Event, EventBatch, OutboxError, OutboxResult};
use async_trait::async_trait;
use beacon_config_and_utils::Config;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// Path of the batch ingestion endpoint, relative to the API base.
pub const BATCH_ENDPOINT: &str = "/analytics/events/batch";

/// Sends one batch as one request.
///
/// Implementations never split a batch. Any `Err` makes the pipeline
/// re-prepend the whole batch.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, batch: &EventBatch) -> OutboxResult<()>;
}

/// Sender configuration.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Base URL for the analytics API (no trailing slash).
    pub api_base_url: String,
    /// Optional bearer token.
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            api_base_url: beacon_config_and_utils::DEFAULT_API_URL.to_string(),
            api_token: None,
            timeout_secs: beacon_config_and_utils::DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl SenderConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base_url: config.api_base().to_string(),
            api_token: config.api_token.clone(),
            timeout_secs: config.request_timeout_secs,
        }
    }

    pub fn batch_url(&self) -> String {
        format!("{}{}", self.api_base_url.trim_end_matches('/'), BATCH_ENDPOINT)
    }
}

/// Request payload for sending a batch.
#[derive(Debug, Serialize)]
struct SendBatchRequest<'a> {
    events: Vec<&'a Event>,
}

/// HTTP transport: `POST <base>/analytics/events/batch`.
pub struct HttpTransport {
    config: SenderConfig,
    client: Client,
    url: String,
}

impl HttpTransport {
    /// Create a new HTTP transport.
    pub fn new(config: SenderConfig) -> OutboxResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let url = config.batch_url();

        Ok(Self {
            config,
            client,
            url,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &EventBatch) -> OutboxResult<()> {
        let request = SendBatchRequest {
            events: batch.events().collect(),
        };

        debug!(
            url = %self.url,
            batch_id = %batch.batch_id,
            events = batch.len(),
            "Sending batch"
        );

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(OutboxError::Ingestion {
                status: status.as_u16(),
                message,
            });
        }

        Ok(())
    }
}

/// Accepts every batch without sending it anywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

#[async_trait]
impl Transport for NoopTransport {
    async fn send(&self, batch: &EventBatch) -> OutboxResult<()> {
        debug!(
            batch_id = %batch.batch_id,
            events = batch.len(),
            "Delivery disabled, discarding batch"
        );
        Ok(())
    }
}
