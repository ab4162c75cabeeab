//! HTTP client for the aggregated read paths.

use crate::{ExportArtifact, ExportFormat, InsightsError, InsightsResult, Interval, TimeRange};
use beacon_config_and_utils::Config;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info};

/// Count of one event type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventCount {
    #[serde(rename = "type")]
    pub event_type: String,
    pub count: u64,
}

/// Live aggregate snapshot. Fields the client does not know are kept in
/// `other`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RealtimeMetrics {
    pub active_users: u64,
    pub active_sessions: u64,
    pub events_per_minute: f64,
    pub top_events: Vec<EventCount>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

/// One point of a time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: String,
    pub value: f64,
}

/// The API returns either a bare array or an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum MetricsBody {
    Points(Vec<MetricPoint>),
    Data { data: Vec<MetricPoint> },
    Named { points: Vec<MetricPoint> },
}

impl MetricsBody {
    fn into_points(self) -> Vec<MetricPoint> {
        match self {
            MetricsBody::Points(points)
            | MetricsBody::Data { data: points }
            | MetricsBody::Named { points } => points,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone)]
pub struct InsightsConfig {
    /// Base URL for the analytics API (no trailing slash).
    pub api_base_url: String,
    /// Optional bearer token.
    pub api_token: Option<String>,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

impl InsightsConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_base_url: config.api_base().to_string(),
            api_token: config.api_token.clone(),
            timeout_secs: config.request_timeout_secs,
        }
    }
}

/// Reads realtime metrics, time series and exports.
pub struct InsightsClient {
    config: InsightsConfig,
    client: Client,
}

impl InsightsClient {
    pub fn new(config: InsightsConfig) -> InsightsResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn from_config(config: &Config) -> InsightsResult<Self> {
        config.validate()?;
        Self::new(InsightsConfig::from_config(config))
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base_url.trim_end_matches('/'), path)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> InsightsResult<Response> {
        let url = self.url(path);
        debug!(url = %url, ?query, "GET");

        let mut builder = self.client.get(&url).query(query);
        if let Some(token) = &self.config.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(InsightsError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> InsightsResult<T> {
        let bytes = self.get(path, query).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// `GET /analytics/realtime`.
    pub async fn realtime(&self) -> InsightsResult<RealtimeMetrics> {
        self.get_json("/analytics/realtime", &[]).await
    }

    /// `GET /analytics/metrics?metric&timeRange&interval`.
    pub async fn metrics(
        &self,
        metric: &str,
        range: TimeRange,
        interval: Interval,
    ) -> InsightsResult<Vec<MetricPoint>> {
        let body: MetricsBody = self
            .get_json(
                "/analytics/metrics",
                &[
                    ("metric", metric),
                    ("timeRange", range.as_str()),
                    ("interval", interval.as_str()),
                ],
            )
            .await?;
        Ok(body.into_points())
    }

    /// `GET /analytics/export?timeRange&format`, held in memory.
    ///
    /// Independent from event delivery; call [`ExportArtifact::save_to`] to
    /// write the file.
    pub async fn export_range(
        &self,
        range: TimeRange,
        format: ExportFormat,
    ) -> InsightsResult<ExportArtifact> {
        let response = self
            .get(
                "/analytics/export",
                &[("timeRange", range.as_str()), ("format", format.as_str())],
            )
            .await?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?.to_vec();

        info!(
            range = %range,
            format = %format,
            bytes = bytes.len(),
            "Export downloaded"
        );

        Ok(ExportArtifact::new(range, format, content_type, bytes))
    }
}
