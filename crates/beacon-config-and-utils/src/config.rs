//! Configuration for the telemetry pipeline.
//!
//! A [`Config`] is read once when a pipeline is constructed and is treated as
//! immutable for the lifetime of that instance.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default ingestion base URL (can be overridden at compile time via BEACON_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("BEACON_API_URL") {
    Some(url) => url,
    None => "http://localhost:3001/api",
};

/// Default number of events per delivered batch.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Default flush timer period in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;

/// Default bound on pending events before a forced flush.
pub const DEFAULT_MAX_QUEUE_SIZE: usize = 1_000;

/// Default number of delivery attempts before an event is abandoned.
pub const DEFAULT_MAX_DELIVERY_ATTEMPTS: u32 = 10;

/// Default cap on timer ticks skipped while backing off.
pub const DEFAULT_MAX_BACKOFF_TICKS: u32 = 12;

/// Default HTTP request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Ingestion/aggregation base URL (e.g. `https://api.example.com/api`).
    pub api_base_url: String,
    /// Optional bearer token sent with every request.
    pub api_token: Option<String>,
    /// Events per batch; reaching it triggers an immediate flush.
    pub batch_size: usize,
    /// Flush timer period.
    pub flush_interval_ms: u64,
    /// Start disconnected: events are captured but not sent until online.
    pub offline_mode: bool,
    /// Verbose capture logging.
    pub debug: bool,
    /// Pending-event bound.
    pub max_queue_size: usize,
    /// Attempts per event before it is dropped.
    pub max_delivery_attempts: u32,
    /// Upper bound on ticks skipped by flush backoff.
    pub max_backoff_ticks: u32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Application name reported in event metadata.
    pub app_name: String,
    /// Referrer reported in event metadata.
    pub referrer: Option<String>,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            api_token: None,
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            offline_mode: false,
            debug: false,
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            max_delivery_attempts: DEFAULT_MAX_DELIVERY_ATTEMPTS,
            max_backoff_ticks: DEFAULT_MAX_BACKOFF_TICKS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            app_name: "beacon".to_string(),
            referrer: None,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl Config {
    /// Create a Config with default values, then override from environment.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.load_from_env();
        config
    }

    /// Load configuration from the standard location, falling back to defaults.
    ///
    /// Environment variables take precedence over the file.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        Self::load_with_env(&paths.config_file())
    }

    /// Load `path` if it exists, apply environment overrides and validate.
    pub fn load_with_env(path: &Path) -> CoreResult<Self> {
        let mut config = if path.exists() {
            Self::load_from_file(path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the standard location.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from `BEACON_*` environment variables.
    ///
    /// Unparsable numeric or boolean values are ignored.
    fn load_from_env(&mut self) {
        if let Some(url) = env_string("BEACON_API_URL") {
            self.api_base_url = url;
        }
        if let Some(token) = env_string("BEACON_API_TOKEN") {
            self.api_token = Some(token);
        }
        if let Some(size) = env_string("BEACON_BATCH_SIZE").and_then(|s| s.parse().ok()) {
            self.batch_size = size;
        }
        if let Some(ms) = env_string("BEACON_FLUSH_INTERVAL_MS").and_then(|s| s.parse().ok()) {
            self.flush_interval_ms = ms;
        }
        if let Some(offline) = env_string("BEACON_OFFLINE").and_then(|s| parse_bool(&s)) {
            self.offline_mode = offline;
        }
        if let Some(debug) = env_string("BEACON_DEBUG").and_then(|s| parse_bool(&s)) {
            self.debug = debug;
        }
        if let Some(level) = env_string("BEACON_LOG_LEVEL") {
            self.log_level = level;
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        if self.batch_size == 0 {
            return Err(CoreError::Config(
                "batch_size must be greater than zero".to_string(),
            ));
        }
        if self.flush_interval_ms == 0 {
            return Err(CoreError::Config(
                "flush_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.max_queue_size < self.batch_size {
            return Err(CoreError::Config(format!(
                "max_queue_size ({}) must be at least batch_size ({})",
                self.max_queue_size, self.batch_size
            )));
        }
        if self.max_delivery_attempts == 0 {
            return Err(CoreError::Config(
                "max_delivery_attempts must be greater than zero".to_string(),
            ));
        }
        self.api_url()?;
        Ok(())
    }

    /// Get the ingestion base URL as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    /// Base URL without a trailing slash, ready for path concatenation.
    pub fn api_base(&self) -> &str {
        self.api_base_url.trim_end_matches('/')
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|raw| {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
