//! Core configuration, paths and logging for the Beacon telemetry pipeline.

mod config;
mod error;
pub mod ids;
mod logging;
mod paths;

pub use config::{
    Config, DEFAULT_API_URL, DEFAULT_BATCH_SIZE, DEFAULT_FLUSH_INTERVAL_MS, DEFAULT_LOG_LEVEL,
    DEFAULT_MAX_BACKOFF_TICKS, DEFAULT_MAX_DELIVERY_ATTEMPTS, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_REQUEST_TIMEOUT_SECS,
};
pub use error::{CoreError, CoreResult};
pub use ids::generate_id;
pub use logging::{init_logging, parse_level, LogConfig};
pub use paths::Paths;
