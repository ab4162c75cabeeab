//! Read paths against the Beacon analytics API.
//!
//! Everything here is independent of event capture: it queries aggregated
//! history and never touches the delivery queue.

mod client;
mod error;
mod export;
mod query;

pub use client::{EventCount, InsightsClient, InsightsConfig, MetricPoint, RealtimeMetrics};
pub use error::{InsightsError, InsightsResult};
pub use export::{export_file_name, ExportArtifact};
pub use query::{ExportFormat, Interval, TimeRange};
