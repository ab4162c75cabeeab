//! Event capture, batching and at-least-once delivery.
//!
//! This crate provides:
//! - Tracker: non-blocking capture API and lifecycle hooks
//! - EventQueue: in-memory FIFO with retry-ahead re-prepend
//! - Pipeline: size/timer flush triggers with mutual exclusion and backoff
//! - Transport: batch delivery (HTTP or no-op)

mod error;
mod event;
mod pipeline;
mod queue;
mod scheduler;
mod tracker;
mod transport;

#[cfg(test)]
mod tests;

pub use error::{OutboxError, OutboxResult};
pub use event::{timestamp_now, Event, EventFactory, EventMetadata, Properties, EVENT_ID_PREFIX};
pub use pipeline::{Pipeline, PipelineSettings, PipelineStats, PipelineStatus};
pub use queue::{EventBatch, EventQueue, QueuedEvent};
pub use scheduler::{backoff_ticks, FlushGate, FlushOutcome, FlushReason, FlushTrigger, PeriodicTask};
pub use tracker::{ShutdownReport, Tracker, Visibility};
pub use transport::{HttpTransport, NoopTransport, SenderConfig, Transport, BATCH_ENDPOINT};
