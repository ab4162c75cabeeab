//! Public capture API and lifecycle hooks.

use crate::pipeline::{Pipeline, PipelineSettings, PipelineStatus};
use crate::scheduler::{FlushOutcome, FlushReason, FlushTrigger, PeriodicTask};
use crate::{
    EventFactory, EventMetadata, HttpTransport, OutboxResult, Properties, SenderConfig, Transport,
};
use beacon_config_and_utils::Config;
use beacon_storage::IdentityStore;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Host visibility, e.g. foreground/background.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Visible,
    Hidden,
}

/// What a graceful shutdown achieved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Events delivered while shutting down.
    pub delivered: u64,
    /// Events still queued afterwards.
    pub pending: usize,
    /// Whether the grace period ran out.
    pub timed_out: bool,
}

/// Captures events and ships them in batches.
///
/// `track_*` calls never block on I/O and never fail; delivery problems are
/// logged and retried in the background.
pub struct Tracker {
    pipeline: Arc<Pipeline>,
    factory: EventFactory,
    timer: Mutex<Option<PeriodicTask>>,
}

impl Tracker {
    /// Build a tracker delivering through `transport`.
    ///
    /// Starts the flush timer when called inside a tokio runtime.
    pub fn new(config: &Config, identity: Arc<IdentityStore>, transport: Arc<dyn Transport>) -> Self {
        let settings = PipelineSettings::from_config(config);
        let metadata = EventMetadata::capture(&config.app_name, config.referrer.clone());
        let pipeline = Pipeline::new(settings, transport);

        let timer = match pipeline.runtime() {
            Some(runtime) => Some(start_flush_timer(&runtime, &pipeline)),
            None => {
                warn!("No tokio runtime, flush timer not started");
                None
            }
        };

        info!(
            batch_size = pipeline.settings().batch_size,
            flush_interval_ms = pipeline.settings().flush_interval.as_millis() as u64,
            online = pipeline.is_online(),
            "Tracker started"
        );

        Self {
            pipeline,
            factory: EventFactory::new(identity, metadata),
            timer: Mutex::new(timer),
        }
    }

    /// Build a tracker that POSTs to the configured API.
    pub fn from_config(config: &Config, identity: Arc<IdentityStore>) -> OutboxResult<Self> {
        config.validate()?;
        let transport = HttpTransport::new(SenderConfig::from_config(config))?;
        Ok(Self::new(config, identity, Arc::new(transport)))
    }

    pub fn identity(&self) -> &Arc<IdentityStore> {
        self.factory.identity()
    }

    pub fn session_id(&self) -> String {
        self.identity().get_or_create_session_id()
    }

    /// Capture one event. Returns its id as a local handle; it says nothing
    /// about delivery.
    pub fn track_event(&self, event_type: &str, properties: Properties) -> String {
        let event = self.factory.create(event_type, properties);
        let id = event.id().to_string();

        if self.pipeline.settings().debug {
            info!(event_id = %id, event_type, properties = ?event.properties(), "Tracked event");
        } else {
            debug!(event_id = %id, event_type, "Tracked event");
        }

        self.pipeline.enqueue(event);
        id
    }

    /// Capture an event whose properties come from any serializable value.
    ///
    /// Returns `None`, leaving the queue untouched, when the value does not
    /// serialize to a JSON object.
    pub fn track<T: Serialize + ?Sized>(&self, event_type: &str, properties: &T) -> Option<String> {
        match serde_json::to_value(properties) {
            Ok(Value::Object(map)) => Some(self.track_event(event_type, map)),
            Ok(other) => {
                warn!(event_type, kind = json_kind(&other), "Event properties are not an object, dropping event");
                None
            }
            Err(e) => {
                warn!(event_type, error = %e, "Event properties failed to serialize, dropping event");
                None
            }
        }
    }

    pub fn track_page_view(&self, path: &str, title: Option<&str>, extra: Properties) -> String {
        let props = normalized(extra, [("path", json!(path)), ("title", opt(title))]);
        self.track_event("page_view", props)
    }

    pub fn track_user_action(&self, action: &str, target: Option<&str>, extra: Properties) -> String {
        let props = normalized(extra, [("action", json!(action)), ("target", opt(target))]);
        self.track_event("user_action", props)
    }

    pub fn track_error(&self, message: &str, context: Option<&str>, extra: Properties) -> String {
        let props = normalized(extra, [("message", json!(message)), ("context", opt(context))]);
        self.track_event("error", props)
    }

    pub fn track_conversion(&self, kind: &str, value: Option<f64>, extra: Properties) -> String {
        let value = value.map(|v| json!(v)).unwrap_or(Value::Null);
        let props = normalized(extra, [("conversionType", json!(kind)), ("value", value)]);
        self.track_event("conversion", props)
    }

    pub fn track_feature_usage(&self, feature: &str, action: &str, extra: Properties) -> String {
        let props = normalized(extra, [("feature", json!(feature)), ("action", json!(action))]);
        self.track_event("feature_usage", props)
    }

    pub fn track_translation_request(
        &self,
        source_lang: &str,
        target_lang: &str,
        characters: usize,
        extra: Properties,
    ) -> String {
        let props = normalized(
            extra,
            [
                ("sourceLanguage", json!(source_lang)),
                ("targetLanguage", json!(target_lang)),
                ("characterCount", json!(characters)),
            ],
        );
        self.track_event("translation_request", props)
    }

    pub fn track_ocr_request(&self, language: &str, pages: u32, extra: Properties) -> String {
        let props = normalized(extra, [("language", json!(language)), ("pageCount", json!(pages))]);
        self.track_event("ocr_request", props)
    }

    pub fn track_performance(&self, metric: &str, value_ms: f64, extra: Properties) -> String {
        let props = normalized(extra, [("metric", json!(metric)), ("valueMs", json!(value_ms))]);
        self.track_event("performance", props)
    }

    /// Flush now, ignoring timer state and backoff.
    pub fn flush(&self) -> FlushTrigger {
        self.pipeline.attempt_flush(FlushReason::Explicit)
    }

    /// Flush now and wait for the send to finish.
    pub async fn flush_and_wait(&self) -> FlushOutcome {
        self.pipeline.flush_and_wait(FlushReason::Explicit).await
    }

    /// Keep flushing in the background until the queue is empty or a send
    /// fails. The caller does not wait.
    pub fn flush_detached(&self) {
        let Some(runtime) = self.pipeline.runtime() else {
            warn!("No async runtime, detached flush skipped");
            return;
        };

        let pipeline = Arc::clone(&self.pipeline);
        runtime.spawn(async move {
            loop {
                match pipeline.flush_and_wait(FlushReason::Explicit).await {
                    FlushOutcome::Delivered { .. } => continue,
                    FlushOutcome::NotStarted(FlushTrigger::AlreadyInFlight) => {
                        pipeline.wait_until_idle().await;
                    }
                    _ => break,
                }
            }
        });
    }

    /// Report connectivity. Going back online flushes what piled up.
    pub fn set_online(&self, online: bool) -> Option<FlushTrigger> {
        self.pipeline.set_online(online)
    }

    /// Hiding the host flushes; showing it does nothing.
    pub fn on_visibility_change(&self, visibility: Visibility) -> Option<FlushTrigger> {
        match visibility {
            Visibility::Hidden => Some(self.pipeline.attempt_flush(FlushReason::Visibility)),
            Visibility::Visible => None,
        }
    }

    /// Stop the timer and deliver what is queued, within `grace`.
    ///
    /// Gives up early when a send fails. Sends still running at the deadline
    /// are left to finish on their own.
    pub async fn shutdown(&self, grace: Duration) -> ShutdownReport {
        self.stop_timer();

        let deadline = Instant::now() + grace;
        let delivered_before = self.pipeline.status().stats.delivered;
        let mut timed_out = false;

        loop {
            if !self.pipeline.wait_idle_until(deadline).await {
                timed_out = true;
                break;
            }

            let flush = self.pipeline.flush_and_wait(FlushReason::Shutdown);
            match tokio::time::timeout_at(deadline, flush).await {
                Err(_) => {
                    timed_out = true;
                    break;
                }
                Ok(FlushOutcome::Delivered { .. }) => {}
                Ok(FlushOutcome::NotStarted(FlushTrigger::AlreadyInFlight)) => {}
                Ok(_) => break,
            }
        }

        let status = self.pipeline.status();
        let report = ShutdownReport {
            delivered: status.stats.delivered - delivered_before,
            pending: status.pending,
            timed_out,
        };

        if report.pending > 0 {
            warn!(
                pending = report.pending,
                timed_out = report.timed_out,
                "Shutdown left events undelivered"
            );
        } else {
            info!(delivered = report.delivered, "Tracker shut down");
        }

        report
    }

    /// Cancel the periodic flush. Idempotent.
    pub fn stop_timer(&self) {
        if let Some(mut timer) = self.timer.lock().take() {
            timer.stop();
            debug!("Flush timer stopped");
        }
    }

    pub fn timer_running(&self) -> bool {
        self.timer.lock().as_ref().is_some_and(PeriodicTask::is_running)
    }

    pub fn queue_size(&self) -> usize {
        self.pipeline.pending()
    }

    pub fn pending_event_ids(&self) -> Vec<String> {
        self.pipeline.pending_event_ids()
    }

    pub fn is_online(&self) -> bool {
        self.pipeline.is_online()
    }

    pub fn status(&self) -> PipelineStatus {
        self.pipeline.status()
    }
}

fn start_flush_timer(runtime: &tokio::runtime::Handle, pipeline: &Arc<Pipeline>) -> PeriodicTask {
    let weak: Weak<Pipeline> = Arc::downgrade(pipeline);
    PeriodicTask::start(runtime, pipeline.settings().flush_interval, move || {
        let weak = weak.clone();
        async move {
            match weak.upgrade() {
                Some(pipeline) => {
                    pipeline.attempt_flush(FlushReason::Timer);
                    true
                }
                None => false,
            }
        }
    })
}

/// Merge normalized fields over caller extras. `Null` fields are omitted.
fn normalized<const N: usize>(mut extra: Properties, fields: [(&str, Value); N]) -> Properties {
    for (key, value) in fields {
        if value.is_null() {
            continue;
        }
        extra.insert(key.to_string(), value);
    }
    extra
}

fn opt(value: Option<&str>) -> Value {
    value.map(|v| json!(v)).unwrap_or(Value::Null)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
