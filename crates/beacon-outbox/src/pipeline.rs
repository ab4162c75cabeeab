//! Queue, flush gate and delivery, coordinated behind one lock.
//!
//! All triggers end up in [`Pipeline::attempt_flush`]. A flush drains up to
//! `batch_size` events while holding the lock, marks itself in flight and
//! hands the batch to the transport on a spawned task. The task puts failed
//! batches back at the front of the queue. A panicking send counts as a failed
//! one, and a delivery task that is dropped before it finishes releases the
//! gate and restores its batch.

use crate::scheduler::{FlushGate, FlushOutcome, FlushReason, FlushTrigger};
use crate::{Event, EventBatch, EventQueue, OutboxError, OutboxResult, QueuedEvent, Transport};
use beacon_config_and_utils::Config;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Tunables read once from [`Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_queue_size: usize,
    pub max_delivery_attempts: u32,
    pub max_backoff_ticks: u32,
    pub start_online: bool,
    pub debug: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.batch_size.max(1),
            flush_interval: Duration::from_millis(config.flush_interval_ms.max(1)),
            max_queue_size: config.max_queue_size.max(config.batch_size.max(1)),
            max_delivery_attempts: config.max_delivery_attempts.max(1),
            max_backoff_ticks: config.max_backoff_ticks,
            start_online: !config.offline_mode,
            debug: config.debug,
        }
    }
}

/// Running counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events accepted by `track_event`.
    pub tracked: u64,
    /// Events acknowledged by the endpoint.
    pub delivered: u64,
    /// Batches sent successfully.
    pub batches_sent: u64,
    /// Failed send attempts.
    pub failed_attempts: u64,
    /// Events evicted because the queue stayed over its bound.
    pub dropped_overflow: u64,
    /// Events dropped after exhausting their delivery attempts.
    pub dropped_exhausted: u64,
}

/// Snapshot of the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineStatus {
    /// Number of pending events.
    pub pending: usize,
    /// Whether a batch is being sent.
    pub in_flight: bool,
    pub online: bool,
    pub consecutive_failures: u32,
    pub stats: PipelineStats,
}

struct PipelineState {
    queue: EventQueue,
    gate: FlushGate,
    online: bool,
    stats: PipelineStats,
}

/// A started delivery.
struct Dispatched {
    batch_id: String,
    events: usize,
    handle: JoinHandle<FlushOutcome>,
}

/// Shared core of a tracker.
pub struct Pipeline {
    state: Mutex<PipelineState>,
    settings: PipelineSettings,
    transport: Arc<dyn Transport>,
    runtime: Option<Handle>,
    idle: Notify,
}

impl Pipeline {
    /// Build a pipeline, capturing the current tokio runtime if there is one.
    pub fn new(settings: PipelineSettings, transport: Arc<dyn Transport>) -> Arc<Self> {
        let runtime = Handle::try_current().ok();
        if runtime.is_none() {
            warn!("No tokio runtime at construction; delivery waits for one");
        }

        Arc::new(Self {
            state: Mutex::new(PipelineState {
                queue: EventQueue::new(),
                gate: FlushGate::default(),
                online: settings.start_online,
                stats: PipelineStats::default(),
            }),
            settings,
            transport,
            runtime,
            idle: Notify::new(),
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub(crate) fn runtime(&self) -> Option<Handle> {
        self.runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
    }

    /// Append an event and run the size and bound checks.
    pub fn enqueue(self: &Arc<Self>, event: Event) {
        let len = {
            let mut state = self.state.lock();
            state.queue.push_back(event);
            state.stats.tracked += 1;
            state.queue.len()
        };

        if len >= self.settings.max_queue_size {
            self.attempt_flush(FlushReason::QueueFull);
            self.evict_overflow();
        } else if len >= self.settings.batch_size {
            self.attempt_flush(FlushReason::Size);
        }
    }

    /// Drop the oldest events while the queue is over its bound.
    fn evict_overflow(&self) {
        let mut state = self.state.lock();
        let mut evicted = 0u64;
        while state.queue.len() > self.settings.max_queue_size {
            if state.queue.pop_front().is_none() {
                break;
            }
            evicted += 1;
        }
        if evicted > 0 {
            state.stats.dropped_overflow += evicted;
            warn!(
                evicted,
                max_queue_size = self.settings.max_queue_size,
                "Queue over capacity, dropped oldest events"
            );
        }
    }

    /// Try to start a flush. Never waits for the send.
    pub fn attempt_flush(self: &Arc<Self>, reason: FlushReason) -> FlushTrigger {
        match self.dispatch(reason) {
            Ok(dispatched) => FlushTrigger::Started {
                batch_id: dispatched.batch_id,
                events: dispatched.events,
            },
            Err(trigger) => trigger,
        }
    }

    /// Start a flush and wait for the transport's answer.
    pub async fn flush_and_wait(self: &Arc<Self>, reason: FlushReason) -> FlushOutcome {
        let dispatched = match self.dispatch(reason) {
            Ok(dispatched) => dispatched,
            Err(trigger) => return FlushOutcome::NotStarted(trigger),
        };

        match dispatched.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                // The batch guard restored the events
                warn!(batch_id = %dispatched.batch_id, error = %e, "Delivery task did not finish");
                FlushOutcome::Failed {
                    requeued: dispatched.events,
                    dropped: 0,
                }
            }
        }
    }

    fn dispatch(self: &Arc<Self>, reason: FlushReason) -> Result<Dispatched, FlushTrigger> {
        let Some(runtime) = self.runtime() else {
            warn!(reason = reason.as_str(), "No async runtime, events stay queued");
            return Err(FlushTrigger::NoRuntime);
        };

        let batch = {
            let mut state = self.state.lock();
            if !state.online {
                return Err(FlushTrigger::Offline);
            }
            state.gate.admit(reason)?;
            if state.queue.is_empty() {
                return Err(FlushTrigger::Empty);
            }
            let entries = state.queue.drain_front(self.settings.batch_size);
            state.gate.begin();
            EventBatch::new(entries)
        };

        let batch_id = batch.batch_id.clone();
        let events = batch.len();

        debug!(
            batch_id = %batch_id,
            events,
            reason = reason.as_str(),
            "Flush started"
        );

        let pipeline = Arc::clone(self);
        let handle = runtime.spawn(async move { pipeline.deliver(batch).await });

        Ok(Dispatched {
            batch_id,
            events,
            handle,
        })
    }

    async fn deliver(self: Arc<Self>, batch: EventBatch) -> FlushOutcome {
        let mut guard = InFlightBatch {
            pipeline: Arc::clone(&self),
            batch: Some(batch.clone()),
        };

        // Run the send on its own task so a panic surfaces as a JoinError
        let transport = Arc::clone(&self.transport);
        let batch_id = batch.batch_id.clone();
        let result = match tokio::spawn(async move { transport.send(&batch).await }).await {
            Ok(result) => result,
            Err(e) => {
                error!(batch_id = %batch_id, error = %e, "Transport send panicked");
                Err(OutboxError::Send(format!("send task failed: {e}")))
            }
        };

        let Some(batch) = guard.batch.take() else {
            return FlushOutcome::Failed {
                requeued: 0,
                dropped: 0,
            };
        };
        let outcome = self.complete(batch, result);
        self.idle.notify_waiters();

        // Keep draining a backlog without waiting for the timer
        if matches!(outcome, FlushOutcome::Delivered { .. })
            && self.pending() >= self.settings.batch_size
        {
            self.attempt_flush(FlushReason::Size);
        }

        outcome
    }

    /// Put an unfinished batch back untouched and release the gate.
    fn restore(&self, batch: EventBatch) {
        let requeued = batch.len();
        {
            let mut state = self.state.lock();
            state.gate.abort();
            state.queue.prepend(batch.entries);
        }
        warn!(batch_id = %batch.batch_id, requeued, "Delivery abandoned, batch restored");
        self.idle.notify_waiters();
    }

    fn complete(&self, batch: EventBatch, result: OutboxResult<()>) -> FlushOutcome {
        let mut state = self.state.lock();

        match result {
            Ok(()) => {
                let events = batch.len();
                state.gate.record_success();
                state.stats.delivered += events as u64;
                state.stats.batches_sent += 1;
                info!(batch_id = %batch.batch_id, events, "Batch delivered");
                FlushOutcome::Delivered { events }
            }
            Err(e) => {
                state.gate.record_failure(self.settings.max_backoff_ticks);
                state.stats.failed_attempts += 1;

                let (retry, exhausted): (Vec<QueuedEvent>, Vec<QueuedEvent>) = batch
                    .entries
                    .into_iter()
                    .map(|mut entry| {
                        entry.attempts += 1;
                        entry
                    })
                    .partition(|entry| entry.attempts < self.settings.max_delivery_attempts);

                for entry in &exhausted {
                    error!(
                        event_id = %entry.event.id(),
                        event_type = %entry.event.event_type(),
                        attempts = entry.attempts,
                        "Dropping event after repeated delivery failures"
                    );
                }
                state.stats.dropped_exhausted += exhausted.len() as u64;

                let requeued = retry.len();
                state.queue.prepend(retry);

                warn!(
                    batch_id = %batch.batch_id,
                    requeued,
                    dropped = exhausted.len(),
                    consecutive_failures = state.gate.consecutive_failures(),
                    skip_ticks = state.gate.ticks_to_skip(),
                    error = %e,
                    "Batch delivery failed, will retry"
                );

                FlushOutcome::Failed {
                    requeued,
                    dropped: exhausted.len(),
                }
            }
        }
    }

    /// Switch connectivity. Coming back online forgets backoff and flushes.
    pub fn set_online(self: &Arc<Self>, online: bool) -> Option<FlushTrigger> {
        let was_online = {
            let mut state = self.state.lock();
            let was_online = state.online;
            state.online = online;
            if online && !was_online {
                state.gate.reset_backoff();
            }
            was_online
        };

        match (was_online, online) {
            (false, true) => {
                info!("Connectivity restored, flushing");
                Some(self.attempt_flush(FlushReason::Reconnect))
            }
            (true, false) => {
                info!("Offline, holding events");
                None
            }
            _ => None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.state.lock().online
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    pub fn pending_event_ids(&self) -> Vec<String> {
        self.state.lock().queue.event_ids()
    }

    pub fn is_flushing(&self) -> bool {
        self.state.lock().gate.in_flight()
    }

    pub fn status(&self) -> PipelineStatus {
        let state = self.state.lock();
        PipelineStatus {
            pending: state.queue.len(),
            in_flight: state.gate.in_flight(),
            online: state.online,
            consecutive_failures: state.gate.consecutive_failures(),
            stats: state.stats,
        }
    }

    /// Wait until no flush is in flight.
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.is_flushing() {
                return;
            }
            notified.await;
        }
    }

    /// Like [`Self::wait_until_idle`], giving up at `deadline`.
    pub async fn wait_idle_until(&self, deadline: Instant) -> bool {
        tokio::time::timeout_at(deadline, self.wait_until_idle())
            .await
            .is_ok()
    }
}

/// Holds the batch of a running delivery. If the delivery task is dropped
/// before the outcome is recorded, the batch goes back to the queue.
struct InFlightBatch {
    pipeline: Arc<Pipeline>,
    batch: Option<EventBatch>,
}

impl Drop for InFlightBatch {
    fn drop(&mut self) {
        if let Some(batch) = self.batch.take() {
            self.pipeline.restore(batch);
        }
    }
}
