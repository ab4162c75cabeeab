//! Flush scheduling: trigger reasons, the flush gate and the periodic timer.
//!
//! Every trigger (size, timer, explicit, lifecycle) converges on one
//! `attempt_flush` in the pipeline. The [`FlushGate`] decides whether an
//! attempt may start: at most one flush is in flight, and consecutive
//! failures make timer ticks back off exponentially.

use std::future::Future;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

/// Why a flush was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// Queue reached the batch size.
    Size,
    /// Periodic timer fired.
    Timer,
    /// Host asked for a flush.
    Explicit,
    /// Queue reached its bound.
    QueueFull,
    /// Connectivity came back.
    Reconnect,
    /// Host became hidden / backgrounded.
    Visibility,
    /// Host is shutting down.
    Shutdown,
}

impl FlushReason {
    /// Whether this trigger waits out failure backoff.
    pub fn respects_backoff(self) -> bool {
        matches!(self, FlushReason::Size | FlushReason::Timer)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FlushReason::Size => "size",
            FlushReason::Timer => "timer",
            FlushReason::Explicit => "explicit",
            FlushReason::QueueFull => "queue_full",
            FlushReason::Reconnect => "reconnect",
            FlushReason::Visibility => "visibility",
            FlushReason::Shutdown => "shutdown",
        }
    }
}

/// Immediate result of asking for a flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushTrigger {
    /// A batch was drained and handed to the transport.
    Started { batch_id: String, events: usize },
    /// Nothing pending.
    Empty,
    /// Another flush is in flight; this request was dropped.
    AlreadyInFlight,
    /// Disconnected; events stay queued.
    Offline,
    /// Waiting out failure backoff.
    BackingOff,
    /// No async runtime to deliver on; events stay queued.
    NoRuntime,
}

impl FlushTrigger {
    pub fn started(&self) -> bool {
        matches!(self, FlushTrigger::Started { .. })
    }
}

/// Final result of a flush, once the transport has answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch was accepted by the endpoint.
    Delivered { events: usize },
    /// The batch failed; `requeued` went back to the front, `dropped`
    /// exhausted their attempts.
    Failed { requeued: usize, dropped: usize },
    /// The flush never started.
    NotStarted(FlushTrigger),
}

/// Timer ticks to skip after `failures` consecutive failed flushes.
///
/// The first failure retries on the very next tick; each further failure
/// doubles the wait, capped at `max_ticks`.
pub fn backoff_ticks(failures: u32, max_ticks: u32) -> u32 {
    if failures <= 1 {
        return 0;
    }
    let exponent = (failures - 1).min(31);
    let ticks = (1u64 << exponent) - 1;
    ticks.min(u64::from(max_ticks)) as u32
}

/// Mutual exclusion and backoff state for flushes.
#[derive(Debug, Default, Clone)]
pub struct FlushGate {
    in_flight: bool,
    consecutive_failures: u32,
    ticks_to_skip: u32,
}

impl FlushGate {
    pub fn in_flight(&self) -> bool {
        self.in_flight
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn ticks_to_skip(&self) -> u32 {
        self.ticks_to_skip
    }

    /// Decide whether a flush for `reason` may start.
    ///
    /// Timer ticks consume one skipped tick while backing off.
    pub fn admit(&mut self, reason: FlushReason) -> Result<(), FlushTrigger> {
        if self.in_flight {
            return Err(FlushTrigger::AlreadyInFlight);
        }
        if reason.respects_backoff() && self.ticks_to_skip > 0 {
            if reason == FlushReason::Timer {
                self.ticks_to_skip -= 1;
            }
            return Err(FlushTrigger::BackingOff);
        }
        Ok(())
    }

    pub fn begin(&mut self) {
        self.in_flight = true;
    }

    /// Release the gate without recording an outcome.
    pub fn abort(&mut self) {
        self.in_flight = false;
    }

    pub fn record_success(&mut self) {
        self.in_flight = false;
        self.consecutive_failures = 0;
        self.ticks_to_skip = 0;
    }

    pub fn record_failure(&mut self, max_backoff_ticks: u32) {
        self.in_flight = false;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.ticks_to_skip = backoff_ticks(self.consecutive_failures, max_backoff_ticks);
    }

    /// Forget failure history (e.g. after reconnecting).
    pub fn reset_backoff(&mut self) {
        self.consecutive_failures = 0;
        self.ticks_to_skip = 0;
    }
}

/// A cancellable recurring task.
///
/// The first tick fires one full period after start. Dropping the task
/// stops it.
pub struct PeriodicTask {
    handle: Option<JoinHandle<()>>,
    period: Duration,
}

impl PeriodicTask {
    /// Spawn `tick` every `period` on `runtime`.
    pub fn start<F, Fut>(runtime: &Handle, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = bool> + Send + 'static,
    {
        let first_tick = Instant::now() + period;
        let handle = runtime.spawn(async move {
            let mut ticker = interval_at(first_tick, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if !tick().await {
                    debug!("Periodic task finished");
                    break;
                }
            }
        });

        Self {
            handle: Some(handle),
            period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Cancel the task. Idempotent.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.stop();
    }
}
