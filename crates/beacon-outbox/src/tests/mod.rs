//! Pipeline scenario tests.
//!
//! - `harness.rs`          - MockTransport with scripted outcomes and a hold gate
//! - `ordering.rs`         - FIFO delivery, size and timer triggers
//! - `transport_failure.rs`- Re-queue on failure, backoff, attempt bound
//! - `backpressure.rs`     - Queue bound, offline buffering, reconnect
//! - `invariants.rs`       - Mutual exclusion, session stability, non-blocking capture
//! - `lifecycle.rs`        - Explicit flush, visibility, shutdown

pub(crate) mod harness;
mod ordering;
mod transport_failure;
