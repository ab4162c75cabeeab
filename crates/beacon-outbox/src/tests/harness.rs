//! Test harness for pipeline scenarios.
//!
//! Provides:
//! - MockTransport: records every batch, answers from a script, can hold sends
//! - CountingStorage: in-memory storage that counts reads and writes
//! - TestHarness: a Tracker wired to a MockTransport

use crate::{Event, EventBatch, OutboxError, OutboxResult, Properties, Tracker, Transport};
use async_trait::async_trait;
use beacon_config_and_utils::Config;
use beacon_storage::{IdentityStore, KeyValueStorage, MemoryStorage, StorageResult};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

/// How the mock answers one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendResponse {
    Accept,
    /// Non-2xx answer.
    Reject(u16),
    /// The send panics.
    Panic,
}

/// Transport double.
pub struct MockTransport {
    calls: Mutex<Vec<Vec<Event>>>,
    script: Mutex<VecDeque<SendResponse>>,
    default_response: Mutex<SendResponse>,
    gate: watch::Sender<bool>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default_response: Mutex::new(SendResponse::Accept),
            gate,
        }
    }

    /// Answer the next send with `response`. Unscripted sends use the default.
    pub fn queue_response(&self, response: SendResponse) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn set_default_response(&self, response: SendResponse) {
        *self.default_response.lock().unwrap() = response;
    }

    /// Make sends wait until [`Self::release`].
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Events of every send, in call order.
    pub fn calls(&self) -> Vec<Vec<Event>> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_ids(&self, index: usize) -> Vec<String> {
        self.calls.lock().unwrap()[index]
            .iter()
            .map(|e| e.id().to_string())
            .collect()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .map(|e| e.id().to_string())
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, batch: &EventBatch) -> OutboxResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(batch.events().cloned().collect());

        let mut open = self.gate.subscribe();
        let _ = open.wait_for(|open| *open).await;

        let response = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(*self.default_response.lock().unwrap());

        match response {
            SendResponse::Accept => Ok(()),
            SendResponse::Reject(status) => Err(OutboxError::Ingestion {
                status,
                message: "rejected by mock".to_string(),
            }),
            SendResponse::Panic => panic!("mock transport panicked"),
        }
    }
}

/// Memory storage that counts reads and writes.
#[derive(Default)]
pub struct CountingStorage {
    inner: MemoryStorage,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingStorage {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl KeyValueStorage for CountingStorage {
    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(key)
    }

    fn delete(&self, key: &str) -> StorageResult<bool> {
        self.inner.delete(key)
    }
}

/// Config with the given batch size and timer period.
pub fn test_config(batch_size: usize, flush_interval_ms: u64) -> Config {
    Config {
        api_base_url: "http://127.0.0.1:9/api".to_string(),
        batch_size,
        flush_interval_ms,
        ..Default::default()
    }
}

/// A tracker wired to a mock transport.
pub struct TestHarness {
    pub tracker: Tracker,
    pub transport: Arc<MockTransport>,
    pub storage: Arc<CountingStorage>,
}

impl TestHarness {
    /// Must be called inside a tokio runtime.
    pub fn new(config: Config) -> Self {
        let transport = Arc::new(MockTransport::new());
        let storage = Arc::new(CountingStorage::default());
        let identity = Arc::new(IdentityStore::new(storage.clone()));
        let tracker = Tracker::new(&config, identity, transport.clone());

        Self {
            tracker,
            transport,
            storage,
        }
    }

    /// Track `n` numbered events, returning their ids in order.
    pub fn track(&self, n: usize) -> Vec<String> {
        (0..n)
            .map(|i| {
                let mut props = Properties::new();
                props.insert("seq".to_string(), json!(i));
                self.tracker.track_event("test_event", props)
            })
            .collect()
    }
}

/// Let spawned tasks run without moving the clock meaningfully.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Let `ms` of (paused) time pass, running every timer that falls due.
pub async fn elapse(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}
