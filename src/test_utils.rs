//! Shared fixtures for unit tests.

use std::collections::HashMap;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::network::CollectorApi;
use crate::network::ConnectivityMonitor;
use crate::network::DecideRequest;
use crate::network::DecideResponse;
use crate::queue::MemoryQueue;
use crate::queue::SharedQueue;
use crate::NetworkError;
use crate::Result;

/// Collector double that records every exchange and answers from a script.
pub(crate) struct RecordingCollector {
    /// Status codes to return, in order; the last repeats forever.
    statuses: Mutex<Vec<u16>>,
    /// When true, batch posts fail at the transport level instead.
    pub(crate) transport_failure: Mutex<bool>,
    pub(crate) batch_bodies: Mutex<Vec<Vec<u8>>>,
    pub(crate) decide_calls: AtomicUsize,
    pub(crate) decide_flags: Mutex<Option<HashMap<String, Value>>>,
    /// Simulated decide latency, for in-flight reload tests.
    pub(crate) decide_delay: Mutex<Duration>,
}

impl RecordingCollector {
    pub(crate) fn with_statuses(statuses: Vec<u16>) -> Arc<Self> {
        Arc::new(RecordingCollector {
            statuses: Mutex::new(statuses),
            transport_failure: Mutex::new(false),
            batch_bodies: Mutex::new(Vec::new()),
            decide_calls: AtomicUsize::new(0),
            decide_flags: Mutex::new(None),
            decide_delay: Mutex::new(Duration::ZERO),
        })
    }

    pub(crate) fn ok() -> Arc<Self> {
        Self::with_statuses(vec![200])
    }

    pub(crate) fn batch_calls(&self) -> usize {
        self.batch_bodies.lock().len()
    }

    /// Record counts of each uploaded batch, parsed from the bodies.
    pub(crate) fn batch_sizes(&self) -> Vec<usize> {
        self.batch_bodies
            .lock()
            .iter()
            .map(|body| {
                let parsed: Value = serde_json::from_slice(body).expect("batch body is JSON");
                parsed["batch"].as_array().expect("batch array").len()
            })
            .collect()
    }
}

#[async_trait]
impl CollectorApi for RecordingCollector {
    async fn post_batch(
        &self,
        body: Vec<u8>,
    ) -> Result<u16> {
        if *self.transport_failure.lock() {
            return Err(NetworkError::Offline.into());
        }
        let status = {
            let mut statuses = self.statuses.lock();
            if statuses.len() > 1 {
                statuses.remove(0)
            } else {
                statuses[0]
            }
        };
        self.batch_bodies.lock().push(body);
        Ok(status)
    }

    async fn post_decide(
        &self,
        _request: DecideRequest,
    ) -> Result<DecideResponse> {
        let delay = *self.decide_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.decide_calls.fetch_add(1, Ordering::SeqCst);
        Ok(DecideResponse {
            feature_flags: self.decide_flags.lock().clone(),
        })
    }
}

pub(crate) struct FixedConnectivity(pub(crate) bool);

impl ConnectivityMonitor for FixedConnectivity {
    fn is_connected(&self) -> bool {
        self.0
    }
}

pub(crate) fn memory_queue(max_record_bytes: usize) -> SharedQueue {
    Arc::new(Mutex::new(Box::new(MemoryQueue::new(max_record_bytes))))
}

/// Event names currently queued, oldest first.
pub(crate) fn queued_events(queue: &SharedQueue) -> Vec<String> {
    let mut events = Vec::new();
    queue
        .lock()
        .for_each(&mut |record| {
            let parsed: Value = serde_json::from_slice(record).expect("record is JSON");
            events.push(parsed["event"].as_str().expect("event name").to_string());
            Ok(true)
        })
        .expect("for_each");
    events
}
