use std::sync::Arc;

use super::BatchUploader;
use super::UploadOutcome;
use crate::crypto::Crypto;
use crate::crypto::NoopCrypto;
use crate::queue::SharedQueue;
use crate::test_utils::FixedConnectivity;
use crate::test_utils::memory_queue;
use crate::test_utils::RecordingCollector;

fn uploader(
    queue: SharedQueue,
    collector: Arc<RecordingCollector>,
    connected: bool,
    max_batch_bytes: usize,
) -> BatchUploader {
    BatchUploader::new(
        queue,
        collector,
        Arc::new(NoopCrypto),
        Arc::new(FixedConnectivity(connected)),
        "key".into(),
        max_batch_bytes,
    )
}

fn fill(
    queue: &SharedQueue,
    count: usize,
) {
    for i in 0..count {
        let record = format!(r#"{{"event":"e{i}","n":{i}}}"#);
        queue.lock().append(record.as_bytes()).unwrap();
    }
}

#[tokio::test]
async fn test_empty_queue_stays_idle() {
    let queue = memory_queue(32_000);
    let collector = RecordingCollector::ok();
    let uploader = uploader(queue, collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Idle);
    assert_eq!(collector.batch_calls(), 0);
}

#[tokio::test]
async fn test_offline_stays_idle_without_http_call() {
    let queue = memory_queue(32_000);
    fill(&queue, 3);
    let collector = RecordingCollector::ok();
    let uploader = uploader(queue.clone(), collector.clone(), false, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Idle);
    assert_eq!(collector.batch_calls(), 0);
    assert_eq!(queue.lock().size(), 3);
}

#[tokio::test]
async fn test_committed_removes_exactly_the_uploaded_records() {
    let queue = memory_queue(32_000);
    fill(&queue, 5);
    let collector = RecordingCollector::ok();
    let uploader = uploader(queue.clone(), collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Committed(5));
    assert_eq!(queue.lock().size(), 0);
    assert_eq!(collector.batch_sizes(), vec![5]);
}

#[tokio::test]
async fn test_rate_limited_retains_queue() {
    let queue = memory_queue(32_000);
    fill(&queue, 5);
    let collector = RecordingCollector::with_statuses(vec![429]);
    let uploader = uploader(queue.clone(), collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Retained);
    assert_eq!(queue.lock().size(), 5);
}

#[tokio::test]
async fn test_server_error_retains_queue() {
    let queue = memory_queue(32_000);
    fill(&queue, 4);
    let collector = RecordingCollector::with_statuses(vec![500]);
    let uploader = uploader(queue.clone(), collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Retained);
    assert_eq!(queue.lock().size(), 4);
}

#[tokio::test]
async fn test_transport_failure_retains_queue() {
    let queue = memory_queue(32_000);
    fill(&queue, 2);
    let collector = RecordingCollector::ok();
    *collector.transport_failure.lock() = true;
    let uploader = uploader(queue.clone(), collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Retained);
    assert_eq!(queue.lock().size(), 2);
}

#[tokio::test]
async fn test_permanent_rejection_drops_batch() {
    let queue = memory_queue(32_000);
    fill(&queue, 3);
    let collector = RecordingCollector::with_statuses(vec![400]);
    let uploader = uploader(queue.clone(), collector.clone(), true, 475_000);

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Rejected(3));
    // Retrying a permanently refused batch would loop forever.
    assert_eq!(queue.lock().size(), 0);
}

#[tokio::test]
async fn test_budget_splits_batch_and_drain_continues() {
    let queue = memory_queue(32_000);
    // Each record is 22 bytes; a 50-byte budget fits exactly two.
    for i in 0..3 {
        let record = format!(r#"{{"event":"e{i}","pad":9}}"#);
        assert_eq!(record.len(), 22);
        queue.lock().append(record.as_bytes()).unwrap();
    }
    let collector = RecordingCollector::ok();
    let uploader = uploader(queue.clone(), collector.clone(), true, 50);

    uploader.drain().await;

    // First pass uploads 2, the immediate second pass the remaining 1.
    assert_eq!(collector.batch_sizes(), vec![2, 1]);
    assert_eq!(queue.lock().size(), 0);
}

#[tokio::test]
async fn test_drain_stops_after_rejection() {
    let queue = memory_queue(32_000);
    for i in 0..3 {
        let record = format!(r#"{{"event":"e{i}","pad":9}}"#);
        queue.lock().append(record.as_bytes()).unwrap();
    }
    let collector = RecordingCollector::with_statuses(vec![404]);
    let uploader = uploader(queue.clone(), collector.clone(), true, 50);

    uploader.drain().await;

    // The rejected batch is removed but no further pass starts.
    assert_eq!(collector.batch_calls(), 1);
    assert_eq!(queue.lock().size(), 1);
}

#[tokio::test]
async fn test_decrypt_applied_before_upload() {
    struct Rot13;
    impl crate::crypto::Crypto for Rot13 {
        fn encrypt(
            &self,
            bytes: Vec<u8>,
        ) -> crate::Result<Vec<u8>> {
            Ok(bytes.iter().map(|b| b.wrapping_add(13)).collect())
        }
        fn decrypt(
            &self,
            bytes: Vec<u8>,
        ) -> crate::Result<Vec<u8>> {
            Ok(bytes.iter().map(|b| b.wrapping_sub(13)).collect())
        }
    }

    let queue = memory_queue(32_000);
    let crypto = Rot13;
    let stored = crypto.encrypt(br#"{"event":"enc"}"#.to_vec()).unwrap();
    queue.lock().append(&stored).unwrap();

    let collector = RecordingCollector::ok();
    let uploader = BatchUploader::new(
        queue.clone(),
        collector.clone(),
        Arc::new(Rot13),
        Arc::new(FixedConnectivity(true)),
        "key".into(),
        475_000,
    );

    assert_eq!(uploader.flush_pass().await, UploadOutcome::Committed(1));
    let body = collector.batch_bodies.lock()[0].clone();
    let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["batch"][0]["event"], "enc");
}
