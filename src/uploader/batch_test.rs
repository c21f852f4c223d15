use serde_json::json;
use serde_json::Value;

use super::BatchBuilder;
use crate::Error;
use crate::NetworkError;

#[test]
fn test_body_shape() {
    let mut builder = BatchBuilder::new("secret-key", 1000).unwrap();
    assert!(builder.offer(br#"{"event":"a"}"#).unwrap());
    assert!(builder.offer(br#"{"event":"b"} "#).unwrap());

    let (body, count) = builder.finish().unwrap();
    assert_eq!(count, 2);

    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["api_key"], json!("secret-key"));
    assert_eq!(parsed["batch"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["batch"][0]["event"], json!("a"));
    // Trailing whitespace from the record writer is trimmed.
    assert_eq!(parsed["batch"][1]["event"], json!("b"));
    assert!(parsed["sent_at"].as_str().unwrap().contains('T'));
}

#[test]
fn test_api_key_is_json_escaped() {
    let mut builder = BatchBuilder::new("with\"quote", 1000).unwrap();
    builder.offer(br#"{"event":"a"}"#).unwrap();
    let (body, _) = builder.finish().unwrap();

    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["api_key"], json!("with\"quote"));
}

#[test]
fn test_budget_stops_offers() {
    let record = br#"{"event":"aaaaaaaaaa"}"#; // 23 bytes
    let mut builder = BatchBuilder::new("k", 50).unwrap();

    assert!(builder.offer(record).unwrap());
    assert!(builder.offer(record).unwrap());
    // 69 bytes of raw records would exceed the 50-byte budget.
    assert!(!builder.offer(record).unwrap());
    assert_eq!(builder.record_count(), 2);

    let (body, count) = builder.finish().unwrap();
    assert_eq!(count, 2);
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["batch"].as_array().unwrap().len(), 2);
}

#[test]
fn test_rejected_offer_leaves_body_intact() {
    let mut builder = BatchBuilder::new("k", 20).unwrap();
    assert!(builder.offer(br#"{"event":"a"}"#).unwrap());
    assert!(!builder.offer(br#"{"event":"bbbbbbbb"}"#).unwrap());

    let (body, _) = builder.finish().unwrap();
    let parsed: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(parsed["batch"].as_array().unwrap().len(), 1);
}

#[test]
fn test_empty_batch_fails() {
    let builder = BatchBuilder::new("k", 1000).unwrap();
    assert!(matches!(
        builder.finish().unwrap_err(),
        Error::Network(NetworkError::EmptyBatch)
    ));
}
