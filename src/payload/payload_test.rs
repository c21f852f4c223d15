use serde_json::json;
use serde_json::Value;

use super::merge_properties;
use super::Payload;
use super::PayloadType;
use super::Properties;

fn props(pairs: &[(&str, Value)]) -> Properties {
    let mut p = Properties::new();
    for (k, v) in pairs {
        p.insert(k.to_string(), v.clone());
    }
    p
}

#[test]
fn test_capture_payload_fields() {
    let payload = Payload::capture("signup", "user-1", props(&[("plan", json!("pro"))])).unwrap();

    assert_eq!(payload.kind(), PayloadType::Capture);
    assert_eq!(payload.event(), "signup");
    assert_eq!(payload.distinct_id(), "user-1");
    assert_eq!(payload.properties()["plan"], json!("pro"));
    assert!(!payload.message_id().is_empty());
    assert!(payload.timestamp().contains('T'));
}

#[test]
fn test_capture_rejects_empty_event() {
    assert!(Payload::capture("", "user-1", Properties::new()).is_err());
    assert!(Payload::capture("  ", "user-1", Properties::new()).is_err());
}

#[test]
fn test_payload_requires_identity() {
    assert!(Payload::capture("signup", "", Properties::new()).is_err());
}

#[test]
fn test_identify_carries_set_and_anon_id() {
    let traits = props(&[("email", json!("a@b.c"))]);
    let payload = Payload::identify("user-1", "anon-9", traits, Properties::new()).unwrap();

    assert_eq!(payload.kind(), PayloadType::Identify);
    assert_eq!(payload.event(), "$identify");
    assert_eq!(payload.properties()["$set"]["email"], json!("a@b.c"));
    assert_eq!(payload.properties()["$anon_distinct_id"], json!("anon-9"));
}

#[test]
fn test_screen_and_alias_and_group_conventions() {
    let screen = Payload::screen("Home", "user-1", Properties::new()).unwrap();
    assert_eq!(screen.event(), "$screen");
    assert_eq!(screen.properties()["$screen_name"], json!("Home"));

    let alias = Payload::alias("new-id", "user-1", Properties::new()).unwrap();
    assert_eq!(alias.event(), "$create_alias");
    assert_eq!(alias.properties()["alias"], json!("new-id"));

    let group = Payload::group("company", "acme", "user-1", props(&[("tier", json!(2))]), Properties::new()).unwrap();
    assert_eq!(group.event(), "$group_identify");
    assert_eq!(group.properties()["$group_type"], json!("company"));
    assert_eq!(group.properties()["$group_key"], json!("acme"));
    assert_eq!(group.properties()["$group_set"]["tier"], json!(2));
}

#[test]
fn test_merge_properties_caller_wins() {
    let context = props(&[("os", json!("linux")), ("lib", json!("beacon"))]);
    let caller = props(&[("lib", json!("custom")), ("plan", json!("pro"))]);

    let merged = merge_properties(&context, caller);

    assert_eq!(merged["os"], json!("linux"));
    assert_eq!(merged["lib"], json!("custom"));
    assert_eq!(merged["plan"], json!("pro"));
}

#[test]
fn test_builder_overrides_message_id() {
    let payload = Payload::capture("signup", "user-1", Properties::new()).unwrap();
    let copy = payload.to_builder().message_id("fixed-id").build().unwrap();

    assert_eq!(copy.message_id(), "fixed-id");
    assert_eq!(copy.event(), payload.event());
}

#[test]
fn test_builder_rejects_empty_message_id() {
    let payload = Payload::capture("signup", "user-1", Properties::new()).unwrap();
    assert!(payload.to_builder().message_id(" ").build().is_err());
}

#[test]
fn test_wire_shape_round_trip() {
    let payload = Payload::capture("signup", "user-1", props(&[("n", json!(1))])).unwrap();
    let value: Value = serde_json::to_value(&payload).unwrap();

    assert_eq!(value["type"], json!("capture"));
    assert_eq!(value["event"], json!("signup"));
    assert_eq!(value["distinct_id"], json!("user-1"));
    assert!(value.get("message_id").is_some());
    assert!(value.get("timestamp").is_some());

    let back: Payload = serde_json::from_value(value).unwrap();
    assert_eq!(back.message_id(), payload.message_id());
}
