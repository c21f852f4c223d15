//! Core model of the capture pipeline: the event payload.
//!
//! A [`Payload`] is fully built before it ever becomes visible to the
//! middleware chain; there is one concrete value type for all event kinds,
//! with per-kind constructors instead of a builder hierarchy.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::utils::time::now_iso8601;
use crate::BuildError;
use crate::Result;

/// Ordered string -> JSON value map carried by every payload.
pub type Properties = serde_json::Map<String, Value>;

/// Reserved event names of the generated (non-capture) payload kinds.
pub(crate) const EVENT_IDENTIFY: &str = "$identify";
pub(crate) const EVENT_SCREEN: &str = "$screen";
pub(crate) const EVENT_ALIAS: &str = "$create_alias";
pub(crate) const EVENT_GROUP_IDENTIFY: &str = "$group_identify";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadType {
    Identify,
    Capture,
    Alias,
    Screen,
    Group,
}

/// One captured event record. Serialized to JSON once, at enqueue time; the
/// uploader concatenates the stored bytes without re-parsing them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payload {
    #[serde(rename = "type")]
    kind: PayloadType,
    event: String,
    message_id: String,
    timestamp: String,
    distinct_id: String,
    properties: Properties,
}

impl Payload {
    pub fn kind(&self) -> PayloadType {
        self.kind
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    /// ISO-8601 instant the event occurred, attached at creation time.
    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn distinct_id(&self) -> &str {
        &self.distinct_id
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    /// A capture event carrying a caller-chosen event name.
    pub fn capture(
        event: &str,
        distinct_id: &str,
        properties: Properties,
    ) -> Result<Self> {
        let event = assert_not_empty(event, "event")?;
        Self::new(PayloadType::Capture, event, distinct_id, properties)
    }

    /// An `$identify` event binding a durable identity. User traits travel
    /// under `$set`; the prior anonymous id under `$anon_distinct_id`.
    pub fn identify(
        distinct_id: &str,
        anon_distinct_id: &str,
        traits: Properties,
        mut properties: Properties,
    ) -> Result<Self> {
        properties.insert("$set".into(), Value::Object(traits));
        properties.insert("$anon_distinct_id".into(), Value::String(anon_distinct_id.into()));
        Self::new(PayloadType::Identify, EVENT_IDENTIFY.into(), distinct_id, properties)
    }

    /// A `$screen` event recording that a screen was viewed.
    pub fn screen(
        name: &str,
        distinct_id: &str,
        mut properties: Properties,
    ) -> Result<Self> {
        let name = assert_not_empty(name, "screen name")?;
        properties.insert("$screen_name".into(), Value::String(name));
        Self::new(PayloadType::Screen, EVENT_SCREEN.into(), distinct_id, properties)
    }

    /// A `$create_alias` event linking a new id to the current identity.
    pub fn alias(
        alias: &str,
        distinct_id: &str,
        mut properties: Properties,
    ) -> Result<Self> {
        let alias = assert_not_empty(alias, "alias")?;
        properties.insert("alias".into(), Value::String(alias));
        Self::new(PayloadType::Alias, EVENT_ALIAS.into(), distinct_id, properties)
    }

    /// A `$group_identify` event associating the identity with a group.
    pub fn group(
        group_type: &str,
        group_key: &str,
        distinct_id: &str,
        traits: Properties,
        mut properties: Properties,
    ) -> Result<Self> {
        let group_type = assert_not_empty(group_type, "group type")?;
        let group_key = assert_not_empty(group_key, "group key")?;
        properties.insert("$group_type".into(), Value::String(group_type));
        properties.insert("$group_key".into(), Value::String(group_key));
        properties.insert("$group_set".into(), Value::Object(traits));
        Self::new(PayloadType::Group, EVENT_GROUP_IDENTIFY.into(), distinct_id, properties)
    }

    fn new(
        kind: PayloadType,
        event: String,
        distinct_id: &str,
        properties: Properties,
    ) -> Result<Self> {
        let distinct_id = assert_not_empty(distinct_id, "distinct_id")?;
        Ok(Payload {
            kind,
            event,
            message_id: nanoid::nanoid!(),
            timestamp: now_iso8601(),
            distinct_id,
            properties,
        })
    }

    /// Derive a builder seeded from this payload, for middleware that needs
    /// to replace a payload with a modified copy before proceeding.
    pub fn to_builder(&self) -> PayloadBuilder {
        PayloadBuilder {
            payload: self.clone(),
        }
    }
}

/// Merge the immutable context snapshot with caller-supplied properties.
/// Context keys are applied first; caller values win on collision.
pub(crate) fn merge_properties(
    context: &Properties,
    caller: Properties,
) -> Properties {
    let mut merged = context.clone();
    for (k, v) in caller {
        merged.insert(k, v);
    }
    merged
}

/// Plain struct for deriving a modified copy of an existing payload.
/// Validation happens at `build`; builders are never shared across threads.
#[derive(Debug, Clone)]
pub struct PayloadBuilder {
    payload: Payload,
}

impl PayloadBuilder {
    pub fn message_id(
        mut self,
        message_id: &str,
    ) -> Self {
        self.payload.message_id = message_id.to_string();
        self
    }

    pub fn timestamp(
        mut self,
        timestamp: &str,
    ) -> Self {
        self.payload.timestamp = timestamp.to_string();
        self
    }

    pub fn distinct_id(
        mut self,
        distinct_id: &str,
    ) -> Self {
        self.payload.distinct_id = distinct_id.to_string();
        self
    }

    pub fn property(
        mut self,
        key: &str,
        value: Value,
    ) -> Self {
        self.payload.properties.insert(key.to_string(), value);
        self
    }

    pub fn properties(
        mut self,
        properties: Properties,
    ) -> Self {
        self.payload.properties = properties;
        self
    }

    pub fn build(self) -> Result<Payload> {
        assert_not_empty(&self.payload.message_id, "message_id")?;
        assert_not_empty(&self.payload.distinct_id, "distinct_id")?;
        assert_not_empty(&self.payload.event, "event")?;
        Ok(self.payload)
    }
}

fn assert_not_empty(
    value: &str,
    name: &'static str,
) -> Result<String> {
    if value.trim().is_empty() {
        return Err(BuildError::InvalidArgument(format!("{name} must not be null or empty")).into());
    }
    Ok(value.to_string())
}
