//! Device/app context collaborator.
//!
//! The host application supplies an opaque string-keyed snapshot (OS, app
//! version, locale, ...) that is merged into every payload's properties
//! before queuing. Collection of those values is outside this crate.

use crate::payload::Properties;

pub trait ContextProvider: Send + Sync + 'static {
    /// Snapshot of ambient properties. Called once per captured payload;
    /// caller-supplied properties override colliding keys.
    fn snapshot(&self) -> Properties;
}

/// Fixed context captured once at client build time.
pub struct StaticContext {
    properties: Properties,
}

impl StaticContext {
    pub fn new(properties: Properties) -> Self {
        StaticContext { properties }
    }

    pub fn empty() -> Self {
        StaticContext {
            properties: Properties::new(),
        }
    }
}

impl ContextProvider for StaticContext {
    fn snapshot(&self) -> Properties {
        self.properties.clone()
    }
}
