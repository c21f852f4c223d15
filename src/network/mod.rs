//! Network abstraction layer between the pipeline and the remote collector.
//!
//! The upload and decide exchanges are defined as a trait so the uploader
//! and flag cache can be exercised against mocks; the one production
//! implementation is the reqwest-backed [`HttpCollector`].

mod http;

pub use http::*;

use std::collections::HashMap;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::Result;

/// Feature-flag evaluation request, posted to the decide endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct DecideRequest {
    pub token: String,
    pub distinct_id: String,
    #[serde(rename = "$anon_distinct_id")]
    pub anon_distinct_id: String,
    pub groups: HashMap<String, String>,
}

/// Decide endpoint response. An absent or empty map clears the cached
/// snapshot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecideResponse {
    #[serde(rename = "featureFlags", default)]
    pub feature_flags: Option<HashMap<String, Value>>,
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait CollectorApi: Send + Sync + 'static {
    /// POST one batch body (uncompressed JSON bytes; the implementation owns
    /// transfer encoding). Returns the HTTP status code; transport-level
    /// failures surface as [`crate::NetworkError::Transport`].
    async fn post_batch(
        &self,
        body: Vec<u8>,
    ) -> Result<u16>;

    /// POST a decide request and parse the flag map out of the response.
    async fn post_decide(
        &self,
        request: DecideRequest,
    ) -> Result<DecideResponse>;
}

/// Host-supplied connectivity check; uploads are skipped entirely while
/// offline.
#[cfg_attr(test, automock)]
pub trait ConnectivityMonitor: Send + Sync + 'static {
    fn is_connected(&self) -> bool;
}

/// Default monitor for hosts without connectivity signals.
pub struct AlwaysConnected;

impl ConnectivityMonitor for AlwaysConnected {
    fn is_connected(&self) -> bool {
        true
    }
}
