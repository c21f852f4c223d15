use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::BATCH_PATH;
use crate::constants::DECIDE_PATH;
use crate::Error;
use crate::Result;

/// Collector endpoints and transport parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// Collector base URL, scheme included
    #[serde(default = "default_host")]
    pub host: String,

    /// Path of the batch-upload endpoint
    #[serde(default = "default_batch_path")]
    pub batch_path: String,

    /// Path of the feature-flag decide endpoint
    #[serde(default = "default_decide_path")]
    pub decide_path: String,

    /// Per-request timeout (milliseconds)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        NetworkConfig {
            host: default_host(),
            batch_path: default_batch_path(),
            decide_path: default_decide_path(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.host.starts_with("http://") && !self.host.starts_with("https://") {
            return Err(Error::Config(ConfigError::Message(
                "host must be an http(s) URL".into(),
            )));
        }
        if self.request_timeout_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "request_timeout_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }

    pub fn batch_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.batch_path)
    }

    pub fn decide_url(&self) -> String {
        format!("{}{}", self.host.trim_end_matches('/'), self.decide_path)
    }
}

fn default_host() -> String {
    "https://ingest.beacon.dev".to_string()
}
fn default_batch_path() -> String {
    BATCH_PATH.to_string()
}
fn default_decide_path() -> String {
    DECIDE_PATH.to_string()
}
// in ms
fn default_request_timeout_ms() -> u64 {
    15_000
}
