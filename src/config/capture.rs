use std::path::PathBuf;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_FLUSH_INTERVAL_MS;
use crate::constants::DEFAULT_FLUSH_THRESHOLD;
use crate::constants::MAX_BATCH_BYTES;
use crate::constants::MAX_QUEUE_SIZE;
use crate::constants::MAX_RECORD_BYTES;
use crate::Error;
use crate::Result;

/// Queue sizing and flush scheduling parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CaptureConfig {
    /// Directory holding the on-disk queue file
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,

    /// Oldest records are evicted once the queue holds this many
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Single-record ceiling in bytes; larger payloads are dropped
    #[serde(default = "default_max_record_bytes")]
    pub max_record_bytes: usize,

    /// Batch body ceiling in bytes
    #[serde(default = "default_max_batch_bytes")]
    pub max_batch_bytes: usize,

    /// Queue size at which a flush is triggered without waiting for the timer
    #[serde(default = "default_flush_threshold")]
    pub flush_threshold: usize,

    /// Interval of the periodic flush timer (milliseconds)
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        CaptureConfig {
            queue_dir: default_queue_dir(),
            max_queue_size: default_max_queue_size(),
            max_record_bytes: default_max_record_bytes(),
            max_batch_bytes: default_max_batch_bytes(),
            flush_threshold: default_flush_threshold(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "max_queue_size must be greater than 0".into(),
            )));
        }
        if self.flush_threshold == 0 {
            return Err(Error::Config(ConfigError::Message(
                "flush_threshold must be greater than 0".into(),
            )));
        }
        if self.flush_threshold > self.max_queue_size {
            return Err(Error::Config(ConfigError::Message(
                "flush_threshold must not exceed max_queue_size".into(),
            )));
        }
        if self.max_record_bytes == 0 || self.max_record_bytes > self.max_batch_bytes {
            return Err(Error::Config(ConfigError::Message(
                "max_record_bytes must be greater than 0 and fit inside max_batch_bytes".into(),
            )));
        }
        if self.flush_interval_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "flush_interval_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }
}

fn default_queue_dir() -> PathBuf {
    PathBuf::from(".beacon")
}
fn default_max_queue_size() -> usize {
    MAX_QUEUE_SIZE
}
fn default_max_record_bytes() -> usize {
    MAX_RECORD_BYTES
}
fn default_max_batch_bytes() -> usize {
    MAX_BATCH_BYTES
}
fn default_flush_threshold() -> usize {
    DEFAULT_FLUSH_THRESHOLD
}
// in ms
fn default_flush_interval_ms() -> u64 {
    DEFAULT_FLUSH_INTERVAL_MS
}
