use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::constants::DEFAULT_FLAG_DEBOUNCE_MS;
use crate::Error;
use crate::Result;

/// Feature-flag cache parameters.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct FlagConfig {
    /// Delay between a reload request and the single fetch it coalesces
    /// into (milliseconds)
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Fetch flags once as part of client construction
    #[serde(default = "default_reload_on_start")]
    pub reload_on_start: bool,
}

impl Default for FlagConfig {
    fn default() -> Self {
        FlagConfig {
            debounce_ms: default_debounce_ms(),
            reload_on_start: default_reload_on_start(),
        }
    }
}

impl FlagConfig {
    pub fn validate(&self) -> Result<()> {
        if self.debounce_ms < 1 {
            return Err(Error::Config(ConfigError::Message(
                "debounce_ms must be at least 1ms".into(),
            )));
        }
        Ok(())
    }
}

// in ms
fn default_debounce_ms() -> u64 {
    DEFAULT_FLAG_DEBOUNCE_MS
}
fn default_reload_on_start() -> bool {
    true
}
