//! Configuration management for the capture client.
//!
//! Provides hierarchical configuration loading with priority:
//! 1. Default values (hardcoded)
//! 2. Optional TOML config file
//! 3. Environment variables (highest priority)

mod capture;
mod flags;
mod network;

pub use capture::*;
pub use flags::*;
pub use network::*;

//---
use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Settings {
    /// Queue sizing and flush scheduling parameters
    #[serde(default)]
    pub capture: CaptureConfig,
    /// Collector endpoints and transport parameters
    #[serde(default)]
    pub network: NetworkConfig,
    /// Feature-flag cache parameters
    #[serde(default)]
    pub flags: FlagConfig,
}

impl Settings {
    /// Load configuration from an optional TOML file with `BEACON__*`
    /// environment variables layered on top.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Config::builder();

        if let Some(path) = config_path {
            config = config.add_source(File::with_name(path).required(true));
        }

        config = config.add_source(
            Environment::with_prefix("BEACON")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true),
        );

        let settings: Settings = config.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validates all subsystem configurations
    pub fn validate(&self) -> Result<()> {
        self.capture.validate()?;
        self.network.validate()?;
        self.flags.validate()?;
        Ok(())
    }
}
