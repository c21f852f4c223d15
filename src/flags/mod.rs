//! Cached feature-flag evaluations.
//!
//! Holds the last-known flag map, serves lock-free reads, and serializes
//! reload requests so that at most one decide call is ever outstanding,
//! with bursts of requests coalesced behind a debounce delay.

mod cache;

pub use cache::*;

use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

/// Evaluated value of one flag: plain on/off or a multivariate key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Variant(String),
}

impl FlagValue {
    /// Multivariate flags count as enabled regardless of the variant.
    pub fn is_enabled(&self) -> bool {
        match self {
            FlagValue::Bool(enabled) => *enabled,
            FlagValue::Variant(_) => true,
        }
    }

    /// An empty variant string is treated as "not evaluated".
    pub(crate) fn is_missing(&self) -> bool {
        matches!(self, FlagValue::Variant(s) if s.is_empty())
    }
}

impl From<bool> for FlagValue {
    fn from(value: bool) -> Self {
        FlagValue::Bool(value)
    }
}

impl From<&str> for FlagValue {
    fn from(value: &str) -> Self {
        FlagValue::Variant(value.to_string())
    }
}

/// Immutable view of the cache: the whole map is replaced on each
/// successful fetch, never merged incrementally. `loaded` distinguishes
/// "no successful fetch yet" from "fetched, possibly empty".
#[derive(Debug, Clone, Default)]
pub struct FlagSnapshot {
    pub flags: HashMap<String, FlagValue>,
    pub loaded: bool,
}
