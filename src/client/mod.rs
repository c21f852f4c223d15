//! Caller-owned client handle.
//!
//! One [`Client`] is constructed via [`ClientBuilder`] and passed by
//! reference or context wherever events are captured; there is no
//! process-wide singleton.

mod builder;
mod client;

pub use builder::*;
pub use client::*;
