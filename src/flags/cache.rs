use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use dashmap::DashSet;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::error;
use tracing::trace;
use tracing::warn;

use super::FlagSnapshot;
use super::FlagValue;
use crate::identity::IdentityState;
use crate::network::CollectorApi;
use crate::network::DecideRequest;
use crate::network::DecideResponse;
use crate::Result;

/// Reload requests collapse to "at most one in flight, at most one
/// pending": a request during a pending debounce is served by that fetch;
/// a request during an in-flight fetch rearms one debounce cycle on
/// completion.
#[derive(Debug, Default)]
struct ReloadState {
    requested: bool,
    debounce_pending: bool,
    in_flight: bool,
}

pub struct FeatureFlagCache {
    snapshot: ArcSwap<FlagSnapshot>,
    /// Flag keys already reported via `$feature_flag_called`, once per
    /// process lifetime.
    reported: DashSet<String>,
    state: Mutex<ReloadState>,
    api: Arc<dyn CollectorApi>,
    identity: Arc<IdentityState>,
    api_key: String,
    debounce: Duration,
}

impl FeatureFlagCache {
    pub(crate) fn new(
        api: Arc<dyn CollectorApi>,
        identity: Arc<IdentityState>,
        api_key: String,
        debounce: Duration,
    ) -> Self {
        FeatureFlagCache {
            snapshot: ArcSwap::from_pointee(FlagSnapshot::default()),
            reported: DashSet::new(),
            state: Mutex::new(ReloadState::default()),
            api,
            identity,
            api_key,
            debounce,
        }
    }

    /// Last-known flag map. Reads never block and never see a torn update.
    pub fn snapshot(&self) -> Arc<FlagSnapshot> {
        self.snapshot.load_full()
    }

    pub fn loaded(&self) -> bool {
        self.snapshot.load().loaded
    }

    pub(crate) fn lookup(
        &self,
        key: &str,
    ) -> Option<FlagValue> {
        self.snapshot.load().flags.get(key).cloned()
    }

    /// Evaluated value for `key`, or the caller default before the first
    /// successful fetch and for unknown keys.
    pub fn get_flag(
        &self,
        key: &str,
        default_value: FlagValue,
    ) -> FlagValue {
        if !self.loaded() {
            warn!("get_flag for key {key} failed. Feature flags didn't load in time.");
            return default_value;
        }
        match self.lookup(key) {
            Some(value) if !value.is_missing() => value,
            _ => default_value,
        }
    }

    pub fn is_enabled(
        &self,
        key: &str,
        default_value: bool,
    ) -> bool {
        if !self.loaded() {
            warn!("is_enabled for key {key} failed. Feature flags didn't load in time.");
            return default_value;
        }
        match self.lookup(key) {
            Some(value) if !value.is_missing() => value.is_enabled(),
            _ => default_value,
        }
    }

    /// True the first time `key` is reported; callers emit the
    /// `$feature_flag_called` event only on that transition.
    pub(crate) fn mark_reported(
        &self,
        key: &str,
    ) -> bool {
        self.reported.insert(key.to_string())
    }

    /// Request a reload. Bursts within one debounce window coalesce into a
    /// single fetch; a request while a fetch is in flight is deferred onto
    /// a fresh debounce cycle afterwards.
    pub fn reload(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.debounce_pending {
            // The pending fetch will serve this request as well.
            return;
        }
        if state.in_flight {
            state.requested = true;
            return;
        }
        state.debounce_pending = true;
        drop(state);
        self.spawn_debounced_fetch();
    }

    fn spawn_debounced_fetch(self: &Arc<Self>) {
        let cache = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(cache.debounce).await;

            {
                let mut state = cache.state.lock();
                state.debounce_pending = false;
                state.in_flight = true;
            }

            if let Err(e) = cache.fetch().await {
                error!("Error while sending reload feature flags request: {e}");
            }

            let rearm = {
                let mut state = cache.state.lock();
                state.in_flight = false;
                if state.requested {
                    state.requested = false;
                    state.debounce_pending = true;
                    true
                } else {
                    false
                }
            };
            if rearm {
                cache.spawn_debounced_fetch();
            }
        });
    }

    async fn fetch(&self) -> Result<()> {
        trace!("Reloading feature flags.");
        let request = DecideRequest {
            token: self.api_key.clone(),
            // decide requires an identity; fall back to the anonymous id.
            distinct_id: self.identity.resolved_id(),
            anon_distinct_id: self.identity.anonymous_id(),
            groups: self.identity.groups(),
        };
        let response = self.api.post_decide(request).await?;
        self.received(response);
        Ok(())
    }

    /// Replace the snapshot wholesale; `loaded` never reverts to false.
    fn received(
        &self,
        response: DecideResponse,
    ) {
        let mut flags = HashMap::new();
        if let Some(map) = response.feature_flags {
            for (key, value) in map {
                match value {
                    Value::Bool(enabled) => {
                        flags.insert(key, FlagValue::Bool(enabled));
                    }
                    Value::String(variant) => {
                        flags.insert(key, FlagValue::Variant(variant));
                    }
                    other => {
                        warn!("Ignoring feature flag {key} with unsupported value: {other}");
                    }
                }
            }
        }
        self.snapshot.store(Arc::new(FlagSnapshot {
            flags,
            loaded: true,
        }));
    }
}
