use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::context::ContextProvider;
use crate::dispatcher::Dispatcher;
use crate::flags::FeatureFlagCache;
use crate::flags::FlagSnapshot;
use crate::flags::FlagValue;
use crate::identity::IdentityState;
use crate::middleware;
use crate::middleware::Middleware;
use crate::payload::merge_properties;
use crate::payload::Payload;
use crate::payload::Properties;
use crate::Error;
use crate::Result;

/// One capture-family request, dispatched by pattern match.
#[derive(Debug)]
pub enum Operation {
    /// Bind a durable identity and optionally set user traits
    Identify {
        distinct_id: String,
        traits: Properties,
    },
    /// Record a named user action
    Capture {
        event: String,
        properties: Properties,
    },
    /// Link an additional id to the current identity
    Alias { alias: String },
    /// Record a screen view
    Screen {
        name: String,
        properties: Properties,
    },
    /// Associate the identity with a group
    Group {
        group_type: String,
        group_key: String,
        traits: Properties,
    },
    /// Drain and upload queued payloads
    Flush,
    /// Forget the current identity
    Reset,
}

/// Options for flag reads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagOptions {
    /// Emit one `$feature_flag_called` event the first time each key is
    /// read in this process.
    pub send_event: bool,
}

/// Caller-owned client handle. Capture-family calls validate, run the
/// middleware chain, and hand off to the dispatcher worker; they never
/// block on I/O.
pub struct Client {
    dispatcher: Dispatcher,
    middlewares: Arc<Vec<Arc<dyn Middleware>>>,
    context: Arc<dyn ContextProvider>,
    identity: Arc<IdentityState>,
    flags: Arc<FeatureFlagCache>,
    opt_out: Arc<AtomicBool>,
    is_shutdown: Arc<AtomicBool>,
    shutdown_tx: watch::Sender<()>,
}

impl std::fmt::Debug for Client {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("middleware_count", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

impl Client {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        dispatcher: Dispatcher,
        middlewares: Arc<Vec<Arc<dyn Middleware>>>,
        context: Arc<dyn ContextProvider>,
        identity: Arc<IdentityState>,
        flags: Arc<FeatureFlagCache>,
        opt_out: Arc<AtomicBool>,
        is_shutdown: Arc<AtomicBool>,
        shutdown_tx: watch::Sender<()>,
    ) -> Self {
        Client {
            dispatcher,
            middlewares,
            context,
            identity,
            flags,
            opt_out,
            is_shutdown,
            shutdown_tx,
        }
    }

    /// Execute one operation. Fails fast with [`Error::AlreadyShutdown`]
    /// after [`Client::shutdown`]; all other failures of the asynchronous
    /// pipeline are recovered internally and never surface here.
    pub fn run(
        &self,
        operation: Operation,
    ) -> Result<()> {
        self.assert_not_shutdown()?;
        match operation {
            Operation::Identify { distinct_id, traits } => {
                // Capture the anonymous id before rebinding identity.
                let anon_id = self.identity.anonymous_id();
                let payload =
                    Payload::identify(&distinct_id, &anon_id, traits, self.base_properties(Properties::new()))?;
                self.identity.set_distinct_id(&distinct_id);
                self.deliver(payload);
                self.flags.reload();
                Ok(())
            }
            Operation::Capture { event, properties } => {
                let payload =
                    Payload::capture(&event, &self.identity.resolved_id(), self.base_properties(properties))?;
                self.deliver(payload);
                Ok(())
            }
            Operation::Alias { alias } => {
                let payload = Payload::alias(
                    &alias,
                    &self.identity.resolved_id(),
                    self.base_properties(Properties::new()),
                )?;
                self.deliver(payload);
                // Server-side identity linkage may change evaluations.
                self.flags.reload();
                Ok(())
            }
            Operation::Screen { name, properties } => {
                let payload =
                    Payload::screen(&name, &self.identity.resolved_id(), self.base_properties(properties))?;
                self.deliver(payload);
                Ok(())
            }
            Operation::Group {
                group_type,
                group_key,
                traits,
            } => {
                let payload = Payload::group(
                    &group_type,
                    &group_key,
                    &self.identity.resolved_id(),
                    traits,
                    self.base_properties(Properties::new()),
                )?;
                self.identity.set_group(&group_type, &group_key);
                self.deliver(payload);
                self.flags.reload();
                Ok(())
            }
            Operation::Flush => self.dispatcher.flush(),
            Operation::Reset => {
                self.identity.reset();
                self.flags.reload();
                Ok(())
            }
        }
    }

    pub fn identify(
        &self,
        distinct_id: &str,
        traits: Properties,
    ) -> Result<()> {
        self.run(Operation::Identify {
            distinct_id: distinct_id.to_string(),
            traits,
        })
    }

    pub fn capture(
        &self,
        event: &str,
        properties: Properties,
    ) -> Result<()> {
        self.run(Operation::Capture {
            event: event.to_string(),
            properties,
        })
    }

    pub fn alias(
        &self,
        alias: &str,
    ) -> Result<()> {
        self.run(Operation::Alias {
            alias: alias.to_string(),
        })
    }

    pub fn screen(
        &self,
        name: &str,
        properties: Properties,
    ) -> Result<()> {
        self.run(Operation::Screen {
            name: name.to_string(),
            properties,
        })
    }

    pub fn group(
        &self,
        group_type: &str,
        group_key: &str,
        traits: Properties,
    ) -> Result<()> {
        self.run(Operation::Group {
            group_type: group_type.to_string(),
            group_key: group_key.to_string(),
            traits,
        })
    }

    /// Asynchronously flush all queued payloads to the collector.
    pub fn flush(&self) -> Result<()> {
        self.run(Operation::Flush)
    }

    /// Forget the current user and rotate the anonymous id.
    pub fn reset(&self) -> Result<()> {
        self.run(Operation::Reset)
    }

    /// Stop capturing: subsequent payloads are dropped with no side effect.
    pub fn opt_out(&self) {
        self.opt_out.store(true, Ordering::SeqCst);
    }

    pub fn opt_in(&self) {
        self.opt_out.store(false, Ordering::SeqCst);
    }

    pub fn is_opted_out(&self) -> bool {
        self.opt_out.load(Ordering::SeqCst)
    }

    /// Evaluated flag value, or `default_value` before the first successful
    /// fetch (with a warning) and for unknown keys. Never blocks.
    pub fn get_flag(
        &self,
        key: &str,
        default_value: FlagValue,
        options: FlagOptions,
    ) -> FlagValue {
        self.report_flag_usage(key, options);
        self.flags.get_flag(key, default_value)
    }

    pub fn is_enabled(
        &self,
        key: &str,
        default_value: bool,
        options: FlagOptions,
    ) -> bool {
        self.report_flag_usage(key, options);
        self.flags.is_enabled(key, default_value)
    }

    /// Request a feature-flag reload; bursts coalesce into one fetch.
    pub fn reload_flags(&self) {
        self.flags.reload();
    }

    pub fn flag_snapshot(&self) -> Arc<FlagSnapshot> {
        self.flags.snapshot()
    }

    /// Stops the flush timer and the dispatcher worker and closes the
    /// queue. Does not cancel an upload already in flight and does not
    /// flush remaining records; they persist on disk for the next start.
    pub fn shutdown(&self) {
        if self.is_shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.shutdown_tx.send(());
        info!("Client shut down.");
    }

    pub fn is_shutdown(&self) -> bool {
        self.is_shutdown.load(Ordering::SeqCst)
    }

    fn assert_not_shutdown(&self) -> Result<()> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(Error::AlreadyShutdown);
        }
        Ok(())
    }

    fn base_properties(
        &self,
        caller: Properties,
    ) -> Properties {
        merge_properties(&self.context.snapshot(), caller)
    }

    /// Exactly one `$feature_flag_called` capture per distinct key per
    /// process lifetime, and only once flags have actually loaded.
    fn report_flag_usage(
        &self,
        key: &str,
        options: FlagOptions,
    ) {
        if !options.send_event || !self.flags.loaded() {
            return;
        }
        if !self.flags.mark_reported(key) {
            return;
        }

        let response = match self.flags.lookup(key) {
            Some(value) => serde_json::to_value(&value).unwrap_or(Value::Null),
            None => Value::Null,
        };
        let mut properties = Properties::new();
        properties.insert("$feature_flag".into(), Value::String(key.to_string()));
        properties.insert("$feature_flag_response".into(), response);
        if let Err(e) = self.capture("$feature_flag_called", properties) {
            warn!("Could not report flag usage for {key}: {e}");
        }
    }

    fn deliver(
        &self,
        payload: Payload,
    ) {
        trace!("Created payload {}.", payload.message_id());
        let dispatcher = self.dispatcher.clone();
        middleware::run(&self.middlewares, payload, &mut |accepted| {
            if let Err(e) = dispatcher.enqueue(accepted) {
                warn!("Dropping payload: {e}");
            }
        });
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        // Dropping the watch sender stops the worker and timer; an explicit
        // signal covers receivers cloned elsewhere.
        if !self.is_shutdown.swap(true, Ordering::SeqCst) {
            let _ = self.shutdown_tx.send(());
        }
    }
}
