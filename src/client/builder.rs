use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::watch;

use super::Client;
use crate::config::Settings;
use crate::context::ContextProvider;
use crate::context::StaticContext;
use crate::crypto::Crypto;
use crate::crypto::NoopCrypto;
use crate::dispatcher::run_flush_timer;
use crate::dispatcher::Dispatcher;
use crate::dispatcher::DispatcherWorker;
use crate::flags::FeatureFlagCache;
use crate::identity::IdentityState;
use crate::middleware::contains_instance;
use crate::middleware::Middleware;
use crate::network::AlwaysConnected;
use crate::network::CollectorApi;
use crate::network::ConnectivityMonitor;
use crate::network::HttpCollector;
use crate::queue::open_queue;
use crate::uploader::BatchUploader;
use crate::BuildError;
use crate::Result;

/// Assembles a [`Client`]. Misuse (blank api key, duplicate middleware)
/// fails here, synchronously, not at capture time.
///
/// `build` spawns the dispatcher worker and flush timer and must run
/// inside a tokio runtime.
pub struct ClientBuilder {
    api_key: String,
    settings: Settings,
    middlewares: Vec<Arc<dyn Middleware>>,
    crypto: Arc<dyn Crypto>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    context: Arc<dyn ContextProvider>,
    collector: Option<Arc<dyn CollectorApi>>,
    opted_out: bool,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("middleware_count", &self.middlewares.len())
            .field("opted_out", &self.opted_out)
            .finish_non_exhaustive()
    }
}

impl ClientBuilder {
    pub fn new(api_key: &str) -> Self {
        ClientBuilder {
            api_key: api_key.to_string(),
            settings: Settings::default(),
            middlewares: Vec::new(),
            crypto: Arc::new(NoopCrypto),
            connectivity: Arc::new(AlwaysConnected),
            context: Arc::new(StaticContext::empty()),
            collector: None,
            opted_out: false,
        }
    }

    pub fn settings(
        mut self,
        settings: Settings,
    ) -> Self {
        self.settings = settings;
        self
    }

    /// Add a middleware for intercepting payloads. Registering the same
    /// instance twice is a build-time error.
    pub fn middleware(
        mut self,
        middleware: Arc<dyn Middleware>,
    ) -> Result<Self> {
        if contains_instance(&self.middlewares, &middleware) {
            return Err(BuildError::DuplicateMiddleware.into());
        }
        self.middlewares.push(middleware);
        Ok(self)
    }

    /// Byte transform applied to records before they hit disk.
    pub fn crypto(
        mut self,
        crypto: Arc<dyn Crypto>,
    ) -> Self {
        self.crypto = crypto;
        self
    }

    pub fn connectivity(
        mut self,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// Device/app context snapshot merged into every payload's properties.
    pub fn context(
        mut self,
        context: Arc<dyn ContextProvider>,
    ) -> Self {
        self.context = context;
        self
    }

    /// Replace the HTTP collector, e.g. with a test double.
    pub fn collector(
        mut self,
        collector: Arc<dyn CollectorApi>,
    ) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Start in the opted-out state; captured payloads are dropped until
    /// [`Client::opt_in`].
    pub fn opted_out(
        mut self,
        opted_out: bool,
    ) -> Self {
        self.opted_out = opted_out;
        self
    }

    pub fn build(self) -> Result<Client> {
        if self.api_key.trim().is_empty() {
            return Err(BuildError::MissingApiKey.into());
        }
        self.settings.validate()?;

        let capture = self.settings.capture.clone();
        let queue = open_queue(&capture.queue_dir, capture.max_record_bytes);
        let queue = Arc::new(parking_lot::Mutex::new(queue));

        let collector: Arc<dyn CollectorApi> = match self.collector {
            Some(collector) => collector,
            None => Arc::new(HttpCollector::new(&self.settings.network)?),
        };

        let uploader = Arc::new(BatchUploader::new(
            queue.clone(),
            collector.clone(),
            self.crypto.clone(),
            self.connectivity.clone(),
            self.api_key.clone(),
            capture.max_batch_bytes,
        ));

        let opt_out = Arc::new(AtomicBool::new(self.opted_out));
        let is_shutdown = Arc::new(AtomicBool::new(false));
        let flush_lock = Arc::new(tokio::sync::Mutex::new(()));
        let flush_pending = Arc::new(AtomicBool::new(false));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        let dispatcher = Dispatcher::new(event_tx.clone(), opt_out.clone(), is_shutdown.clone());

        // First timer fire is immediate when unsent records from a previous
        // session already exceed the threshold.
        let fire_immediately = queue.lock().size() >= capture.flush_threshold;

        let worker = DispatcherWorker::new(
            event_rx,
            queue,
            self.crypto,
            uploader,
            flush_lock,
            flush_pending,
            is_shutdown.clone(),
            capture.clone(),
            shutdown_rx.clone(),
        );
        tokio::spawn(worker.run());
        tokio::spawn(run_flush_timer(
            Duration::from_millis(capture.flush_interval_ms),
            fire_immediately,
            event_tx,
            shutdown_rx,
        ));

        let identity = Arc::new(IdentityState::new());
        let flags = Arc::new(FeatureFlagCache::new(
            collector,
            identity.clone(),
            self.api_key,
            Duration::from_millis(self.settings.flags.debounce_ms),
        ));
        if self.settings.flags.reload_on_start {
            flags.reload();
        }

        Ok(Client::assemble(
            dispatcher,
            Arc::new(self.middlewares),
            self.context,
            identity,
            flags,
            opt_out,
            is_shutdown,
            shutdown_tx,
        ))
    }
}
