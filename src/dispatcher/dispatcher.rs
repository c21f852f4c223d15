use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

use crate::config::CaptureConfig;
use crate::crypto::Crypto;
use crate::payload::Payload;
use crate::queue::SharedQueue;
use crate::uploader::BatchUploader;
use crate::Error;
use crate::Result;
use crate::SerializationError;

#[derive(Debug)]
pub(crate) enum DispatchEvent {
    Enqueue(Payload),
    Flush,
}

/// Cheap cloneable handle callers use to hand work to the worker.
/// Returns after scheduling, never after completion.
#[derive(Clone)]
pub(crate) struct Dispatcher {
    tx: mpsc::UnboundedSender<DispatchEvent>,
    opt_out: Arc<AtomicBool>,
    is_shutdown: Arc<AtomicBool>,
}

impl Dispatcher {
    pub(crate) fn new(
        tx: mpsc::UnboundedSender<DispatchEvent>,
        opt_out: Arc<AtomicBool>,
        is_shutdown: Arc<AtomicBool>,
    ) -> Self {
        Dispatcher {
            tx,
            opt_out,
            is_shutdown,
        }
    }

    pub(crate) fn enqueue(
        &self,
        payload: Payload,
    ) -> Result<()> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(Error::AlreadyShutdown);
        }
        if self.opt_out.load(Ordering::SeqCst) {
            trace!("Client is opted out; dropping payload {}.", payload.message_id());
            return Ok(());
        }
        self.tx.send(DispatchEvent::Enqueue(payload)).map_err(|_| Error::AlreadyShutdown)
    }

    pub(crate) fn flush(&self) -> Result<()> {
        if self.is_shutdown.load(Ordering::SeqCst) {
            return Err(Error::AlreadyShutdown);
        }
        self.tx.send(DispatchEvent::Flush).map_err(|_| Error::AlreadyShutdown)
    }
}

/// The one worker that owns queue mutation. Consumes dispatch events in
/// submission order; uploads run on separate network tasks serialized by
/// the flush lock.
pub(crate) struct DispatcherWorker {
    rx: mpsc::UnboundedReceiver<DispatchEvent>,
    queue: SharedQueue,
    crypto: Arc<dyn Crypto>,
    uploader: Arc<BatchUploader>,
    /// Held for the full duration of both the append-side eviction and the
    /// upload-and-trim sequence; see `perform_enqueue`.
    flush_lock: Arc<tokio::sync::Mutex<()>>,
    flush_pending: Arc<AtomicBool>,
    is_shutdown: Arc<AtomicBool>,
    config: CaptureConfig,
    shutdown_signal: watch::Receiver<()>,
}

impl DispatcherWorker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rx: mpsc::UnboundedReceiver<DispatchEvent>,
        queue: SharedQueue,
        crypto: Arc<dyn Crypto>,
        uploader: Arc<BatchUploader>,
        flush_lock: Arc<tokio::sync::Mutex<()>>,
        flush_pending: Arc<AtomicBool>,
        is_shutdown: Arc<AtomicBool>,
        config: CaptureConfig,
        shutdown_signal: watch::Receiver<()>,
    ) -> Self {
        DispatcherWorker {
            rx,
            queue,
            crypto,
            uploader,
            flush_lock,
            flush_pending,
            is_shutdown,
            config,
            shutdown_signal,
        }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                // Use biased to ensure branch order
                biased;
                _ = self.shutdown_signal.changed() => {
                    warn!("[Dispatcher] shutdown signal received.");
                    break;
                }
                event = self.rx.recv() => {
                    match event {
                        Some(DispatchEvent::Enqueue(payload)) => self.perform_enqueue(payload).await,
                        Some(DispatchEvent::Flush) => self.submit_flush(),
                        None => break,
                    }
                }
            }
        }

        // Unsent records stay on disk for the next process start.
        if let Err(e) = self.queue.lock().close() {
            error!("Failed to close queue: {e}");
        }
    }

    /// serialize -> encrypt -> enforce the capacity ceiling -> append ->
    /// threshold flush. Runs only on this worker, so appends keep caller
    /// submission order.
    async fn perform_enqueue(
        &self,
        payload: Payload,
    ) {
        if self.queue.lock().size() >= self.config.max_queue_size {
            // Double checked locking: the network task may have removed
            // payloads from the queue to bring it below capacity while we
            // were waiting for the flush lock.
            let _guard = self.flush_lock.lock().await;
            let mut queue = self.queue.lock();
            if queue.size() >= self.config.max_queue_size {
                info!("Queue is at max capacity ({}), removing oldest payload.", queue.size());
                if let Err(e) = queue.remove_front(1) {
                    error!("Unable to remove oldest payload from queue: {e}");
                    return;
                }
            }
        }

        let bytes = match serde_json::to_vec(&payload) {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                error!(
                    "Could not serialize payload {}: {}.",
                    payload.message_id(),
                    SerializationError::EmptyPayload
                );
                return;
            }
            Err(e) => {
                error!("Could not serialize payload {}: {e}.", payload.message_id());
                return;
            }
        };
        let bytes = match self.crypto.encrypt(bytes) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Could not encrypt payload {}: {e}.", payload.message_id());
                return;
            }
        };

        {
            let mut queue = self.queue.lock();
            if let Err(e) = queue.append(&bytes) {
                error!("Could not add payload {} to queue: {e}.", payload.message_id());
                return;
            }
            trace!("Enqueued {} payload. {} elements in the queue.", payload.event(), queue.size());
        }

        if self.queue.lock().size() >= self.config.flush_threshold {
            self.submit_flush();
        }
    }

    /// Schedule an upload on a network task. Rapid flush requests for the
    /// same backlog coalesce into the task still waiting on the flush lock.
    fn submit_flush(&self) {
        if !self.uploader.should_flush() {
            return;
        }

        if self.is_shutdown.load(Ordering::SeqCst) {
            info!(
                "A call to flush() was made after shutdown() has been called. \
                 In-flight events may not be uploaded right away."
            );
            return;
        }

        if self.flush_pending.swap(true, Ordering::SeqCst) {
            trace!("Flush already pending; coalescing.");
            return;
        }

        let uploader = self.uploader.clone();
        let flush_lock = self.flush_lock.clone();
        let flush_pending = self.flush_pending.clone();
        tokio::spawn(async move {
            let _guard = flush_lock.lock().await;
            // New flush requests from here on represent new backlog.
            flush_pending.store(false, Ordering::SeqCst);
            uploader.drain().await;
        });
    }
}
