//! Uploads queued payloads to the collector and trims them from the queue.
//!
//! One upload pass moves `Idle -> Uploading -> {Committed, Rejected,
//! Retained}`. The caller holds the flush lock for the whole pass, so a
//! concurrent append-side eviction can never remove records this pass has
//! already committed to deleting.

use std::sync::Arc;

use tracing::error;
use tracing::trace;
use tracing::warn;

use crate::crypto::Crypto;
use crate::network::CollectorApi;
use crate::network::ConnectivityMonitor;
use crate::queue::SharedQueue;
use crate::uploader::BatchBuilder;
use crate::NetworkError;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UploadOutcome {
    /// Nothing to upload: empty queue or no connectivity
    Idle,
    /// 2xx: the batch was accepted and removed from the queue
    Committed(usize),
    /// 4xx other than 429: permanently refused, removed to avoid a retry loop
    Rejected(usize),
    /// 429, 5xx or transport failure: queue untouched, retried next flush
    Retained,
}

pub(crate) struct BatchUploader {
    queue: SharedQueue,
    api: Arc<dyn CollectorApi>,
    crypto: Arc<dyn Crypto>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    api_key: String,
    max_batch_bytes: usize,
}

impl BatchUploader {
    pub(crate) fn new(
        queue: SharedQueue,
        api: Arc<dyn CollectorApi>,
        crypto: Arc<dyn Crypto>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        api_key: String,
        max_batch_bytes: usize,
    ) -> Self {
        BatchUploader {
            queue,
            api,
            crypto,
            connectivity,
            api_key,
            max_batch_bytes,
        }
    }

    pub(crate) fn should_flush(&self) -> bool {
        self.queue.lock().size() > 0 && self.connectivity.is_connected()
    }

    /// Drain the queue: repeat upload passes while batches commit and
    /// records remain (a pass cut short by the byte budget leaves a
    /// remainder that should not wait for the next timer tick).
    /// The flush lock must be held by the caller.
    pub(crate) async fn drain(&self) {
        loop {
            match self.flush_pass().await {
                UploadOutcome::Committed(n) => {
                    let remaining = self.queue.lock().size();
                    trace!("Uploaded {n} payloads. {remaining} remain in the queue.");
                    if remaining == 0 {
                        return;
                    }
                }
                UploadOutcome::Rejected(_) | UploadOutcome::Retained | UploadOutcome::Idle => return,
            }
        }
    }

    /// One `Idle -> Uploading -> exit state` transition.
    pub(crate) async fn flush_pass(&self) -> UploadOutcome {
        // Conditions may have changed between scheduling and running.
        if !self.should_flush() {
            return UploadOutcome::Idle;
        }

        trace!("Uploading payloads in queue.");
        let (body, count) = match self.assemble() {
            Ok(batch) => batch,
            Err(e) => {
                error!("Error while writing batch body: {e}");
                return UploadOutcome::Retained;
            }
        };

        let status = match self.api.post_batch(body).await {
            Ok(status) => status,
            Err(e) => {
                warn!("Error while uploading payloads: {e}");
                return UploadOutcome::Retained;
            }
        };

        match status {
            200..=299 => match self.remove(count) {
                Ok(()) => UploadOutcome::Committed(count),
                Err(e) => {
                    error!("Unable to remove {count} payload(s) from queue: {e}");
                    UploadOutcome::Retained
                }
            },
            429 => {
                warn!("Collector rate-limited the batch; retaining {count} payload(s).");
                UploadOutcome::Retained
            }
            400..=499 => {
                // Permanent refusal: retrying would loop forever.
                error!("{}. Marked for removal.", NetworkError::Rejected { status });
                match self.remove(count) {
                    Ok(()) => UploadOutcome::Rejected(count),
                    Err(e) => {
                        error!("Unable to remove {count} payload(s) from queue: {e}");
                        UploadOutcome::Retained
                    }
                }
            }
            _ => {
                warn!("Error while uploading payloads: status {status}");
                UploadOutcome::Retained
            }
        }
    }

    /// Read records off the queue head into one batch body, decrypting each
    /// and stopping at the byte budget.
    fn assemble(&self) -> Result<(Vec<u8>, usize)> {
        let mut builder = BatchBuilder::new(&self.api_key, self.max_batch_bytes)?;
        let mut queue = self.queue.lock();
        queue.for_each(&mut |record| {
            let decrypted = self.crypto.decrypt(record.to_vec())?;
            builder.offer(&decrypted)
        })?;
        // The builder's count is authoritative: the last record read may not
        // have been accepted into the batch.
        builder.finish()
    }

    fn remove(
        &self,
        count: usize,
    ) -> Result<()> {
        self.queue.lock().remove_front(count)
    }
}
