//! Durable FIFO record store backing the capture pipeline.
//!
//! Records are opaque length-prefixed byte blobs; the queue supports only
//! append-at-tail, peek-from-head and remove-N-from-head. The disk-backed
//! [`QueueFile`] is the default; [`MemoryQueue`] is the volatile fallback
//! used when the backing file cannot be created at all.

mod queue_file;

pub use queue_file::*;

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::constants::QUEUE_FILE_NAME;
use crate::Result;
use crate::StorageError;

/// The queue is exclusively owned by the dispatcher/uploader pair; this
/// mutex only guards individual operations and is never held across awaits.
pub(crate) type SharedQueue = Arc<Mutex<Box<dyn PayloadQueue>>>;

/// Contract shared by the disk queue and the in-memory fallback.
///
/// Implementations are not internally synchronized; the dispatcher/uploader
/// pair owns the queue behind a single lock.
pub trait PayloadQueue: Send + 'static {
    /// Append one record at the tail. Fails with
    /// [`StorageError::RecordTooLarge`] when `bytes` exceeds the
    /// single-record ceiling; the caller must drop that record.
    fn append(
        &mut self,
        bytes: &[u8],
    ) -> Result<()>;

    /// Read up to `n` records from the head without removing them.
    fn peek(
        &mut self,
        n: usize,
    ) -> Result<Vec<Vec<u8>>>;

    /// Remove the `n` oldest records. On failure the caller must not assume
    /// removal occurred.
    fn remove_front(
        &mut self,
        n: usize,
    ) -> Result<()>;

    fn size(&self) -> usize;

    /// Visit records from the head until the visitor returns `false` or the
    /// queue is exhausted. Returns the number of records the visitor
    /// accepted.
    fn for_each(
        &mut self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<bool>,
    ) -> Result<usize>;

    fn close(&mut self) -> Result<()>;
}

/// Open the disk queue under `dir`, recreating it on corruption; fall back
/// to a volatile in-memory queue when the file cannot be created at all.
/// Data loss in the fallback session is accepted.
pub(crate) fn open_queue(
    dir: &Path,
    max_record_bytes: usize,
) -> Box<dyn PayloadQueue> {
    match QueueFile::create(dir, QUEUE_FILE_NAME, max_record_bytes) {
        Ok(queue) => Box::new(queue),
        Err(e) => {
            error!("Could not create disk queue. Falling back to memory queue: {e}");
            Box::new(MemoryQueue::new(max_record_bytes))
        }
    }
}

/// Volatile fallback queue for sessions where the disk file is unusable.
pub struct MemoryQueue {
    records: VecDeque<Vec<u8>>,
    max_record_bytes: usize,
    closed: bool,
}

impl MemoryQueue {
    pub fn new(max_record_bytes: usize) -> Self {
        MemoryQueue {
            records: VecDeque::new(),
            max_record_bytes,
            closed: false,
        }
    }
}

impl PayloadQueue for MemoryQueue {
    fn append(
        &mut self,
        bytes: &[u8],
    ) -> Result<()> {
        if self.closed {
            return Err(StorageError::QueueClosed.into());
        }
        if bytes.len() > self.max_record_bytes {
            return Err(StorageError::RecordTooLarge {
                size: bytes.len(),
                limit: self.max_record_bytes,
            }
            .into());
        }
        self.records.push_back(bytes.to_vec());
        Ok(())
    }

    fn peek(
        &mut self,
        n: usize,
    ) -> Result<Vec<Vec<u8>>> {
        Ok(self.records.iter().take(n).cloned().collect())
    }

    fn remove_front(
        &mut self,
        n: usize,
    ) -> Result<()> {
        if n > self.records.len() {
            return Err(StorageError::RemoveOutOfRange {
                requested: n,
                available: self.records.len(),
            }
            .into());
        }
        self.records.drain(..n);
        Ok(())
    }

    fn size(&self) -> usize {
        self.records.len()
    }

    fn for_each(
        &mut self,
        visitor: &mut dyn FnMut(&[u8]) -> Result<bool>,
    ) -> Result<usize> {
        let mut visited = 0;
        for record in &self.records {
            if !visitor(record)? {
                break;
            }
            visited += 1;
        }
        Ok(visited)
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod queue_file_test;
