// -
// Queue and batch ceilings
//
// The collector only accepts single records < 32KB and batch bodies < 500KB.
// The batch ceiling is 475KB to leave room for tokens added around the
// records themselves, such as `sent_at`.

/// Drop the oldest record once the queue holds this many. With records capped
/// at 32KB this bounds the on-disk queue to roughly 32MB.
pub(crate) const MAX_QUEUE_SIZE: usize = 1000;

/// Single-record ceiling in bytes.
pub(crate) const MAX_RECORD_BYTES: usize = 32_000;

/// Batch body ceiling in bytes.
pub(crate) const MAX_BATCH_BYTES: usize = 475_000;

// -
// Flush scheduling

/// Records queued before a threshold flush is triggered.
pub(crate) const DEFAULT_FLUSH_THRESHOLD: usize = 20;

/// Interval of the periodic flush timer.
pub(crate) const DEFAULT_FLUSH_INTERVAL_MS: u64 = 30_000;

// -
// Feature flags

/// Delay between a reload request and the fetch it coalesces into.
pub(crate) const DEFAULT_FLAG_DEBOUNCE_MS: u64 = 500;

// -
// Wire paths

pub(crate) const BATCH_PATH: &str = "/batch";
pub(crate) const DECIDE_PATH: &str = "/decide";

/// Queue file name inside the configured queue directory.
pub(crate) const QUEUE_FILE_NAME: &str = "beacon-disk-queue";
