//! Capture Pipeline Error Hierarchy
//!
//! Defines error types for the event-capture and delivery pipeline,
//! categorized by subsystem and operational concerns.

use std::path::PathBuf;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Disk queue and record persistence failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Collector endpoint and transport failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Payload encoding failures
    #[error(transparent)]
    Serialization(#[from] SerializationError),

    /// Client configuration validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Client construction misuse
    #[error(transparent)]
    Build(#[from] BuildError),

    /// API called after the client was shut down
    #[error("Client is already shut down")]
    AlreadyShutdown,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during queue operations
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialized record exceeds the single-record ceiling.
    /// The offending payload must be dropped, never retried.
    #[error("Record of {size} bytes exceeds the {limit} byte ceiling")]
    RecordTooLarge { size: usize, limit: usize },

    /// Queue file header or record framing is unreadable
    #[error("Queue file corrupted at {path}")]
    Corruption { path: PathBuf },

    /// Operation against a closed queue
    #[error("Queue is closed")]
    QueueClosed,

    /// Fewer records on disk than a removal asked for
    #[error("Cannot remove {requested} records, queue holds {available}")]
    RemoveOutOfRange { requested: usize, available: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Transport-level failures (connect, read, write)
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Server permanently rejected the batch (4xx other than 429)
    #[error("Collector rejected batch with status {status}")]
    Rejected { status: u16 },

    /// Rate limited or server-side failure; the batch is retried later
    #[error("Collector unavailable with status {status}")]
    Unavailable { status: u16 },

    /// No connectivity reported by the connectivity monitor
    #[error("Network is offline")]
    Offline,

    /// Batch body finished without a single record
    #[error("At least one record must be provided in a batch")]
    EmptyBatch,

    /// Decide endpoint returned an unparseable body
    #[error("Malformed decide response: {0}")]
    MalformedResponse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum SerializationError {
    /// JSON encoding failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// Payload encoded to an empty byte string
    #[error("Payload serialized to empty output")]
    EmptyPayload,

    /// Stored record bytes are not valid UTF-8 JSON
    #[error("Stored record is not valid UTF-8")]
    NotUtf8,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// Same interceptor instance registered twice
    #[error("Middleware is already registered")]
    DuplicateMiddleware,

    /// Missing or blank collector api key
    #[error("api_key must not be empty")]
    MissingApiKey,

    /// Invalid builder argument
    #[error("{0}")]
    InvalidArgument(String),
}

// ============== Conversion Implementations ============== //
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(SerializationError::Json(e))
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Network(NetworkError::Transport(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(e))
    }
}
