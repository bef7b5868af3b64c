use std::io;
use std::string::FromUtf8Error;
use thiserror::Error;

/// Error type for volume operations: the KV/FS layer, the patch dispatcher,
/// and the actor boundary all funnel into this one enum.
#[derive(Error, Debug)]
pub enum VolumeError {
    /// IO error from the durable store's backing medium.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Serialization/deserialization error.
    #[error("Serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A file was read or unlinked but no such path exists.
    #[error("no such file: {0}")]
    Enoent(String),

    /// Reserved: a path component was treated as a directory.
    #[error("not a directory: {0}")]
    Enotdir(String),

    /// Reserved: a path already exists where creation was expected.
    #[error("already exists: {0}")]
    Eexist(String),

    /// Reserved: a directory-shaped path was not empty.
    #[error("not empty: {0}")]
    Enotempty(String),

    /// Reserved: a handle refers to storage that no longer matches its origin.
    #[error("stale handle: {0}")]
    Estale(String),

    /// Unexpected command type encountered while replaying the durable log.
    #[error("unexpected command type")]
    UnexpectedCommandType,

    /// Log file not found for the given generation.
    #[error("log file not found for generation {0}")]
    LogFileNotFound(u64),

    /// Sled database error.
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    /// UTF-8 conversion error.
    #[error("UTF-8 error: {0}")]
    Utf8(#[from] FromUtf8Error),

    /// A whole-request rejection distinct from a per-patch `accepted=false`
    /// (e.g. malformed request shape caught before dispatch).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Any other unexpected fault; the top-level caller should treat this
    /// as a 500-equivalent.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for volume operations.
pub type Result<T> = std::result::Result<T, VolumeError>;
