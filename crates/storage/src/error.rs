//! Error types for storage and transport operations.

use std::time::Duration;

use thiserror::Error;

/// Errors reported by the storage client and file source collaborators.
#[derive(Error, Debug, Clone)]
pub enum StorageError {
    /// Object not found in S3.
    #[error("Object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Access denied.
    #[error("Access denied to s3://{bucket}/{key}: {message}")]
    AccessDenied {
        bucket: String,
        key: String,
        message: String,
    },

    /// Service answered with a non-success status.
    #[error("{message}")]
    Status { code: u16, message: String },

    /// Network error.
    #[error("Network error: {message}")]
    NetworkError { message: String, retryable: bool },

    /// Local I/O error.
    #[error("I/O error for {path}: {message}")]
    IoError { path: String, message: String },

    /// Operation cancelled by user.
    #[error("Operation cancelled")]
    Cancelled,

    /// Invalid configuration.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// Other error.
    #[error("{message}")]
    Other { message: String },
}

impl StorageError {
    /// Check if this error means the remote object does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound { .. } | StorageError::Status { code: 404, .. }
        )
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::IoError {
            path: String::new(),
            message: err.to_string(),
        }
    }
}

/// Errors that end a `start` or `resume` run.
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// Local source file is missing.
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// Storage client or file source failure.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No read progress arrived within the idle timeout.
    #[error("Upload stalled: no progress for {}s", .idle.as_secs())]
    StallAbort { idle: Duration },

    /// The remote part budget is already used up.
    #[error("Part limit exceeded: {accepted} of {max_parts} parts already used")]
    PartLimitExceeded { max_parts: u32, accepted: u32 },

    /// `resume` was called before an upload session exists.
    #[error("No multipart upload session has been initiated")]
    NoUploadSession,

    /// A run is already in flight on this transport.
    #[error("Transport is busy")]
    Busy,

    /// Failure without a message or status code.
    #[error("Unknown error")]
    Unknown,
}

impl TransportError {
    /// Render the message carried by the `Error` event.
    ///
    /// Falls back to the status code when the storage error has no
    /// message, and to a generic text when neither is available.
    pub fn describe(&self) -> String {
        match self {
            TransportError::Storage(StorageError::Status { code, message })
                if message.is_empty() =>
            {
                format!("status {}", code)
            }
            TransportError::Storage(StorageError::Other { message })
            | TransportError::Storage(StorageError::NetworkError { message, .. })
                if message.is_empty() =>
            {
                TransportError::Unknown.to_string()
            }
            other => other.to_string(),
        }
    }
}
