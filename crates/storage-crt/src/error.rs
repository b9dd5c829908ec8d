//! Error types for S3 storage operations.

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use rusty_multipart_storage::StorageError;
use thiserror::Error;

/// Errors specific to the S3 storage client.
#[derive(Error, Debug)]
pub enum CrtError {
    /// AWS SDK error.
    #[error("AWS SDK error: {message}")]
    SdkError { message: String, retryable: bool },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// S3 answered without a field the operation needs.
    #[error("Malformed {operation} response: {message}")]
    MalformedResponse {
        operation: &'static str,
        message: String,
    },
}

impl From<CrtError> for StorageError {
    fn from(err: CrtError) -> Self {
        match err {
            CrtError::SdkError { message, retryable } => {
                StorageError::NetworkError { message, retryable }
            }
            CrtError::ConfigError(message) => StorageError::InvalidConfig { message },
            other @ CrtError::MalformedResponse { .. } => StorageError::Other {
                message: other.to_string(),
            },
        }
    }
}

/// Map an SDK failure onto the storage error taxonomy.
///
/// Service responses keep their HTTP status; failures without a response
/// (timeouts, connection errors) become network errors.
pub(crate) fn from_sdk_error<E>(
    err: SdkError<E, HttpResponse>,
    bucket: &str,
    key: &str,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status: Option<u16> = err.raw_response().map(|r| r.status().as_u16());

    match status {
        Some(404) => StorageError::NotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        },
        Some(403) => StorageError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
            message: err.message().unwrap_or_default().to_string(),
        },
        Some(code) => StorageError::Status {
            code,
            message: err.message().unwrap_or_default().to_string(),
        },
        None => {
            let retryable: bool = matches!(
                err,
                SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
            );
            CrtError::SdkError {
                message: DisplayErrorContext(&err).to_string(),
                retryable,
            }
            .into()
        }
    }
}
