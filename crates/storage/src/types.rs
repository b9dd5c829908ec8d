//! Shared data structures for multipart transport operations.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use rusty_multipart_common::{
    CONTENT_TYPE_OCTET_STREAM, DEFAULT_BASE_PART_SIZE, DEFAULT_HASH_SIZE_LIMIT,
    DEFAULT_IDLE_TIMEOUT, DEFAULT_MAX_PARTS, DEFAULT_ORIGIN_TAG,
};
use serde::{Deserialize, Serialize};

/// Configuration settings for the S3 storage backend.
#[derive(Debug, Clone)]
pub struct StorageSettings {
    /// AWS region.
    pub region: String,
    /// AWS credentials (access key, secret key, session token).
    pub credentials: Option<AwsCredentials>,
    /// Expected bucket owner account id, sent with every request when set.
    pub expected_bucket_owner: Option<String>,
    /// Service limit on parts per multipart upload.
    pub max_parts: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            region: "us-west-2".into(),
            credentials: None,
            expected_bucket_owner: None,
            max_parts: DEFAULT_MAX_PARTS,
        }
    }
}

/// AWS credentials.
#[derive(Debug, Clone)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Options controlling how a transport plans and drives an upload.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Baseline part size; parts only grow past it to respect the part limit.
    pub base_part_size: u64,
    /// Abort the in-flight part after this long without read progress.
    pub idle_timeout: Duration,
    /// Files at or above this size are not hashed.
    pub hash_size_limit: u64,
    /// Origin tag that marks objects produced by this transport.
    pub origin_tag: String,
    /// Content type sent with every part body.
    pub content_type: String,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            base_part_size: DEFAULT_BASE_PART_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            hash_size_limit: DEFAULT_HASH_SIZE_LIMIT,
            origin_tag: DEFAULT_ORIGIN_TAG.to_string(),
            content_type: CONTENT_TYPE_OCTET_STREAM.to_string(),
        }
    }
}

impl TransportOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baseline part size.
    pub fn with_base_part_size(mut self, base_part_size: u64) -> Self {
        self.base_part_size = base_part_size;
        self
    }

    /// Set the idle timeout for in-flight parts.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Set the size ceiling for content hashing.
    pub fn with_hash_size_limit(mut self, hash_size_limit: u64) -> Self {
        self.hash_size_limit = hash_size_limit;
        self
    }

    /// Set the origin tag written at completion.
    pub fn with_origin_tag(mut self, origin_tag: impl Into<String>) -> Self {
        self.origin_tag = origin_tag.into();
        self
    }
}

/// Identity of one resumable upload.
#[derive(Debug, Clone)]
pub struct TransportSession {
    /// Caller-supplied correlation token, echoed in every event.
    pub id: String,
    /// Destination bucket.
    pub bucket: String,
    /// Destination object key.
    pub key: String,
    /// Source file.
    pub local_path: PathBuf,
    /// Multipart session to reuse, e.g. one persisted by a previous process.
    pub upload_id: Option<String>,
}

impl TransportSession {
    /// Create a session that will initiate its own multipart upload.
    ///
    /// # Arguments
    /// * `id` - Correlation token
    /// * `bucket` - Destination bucket
    /// * `key` - Destination object key
    /// * `local_path` - Source file
    pub fn new(
        id: impl Into<String>,
        bucket: impl Into<String>,
        key: impl Into<String>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            bucket: bucket.into(),
            key: key.into(),
            local_path: local_path.into(),
            upload_id: None,
        }
    }

    /// Reuse an existing multipart upload session.
    pub fn with_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }
}

/// One part still to be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartDescriptor {
    /// 1-based part number.
    pub part_number: u32,
    /// Byte offset within the file.
    pub offset: u64,
    /// Length of this part in bytes.
    pub length: u64,
}

/// A part the remote has already accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedPart {
    /// 1-based part number.
    pub part_number: u32,
    /// Part size in bytes.
    pub size: u64,
    /// ETag returned by the service, required to complete S3 uploads.
    pub etag: Option<String>,
}

/// Result of listing the parts of a multipart upload.
#[derive(Debug, Clone, Default)]
pub struct PartListing {
    /// Accepted parts, ordered by part number.
    pub parts: Vec<UploadedPart>,
    /// Maximum number of parts the service allows for this upload.
    pub max_parts: u32,
}

/// Local file attributes used for planning and consistency checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// Size in bytes.
    pub size: u64,
    /// Modification time in epoch milliseconds.
    pub modified_time_ms: i64,
}

/// Remote object as seen by a metadata fetch.
#[derive(Debug, Clone, Default)]
pub struct RemoteObject {
    /// Object size in bytes.
    pub size: u64,
    /// User metadata and tags attached to the object.
    pub metadata: HashMap<String, String>,
}

/// Lifecycle state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportState {
    /// Constructed, never started.
    Idle,
    /// Comparing the local file against the remote object.
    Checking,
    /// Parts are being uploaded.
    Uploading,
    /// The finalize call is in flight.
    Completing,
    Finished,
    Paused,
    Errored,
}

impl TransportState {
    /// True while a `start` or `resume` run owns the transport.
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            TransportState::Checking | TransportState::Uploading | TransportState::Completing
        )
    }
}

/// How a successful `start` or `resume` run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportOutcome {
    /// The remote object now matches the local file.
    Finished,
    /// The run stopped because `pause` was called.
    Paused,
}
