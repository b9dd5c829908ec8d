//! Collaborator traits for multipart transport.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::body::{PartBody, RangeObserver};
use crate::error::StorageError;
use crate::types::{FileStat, PartListing, RemoteObject, UploadedPart};

/// Request to upload a single part of a multipart session.
#[derive(Debug)]
pub struct PartUpload {
    /// Multipart session the part belongs to.
    pub upload_id: String,
    /// 1-based part number.
    pub part_number: u32,
    /// Exact body length, sent as `Content-Length`.
    pub content_length: u64,
    /// Sent as `Content-Type`.
    pub content_type: String,
    /// The part bytes.
    pub body: PartBody,
}

/// Remote multipart operations - implemented by each backend.
#[async_trait]
pub trait MultipartClient: Send + Sync {
    /// Start a multipart upload and return its session id.
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, StorageError>;

    /// List the parts already accepted for a session, ordered by part number.
    async fn list_uploaded_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<PartListing, StorageError>;

    /// Upload one part. Returns the part ETag when the service provides one.
    async fn put_part(
        &self,
        bucket: &str,
        key: &str,
        part: PartUpload,
    ) -> Result<Option<String>, StorageError>;

    /// Finish a session from its ordered parts and attach `metadata` to the object.
    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError>;

    /// Fetch object size and metadata.
    /// Returns `StorageError::NotFound` if the object doesn't exist.
    async fn head_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<RemoteObject, StorageError>;
}

/// Local file access used by the transport.
#[async_trait]
pub trait FileSource: Send + Sync {
    /// Check whether a file exists at `path`.
    async fn exists(&self, path: &Path) -> bool;

    /// Size and modification time of the file.
    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError>;

    /// Open `length` bytes starting at `offset` as a stream.
    ///
    /// The returned body must be wrapped with `observer.observe(..)` so it
    /// reports progress and honors the abort signal.
    async fn open_range(
        &self,
        path: &Path,
        offset: u64,
        length: u64,
        observer: RangeObserver,
    ) -> Result<PartBody, StorageError>;
}
