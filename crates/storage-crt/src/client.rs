//! AWS SDK S3 client implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, Tag, Tagging};
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;

use rusty_multipart_common::CONTENT_TYPE_OCTET_STREAM;
use rusty_multipart_storage::{
    MultipartClient, PartListing, PartUpload, RemoteObject, StorageError, StorageSettings,
    UploadedPart,
};

use crate::error::{from_sdk_error, CrtError};

/// MultipartClient implementation using AWS SDK for Rust.
///
/// Parts are streamed with an exact `Content-Length`; the SDK's own retry
/// and connection pooling apply to every request.
pub struct CrtStorageClient {
    /// The underlying S3 client.
    s3_client: S3Client,
    /// Expected bucket owner for security validation.
    expected_bucket_owner: Option<String>,
    /// Part limit reported with every listing.
    max_parts: u32,
}

impl CrtStorageClient {
    /// Create a new S3 storage client with default credential chain.
    ///
    /// # Arguments
    /// * `settings` - Storage settings including region and optional credentials
    ///
    /// # Returns
    /// A new S3 storage client.
    pub async fn new(settings: StorageSettings) -> Result<Self, StorageError> {
        if settings.max_parts == 0 {
            return Err(CrtError::ConfigError("max_parts must be positive".into()).into());
        }

        let config_loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new(settings.region.clone()));

        let config_loader = if let Some(ref creds) = settings.credentials {
            let credentials = Credentials::new(
                &creds.access_key_id,
                &creds.secret_access_key,
                creds.session_token.clone(),
                None,
                "rusty-multipart",
            );
            config_loader.credentials_provider(credentials)
        } else {
            config_loader
        };

        let sdk_config = config_loader.load().await;
        let s3_client = S3Client::new(&sdk_config);

        Ok(Self {
            s3_client,
            expected_bucket_owner: settings.expected_bucket_owner,
            max_parts: settings.max_parts,
        })
    }

    /// Fetch the object's tags as a key/value map.
    async fn object_tags(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<HashMap<String, String>, StorageError> {
        let mut request = self.s3_client.get_object_tagging().bucket(bucket).key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(output
            .tag_set()
            .iter()
            .map(|tag| (tag.key().to_string(), tag.value().to_string()))
            .collect())
    }
}

/// Build the ordered part list for `CompleteMultipartUpload`.
fn completed_upload(parts: &[UploadedPart]) -> CompletedMultipartUpload {
    let completed: Vec<CompletedPart> = parts
        .iter()
        .map(|part| {
            CompletedPart::builder()
                .part_number(part.part_number as i32)
                .set_e_tag(part.etag.clone())
                .build()
        })
        .collect();

    CompletedMultipartUpload::builder()
        .set_parts(Some(completed))
        .build()
}

/// Convert metadata entries into an S3 tag set, sorted by key.
fn tag_set(metadata: &HashMap<String, String>) -> Result<Tagging, CrtError> {
    let mut entries: Vec<(&String, &String)> = metadata.iter().collect();
    entries.sort();

    let tags: Vec<Tag> = entries
        .into_iter()
        .map(|(k, v)| {
            Tag::builder()
                .key(k)
                .value(v)
                .build()
                .map_err(|e| CrtError::ConfigError(format!("invalid tag {}: {}", k, e)))
        })
        .collect::<Result<_, _>>()?;

    Tagging::builder()
        .set_tag_set(Some(tags))
        .build()
        .map_err(|e| CrtError::ConfigError(format!("invalid tag set: {}", e)))
}

/// Merge user metadata with tags; tags win on conflicting keys.
fn merge_metadata(
    user_metadata: Option<&HashMap<String, String>>,
    tags: HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged: HashMap<String, String> = user_metadata.cloned().unwrap_or_default();
    merged.extend(tags);
    merged
}

#[async_trait]
impl MultipartClient for CrtStorageClient {
    async fn initiate_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<String, StorageError> {
        let mut request = self
            .s3_client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(CONTENT_TYPE_OCTET_STREAM);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        let upload_id: String = output
            .upload_id()
            .map(str::to_string)
            .ok_or(CrtError::MalformedResponse {
                operation: "CreateMultipartUpload",
                message: "missing upload id".into(),
            })?;

        Ok(upload_id)
    }

    async fn list_uploaded_parts(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
    ) -> Result<PartListing, StorageError> {
        let mut parts: Vec<UploadedPart> = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_parts()
                .bucket(bucket)
                .key(key)
                .upload_id(upload_id);

            if let Some(ref owner) = self.expected_bucket_owner {
                request = request.expected_bucket_owner(owner);
            }

            if let Some(ref m) = marker {
                request = request.part_number_marker(m);
            }

            let response = request
                .send()
                .await
                .map_err(|err| from_sdk_error(err, bucket, key))?;

            for part in response.parts() {
                let (Some(number), Some(size)) = (part.part_number(), part.size()) else {
                    log::warn!("Skipping incomplete part entry for upload {}", upload_id);
                    continue;
                };
                parts.push(UploadedPart {
                    part_number: number as u32,
                    size: size as u64,
                    etag: part.e_tag().map(str::to_string),
                });
            }

            marker = match response.is_truncated() {
                Some(true) => response.next_part_number_marker().map(str::to_string),
                _ => None,
            };
            if marker.is_none() {
                break;
            }
        }

        parts.sort_by_key(|p| p.part_number);

        Ok(PartListing {
            parts,
            max_parts: self.max_parts,
        })
    }

    async fn put_part(
        &self,
        bucket: &str,
        key: &str,
        part: PartUpload,
    ) -> Result<Option<String>, StorageError> {
        // UploadPart carries no content type; the object's comes from initiate.
        log::trace!(
            "Uploading part {} ({} bytes, {}) of {}",
            part.part_number,
            part.content_length,
            part.content_type,
            part.upload_id
        );

        let frames = part.body.map_ok(Frame::<Bytes>::data);
        let body: ByteStream = ByteStream::from_body_1_x(StreamBody::new(frames));

        let mut request = self
            .s3_client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(&part.upload_id)
            .part_number(part.part_number as i32)
            .content_length(part.content_length as i64)
            .body(body);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(output.e_tag().map(str::to_string))
    }

    async fn complete_multipart_upload(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[UploadedPart],
        metadata: &HashMap<String, String>,
    ) -> Result<(), StorageError> {
        let mut request = self
            .s3_client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed_upload(parts));

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        if metadata.is_empty() {
            return Ok(());
        }

        let mut tagging_request = self
            .s3_client
            .put_object_tagging()
            .bucket(bucket)
            .key(key)
            .tagging(tag_set(metadata)?);

        if let Some(ref owner) = self.expected_bucket_owner {
            tagging_request = tagging_request.expected_bucket_owner(owner);
        }

        tagging_request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        Ok(())
    }

    async fn head_object_metadata(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<RemoteObject, StorageError> {
        let mut request = self.s3_client.head_object().bucket(bucket).key(key);

        if let Some(ref owner) = self.expected_bucket_owner {
            request = request.expected_bucket_owner(owner);
        }

        let output = request
            .send()
            .await
            .map_err(|err| from_sdk_error(err, bucket, key))?;

        let tags: HashMap<String, String> = self.object_tags(bucket, key).await?;

        Ok(RemoteObject {
            size: output.content_length().map(|l| l as u64).unwrap_or(0),
            metadata: merge_metadata(output.metadata(), tags),
        })
    }
}
