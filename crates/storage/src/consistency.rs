//! Local/remote consistency checks.
//!
//! Decides whether the remote object already faithfully represents the
//! local file so the upload can be skipped:
//!
//! 1. Missing remote object: upload.
//! 2. Size differs: upload.
//! 3. Object produced by this transport: compare MD5 when the remote
//!    carries one and the local file is below the hashing ceiling,
//!    otherwise compare modification times.
//! 4. Foreign object with matching size: trusted as is.

use std::path::Path;

use futures::StreamExt;
use rusty_multipart_common::Md5Hasher;
use tokio_util::sync::CancellationToken;

use crate::body::{PartBody, RangeObserver};
use crate::error::StorageError;
use crate::metadata::IntegrityMetadata;
use crate::traits::{FileSource, MultipartClient};
use crate::types::{FileStat, RemoteObject};

/// Outcome of comparing local file attributes with the remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assessment {
    /// Remote object matches, no upload needed.
    Consistent,
    /// Remote object is missing or differs.
    Inconsistent,
    /// Decision depends on the local content hash matching `expected`.
    NeedsHash { expected: String },
}

/// Compare a local file with the remote object without touching file content.
///
/// # Arguments
/// * `local` - Local size and modification time
/// * `remote` - Remote object, `None` if it does not exist
/// * `origin_tag` - Origin tag of this transport
/// * `hash_size_limit` - Files at or above this size are never hashed
pub fn assess(
    local: &FileStat,
    remote: Option<&RemoteObject>,
    origin_tag: &str,
    hash_size_limit: u64,
) -> Assessment {
    let remote: &RemoteObject = match remote {
        Some(remote) => remote,
        None => return Assessment::Inconsistent,
    };

    if remote.size != local.size {
        return Assessment::Inconsistent;
    }

    let meta: IntegrityMetadata = IntegrityMetadata::from_headers(&remote.metadata);
    if !meta.has_origin(origin_tag) {
        return Assessment::Consistent;
    }

    match meta.md5 {
        Some(expected) if local.size < hash_size_limit => Assessment::NeedsHash { expected },
        _ => {
            if meta.modified_time_ms == Some(local.modified_time_ms) {
                Assessment::Consistent
            } else {
                Assessment::Inconsistent
            }
        }
    }
}

/// Compare two hex digests, ignoring case.
pub fn hashes_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

/// Fetch remote object metadata, mapping "not found" to `None`.
///
/// Any other failure is returned unchanged.
pub async fn fetch_remote<C: MultipartClient + ?Sized>(
    client: &C,
    bucket: &str,
    key: &str,
) -> Result<Option<RemoteObject>, StorageError> {
    match client.head_object_metadata(bucket, key).await {
        Ok(remote) => Ok(Some(remote)),
        Err(err) if err.is_not_found() => {
            log::debug!("No remote object at s3://{}/{}, upload required", bucket, key);
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Stream a file through MD5.
///
/// # Arguments
/// * `source` - File source to read from
/// * `path` - File to hash
/// * `size` - File size in bytes
/// * `cancel` - Aborts the read when cancelled
///
/// # Returns
/// 32-character lowercase hex digest.
pub async fn stream_md5<F: FileSource + ?Sized>(
    source: &F,
    path: &Path,
    size: u64,
    cancel: CancellationToken,
) -> Result<String, StorageError> {
    let mut body: PartBody = source
        .open_range(path, 0, size, RangeObserver::with_cancel(cancel))
        .await?;
    let mut hasher: Md5Hasher = Md5Hasher::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| StorageError::IoError {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        hasher.update(&chunk);
    }

    Ok(hasher.finish_hex())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use rusty_multipart_common::GIB;

    use crate::metadata::{
        METADATA_KEY_CONTENT_MD5, METADATA_KEY_MODIFIED_TIME, METADATA_KEY_ORIGIN,
    };

    const ORIGIN: &str = "rusty-multipart";

    fn local(size: u64, mtime: i64) -> FileStat {
        FileStat {
            size,
            modified_time_ms: mtime,
        }
    }

    fn remote(size: u64, entries: &[(&str, &str)]) -> RemoteObject {
        let metadata: HashMap<String, String> = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        RemoteObject { size, metadata }
    }

    #[test]
    fn test_missing_remote_is_inconsistent() {
        assert_eq!(
            assess(&local(10, 1), None, ORIGIN, 4 * GIB),
            Assessment::Inconsistent
        );
    }

    #[test]
    fn test_size_mismatch_is_inconsistent() {
        let obj = remote(
            11,
            &[(METADATA_KEY_ORIGIN, ORIGIN), (METADATA_KEY_MODIFIED_TIME, "1")],
        );
        assert_eq!(
            assess(&local(10, 1), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::Inconsistent
        );
    }

    #[test]
    fn test_foreign_object_trusts_size() {
        let obj = remote(10, &[(METADATA_KEY_MODIFIED_TIME, "999")]);
        assert_eq!(
            assess(&local(10, 1), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::Consistent
        );

        let other_origin = remote(10, &[(METADATA_KEY_ORIGIN, "someone-else")]);
        assert_eq!(
            assess(&local(10, 1), Some(&other_origin), ORIGIN, 4 * GIB),
            Assessment::Consistent
        );
    }

    #[test]
    fn test_own_object_with_hash_needs_hash() {
        let obj = remote(
            10,
            &[
                (METADATA_KEY_ORIGIN, ORIGIN),
                (METADATA_KEY_CONTENT_MD5, "ABC123"),
                (METADATA_KEY_MODIFIED_TIME, "5"),
            ],
        );
        assert_eq!(
            assess(&local(10, 1), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::NeedsHash {
                expected: "abc123".into()
            }
        );
    }

    #[test]
    fn test_own_object_mtime_comparison() {
        let obj = remote(
            10,
            &[(METADATA_KEY_ORIGIN, ORIGIN), (METADATA_KEY_MODIFIED_TIME, "1700")],
        );
        assert_eq!(
            assess(&local(10, 1700), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::Consistent
        );
        assert_eq!(
            assess(&local(10, 1701), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::Inconsistent
        );
    }

    #[test]
    fn test_own_object_without_mtime_is_inconsistent() {
        let obj = remote(10, &[(METADATA_KEY_ORIGIN, ORIGIN)]);
        assert_eq!(
            assess(&local(10, 1700), Some(&obj), ORIGIN, 4 * GIB),
            Assessment::Inconsistent
        );
    }

    #[test]
    fn test_large_file_skips_hash_and_uses_mtime() {
        let obj = remote(
            10,
            &[
                (METADATA_KEY_ORIGIN, ORIGIN),
                (METADATA_KEY_CONTENT_MD5, "abc"),
                (METADATA_KEY_MODIFIED_TIME, "7"),
            ],
        );
        // Ceiling is exclusive: a file exactly at the limit is not hashed.
        assert_eq!(assess(&local(10, 7), Some(&obj), ORIGIN, 10), Assessment::Consistent);
        assert_eq!(
            assess(&local(10, 8), Some(&obj), ORIGIN, 10),
            Assessment::Inconsistent
        );
    }

    #[test]
    fn test_hashes_match_ignores_case() {
        assert!(hashes_match("ABCDEF", "abcdef"));
        assert!(!hashes_match("abcdef", "abcdee"));
    }
}
