//! Integrity metadata attached to completed uploads.
//!
//! Objects produced by the transport carry three metadata entries that
//! later consistency checks read back:
//!
//! | Key                | Value                                |
//! |--------------------|--------------------------------------|
//! | `upload-origin`    | origin tag of the producing transport |
//! | `modified-time-ms` | local mtime in epoch milliseconds    |
//! | `content-md5`      | lowercase hex MD5 (small files only) |

use std::collections::HashMap;

/// Metadata key for the origin tag.
pub const METADATA_KEY_ORIGIN: &str = "upload-origin";

/// Metadata key for the source modification time.
pub const METADATA_KEY_MODIFIED_TIME: &str = "modified-time-ms";

/// Metadata key for the content hash.
pub const METADATA_KEY_CONTENT_MD5: &str = "content-md5";

/// Integrity metadata written at completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IntegrityMetadata {
    /// Origin tag, if present.
    pub origin: Option<String>,
    /// Source modification time in epoch milliseconds.
    pub modified_time_ms: Option<i64>,
    /// Lowercase hex MD5 of the content.
    pub md5: Option<String>,
}

impl IntegrityMetadata {
    /// Metadata for an object produced by this transport.
    ///
    /// # Arguments
    /// * `origin` - Origin tag
    /// * `modified_time_ms` - Local modification time
    /// * `md5` - Content hash, when the file was small enough to hash
    pub fn new(origin: impl Into<String>, modified_time_ms: i64, md5: Option<String>) -> Self {
        Self {
            origin: Some(origin.into()),
            modified_time_ms: Some(modified_time_ms),
            md5,
        }
    }

    /// Build the metadata map sent with the completion call.
    pub fn to_headers(&self) -> HashMap<String, String> {
        let mut headers: HashMap<String, String> = HashMap::new();

        if let Some(ref origin) = self.origin {
            headers.insert(METADATA_KEY_ORIGIN.to_string(), origin.clone());
        }
        if let Some(mtime) = self.modified_time_ms {
            headers.insert(METADATA_KEY_MODIFIED_TIME.to_string(), mtime.to_string());
        }
        if let Some(ref md5) = self.md5 {
            headers.insert(METADATA_KEY_CONTENT_MD5.to_string(), md5.clone());
        }

        headers
    }

    /// Parse metadata read back from the remote object.
    ///
    /// Keys are matched case-insensitively; an unparseable modification
    /// time or an empty hash is treated as absent.
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        let lookup = |wanted: &str| -> Option<&String> {
            headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(wanted))
                .map(|(_, v)| v)
        };

        Self {
            origin: lookup(METADATA_KEY_ORIGIN).cloned(),
            modified_time_ms: lookup(METADATA_KEY_MODIFIED_TIME)
                .and_then(|v| v.trim().parse::<i64>().ok()),
            md5: lookup(METADATA_KEY_CONTENT_MD5)
                .map(|v| v.trim().to_ascii_lowercase())
                .filter(|v| !v.is_empty()),
        }
    }

    /// Check whether the object was produced by a transport using `origin_tag`.
    pub fn has_origin(&self, origin_tag: &str) -> bool {
        self.origin.as_deref() == Some(origin_tag)
    }
}
