//! Shared constants used across rusty-multipart crates.

use std::time::Duration;

/// One mebibyte.
pub const MIB: u64 = 1024 * 1024;

/// One gibibyte.
pub const GIB: u64 = 1024 * MIB;

/// Baseline part size for multipart uploads (20MB).
/// Parts only grow beyond this when the part-count limit requires it.
pub const DEFAULT_BASE_PART_SIZE: u64 = 20 * MIB;

/// Files at or above this size are not hashed (4GB).
/// Consistency checks fall back to modification time for them.
pub const DEFAULT_HASH_SIZE_LIMIT: u64 = 4 * GIB;

/// Abort an in-flight part when no read progress arrives for this long.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// S3 limit on the number of parts in one multipart upload.
pub const DEFAULT_MAX_PARTS: u32 = 10_000;

/// Origin tag written on objects produced by this transport.
pub const DEFAULT_ORIGIN_TAG: &str = "rusty-multipart";

/// Content type sent with every part body.
pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";

/// Read buffer size for hashing and range streams (64KB).
pub const READ_BUFFER_SIZE: usize = 64 * 1024;
