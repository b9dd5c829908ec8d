//! Resumable multipart upload transport.
//!
//! This crate uploads a local file into an object store through the
//! store's multipart-upload protocol, in a way that survives pauses,
//! process restarts and stalled connections:
//!
//! - **Consistency check** - Skips the upload when the remote object already
//!   matches the local file (size, then MD5 or modification time)
//! - **Resume** - Reuses an existing multipart session and uploads only the
//!   parts the remote has not accepted yet
//! - **Pause** - Aborts the in-flight part promptly via a cancellation token
//! - **Stall detection** - Aborts a part whose read progress stops for the
//!   idle timeout
//!
//! The storage backend and the local file system are reached through the
//! `MultipartClient` and `FileSource` traits, so the transport logic is
//! independent of any SDK.

mod body;
mod consistency;
mod error;
mod events;
mod file_source;
mod metadata;
mod parts;
mod traits;
mod transport;
mod types;

pub use body::{PartBody, RangeObserver};
pub use consistency::{assess, fetch_remote, hashes_match, stream_md5, Assessment};
pub use error::{StorageError, TransportError};
pub use events::{sink_fn, ChannelSink, EventSink, FnSink, NoOpSink, TransportEvent};
pub use file_source::LocalFileSource;
pub use metadata::{
    IntegrityMetadata, METADATA_KEY_CONTENT_MD5, METADATA_KEY_MODIFIED_TIME, METADATA_KEY_ORIGIN,
};
pub use parts::{contiguous_prefix, effective_part_size, plan_parts};
pub use traits::{FileSource, MultipartClient, PartUpload};
pub use transport::ResumableTransport;
pub use types::{
    AwsCredentials, FileStat, PartDescriptor, PartListing, RemoteObject, StorageSettings,
    TransportOptions, TransportOutcome, TransportSession, TransportState, UploadedPart,
};
