//! AWS SDK S3 backend for the rusty-multipart transport.
//!
//! This crate provides a `MultipartClient` implementation using the AWS SDK
//! for Rust. Part bodies are streamed straight from the transport into
//! `UploadPart` requests, so a paused or stalled part is aborted without
//! buffering it in memory.
//!
//! S3 cannot attach user metadata when a multipart upload completes, so the
//! integrity metadata is written as object tags right after completion and
//! read back from the tags by `head_object_metadata`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use rusty_multipart_storage::{
//!     LocalFileSource, NoOpSink, ResumableTransport, StorageSettings, TransportSession,
//! };
//! use rusty_multipart_storage_crt::CrtStorageClient;
//!
//! let client = Arc::new(CrtStorageClient::new(StorageSettings::default()).await?);
//! let session = TransportSession::new("task-1", "my-bucket", "videos/a.mp4", "/data/a.mp4");
//! let transport =
//!     ResumableTransport::new(session, client, LocalFileSource::new(), Arc::new(NoOpSink));
//! transport.start().await?;
//! ```

mod client;
mod error;

pub use client::CrtStorageClient;
pub use error::CrtError;
