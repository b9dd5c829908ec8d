//! Local-disk `FileSource` backed by tokio file I/O.

use std::io::SeekFrom;
use std::path::Path;

use async_trait::async_trait;
use rusty_multipart_common::{system_time_to_millis, READ_BUFFER_SIZE};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::body::{PartBody, RangeObserver};
use crate::error::StorageError;
use crate::traits::FileSource;
use crate::types::FileStat;

/// Reads source files straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFileSource;

impl LocalFileSource {
    /// Create a new local file source.
    pub fn new() -> Self {
        Self
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::IoError {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}

#[async_trait]
impl FileSource for LocalFileSource {
    async fn exists(&self, path: &Path) -> bool {
        match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file(),
            Err(_) => false,
        }
    }

    async fn stat(&self, path: &Path) -> Result<FileStat, StorageError> {
        let meta: std::fs::Metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| io_error(path, e))?;
        let modified: std::time::SystemTime = meta.modified().map_err(|e| io_error(path, e))?;

        Ok(FileStat {
            size: meta.len(),
            modified_time_ms: system_time_to_millis(modified),
        })
    }

    async fn open_range(
        &self,
        path: &Path,
        offset: u64,
        length: u64,
        observer: RangeObserver,
    ) -> Result<PartBody, StorageError> {
        let mut file: File = File::open(path).await.map_err(|e| io_error(path, e))?;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| io_error(path, e))?;

        let stream = ReaderStream::with_capacity(file.take(length), READ_BUFFER_SIZE);
        Ok(observer.observe(PartBody::new(stream), length))
    }
}
