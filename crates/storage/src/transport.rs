//! Resumable multipart transport.
//!
//! A `ResumableTransport` uploads one local file to one remote object
//! through any `MultipartClient`. It checks whether the remote object is
//! already up to date, reuses an existing multipart session when it has
//! one, skips parts the remote already accepted and uploads the rest one
//! part at a time.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start--> Checking --> Uploading --> Completing --> Finished
//!                    |            |
//!                    +--pause-----+----> Paused   (any failure -> Errored)
//! ```
//!
//! `pause` cancels the token of the current run; the run classifies the
//! resulting interruption as a pause instead of a failure. Each `start` or
//! `resume` call emits at most one terminal event (`Finish`, `Pause` or
//! `Error`).
//!
//! # Example
//!
//! ```ignore
//! let session = TransportSession::new("task-1", "bucket", "videos/a.mp4", "/data/a.mp4");
//! let transport = Arc::new(ResumableTransport::new(
//!     session,
//!     client,
//!     LocalFileSource::new(),
//!     Arc::new(sink),
//! ));
//!
//! let worker = tokio::spawn({
//!     let transport = transport.clone();
//!     async move { transport.start().await }
//! });
//! transport.pause();
//! ```

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};

use tokio::sync::{mpsc, OnceCell};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::body::{PartBody, RangeObserver};
use crate::consistency::{assess, fetch_remote, hashes_match, stream_md5, Assessment};
use crate::error::{StorageError, TransportError};
use crate::events::{EventSink, TransportEvent};
use crate::metadata::IntegrityMetadata;
use crate::parts::{contiguous_prefix, plan_parts};
use crate::traits::{FileSource, MultipartClient, PartUpload};
use crate::types::{
    FileStat, PartDescriptor, PartListing, TransportOptions, TransportOutcome, TransportSession,
    TransportState, UploadedPart,
};

/// State shared between a running operation and `pause`.
struct RunState {
    state: TransportState,
    cancel: CancellationToken,
}

/// Resumable, pausable upload of one file.
pub struct ResumableTransport<C: MultipartClient + ?Sized, F: FileSource> {
    /// What to upload and where.
    session: TransportSession,
    /// Remote multipart operations.
    client: Arc<C>,
    /// Local file access.
    source: F,
    /// Receives lifecycle events.
    sink: Arc<dyn EventSink>,
    /// Planning and timeout settings.
    options: TransportOptions,
    /// True whenever no upload may proceed.
    paused: AtomicBool,
    /// Bytes committed to the remote session.
    uploaded_bytes: AtomicU64,
    /// Remote session id; write-once.
    upload_id: OnceLock<String>,
    /// MD5 of the file; `None` above the hashing ceiling.
    content_hash: OnceCell<Option<String>>,
    run: Mutex<RunState>,
}

impl<C: MultipartClient + ?Sized, F: FileSource> ResumableTransport<C, F> {
    /// Create a transport in the `Idle` state.
    ///
    /// # Arguments
    /// * `session` - Upload identity; a preset `upload_id` is reused
    /// * `client` - Storage client, shareable between transports
    /// * `source` - File source for the local file
    /// * `sink` - Receives lifecycle events
    pub fn new(
        session: TransportSession,
        client: Arc<C>,
        source: F,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        let upload_id: OnceLock<String> = OnceLock::new();
        if let Some(ref id) = session.upload_id {
            let _ = upload_id.set(id.clone());
        }

        Self {
            session,
            client,
            source,
            sink,
            options: TransportOptions::default(),
            paused: AtomicBool::new(true),
            uploaded_bytes: AtomicU64::new(0),
            upload_id,
            content_hash: OnceCell::new(),
            run: Mutex::new(RunState {
                state: TransportState::Idle,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Set transport options.
    ///
    /// # Arguments
    /// * `options` - Transport options
    pub fn with_options(mut self, options: TransportOptions) -> Self {
        self.options = options;
        self
    }

    /// The session this transport uploads.
    pub fn session(&self) -> &TransportSession {
        &self.session
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TransportState {
        self.lock_run().state
    }

    /// True whenever no upload may proceed.
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    /// Bytes committed to the remote session so far.
    pub fn uploaded_bytes(&self) -> u64 {
        self.uploaded_bytes.load(Ordering::SeqCst)
    }

    /// Remote multipart session id, once initiated or supplied.
    pub fn upload_id(&self) -> Option<&str> {
        self.upload_id.get().map(String::as_str)
    }

    /// Check the remote object and upload whatever is missing.
    ///
    /// Resolves with `Finished` when the remote object matches the local
    /// file (uploaded now or already), or `Paused` when `pause` interrupted
    /// the run. Failures are returned and also reported as an `Error` event.
    pub async fn start(&self) -> Result<TransportOutcome, TransportError> {
        let token: CancellationToken = self.begin_run(TransportState::Checking)?;
        log::debug!("Starting transport {}", self.session.id);

        let result: Result<(), TransportError> = self.run_start(&token).await;
        self.conclude(result, &token)
    }

    /// Upload `parts` into the existing multipart session, then complete it.
    ///
    /// This is the upload loop `start` uses; calling it directly skips the
    /// consistency check and the part listing.
    ///
    /// # Errors
    /// `NoUploadSession` if no session id exists yet, `Busy` if a run is
    /// in flight. Neither emits an event.
    pub async fn resume(
        &self,
        parts: Vec<PartDescriptor>,
    ) -> Result<TransportOutcome, TransportError> {
        let upload_id: String = self
            .upload_id
            .get()
            .cloned()
            .ok_or(TransportError::NoUploadSession)?;
        let token: CancellationToken = self.begin_run(TransportState::Uploading)?;

        let result: Result<(), TransportError> = self.run_resume(&upload_id, parts, &token).await;
        self.conclude(result, &token)
    }

    /// Stop the current run.
    ///
    /// An in-flight check or part upload is aborted and the run ends with a
    /// `Pause` event. On an idle transport the `Pause` event fires at once.
    ///
    /// Two remote calls are never interrupted: creating the multipart
    /// session and the finalize call of a completing run. A pause that lands
    /// while the session is being created takes effect once it exists, so
    /// the session id is kept and the next `start` reuses it.
    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);

        let mut run = self.lock_run();
        let state: TransportState = run.state;
        match state {
            TransportState::Checking | TransportState::Uploading => {
                log::debug!("Pausing transport {} in {:?}", self.session.id, state);
                run.cancel.cancel();
            }
            TransportState::Idle => {
                run.state = TransportState::Paused;
                drop(run);
                self.emit(TransportEvent::Pause {
                    session_id: self.session.id.clone(),
                });
            }
            TransportState::Completing
            | TransportState::Finished
            | TransportState::Paused
            | TransportState::Errored => {}
        }
    }

    // ------------------------------------------------------------------
    // Run orchestration
    // ------------------------------------------------------------------

    async fn run_start(&self, token: &CancellationToken) -> Result<(), TransportError> {
        let stat: FileStat = self.local_stat(token).await?;

        if self.check_consistency(&stat, token).await? {
            log::debug!(
                "Remote object s3://{}/{} is up to date, skipping upload",
                self.session.bucket,
                self.session.key
            );
            return Ok(());
        }
        checkpoint(token)?;

        let upload_id: String = self.ensure_upload_id().await?;
        checkpoint(token)?;

        let listing: PartListing = interruptible(
            token,
            self.client
                .list_uploaded_parts(&self.session.bucket, &self.session.key, &upload_id),
        )
        .await?;

        let accepted: &[UploadedPart] = contiguous_prefix(&listing.parts);
        let committed: u64 = accepted.iter().map(|p| p.size).sum();
        self.uploaded_bytes.fetch_max(committed, Ordering::SeqCst);

        let remaining: Vec<PartDescriptor> = plan_parts(
            accepted,
            listing.max_parts,
            committed,
            stat.size,
            self.options.base_part_size,
        )?;
        log::debug!(
            "Transport {}: {} parts accepted ({} bytes), {} parts to upload",
            self.session.id,
            accepted.len(),
            committed,
            remaining.len()
        );

        self.upload_and_complete(&upload_id, remaining, &stat, token)
            .await
    }

    async fn run_resume(
        &self,
        upload_id: &str,
        parts: Vec<PartDescriptor>,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        let stat: FileStat = self.local_stat(token).await?;
        self.upload_and_complete(upload_id, parts, &stat, token)
            .await
    }

    async fn upload_and_complete(
        &self,
        upload_id: &str,
        parts: Vec<PartDescriptor>,
        stat: &FileStat,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        self.emit(TransportEvent::Start {
            session_id: self.session.id.clone(),
            upload_id: upload_id.to_string(),
            local_path: self.local_path_string(),
        });

        if !parts.is_empty() {
            self.set_state(TransportState::Uploading);
            self.drive_queue(upload_id, parts, token).await?;
        }

        self.complete(upload_id, stat, token).await
    }

    /// Turn the result of a run into the terminal state and event.
    fn conclude(
        &self,
        result: Result<(), TransportError>,
        token: &CancellationToken,
    ) -> Result<TransportOutcome, TransportError> {
        self.paused.store(true, Ordering::SeqCst);

        match result {
            Ok(()) => {
                self.set_state(TransportState::Finished);
                log::debug!("Transport {} finished", self.session.id);
                self.emit(TransportEvent::Finish {
                    session_id: self.session.id.clone(),
                    local_path: self.local_path_string(),
                });
                Ok(TransportOutcome::Finished)
            }
            Err(err) if token.is_cancelled() => {
                self.set_state(TransportState::Paused);
                log::debug!("Transport {} paused ({})", self.session.id, err);
                self.emit(TransportEvent::Pause {
                    session_id: self.session.id.clone(),
                });
                Ok(TransportOutcome::Paused)
            }
            Err(err) => {
                self.set_state(TransportState::Errored);
                log::warn!("Transport {} failed: {}", self.session.id, err);
                self.emit(TransportEvent::Error {
                    session_id: self.session.id.clone(),
                    error: err.describe(),
                });
                Err(err)
            }
        }
    }

    // ------------------------------------------------------------------
    // Checking
    // ------------------------------------------------------------------

    async fn local_stat(&self, token: &CancellationToken) -> Result<FileStat, TransportError> {
        let path: &Path = &self.session.local_path;
        if !self.source.exists(path).await {
            return Err(TransportError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        interruptible(token, self.source.stat(path)).await
    }

    async fn check_consistency(
        &self,
        stat: &FileStat,
        token: &CancellationToken,
    ) -> Result<bool, TransportError> {
        let remote = interruptible(
            token,
            fetch_remote(&*self.client, &self.session.bucket, &self.session.key),
        )
        .await?;

        let assessment: Assessment = assess(
            stat,
            remote.as_ref(),
            &self.options.origin_tag,
            self.options.hash_size_limit,
        );

        match assessment {
            Assessment::Consistent => Ok(true),
            Assessment::Inconsistent => Ok(false),
            Assessment::NeedsHash { expected } => {
                let local: Option<String> = self.content_hash(stat, token).await?;
                Ok(local.is_some_and(|h| hashes_match(&expected, &h)))
            }
        }
    }

    /// MD5 of the local file, computed at most once per transport.
    async fn content_hash(
        &self,
        stat: &FileStat,
        token: &CancellationToken,
    ) -> Result<Option<String>, TransportError> {
        let hash: &Option<String> = self
            .content_hash
            .get_or_try_init(|| async move {
                if stat.size >= self.options.hash_size_limit {
                    return Ok(None);
                }
                stream_md5(&self.source, &self.session.local_path, stat.size, token.clone())
                    .await
                    .map(Some)
            })
            .await?;
        Ok(hash.clone())
    }

    /// Runs to completion even when paused, so a created session id is
    /// never dropped.
    async fn ensure_upload_id(&self) -> Result<String, TransportError> {
        if let Some(id) = self.upload_id.get() {
            return Ok(id.clone());
        }

        let id: String = self
            .client
            .initiate_multipart_upload(&self.session.bucket, &self.session.key)
            .await?;
        log::debug!(
            "Initiated multipart upload {} for s3://{}/{}",
            id,
            self.session.bucket,
            self.session.key
        );
        Ok(self.upload_id.get_or_init(|| id).clone())
    }

    // ------------------------------------------------------------------
    // Uploading
    // ------------------------------------------------------------------

    /// Upload parts strictly one after another; the first failure stops
    /// the queue.
    async fn drive_queue(
        &self,
        upload_id: &str,
        parts: Vec<PartDescriptor>,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        for part in parts {
            checkpoint(token)?;
            let etag: Option<String> = self.upload_part(upload_id, &part, token).await?;
            self.uploaded_bytes.fetch_add(part.length, Ordering::SeqCst);
            log::debug!(
                "Transport {}: part {} accepted ({} bytes, etag {:?})",
                self.session.id,
                part.part_number,
                part.length,
                etag
            );
        }
        Ok(())
    }

    /// Stream one part, aborting it on pause or when read progress stalls.
    async fn upload_part(
        &self,
        upload_id: &str,
        part: &PartDescriptor,
        token: &CancellationToken,
    ) -> Result<Option<String>, TransportError> {
        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<u64>();
        let observer: RangeObserver = RangeObserver::new(progress_tx, token.clone());
        let body: PartBody = interruptible(
            token,
            self.source.open_range(
                &self.session.local_path,
                part.offset,
                part.length,
                observer,
            ),
        )
        .await?;

        let request: PartUpload = PartUpload {
            upload_id: upload_id.to_string(),
            part_number: part.part_number,
            content_length: part.length,
            content_type: self.options.content_type.clone(),
            body,
        };

        let committed: u64 = self.uploaded_bytes();
        let started: Instant = Instant::now();
        let idle_timeout = self.options.idle_timeout;

        let put = self
            .client
            .put_part(&self.session.bucket, &self.session.key, request);
        tokio::pin!(put);
        let idle = tokio::time::sleep(idle_timeout);
        tokio::pin!(idle);

        loop {
            tokio::select! {
                result = &mut put => {
                    return result.map_err(TransportError::from);
                }
                _ = token.cancelled() => {
                    return Err(StorageError::Cancelled.into());
                }
                Some(bytes_read) = progress_rx.recv() => {
                    idle.as_mut().reset(Instant::now() + idle_timeout);
                    self.emit_progress(committed + bytes_read, bytes_read, started);
                }
                _ = &mut idle => {
                    log::warn!(
                        "Transport {}: part {} stalled for {:?}, aborting",
                        self.session.id,
                        part.part_number,
                        idle_timeout
                    );
                    return Err(TransportError::StallAbort {
                        idle: idle_timeout,
                    });
                }
            }
        }
    }

    fn emit_progress(&self, bytes_written: u64, part_bytes: u64, started: Instant) {
        let elapsed: f64 = started.elapsed().as_secs_f64();
        let rate: f64 = if elapsed > 0.0 {
            part_bytes as f64 / elapsed
        } else {
            0.0
        };
        self.emit(TransportEvent::Progress {
            session_id: self.session.id.clone(),
            rate,
            bytes_written,
        });
    }

    // ------------------------------------------------------------------
    // Completing
    // ------------------------------------------------------------------

    async fn complete(
        &self,
        upload_id: &str,
        stat: &FileStat,
        token: &CancellationToken,
    ) -> Result<(), TransportError> {
        let md5: Option<String> = self.content_hash(stat, token).await?;
        let listing: PartListing = interruptible(
            token,
            self.client
                .list_uploaded_parts(&self.session.bucket, &self.session.key, upload_id),
        )
        .await?;
        checkpoint(token)?;

        let parts: &[UploadedPart] = contiguous_prefix(&listing.parts);
        let covered: u64 = parts.iter().map(|p| p.size).sum();
        if covered != stat.size {
            return Err(StorageError::Other {
                message: format!(
                    "Remote parts cover {} bytes of {} for {}",
                    covered,
                    stat.size,
                    self.session.local_path.display()
                ),
            }
            .into());
        }

        self.set_state(TransportState::Completing);
        let metadata = IntegrityMetadata::new(
            self.options.origin_tag.clone(),
            stat.modified_time_ms,
            md5,
        )
        .to_headers();

        self.client
            .complete_multipart_upload(
                &self.session.bucket,
                &self.session.key,
                upload_id,
                parts,
                &metadata,
            )
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn lock_run(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Claim the transport for a new run with a fresh cancellation token.
    fn begin_run(&self, state: TransportState) -> Result<CancellationToken, TransportError> {
        let mut run = self.lock_run();
        if run.state.is_running() {
            return Err(TransportError::Busy);
        }
        run.state = state;
        run.cancel = CancellationToken::new();
        self.paused.store(false, Ordering::SeqCst);
        Ok(run.cancel.clone())
    }

    fn set_state(&self, state: TransportState) {
        self.lock_run().state = state;
    }

    fn emit(&self, event: TransportEvent) {
        self.sink.on_event(&event);
    }

    fn local_path_string(&self) -> String {
        self.session.local_path.display().to_string()
    }
}

/// Fail with `Cancelled` once the run has been paused.
fn checkpoint(token: &CancellationToken) -> Result<(), TransportError> {
    if token.is_cancelled() {
        return Err(StorageError::Cancelled.into());
    }
    Ok(())
}

/// Await `fut` unless the run is paused first.
async fn interruptible<T, Fut>(token: &CancellationToken, fut: Fut) -> Result<T, TransportError>
where
    Fut: Future<Output = Result<T, StorageError>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(StorageError::Cancelled.into()),
        result = fut => result.map_err(TransportError::from),
    }
}
