//! Part bodies: bounded byte streams with progress reporting and abort.

use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

type BoxedByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send + Sync>>;

/// Byte stream sent as the body of one part upload.
pub struct PartBody {
    inner: BoxedByteStream,
}

impl PartBody {
    /// Wrap any `Send + Sync` byte stream.
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = io::Result<Bytes>> + Send + Sync + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Body made of a single in-memory chunk.
    pub fn from_bytes(data: Bytes) -> Self {
        Self::new(stream::iter(vec![Ok(data)]))
    }

    /// Drain the body into one contiguous buffer.
    pub async fn collect_bytes(mut self) -> io::Result<Bytes> {
        let mut buffer: BytesMut = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buffer.extend_from_slice(&chunk?);
        }
        Ok(buffer.freeze())
    }
}

impl Stream for PartBody {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for PartBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartBody").finish_non_exhaustive()
    }
}

/// Progress and abort wiring handed to `FileSource::open_range`.
///
/// The observed stream sends the cumulative number of bytes read after
/// every chunk and fails with `ErrorKind::Interrupted` once the token
/// is cancelled.
#[derive(Debug, Clone)]
pub struct RangeObserver {
    progress: Option<mpsc::UnboundedSender<u64>>,
    cancel: CancellationToken,
}

impl RangeObserver {
    /// Observer that reports progress into `progress` and aborts on `cancel`.
    pub fn new(progress: mpsc::UnboundedSender<u64>, cancel: CancellationToken) -> Self {
        Self {
            progress: Some(progress),
            cancel,
        }
    }

    /// Observer that only honors cancellation.
    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            progress: None,
            cancel,
        }
    }

    /// Observer with no progress channel and a token nobody cancels.
    pub fn unobserved() -> Self {
        Self::with_cancel(CancellationToken::new())
    }

    /// The abort signal for this range.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wrap `body` so it reports progress, honors the abort signal and
    /// fails if it ends before `expected_len` bytes.
    pub fn observe(self, body: PartBody, expected_len: u64) -> PartBody {
        PartBody::new(ObservedStream {
            inner: body,
            observer: self,
            bytes_read: 0,
            expected_len,
            done: false,
        })
    }
}

struct ObservedStream {
    inner: PartBody,
    observer: RangeObserver,
    bytes_read: u64,
    expected_len: u64,
    done: bool,
}

impl ObservedStream {
    fn fail(&mut self, err: io::Error) -> Poll<Option<io::Result<Bytes>>> {
        self.done = true;
        Poll::Ready(Some(Err(err)))
    }
}

impl Stream for ObservedStream {
    type Item = io::Result<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this: &mut ObservedStream = self.as_mut().get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.observer.cancel.is_cancelled() {
            return this.fail(io::Error::new(
                io::ErrorKind::Interrupted,
                "range read aborted",
            ));
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                this.bytes_read += chunk.len() as u64;
                if this.bytes_read > this.expected_len {
                    return this.fail(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!(
                            "range produced {} bytes, expected {}",
                            this.bytes_read, this.expected_len
                        ),
                    ));
                }
                if let Some(ref progress) = this.observer.progress {
                    // The receiver goes away once the driver stops listening.
                    let _ = progress.send(this.bytes_read);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(err))) => this.fail(err),
            Poll::Ready(None) => {
                if this.bytes_read < this.expected_len {
                    return this.fail(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!(
                            "range ended after {} bytes, expected {}",
                            this.bytes_read, this.expected_len
                        ),
                    ));
                }
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunked(chunks: &[&'static [u8]]) -> PartBody {
        let items: Vec<io::Result<Bytes>> = chunks
            .iter()
            .map(|c| Ok(Bytes::from_static(c)))
            .collect();
        PartBody::new(stream::iter(items))
    }

    #[tokio::test]
    async fn test_progress_is_cumulative() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let observer = RangeObserver::new(tx, CancellationToken::new());
        let body: PartBody = observer.observe(chunked(&[b"abc", b"de", b"fghi"]), 9);

        let data: Bytes = body.collect_bytes().await.unwrap();
        assert_eq!(&data[..], b"abcdefghi");

        let mut ticks: Vec<u64> = Vec::new();
        while let Ok(tick) = rx.try_recv() {
            ticks.push(tick);
        }
        assert_eq!(ticks, vec![3, 5, 9]);
    }

    #[tokio::test]
    async fn test_cancelled_stream_is_interrupted() {
        let token = CancellationToken::new();
        let observer = RangeObserver::with_cancel(token.clone());
        let mut body: PartBody = observer.observe(chunked(&[b"abc", b"def"]), 6);

        let first: Bytes = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"abc");

        token.cancel();
        let err: io::Error = body.next().await.unwrap().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert!(body.next().await.is_none());
    }

    #[tokio::test]
    async fn test_short_range_fails() {
        let body: PartBody = RangeObserver::unobserved().observe(chunked(&[b"abc"]), 5);
        let err: io::Error = body.collect_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_long_range_fails() {
        let body: PartBody = RangeObserver::unobserved().observe(chunked(&[b"abcdef"]), 4);
        let err: io::Error = body.collect_bytes().await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_dropped_receiver_does_not_fail() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let observer = RangeObserver::new(tx, CancellationToken::new());
        let body: PartBody = observer.observe(PartBody::from_bytes(Bytes::from_static(b"xy")), 2);
        assert_eq!(&body.collect_bytes().await.unwrap()[..], b"xy");
    }
}
