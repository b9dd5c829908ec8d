//! Lifecycle events and the sinks that receive them.

use serde::Serialize;
use tokio::sync::mpsc;

/// Notification emitted by a transport. Every variant carries the
/// caller-supplied session id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportEvent {
    /// Upload phase began.
    Start {
        session_id: String,
        upload_id: String,
        local_path: String,
    },
    /// Bytes read for upload so far, including already committed parts.
    Progress {
        session_id: String,
        /// Bytes per second over the current part.
        rate: f64,
        bytes_written: u64,
    },
    Pause {
        session_id: String,
    },
    Finish {
        session_id: String,
        local_path: String,
    },
    Error {
        session_id: String,
        error: String,
    },
}

impl TransportEvent {
    /// Session id the event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            TransportEvent::Start { session_id, .. }
            | TransportEvent::Progress { session_id, .. }
            | TransportEvent::Pause { session_id }
            | TransportEvent::Finish { session_id, .. }
            | TransportEvent::Error { session_id, .. } => session_id,
        }
    }

    /// True for `Finish`, `Pause` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransportEvent::Pause { .. }
                | TransportEvent::Finish { .. }
                | TransportEvent::Error { .. }
        )
    }
}

/// Receiver of transport events.
///
/// Called inline from the transport task, so implementations should
/// return quickly.
pub trait EventSink: Send + Sync {
    /// Called for every event.
    fn on_event(&self, event: &TransportEvent);
}

/// A sink that discards every event.
pub struct NoOpSink;

impl EventSink for NoOpSink {
    fn on_event(&self, _event: &TransportEvent) {}
}

/// A sink that wraps a closure.
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(&TransportEvent) + Send + Sync,
{
    /// Create a new closure-based sink.
    ///
    /// # Arguments
    /// * `callback` - Closure that receives each event
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> EventSink for FnSink<F>
where
    F: Fn(&TransportEvent) + Send + Sync,
{
    fn on_event(&self, event: &TransportEvent) {
        (self.callback)(event)
    }
}

/// Create a sink from a closure.
///
/// # Arguments
/// * `f` - Closure that receives each event
pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: Fn(&TransportEvent) + Send + Sync,
{
    FnSink::new(f)
}

/// A sink that forwards events into an unbounded tokio channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<TransportEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiver that subscribes to it.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn on_event(&self, event: &TransportEvent) {
        if self.tx.send(event.clone()).is_err() {
            log::debug!("Event receiver dropped, discarding {:?}", event);
        }
    }
}
