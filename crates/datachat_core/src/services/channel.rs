//! Streaming channel handles and their delivery plumbing.
//!
//! A transport turns a [`StreamRequest`](crate::models::StreamRequest) into an
//! [`OpenChannel`]: an owned resource that keeps delivering events into a
//! [`ChannelSink`] until it is closed. The session keeps at most one of them in
//! a [`ChannelSlot`].

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// What happened on a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    /// A regular event; payload still undecoded
    Message(String),
    /// The backend signalled the end of the answer, optionally with a payload
    Final(Option<String>),
    /// The channel failed
    Error(String),
    /// The body ended without a terminal event
    Closed,
}

/// An event tagged with the session whose channel produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    /// Session the channel was opened for
    pub session_id: String,
    /// Event payload
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    /// Whether this event ends the channel.
    pub fn is_terminal(&self) -> bool {
        !matches!(self.kind, ChannelEventKind::Message(_))
    }
}

/// Delivery endpoint handed to a transport for one session.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    session_id: String,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

impl ChannelSink {
    /// Create a sink feeding `tx` on behalf of `session_id`.
    pub fn new(session_id: impl Into<String>, tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self { session_id: session_id.into(), tx }
    }

    /// Session this sink belongs to.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Deliver a raw event. Returns false once the receiving side is gone.
    pub fn send(&self, kind: ChannelEventKind) -> bool {
        self.tx.send(ChannelEvent { session_id: self.session_id.clone(), kind }).is_ok()
    }

    /// Deliver a regular event payload.
    pub fn message(&self, data: impl Into<String>) -> bool {
        self.send(ChannelEventKind::Message(data.into()))
    }

    /// Deliver the terminal "final" event.
    pub fn finish(&self, data: Option<String>) -> bool {
        self.send(ChannelEventKind::Final(data))
    }

    /// Deliver a channel failure.
    pub fn fail(&self, message: impl Into<String>) -> bool {
        self.send(ChannelEventKind::Error(message.into()))
    }

    /// Deliver end-of-body.
    pub fn closed(&self) -> bool {
        self.send(ChannelEventKind::Closed)
    }
}

/// An open streaming channel.
///
/// Closing is client-local: it stops further delivery but does not tell the
/// backend to stop working. Dropping the handle closes it.
#[derive(Debug)]
pub struct OpenChannel {
    session_id: String,
    cancel_token: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl OpenChannel {
    /// Wrap a cancellation token (and optionally the delivery task).
    pub fn new(
        session_id: impl Into<String>,
        cancel_token: CancellationToken,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { session_id: session_id.into(), cancel_token, task }
    }

    /// Session this channel was opened for.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Stop delivery. Idempotent.
    pub fn close(&mut self) {
        if !self.cancel_token.is_cancelled() {
            tracing::debug!(session_id = %self.session_id, "Closing stream channel");
            self.cancel_token.cancel();
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for OpenChannel {
    fn drop(&mut self) {
        self.close();
    }
}

/// Single-slot holder enforcing "at most one open channel".
#[derive(Debug, Default)]
pub struct ChannelSlot {
    current: Option<OpenChannel>,
}

impl ChannelSlot {
    /// Create an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Close whatever is held, then store `channel`.
    pub fn replace(&mut self, channel: OpenChannel) {
        if let Some(previous) = self.session_id() {
            tracing::trace!(previous, next = channel.session_id(), "Replacing open channel");
        }
        self.close();
        self.current = Some(channel);
    }

    /// Close and drop the held channel, if any.
    pub fn close(&mut self) {
        if let Some(mut channel) = self.current.take() {
            channel.close();
        }
    }

    /// Whether a channel is held and still open.
    pub fn is_open(&self) -> bool {
        self.current.as_ref().is_some_and(|c| !c.is_closed())
    }

    /// Session of the held channel.
    pub fn session_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.session_id())
    }
}
