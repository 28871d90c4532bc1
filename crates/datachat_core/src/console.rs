//! Chat view state.
//!
//! Bundles the connection registry, the streaming session, and the notices a
//! front end should surface. Every network side effect sits behind the
//! injected [`ConnectionSource`] and [`QueryTransport`], so the whole view can
//! be driven without a backend.

use crate::error::{DataChatError, Result};
use crate::models::{Connection, Notice, Transcript};
use crate::services::{
    ChatSession, ConnectionRegistry, ConnectionSource, EventOutcome, HttpBackend, QueryTransport,
    SessionHandle, StartOutcome,
};

use std::sync::Arc;

/// Central chat state.
pub struct ChatConsole {
    /// Enabled connections and the selection
    registry: ConnectionRegistry,
    /// Transcript and the answer channel
    session: ChatSession,
    /// Notices not yet shown
    notices: Vec<Notice>,
}

impl ChatConsole {
    /// Create a console over explicit collaborators.
    pub fn new(
        source: Arc<dyn ConnectionSource>,
        transport: Arc<dyn QueryTransport>,
        page_size: u32,
    ) -> Self {
        Self {
            registry: ConnectionRegistry::new(source, page_size),
            session: ChatSession::new(transport),
            notices: Vec::new(),
        }
    }

    /// Create a console talking to the HTTP backend.
    pub fn with_backend(backend: Arc<HttpBackend>) -> Self {
        let page_size = backend.config().page_size;
        Self::new(backend.clone(), backend, page_size)
    }

    // ========== Connections ==========

    /// Refresh the enabled connections and select the first if none is.
    ///
    /// A failed fetch yields an empty list and an error notice.
    pub async fn load_connections(&mut self) -> Vec<Connection> {
        match self.registry.list_enabled_connections().await {
            Ok(connections) => {
                if connections.is_empty() {
                    self.notices.push(
                        Notice::info("No enabled connections")
                            .with_hint("Create or enable a connection first"),
                    );
                }
                self.registry.select_default();
                connections
            }
            Err(e) => {
                self.notices.push(Notice::from_error(&e));
                Vec::new()
            }
        }
    }

    /// Select a connection from the loaded list.
    pub fn select_connection(&mut self, id: i64) -> Result<()> {
        match self.registry.select(id) {
            Ok(connection) => {
                tracing::debug!(connection_id = id, name = %connection.name, "Connection selected");
                Ok(())
            }
            Err(e) => {
                self.notices.push(Notice::from_error(&e));
                Err(e)
            }
        }
    }

    /// The selected connection.
    pub fn selected_connection(&self) -> Option<&Connection> {
        self.registry.selected()
    }

    /// Enabled connections from the last successful refresh.
    pub fn connections(&self) -> &[Connection] {
        self.registry.connections()
    }

    // ========== Asking ==========

    /// Send a question against the selected connection.
    ///
    /// Returns `Ok(None)` when an answer is still streaming; the caller is
    /// told through a warning notice.
    pub fn send(&mut self, text: &str) -> Result<Option<SessionHandle>> {
        if self.session.is_busy() {
            self.notices.push(
                Notice::warning("An answer is still streaming")
                    .with_hint("Wait for it to finish or clear the conversation"),
            );
            return Ok(None);
        }

        let result = self.validated_connection(text).and_then(|connection_id| {
            self.session.start(text, connection_id)
        });
        let outcome = match result {
            Ok(outcome) => outcome,
            Err(e) => {
                self.notices.push(Notice::from_error(&e));
                return Err(e);
            }
        };
        self.collect_session_notices();

        Ok(match outcome {
            StartOutcome::Started(handle) => Some(handle),
            StartOutcome::Busy => None,
        })
    }

    fn validated_connection(&self, text: &str) -> Result<i64> {
        if text.trim().is_empty() {
            return Err(DataChatError::validation("Please enter a question"));
        }
        self.registry
            .selected_id()
            .ok_or_else(|| DataChatError::validation("Please select a connection first"))
    }

    /// Wait for the next answer event and apply it.
    pub async fn pump(&mut self) -> Option<EventOutcome> {
        let outcome = self.session.pump().await;
        self.collect_session_notices();
        outcome
    }

    /// Apply every answer event already queued.
    pub fn drain_pending(&mut self) -> usize {
        let handled = self.session.drain_pending();
        self.collect_session_notices();
        handled
    }

    /// Stop any answer and empty the conversation.
    pub fn clear(&mut self) {
        self.session.clear();
    }

    /// Release the answer channel; call when the view goes away.
    pub fn teardown(&mut self) {
        self.session.teardown();
    }

    // ========== Accessors ==========

    /// The conversation so far.
    pub fn transcript(&self) -> &Transcript {
        self.session.transcript()
    }

    /// The streaming session.
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Take notices not yet shown.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        self.collect_session_notices();
        std::mem::take(&mut self.notices)
    }

    fn collect_session_notices(&mut self) {
        self.notices.extend(self.session.take_notices());
    }
}
