//! Streaming query session.
//!
//! One question at a time: `start` appends the user turn and a pending
//! assistant turn, opens a channel through the injected transport, and the
//! host feeds channel events back through [`ChatSession::handle_event`] on its
//! own task. All transcript mutation happens there; nothing here locks.
//!
//! Invariants:
//! - at most one channel is open per session, and any previous one is closed
//!   before a new one is opened
//! - events tagged with another session id are dropped, so two exchanges
//!   never interleave writes into the transcript
//! - an assistant turn leaves `is_pending` exactly once, on completion or
//!   failure

use crate::error::{DataChatError, Result};
use crate::models::{
    ConversationTurn, Notice, SessionPhase, StreamChunk, StreamRequest, Transcript,
};
use crate::services::channel::{ChannelEvent, ChannelEventKind, ChannelSink, ChannelSlot};
use crate::services::transport::QueryTransport;

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Shown on an assistant turn whose stream failed. Transport errors rarely
/// carry anything actionable, so the user sees one fixed message.
pub const STREAM_ERROR_MESSAGE: &str =
    "Something went wrong while generating the answer. Please try again.";

/// Shown on an assistant turn abandoned for a newer question.
pub const SUPERSEDED_MESSAGE: &str = "Stopped: a newer question replaced this one.";

/// Shown on an assistant turn still streaming when the session was torn down.
pub const STOPPED_MESSAGE: &str = "Stopped before the answer finished.";

/// Identifies the exchange a successful `start` created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionHandle {
    /// Fresh session id sent to the backend
    pub session_id: String,
    /// Connection the question runs against
    pub connection_id: i64,
    /// Id of the appended user turn
    pub user_turn_id: String,
    /// Id of the pending assistant turn
    pub assistant_turn_id: String,
}

/// Result of asking the session to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    /// A new exchange began
    Started(SessionHandle),
    /// Another exchange is still opening or streaming; nothing changed
    Busy,
}

impl StartOutcome {
    /// The handle, if started.
    pub fn handle(&self) -> Option<&SessionHandle> {
        match self {
            Self::Started(handle) => Some(handle),
            Self::Busy => None,
        }
    }
}

/// What handling one event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// Stale, malformed, or late; no state changed
    Ignored,
    /// The answer grew (or the first event arrived)
    Updated,
    /// The exchange completed
    Completed,
    /// The exchange failed
    Failed,
}

/// Book-keeping for the current (or last) exchange.
#[derive(Debug)]
struct Exchange {
    session_id: String,
    connection_id: i64,
    query_text: String,
    accumulated_text: String,
    assistant_turn_id: String,
    started_at: DateTime<Utc>,
}

/// Owns the transcript and the single answer channel.
pub struct ChatSession {
    transport: Arc<dyn QueryTransport>,
    transcript: Transcript,
    slot: ChannelSlot,
    phase: SessionPhase,
    exchange: Option<Exchange>,
    notices: Vec<Notice>,
    events_tx: mpsc::UnboundedSender<ChannelEvent>,
    events_rx: mpsc::UnboundedReceiver<ChannelEvent>,
}

impl ChatSession {
    /// Create an idle session over `transport`.
    pub fn new(transport: Arc<dyn QueryTransport>) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            transport,
            transcript: Transcript::new(),
            slot: ChannelSlot::new(),
            phase: SessionPhase::Idle,
            exchange: None,
            notices: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    // ========== Starting ==========

    /// Ask a question against `connection_id`.
    ///
    /// Rejects a blank question with a validation error and changes nothing.
    /// Returns [`StartOutcome::Busy`] while another exchange is in flight.
    pub fn start(&mut self, query: &str, connection_id: i64) -> Result<StartOutcome> {
        let query = Self::validate_query(query)?;
        if self.phase.is_active() {
            tracing::debug!(
                session_id = self.session_id().unwrap_or_default(),
                "Start ignored: an answer is still streaming"
            );
            return Ok(StartOutcome::Busy);
        }
        Ok(StartOutcome::Started(self.begin(query, connection_id)))
    }

    /// Abandon any in-flight exchange and ask a new question.
    ///
    /// The old assistant turn is finalized with [`SUPERSEDED_MESSAGE`] and its
    /// channel is closed before the new one opens.
    pub fn restart(&mut self, query: &str, connection_id: i64) -> Result<SessionHandle> {
        let query = Self::validate_query(query)?;
        if self.phase.is_active() {
            if let Some(exchange) = &self.exchange {
                tracing::debug!(session_id = %exchange.session_id, "Superseding exchange");
            }
            self.slot.close();
            self.finalize_turn(Some(SUPERSEDED_MESSAGE));
            self.phase = SessionPhase::Failed;
        }
        Ok(self.begin(query, connection_id))
    }

    fn validate_query(query: &str) -> Result<&str> {
        let query = query.trim();
        if query.is_empty() {
            return Err(DataChatError::validation("Please enter a question"));
        }
        Ok(query)
    }

    fn begin(&mut self, query: &str, connection_id: i64) -> SessionHandle {
        let session_id = Uuid::new_v4().to_string();
        let user = ConversationTurn::user(query);
        let assistant = ConversationTurn::pending_assistant();
        let handle = SessionHandle {
            session_id: session_id.clone(),
            connection_id,
            user_turn_id: user.id.clone(),
            assistant_turn_id: assistant.id.clone(),
        };

        self.transcript.append(user);
        self.transcript.append(assistant);

        // A terminated exchange may still hold its channel; close it before
        // anything new can deliver.
        self.slot.close();

        self.exchange = Some(Exchange {
            session_id: session_id.clone(),
            connection_id,
            query_text: query.to_string(),
            accumulated_text: String::new(),
            assistant_turn_id: handle.assistant_turn_id.clone(),
            started_at: Utc::now(),
        });
        self.phase = SessionPhase::Opening;

        tracing::debug!(session_id = %session_id, connection_id, "Starting answer stream");

        let request = StreamRequest { query: query.to_string(), connection_id, session_id };
        let sink = ChannelSink::new(request.session_id.clone(), self.events_tx.clone());
        match self.transport.open(request, sink) {
            Ok(channel) => self.slot.replace(channel),
            Err(e) => self.fail(DataChatError::stream_for(e.to_string(), &handle.session_id)),
        }

        handle
    }

    // ========== Event handling ==========

    /// Wait for the next channel event and apply it.
    pub async fn pump(&mut self) -> Option<EventOutcome> {
        let event = self.events_rx.recv().await?;
        Some(self.handle_event(event))
    }

    /// Apply the next queued event, if any, without waiting.
    pub fn try_pump(&mut self) -> Option<EventOutcome> {
        let event = self.events_rx.try_recv().ok()?;
        Some(self.handle_event(event))
    }

    /// Apply every event already queued, without waiting.
    ///
    /// Returns how many events were handled.
    pub fn drain_pending(&mut self) -> usize {
        let mut handled = 0;
        while self.try_pump().is_some() {
            handled += 1;
        }
        handled
    }

    /// Apply one channel event.
    pub fn handle_event(&mut self, event: ChannelEvent) -> EventOutcome {
        let current = match &self.exchange {
            Some(exchange) if exchange.session_id == event.session_id => exchange,
            _ => {
                tracing::trace!(session_id = %event.session_id, "Dropping event for another session");
                return EventOutcome::Ignored;
            }
        };
        if !self.phase.is_active() {
            tracing::trace!(session_id = %current.session_id, "Dropping event after termination");
            return EventOutcome::Ignored;
        }

        match event.kind {
            ChannelEventKind::Message(data) => {
                let chunk = match StreamChunk::parse(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::warn!(session_id = %event.session_id, error = %e, "Dropping malformed chunk");
                        return EventOutcome::Ignored;
                    }
                };
                self.phase = SessionPhase::Streaming;
                self.append_content(chunk.content.as_deref());
                if chunk.is_final() {
                    self.complete();
                    EventOutcome::Completed
                } else {
                    EventOutcome::Updated
                }
            }
            ChannelEventKind::Final(data) => {
                // Either signal is authoritative: a final-kind event ends the
                // stream whatever its payload's flag says.
                match data.as_deref().map(StreamChunk::parse) {
                    Some(Ok(chunk)) => self.append_content(chunk.content.as_deref()),
                    Some(Err(e)) => {
                        tracing::warn!(session_id = %event.session_id, error = %e, "Ignoring malformed final payload");
                    }
                    None => {}
                }
                self.complete();
                EventOutcome::Completed
            }
            ChannelEventKind::Closed => {
                tracing::debug!(session_id = %event.session_id, "Stream ended without a final event");
                self.complete();
                EventOutcome::Completed
            }
            ChannelEventKind::Error(message) => {
                self.fail(DataChatError::stream_for(message, event.session_id));
                EventOutcome::Failed
            }
        }
    }

    fn append_content(&mut self, content: Option<&str>) {
        let Some(exchange) = self.exchange.as_mut() else {
            return;
        };
        if let Some(content) = content {
            exchange.accumulated_text.push_str(content);
            tracing::trace!(
                session_id = %exchange.session_id,
                chunk_len = content.len(),
                total_len = exchange.accumulated_text.len(),
                "Chunk appended"
            );
        }
        let text = exchange.accumulated_text.clone();
        let turn_id = exchange.assistant_turn_id.clone();
        self.transcript.replace_last(
            |turn| turn.id == turn_id,
            |turn| {
                if turn.is_pending {
                    turn.text = text;
                }
            },
        );
    }

    fn complete(&mut self) {
        if let Some(exchange) = &self.exchange {
            let elapsed_ms = (Utc::now() - exchange.started_at).num_milliseconds();
            tracing::debug!(
                session_id = %exchange.session_id,
                answer_len = exchange.accumulated_text.len(),
                elapsed_ms,
                "Answer stream completed"
            );
        }
        self.slot.close();
        self.finalize_turn(None);
        self.phase = SessionPhase::Completed;
    }

    fn fail(&mut self, error: DataChatError) {
        tracing::warn!(
            session_id = error.session_id().unwrap_or_default(),
            connection_id = ?self.connection_id(),
            error = %error,
            "Answer stream failed"
        );
        self.slot.close();
        self.finalize_turn(Some(STREAM_ERROR_MESSAGE));
        self.phase = SessionPhase::Failed;
        let mut notice = Notice::error(STREAM_ERROR_MESSAGE);
        if let Some(hint) = error.hint() {
            notice = notice.with_hint(hint);
        }
        self.notices.push(notice);
    }

    /// Flip the assistant turn out of pending; only the first call has effect.
    fn finalize_turn(&mut self, error_message: Option<&str>) {
        let Some(exchange) = &self.exchange else {
            return;
        };
        let text = exchange.accumulated_text.clone();
        let turn_id = exchange.assistant_turn_id.clone();
        self.transcript.replace_last(
            |turn| turn.id == turn_id,
            |turn| {
                if turn.is_pending {
                    turn.text = text;
                    turn.is_pending = false;
                    turn.error_message = error_message.map(String::from);
                }
            },
        );
    }

    // ========== Cancellation ==========

    /// Close any channel and forget everything. Safe from any phase.
    ///
    /// Closing is a client-local stop; the backend is not told.
    pub fn clear(&mut self) {
        self.slot.close();
        self.transcript.clear();
        self.exchange = None;
        self.phase = SessionPhase::Idle;
        self.notices.clear();
        // Anything still queued belongs to the closed channel.
        while self.events_rx.try_recv().is_ok() {}
        tracing::debug!("Session cleared");
    }

    /// Release the channel when the hosting view goes away.
    ///
    /// The transcript is kept for a final render; an answer still in flight is
    /// finalized with [`STOPPED_MESSAGE`] and later events are dropped.
    pub fn teardown(&mut self) {
        self.slot.close();
        if self.phase.is_active() {
            self.finalize_turn(Some(STOPPED_MESSAGE));
            self.phase = SessionPhase::Failed;
        }
        if let Some(exchange) = self.exchange.take() {
            tracing::debug!(session_id = %exchange.session_id, phase = ?self.phase, "Session torn down");
        }
    }

    // ========== Accessors ==========

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Whether an exchange is opening or streaming.
    pub fn is_busy(&self) -> bool {
        self.phase.is_active()
    }

    /// Whether a channel is currently open.
    pub fn has_open_channel(&self) -> bool {
        self.slot.is_open()
    }

    /// Id of the current (or last) exchange.
    pub fn session_id(&self) -> Option<&str> {
        self.exchange.as_ref().map(|e| e.session_id.as_str())
    }

    /// Connection of the current (or last) exchange.
    pub fn connection_id(&self) -> Option<i64> {
        self.exchange.as_ref().map(|e| e.connection_id)
    }

    /// Question of the current (or last) exchange.
    pub fn query_text(&self) -> Option<&str> {
        self.exchange.as_ref().map(|e| e.query_text.as_str())
    }

    /// Answer text received so far.
    pub fn accumulated_text(&self) -> &str {
        self.exchange.as_ref().map(|e| e.accumulated_text.as_str()).unwrap_or_default()
    }

    /// The transcript.
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Take queued notices.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TurnRole;
    use crate::test_support::RecordingTransport;

    fn session() -> (ChatSession, Arc<RecordingTransport>) {
        let transport = Arc::new(RecordingTransport::new());
        (ChatSession::new(transport.clone()), transport)
    }

    #[test]
    fn test_blank_query_is_rejected_without_state_change() {
        let (mut session, transport) = session();
        let err = session.start("   \n", 5).unwrap_err();
        assert_eq!(err.category(), "Validation");
        assert!(session.transcript().is_empty());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert_eq!(transport.open_count(), 0);
    }

    #[test]
    fn test_start_appends_turns_and_opens_channel() {
        let (mut session, transport) = session();
        let outcome = session.start("  revenue by month  ", 7).unwrap();
        let handle = outcome.handle().unwrap().clone();

        let turns = session.transcript().turns();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[0].text, "revenue by month");
        assert_eq!(turns[1].id, handle.assistant_turn_id);
        assert!(turns[1].is_pending);

        assert_eq!(session.phase(), SessionPhase::Opening);
        assert!(session.has_open_channel());
        let request = transport.last_request().unwrap();
        assert_eq!(request.query, "revenue by month");
        assert_eq!(request.connection_id, 7);
        assert_eq!(request.session_id, handle.session_id);
    }

    #[test]
    fn test_start_while_busy_is_noop() {
        let (mut session, transport) = session();
        session.start("first", 1).unwrap();
        let outcome = session.start("second", 1).unwrap();

        assert_eq!(outcome, StartOutcome::Busy);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(transport.open_count(), 1);
    }

    #[test]
    fn test_chunks_grow_the_answer() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.message(r#"{"content":"Hello"}"#);
        assert_eq!(session.drain_pending(), 1);
        assert_eq!(session.phase(), SessionPhase::Streaming);

        sink.message(r#"{"content":", world"}"#);
        session.drain_pending();

        let answer = session.transcript().last().unwrap();
        assert_eq!(answer.text, "Hello, world");
        assert!(answer.is_pending);
        assert_eq!(session.accumulated_text(), "Hello, world");
    }

    #[test]
    fn test_final_flag_in_payload_completes() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.message(r#"{"content":"done","is_final":true}"#);
        session.drain_pending();

        assert_eq!(session.phase(), SessionPhase::Completed);
        assert!(!session.has_open_channel());
        assert!(transport.last_token().unwrap().is_cancelled());
        let answer = session.transcript().last().unwrap();
        assert_eq!(answer.text, "done");
        assert!(!answer.is_pending);
        assert!(answer.error_message.is_none());
    }

    #[test]
    fn test_final_event_without_payload_completes() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.message(r#"{"content":"a"}"#);
        sink.finish(None);
        session.drain_pending();

        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.transcript().last().unwrap().text, "a");
    }

    #[test]
    fn test_closed_body_completes() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.message(r#"{"content":"partial"}"#);
        sink.closed();
        session.drain_pending();

        assert_eq!(session.phase(), SessionPhase::Completed);
        assert!(!session.transcript().last().unwrap().is_pending);
    }

    #[test]
    fn test_events_after_completion_are_ignored() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.finish(Some(r#"{"content":"x"}"#.to_string()));
        sink.message(r#"{"content":"late"}"#);
        sink.fail("late failure");
        session.drain_pending();

        assert_eq!(session.phase(), SessionPhase::Completed);
        let answer = session.transcript().last().unwrap();
        assert_eq!(answer.text, "x");
        assert!(answer.error_message.is_none());
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_transport_error_fails_with_notice() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        sink.message(r#"{"content":"par"}"#);
        sink.fail("connection reset by peer");
        session.drain_pending();

        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(!session.has_open_channel());
        let answer = session.transcript().last().unwrap();
        assert_eq!(answer.text, "par");
        assert!(!answer.is_pending);
        assert_eq!(answer.error_message.as_deref(), Some(STREAM_ERROR_MESSAGE));

        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, crate::models::NoticeLevel::Error);
        assert_eq!(notices[0].hint.as_deref(), Some("Send the question again"));
    }

    #[test]
    fn test_open_failure_fails_immediately() {
        let (mut session, transport) = session();
        transport.fail_next_open("no runtime");
        let outcome = session.start("q", 1).unwrap();

        assert!(outcome.handle().is_some());
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(!session.has_open_channel());
        assert!(session.transcript().last().unwrap().is_error());
        assert_eq!(session.take_notices().len(), 1);

        // A failed exchange does not block the next question.
        assert!(session.start("again", 1).unwrap().handle().is_some());
    }

    #[test]
    fn test_new_question_after_completion_gets_new_session() {
        let (mut session, transport) = session();
        let first = session.start("one", 1).unwrap().handle().unwrap().clone();
        transport.last_sink().unwrap().finish(None);
        session.drain_pending();

        let second = session.start("two", 2).unwrap().handle().unwrap().clone();
        assert_ne!(first.session_id, second.session_id);
        assert_eq!(session.transcript().len(), 4);
        assert_eq!(session.accumulated_text(), "");
        assert_eq!(session.connection_id(), Some(2));
        assert_eq!(session.query_text(), Some("two"));
    }

    #[test]
    fn test_clear_mid_stream() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();
        sink.message(r#"{"content":"a"}"#);

        session.clear();
        assert!(session.transcript().is_empty());
        assert!(!session.has_open_channel());
        assert_eq!(session.phase(), SessionPhase::Idle);
        assert!(transport.last_token().unwrap().is_cancelled());

        // Anything the dead channel still sends is dropped.
        sink.message(r#"{"content":"b"}"#);
        assert_eq!(session.drain_pending(), 1);
        assert!(session.transcript().is_empty());
    }

    #[test]
    fn test_teardown_closes_channel_and_drops_later_events() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        session.teardown();
        assert!(!session.has_open_channel());
        assert!(transport.last_token().unwrap().is_cancelled());

        sink.message(r#"{"content":"ghost"}"#);
        session.drain_pending();
        assert_eq!(session.transcript().last().unwrap().text, "");
    }

    #[test]
    fn test_teardown_finalizes_the_pending_answer() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        transport.last_sink().unwrap().message(r#"{"content":"half"}"#);
        session.drain_pending();

        session.teardown();
        assert_eq!(session.phase(), SessionPhase::Failed);
        assert!(!session.is_busy());
        assert_eq!(session.transcript().pending_count(), 0);
        let answer = session.transcript().last().unwrap();
        assert_eq!(answer.text, "half");
        assert_eq!(answer.error_message.as_deref(), Some(STOPPED_MESSAGE));

        // A later exchange leaves no pending turn behind once it completes.
        session.start("again", 1).unwrap();
        transport.last_sink().unwrap().finish(None);
        session.drain_pending();
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert_eq!(session.transcript().pending_count(), 0);
        assert_eq!(session.transcript().len(), 4);
    }

    #[test]
    fn test_teardown_after_completion_keeps_the_answer() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        transport.last_sink().unwrap().message(r#"{"content":"done","is_final":true}"#);
        session.drain_pending();

        session.teardown();
        assert_eq!(session.phase(), SessionPhase::Completed);
        assert!(session.transcript().last().unwrap().error_message.is_none());
    }

    #[tokio::test]
    async fn test_pump_waits_for_events() {
        let (mut session, transport) = session();
        session.start("q", 1).unwrap();
        let sink = transport.last_sink().unwrap();

        tokio::spawn(async move {
            tokio::task::yield_now().await;
            sink.message(r#"{"content":"x"}"#);
            sink.finish(None);
        });

        assert_eq!(session.pump().await, Some(EventOutcome::Updated));
        assert_eq!(session.pump().await, Some(EventOutcome::Completed));
    }
}
