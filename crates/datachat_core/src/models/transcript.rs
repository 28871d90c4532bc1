//! Conversation transcript: the ordered turn log behind the chat display.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The person asking
    User,
    /// The streamed answer
    Assistant,
}

/// One entry in the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    /// Locally generated, unique within the transcript
    pub id: String,
    /// Author of the turn
    pub role: TurnRole,
    /// Turn text; grows while pending
    pub text: String,
    /// When the turn was appended
    pub created_at: DateTime<Utc>,
    /// Assistant turn still receiving chunks
    pub is_pending: bool,
    /// User-facing failure message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl ConversationTurn {
    /// A finished user turn.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: TurnRole::User,
            text: text.into(),
            created_at: Utc::now(),
            is_pending: false,
            error_message: None,
        }
    }

    /// An empty assistant turn waiting for its stream.
    pub fn pending_assistant() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role: TurnRole::Assistant,
            text: String::new(),
            created_at: Utc::now(),
            is_pending: true,
            error_message: None,
        }
    }

    /// Whether this turn has stopped changing.
    pub fn is_finished(&self) -> bool {
        !self.is_pending
    }

    /// Whether the turn ended in failure.
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }
}

/// Append-only turn log.
///
/// Order is strictly append order; no reordering, no deduplication. The only
/// in-place edit is [`Transcript::replace_last`], used by the streaming
/// session to grow and finalize its assistant turn.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<ConversationTurn>,
}

impl Transcript {
    /// Create an empty transcript.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end.
    pub fn append(&mut self, turn: ConversationTurn) {
        tracing::trace!(turn_id = %turn.id, role = ?turn.role, "Turn appended");
        self.turns.push(turn);
    }

    /// Mutate the most recent turn matching `predicate`.
    ///
    /// Returns false when no turn matches.
    pub fn replace_last<P, M>(&mut self, predicate: P, mutation: M) -> bool
    where
        P: Fn(&ConversationTurn) -> bool,
        M: FnOnce(&mut ConversationTurn),
    {
        match self.turns.iter_mut().rev().find(|turn| predicate(turn)) {
            Some(turn) => {
                mutation(turn);
                true
            }
            None => false,
        }
    }

    /// All turns in append order.
    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Look up a turn by id.
    pub fn get(&self, id: &str) -> Option<&ConversationTurn> {
        self.turns.iter().find(|turn| turn.id == id)
    }

    /// The newest turn.
    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether the transcript has no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Number of assistant turns still pending.
    pub fn pending_count(&self) -> usize {
        self.turns.iter().filter(|turn| turn.is_pending).count()
    }

    /// Drop every turn.
    pub fn clear(&mut self) {
        self.turns.clear();
    }
}
