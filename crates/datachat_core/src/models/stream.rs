//! Streaming query models.

use crate::error::{DataChatError, Result};

use serde::{Deserialize, Serialize};

/// Parameters identifying one streaming exchange on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRequest {
    /// Natural-language question, already trimmed
    pub query: String,
    /// Connection to answer against
    pub connection_id: i64,
    /// Client-generated session identifier
    pub session_id: String,
}

impl StreamRequest {
    /// Query-string pairs for the GET request.
    pub fn to_query(&self) -> [(&'static str, String); 3] {
        [
            ("query", self.query.clone()),
            ("connectionId", self.connection_id.to_string()),
            ("sessionId", self.session_id.clone()),
        ]
    }
}

/// Decoded payload of one stream event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StreamChunk {
    /// Text to append to the answer
    #[serde(default)]
    pub content: Option<String>,
    /// Backend marks the last chunk
    #[serde(default)]
    pub is_final: Option<bool>,
}

impl StreamChunk {
    /// Parse an event payload.
    ///
    /// An empty payload is an empty chunk (a bare terminal event carries none).
    pub fn parse(data: &str) -> Result<Self> {
        if data.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(data).map_err(|e| DataChatError::Parse {
            message: format!("Malformed chunk payload: {e}"),
            source: Some(Box::new(e)),
        })
    }

    /// Whether the payload flags the end of the stream.
    pub fn is_final(&self) -> bool {
        self.is_final.unwrap_or(false)
    }
}

/// Lifecycle of one streaming exchange.
///
/// `Idle -> Opening -> Streaming -> {Completed, Failed}`; terminal phases are
/// final and a new question always starts a new exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// No exchange yet, or cleared
    #[default]
    Idle,
    /// Channel requested, nothing received
    Opening,
    /// At least one event received
    Streaming,
    /// Terminal: the answer finished
    Completed,
    /// Terminal: the channel failed
    Failed,
}

impl SessionPhase {
    /// Opening or streaming.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Opening | Self::Streaming)
    }

    /// Completed or failed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}
