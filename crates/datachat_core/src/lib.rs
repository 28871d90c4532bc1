//! Core types and services for the DataChat client.
//!
//! DataChat asks natural-language questions against a stored data connection
//! and streams the answer back over server-sent events:
//!
//! - **error**: Error taxonomy with user-facing hints
//! - **config**: Backend endpoint and client settings
//! - **logging**: Structured logging setup
//! - **models**: Connections, transcript turns, stream payloads, notices
//! - **services**: HTTP backend, connection registry, streaming session
//! - **console**: Chat view state tying the services together

pub mod config;
pub mod console;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use config::ClientConfig;
pub use console::ChatConsole;
pub use error::{DataChatError, ErrorInfo, Result};
pub use models::{
    Connection, ConnectionDraft, ConnectionFilter, ConversationTurn, DatabaseType, Notice,
    NoticeLevel, Page, SessionPhase, StreamChunk, StreamRequest, Transcript, TurnRole,
};
pub use services::{
    ChatSession, ConnectionAdmin, ConnectionRegistry, ConnectionSource, EventOutcome, HttpBackend,
    QueryTransport, SessionHandle, StartOutcome,
};
