//! Data models for the datachat console.
//!
//! This module contains all core data structures:
//! - `connection` - Connection, ConnectionDraft, ConnectionFilter, Page
//! - `transcript` - ConversationTurn, Transcript
//! - `stream` - StreamRequest, StreamChunk, SessionPhase
//! - `notice` - Notice, NoticeLevel

pub mod connection;
pub mod notice;
pub mod stream;
pub mod transcript;

pub use connection::{Connection, ConnectionDraft, ConnectionFilter, DatabaseType, Page};
pub use notice::{Notice, NoticeLevel};
pub use stream::{SessionPhase, StreamChunk, StreamRequest};
pub use transcript::{ConversationTurn, Transcript, TurnRole};
