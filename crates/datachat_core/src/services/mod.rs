//! Service layer for DataChat.
//!
//! - `backend` - HTTP client for the connection API and the answer stream
//! - `channel` - Open-channel handles and event delivery
//! - `registry` - Enabled connections and the current selection
//! - `session` - The streaming question/answer state machine
//! - `sse` - Server-sent-event frame decoding
//! - `transport` - The seam between sessions and the wire

pub mod backend;
pub mod channel;
pub mod registry;
pub mod session;
pub mod sse;
pub mod transport;

pub use backend::HttpBackend;
pub use channel::{ChannelEvent, ChannelEventKind, ChannelSink, ChannelSlot, OpenChannel};
pub use registry::{ConnectionAdmin, ConnectionRegistry, ConnectionSource};
pub use session::{ChatSession, EventOutcome, SessionHandle, StartOutcome};
pub use sse::{SseDecoder, SseFrame};
pub use transport::QueryTransport;
