//! Streaming transport abstraction.

use crate::error::Result;
use crate::models::StreamRequest;
use crate::services::channel::{ChannelSink, OpenChannel};

/// Opens one-directional answer streams.
///
/// `open` must not block: it starts delivery in the background and returns
/// the channel handle immediately. Every event for the request goes through
/// `sink`, and delivery stops once the returned channel is closed.
pub trait QueryTransport: Send + Sync {
    /// Open a channel for `request`.
    fn open(&self, request: StreamRequest, sink: ChannelSink) -> Result<OpenChannel>;
}
