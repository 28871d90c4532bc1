//! In-memory collaborators for driving the registry and session in tests.

use crate::error::{DataChatError, Result};
use crate::models::{Connection, ConnectionFilter, DatabaseType, Page, StreamRequest};
use crate::services::{ChannelSink, ConnectionSource, OpenChannel, QueryTransport};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// A postgres connection with the given id, name and enabled flag.
pub fn connection(id: i64, name: &str, enabled: bool) -> Connection {
    Connection {
        id,
        name: name.to_string(),
        db_type: DatabaseType::Postgresql,
        host: "db.internal".to_string(),
        port: 5432,
        username: "analyst".to_string(),
        database_name: "sales".to_string(),
        enabled,
        description: None,
    }
}

/// Serves a fixed connection list, paginated like the backend.
pub struct StaticConnectionSource {
    connections: Mutex<Vec<Connection>>,
    failure: Mutex<Option<String>>,
    requests: Mutex<usize>,
}

impl StaticConnectionSource {
    pub fn new(connections: Vec<Connection>) -> Self {
        Self {
            connections: Mutex::new(connections),
            failure: Mutex::new(None),
            requests: Mutex::new(0),
        }
    }

    /// Make the next request fail with a network error.
    pub fn fail_next(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn set_connections(&self, connections: Vec<Connection>) {
        *self.connections.lock() = connections;
    }

    /// Number of page requests served (failed ones included).
    pub fn requests(&self) -> usize {
        *self.requests.lock()
    }
}

#[async_trait]
impl ConnectionSource for StaticConnectionSource {
    async fn list_connections(&self, filter: &ConnectionFilter) -> Result<Page<Connection>> {
        *self.requests.lock() += 1;
        if let Some(message) = self.failure.lock().take() {
            return Err(DataChatError::network(message));
        }

        let connections = self.connections.lock();
        let page = filter.page.unwrap_or(1).max(1);
        let page_size = filter.page_size.unwrap_or(50).max(1);
        let items = connections
            .iter()
            .skip(((page - 1) * page_size) as usize)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(Page { items, total: connections.len() as u64, page, page_size })
    }
}

/// One `open` call seen by [`RecordingTransport`].
pub struct OpenedChannel {
    pub request: StreamRequest,
    pub sink: ChannelSink,
    pub token: CancellationToken,
    /// Whether every earlier channel was already closed when this one opened
    pub earlier_closed: bool,
}

/// Transport that records each open and lets the test play the backend.
#[derive(Default)]
pub struct RecordingTransport {
    opened: Mutex<Vec<OpenedChannel>>,
    failure: Mutex<Option<String>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `open` fail.
    pub fn fail_next_open(&self, message: &str) {
        *self.failure.lock() = Some(message.to_string());
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn last_request(&self) -> Option<StreamRequest> {
        self.opened.lock().last().map(|o| o.request.clone())
    }

    pub fn last_sink(&self) -> Option<ChannelSink> {
        self.opened.lock().last().map(|o| o.sink.clone())
    }

    pub fn last_token(&self) -> Option<CancellationToken> {
        self.opened.lock().last().map(|o| o.token.clone())
    }

    pub fn sink(&self, index: usize) -> Option<ChannelSink> {
        self.opened.lock().get(index).map(|o| o.sink.clone())
    }

    pub fn token(&self, index: usize) -> Option<CancellationToken> {
        self.opened.lock().get(index).map(|o| o.token.clone())
    }

    /// Whether earlier channels were all closed before channel `index` opened.
    pub fn earlier_closed(&self, index: usize) -> Option<bool> {
        self.opened.lock().get(index).map(|o| o.earlier_closed)
    }
}

impl QueryTransport for RecordingTransport {
    fn open(&self, request: StreamRequest, sink: ChannelSink) -> Result<OpenChannel> {
        if let Some(message) = self.failure.lock().take() {
            return Err(DataChatError::stream_for(message, request.session_id));
        }

        let mut opened = self.opened.lock();
        let earlier_closed = opened.iter().all(|o| o.token.is_cancelled());
        let token = CancellationToken::new();
        let channel = OpenChannel::new(request.session_id.clone(), token.clone(), None);
        opened.push(OpenedChannel { request, sink, token, earlier_closed });
        Ok(channel)
    }
}
