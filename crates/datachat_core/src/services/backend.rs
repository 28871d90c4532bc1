//! HTTP client for the datachat backend.
//!
//! One type serves all three collaborator roles:
//! - `ConnectionSource` / `ConnectionAdmin` - JSON CRUD on the connection collection
//! - `QueryTransport` - the server-push answer stream

use crate::config::ClientConfig;
use crate::error::{DataChatError, Result};
use crate::models::{Connection, ConnectionDraft, ConnectionFilter, Page, StreamRequest};
use crate::services::channel::{ChannelSink, OpenChannel};
use crate::services::registry::{ConnectionAdmin, ConnectionSource};
use crate::services::sse::{SseDecoder, SseFrame};
use crate::services::transport::QueryTransport;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{ACCEPT, CACHE_CONTROL};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;

/// Event kind that ends an answer stream.
pub const FINAL_EVENT: &str = "final";

/// Event kind carrying a backend-reported failure.
pub const ERROR_EVENT: &str = "error";

/// Listing bodies seen in the wild: a page object or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum ListBody {
    Page(Page<Connection>),
    Bare(Vec<Connection>),
}

/// reqwest-based backend client.
#[derive(Clone)]
pub struct HttpBackend {
    config: ClientConfig,
    /// Client for request/response calls (with a total timeout)
    client: reqwest::Client,
    /// Client for answer streams (connect timeout only)
    stream_client: reqwest::Client,
}

impl HttpBackend {
    /// Build the HTTP clients for `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| DataChatError::internal(format!("Failed to create HTTP client: {e}")))?;

        // No total timeout: a slow answer is allowed to keep streaming.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| DataChatError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client, stream_client })
    }

    /// The configuration in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn connections_url(&self) -> String {
        self.config.endpoint(&self.config.connections_path)
    }

    fn connection_url(&self, id: i64) -> String {
        format!("{}/{}", self.connections_url(), id)
    }

    /// Map non-success statuses to a network error carrying the body text.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let detail = body.trim();
        let message = if detail.is_empty() {
            format!("Backend returned {status}")
        } else {
            format!("Backend returned {status}: {detail}")
        };
        Err(DataChatError::network_status(message, status.as_u16()))
    }

    fn validate_draft(draft: &ConnectionDraft) -> Result<()> {
        draft.validate().map_err(DataChatError::validation)
    }

    /// Run one answer stream to completion, feeding `sink`.
    async fn pump_stream(
        client: reqwest::Client,
        url: String,
        request: StreamRequest,
        sink: &ChannelSink,
    ) {
        let response = client
            .get(&url)
            .query(&request.to_query())
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(session_id = %request.session_id, error = %e, "Stream request failed");
                sink.fail(DataChatError::from(e).to_string());
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(session_id = %request.session_id, %status, "Stream rejected by backend");
            sink.fail(format!("Backend returned {status}"));
            return;
        }

        tracing::debug!(session_id = %request.session_id, "Stream opened");

        let mut body = response.bytes_stream();
        let mut decoder = SseDecoder::new();

        while let Some(item) = body.next().await {
            let bytes = match item {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(session_id = %request.session_id, error = %e, "Stream interrupted");
                    sink.fail(DataChatError::from(e).to_string());
                    return;
                }
            };
            for frame in decoder.push(&bytes) {
                if !Self::forward_frame(frame, sink) {
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            if !Self::forward_frame(frame, sink) {
                return;
            }
        }

        tracing::debug!(session_id = %request.session_id, "Stream body ended");
        sink.closed();
    }

    /// Forward one frame. Returns false when delivery should stop.
    fn forward_frame(frame: SseFrame, sink: &ChannelSink) -> bool {
        if frame.is_kind(FINAL_EVENT) {
            let data = Some(frame.data).filter(|d| !d.trim().is_empty());
            sink.finish(data);
            return false;
        }
        if frame.is_kind(ERROR_EVENT) {
            let message = if frame.data.trim().is_empty() {
                "Backend reported a stream error".to_string()
            } else {
                frame.data
            };
            sink.fail(message);
            return false;
        }
        sink.message(frame.data)
    }
}

#[async_trait]
impl ConnectionSource for HttpBackend {
    async fn list_connections(&self, filter: &ConnectionFilter) -> Result<Page<Connection>> {
        tracing::debug!(?filter, "Listing connections");

        let response =
            self.client.get(self.connections_url()).query(&filter.to_query()).send().await?;
        let body: ListBody = Self::check_status(response).await?.json().await?;

        Ok(match body {
            ListBody::Page(page) => page,
            ListBody::Bare(items) => Page {
                total: items.len() as u64,
                page: filter.page.unwrap_or(1),
                page_size: items.len() as u32,
                items,
            },
        })
    }
}

#[async_trait]
impl ConnectionAdmin for HttpBackend {
    async fn create_connection(&self, draft: &ConnectionDraft) -> Result<Connection> {
        Self::validate_draft(draft)?;
        tracing::debug!(name = %draft.name, db_type = %draft.db_type, "Creating connection");

        let response = self.client.post(self.connections_url()).json(draft).send().await?;
        let created: Connection = Self::check_status(response).await?.json().await?;

        tracing::info!(connection_id = created.id, "Connection created");
        Ok(created)
    }

    async fn update_connection(&self, id: i64, draft: &ConnectionDraft) -> Result<Connection> {
        Self::validate_draft(draft)?;
        tracing::debug!(connection_id = id, "Updating connection");

        let response = self.client.put(self.connection_url(id)).json(draft).send().await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<Connection> {
        tracing::debug!(connection_id = id, enabled, "Toggling connection");

        let response = self
            .client
            .put(self.connection_url(id))
            .json(&serde_json::json!({ "enabled": enabled }))
            .send()
            .await?;
        Ok(Self::check_status(response).await?.json().await?)
    }

    async fn delete_connections(&self, ids: &[i64]) -> Result<()> {
        if ids.is_empty() {
            return Err(DataChatError::validation("Select at least one connection to delete"));
        }
        tracing::debug!(count = ids.len(), "Deleting connections");

        let response = self
            .client
            .delete(self.connections_url())
            .json(&serde_json::json!({ "ids": ids }))
            .send()
            .await?;
        Self::check_status(response).await?;

        tracing::info!(?ids, "Connections deleted");
        Ok(())
    }
}

impl QueryTransport for HttpBackend {
    fn open(&self, request: StreamRequest, sink: ChannelSink) -> Result<OpenChannel> {
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            DataChatError::internal("Answer streams must be opened inside a tokio runtime")
        })?;

        let session_id = request.session_id.clone();
        let url = self.config.endpoint(&self.config.stream_path);
        let client = self.stream_client.clone();
        let cancel_token = CancellationToken::new();
        let token = cancel_token.clone();

        tracing::debug!(
            session_id = %session_id,
            connection_id = request.connection_id,
            "Opening answer stream"
        );

        let task = runtime.spawn(async move {
            let sid = request.session_id.clone();
            tokio::select! {
                _ = token.cancelled() => {
                    tracing::trace!(session_id = %sid, "Stream delivery cancelled");
                }
                _ = Self::pump_stream(client, url, request, &sink) => {}
            }
        });

        Ok(OpenChannel::new(session_id, cancel_token, Some(task)))
    }
}
