//! Connection registry.
//!
//! Fetches the data connections from the backend, keeps the enabled ones, and
//! tracks which one the user has selected.

use crate::error::{DataChatError, Result};
use crate::models::{Connection, ConnectionDraft, ConnectionFilter, Page};

use async_trait::async_trait;
use std::sync::Arc;

/// Upper bound on pages walked in one listing, guards against a backend that
/// keeps returning full pages.
const MAX_PAGES: u32 = 1000;

/// Read side of the connection backend.
#[async_trait]
pub trait ConnectionSource: Send + Sync {
    /// Fetch one page of connections.
    async fn list_connections(&self, filter: &ConnectionFilter) -> Result<Page<Connection>>;
}

/// Write side of the connection backend.
#[async_trait]
pub trait ConnectionAdmin: Send + Sync {
    /// Create a connection; the credential travels once and is never returned.
    async fn create_connection(&self, draft: &ConnectionDraft) -> Result<Connection>;

    /// Replace a connection's settings.
    async fn update_connection(&self, id: i64, draft: &ConnectionDraft) -> Result<Connection>;

    /// Flip the enabled flag.
    async fn set_enabled(&self, id: i64, enabled: bool) -> Result<Connection>;

    /// Delete several connections at once.
    async fn delete_connections(&self, ids: &[i64]) -> Result<()>;
}

/// Enabled connections plus the current selection.
pub struct ConnectionRegistry {
    source: Arc<dyn ConnectionSource>,
    page_size: u32,
    connections: Vec<Connection>,
    selected: Option<i64>,
}

impl ConnectionRegistry {
    /// Create an empty registry over `source`.
    pub fn new(source: Arc<dyn ConnectionSource>, page_size: u32) -> Self {
        Self { source, page_size: page_size.max(1), connections: Vec::new(), selected: None }
    }

    /// Fetch every connection, keep the enabled ones in backend order.
    ///
    /// On failure the previously loaded list is left untouched.
    pub async fn list_enabled_connections(&mut self) -> Result<Vec<Connection>> {
        let all = fetch_all(self.source.as_ref(), &ConnectionFilter::default(), self.page_size)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "Failed to list connections"))?;

        let total = all.len();
        let enabled: Vec<Connection> = all.into_iter().filter(|c| c.enabled).collect();
        tracing::debug!(total, enabled = enabled.len(), "Connections refreshed");

        if let Some(id) = self.selected {
            if !enabled.iter().any(|c| c.id == id) {
                tracing::debug!(connection_id = id, "Selected connection no longer available");
                self.selected = None;
            }
        }

        self.connections = enabled.clone();
        Ok(enabled)
    }

    /// Select the first connection when nothing is selected yet.
    ///
    /// Never overrides an existing selection.
    pub fn select_default(&mut self) -> Option<&Connection> {
        if self.selected.is_none() {
            if let Some(first) = self.connections.first() {
                tracing::debug!(connection_id = first.id, "Selected default connection");
                self.selected = Some(first.id);
            }
        }
        self.selected()
    }

    /// Select a connection by id.
    pub fn select(&mut self, id: i64) -> Result<&Connection> {
        let Some(index) = self.connections.iter().position(|c| c.id == id) else {
            return Err(DataChatError::validation(format!(
                "Connection {id} is not available; pick one of the enabled connections"
            )));
        };
        self.selected = Some(id);
        Ok(&self.connections[index])
    }

    /// Forget the selection.
    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The selected connection.
    pub fn selected(&self) -> Option<&Connection> {
        let id = self.selected?;
        self.connections.iter().find(|c| c.id == id)
    }

    /// Id of the selected connection.
    pub fn selected_id(&self) -> Option<i64> {
        self.selected
    }

    /// Enabled connections from the last successful refresh.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }
}

/// Walk the listing page by page.
///
/// Stops once `total` records are collected, or at the first empty or short
/// page when the backend does not report a total.
pub async fn fetch_all(
    source: &dyn ConnectionSource,
    filter: &ConnectionFilter,
    page_size: u32,
) -> Result<Vec<Connection>> {
    let mut collected = Vec::new();
    let mut page_number = 1;

    loop {
        let request = filter.clone().page(page_number, page_size);
        let page = source.list_connections(&request).await?;
        let received = page.items.len();
        tracing::trace!(page = page_number, received, total = page.total, "Connection page");
        collected.extend(page.items);

        let reached_total = page.total > 0 && collected.len() as u64 >= page.total;
        let short_page = received < page_size as usize;
        if received == 0 || reached_total || (page.total == 0 && short_page) {
            break;
        }
        if page_number >= MAX_PAGES {
            tracing::warn!(pages = page_number, "Stopped paging connections early");
            break;
        }
        page_number += 1;
    }

    Ok(collected)
}
