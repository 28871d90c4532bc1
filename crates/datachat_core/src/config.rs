//! Client configuration.
//!
//! Settings come from `config.toml` in the platform config directory, with a
//! few environment overrides applied on top:
//!
//! - `DATACHAT_BACKEND_URL` - base URL of the backend service
//! - `DATACHAT_PAGE_SIZE` - page size used when walking the connection list

use crate::error::{DataChatError, Result};

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_BACKEND_URL: &str = "DATACHAT_BACKEND_URL";
const ENV_PAGE_SIZE: &str = "DATACHAT_PAGE_SIZE";

/// Get the default data directory (logs live here).
///
/// Debug builds use `./datachat_data` in the current directory.
pub fn default_data_dir() -> PathBuf {
    #[cfg(debug_assertions)]
    {
        PathBuf::from("./datachat_data")
    }

    #[cfg(not(debug_assertions))]
    {
        dirs::data_dir()
            .map(|d| d.join("datachat"))
            .unwrap_or_else(|| PathBuf::from("./datachat_data"))
    }
}

/// Get the default config file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("datachat")
        .join("config.toml")
}

/// Settings for talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the backend, e.g. `http://127.0.0.1:8000`
    pub backend_url: String,
    /// Path of the connection collection endpoint
    pub connections_path: String,
    /// Path of the streaming query endpoint
    pub stream_path: String,
    /// Page size used when listing connections
    pub page_size: u32,
    /// TCP connect timeout in seconds
    pub connect_timeout_secs: u64,
    /// Timeout for non-streaming requests in seconds
    pub request_timeout_secs: u64,
    /// Optional tracing filter directive
    pub log_filter: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: "http://127.0.0.1:8000".to_string(),
            connections_path: "/connections".to_string(),
            stream_path: "/query/stream".to_string(),
            page_size: 50,
            connect_timeout_secs: 10,
            request_timeout_secs: 30,
            log_filter: None,
        }
    }
}

impl ClientConfig {
    /// Load from the default config path, then apply environment overrides.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        let path = default_config_path();
        let mut config =
            if path.exists() { Self::load_from(&path)? } else { Self::default() };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific file without environment overrides.
    ///
    /// Not validated; call [`ClientConfig::validate`] once every override is
    /// applied.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            DataChatError::config_with_hint(
                format!("Failed to read config '{}': {}", path.display(), e),
                "Check that the file exists and is readable",
            )
        })?;
        let config: Self = toml::from_str(&content)?;
        tracing::debug!(path = %path.display(), "Loaded client config");
        Ok(config)
    }

    /// Write this configuration to a file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| DataChatError::config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply `DATACHAT_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(ENV_BACKEND_URL) {
            if !url.trim().is_empty() {
                self.backend_url = url.trim().to_string();
            }
        }
        if let Ok(size) = std::env::var(ENV_PAGE_SIZE) {
            self.page_size = size.trim().parse().map_err(|_| {
                DataChatError::config_with_hint(
                    format!("{ENV_PAGE_SIZE} must be a positive integer, got '{size}'"),
                    format!("Unset {ENV_PAGE_SIZE} or give it a number"),
                )
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://")) {
            return Err(DataChatError::config_with_hint(
                format!("Backend URL must use http or https: '{}'", self.backend_url),
                "Set backend_url to something like http://127.0.0.1:8000",
            ));
        }
        if self.page_size == 0 {
            return Err(DataChatError::config("page_size must be at least 1"));
        }
        for (name, path) in
            [("connections_path", &self.connections_path), ("stream_path", &self.stream_path)]
        {
            if !path.starts_with('/') {
                return Err(DataChatError::config(format!("{name} must start with '/'")));
            }
        }
        Ok(())
    }

    /// Join the base URL and an endpoint path.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.backend_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Connect timeout as a `Duration`.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Request timeout as a `Duration`.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
