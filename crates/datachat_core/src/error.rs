//! Error types for the datachat console.
//!
//! Every failure in this crate degrades to a visible, recoverable state. The
//! variants mirror the four user-facing failure classes (validation, network,
//! stream, parse) plus configuration and internal errors.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DataChatError>;

/// Main error type for datachat.
#[derive(Debug, Error)]
pub enum DataChatError {
    /// Input rejected before any network activity.
    #[error("{message}")]
    Validation {
        /// Human-readable error message.
        message: String,
    },

    /// Backend request failed at the transport or HTTP level.
    #[error("Network error: {message}")]
    Network {
        /// Human-readable error message.
        message: String,
        /// HTTP status code, when the backend answered.
        status: Option<u16>,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Streaming channel failed.
    #[error("Stream error: {message}")]
    Stream {
        /// Human-readable error message.
        message: String,
        /// Session whose channel failed.
        session_id: String,
    },

    /// A payload could not be decoded.
    #[error("Parse error: {message}")]
    Parse {
        /// Human-readable error message.
        message: String,
        /// Optional underlying error source.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration could not be loaded or is invalid.
    #[error("Config error: {message}")]
    Config {
        /// Human-readable error message.
        message: String,
        /// Actionable hint for the user.
        hint: Option<String>,
    },

    /// Unexpected internal error.
    #[error("Internal error: {message}")]
    Internal {
        /// Human-readable error message.
        message: String,
    },
}

impl DataChatError {
    // ========== Constructors ==========

    /// Create a new validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create a new network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into(), status: None, source: None }
    }

    /// Create a network error for a non-success HTTP status.
    pub fn network_status(message: impl Into<String>, status: u16) -> Self {
        Self::Network { message: message.into(), status: Some(status), source: None }
    }

    /// Create a stream error bound to a session.
    pub fn stream_for(message: impl Into<String>, session_id: impl Into<String>) -> Self {
        Self::Stream { message: message.into(), session_id: session_id.into() }
    }

    /// Session of a stream error.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Self::Stream { session_id, .. } => Some(session_id.as_str()),
            _ => None,
        }
    }

    /// Create a new parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse { message: message.into(), source: None }
    }

    /// Create a new config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into(), hint: None }
    }

    /// Create a config error with a custom hint.
    pub fn config_with_hint(message: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::Config { message: message.into(), hint: Some(hint.into()) }
    }

    /// Create a new internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into() }
    }

    // ========== Methods ==========

    /// Get the error category name.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "Validation",
            Self::Network { .. } => "Network",
            Self::Stream { .. } => "Stream",
            Self::Parse { .. } => "Parse",
            Self::Config { .. } => "Config",
            Self::Internal { .. } => "Internal",
        }
    }

    /// Get actionable hint for the user.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Validation { .. } => None,
            Self::Network { status: Some(401 | 403), .. } => {
                Some("Check that you are allowed to manage data connections")
            }
            Self::Network { .. } => Some("Check that the backend service is reachable"),
            Self::Stream { .. } => Some("Send the question again"),
            Self::Parse { .. } => None,
            Self::Config { hint, .. } => hint.as_deref(),
            Self::Internal { .. } => Some("Please report this issue"),
        }
    }

    /// Whether the user can recover without restarting.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::Internal { .. })
    }

    /// Get the HTTP status for network errors.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Network { status, .. } => *status,
            _ => None,
        }
    }

    /// Convert to user-displayable error info.
    pub fn to_error_info(&self) -> ErrorInfo {
        ErrorInfo {
            error_type: format!("{} Error", self.category()),
            message: self.to_string(),
            hint: self.hint().map(String::from),
        }
    }
}

/// User-displayable error information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    /// Category name (e.g., "Network Error").
    pub error_type: String,
    /// User-friendly message.
    pub message: String,
    /// Actionable suggestion.
    pub hint: Option<String>,
}

// ========== Error Conversions ==========

impl From<reqwest::Error> for DataChatError {
    fn from(err: reqwest::Error) -> Self {
        let status = err.status().map(|s| s.as_u16());
        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            "Could not connect to the backend".to_string()
        } else if err.is_decode() {
            return DataChatError::Parse {
                message: format!("Unexpected response body: {err}"),
                source: Some(Box::new(err)),
            };
        } else {
            err.to_string()
        };
        DataChatError::Network { message, status, source: Some(Box::new(err)) }
    }
}

impl From<serde_json::Error> for DataChatError {
    fn from(err: serde_json::Error) -> Self {
        DataChatError::Parse { message: format!("JSON error: {err}"), source: Some(Box::new(err)) }
    }
}

impl From<std::io::Error> for DataChatError {
    fn from(err: std::io::Error) -> Self {
        DataChatError::Config {
            message: err.to_string(),
            hint: Some("Check file permissions and disk space".to_string()),
        }
    }
}

impl From<toml::de::Error> for DataChatError {
    fn from(err: toml::de::Error) -> Self {
        DataChatError::Config {
            message: format!("Invalid config file: {err}"),
            hint: Some("Fix the syntax or delete the file to use defaults".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(DataChatError::validation("x").category(), "Validation");
        assert_eq!(DataChatError::network("x").category(), "Network");
        assert_eq!(DataChatError::stream_for("x", "s").category(), "Stream");
        assert_eq!(DataChatError::parse("x").category(), "Parse");
        assert_eq!(DataChatError::config("x").category(), "Config");
        assert_eq!(DataChatError::internal("x").category(), "Internal");
    }

    #[test]
    fn test_validation_message_is_verbatim() {
        let err = DataChatError::validation("Please enter a question");
        assert_eq!(err.to_string(), "Please enter a question");
        assert!(err.hint().is_none());
    }

    #[test]
    fn test_network_hint_depends_on_status() {
        let denied = DataChatError::network_status("forbidden", 403);
        assert_eq!(denied.status(), Some(403));
        assert!(denied.hint().unwrap().contains("allowed"));

        let down = DataChatError::network("refused");
        assert!(down.hint().unwrap().contains("reachable"));
    }

    #[test]
    fn test_recoverability() {
        assert!(DataChatError::stream_for("lost", "s").is_recoverable());
        assert!(DataChatError::network("lost").is_recoverable());
        assert!(!DataChatError::config("bad").is_recoverable());
        assert!(!DataChatError::internal("bug").is_recoverable());
    }

    #[test]
    fn test_error_info() {
        let info = DataChatError::stream_for("channel dropped", "abc").to_error_info();
        assert_eq!(info.error_type, "Stream Error");
        assert_eq!(info.message, "Stream error: channel dropped");
        assert_eq!(info.hint.as_deref(), Some("Send the question again"));
        assert_eq!(DataChatError::stream_for("x", "abc").session_id(), Some("abc"));
        assert_eq!(DataChatError::network("x").session_id(), None);
    }

    #[test]
    fn test_from_serde_json() {
        let err: DataChatError = serde_json::from_str::<serde_json::Value>("{nope").unwrap_err().into();
        assert_eq!(err.category(), "Parse");
    }
}
