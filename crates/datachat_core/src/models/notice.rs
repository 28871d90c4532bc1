//! Transient user-facing notifications.

use crate::error::DataChatError;

/// Severity of a notice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational message
    #[default]
    Info,
    /// Something worked
    Success,
    /// Rejected input, nothing changed
    Warning,
    /// A request failed
    Error,
}

impl NoticeLevel {
    /// Short label for terminal output.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "ok",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A transient notification surfaced to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Severity
    pub level: NoticeLevel,
    /// Message text
    pub message: String,
    /// Optional follow-up suggestion
    pub hint: Option<String>,
}

impl Notice {
    /// Create a notice.
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self { level, message: message.into(), hint: None }
    }

    /// Info notice.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Info, message)
    }

    /// Success notice.
    pub fn success(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Success, message)
    }

    /// Warning notice.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Warning, message)
    }

    /// Error notice.
    pub fn error(message: impl Into<String>) -> Self {
        Self::new(NoticeLevel::Error, message)
    }

    /// Attach a hint.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Notice for an error: validation problems warn, everything else errors.
    pub fn from_error(err: &DataChatError) -> Self {
        let level = match err {
            DataChatError::Validation { .. } => NoticeLevel::Warning,
            _ => NoticeLevel::Error,
        };
        let info = err.to_error_info();
        Self { level, message: info.message, hint: info.hint }
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.level.label(), self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_validation_error_is_warning() {
        let notice = Notice::from_error(&DataChatError::validation("Select a connection first"));
        assert_eq!(notice.level, NoticeLevel::Warning);
        assert_eq!(notice.message, "Select a connection first");
        assert_eq!(notice.hint, None);
    }

    #[test]
    fn test_from_network_error_is_error_with_hint() {
        let notice = Notice::from_error(&DataChatError::network("connection refused"));
        assert_eq!(notice.level, NoticeLevel::Error);
        assert!(notice.hint.is_some());
    }

    #[test]
    fn test_display() {
        let notice = Notice::warning("careful").with_hint("really");
        assert_eq!(notice.to_string(), "[warning] careful (really)");
        assert_eq!(Notice::info("hi").to_string(), "[info] hi");
    }
}
