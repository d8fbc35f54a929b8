//! Domain errors for the issue synchronizer.

use thiserror::Error;

/// Domain-level errors raised by sources, the fetch layer and the engine.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Remote returned {status} for {method} {url}: {body}")]
    RemoteStatus {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    #[error("Request to {url} failed: {message}")]
    Transport {
        url: String,
        message: String,
        transient: bool,
    },

    #[error("Could not decode response: {0}")]
    Decode(String),

    #[error("Issue not found: {0}")]
    IssueNotFound(String),

    #[error("Index {index} out of range ({len} items available)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("{operation} is not supported by {source_name}")]
    Unsupported {
        operation: String,
        source_name: String,
    },

    #[error("Sync run cancelled")]
    Cancelled,
}

pub type DomainResult<T> = Result<T, DomainError>;

impl DomainError {
    /// Whether retrying the same call may succeed.
    ///
    /// Rate-limit rejections (429), server errors (5xx), timeouts and
    /// connection failures are transient; everything else is permanent.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RemoteStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Transport { transient, .. } => *transient,
            _ => false,
        }
    }

    /// Turn a remote 404 for `id` into [`DomainError::IssueNotFound`].
    pub fn not_found_for(self, id: &str) -> Self {
        match self {
            Self::RemoteStatus { status: 404, .. } => Self::IssueNotFound(id.to_string()),
            other => other,
        }
    }

    /// Convenience constructor for [`DomainError::Unsupported`].
    pub fn unsupported(operation: impl Into<String>, source_name: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            source_name: source_name.into(),
        }
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        DomainError::Decode(err.to_string())
    }
}

impl From<reqwest::Error> for DomainError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(ToString::to_string).unwrap_or_default();
        if err.is_decode() {
            return DomainError::Decode(err.to_string());
        }
        let transient = err.is_timeout() || err.is_connect() || err.is_request();
        DomainError::Transport {
            url,
            message: err.to_string(),
            transient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16) -> DomainError {
        DomainError::RemoteStatus {
            method: "GET".to_string(),
            url: "https://example.test/x".to_string(),
            status: code,
            body: String::new(),
        }
    }

    #[test]
    fn test_rate_limit_and_server_errors_are_transient() {
        assert!(status(429).is_transient());
        assert!(status(500).is_transient());
        assert!(status(503).is_transient());
    }

    #[test]
    fn test_client_errors_are_permanent() {
        assert!(!status(400).is_transient());
        assert!(!status(401).is_transient());
        assert!(!status(404).is_transient());
        assert!(!DomainError::Cancelled.is_transient());
    }

    #[test]
    fn test_remote_404_maps_to_not_found() {
        assert!(matches!(
            status(404).not_found_for("7"),
            DomainError::IssueNotFound(id) if id == "7"
        ));
        assert!(matches!(status(503).not_found_for("7"), DomainError::RemoteStatus { status: 503, .. }));
    }

    #[test]
    fn test_unsupported_message() {
        let err = DomainError::unsupported("archive_issue", "GitHub");
        assert_eq!(err.to_string(), "archive_issue is not supported by GitHub");
    }
}
