//! Scan error taxonomy

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Every way a scan step can fail
///
/// Per-file variants (`FileNotFound`, `ContentDecode`) are reported and
/// skipped. Tree-level failures drop one source. `RateLimited` stops the
/// whole scan because every further call would fail the same way.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Repository or commit not found: {repository}")]
    RepositoryNotFound { repository: String },

    #[error("File not found: {repository} path {path}")]
    FileNotFound { repository: String, path: String },

    #[error("GitHub API rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: DateTime<Utc> },

    #[error("Access forbidden (HTTP {status}) for {context}: {message}")]
    RemoteAccessDenied {
        status: u16,
        context: String,
        message: String,
    },

    #[error("Request rejected (HTTP {status}) for {context}: {message}")]
    RemoteRejected {
        status: u16,
        context: String,
        message: String,
    },

    #[error("Remote unavailable for {context}{}: {message}", status_suffix(.status))]
    RemoteUnavailable {
        context: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Unexpected response for {context}: {message}")]
    MalformedResponse { context: String, message: String },

    #[error("Failed to decode content of {repository} path {path}: {message}")]
    ContentDecode {
        repository: String,
        path: String,
        message: String,
    },

    #[error("Scan cancelled")]
    Cancelled,
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|s| format!(" (last status HTTP {})", s))
        .unwrap_or_default()
}

impl ScanError {
    /// True when continuing the scan is futile
    pub fn is_fatal(&self) -> bool {
        matches!(self, ScanError::RateLimited { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScanError::Cancelled)
    }

    /// Returns a user-friendly error message with troubleshooting hints
    pub fn help_message(&self) -> String {
        match self {
            ScanError::RateLimited { reset_at } => format!(
                "Error: GitHub API rate limit exceeded\n\n\
                 Help: The quota resets at {}. Try:\n\
                 - Set GITHUB_ACCESS_TOKEN to raise the limit\n\
                 - Re-run after the reset time\n\
                 - Lower --max-concurrency",
                reset_at
            ),
            ScanError::RemoteAccessDenied { status, .. } => format!(
                "Error: Access denied (HTTP {})\n\n\
                 Help: Check that GITHUB_ACCESS_TOKEN is valid and can read the repository.\n\n\
                 Details: {}",
                status, self
            ),
            ScanError::RemoteUnavailable { .. } => format!(
                "Error: GitHub API unavailable\n\n\
                 Help: Retries were exhausted. Try:\n\
                 - Check network connectivity\n\
                 - Check https://www.githubstatus.com\n\
                 - Increase DOCKERFILE_SOURCES_RETRY_MAX_ELAPSED\n\n\
                 Details: {}",
                self
            ),
            _ => format!("Error: {}", self),
        }
    }
}
