//! Remote repository capability
//!
//! The scanner never talks to a Git host directly. It goes through the
//! [`RepositoryHost`] trait, which exposes exactly the two calls the
//! pipeline needs: a flat tree listing at a commit and the raw content of a
//! single file at that commit. [`github::GitHubClient`] is the production
//! implementation; [`mock::MockRepositoryHost`] scripts responses for tests.

pub mod github;
pub mod mock;

pub use github::GitHubClient;
pub use mock::MockRepositoryHost;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of an entry in a repository tree listing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointers and anything else the host may report
    #[serde(other)]
    Other,
}

/// One entry from a repository's flat file listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl TreeEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
        }
    }

    pub fn is_blob(&self) -> bool {
        self.kind == EntryKind::Blob
    }
}

/// File content as delivered by the host, still transport-encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub encoding: String,
}

/// Quota state reported alongside an HTTP failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

impl RateLimit {
    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }
}

/// Raw failure of a capability call
///
/// `status` is `None` when no response was received at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
    pub rate_limit: Option<RateLimit>,
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            rate_limit: None,
        }
    }

    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            rate_limit: None,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimit) -> Self {
        self.rate_limit = Some(rate_limit);
        self
    }

    /// The request succeeded but its body could not be understood
    pub fn is_malformed_body(&self) -> bool {
        matches!(self.status, Some(status) if (200..300).contains(&status))
    }

    /// Forbidden-class response with no quota left
    pub fn is_quota_exhausted(&self) -> bool {
        self.status == Some(403) && self.reports_empty_quota()
    }

    /// Quota headers were present and showed nothing remaining
    pub fn reports_empty_quota(&self) -> bool {
        self.rate_limit.map(|r| r.is_exhausted()).unwrap_or(false)
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "transport error: {}", self.message),
        }
    }
}

impl std::error::Error for RemoteError {}

/// Capability interface onto a Git hosting service
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Full recursive listing of `commit_sha`
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError>;

    /// Content of `path` as of `reference`
    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent, RemoteError>;

    /// Human-readable name, for logs
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_deserializes_github_shape() {
        let json = r#"[
            {"path": "Dockerfile", "mode": "100644", "type": "blob", "sha": "abc"},
            {"path": "docs", "mode": "040000", "type": "tree", "sha": "def"},
            {"path": "vendor/lib", "mode": "160000", "type": "commit", "sha": "123"}
        ]"#;
        let entries: Vec<TreeEntry> = serde_json::from_str(json).unwrap();
        assert_eq!(entries[0], TreeEntry::blob("Dockerfile"));
        assert_eq!(entries[1], TreeEntry::tree("docs"));
        assert_eq!(entries[2].kind, EntryKind::Other);
    }

    #[test]
    fn test_remote_error_display() {
        assert_eq!(
            RemoteError::http(502, "Bad Gateway").to_string(),
            "HTTP 502: Bad Gateway"
        );
        assert_eq!(
            RemoteError::transport("connection reset").to_string(),
            "transport error: connection reset"
        );
    }

    #[test]
    fn test_malformed_body_only_on_success_status() {
        assert!(RemoteError::http(200, "unexpected response body").is_malformed_body());
        assert!(!RemoteError::http(404, "Not Found").is_malformed_body());
        assert!(!RemoteError::transport("connection reset").is_malformed_body());
    }

    #[test]
    fn test_quota_exhaustion_requires_zero_remaining() {
        let reset_at = Utc::now();
        let exhausted = RemoteError::http(403, "rate limit").with_rate_limit(RateLimit {
            remaining: 0,
            reset_at,
        });
        assert!(exhausted.is_quota_exhausted());

        let has_quota = RemoteError::http(403, "forbidden").with_rate_limit(RateLimit {
            remaining: 12,
            reset_at,
        });
        assert!(!has_quota.is_quota_exhausted());

        assert!(!RemoteError::http(403, "forbidden").is_quota_exhausted());

        let throttled = RemoteError::http(429, "Too Many Requests").with_rate_limit(RateLimit {
            remaining: 0,
            reset_at,
        });
        assert!(throttled.reports_empty_quota());
        assert!(!throttled.is_quota_exhausted());

        assert!(!RemoteError::http(500, "oops")
            .with_rate_limit(RateLimit {
                remaining: 0,
                reset_at
            })
            .is_quota_exhausted());
    }
}
