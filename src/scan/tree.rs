//! Dockerfile discovery in a repository tree

use super::error::ScanError;
use super::retry::{RemoteCall, RetryingInvoker};
use crate::remote::RepositoryHost;
use crate::source::Source;
use std::sync::Arc;
use tracing::debug;

pub const DOCKERFILE_NAME: &str = "Dockerfile";

/// True when the last path segment is exactly `Dockerfile` (case-sensitive)
pub fn is_dockerfile(path: &str) -> bool {
    path == DOCKERFILE_NAME
        || path
            .strip_suffix(DOCKERFILE_NAME)
            .map(|prefix| prefix.ends_with('/'))
            .unwrap_or(false)
}

/// Lists a source's tree and keeps only Dockerfile blobs
#[derive(Clone)]
pub struct TreeResolver {
    host: Arc<dyn RepositoryHost>,
    invoker: RetryingInvoker,
}

impl TreeResolver {
    pub fn new(host: Arc<dyn RepositoryHost>, invoker: RetryingInvoker) -> Self {
        Self { host, invoker }
    }

    /// Candidate paths in listing order
    pub async fn resolve(&self, source: &Source) -> Result<Vec<String>, ScanError> {
        let entries = self
            .invoker
            .invoke(RemoteCall::Tree { source }, || {
                self.host
                    .get_tree(&source.owner, &source.repo, &source.commit_sha)
            })
            .await?;

        let total = entries.len();
        let candidates: Vec<String> = entries
            .into_iter()
            .filter(|entry| entry.is_blob() && is_dockerfile(&entry.path))
            .map(|entry| entry.path)
            .collect();

        debug!(
            source = %source,
            entries = total,
            dockerfiles = candidates.len(),
            "Resolved repository tree"
        );

        Ok(candidates)
    }
}
