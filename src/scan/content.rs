//! Dockerfile content retrieval and transport decoding

use super::error::ScanError;
use super::retry::{RemoteCall, RetryingInvoker};
use crate::remote::{FileContent, RepositoryHost};
use crate::source::Source;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::sync::Arc;

/// Turn the host's payload into text
///
/// GitHub wraps base64 at 60 columns, so ASCII whitespace is stripped before
/// decoding. Payloads with no encoding (or `utf-8`) are already text.
pub fn decode_content(content: &FileContent) -> Result<String, String> {
    match content.encoding.as_str() {
        "base64" => {
            let compact: Vec<u8> = content
                .content
                .bytes()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            let bytes = STANDARD
                .decode(compact)
                .map_err(|e| format!("invalid base64: {}", e))?;
            String::from_utf8(bytes).map_err(|e| format!("not valid UTF-8: {}", e))
        }
        "" | "utf-8" => Ok(content.content.clone()),
        other => Err(format!("unsupported encoding '{}'", other)),
    }
}

#[derive(Clone)]
pub struct ContentFetcher {
    host: Arc<dyn RepositoryHost>,
    invoker: RetryingInvoker,
}

impl ContentFetcher {
    pub fn new(host: Arc<dyn RepositoryHost>, invoker: RetryingInvoker) -> Self {
        Self { host, invoker }
    }

    /// Fetch `path` at the source's commit and decode it to text
    pub async fn fetch(&self, source: &Source, path: &str) -> Result<String, ScanError> {
        let payload = self
            .invoker
            .invoke(RemoteCall::Content { source, path }, || {
                self.host
                    .get_content(&source.owner, &source.repo, path, &source.commit_sha)
            })
            .await?;

        decode_content(&payload).map_err(|message| ScanError::ContentDecode {
            repository: source.to_string(),
            path: path.to_string(),
            message,
        })
    }
}
