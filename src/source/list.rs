//! Retrieval of the repository list text

use reqwest::Client;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SourceListError {
    #[error("Failed to fetch repository list from {url}: {message}")]
    Request { url: String, message: String },

    #[error("Repository list request to {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Failed to read repository list from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Download the repository list from `url`
pub async fn fetch_source_list(url: &str, timeout: Duration) -> Result<String, SourceListError> {
    let request_error = |e: reqwest::Error| SourceListError::Request {
        url: url.to_string(),
        message: e.to_string(),
    };

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(request_error)?;

    info!(url, "Fetching repository list");
    let response = client.get(url).send().await.map_err(request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceListError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    let body = response.text().await.map_err(request_error)?;
    debug!(bytes = body.len(), "Repository list downloaded");
    Ok(body)
}

/// Read the repository list from a file, or from stdin when `path` is `-`
pub fn read_source_list(path: &Path) -> Result<String, SourceListError> {
    let io_error = |source| SourceListError::Io {
        path: path.to_path_buf(),
        source,
    };

    if path == Path::new("-") {
        let mut body = String::new();
        std::io::stdin()
            .read_to_string(&mut body)
            .map_err(io_error)?;
        return Ok(body);
    }

    std::fs::read_to_string(path).map_err(io_error)
}
