//! GitHub REST API implementation of [`RepositoryHost`]

use super::{FileContent, RateLimit, RemoteError, RepositoryHost, TreeEntry};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const RATE_REMAINING_HEADER: &str = "x-ratelimit-remaining";
const RATE_RESET_HEADER: &str = "x-ratelimit-reset";

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// GitHub client for tree listings and file contents
///
/// Requests are unauthenticated unless a token is supplied, in which case
/// it is sent as a bearer token. The client is cheap to share behind `Arc`.
pub struct GitHubClient {
    http_client: Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(
        api_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RemoteError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| RemoteError::transport(format!("invalid API URL {}: {}", api_url, e)))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            api_url,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    fn endpoint<'a>(
        &self,
        segments: impl IntoIterator<Item = &'a str>,
    ) -> Result<Url, RemoteError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::transport(format!("API URL {} cannot be a base", self.api_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, RemoteError> {
        debug!(%url, "GET");

        let mut request = self
            .http_client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header(USER_AGENT, concat!("dockerfile-sources/", env!("CARGO_PKG_VERSION")))
            .header("X-GitHub-Api-Version", API_VERSION);

        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let rate_limit = rate_limit_from_headers(response.headers());
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                });

            let mut error = RemoteError::http(status.as_u16(), message);
            if let Some(rate_limit) = rate_limit {
                error = error.with_rate_limit(rate_limit);
            }
            return Err(error);
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;

        serde_json::from_slice(&body).map_err(|e| {
            RemoteError::http(status.as_u16(), format!("unexpected response body: {}", e))
        })
    }
}

#[async_trait]
impl RepositoryHost for GitHubClient {
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        let mut url = self.endpoint(["repos", owner, repo, "git", "trees", commit_sha])?;
        url.query_pairs_mut().append_pair("recursive", "1");

        let response: TreeResponse = self.get_json(url).await?;
        if response.truncated {
            warn!(
                owner,
                repo,
                commit_sha,
                entries = response.tree.len(),
                "Tree listing was truncated by GitHub; some Dockerfiles may be missed"
            );
        }

        Ok(response.tree)
    }

    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent, RemoteError> {
        let segments = ["repos", owner, repo, "contents"]
            .into_iter()
            .chain(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("ref", reference);

        self.get_json(url).await
    }

    fn name(&self) -> &str {
        "github"
    }
}

/// Extract quota information from GitHub's rate-limit headers
fn rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimit> {
    let header_u64 = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
    };

    let remaining = header_u64(RATE_REMAINING_HEADER)?;
    let reset_secs = header_u64(RATE_RESET_HEADER)?;
    let reset_at = Utc.timestamp_opt(i64::try_from(reset_secs).ok()?, 0).single()?;

    Some(RateLimit {
        remaining,
        reset_at,
    })
}
