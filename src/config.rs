//! Configuration management for dockerfile-sources
//!
//! Settings are loaded from environment variables with sensible defaults.
//! Command-line flags are applied on top by the CLI handlers, after which
//! [`ScanConfig::validate`] must pass before a scan starts.
//!
//! # Environment Variables
//!
//! - `REPOSITORY_LIST_URL`: URL of the `<git-url> <sha>` list - required unless `--input` is given
//! - `GITHUB_ACCESS_TOKEN`: Bearer token for the GitHub API - optional, unauthenticated when absent
//! - `GITHUB_API_URL`: API base URL - default: "https://api.github.com"
//! - `DOCKERFILE_SOURCES_TIMEOUT`: Whole-scan deadline in seconds - default: "300"
//! - `DOCKERFILE_SOURCES_REQUEST_TIMEOUT`: Per-request timeout in seconds - default: "30"
//! - `DOCKERFILE_SOURCES_MAX_CONCURRENCY`: Remote calls in flight - default: "16"
//! - `DOCKERFILE_SOURCES_RETRY_MAX_ELAPSED`: Retry budget per call in seconds - default: "30"
//! - `DOCKERFILE_SOURCES_DEDUP_IMAGES`: Drop repeated images within a file (true|false) - default: "false"
//! - `DOCKERFILE_SOURCES_LOG_LEVEL`: Logging level - default: "info"
//!
//! # Example
//!
//! ```no_run
//! use dockerfile_sources::ScanConfig;
//! use std::env;
//!
//! env::set_var("REPOSITORY_LIST_URL", "https://example.com/repos.txt");
//!
//! let config = ScanConfig::default();
//! config.validate().expect("Invalid configuration");
//!
//! let host = config.create_host().expect("GitHub client");
//! let scanner_config = config.scanner_config();
//! # let _ = (host, scanner_config);
//! ```

use crate::remote::github::{GitHubClient, DEFAULT_API_URL};
use crate::remote::{RemoteError, RepositoryHost};
use crate::scan::{ImageExtractor, RetryPolicy, ScannerConfig};
use reqwest::Url;
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_CONCURRENCY: usize = crate::scan::orchestrator::DEFAULT_MAX_CONCURRENCY;
const DEFAULT_RETRY_MAX_ELAPSED_SECS: u64 = 30;
const DEFAULT_DEDUP_IMAGES: bool = false;

const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_CONCURRENCY: usize = 256;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither a list URL nor an input file was given
    #[error("Repository list not specified. Set REPOSITORY_LIST_URL or pass --list-url / --input")]
    MissingListUrl,

    /// A URL setting could not be used
    #[error("Invalid URL for {field}: {value} ({reason})")]
    InvalidUrl {
        field: String,
        value: String,
        reason: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),

    /// GitHub client construction failed
    #[error("GitHub client initialization failed: {0}")]
    HostInitError(#[from] RemoteError),
}

/// Settings for one scan run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Where to download the repository list from
    pub list_url: Option<String>,

    /// Local repository list; takes precedence over `list_url` (`-` is stdin)
    pub input: Option<PathBuf>,

    /// GitHub bearer token
    pub token: Option<String>,

    /// GitHub REST API base URL
    pub api_url: String,

    /// Whole-scan deadline in seconds
    pub timeout_secs: u64,

    /// Per HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// Remote calls in flight at once
    pub max_concurrency: usize,

    /// Retry budget for one remote call in seconds
    pub retry_max_elapsed_secs: u64,

    /// Keep only the first occurrence of each image within a file
    pub dedup_images: bool,

    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

fn env_parsed<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Default for ScanConfig {
    /// Loads configuration from environment variables, falling back to defaults
    fn default() -> Self {
        let list_url = env_non_empty("REPOSITORY_LIST_URL");
        let token = env_non_empty("GITHUB_ACCESS_TOKEN");
        let api_url =
            env_non_empty("GITHUB_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string());

        let timeout_secs =
            env_parsed("DOCKERFILE_SOURCES_TIMEOUT").unwrap_or(DEFAULT_TIMEOUT_SECS);
        let request_timeout_secs = env_parsed("DOCKERFILE_SOURCES_REQUEST_TIMEOUT")
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS);
        let max_concurrency =
            env_parsed("DOCKERFILE_SOURCES_MAX_CONCURRENCY").unwrap_or(DEFAULT_MAX_CONCURRENCY);
        let retry_max_elapsed_secs = env_parsed("DOCKERFILE_SOURCES_RETRY_MAX_ELAPSED")
            .unwrap_or(DEFAULT_RETRY_MAX_ELAPSED_SECS);
        let dedup_images =
            env_parsed("DOCKERFILE_SOURCES_DEDUP_IMAGES").unwrap_or(DEFAULT_DEDUP_IMAGES);

        let log_level = env::var("DOCKERFILE_SOURCES_LOG_LEVEL")
            .unwrap_or_else(|_| DEFAULT_LOG_LEVEL.to_string())
            .to_lowercase();

        Self {
            list_url,
            input: None,
            token,
            api_url,
            timeout_secs,
            request_timeout_secs,
            max_concurrency,
            retry_max_elapsed_secs,
            dedup_images,
            log_level,
        }
    }
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidUrl {
        field: field.to_string(),
        value: value.to_string(),
        reason,
    };

    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(invalid(format!("unsupported scheme '{}'", other))),
    }
}

fn validate_seconds(name: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::ValidationFailed(format!(
            "{} must be at least 1 second",
            name
        )));
    }
    if value > MAX_TIMEOUT_SECS {
        return Err(ConfigError::ValidationFailed(format!(
            "{} cannot exceed {} seconds",
            name, MAX_TIMEOUT_SECS
        )));
    }
    Ok(())
}

impl ScanConfig {
    /// Validates the configuration
    ///
    /// Checks that:
    /// - A repository list is available (input file or absolute http(s) URL)
    /// - The API URL is an absolute http(s) URL
    /// - Timeouts and the retry budget are within 1..=3600 seconds
    /// - Concurrency is within 1..=256
    /// - Log level is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.is_none() {
            let list_url = self.list_url.as_deref().ok_or(ConfigError::MissingListUrl)?;
            validate_http_url("REPOSITORY_LIST_URL", list_url)?;
        }

        validate_http_url("GITHUB_API_URL", &self.api_url)?;

        validate_seconds("Scan timeout", self.timeout_secs)?;
        validate_seconds("Request timeout", self.request_timeout_secs)?;
        validate_seconds("Retry budget", self.retry_max_elapsed_secs)?;

        if self.max_concurrency == 0 || self.max_concurrency > MAX_CONCURRENCY {
            return Err(ConfigError::ValidationFailed(format!(
                "Max concurrency must be between 1 and {}, got {}",
                MAX_CONCURRENCY, self.max_concurrency
            )));
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(ConfigError::ValidationFailed(format!(
                    "Invalid log level: {}. Valid options: trace, debug, info, warn, error",
                    self.log_level
                )))
            }
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// Pipeline settings derived from this configuration
    pub fn scanner_config(&self) -> ScannerConfig {
        ScannerConfig {
            max_concurrency: self.max_concurrency,
            retry: RetryPolicy::with_max_elapsed(Duration::from_secs(self.retry_max_elapsed_secs)),
            extractor: ImageExtractor::with_dedup(self.dedup_images),
        }
    }

    /// Creates the GitHub-backed repository host
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::HostInitError` if the API URL cannot be parsed or
    /// the HTTP client cannot be built.
    pub fn create_host(&self) -> Result<Arc<dyn RepositoryHost>, ConfigError> {
        let client = GitHubClient::new(&self.api_url, self.token.clone(), self.request_timeout())?;
        Ok(Arc::new(client))
    }
}

impl fmt::Display for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Scan Configuration:")?;
        match (&self.input, &self.list_url) {
            (Some(path), _) => writeln!(f, "  Repository List: {}", path.display())?,
            (None, Some(url)) => writeln!(f, "  Repository List: {}", url)?,
            (None, None) => writeln!(f, "  Repository List: (not set)")?,
        }
        writeln!(f, "  API URL: {}", self.api_url)?;
        writeln!(
            f,
            "  Token: {}",
            if self.is_authenticated() { "set" } else { "not set" }
        )?;
        writeln!(f, "  Timeout: {}s", self.timeout_secs)?;
        writeln!(f, "  Request Timeout: {}s", self.request_timeout_secs)?;
        writeln!(f, "  Max Concurrency: {}", self.max_concurrency)?;
        writeln!(f, "  Retry Budget: {}s", self.retry_max_elapsed_secs)?;
        writeln!(f, "  Dedup Images: {}", self.dedup_images)?;
        writeln!(f, "  Log Level: {}", self.log_level)?;
        Ok(())
    }
}
