//! dockerfile-sources - base image inventory for GitHub repositories
//!
//! Given a list of repositories pinned to commits, this library walks each
//! repository tree, fetches every file named `Dockerfile`, and reports the
//! base images referenced by their `FROM` instructions.
//!
//! # Core Concepts
//!
//! - **Sources**: a repository at one commit, parsed from a
//!   `<git-url> <sha>` list and held in a [`SourceRegistry`]
//! - **Repository host**: the [`RepositoryHost`] capability that lists trees
//!   and returns file contents ([`GitHubClient`] in production)
//! - **Scan**: the concurrent, retrying pipeline driven by [`Scanner`]
//! - **Output**: [`DockerfileSources`], a sorted
//!   repository → path → images mapping
//!
//! # Example Usage
//!
//! ```no_run
//! use dockerfile_sources::{
//!     aggregate, parse_repository_sources, GitHubClient, Scanner, ScannerConfig,
//!     DEFAULT_REPOSITORY_BASE_URL,
//! };
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sources = parse_repository_sources(
//!     "https://github.com/app-sre/qontract-reconcile.git 30af65af14a2dce962df923446afff24dd8f123e",
//! );
//!
//! let host = GitHubClient::new("https://api.github.com", None, Duration::from_secs(30))?;
//! let scanner = Scanner::new(Arc::new(host), ScannerConfig::default());
//!
//! let report = scanner.scan(sources, CancellationToken::new()).await;
//! let output = aggregate(&report.result, DEFAULT_REPOSITORY_BASE_URL);
//! println!("{}", serde_json::to_string_pretty(&output)?);
//! # Ok(())
//! # }
//! ```
//!
//! # Project Structure
//!
//! - [`source`]: repository list retrieval, parsing, and the source registry
//! - [`remote`]: the repository host capability, GitHub client, and test mock
//! - [`scan`]: tree resolution, content fetching, retries, extraction,
//!   orchestration, and aggregation
//! - [`config`]: environment-driven configuration
//! - [`cli`]: command-line arguments, handlers, and output formatting

pub mod cli;
pub mod config;
pub mod remote;
pub mod scan;
pub mod source;
pub mod util;

pub use config::{ConfigError, ScanConfig};
pub use remote::github::GitHubClient;
pub use remote::{RemoteError, RepositoryHost};
pub use scan::{
    aggregate, extract_images, DockerfileSources, ImageExtractor, ScanError, ScanReport,
    ScanResult, ScanStatus, Scanner, ScannerConfig, DEFAULT_REPOSITORY_BASE_URL,
};
pub use source::{parse_repository_sources, Source, SourceId, SourceRegistry};
pub use util::{cli_config, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
