//! Dockerfile discovery and base image extraction pipeline
//!
//! Data flows leaves-first:
//!
//! ```text
//! Source ─► TreeResolver ─► paths ─► ContentFetcher (via RetryingInvoker)
//!        ─► ImageExtractor ─► DockerfileRecord ─► Scanner collector
//!        ─► ScanResult ─► aggregate ─► DockerfileSources
//! ```

pub mod aggregate;
pub mod content;
pub mod error;
pub mod extract;
pub mod orchestrator;
pub mod result;
pub mod retry;
pub mod tree;

pub use aggregate::{aggregate, DockerfileSources, DEFAULT_REPOSITORY_BASE_URL};
pub use content::{decode_content, ContentFetcher};
pub use error::ScanError;
pub use extract::{extract_images, ImageExtractor};
pub use orchestrator::{ScanFailure, ScanReport, ScanStatus, Scanner, ScannerConfig};
pub use result::{DockerfileRecord, ScanResult};
pub use retry::{RemoteCall, RetryOutcome, RetryPolicy, RetryingInvoker};
pub use tree::{is_dockerfile, TreeResolver};
