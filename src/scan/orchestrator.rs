//! Concurrent scan orchestration
//!
//! # Architecture
//!
//! ```text
//! Scanner::scan
//!   ├── one task per source ── TreeResolver::resolve
//!   │     └── one task per Dockerfile ── ContentFetcher::fetch → ImageExtractor
//!   └── collector ◄── mpsc (ScanEvent) ── every task
//! ```
//!
//! A single semaphore caps the number of outstanding remote calls across
//! both levels, so the task count may grow with the number of files but the
//! connection count does not. The collector is the only reader of the
//! channel; it stops when every producer has dropped its sender or when the
//! scan token is cancelled, then sorts what it gathered into a
//! [`ScanResult`].

use super::content::ContentFetcher;
use super::error::ScanError;
use super::extract::ImageExtractor;
use super::result::{DockerfileRecord, ScanResult};
use super::retry::{RetryPolicy, RetryingInvoker};
use super::tree::TreeResolver;
use crate::remote::RepositoryHost;
use crate::source::{Source, SourceId, SourceRegistry};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

#[derive(Debug, Clone)]
pub struct ScannerConfig {
    /// Upper bound on remote calls in flight at once
    pub max_concurrency: usize,
    pub retry: RetryPolicy,
    pub extractor: ImageExtractor,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            retry: RetryPolicy::default(),
            extractor: ImageExtractor::default(),
        }
    }
}

/// A failure attributed to one source, or to one file when `path` is set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub source: SourceId,
    pub path: Option<String>,
    pub error: ScanError,
}

impl ScanFailure {
    pub fn is_source_level(&self) -> bool {
        self.path.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every source and file succeeded
    Completed,
    /// Some sources or files failed; everything else is in the result
    CompletedWithErrors,
    /// Stopped early: rate limited, or no source could be reached
    Aborted(ScanError),
    /// The caller's token fired (signal or deadline)
    Cancelled,
}

/// Everything a scan produced
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub result: ScanResult,
    pub failures: Vec<ScanFailure>,
    pub status: ScanStatus,
}

impl ScanReport {
    /// Summary error for the caller
    ///
    /// `None` only when no source failed tree resolution and the scan ran to
    /// completion. Per-file failures alone do not produce an error.
    pub fn error(&self) -> Option<ScanError> {
        match &self.status {
            ScanStatus::Aborted(error) => Some(error.clone()),
            ScanStatus::Cancelled => Some(ScanError::Cancelled),
            _ => self
                .failures
                .iter()
                .find(|f| f.is_source_level())
                .map(|f| f.error.clone()),
        }
    }

    pub fn source_failures(&self) -> impl Iterator<Item = &ScanFailure> {
        self.failures.iter().filter(|f| f.is_source_level())
    }

    pub fn file_failures(&self) -> impl Iterator<Item = &ScanFailure> {
        self.failures.iter().filter(|f| !f.is_source_level())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self.status, ScanStatus::Aborted(_))
    }

    pub fn into_parts(self) -> (ScanResult, Option<ScanError>) {
        let error = self.error();
        (self.result, error)
    }
}

enum ScanEvent {
    Record(DockerfileRecord),
    Failure(ScanFailure),
}

/// Sole reader of the event channel
#[derive(Default)]
struct Collector {
    records: Vec<DockerfileRecord>,
    failures: Vec<ScanFailure>,
    fatal: Option<ScanError>,
}

impl Collector {
    fn handle(&mut self, event: ScanEvent, scan_token: &CancellationToken) {
        match event {
            ScanEvent::Record(record) => self.records.push(record),
            ScanEvent::Failure(failure) => {
                if failure.error.is_fatal() && self.fatal.is_none() {
                    error!(error = %failure.error, "Fatal error, stopping scan");
                    self.fatal = Some(failure.error.clone());
                    scan_token.cancel();
                }
                self.failures.push(failure);
            }
        }
    }
}

/// Shared, read-only state handed to every task of one scan
struct ScanContext {
    registry: Arc<SourceRegistry>,
    resolver: TreeResolver,
    fetcher: ContentFetcher,
    extractor: ImageExtractor,
    permits: Arc<Semaphore>,
    cancel: CancellationToken,
}

impl ScanContext {
    /// Waits for a remote-call slot; `None` once the scan is cancelled
    async fn acquire(&self) -> Option<OwnedSemaphorePermit> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            permit = self.permits.clone().acquire_owned() => permit.ok(),
        }
    }
}

/// Discovers Dockerfiles across many sources concurrently
pub struct Scanner {
    host: Arc<dyn RepositoryHost>,
    config: ScannerConfig,
}

impl Scanner {
    pub fn new(host: Arc<dyn RepositoryHost>, config: ScannerConfig) -> Self {
        Self { host, config }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    /// Scan with an additional deadline; hitting it behaves like cancellation
    pub async fn scan_with_timeout(
        &self,
        sources: impl IntoIterator<Item = Source>,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> ScanReport {
        let deadline = cancel.child_token();
        let timer = {
            let deadline = deadline.clone();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                warn!(timeout_secs = timeout.as_secs(), "Scan deadline reached, cancelling");
                deadline.cancel();
            })
        };

        let report = self.scan(sources, deadline).await;
        timer.abort();
        report
    }

    pub async fn scan(
        &self,
        sources: impl IntoIterator<Item = Source>,
        cancel: CancellationToken,
    ) -> ScanReport {
        let registry = Arc::new(SourceRegistry::new(sources));
        if registry.is_empty() {
            debug!("No sources to scan");
            return ScanReport {
                result: ScanResult::empty(registry),
                failures: Vec::new(),
                status: ScanStatus::Completed,
            };
        }

        info!(
            sources = registry.len(),
            max_concurrency = self.config.max_concurrency,
            host = self.host.name(),
            "Starting scan"
        );

        // Internal token: a fatal error stops our tasks without cancelling the caller's token
        let scan_token = cancel.child_token();
        let invoker = RetryingInvoker::new(self.config.retry.clone(), scan_token.clone());
        let ctx = Arc::new(ScanContext {
            registry: registry.clone(),
            resolver: TreeResolver::new(self.host.clone(), invoker.clone()),
            fetcher: ContentFetcher::new(self.host.clone(), invoker),
            extractor: self.config.extractor,
            permits: Arc::new(Semaphore::new(self.config.max_concurrency.max(1))),
            cancel: scan_token.clone(),
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        for (id, _) in registry.iter() {
            tasks.spawn(scan_source(ctx.clone(), id, tx.clone()));
        }
        drop(tx);

        let mut collector = Collector::default();
        loop {
            tokio::select! {
                biased;
                event = rx.recv() => match event {
                    Some(event) => collector.handle(event, &scan_token),
                    None => break,
                },
                _ = scan_token.cancelled() => {
                    while let Ok(event) = rx.try_recv() {
                        collector.handle(event, &scan_token);
                    }
                    break;
                }
            }
        }

        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                if e.is_panic() {
                    error!(error = %e, "Source scan task panicked");
                }
            }
        }
        drop(rx);

        let Collector {
            records,
            failures,
            fatal,
        } = collector;
        let status = scan_status(&registry, &failures, fatal, cancel.is_cancelled());
        let result = ScanResult::from_records(registry, records);

        info!(
            dockerfiles = result.len(),
            failures = failures.len(),
            status = ?status,
            "Scan finished"
        );

        ScanReport {
            result,
            failures,
            status,
        }
    }
}

fn scan_status(
    registry: &SourceRegistry,
    failures: &[ScanFailure],
    fatal: Option<ScanError>,
    cancelled: bool,
) -> ScanStatus {
    if let Some(error) = fatal {
        return ScanStatus::Aborted(error);
    }
    if cancelled {
        return ScanStatus::Cancelled;
    }

    let unreachable: Vec<&ScanFailure> = failures
        .iter()
        .filter(|f| {
            f.is_source_level() && matches!(f.error, ScanError::RemoteUnavailable { .. })
        })
        .collect();
    if !registry.is_empty() && unreachable.len() == registry.len() {
        return ScanStatus::Aborted(unreachable[0].error.clone());
    }

    if failures.is_empty() {
        ScanStatus::Completed
    } else {
        ScanStatus::CompletedWithErrors
    }
}

async fn scan_source(ctx: Arc<ScanContext>, id: SourceId, tx: UnboundedSender<ScanEvent>) {
    let source = ctx.registry.get(id);

    let resolved = {
        let Some(_permit) = ctx.acquire().await else {
            return;
        };
        ctx.resolver.resolve(source).await
    };

    let paths = match resolved {
        Ok(paths) => paths,
        Err(ScanError::Cancelled) => return,
        Err(error) => {
            warn!(source = %source, error = %error, "Skipping source");
            let _ = tx.send(ScanEvent::Failure(ScanFailure {
                source: id,
                path: None,
                error,
            }));
            return;
        }
    };

    if paths.is_empty() {
        debug!(source = %source, "No Dockerfiles found");
        return;
    }

    let mut files = JoinSet::new();
    for path in paths {
        files.spawn(scan_file(ctx.clone(), id, path, tx.clone()));
    }
    while files.join_next().await.is_some() {}

    debug!(source = %source, "Source complete");
}

async fn scan_file(
    ctx: Arc<ScanContext>,
    id: SourceId,
    path: String,
    tx: UnboundedSender<ScanEvent>,
) {
    let source = ctx.registry.get(id);

    let fetched = {
        let Some(_permit) = ctx.acquire().await else {
            return;
        };
        ctx.fetcher.fetch(source, &path).await
    };

    let event = match fetched {
        Ok(text) => {
            let images = ctx.extractor.extract(&text);
            debug!(source = %source, path = %path, images = images.len(), "Extracted images");
            ScanEvent::Record(DockerfileRecord {
                source: id,
                path,
                images,
            })
        }
        Err(ScanError::Cancelled) => return,
        Err(error) => {
            warn!(source = %source, path = %path, error = %error, "Skipping Dockerfile");
            ScanEvent::Failure(ScanFailure {
                source: id,
                path: Some(path),
                error,
            })
        }
    };

    let _ = tx.send(event);
}
