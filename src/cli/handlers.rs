//! Subcommand handlers
//!
//! Each handler returns the process exit code:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Every source and file succeeded |
//! | 1 | Fatal: bad configuration, unreadable list, rate limited, or no source reachable |
//! | 2 | Finished with per-source or per-file failures |
//! | 3 | Cancelled by deadline or Ctrl-C; partial output was still written |

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn, Level};

use super::commands::{ExtractArgs, ScanArgs};
use super::output::{OutputFormat, OutputFormatter};
use crate::config::ScanConfig;
use crate::scan::aggregate::FileImages;
use crate::scan::{
    aggregate, ImageExtractor, ScanReport, ScanStatus, Scanner, DEFAULT_REPOSITORY_BASE_URL,
};
use crate::source::{fetch_source_list, parse_repository_sources, read_source_list};

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_PARTIAL: i32 = 2;
pub const EXIT_CANCELLED: i32 = 3;

pub fn exit_code(status: &ScanStatus) -> i32 {
    match status {
        ScanStatus::Completed => EXIT_SUCCESS,
        ScanStatus::CompletedWithErrors => EXIT_PARTIAL,
        ScanStatus::Aborted(_) => EXIT_FATAL,
        ScanStatus::Cancelled => EXIT_CANCELLED,
    }
}

/// Applies command-line overrides on top of the environment configuration
///
/// `log_level` is the level the subscriber was started with.
pub fn build_config(args: &ScanArgs, log_level: Option<Level>) -> ScanConfig {
    let mut config = ScanConfig::default();

    if let Some(level) = log_level {
        config.log_level = level.as_str().to_lowercase();
    }

    if let Some(ref input) = args.input {
        config.input = Some(input.clone());
    }
    if let Some(ref url) = args.list_url {
        config.list_url = Some(url.clone());
    }
    if let Some(ref token) = args.token {
        config.token = Some(token.clone()).filter(|t| !t.is_empty());
    }
    if let Some(ref api_url) = args.api_url {
        config.api_url = api_url.clone();
    }
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(max_concurrency) = args.max_concurrency {
        config.max_concurrency = max_concurrency;
    }
    if args.dedup_images {
        config.dedup_images = true;
    }

    config
}

pub async fn handle_scan(args: &ScanArgs, log_level: Level, quiet: bool) -> i32 {
    let config = build_config(args, Some(log_level));
    debug!("{}", config);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        eprintln!("Error: {}", e);
        return EXIT_FATAL;
    }

    if !config.is_authenticated() {
        warn!("GITHUB_ACCESS_TOKEN is not set; unauthenticated requests have a much lower rate limit");
    }

    let body = match load_source_list(&config).await {
        Ok(body) => body,
        Err(e) => {
            error!("Failed to load repository list: {:#}", e);
            eprintln!("Error: {:#}", e);
            return EXIT_FATAL;
        }
    };

    let sources = parse_repository_sources(&body);
    if sources.is_empty() {
        warn!("Repository list contains no usable entries");
    } else {
        info!(sources = sources.len(), "Loaded repository list");
    }

    let host = match config.create_host() {
        Ok(host) => host,
        Err(e) => {
            error!("Failed to create GitHub client: {}", e);
            eprintln!("Error: {}", e);
            return EXIT_FATAL;
        }
    };

    let cancel = CancellationToken::new();
    let signal_listener = spawn_ctrl_c_listener(cancel.clone());

    let scanner = Scanner::new(host, config.scanner_config());
    let report = scanner
        .scan_with_timeout(sources, cancel, config.timeout())
        .await;
    signal_listener.abort();

    log_failures(&report);

    let format = OutputFormat::from(args.format);
    if let Err(e) = write_report(&report, format, args.output.as_deref()) {
        error!("Failed to write output: {:#}", e);
        eprintln!("Error: {:#}", e);
        return EXIT_FATAL;
    }

    if !quiet {
        if let Some(ref path) = args.output {
            eprintln!("Output written to {}", path.display());
        }
    }

    exit_code(&report.status)
}

async fn load_source_list(config: &ScanConfig) -> Result<String> {
    if let Some(ref path) = config.input {
        return read_source_list(path).context("Could not read repository list");
    }

    let url = config
        .list_url
        .as_deref()
        .context("REPOSITORY_LIST_URL is not set")?;
    fetch_source_list(url, config.request_timeout())
        .await
        .context("Could not download repository list")
}

fn spawn_ctrl_c_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling scan");
            cancel.cancel();
        }
    })
}

fn log_failures(report: &ScanReport) {
    let registry = report.result.registry();

    for failure in &report.failures {
        let source = registry.get(failure.source);
        match &failure.path {
            Some(path) => warn!(
                owner = %source.owner,
                repo = %source.repo,
                path = %path,
                error = %failure.error,
                "Dockerfile skipped"
            ),
            None => warn!(
                owner = %source.owner,
                repo = %source.repo,
                error = %failure.error,
                help = %failure.error.help_message(),
                "Repository skipped"
            ),
        }
    }

    match &report.status {
        ScanStatus::Aborted(e) => error!(help = %e.help_message(), "Scan aborted: {}", e),
        ScanStatus::Cancelled => warn!("Scan cancelled; output is partial"),
        _ => {}
    }
}

fn write_report(report: &ScanReport, format: OutputFormat, output: Option<&Path>) -> Result<()> {
    let document = aggregate(&report.result, DEFAULT_REPOSITORY_BASE_URL);
    let text = OutputFormatter::new(format).format_report(&document, report)?;
    write_output(&text, output)
}

pub fn handle_extract(args: &ExtractArgs) -> i32 {
    let extractor = ImageExtractor::with_dedup(args.dedup_images);
    let mut files: FileImages = BTreeMap::new();
    let mut failed = false;

    for path in &args.files {
        match fs::read_to_string(path) {
            Ok(content) => {
                let images = extractor.extract(&content);
                debug!(path = %path.display(), images = images.len(), "Extracted images");
                files.insert(path.display().to_string(), images);
            }
            Err(e) => {
                error!(path = %path.display(), "Failed to read file: {}", e);
                eprintln!("Error: failed to read {}: {}", path.display(), e);
                failed = true;
            }
        }
    }

    let format = OutputFormat::from(args.format);
    let written = OutputFormatter::new(format)
        .format_extracted(&files)
        .and_then(|text| write_output(&text, None));

    if let Err(e) = written {
        error!("Failed to write output: {:#}", e);
        return EXIT_FATAL;
    }

    if failed {
        EXIT_PARTIAL
    } else {
        EXIT_SUCCESS
    }
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    let mut text = text.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }

    match output {
        Some(path) => fs::write(path, text)
            .with_context(|| format!("Failed to write output file {}", path.display())),
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(text.as_bytes())
                .and_then(|_| stdout.flush())
                .context("Failed to write to stdout")
        }
    }
}
