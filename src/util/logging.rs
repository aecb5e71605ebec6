//! Structured logging setup for dockerfile-sources
//!
//! Logs go to stderr so that stdout carries only the scan output. The
//! subscriber can be initialized once per process; later calls are ignored.
//!
//! # Example
//!
//! ```no_run
//! use dockerfile_sources::util::logging;
//!
//! // --log-level beats -v/-q, which beat DOCKERFILE_SOURCES_LOG_LEVEL
//! logging::init_logging(logging::cli_config(Some("debug"), false, false));
//!
//! use tracing::{debug, info};
//! info!("Scan started");
//! debug!(owner = "app-sre", repo = "qontract-reconcile", "Resolving tree");
//! ```

use std::env;
use std::sync::Once;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

static INIT: Once = Once::new();

pub const LOG_LEVEL_ENV: &str = "DOCKERFILE_SOURCES_LOG_LEVEL";
pub const LOG_JSON_ENV: &str = "DOCKERFILE_SOURCES_LOG_JSON";

/// Configuration for logging initialization
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Minimum level for this crate's own events
    pub level: Level,

    /// Emit one JSON object per event
    pub use_json: bool,

    /// Include the module target (e.g., dockerfile_sources::scan) in logs
    pub include_target: bool,

    /// Include file and line number information
    pub include_location: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            use_json: false,
            include_target: true,
            include_location: false,
        }
    }
}

impl LoggingConfig {
    /// Reads `DOCKERFILE_SOURCES_LOG_LEVEL` and `DOCKERFILE_SOURCES_LOG_JSON`
    pub fn from_env() -> Self {
        let level = env::var(LOG_LEVEL_ENV)
            .map(|s| parse_level(&s))
            .unwrap_or(Level::INFO);

        Self {
            level,
            use_json: json_from_env(),
            ..Default::default()
        }
    }
}

fn json_from_env() -> bool {
    env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false)
}

/// Parses a log level, case-insensitively
///
/// Unknown names fall back to `INFO` with a note on stderr.
///
/// ```
/// use dockerfile_sources::util::logging::parse_level;
/// use tracing::Level;
///
/// assert_eq!(parse_level("debug"), Level::DEBUG);
/// assert_eq!(parse_level("WARN"), Level::WARN);
/// assert_eq!(parse_level("loud"), Level::INFO);
/// ```
pub fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => {
            eprintln!(
                "Invalid log level '{}', defaulting to INFO. Valid levels: trace, debug, info, warn, error",
                level_str
            );
            Level::INFO
        }
    }
}

/// Picks the level from command-line flags, then the environment
///
/// An explicit `--log-level` wins over `-v`/`-q`.
pub fn resolve_level(log_level: Option<&str>, verbose: bool, quiet: bool) -> Level {
    if let Some(level_str) = log_level {
        parse_level(level_str)
    } else if verbose {
        Level::DEBUG
    } else if quiet {
        Level::ERROR
    } else {
        LoggingConfig::from_env().level
    }
}

/// Builds a config for the CLI: level from flags, format from the environment
pub fn cli_config(log_level: Option<&str>, verbose: bool, quiet: bool) -> LoggingConfig {
    LoggingConfig {
        level: resolve_level(log_level, verbose, quiet),
        use_json: json_from_env(),
        ..Default::default()
    }
}

fn build_filter(level: Level) -> EnvFilter {
    let mut filter = EnvFilter::from_default_env();

    if env::var("RUST_LOG").is_err() {
        for directive in [
            format!("dockerfile_sources={}", level),
            "h2=warn".to_string(),
            "hyper=warn".to_string(),
            "reqwest=warn".to_string(),
        ] {
            if let Ok(directive) = directive.parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    filter
}

/// Initializes the global subscriber
///
/// Only the first call has any effect.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| {
        let filter = build_filter(config.level);

        if config.use_json {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_writer(std::io::stderr),
                )
                .init();
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(config.include_target)
                        .with_file(config.include_location)
                        .with_line_number(config.include_location)
                        .with_writer(std::io::stderr),
                )
                .init();
        }
    });
}
