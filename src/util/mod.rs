//! Utility modules for dockerfile-sources

pub mod logging;

pub use logging::{cli_config, init_logging, LoggingConfig};
