pub mod commands;
pub mod handlers;
pub mod output;

pub use commands::{CliArgs, Commands, ExtractArgs, OutputFormatArg, ScanArgs};
pub use handlers::{exit_code, handle_extract, handle_scan};
pub use output::{OutputFormat, OutputFormatter};
