use dockerfile_sources::cli::commands::{CliArgs, Commands};
use dockerfile_sources::cli::handlers::{handle_extract, handle_scan};
use dockerfile_sources::util::logging;
use dockerfile_sources::VERSION;

use clap::Parser;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let logging_config = logging::cli_config(args.log_level.as_deref(), args.verbose, args.quiet);
    let log_level = logging_config.level;
    logging::init_logging(logging_config);

    debug!("dockerfile-sources v{} starting", VERSION);

    let exit_code = match &args.command {
        Commands::Scan(scan_args) => handle_scan(scan_args, log_level, args.quiet).await,
        Commands::Extract(extract_args) => handle_extract(extract_args),
    };

    std::process::exit(exit_code);
}
