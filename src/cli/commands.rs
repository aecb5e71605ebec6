use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Base image inventory for Dockerfiles in GitHub repositories
#[derive(Parser, Debug)]
#[command(
    name = "dockerfile-sources",
    about = "Base image inventory for Dockerfiles in GitHub repositories",
    version,
    author,
    long_about = "dockerfile-sources reads a list of GitHub repositories pinned to commits, \
                  finds every Dockerfile in each repository, and reports the base images \
                  referenced by their FROM instructions."
)]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    pub log_level: Option<String>,

    #[arg(short = 'v', long, global = true, help = "Enable debug logging")]
    pub verbose: bool,

    #[arg(
        short = 'q',
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Quiet mode - suppress non-error output"
    )]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(
        about = "Scan repositories for Dockerfile base images",
        long_about = "Downloads the repository list, resolves each repository tree at its \
                      pinned commit, and extracts base images from every Dockerfile.\n\n\
                      Each list line has the form:\n  \
                      https://github.com/<owner>/<repo>.git <40-hex commit sha>\n\n\
                      Examples:\n  \
                      REPOSITORY_LIST_URL=https://example.com/repos.txt dockerfile-sources scan\n  \
                      dockerfile-sources scan --input repos.txt --format human\n  \
                      dockerfile-sources scan --list-url https://example.com/repos.txt -o out.json"
    )]
    Scan(ScanArgs),

    #[command(
        about = "Extract base images from local Dockerfiles",
        long_about = "Runs the image extractor on local files without contacting any remote.\n\n\
                      Examples:\n  \
                      dockerfile-sources extract Dockerfile\n  \
                      dockerfile-sources extract build/Dockerfile deploy/Dockerfile --dedup-images"
    )]
    Extract(ExtractArgs),
}

#[derive(Parser, Debug, Clone)]
pub struct ScanArgs {
    #[arg(
        short = 'i',
        long,
        value_name = "FILE",
        conflicts_with = "list_url",
        help = "Read the repository list from a file ('-' for stdin)"
    )]
    pub input: Option<PathBuf>,

    #[arg(
        long,
        value_name = "URL",
        help = "Repository list URL (overrides REPOSITORY_LIST_URL)"
    )]
    pub list_url: Option<String>,

    #[arg(
        long,
        value_name = "TOKEN",
        help = "GitHub access token (overrides GITHUB_ACCESS_TOKEN)"
    )]
    pub token: Option<String>,

    #[arg(
        long,
        value_name = "URL",
        help = "GitHub API base URL (overrides GITHUB_API_URL)"
    )]
    pub api_url: Option<String>,

    #[arg(long, value_name = "SECONDS", help = "Whole-scan deadline in seconds")]
    pub timeout: Option<u64>,

    #[arg(long, value_name = "N", help = "Maximum remote calls in flight")]
    pub max_concurrency: Option<usize>,

    #[arg(long, help = "Report each image only once per file")]
    pub dedup_images: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,

    #[arg(
        short = 'o',
        long,
        value_name = "FILE",
        help = "Write output to file instead of stdout"
    )]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(value_name = "FILE", required = true, help = "Dockerfiles to read")]
    pub files: Vec<PathBuf>,

    #[arg(long, help = "Report each image only once per file")]
    pub dedup_images: bool,

    #[arg(
        short = 'f',
        long,
        value_enum,
        default_value = "json",
        help = "Output format"
    )]
    pub format: OutputFormatArg,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormatArg {
    Json,
    Human,
}

impl From<OutputFormatArg> for super::output::OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Json => super::output::OutputFormat::Json,
            OutputFormatArg::Human => super::output::OutputFormat::Human,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_args_verify() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn test_default_scan_args() {
        let args = CliArgs::parse_from(["dockerfile-sources", "scan"]);
        match args.command {
            Commands::Scan(scan_args) => {
                assert_eq!(scan_args.format, OutputFormatArg::Json);
                assert!(scan_args.input.is_none());
                assert!(scan_args.list_url.is_none());
                assert!(scan_args.token.is_none());
                assert!(scan_args.timeout.is_none());
                assert!(scan_args.max_concurrency.is_none());
                assert!(!scan_args.dedup_images);
                assert!(scan_args.output.is_none());
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_scan_with_options() {
        let args = CliArgs::parse_from([
            "dockerfile-sources",
            "scan",
            "--list-url",
            "https://example.com/repos.txt",
            "--token",
            "ghp_x",
            "--api-url",
            "https://ghe.example.com/api/v3",
            "--timeout",
            "60",
            "--max-concurrency",
            "4",
            "--dedup-images",
            "--format",
            "human",
            "-o",
            "out.json",
        ]);

        match args.command {
            Commands::Scan(scan_args) => {
                assert_eq!(
                    scan_args.list_url.as_deref(),
                    Some("https://example.com/repos.txt")
                );
                assert_eq!(scan_args.token.as_deref(), Some("ghp_x"));
                assert_eq!(
                    scan_args.api_url.as_deref(),
                    Some("https://ghe.example.com/api/v3")
                );
                assert_eq!(scan_args.timeout, Some(60));
                assert_eq!(scan_args.max_concurrency, Some(4));
                assert!(scan_args.dedup_images);
                assert_eq!(scan_args.format, OutputFormatArg::Human);
                assert_eq!(scan_args.output, Some(PathBuf::from("out.json")));
            }
            _ => panic!("Expected Scan command"),
        }
    }

    #[test]
    fn test_input_conflicts_with_list_url() {
        let result = CliArgs::try_parse_from([
            "dockerfile-sources",
            "scan",
            "--input",
            "repos.txt",
            "--list-url",
            "https://example.com/repos.txt",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_command() {
        let args = CliArgs::parse_from([
            "dockerfile-sources",
            "extract",
            "a/Dockerfile",
            "b/Dockerfile",
            "--dedup-images",
        ]);
        match args.command {
            Commands::Extract(extract_args) => {
                assert_eq!(
                    extract_args.files,
                    vec![PathBuf::from("a/Dockerfile"), PathBuf::from("b/Dockerfile")]
                );
                assert!(extract_args.dedup_images);
                assert_eq!(extract_args.format, OutputFormatArg::Json);
            }
            _ => panic!("Expected Extract command"),
        }
    }

    #[test]
    fn test_extract_requires_files() {
        assert!(CliArgs::try_parse_from(["dockerfile-sources", "extract"]).is_err());
    }

    #[test]
    fn test_global_verbose_flag() {
        let args = CliArgs::parse_from(["dockerfile-sources", "-v", "scan"]);
        assert!(args.verbose);
        assert!(!args.quiet);
    }

    #[test]
    fn test_global_quiet_flag() {
        let args = CliArgs::parse_from(["dockerfile-sources", "scan", "-q"]);
        assert!(!args.verbose);
        assert!(args.quiet);
    }

    #[test]
    fn test_log_level_flag() {
        let args = CliArgs::parse_from(["dockerfile-sources", "--log-level", "debug", "scan"]);
        assert_eq!(args.log_level, Some("debug".to_string()));
    }
}
