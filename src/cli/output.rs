//! Output formatting for scan and extract results
//!
//! JSON output is the `{"data": ...}` document, pretty-printed with two-space
//! indentation and sorted keys. Human output lists each repository with its
//! Dockerfiles and images, followed by a failure summary.

use anyhow::{Context, Result};
use serde_json::json;
use std::fmt::Write as _;

use crate::scan::aggregate::FileImages;
use crate::scan::{DockerfileSources, ScanReport, ScanStatus};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// The JSON document (machine-readable)
    Json,
    /// Human-readable formatted text
    Human,
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format(&self, output: &DockerfileSources) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(output),
            OutputFormat::Human => Ok(self.format_human(output)),
        }
    }

    /// Formats a scan's output together with its failures
    ///
    /// The JSON document never includes failures; they are only logged.
    pub fn format_report(&self, output: &DockerfileSources, report: &ScanReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.format_json(output),
            OutputFormat::Human => {
                let mut text = self.format_human(output);
                text.push_str(&format_failures(report));
                Ok(text)
            }
        }
    }

    /// Formats images extracted from local files, keyed by file path
    pub fn format_extracted(&self, files: &FileImages) -> Result<String> {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(&json!({ "data": files }))
                .context("Failed to serialize extracted images to JSON"),
            OutputFormat::Human => {
                let mut text = String::new();
                for (path, images) in files {
                    push_file(&mut text, path, images, "");
                }
                Ok(text)
            }
        }
    }

    fn format_json(&self, output: &DockerfileSources) -> Result<String> {
        serde_json::to_string_pretty(output).context("Failed to serialize scan output to JSON")
    }

    fn format_human(&self, output: &DockerfileSources) -> String {
        let mut text = String::new();

        text.push_str("Dockerfile Base Images\n");
        text.push_str(RULE);
        text.push_str("\n\n");

        if output.data.is_empty() {
            text.push_str("No Dockerfiles found\n");
            return text;
        }

        for (repository, files) in &output.data {
            let _ = writeln!(text, "{}", repository);
            for (path, images) in files {
                push_file(&mut text, path, images, "  ");
            }
            text.push('\n');
        }

        let _ = writeln!(
            text,
            "{} repositories, {} Dockerfiles",
            output.repository_count(),
            output.file_count()
        );

        text
    }
}

fn push_file(text: &mut String, path: &str, images: &[String], indent: &str) {
    let _ = writeln!(text, "{}{}", indent, path);

    if images.is_empty() {
        let _ = writeln!(text, "{}  (no base images)", indent);
        return;
    }

    for (i, image) in images.iter().enumerate() {
        let connector = if i == images.len() - 1 {
            "\u{2514}"
        } else {
            "\u{251C}"
        };
        let _ = writeln!(text, "{}  {}\u{2500} {}", indent, connector, image);
    }
}

fn format_failures(report: &ScanReport) -> String {
    let mut text = String::new();

    match &report.status {
        ScanStatus::Completed => return text,
        ScanStatus::CompletedWithErrors => {}
        ScanStatus::Aborted(error) => {
            let _ = writeln!(text, "\n\u{2717} Scan aborted: {}", error);
            let _ = writeln!(text, "  {}", error.help_message());
        }
        ScanStatus::Cancelled => {
            text.push_str("\n\u{26A0} Scan cancelled before completion; results are partial\n");
        }
    }

    if report.failures.is_empty() {
        return text;
    }

    let registry = report.result.registry();
    let _ = writeln!(text, "\n\u{26A0} Failures ({}):", report.failures.len());
    for failure in &report.failures {
        let source = registry.get(failure.source);
        match &failure.path {
            Some(path) => {
                let _ = writeln!(text, "  - {} {}: {}", source, path, failure.error);
            }
            None => {
                let _ = writeln!(text, "  - {}: {}", source, failure.error);
            }
        }
    }

    text
}
