//! Parsing of the plain-text repository list

use super::Source;
use regex::Regex;
use tracing::debug;

/// Parse `<git-url> <commit-sha>` lines into sources
///
/// Only `https://github.com/<owner>/<repo>.git` URLs followed by a full
/// 40-character lowercase hex SHA are accepted. Anything else is skipped.
pub fn parse_repository_sources(body: &str) -> Vec<Source> {
    let line_re = Regex::new(
        r"^https://github\.com/([a-zA-Z0-9_.-]+)/([a-zA-Z0-9_.-]+)\.git\s+([0-9a-f]{40})$",
    )
    .expect("valid regex");

    let mut sources = Vec::new();
    let mut skipped = 0usize;

    for line in body.lines() {
        let line = line.trim_end_matches('\r');
        match line_re.captures(line) {
            Some(caps) => sources.push(Source::new(&caps[1], &caps[2], &caps[3])),
            None => {
                if !line.trim().is_empty() {
                    skipped += 1;
                }
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "Ignored repository list lines that did not match");
    }

    sources
}
