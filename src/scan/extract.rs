//! Base image extraction from Dockerfile text

/// The reserved empty base image; never reported
const SCRATCH: &str = "scratch";

/// Pulls `FROM` image references out of Dockerfile text
///
/// Lines are trimmed and an instruction line is one whose first
/// whitespace-separated field is `FROM` in any letter case. The second field
/// is the image reference; instructions without one are skipped, as is
/// `scratch`. References are returned in file order. Repeats are kept unless
/// `dedup_images` is set, in which case only the first occurrence survives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageExtractor {
    pub dedup_images: bool,
}

impl ImageExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dedup(dedup_images: bool) -> Self {
        Self { dedup_images }
    }

    pub fn extract(&self, content: &str) -> Vec<String> {
        let mut images: Vec<String> = Vec::new();

        for line in content.lines() {
            let mut fields = line.trim().split_whitespace();

            match fields.next() {
                Some(keyword) if keyword.eq_ignore_ascii_case("FROM") => {}
                _ => continue,
            }

            let Some(image) = fields.next() else {
                continue;
            };

            if image.eq_ignore_ascii_case(SCRATCH) {
                continue;
            }

            if self.dedup_images && images.iter().any(|seen| seen == image) {
                continue;
            }

            images.push(image.to_string());
        }

        images
    }
}

/// [`ImageExtractor::extract`] with the default (no dedup) behaviour
pub fn extract_images(content: &str) -> Vec<String> {
    ImageExtractor::new().extract(content)
}
