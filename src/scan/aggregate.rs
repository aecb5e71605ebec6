//! Grouping of scan results into the output document

use super::result::ScanResult;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_REPOSITORY_BASE_URL: &str = "https://github.com";

/// Path → images for one repository
pub type FileImages = BTreeMap<String, Vec<String>>;

/// `{"data": {"<repo identity>": {"<path>": ["image", ...]}}}`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerfileSources {
    pub data: BTreeMap<String, FileImages>,
}

impl DockerfileSources {
    pub fn repository_count(&self) -> usize {
        self.data.len()
    }

    pub fn file_count(&self) -> usize {
        self.data.values().map(|files| files.len()).sum()
    }
}

/// Group `result` by repository identity and path
///
/// Identities are built as `<base_url>/<owner>/<repo>.git:<commit_sha>`.
/// Sources without any record do not appear.
pub fn aggregate(result: &ScanResult, base_url: &str) -> DockerfileSources {
    let mut data: BTreeMap<String, FileImages> = BTreeMap::new();

    for (source, record) in result.iter() {
        data.entry(source.identity(base_url))
            .or_default()
            .insert(record.path.clone(), record.images.clone());
    }

    DockerfileSources { data }
}
