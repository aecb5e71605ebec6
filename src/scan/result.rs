//! Per-file records and the ordered scan result

use crate::source::{Source, SourceId, SourceRegistry};
use std::sync::Arc;

/// One discovered Dockerfile and its base images
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockerfileRecord {
    pub source: SourceId,
    pub path: String,
    pub images: Vec<String>,
}

/// Records sorted by `(owner, repo, commit_sha, path)`
///
/// The order depends only on the records' content, never on the order in
/// which concurrent work completed. No two records share a source and path.
#[derive(Debug, Clone)]
pub struct ScanResult {
    registry: Arc<SourceRegistry>,
    records: Vec<DockerfileRecord>,
}

impl ScanResult {
    pub fn empty(registry: Arc<SourceRegistry>) -> Self {
        Self {
            registry,
            records: Vec::new(),
        }
    }

    pub fn from_records(registry: Arc<SourceRegistry>, mut records: Vec<DockerfileRecord>) -> Self {
        records.sort_by(|a, b| {
            registry
                .get(a.source)
                .cmp(registry.get(b.source))
                .then_with(|| a.path.cmp(&b.path))
        });
        records.dedup_by(|b, a| a.source == b.source && a.path == b.path);

        Self { registry, records }
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn source_of(&self, record: &DockerfileRecord) -> &Source {
        self.registry.get(record.source)
    }

    pub fn records(&self) -> &[DockerfileRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Source, &DockerfileRecord)> {
        self.records
            .iter()
            .map(move |record| (self.registry.get(record.source), record))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
