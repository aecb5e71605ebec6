//! Repository sources and the registry that owns them
//!
//! A [`Source`] names one repository at one pinned commit. Sources are
//! collected into a [`SourceRegistry`] before a scan starts; everything
//! produced during the scan refers back to its source through a
//! [`SourceId`] rather than holding the source itself.

pub mod list;
pub mod parser;

pub use list::{fetch_source_list, read_source_list, SourceListError};
pub use parser::parse_repository_sources;

use serde::{Deserialize, Serialize};
use std::fmt;

/// One repository identified by owner, name, and pinned commit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Source {
    pub owner: String,
    pub repo: String,
    pub commit_sha: String,
}

impl Source {
    pub fn new(
        owner: impl Into<String>,
        repo: impl Into<String>,
        commit_sha: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            commit_sha: commit_sha.into(),
        }
    }

    /// Identity string used as the top-level key of the output document,
    /// e.g. `https://github.com/owner/repo.git:<sha>`
    pub fn identity(&self, base_url: &str) -> String {
        format!(
            "{}/{}/{}.git:{}",
            base_url.trim_end_matches('/'),
            self.owner,
            self.repo,
            self.commit_sha
        )
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}:{}", self.owner, self.repo, self.commit_sha)
    }
}

/// Index of a source inside the [`SourceRegistry`] that issued it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(usize);

impl SourceId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Immutable, deduplicated set of sources for one scan
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Vec<Source>,
}

impl SourceRegistry {
    /// Builds a registry, dropping repeated sources while keeping the
    /// position of the first occurrence.
    pub fn new(sources: impl IntoIterator<Item = Source>) -> Self {
        let mut unique: Vec<Source> = Vec::new();
        for source in sources {
            if !unique.contains(&source) {
                unique.push(source);
            }
        }
        Self { sources: unique }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Looks up a source.
    ///
    /// Ids are only ever issued by the registry itself, so an unknown id is
    /// a programming error and panics.
    pub fn get(&self, id: SourceId) -> &Source {
        &self.sources[id.0]
    }

    pub fn find(&self, source: &Source) -> Option<SourceId> {
        self.sources.iter().position(|s| s == source).map(SourceId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceId, &Source)> {
        self.sources
            .iter()
            .enumerate()
            .map(|(index, source)| (SourceId(index), source))
    }
}
