use super::{FileContent, RemoteError, RepositoryHost, TreeEntry};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Scripted in-memory host
///
/// Trees and files are registered up front. Queued errors are returned
/// (one per call) before the registered value is served, which lets tests
/// model transient failures followed by success. Anything not registered
/// answers with HTTP 404.
pub struct MockRepositoryHost {
    trees: Mutex<HashMap<String, Vec<TreeEntry>>>,
    files: Mutex<HashMap<String, FileContent>>,
    tree_errors: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    content_errors: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    delays: Mutex<HashMap<String, Duration>>,
    tree_calls: AtomicUsize,
    content_calls: AtomicUsize,
    name: String,
}

fn repo_key(owner: &str, repo: &str, commit_sha: &str) -> String {
    format!("{}/{}@{}", owner, repo, commit_sha)
}

fn file_key(owner: &str, repo: &str, commit_sha: &str, path: &str) -> String {
    format!("{}:{}", repo_key(owner, repo, commit_sha), path)
}

impl MockRepositoryHost {
    pub fn new() -> Self {
        Self::with_name("MockHost")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            trees: Mutex::new(HashMap::new()),
            files: Mutex::new(HashMap::new()),
            tree_errors: Mutex::new(HashMap::new()),
            content_errors: Mutex::new(HashMap::new()),
            delays: Mutex::new(HashMap::new()),
            tree_calls: AtomicUsize::new(0),
            content_calls: AtomicUsize::new(0),
            name: name.into(),
        }
    }

    pub fn add_tree(&self, owner: &str, repo: &str, commit_sha: &str, entries: Vec<TreeEntry>) {
        self.trees
            .lock()
            .unwrap()
            .insert(repo_key(owner, repo, commit_sha), entries);
    }

    /// Registers a blob in the tree and its content, base64-encoded the
    /// way GitHub delivers it
    pub fn add_file(&self, owner: &str, repo: &str, commit_sha: &str, path: &str, text: &str) {
        self.trees
            .lock()
            .unwrap()
            .entry(repo_key(owner, repo, commit_sha))
            .or_default()
            .push(TreeEntry::blob(path));

        self.add_raw_content(
            owner,
            repo,
            commit_sha,
            FileContent {
                path: path.to_string(),
                content: wrap_base64(&STANDARD.encode(text)),
                encoding: "base64".to_string(),
            },
        );
    }

    /// Registers content without touching the tree listing
    pub fn add_raw_content(&self, owner: &str, repo: &str, commit_sha: &str, content: FileContent) {
        self.files.lock().unwrap().insert(
            file_key(owner, repo, commit_sha, &content.path),
            content,
        );
    }

    pub fn push_tree_error(&self, owner: &str, repo: &str, commit_sha: &str, error: RemoteError) {
        self.tree_errors
            .lock()
            .unwrap()
            .entry(repo_key(owner, repo, commit_sha))
            .or_default()
            .push_back(error);
    }

    pub fn push_content_error(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
        path: &str,
        error: RemoteError,
    ) {
        self.content_errors
            .lock()
            .unwrap()
            .entry(file_key(owner, repo, commit_sha, path))
            .or_default()
            .push_back(error);
    }

    /// Delays every call for `owner/repo` by `delay`
    pub fn set_delay(&self, owner: &str, repo: &str, delay: Duration) {
        self.delays
            .lock()
            .unwrap()
            .insert(format!("{}/{}", owner, repo), delay);
    }

    pub fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    pub fn content_calls(&self) -> usize {
        self.content_calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self, owner: &str, repo: &str) {
        let delay = self
            .delays
            .lock()
            .unwrap()
            .get(&format!("{}/{}", owner, repo))
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for MockRepositoryHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RepositoryHost for MockRepositoryHost {
    async fn get_tree(
        &self,
        owner: &str,
        repo: &str,
        commit_sha: &str,
    ) -> Result<Vec<TreeEntry>, RemoteError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay(owner, repo).await;

        let key = repo_key(owner, repo, commit_sha);
        if let Some(error) = self
            .tree_errors
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front())
        {
            return Err(error);
        }

        self.trees
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, "Not Found"))
    }

    async fn get_content(
        &self,
        owner: &str,
        repo: &str,
        path: &str,
        reference: &str,
    ) -> Result<FileContent, RemoteError> {
        self.content_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay(owner, repo).await;

        let key = file_key(owner, repo, reference, path);
        if let Some(error) = self
            .content_errors
            .lock()
            .unwrap()
            .get_mut(&key)
            .and_then(|q| q.pop_front())
        {
            return Err(error);
        }

        self.files
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .ok_or_else(|| RemoteError::http(404, "Not Found"))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// GitHub breaks base64 payloads into 60-character lines
fn wrap_base64(encoded: &str) -> String {
    encoded
        .as_bytes()
        .chunks(60)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join("\n")
}
