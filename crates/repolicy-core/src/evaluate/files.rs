//! File listing used by `file_exists` and `workflow_exists` rules

use crate::errors::RemoteError;
use std::collections::BTreeMap;

/// Source of a repository's file paths
///
/// Implementations return repository-relative paths using `/` separators.
pub trait FileLister {
    fn list_files(&self, repo: &str) -> Result<Vec<String>, RemoteError>;
}

/// Pre-fetched listings keyed by repository; unknown repositories are empty
#[derive(Debug, Clone, Default)]
pub struct StaticFiles {
    listings: BTreeMap<String, Vec<String>>,
}

impl StaticFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, repo: impl Into<String>, files: Vec<String>) {
        self.listings.insert(repo.into(), files);
    }

    pub fn with(mut self, repo: impl Into<String>, files: &[&str]) -> Self {
        self.insert(repo, files.iter().map(|f| f.to_string()).collect());
        self
    }
}

impl FileLister for StaticFiles {
    fn list_files(&self, repo: &str) -> Result<Vec<String>, RemoteError> {
        Ok(self.listings.get(repo).cloned().unwrap_or_default())
    }
}

/// Lazily fetched, lower-cased listing for one repository
///
/// The lister is called at most once per evaluation, and only if some rule
/// actually asks about a file.
pub struct FileListing<'a> {
    repo: &'a str,
    lister: &'a dyn FileLister,
    cached: Option<Vec<String>>,
}

impl<'a> FileListing<'a> {
    pub fn new(repo: &'a str, lister: &'a dyn FileLister) -> Self {
        Self {
            repo,
            lister,
            cached: None,
        }
    }

    /// Case-insensitive existence check
    pub fn contains(&mut self, path: &str) -> Result<bool, RemoteError> {
        if self.cached.is_none() {
            let files = self.lister.list_files(self.repo)?;
            self.cached = Some(files.iter().map(|f| f.to_lowercase()).collect());
        }
        let wanted = path.trim_start_matches('/').to_lowercase();
        Ok(self
            .cached
            .as_ref()
            .map_or(false, |files| files.iter().any(|f| *f == wanted)))
    }
}
