//! Version control access: commit walking, changed paths and blob reads.

pub mod backend;

pub use backend::GitBackend;

use crate::error::Result;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata for one commit, as returned with search results
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: String,
    pub author: String,
    /// RFC 3339, in the committer's timezone
    pub date: String,
    /// Full commit message; available to callers but not a stored field
    pub message: String,
}

/// A repository found under the indexing root
#[derive(Debug, Clone)]
pub struct RepoLocation {
    /// Directory name, used as the document's repository field
    pub name: String,
    pub path: PathBuf,
}

/// Read access to one repository's history.
///
/// The indexing pipeline drives this interface only; it never touches the
/// underlying VCS directly, so alternative backends plug in here.
pub trait VcsBackend {
    /// All commit ids reachable from HEAD, oldest first
    fn list_commits(&self) -> Result<Vec<String>>;

    /// Author and date for a commit
    fn commit_info(&self, commit_id: &str) -> Result<CommitInfo>;

    /// Paths added or modified by a commit relative to its first parent.
    /// Deletions are excluded; merge commits yield no paths.
    fn changed_paths(&self, commit_id: &str) -> Result<Vec<String>>;

    /// Raw bytes of a file as of a commit, or `None` if the path does not
    /// exist in that commit's tree
    fn read_file(&self, commit_id: &str, path: &str) -> Result<Option<Vec<u8>>>;
}

/// Find repositories under `root`: either `root` itself is a repository,
/// or its immediate subdirectories are checked, sorted by name.
pub fn discover_repositories(root: &Path) -> Result<Vec<RepoLocation>> {
    if root.join(".git").exists() {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "repository".to_string());
        return Ok(vec![RepoLocation {
            name,
            path: root.to_path_buf(),
        }]);
    }

    let mut repos = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() && path.join(".git").exists() {
            repos.push(RepoLocation {
                name: entry.file_name().to_string_lossy().to_string(),
                path,
            });
        }
    }

    repos.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_discover_root_is_repo() {
        let tmp = TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();

        let repos = discover_repositories(tmp.path()).unwrap();
        assert_eq!(repos.len(), 1);
        assert_eq!(repos[0].path, tmp.path());
    }

    #[test]
    fn test_discover_subdirectories() {
        let tmp = TempDir::new().unwrap();
        git2::Repository::init(tmp.path().join("beta")).unwrap();
        git2::Repository::init(tmp.path().join("alpha")).unwrap();
        std::fs::create_dir(tmp.path().join("not-a-repo")).unwrap();

        let repos = discover_repositories(tmp.path()).unwrap();
        let names: Vec<&str> = repos.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta"]);
    }

    #[test]
    fn test_discover_empty() {
        let tmp = TempDir::new().unwrap();
        assert!(discover_repositories(tmp.path()).unwrap().is_empty());
    }
}
