use crate::error::Result;
use crate::git::{CommitInfo, VcsBackend};
use chrono::{FixedOffset, TimeZone};
use git2::{Delta, Oid, Repository, Sort};
use std::path::Path;

/// [`VcsBackend`] over a local git repository via libgit2
pub struct GitBackend {
    repo: Repository,
}

impl GitBackend {
    pub fn open(path: &Path) -> Result<Self> {
        let repo = Repository::open(path)?;
        Ok(Self { repo })
    }

    fn find_commit(&self, commit_id: &str) -> Result<git2::Commit<'_>> {
        let oid = Oid::from_str(commit_id)?;
        Ok(self.repo.find_commit(oid)?)
    }
}

impl VcsBackend for GitBackend {
    fn list_commits(&self) -> Result<Vec<String>> {
        // Empty repositories have no HEAD to walk
        if self.repo.head().is_err() {
            return Ok(Vec::new());
        }

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push_head()?;
        revwalk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            commits.push(oid?.to_string());
        }
        Ok(commits)
    }

    fn commit_info(&self, commit_id: &str) -> Result<CommitInfo> {
        let commit = self.find_commit(commit_id)?;
        let author = commit.author();

        let name = author.name().unwrap_or("unknown");
        let email = author.email().unwrap_or("");
        let author_str = if email.is_empty() {
            name.to_string()
        } else {
            format!("{name} <{email}>")
        };

        Ok(CommitInfo {
            id: commit.id().to_string(),
            author: author_str,
            date: format_time(&commit.time()),
            message: commit.message().unwrap_or("").to_string(),
        })
    }

    fn changed_paths(&self, commit_id: &str) -> Result<Vec<String>> {
        let commit = self.find_commit(commit_id)?;

        // Merge commits contribute no content of their own
        if commit.parent_count() > 1 {
            return Ok(Vec::new());
        }

        let tree = commit.tree()?;
        let parent_tree = match commit.parent(0) {
            Ok(parent) => Some(parent.tree()?),
            Err(_) => None, // root commit: diff against the empty tree
        };

        let diff = self
            .repo
            .diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;

        let mut paths = Vec::new();
        for delta in diff.deltas() {
            match delta.status() {
                Delta::Added | Delta::Modified | Delta::Renamed | Delta::Copied
                | Delta::Typechange => {
                    if let Some(path) = delta.new_file().path() {
                        paths.push(path.to_string_lossy().to_string());
                    }
                }
                _ => {}
            }
        }
        Ok(paths)
    }

    fn read_file(&self, commit_id: &str, path: &str) -> Result<Option<Vec<u8>>> {
        let commit = self.find_commit(commit_id)?;
        let tree = commit.tree()?;

        let entry = match tree.get_path(Path::new(path)) {
            Ok(entry) => entry,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match entry.to_object(&self.repo)?.as_blob() {
            Some(blob) => Ok(Some(blob.content().to_vec())),
            None => Ok(None), // submodule or subtree entry
        }
    }
}

/// Format a git timestamp as RFC 3339 in the committer's timezone
fn format_time(time: &git2::Time) -> String {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap());
    match offset.timestamp_opt(time.seconds(), 0) {
        chrono::LocalResult::Single(dt) => dt.to_rfc3339(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn commit_files(repo: &Repository, files: &[(&str, &[u8])], msg: &str) -> String {
        let root = repo.workdir().unwrap();
        let mut index = repo.index().unwrap();
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                std::fs::create_dir_all(parent).unwrap();
            }
            std::fs::write(&full, content).unwrap();
            index.add_path(Path::new(path)).unwrap();
        }
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = git2::Signature::now("alice", "alice@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, msg, &tree, &parents)
            .unwrap()
            .to_string()
    }

    #[test]
    fn test_commits_oldest_first() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let c1 = commit_files(&repo, &[("a.txt", b"one")], "first");
        let c2 = commit_files(&repo, &[("b.txt", b"two")], "second");

        let backend = GitBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.list_commits().unwrap(), vec![c1, c2]);
    }

    #[test]
    fn test_empty_repo_has_no_commits() {
        let tmp = TempDir::new().unwrap();
        Repository::init(tmp.path()).unwrap();

        let backend = GitBackend::open(tmp.path()).unwrap();
        assert!(backend.list_commits().unwrap().is_empty());
    }

    #[test]
    fn test_changed_paths() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let c1 = commit_files(&repo, &[("a.txt", b"one"), ("src/b.rs", b"fn main() {}")], "first");
        let c2 = commit_files(&repo, &[("a.txt", b"one changed")], "second");

        let backend = GitBackend::open(tmp.path()).unwrap();

        let mut paths = backend.changed_paths(&c1).unwrap();
        paths.sort();
        assert_eq!(paths, vec!["a.txt", "src/b.rs"]);

        assert_eq!(backend.changed_paths(&c2).unwrap(), vec!["a.txt"]);
    }

    #[test]
    fn test_read_file_at_commit() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let c1 = commit_files(&repo, &[("a.txt", b"old")], "first");
        let c2 = commit_files(&repo, &[("a.txt", b"new")], "second");

        let backend = GitBackend::open(tmp.path()).unwrap();
        assert_eq!(backend.read_file(&c1, "a.txt").unwrap().unwrap(), b"old");
        assert_eq!(backend.read_file(&c2, "a.txt").unwrap().unwrap(), b"new");
        assert!(backend.read_file(&c1, "missing.txt").unwrap().is_none());
    }

    #[test]
    fn test_commit_info() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let c1 = commit_files(&repo, &[("a.txt", b"one")], "first");

        let backend = GitBackend::open(tmp.path()).unwrap();
        let info = backend.commit_info(&c1).unwrap();
        assert_eq!(info.id, c1);
        assert_eq!(info.author, "alice <alice@example.com>");
        assert!(!info.date.is_empty());
    }
}
