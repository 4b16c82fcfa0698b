//! Indexing pipeline: walks commit history and feeds the index writer.

use crate::git::{discover_repositories, GitBackend, VcsBackend};
use crate::index::types::{Document, IndexConfig};
use crate::index::writer::IndexWriter;
use crate::utils::{classify, Analyzer, ContentKind, StandardAnalyzer};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Outcome of one indexing run
#[derive(Debug, Default)]
pub struct IndexReport {
    pub repositories: usize,
    pub commits: usize,
    /// Documents committed to the index in this run
    pub documents: usize,
    /// Units skipped after a warning (unreadable repos, blobs, files)
    pub skipped: usize,
    /// True when the run stopped at a cancellation point; the in-flight
    /// batch was abandoned but every committed batch remains queryable
    pub cancelled: bool,
}

/// Index all repositories under `root_path` into `index_dir`
pub fn index_root(
    root_path: &Path,
    index_dir: &Path,
    silent: bool,
    cancel: &AtomicBool,
) -> Result<IndexReport> {
    index_root_with_config(root_path, index_dir, IndexConfig::default(), silent, cancel)
}

/// Index all repositories under `root_path`, flushing a generation every
/// `config.batch_size` documents.
///
/// Commits are walked oldest first, so on interruption the committed prefix
/// of history is searchable and a later run picks up where this one stopped
/// (already-committed documents are skipped by the writer). Cancellation is
/// honored at commit boundaries.
pub fn index_root_with_config(
    root_path: &Path,
    index_dir: &Path,
    config: IndexConfig,
    silent: bool,
    cancel: &AtomicBool,
) -> Result<IndexReport> {
    let root = root_path.canonicalize().context("Invalid path")?;
    let analyzer: Arc<dyn Analyzer> = Arc::new(StandardAnalyzer);

    let repos = discover_repositories(&root)?;
    if repos.is_empty() {
        if !silent {
            println!("No git repositories found under {}", root.display());
        }
        return Ok(IndexReport::default());
    }

    if !silent {
        println!("Indexing {} repositories under {}", repos.len(), root.display());
    }

    let mut report = IndexReport::default();
    let mut writer = IndexWriter::open(index_dir, &root, analyzer)?;

    for repo in &repos {
        let backend = match GitBackend::open(&repo.path) {
            Ok(backend) => backend,
            Err(e) => {
                tracing::warn!(repo = %repo.name, error = %e, "skipping unreadable repository");
                report.skipped += 1;
                continue;
            }
        };

        let commits = match backend.list_commits() {
            Ok(commits) => commits,
            Err(e) => {
                tracing::warn!(repo = %repo.name, error = %e, "cannot walk history, skipping");
                report.skipped += 1;
                continue;
            }
        };

        report.repositories += 1;

        let progress = if silent {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(commits.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
                    .unwrap()
                    .progress_chars("█▓▒░  "),
            );
            pb.set_message(repo.name.clone());
            pb
        };

        for commit_id in &commits {
            // Cancellation is checked between commits only; a partially
            // staged batch is dropped, committed generations stay.
            if cancel.load(Ordering::Relaxed) {
                progress.abandon_with_message("cancelled");
                report.cancelled = true;
                return Ok(report);
            }

            match index_commit(&backend, repo.name.as_str(), commit_id, &config, &mut report, &mut writer) {
                Ok(()) => report.commits += 1,
                Err(e) => {
                    tracing::warn!(repo = %repo.name, commit = %commit_id, error = %e, "skipping commit");
                    report.skipped += 1;
                }
            }

            if writer.staged_len() >= config.batch_size {
                report.documents += writer.commit_batch()?;
            }

            progress.inc(1);
        }

        progress.finish_with_message(format!("{}: {} commits", repo.name, commits.len()));
    }

    report.documents += writer.commit()?;

    if !silent {
        println!(
            "Indexed {} documents from {} commits ({} skipped)",
            report.documents, report.commits, report.skipped
        );
    }

    Ok(report)
}

/// Stage every indexable file a commit changed
fn index_commit(
    backend: &GitBackend,
    repo_name: &str,
    commit_id: &str,
    config: &IndexConfig,
    report: &mut IndexReport,
    writer: &mut IndexWriter,
) -> Result<()> {
    let info = backend.commit_info(commit_id)?;
    let paths = backend.changed_paths(commit_id)?;

    // Blob reads go through libgit2 and stay serial; decoding is
    // parallelized below.
    let mut blobs: Vec<(String, Vec<u8>)> = Vec::with_capacity(paths.len());
    for path in paths {
        match backend.read_file(commit_id, &path) {
            Ok(Some(bytes)) => {
                if bytes.len() as u64 > config.max_file_size {
                    tracing::debug!(path = %path, "file exceeds size limit, skipping");
                    report.skipped += 1;
                } else {
                    blobs.push((path, bytes));
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "unreadable blob, skipping");
                report.skipped += 1;
            }
        }
    }

    // Binary files are excluded from the index entirely
    let texts: Vec<(String, String)> = blobs
        .par_iter()
        .filter_map(|(path, bytes)| match classify(bytes) {
            ContentKind::Text(text) => Some((path.clone(), text.to_string())),
            ContentKind::Binary => None,
        })
        .collect();

    for (path, text) in texts {
        let doc = Document {
            repository: repo_name.to_string(),
            path,
            commit_id: info.id.clone(),
            commit_author: info.author.clone(),
            commit_date: info.date.clone(),
        };
        match writer.add_document(doc, &text) {
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "skipping document");
                report.skipped += 1;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::reader::IndexReader;
    use crate::index::types::SearchField;
    use git2::Repository;
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

    fn not_cancelled() -> AtomicBool {
        AtomicBool::new(false)
    }

    #[test]
    fn test_index_single_repo() {
        let repos = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = Repository::init(repos.path().join("proj")).unwrap();
        commit_files(&repo, &[("a.txt", b"hello world")], "first");
        commit_files(&repo, &[("b.txt", b"goodbye world")], "second");

        let report =
            index_root(repos.path(), index.path(), true, &not_cancelled()).unwrap();
        assert_eq!(report.repositories, 1);
        assert_eq!(report.commits, 2);
        assert_eq!(report.documents, 2);
        assert!(!report.cancelled);

        let reader = IndexReader::open(index.path()).unwrap();
        assert_eq!(reader.doc_freq(SearchField::Content, "world"), 2);
        assert_eq!(reader.doc_freq(SearchField::Repository, "proj"), 2);
    }

    #[test]
    fn test_binary_files_excluded() {
        let repos = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = Repository::init(repos.path().join("proj")).unwrap();
        commit_files(
            &repo,
            &[("a.txt", b"text" as &[u8]), ("a.bin", &[0xFF, 0xFE, 0x00, 0x80])],
            "first",
        );

        let report =
            index_root(repos.path(), index.path(), true, &not_cancelled()).unwrap();
        assert_eq!(report.documents, 1);

        let reader = IndexReader::open(index.path()).unwrap();
        assert_eq!(reader.documents()[0].doc.path, "a.txt");
    }

    #[test]
    fn test_rerun_is_idempotent() {
        let repos = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = Repository::init(repos.path().join("proj")).unwrap();
        commit_files(&repo, &[("a.txt", b"hello")], "first");

        let first = index_root(repos.path(), index.path(), true, &not_cancelled()).unwrap();
        assert_eq!(first.documents, 1);

        let second = index_root(repos.path(), index.path(), true, &not_cancelled()).unwrap();
        assert_eq!(second.documents, 0);

        let reader = IndexReader::open(index.path()).unwrap();
        assert_eq!(reader.doc_count(), 1);
    }

    #[test]
    fn test_batching_produces_generations() {
        let repos = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = Repository::init(repos.path().join("proj")).unwrap();
        commit_files(&repo, &[("a.txt", b"one")], "first");
        commit_files(&repo, &[("b.txt", b"two")], "second");
        commit_files(&repo, &[("c.txt", b"three")], "third");

        let config = IndexConfig {
            batch_size: 1,
            ..IndexConfig::default()
        };
        let report = index_root_with_config(
            repos.path(),
            index.path(),
            config,
            true,
            &not_cancelled(),
        )
        .unwrap();
        assert_eq!(report.documents, 3);

        let reader = IndexReader::open(index.path()).unwrap();
        assert_eq!(reader.meta.segments.len(), 3);
        assert_eq!(reader.doc_count(), 3);
    }

    #[test]
    fn test_cancellation_keeps_committed_prefix() {
        let repos = TempDir::new().unwrap();
        let index = TempDir::new().unwrap();
        let repo = Repository::init(repos.path().join("proj")).unwrap();
        commit_files(&repo, &[("a.txt", b"one")], "first");
        commit_files(&repo, &[("b.txt", b"two")], "second");

        let cancelled = AtomicBool::new(true);
        let report = index_root(repos.path(), index.path(), true, &cancelled).unwrap();
        assert!(report.cancelled);
        assert_eq!(report.documents, 0);

        // Nothing was committed before the cancellation point
        assert!(!IndexReader::exists(index.path()));
    }
}
