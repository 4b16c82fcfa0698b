use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HistixError>;

/// Errors surfaced by the index store, query engine and VCS backend
#[derive(Debug, Error)]
pub enum HistixError {
    /// Another writer holds the lock for this index
    #[error("another writer is active for index at {0}")]
    WriterBusy(PathBuf),

    /// A commit failed before publishing; the previous generation is intact
    #[error("commit failed: {0}")]
    CommitFailure(String),

    /// The same (repository, commit, path) triple was staged twice in one batch
    #[error("duplicate document in batch: {repository}@{commit_id}:{path}")]
    DuplicateDocument {
        repository: String,
        commit_id: String,
        path: String,
    },

    /// The query does not conform to the grammar
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// On-disk index data could not be read back
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// No committed generation exists at this location
    #[error("no index found at {0}")]
    IndexNotFound(PathBuf),

    /// The repository could not be opened or read
    #[error("vcs backend error: {0}")]
    BackendUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

impl From<git2::Error> for HistixError {
    fn from(e: git2::Error) -> Self {
        HistixError::BackendUnavailable(e.message().to_string())
    }
}
