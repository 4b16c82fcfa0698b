use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for a document in the index.
/// Assigned in insertion order, ascending across generations.
pub type DocId = u32;

/// Generation number: one per committed writer transaction
pub type Generation = u64;

/// One file's content as of one commit in one repository.
///
/// Uniquely identified by `(repository, commit_id, path)` within an index;
/// immutable once written. Content is tokenized at staging time and is not
/// part of the stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Owning repository identifier (exact-match field)
    pub repository: String,
    /// Path relative to the repository root at that commit
    /// (exact-match field, also tokenized)
    pub path: String,
    /// Commit identifier (exact-match field)
    pub commit_id: String,
    /// Stored metadata, returned verbatim with results
    pub commit_author: String,
    /// Stored metadata, returned verbatim with results
    pub commit_date: String,
}

impl Document {
    /// The unique key of a document within one index
    pub fn key(&self) -> DocKey {
        DocKey {
            repository: self.repository.clone(),
            commit_id: self.commit_id.clone(),
            path: self.path.clone(),
        }
    }
}

/// The `(repository, commit_id, path)` triple identifying a document
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocKey {
    pub repository: String,
    pub commit_id: String,
    pub path: String,
}

/// A document stored in the index, with its assigned id
#[derive(Debug, Clone)]
pub struct StoredDocument {
    pub doc_id: DocId,
    pub doc: Document,
}

/// How a field participates in indexing and search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Indexed as a single normalized term; query values are not tokenized
    ExactMatch,
    /// Tokenized through the analyzer, postings carry positions
    FullText,
    /// Stored and returned verbatim, never searchable
    StoredOnly,
}

/// The closed set of searchable fields.
///
/// `commit_author` and `commit_date` are StoredOnly and live only in the
/// document table, so they have no variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Repository,
    Path,
    CommitId,
    Content,
}

impl SearchField {
    /// All searchable fields, in on-disk order
    pub const ALL: [SearchField; 4] = [
        SearchField::Repository,
        SearchField::Path,
        SearchField::CommitId,
        SearchField::Content,
    ];

    /// Fields a bare (unqualified) query term matches against
    pub const FREE_TEXT: [SearchField; 3] = [
        SearchField::Content,
        SearchField::Path,
        SearchField::CommitId,
    ];

    pub fn kind(self) -> FieldKind {
        match self {
            SearchField::Repository | SearchField::CommitId => FieldKind::ExactMatch,
            // Path is exact-match but additionally tokenized; the writer
            // indexes both forms and the executor prefers the exact term.
            SearchField::Path => FieldKind::ExactMatch,
            SearchField::Content => FieldKind::FullText,
        }
    }

    /// File stem for this field's dictionary/postings pair
    pub fn file_stem(self) -> &'static str {
        match self {
            SearchField::Repository => "repo",
            SearchField::Path => "path",
            SearchField::CommitId => "commit",
            SearchField::Content => "content",
        }
    }

    /// Resolve a query qualifier to a field
    pub fn from_name(name: &str) -> Option<SearchField> {
        match name {
            "repo" | "repository" => Some(SearchField::Repository),
            "path" => Some(SearchField::Path),
            "commit" | "commit_id" => Some(SearchField::CommitId),
            "content" => Some(SearchField::Content),
            _ => None,
        }
    }

    /// Index of this field in [`SearchField::ALL`]
    pub fn ordinal(self) -> usize {
        match self {
            SearchField::Repository => 0,
            SearchField::Path => 1,
            SearchField::CommitId => 2,
            SearchField::Content => 3,
        }
    }
}

/// A single posting: one document containing a term, with term frequency
/// and (for full-text fields) token positions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
    pub doc_id: DocId,
    pub term_freq: u32,
    pub positions: Vec<u32>,
}

/// Index metadata stored in meta.json.
///
/// Published atomically by renaming a fresh file over the old one; readers
/// bind to the segment list they observe at open time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMeta {
    pub version: u32,
    pub root_path: PathBuf,
    /// Generation of the most recent committed writer transaction
    pub generation: Generation,
    /// Committed segments, one per generation, in commit order
    pub segments: Vec<Generation>,
    /// Total documents across all segments; also the next doc id
    pub doc_count: u32,
    pub created_at: u64,
    pub updated_at: u64,
}

pub const META_VERSION: u32 = 1;

impl Default for IndexMeta {
    fn default() -> Self {
        Self {
            version: META_VERSION,
            root_path: PathBuf::new(),
            generation: 0,
            segments: Vec::new(),
            doc_count: 0,
            created_at: 0,
            updated_at: 0,
        }
    }
}

/// Configuration for the indexing pipeline and writer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Staged documents per writer transaction before a flush
    pub batch_size: usize,
    /// Skip file contents larger than this
    pub max_file_size: u64,
    /// Default result limit for searches
    pub default_limit: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_file_size: 100 * 1024 * 1024, // 100MB - matches GitHub's file size limit
            default_limit: 100,
        }
    }
}

/// One ranked search result
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub doc_id: DocId,
    pub repository: String,
    pub path: String,
    pub commit_id: String,
    pub commit_author: String,
    pub commit_date: String,
    pub score: f32,
}

/// Name of a segment directory for a generation
pub fn segment_dir_name(generation: Generation) -> String {
    format!("gen_{:06}", generation)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_from_name() {
        assert_eq!(SearchField::from_name("content"), Some(SearchField::Content));
        assert_eq!(SearchField::from_name("commit_id"), Some(SearchField::CommitId));
        assert_eq!(SearchField::from_name("repo"), Some(SearchField::Repository));
        assert_eq!(SearchField::from_name("author"), None);
    }

    #[test]
    fn test_field_ordinals_match_all() {
        for (i, field) in SearchField::ALL.iter().enumerate() {
            assert_eq!(field.ordinal(), i);
        }
    }

    #[test]
    fn test_segment_dir_name() {
        assert_eq!(segment_dir_name(7), "gen_000007");
    }
}
