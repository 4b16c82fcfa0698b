use crate::error::{HistixError, Result};
use crate::index::types::*;
use crate::utils::{decode_varint, read_str, read_u32_le, read_u64_le};
use memmap2::Mmap;
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

const META_FILE: &str = "meta.json";

/// Term dictionary entry for one field
#[derive(Debug)]
struct DictEntry {
    term: String,
    offset: u64,
    length: u32,
    doc_freq: u32,
}

/// Term dictionary, sorted by term (BTreeMap write order)
#[derive(Debug)]
struct Dict {
    entries: Vec<DictEntry>,
}

impl Dict {
    fn lookup(&self, term: &str) -> Option<&DictEntry> {
        self.entries
            .binary_search_by(|e| e.term.as_str().cmp(term))
            .ok()
            .map(|i| &self.entries[i])
    }
}

/// Reader for a single committed segment
#[derive(Debug)]
struct SegmentReader {
    dicts: [Dict; 4],
    /// One postings mmap per field; `None` when the field had no terms
    postings: [Option<Mmap>; 4],
}

impl SegmentReader {
    fn open(seg_dir: &Path) -> Result<Self> {
        let mut dicts = Vec::with_capacity(4);
        let mut postings = Vec::with_capacity(4);

        for field in SearchField::ALL {
            let stem = field.file_stem();
            dicts.push(read_dict(&seg_dir.join(format!("{stem}.dict")))?);

            let postings_path = seg_dir.join(format!("{stem}.postings"));
            let file = File::open(&postings_path)?;
            let mmap = if file.metadata()?.len() > 0 {
                Some(unsafe { Mmap::map(&file)? })
            } else {
                None
            };
            postings.push(mmap);
        }

        Ok(Self {
            dicts: dicts.try_into().map_err(|_| {
                HistixError::IndexCorrupt(format!("segment {}", seg_dir.display()))
            })?,
            postings: postings.try_into().map_err(|_| {
                HistixError::IndexCorrupt(format!("segment {}", seg_dir.display()))
            })?,
        })
    }

    fn postings(&self, field: SearchField, term: &str) -> Vec<Posting> {
        let entry = match self.dicts[field.ordinal()].lookup(term) {
            Some(e) => e,
            None => return Vec::new(),
        };
        let mmap = match &self.postings[field.ordinal()] {
            Some(m) => m,
            None => return Vec::new(),
        };

        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if end > mmap.len() {
            return Vec::new();
        }

        decode_postings(&mmap[start..end], entry.doc_freq)
    }

    fn doc_freq(&self, field: SearchField, term: &str) -> u32 {
        self.dicts[field.ordinal()]
            .lookup(term)
            .map(|e| e.doc_freq)
            .unwrap_or(0)
    }

    fn term_count(&self, field: SearchField) -> usize {
        self.dicts[field.ordinal()].entries.len()
    }
}

/// Point-in-time reader over the index.
///
/// Binds to the generation current at open time: segments committed after
/// the reader is opened are never visible through it (snapshot isolation).
/// Readers never block each other or the writer.
#[derive(Debug)]
pub struct IndexReader {
    index_dir: PathBuf,
    pub meta: IndexMeta,
    documents: Vec<StoredDocument>,
    doc_index: HashMap<DocId, usize>,
    segments: Vec<SegmentReader>,
}

impl IndexReader {
    /// Open the index at `index_dir`, pinned to its current generation.
    ///
    /// Returns [`HistixError::IndexNotFound`] when no generation has ever
    /// been committed there, and [`HistixError::IndexCorrupt`] when the
    /// on-disk format is unreadable.
    pub fn open(index_dir: &Path) -> Result<Self> {
        let meta_path = index_dir.join(META_FILE);
        if !meta_path.exists() {
            return Err(HistixError::IndexNotFound(index_dir.to_path_buf()));
        }

        let file = File::open(&meta_path)?;
        let meta: IndexMeta = serde_json::from_reader(file)
            .map_err(|e| HistixError::IndexCorrupt(format!("meta.json: {e}")))?;
        if meta.version != META_VERSION {
            return Err(HistixError::IndexCorrupt(format!(
                "unsupported index version {}",
                meta.version
            )));
        }

        // Load all committed segments in parallel
        let loaded: Result<Vec<(Vec<StoredDocument>, SegmentReader)>> = meta
            .segments
            .par_iter()
            .map(|&generation| {
                let seg_dir = index_dir
                    .join("segments")
                    .join(segment_dir_name(generation));
                let docs = read_segment_documents(&seg_dir).map_err(|e| {
                    HistixError::IndexCorrupt(format!("{}: {e}", seg_dir.display()))
                })?;
                let segment = SegmentReader::open(&seg_dir)?;
                Ok((docs, segment))
            })
            .collect();

        let mut documents = Vec::with_capacity(meta.doc_count as usize);
        let mut segments = Vec::with_capacity(meta.segments.len());
        for (docs, segment) in loaded? {
            documents.extend(docs);
            segments.push(segment);
        }

        let doc_index: HashMap<DocId, usize> = documents
            .iter()
            .enumerate()
            .map(|(idx, stored)| (stored.doc_id, idx))
            .collect();

        Ok(Self {
            index_dir: index_dir.to_path_buf(),
            meta,
            documents,
            doc_index,
            segments,
        })
    }

    /// True if a committed generation exists at `index_dir`
    pub fn exists(index_dir: &Path) -> bool {
        index_dir.join(META_FILE).exists()
    }

    /// Get a stored document by id - O(1) lookup
    pub fn document(&self, doc_id: DocId) -> Option<&StoredDocument> {
        self.doc_index
            .get(&doc_id)
            .and_then(|&idx| self.documents.get(idx))
    }

    /// All stored documents, in insertion order
    pub fn documents(&self) -> &[StoredDocument] {
        &self.documents
    }

    /// Total documents in this generation
    pub fn doc_count(&self) -> u32 {
        self.documents.len() as u32
    }

    /// Merged postings for a term across all segments.
    /// Doc ids ascend across segments, so concatenation preserves
    /// insertion order.
    pub fn postings(&self, field: SearchField, term: &str) -> Vec<Posting> {
        let mut merged = Vec::new();
        for segment in &self.segments {
            merged.extend(segment.postings(field, term));
        }
        merged
    }

    /// Number of documents containing a term, across all segments
    pub fn doc_freq(&self, field: SearchField, term: &str) -> u32 {
        self.segments.iter().map(|s| s.doc_freq(field, term)).sum()
    }

    /// Distinct terms for a field, summed per segment
    pub fn term_count(&self, field: SearchField) -> usize {
        self.segments.iter().map(|s| s.term_count(field)).sum()
    }

    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }
}

/// Decode a postings block: per document, doc id delta, term frequency,
/// then delta-encoded positions
fn decode_postings(buf: &[u8], doc_freq: u32) -> Vec<Posting> {
    let mut result = Vec::with_capacity(doc_freq as usize);
    let mut pos = 0;
    let mut prev_id = 0u32;

    while pos < buf.len() {
        let Some((delta, used)) = decode_varint(&buf[pos..]) else {
            break;
        };
        pos += used;
        let doc_id = prev_id + delta;
        prev_id = doc_id;

        let Some((term_freq, used)) = decode_varint(&buf[pos..]) else {
            break;
        };
        pos += used;

        let mut positions = Vec::with_capacity(term_freq as usize);
        let mut prev_pos = 0u32;
        for _ in 0..term_freq {
            let Some((pdelta, used)) = decode_varint(&buf[pos..]) else {
                return result;
            };
            pos += used;
            prev_pos += pdelta;
            positions.push(prev_pos);
        }

        result.push(Posting {
            doc_id,
            term_freq,
            positions,
        });
    }

    result
}

/// Read one field's term dictionary
fn read_dict(dict_path: &Path) -> Result<Dict> {
    if !dict_path.exists() {
        return Err(HistixError::IndexCorrupt(format!(
            "missing dictionary {}",
            dict_path.display()
        )));
    }

    let mut file = BufReader::new(File::open(dict_path)?);
    let count = read_u32_le(&mut file)? as usize;

    let mut entries = Vec::with_capacity(count);
    for _ in 0..count {
        let term = read_str(&mut file)?;
        let offset = read_u64_le(&mut file)?;
        let length = read_u32_le(&mut file)?;
        let doc_freq = read_u32_le(&mut file)?;
        entries.push(DictEntry {
            term,
            offset,
            length,
            doc_freq,
        });
    }

    // Already sorted from BTreeMap write order
    Ok(Dict { entries })
}

/// Read a segment's stored-fields table
pub(crate) fn read_segment_documents(seg_dir: &Path) -> Result<Vec<StoredDocument>> {
    let docs_path = seg_dir.join("docs.bin");
    let mut file = BufReader::new(File::open(&docs_path)?);

    let count = read_u32_le(&mut file)? as usize;
    let mut documents = Vec::with_capacity(count);

    for _ in 0..count {
        let doc_id = read_u32_le(&mut file)?;
        let repository = read_str(&mut file)?;
        let path = read_str(&mut file)?;
        let commit_id = read_str(&mut file)?;
        let commit_author = read_str(&mut file)?;
        let commit_date = read_str(&mut file)?;
        documents.push(StoredDocument {
            doc_id,
            doc: Document {
                repository,
                path,
                commit_id,
                commit_author,
                commit_date,
            },
        });
    }

    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::writer::IndexWriter;
    use crate::utils::StandardAnalyzer;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn doc(repo: &str, commit: &str, path: &str) -> Document {
        Document {
            repository: repo.to_string(),
            path: path.to_string(),
            commit_id: commit.to_string(),
            commit_author: "alice".to_string(),
            commit_date: "2024-01-01T00:00:00+00:00".to_string(),
        }
    }

    fn open_writer(dir: &Path) -> IndexWriter {
        IndexWriter::open(dir, Path::new("/repos"), Arc::new(StandardAnalyzer)).unwrap()
    }

    #[test]
    fn test_open_missing_index() {
        let tmp = TempDir::new().unwrap();
        let err = IndexReader::open(tmp.path()).unwrap_err();
        assert!(matches!(err, HistixError::IndexNotFound(_)));
    }

    #[test]
    fn test_corrupt_meta() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("meta.json"), b"not json").unwrap();
        let err = IndexReader::open(tmp.path()).unwrap_err();
        assert!(matches!(err, HistixError::IndexCorrupt(_)));
    }

    #[test]
    fn test_write_then_read_postings() {
        let tmp = TempDir::new().unwrap();

        let mut writer = open_writer(tmp.path());
        writer
            .add_document(doc("r", "c1", "a.txt"), "foo bar foo")
            .unwrap();
        writer.add_document(doc("r", "c2", "b.txt"), "bar baz").unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(tmp.path()).unwrap();
        assert_eq!(reader.doc_count(), 2);

        let foo = reader.postings(SearchField::Content, "foo");
        assert_eq!(foo.len(), 1);
        assert_eq!(foo[0].term_freq, 2);
        assert_eq!(foo[0].positions, vec![0, 2]);

        let bar = reader.postings(SearchField::Content, "bar");
        assert_eq!(bar.len(), 2);
        assert_eq!(reader.doc_freq(SearchField::Content, "bar"), 2);

        // Exact-match lookups
        assert_eq!(reader.postings(SearchField::CommitId, "c1").len(), 1);
        assert_eq!(reader.postings(SearchField::Path, "a.txt").len(), 1);
        assert_eq!(reader.postings(SearchField::Repository, "r").len(), 2);
    }

    #[test]
    fn test_postings_merge_across_generations() {
        let tmp = TempDir::new().unwrap();

        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c1", "a.txt"), "foo").unwrap();
        writer.commit().unwrap();

        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c2", "a.txt"), "foo").unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(tmp.path()).unwrap();
        let postings = reader.postings(SearchField::Content, "foo");
        assert_eq!(postings.len(), 2);
        // Insertion order preserved across segments
        assert!(postings[0].doc_id < postings[1].doc_id);
    }

    #[test]
    fn test_snapshot_isolation() {
        let tmp = TempDir::new().unwrap();

        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c1", "a.txt"), "foo").unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(tmp.path()).unwrap();
        assert_eq!(reader.doc_count(), 1);

        // Commit another generation while the reader is open
        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c2", "a.txt"), "foo").unwrap();
        writer.commit().unwrap();

        // The open reader still sees its own generation
        assert_eq!(reader.doc_count(), 1);
        assert_eq!(reader.postings(SearchField::Content, "foo").len(), 1);

        // A fresh reader sees both
        let reader = IndexReader::open(tmp.path()).unwrap();
        assert_eq!(reader.doc_count(), 2);
    }

    #[test]
    fn test_terms_longer_than_64k_survive() {
        let tmp = TempDir::new().unwrap();

        // A single minified or base64 line tokenizes into one huge term
        let long = "a".repeat(70_000);
        let content = format!("{long} zzz");

        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c1", "big.txt"), &content).unwrap();
        writer.commit().unwrap();

        let reader = IndexReader::open(tmp.path()).unwrap();
        assert_eq!(reader.postings(SearchField::Content, &long).len(), 1);
        // Terms written after the long one stay findable too
        assert_eq!(reader.postings(SearchField::Content, "zzz").len(), 1);
    }

    #[test]
    fn test_abandoned_batch_invisible() {
        let tmp = TempDir::new().unwrap();

        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c1", "a.txt"), "foo").unwrap();
        writer.commit().unwrap();

        // Stage a batch and drop the writer without committing
        let mut writer = open_writer(tmp.path());
        writer.add_document(doc("r", "c2", "a.txt"), "bar").unwrap();
        drop(writer);

        let reader = IndexReader::open(tmp.path()).unwrap();
        assert_eq!(reader.doc_count(), 1);
        assert!(reader.postings(SearchField::Content, "bar").is_empty());
    }
}
