use crate::error::{HistixError, Result};
use crate::index::reader::read_segment_documents;
use crate::index::types::*;
use crate::utils::{delta_encode, encode_varint, write_str, write_u32_le, write_u64_le, Analyzer};
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

const LOCK_FILE: &str = "writer.lock";
const META_FILE: &str = "meta.json";

/// Exclusive writer lock for one index location.
/// Created with `create_new`, removed on drop.
#[derive(Debug)]
struct WriterLock {
    path: PathBuf,
}

impl WriterLock {
    fn acquire(index_dir: &Path) -> Result<Self> {
        let path = index_dir.join(LOCK_FILE);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Record the owning pid for debugging stuck locks
                let _ = write!(file, "{}", std::process::id());
                Ok(Self { path })
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(HistixError::WriterBusy(index_dir.to_path_buf()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Accumulated postings for one field: term -> documents in insertion order
type FieldPostings = BTreeMap<String, Vec<(DocId, Vec<u32>)>>;

/// Transactional writer for the index store.
///
/// All documents staged through one writer become visible together when
/// [`IndexWriter::commit`] succeeds, producing a new generation. Long runs
/// flush intermediate batches with [`IndexWriter::commit_batch`], which
/// keeps the lock and the committed-key set across generations. Dropping
/// the writer without committing abandons the staged batch; the previously
/// committed generations stay intact and queryable throughout.
#[derive(Debug)]
pub struct IndexWriter {
    index_dir: PathBuf,
    meta: IndexMeta,
    analyzer: Arc<dyn Analyzer>,
    /// Keys already committed in prior generations (idempotent re-index)
    existing: HashSet<DocKey>,
    /// Keys staged in this batch (duplicate-in-batch is a caller error)
    staged_keys: HashSet<DocKey>,
    staged: Vec<StoredDocument>,
    postings: [FieldPostings; 4],
    next_doc_id: DocId,
    _lock: WriterLock,
}

impl IndexWriter {
    /// Open a writer for the index at `index_dir`, creating the directory
    /// if this is the first generation. Fails with [`HistixError::WriterBusy`]
    /// if another writer currently holds the lock.
    pub fn open(index_dir: &Path, root_path: &Path, analyzer: Arc<dyn Analyzer>) -> Result<Self> {
        fs::create_dir_all(index_dir)?;
        let lock = WriterLock::acquire(index_dir)?;

        let meta_path = index_dir.join(META_FILE);
        let meta = if meta_path.exists() {
            let file = File::open(&meta_path)?;
            let meta: IndexMeta = serde_json::from_reader(file)
                .map_err(|e| HistixError::IndexCorrupt(format!("meta.json: {e}")))?;
            if meta.version != META_VERSION {
                return Err(HistixError::IndexCorrupt(format!(
                    "unsupported index version {}",
                    meta.version
                )));
            }
            meta
        } else {
            IndexMeta {
                root_path: root_path.to_path_buf(),
                created_at: unix_now(),
                ..IndexMeta::default()
            }
        };

        // Abandoned batches leave unpublished segment directories behind;
        // sweep them while we hold the lock.
        sweep_stray_segments(index_dir, &meta)?;

        let mut existing = HashSet::new();
        for &generation in &meta.segments {
            let seg_dir = index_dir
                .join("segments")
                .join(segment_dir_name(generation));
            for stored in read_segment_documents(&seg_dir)? {
                existing.insert(stored.doc.key());
            }
        }

        let next_doc_id = meta.doc_count;

        Ok(Self {
            index_dir: index_dir.to_path_buf(),
            meta,
            analyzer,
            existing,
            staged_keys: HashSet::new(),
            staged: Vec::new(),
            postings: Default::default(),
            next_doc_id,
            _lock: lock,
        })
    }

    /// Stage a document and its content for the next generation.
    ///
    /// Returns `Ok(false)` without staging if the document's
    /// `(repository, commit_id, path)` triple is already present in a
    /// committed generation. Staging the same triple twice in one batch
    /// is a caller error and fails with
    /// [`HistixError::DuplicateDocument`].
    pub fn add_document(&mut self, doc: Document, content: &str) -> Result<bool> {
        let key = doc.key();

        if self.staged_keys.contains(&key) {
            return Err(HistixError::DuplicateDocument {
                repository: key.repository,
                commit_id: key.commit_id,
                path: key.path,
            });
        }
        if self.existing.contains(&key) {
            return Ok(false);
        }

        let doc_id = self.next_doc_id;
        self.next_doc_id += 1;

        self.index_exact(SearchField::Repository, doc_id, &doc.repository);
        self.index_exact(SearchField::CommitId, doc_id, &doc.commit_id);
        self.index_path(doc_id, &doc.path);
        self.index_full_text(SearchField::Content, doc_id, content);

        self.staged_keys.insert(key);
        self.staged.push(StoredDocument { doc_id, doc });

        Ok(true)
    }

    /// Number of documents staged in the current batch
    pub fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Index a value as a single normalized term
    fn index_exact(&mut self, field: SearchField, doc_id: DocId, value: &str) {
        let term = value.to_lowercase();
        if term.is_empty() {
            return;
        }
        self.postings[field.ordinal()]
            .entry(term)
            .or_default()
            .push((doc_id, vec![0]));
    }

    /// Index text through the analyzer, recording token positions
    fn index_full_text(&mut self, field: SearchField, doc_id: DocId, text: &str) {
        let mut by_term: BTreeMap<String, Vec<u32>> = BTreeMap::new();
        for (pos, term) in self.analyzer.analyze(text).into_iter().enumerate() {
            by_term.entry(term).or_default().push(pos as u32);
        }
        let field_postings = &mut self.postings[field.ordinal()];
        for (term, positions) in by_term {
            field_postings.entry(term).or_default().push((doc_id, positions));
        }
    }

    /// Paths are exact-match but also tokenized for path search. The full
    /// normalized path and its tokens share one dictionary; a single-token
    /// path is indexed once.
    fn index_path(&mut self, doc_id: DocId, path: &str) {
        self.index_full_text(SearchField::Path, doc_id, path);

        let exact = path.to_lowercase();
        let field_postings = &mut self.postings[SearchField::Path.ordinal()];
        let entry = field_postings.entry(exact).or_default();
        if entry.last().map(|(id, _)| *id) != Some(doc_id) {
            entry.push((doc_id, vec![0]));
        }
    }

    /// Commit the staged batch, producing a new generation.
    ///
    /// The segment is written to an unpublished directory first and only
    /// becomes visible when the refreshed `meta.json` is renamed into
    /// place, so a crash mid-commit leaves the previous generation intact.
    /// Returns the number of documents committed.
    pub fn commit(mut self) -> Result<usize> {
        self.commit_batch()
    }

    /// Commit the staged batch and keep the writer open for the next one.
    ///
    /// The committed keys roll into the writer's known set, so staging is
    /// still deduplicated against every prior generation without re-reading
    /// segments from disk. The lock is held across batches.
    pub fn commit_batch(&mut self) -> Result<usize> {
        if self.staged.is_empty() {
            return Ok(0);
        }

        let count = self.staged.len();
        self.write_generation()
            .map_err(|e| HistixError::CommitFailure(e.to_string()))?;

        self.existing.extend(self.staged_keys.drain());
        self.staged.clear();
        self.postings = Default::default();

        Ok(count)
    }

    fn write_generation(&mut self) -> Result<()> {
        let generation = self.meta.generation + 1;
        let seg_dir = self
            .index_dir
            .join("segments")
            .join(segment_dir_name(generation));
        fs::create_dir_all(&seg_dir)?;

        self.write_documents(&seg_dir)?;
        for field in SearchField::ALL {
            self.write_field_index(&seg_dir, field)?;
        }

        // Publish: the segment becomes visible only once the new meta.json
        // lands, and the rename is atomic.
        let mut meta = self.meta.clone();
        meta.generation = generation;
        meta.segments.push(generation);
        meta.doc_count = self.next_doc_id;
        meta.updated_at = unix_now();

        let tmp_path = self.index_dir.join("meta.json.tmp");
        let file = File::create(&tmp_path)?;
        serde_json::to_writer_pretty(file, &meta)?;
        fs::rename(&tmp_path, self.index_dir.join(META_FILE))?;

        self.meta = meta;
        Ok(())
    }

    /// Write the stored-fields table for this segment
    fn write_documents(&self, seg_dir: &Path) -> Result<()> {
        let docs_path = seg_dir.join("docs.bin");
        let mut file = BufWriter::new(File::create(&docs_path)?);

        write_u32_le(&mut file, self.staged.len() as u32)?;

        for stored in &self.staged {
            write_u32_le(&mut file, stored.doc_id)?;
            write_str(&mut file, &stored.doc.repository)?;
            write_str(&mut file, &stored.doc.path)?;
            write_str(&mut file, &stored.doc.commit_id)?;
            write_str(&mut file, &stored.doc.commit_author)?;
            write_str(&mut file, &stored.doc.commit_date)?;
        }

        file.flush()?;
        Ok(())
    }

    /// Write one field's term dictionary and postings
    fn write_field_index(&self, seg_dir: &Path, field: SearchField) -> Result<()> {
        let stem = field.file_stem();
        let dict_path = seg_dir.join(format!("{stem}.dict"));
        let postings_path = seg_dir.join(format!("{stem}.postings"));

        let mut dict_file = BufWriter::new(File::create(&dict_path)?);
        let mut postings_file = BufWriter::new(File::create(&postings_path)?);

        let terms = &self.postings[field.ordinal()];
        write_u32_le(&mut dict_file, terms.len() as u32)?;

        let mut postings_offset: u64 = 0;

        for (term, docs) in terms {
            // Postings block: per document, doc id delta, term frequency,
            // then delta-encoded positions
            let mut encoded = Vec::new();
            let mut prev_id = 0u32;
            for (doc_id, positions) in docs {
                encode_varint(doc_id - prev_id, &mut encoded);
                encode_varint(positions.len() as u32, &mut encoded);
                delta_encode(positions, &mut encoded);
                prev_id = *doc_id;
            }

            // Dictionary entry: term, offset, length, doc_freq
            write_str(&mut dict_file, term)?;
            write_u64_le(&mut dict_file, postings_offset)?;
            write_u32_le(&mut dict_file, encoded.len() as u32)?;
            write_u32_le(&mut dict_file, docs.len() as u32)?;

            postings_file.write_all(&encoded)?;
            postings_offset += encoded.len() as u64;
        }

        dict_file.flush()?;
        postings_file.flush()?;
        Ok(())
    }
}

/// Remove segment directories not referenced by the committed meta
fn sweep_stray_segments(index_dir: &Path, meta: &IndexMeta) -> Result<()> {
    let segments_dir = index_dir.join("segments");
    if !segments_dir.exists() {
        return Ok(());
    }

    let published: HashSet<String> = meta
        .segments
        .iter()
        .map(|&generation| segment_dir_name(generation))
        .collect();

    for entry in fs::read_dir(&segments_dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if entry.path().is_dir() && !published.contains(&name) {
            tracing::debug!(segment = %name, "sweeping abandoned segment");
            fs::remove_dir_all(entry.path())?;
        }
    }

    // A crashed commit can also leave a meta.json.tmp behind
    let tmp = index_dir.join("meta.json.tmp");
    if tmp.exists() {
        fs::remove_file(&tmp)?;
    }

    Ok(())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
