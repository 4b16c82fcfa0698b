//! # Histix - Full-Text Search Over Git History
//!
//! Histix indexes every version of every file across the commit history of
//! one or more git repositories and answers ranked full-text queries
//! against it: "which commits touched a file containing this phrase?"
//!
//! ## Architecture
//!
//! - [`git`] - Repository discovery and commit walking (libgit2)
//! - [`pipeline`] - Turns commit history into index documents, in batches
//! - [`index`] - Inverted index storage: writer generations and snapshot readers
//! - [`query`] - Query parsing, execution and TF-IDF ranking
//! - [`output`] - Result formatting for the terminal
//! - [`utils`] - Content classification, tokenization, binary encoding
//!
//! ## Quick Start
//!
//! ```ignore
//! use histix::index::reader::IndexReader;
//! use histix::query::QueryExecutor;
//! use histix::utils::StandardAnalyzer;
//!
//! let reader = IndexReader::open(&index_dir)?;
//! let executor = QueryExecutor::new(&reader, &StandardAnalyzer);
//! let results = executor.search("path:main.rs \"fn main\"", 100)?;
//!
//! for hit in &results.hits {
//!     println!("{}/{} @ {}", hit.repository, hit.path, hit.commit_id);
//! }
//! ```
//!
//! ## Storage Model
//!
//! Each writer transaction commits one immutable segment and publishes it
//! by atomically replacing `meta.json`. Readers bind to the segment list
//! they observe at open time, so an open reader keeps a consistent snapshot
//! no matter what is committed after it.

pub mod error;
pub mod git;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod utils;

pub use error::{HistixError, Result};
