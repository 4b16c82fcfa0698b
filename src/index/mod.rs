//! Inverted index storage: term dictionaries, postings and stored fields.

pub mod reader;
pub mod stats;
pub mod types;
pub mod writer;
