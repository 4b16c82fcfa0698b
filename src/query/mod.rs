//! Query parsing, execution and ranking.

pub mod executor;
pub mod parser;
pub mod scorer;

pub use executor::{QueryExecutor, SearchResults};
pub use parser::{parse_query, Clause, ClauseKind, Query};
